use std::path::PathBuf;

/// Stream properties reported by a frame source when it is opened.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Container frame count; 0 when unknown (live sources).
    pub total_frames: usize,
    pub source_path: Option<PathBuf>,
}
