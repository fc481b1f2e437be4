use crate::shared::constants::{
    DEFAULT_DETECTION_CADENCE, DEFAULT_FB_TOLERANCE, DEFAULT_MAX_POINTS_PER_FACE,
};

/// Detection/tracking fusion settings.
#[derive(Clone, Debug, PartialEq)]
pub struct FusionConfig {
    /// Frames between detector submissions.
    pub cadence: usize,
    pub max_points_per_face: usize,
    /// Forward-backward round-trip tolerance, pixels (L∞).
    pub fb_tolerance: f32,
    /// Frames buffered behind an outstanding request before the controller
    /// blocks on it.
    pub max_buffered_frames: usize,
    /// Track every frame for display while a request is outstanding.
    pub live_tracking: bool,
}

impl FusionConfig {
    /// Config for `cadence` with a buffer of twice the cadence.
    pub fn with_cadence(cadence: usize) -> Self {
        Self {
            cadence,
            max_buffered_frames: 2 * cadence,
            ..Self::default()
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            cadence: DEFAULT_DETECTION_CADENCE,
            max_points_per_face: DEFAULT_MAX_POINTS_PER_FACE,
            fb_tolerance: DEFAULT_FB_TOLERANCE,
            max_buffered_frames: 2 * DEFAULT_DETECTION_CADENCE,
            live_tracking: false,
        }
    }
}
