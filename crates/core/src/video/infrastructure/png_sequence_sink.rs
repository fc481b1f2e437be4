use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::video::domain::overlay::Overlay;
use crate::video::domain::overlay_sink::OverlaySink;
use crate::video::domain::video_error::VideoError;

use super::overlay_drawing::render_overlay;

/// Writes every presented frame with its overlay as `frame_000000.png`,
/// `frame_000001.png`, ... into a directory.
pub struct PngSequenceSink {
    output_dir: PathBuf,
    written: usize,
}

impl PngSequenceSink {
    /// Creates the output directory if needed.
    pub fn new(output_dir: &Path) -> Result<Self, VideoError> {
        std::fs::create_dir_all(output_dir)?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            written: 0,
        })
    }

    pub fn frame_path(&self, frame_index: usize) -> PathBuf {
        self.output_dir.join(format!("frame_{frame_index:06}.png"))
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl OverlaySink for PngSequenceSink {
    fn present(&mut self, frame: &Frame, overlay: &Overlay) -> Result<(), VideoError> {
        let path = self.frame_path(overlay.frame_index);
        let img = render_overlay(frame, overlay).ok_or_else(|| VideoError::Write {
            path: path.clone(),
            message: format!(
                "unsupported frame layout {}x{}x{}",
                frame.width(),
                frame.height(),
                frame.channels()
            ),
        })?;
        img.save(&path).map_err(|e| VideoError::Write {
            path: path.clone(),
            message: e.to_string(),
        })?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), VideoError> {
        log::info!(
            "Wrote {} frames to {}",
            self.written,
            self.output_dir.display()
        );
        Ok(())
    }
}
