use crate::shared::frame::Frame;

use super::overlay::Overlay;
use super::video_error::VideoError;

/// Receives each frame with the boxes and points to show on it.
///
/// Frames arrive in index order. Backfilled frames are presented with the
/// same frame they were buffered with.
pub trait OverlaySink: Send {
    fn present(&mut self, frame: &Frame, overlay: &Overlay) -> Result<(), VideoError>;

    /// Flushes any buffered output.
    fn finish(&mut self) -> Result<(), VideoError>;
}
