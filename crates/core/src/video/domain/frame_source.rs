use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

use super::video_error::VideoError;

/// Sequential source of decoded frames.
///
/// Frames come out in decode order with consecutive indices starting at 0.
pub trait FrameSource: Send {
    /// Opens a video file and returns its metadata.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, VideoError>;

    /// Next frame, `None` at end of stream.
    fn read(&mut self) -> Option<Result<Frame, VideoError>>;

    /// Releases any resources held by the source.
    fn close(&mut self);
}
