use thiserror::Error;

use crate::inference::domain::inference_backend::{PerfCounter, RequestStatus};
use crate::inference::domain::inference_error::SessionError;
use crate::shared::frame::Frame;

use super::detection::Detection;
use super::label_map::LabelMap;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum DetectorError {
    #[error("face detector: {0}")]
    Session(#[from] SessionError),
}

/// Domain interface for an asynchronous face detector.
///
/// One request slot: `enqueue` a frame, `submit` it, poll with `status` or
/// block in `wait`, then `fetch_results`. Implementations are stateful,
/// hence `&mut self`.
pub trait FaceDetector: Send {
    fn name(&self) -> &str;

    /// False for the disabled detector; every operation is then a no-op.
    fn is_enabled(&self) -> bool;

    fn is_async(&self) -> bool;

    fn enqueue(&mut self, frame: &Frame) -> Result<(), DetectorError>;

    /// Starts a run; returns `false` when nothing was enqueued.
    fn submit(&mut self) -> Result<bool, DetectorError>;

    fn status(&mut self) -> Result<RequestStatus, DetectorError>;

    fn wait(&mut self) -> Result<RequestStatus, DetectorError>;

    /// Parsed detections of the last completed run.
    ///
    /// Repeated calls before the next submit return the cached result.
    fn fetch_results(&mut self) -> Result<Vec<Detection>, DetectorError>;

    fn labels(&self) -> &LabelMap;

    fn performance_counts(&self) -> Vec<PerfCounter> {
        Vec::new()
    }
}
