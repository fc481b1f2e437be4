use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::{DetectorError, FaceDetector};
use crate::detection::domain::label_map::LabelMap;
use crate::inference::domain::inference_backend::RequestStatus;
use crate::inference::domain::inference_error::SessionError;
use crate::shared::frame::Frame;

/// Stand-in used when no model is configured. Never produces detections.
#[derive(Debug, Default)]
pub struct DisabledFaceDetector {
    labels: LabelMap,
}

impl DisabledFaceDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FaceDetector for DisabledFaceDetector {
    fn name(&self) -> &str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn is_async(&self) -> bool {
        false
    }

    fn enqueue(&mut self, _frame: &Frame) -> Result<(), DetectorError> {
        Ok(())
    }

    fn submit(&mut self) -> Result<bool, DetectorError> {
        Ok(false)
    }

    fn status(&mut self) -> Result<RequestStatus, DetectorError> {
        Err(SessionError::NoOutstandingRequest.into())
    }

    fn wait(&mut self) -> Result<RequestStatus, DetectorError> {
        Err(SessionError::NoOutstandingRequest.into())
    }

    fn fetch_results(&mut self) -> Result<Vec<Detection>, DetectorError> {
        Ok(Vec::new())
    }

    fn labels(&self) -> &LabelMap {
        &self.labels
    }
}
