use std::path::PathBuf;

use crate::detection::domain::face_detector::FaceDetector;
use crate::inference::domain::inference_backend::{ExecutionMode, InferenceBackend};
use crate::inference::domain::inference_error::ModelLoadError;
use crate::shared::constants::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_ENLARGE_COEFFICIENT};

use super::disabled_face_detector::DisabledFaceDetector;
use super::ssd_face_detector::SsdFaceDetector;

/// Detector settings chosen at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorConfig {
    /// `None` disables detection.
    pub model_path: Option<PathBuf>,
    pub mode: ExecutionMode,
    pub threshold: f64,
    pub enlarge_coefficient: f64,
    pub raw_output_messages: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            mode: ExecutionMode::Sync,
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            enlarge_coefficient: DEFAULT_ENLARGE_COEFFICIENT,
            raw_output_messages: false,
        }
    }
}

/// Creates the SSD detector, or the disabled one when no model is set.
pub fn create_face_detector(
    backend: &dyn InferenceBackend,
    config: &DetectorConfig,
) -> Result<Box<dyn FaceDetector>, ModelLoadError> {
    match &config.model_path {
        Some(path) => {
            let detector = SsdFaceDetector::load(backend, path, config)?;
            log::info!(
                "Using {} detector ({:?} mode, threshold {})",
                detector.name(),
                config.mode,
                config.threshold
            );
            Ok(Box::new(detector))
        }
        None => {
            log::info!("No detection model configured, face detection disabled");
            Ok(Box::new(DisabledFaceDetector::new()))
        }
    }
}
