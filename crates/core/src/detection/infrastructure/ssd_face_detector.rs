use std::path::Path;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::detection_parser::DetectionParser;
use crate::detection::domain::face_detector::{DetectorError, FaceDetector};
use crate::detection::domain::label_map::LabelMap;
use crate::detection::domain::output_layout::OutputLayout;
use crate::inference::domain::inference_backend::{
    ExecutionMode, InferenceBackend, PerfCounter, RequestStatus,
};
use crate::inference::domain::inference_error::ModelLoadError;
use crate::inference::domain::inference_session::InferenceSession;
use crate::shared::frame::Frame;

use super::detector_factory::DetectorConfig;

/// SSD face detector on top of a single inference slot.
///
/// Parsed results are cached per submitted request, so the output buffer
/// is read and parsed once no matter how often the caller fetches.
pub struct SsdFaceDetector {
    session: InferenceSession,
    parser: DetectionParser,
    labels: LabelMap,
    enqueued_size: (u32, u32),
    submitted_size: (u32, u32),
    cached: Option<Vec<Detection>>,
}

impl SsdFaceDetector {
    /// Loads and validates the model, reads its label sidecar and opens the
    /// request slot.
    pub fn load(
        backend: &dyn InferenceBackend,
        model_path: &Path,
        config: &DetectorConfig,
    ) -> Result<Self, ModelLoadError> {
        let network = backend.load_network(model_path)?;
        let name = network.info().name.clone();

        log::info!("Checking {name} network inputs and outputs");
        let layout = OutputLayout::from_network(network.info())?;
        let labels = LabelMap::load_for_model(model_path, layout.num_classes, &name)?;
        let session = InferenceSession::open(network, config.mode)?;

        let parser = DetectionParser::new(layout, config.threshold, config.enlarge_coefficient)
            .with_raw_output_messages(config.raw_output_messages);
        Ok(Self::new(session, parser, labels))
    }

    pub fn new(session: InferenceSession, parser: DetectionParser, labels: LabelMap) -> Self {
        Self {
            session,
            parser,
            labels,
            enqueued_size: (0, 0),
            submitted_size: (0, 0),
            cached: None,
        }
    }
}

impl FaceDetector for SsdFaceDetector {
    fn name(&self) -> &str {
        &self.session.network().name
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn is_async(&self) -> bool {
        self.session.mode() == ExecutionMode::Async
    }

    fn enqueue(&mut self, frame: &Frame) -> Result<(), DetectorError> {
        self.session.enqueue(frame)?;
        self.enqueued_size = (frame.width(), frame.height());
        Ok(())
    }

    fn submit(&mut self) -> Result<bool, DetectorError> {
        let started = self.session.submit()?;
        if started {
            self.submitted_size = self.enqueued_size;
            self.cached = None;
        }
        Ok(started)
    }

    fn status(&mut self) -> Result<RequestStatus, DetectorError> {
        Ok(self.session.status()?)
    }

    fn wait(&mut self) -> Result<RequestStatus, DetectorError> {
        Ok(self.session.wait()?)
    }

    fn fetch_results(&mut self) -> Result<Vec<Detection>, DetectorError> {
        if let Some(cached) = &self.cached {
            return Ok(cached.clone());
        }
        let (width, height) = self.submitted_size;
        let raw = self.session.read_output()?;
        let detections = self.parser.parse(raw, width, height);
        self.cached = Some(detections.clone());
        Ok(detections)
    }

    fn labels(&self) -> &LabelMap {
        &self.labels
    }

    fn performance_counts(&self) -> Vec<PerfCounter> {
        self.session.performance_counts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::inference::domain::inference_backend::{
        InferRequest, LoadedNetwork, NetworkInfo, TensorInfo,
    };
    use crate::inference::domain::inference_error::{BackendError, SessionError};
    use crate::shared::geometry::BoundingBox;

    struct FakeRequest {
        output: Vec<f32>,
        reads: Arc<AtomicUsize>,
    }

    impl InferRequest for FakeRequest {
        fn set_input(&mut self, _frame: &Frame) -> Result<(), BackendError> {
            Ok(())
        }

        fn start_async(&mut self) -> Result<(), BackendError> {
            Ok(())
        }

        fn start_sync(&mut self) -> Result<(), BackendError> {
            Ok(())
        }

        fn poll(&mut self) -> RequestStatus {
            RequestStatus::Ready
        }

        fn block_until_ready(&mut self) -> RequestStatus {
            RequestStatus::Ready
        }

        fn read_output(&self) -> Result<&[f32], BackendError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(&self.output)
        }
    }

    struct FakeNetwork {
        info: NetworkInfo,
        output: Vec<f32>,
        reads: Arc<AtomicUsize>,
    }

    impl LoadedNetwork for FakeNetwork {
        fn info(&self) -> &NetworkInfo {
            &self.info
        }

        fn into_request(self: Box<Self>) -> Result<Box<dyn InferRequest>, BackendError> {
            Ok(Box::new(FakeRequest {
                output: self.output,
                reads: self.reads,
            }))
        }
    }

    struct FakeBackend {
        output_dims: Vec<i64>,
        output: Vec<f32>,
        reads: Arc<AtomicUsize>,
    }

    impl FakeBackend {
        fn new(output: Vec<f32>) -> Self {
            Self {
                output_dims: vec![1, 1, 4, 7],
                output,
                reads: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl InferenceBackend for FakeBackend {
        fn load_network(&self, _path: &Path) -> Result<Box<dyn LoadedNetwork>, ModelLoadError> {
            Ok(Box::new(FakeNetwork {
                info: NetworkInfo {
                    name: "Face Detection".to_string(),
                    inputs: vec![TensorInfo {
                        name: "data".to_string(),
                        dims: vec![1, 3, 300, 300],
                    }],
                    outputs: vec![TensorInfo {
                        name: "detection_out".to_string(),
                        dims: self.output_dims.clone(),
                    }],
                    num_classes: Some(2),
                },
                output: self.output.clone(),
                reads: Arc::clone(&self.reads),
            }))
        }
    }

    fn one_face() -> Vec<f32> {
        vec![
            0.0, 1.0, 0.9, 0.1, 0.1, 0.3, 0.3, //
            -1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ]
    }

    fn config(mode: ExecutionMode) -> DetectorConfig {
        DetectorConfig {
            mode,
            ..DetectorConfig::default()
        }
    }

    fn frame() -> Frame {
        Frame::new(vec![0u8; 100 * 100 * 3], 100, 100, 3, 0)
    }

    fn load(backend: &FakeBackend, mode: ExecutionMode) -> SsdFaceDetector {
        let dir = tempfile::tempdir().unwrap();
        SsdFaceDetector::load(backend, &dir.path().join("ssd.onnx"), &config(mode)).unwrap()
    }

    #[test]
    fn test_async_cycle_parses_against_submitted_frame_size() {
        let backend = FakeBackend::new(one_face());
        let mut detector = load(&backend, ExecutionMode::Async);
        assert!(detector.is_async());

        detector.enqueue(&frame()).unwrap();
        assert!(detector.submit().unwrap());
        assert_eq!(detector.wait().unwrap(), RequestStatus::Ready);

        let dets = detector.fetch_results().unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].location, BoundingBox::new(8, 8, 24, 24));
    }

    #[test]
    fn test_fetch_is_cached_until_next_submit() {
        let backend = FakeBackend::new(one_face());
        let mut detector = load(&backend, ExecutionMode::Async);

        detector.enqueue(&frame()).unwrap();
        detector.submit().unwrap();
        detector.wait().unwrap();
        let first = detector.fetch_results().unwrap();
        let second = detector.fetch_results().unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sync_mode_is_ready_after_submit() {
        let backend = FakeBackend::new(one_face());
        let mut detector = load(&backend, ExecutionMode::Sync);

        detector.enqueue(&frame()).unwrap();
        detector.submit().unwrap();
        assert_eq!(
            detector.status().unwrap_err(),
            DetectorError::Session(SessionError::NotAsync)
        );
        assert_eq!(detector.fetch_results().unwrap().len(), 1);
    }

    #[test]
    fn test_fetch_before_any_run_is_rejected() {
        let backend = FakeBackend::new(one_face());
        let mut detector = load(&backend, ExecutionMode::Async);
        assert_eq!(
            detector.fetch_results().unwrap_err(),
            DetectorError::Session(SessionError::NoCompletedRequest)
        );
    }

    #[test]
    fn test_submit_without_enqueue_is_noop() {
        let backend = FakeBackend::new(one_face());
        let mut detector = load(&backend, ExecutionMode::Async);
        assert!(!detector.submit().unwrap());
        assert_eq!(
            detector.status().unwrap_err(),
            DetectorError::Session(SessionError::NoOutstandingRequest)
        );
    }

    #[test]
    fn test_load_rejects_non_ssd_output() {
        let mut backend = FakeBackend::new(one_face());
        backend.output_dims = vec![1, 100, 5];
        let dir = tempfile::tempdir().unwrap();
        let result = SsdFaceDetector::load(
            &backend,
            &dir.path().join("ssd.onnx"),
            &config(ExecutionMode::Async),
        );
        assert!(matches!(result, Err(ModelLoadError::OutputRank { rank: 3, .. })));
    }

    #[test]
    fn test_load_repairs_labels_from_sidecar() {
        let backend = FakeBackend::new(one_face());
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ssd.labels"), "face").unwrap();

        let detector = SsdFaceDetector::load(
            &backend,
            &dir.path().join("ssd.onnx"),
            &config(ExecutionMode::Async),
        )
        .unwrap();
        assert_eq!(detector.labels().display_name(1), "face");
        assert_eq!(detector.labels().len(), 2);
    }
}
