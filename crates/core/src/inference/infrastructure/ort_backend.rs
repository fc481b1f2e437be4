//! ONNX Runtime backend.
//!
//! Each execution slot owns its `ort` session on a dedicated worker thread,
//! so `start_async` returns immediately while the run proceeds. Jobs and
//! results travel over bounded channels of capacity one; with a single run
//! in flight neither side ever blocks on send.

use std::path::Path;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use ndarray::Array4;

use crate::inference::domain::inference_backend::{
    InferRequest, InferenceBackend, LoadedNetwork, NetworkInfo, PerfCounter, RequestStatus,
    TensorInfo,
};
use crate::inference::domain::inference_error::{BackendError, ModelLoadError};
use crate::shared::constants::NUM_CLASSES_METADATA_KEY;
use crate::shared::frame::Frame;

use super::execution_provider::execution_providers_for;

/// Name used in diagnostics when the caller does not supply one.
pub const DEFAULT_NETWORK_NAME: &str = "Face Detection";

const PERF_COUNTER_NAME: &str = "session.run";

type RunResult = Result<(Vec<f32>, Duration), String>;

/// Loads ONNX models onto the configured device.
pub struct OrtBackend {
    network_name: String,
    device: String,
    num_classes_fallback: Option<usize>,
}

impl OrtBackend {
    pub fn new(device: &str) -> Self {
        Self {
            network_name: DEFAULT_NETWORK_NAME.to_string(),
            device: device.to_string(),
            num_classes_fallback: None,
        }
    }

    pub fn with_network_name(mut self, name: &str) -> Self {
        self.network_name = name.to_string();
        self
    }

    /// Class count to report when the model carries no `num_classes`
    /// metadata entry.
    pub fn with_num_classes(mut self, num_classes: Option<usize>) -> Self {
        self.num_classes_fallback = num_classes;
        self
    }
}

impl InferenceBackend for OrtBackend {
    fn load_network(&self, path: &Path) -> Result<Box<dyn LoadedNetwork>, ModelLoadError> {
        log::info!("Loading network files for {}", self.network_name);
        let providers = execution_providers_for(&self.device)?;
        let session = build_session(path, providers).map_err(|e| ModelLoadError::Read {
            network: self.network_name.clone(),
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let info = NetworkInfo {
            name: self.network_name.clone(),
            inputs: session
                .inputs()
                .iter()
                .map(|input| tensor_info(input.name(), input.dtype()))
                .collect(),
            outputs: session
                .outputs()
                .iter()
                .map(|output| tensor_info(output.name(), output.dtype()))
                .collect(),
            num_classes: read_num_classes(&session).or(self.num_classes_fallback),
        };
        log::info!(
            "Loaded {} model onto the {} device",
            self.network_name,
            self.device
        );

        Ok(Box::new(OrtNetwork { session, info }))
    }
}

fn build_session(
    path: &Path,
    providers: Vec<ort::execution_providers::ExecutionProviderDispatch>,
) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let session = ort::session::Session::builder()?
        .with_execution_providers(providers)?
        .commit_from_file(path)?;
    Ok(session)
}

fn tensor_info(name: impl AsRef<str>, dtype: &ort::value::ValueType) -> TensorInfo {
    let dims = match dtype {
        ort::value::ValueType::Tensor { shape, .. } => shape.iter().copied().collect(),
        _ => Vec::new(),
    };
    TensorInfo {
        name: name.as_ref().to_string(),
        dims,
    }
}

fn read_num_classes(session: &ort::session::Session) -> Option<usize> {
    let metadata = session.metadata().ok()?;
    let value = metadata.custom(NUM_CLASSES_METADATA_KEY)?;
    value.trim().parse().ok()
}

struct OrtNetwork {
    session: ort::session::Session,
    info: NetworkInfo,
}

impl LoadedNetwork for OrtNetwork {
    fn info(&self) -> &NetworkInfo {
        &self.info
    }

    fn into_request(self: Box<Self>) -> Result<Box<dyn InferRequest>, BackendError> {
        let OrtNetwork { session, info } = *self;
        let input_size = info.inputs.first().and_then(|i| input_size_from_dims(&i.dims));
        Ok(Box::new(OrtRequest::spawn(session, input_size)?))
    }
}

/// `(height, width)` of an NCHW input, or `None` when dynamic.
fn input_size_from_dims(dims: &[i64]) -> Option<(usize, usize)> {
    if dims.len() == 4 && dims[2] > 0 && dims[3] > 0 {
        Some((dims[2] as usize, dims[3] as usize))
    } else {
        None
    }
}

/// Execution slot backed by a worker thread that owns the session.
pub struct OrtRequest {
    input_size: Option<(usize, usize)>,
    input: Option<Array4<f32>>,
    jobs: Option<Sender<Array4<f32>>>,
    results: Receiver<RunResult>,
    worker: Option<JoinHandle<()>>,
    in_flight: bool,
    output: Result<Vec<f32>, BackendError>,
    counter: PerfCounter,
}

impl OrtRequest {
    fn spawn(
        mut session: ort::session::Session,
        input_size: Option<(usize, usize)>,
    ) -> Result<Self, BackendError> {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<Array4<f32>>(1);
        let (result_tx, result_rx) = crossbeam_channel::bounded::<RunResult>(1);

        let worker = std::thread::Builder::new()
            .name("facetrack-inference".to_string())
            .spawn(move || {
                for input in job_rx {
                    let started = Instant::now();
                    let result = run_once(&mut session, input)
                        .map(|data| (data, started.elapsed()))
                        .map_err(|e| e.to_string());
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| BackendError::Execution(format!("cannot start inference worker: {e}")))?;

        Ok(Self {
            input_size,
            input: None,
            jobs: Some(job_tx),
            results: result_rx,
            worker: Some(worker),
            in_flight: false,
            output: Ok(Vec::new()),
            counter: PerfCounter {
                name: PERF_COUNTER_NAME.to_string(),
                ..PerfCounter::default()
            },
        })
    }

    fn finish(&mut self, result: RunResult) -> RequestStatus {
        self.in_flight = false;
        self.output = match result {
            Ok((data, elapsed)) => {
                let us = elapsed.as_micros() as u64;
                self.counter.calls += 1;
                self.counter.total_us += us;
                self.counter.last_us = us;
                Ok(data)
            }
            Err(message) => Err(BackendError::Execution(message)),
        };
        self.completed_status()
    }

    fn completed_status(&self) -> RequestStatus {
        if self.output.is_ok() {
            RequestStatus::Ready
        } else {
            RequestStatus::Failed
        }
    }
}

impl InferRequest for OrtRequest {
    fn set_input(&mut self, frame: &Frame) -> Result<(), BackendError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(BackendError::Input("frame has no pixels".to_string()));
        }
        self.input = Some(to_input_tensor(frame, self.input_size));
        Ok(())
    }

    fn start_async(&mut self) -> Result<(), BackendError> {
        let input = self
            .input
            .take()
            .ok_or_else(|| BackendError::Input("no frame set on the request".to_string()))?;
        let jobs = self.jobs.as_ref().ok_or(BackendError::WorkerGone)?;
        jobs.send(input).map_err(|_| BackendError::WorkerGone)?;
        self.in_flight = true;
        Ok(())
    }

    fn start_sync(&mut self) -> Result<(), BackendError> {
        self.start_async()?;
        match self.block_until_ready() {
            RequestStatus::Failed => Err(self
                .output
                .clone()
                .err()
                .unwrap_or(BackendError::WorkerGone)),
            _ => Ok(()),
        }
    }

    fn poll(&mut self) -> RequestStatus {
        if !self.in_flight {
            return self.completed_status();
        }
        match self.results.try_recv() {
            Ok(result) => self.finish(result),
            Err(TryRecvError::Empty) => RequestStatus::Pending,
            Err(TryRecvError::Disconnected) => self.finish(Err(BackendError::WorkerGone.to_string())),
        }
    }

    fn block_until_ready(&mut self) -> RequestStatus {
        if !self.in_flight {
            return self.completed_status();
        }
        match self.results.recv() {
            Ok(result) => self.finish(result),
            Err(_) => self.finish(Err(BackendError::WorkerGone.to_string())),
        }
    }

    fn read_output(&self) -> Result<&[f32], BackendError> {
        match &self.output {
            Ok(data) => Ok(data),
            Err(e) => Err(e.clone()),
        }
    }

    fn performance_counts(&self) -> Vec<PerfCounter> {
        if self.counter.calls == 0 {
            Vec::new()
        } else {
            vec![self.counter.clone()]
        }
    }
}

impl Drop for OrtRequest {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop after any in-flight run.
        self.jobs = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_once(
    session: &mut ort::session::Session,
    input: Array4<f32>,
) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
    let input_value = ort::value::Tensor::from_array(input)?;
    let outputs = session.run(ort::inputs![input_value])?;
    if outputs.len() == 0 {
        return Err("network produced no outputs".into());
    }
    let tensor = outputs[0].try_extract_array::<f32>()?;
    Ok(tensor.iter().copied().collect())
}

/// Nearest-neighbour resize into a planar BGR `[1, 3, H, W]` tensor with
/// raw 0..255 values, the layout SSD face detectors are trained on.
fn to_input_tensor(frame: &Frame, input_size: Option<(usize, usize)>) -> Array4<f32> {
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let (dst_h, dst_w) = input_size.unwrap_or((src_h, src_w));
    let channels = frame.channels() as usize;
    let src = frame.as_ndarray();

    Array4::from_shape_fn((1, 3, dst_h, dst_w), |(_, c, y, x)| {
        let sy = (y * src_h / dst_h).min(src_h - 1);
        let sx = (x * src_w / dst_w).min(src_w - 1);
        let sc = if channels >= 3 { 2 - c } else { 0 };
        src[[sy, sx, sc]] as f32
    })
}
