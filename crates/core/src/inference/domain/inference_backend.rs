use std::path::Path;

use crate::shared::frame::Frame;

use super::inference_error::{BackendError, ModelLoadError};

/// Shape description of one network input or output.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorInfo {
    pub name: String,
    /// Dimensions as reported by the model; non-positive values are dynamic.
    pub dims: Vec<i64>,
}

/// What a loaded network exposes before any request is created.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkInfo {
    pub name: String,
    pub inputs: Vec<TensorInfo>,
    pub outputs: Vec<TensorInfo>,
    /// Class count of the detection output, when the model declares one.
    pub num_classes: Option<usize>,
}

/// Progress of a submitted request, as seen by a non-blocking poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Ready,
    Failed,
}

/// Whether `submit` returns immediately or blocks until the result exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    #[default]
    Sync,
    Async,
}

/// Per-stage counter reported by a backend, in microseconds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PerfCounter {
    pub name: String,
    pub calls: u64,
    pub total_us: u64,
    pub last_us: u64,
}

/// Opaque neural-network execution engine.
pub trait InferenceBackend {
    /// Reads and compiles a model. Fails on missing or malformed files.
    fn load_network(&self, path: &Path) -> Result<Box<dyn LoadedNetwork>, ModelLoadError>;
}

/// A compiled network that has not yet been bound to an execution slot.
pub trait LoadedNetwork: Send {
    fn info(&self) -> &NetworkInfo;

    /// Consumes the network into its single execution slot.
    fn into_request(self: Box<Self>) -> Result<Box<dyn InferRequest>, BackendError>;
}

/// One execution slot of a loaded network.
///
/// At most one run is in flight per slot; the owning session enforces that.
pub trait InferRequest: Send {
    /// Copies and converts one frame into the input tensor.
    fn set_input(&mut self, frame: &Frame) -> Result<(), BackendError>;

    /// Starts a run and returns immediately.
    fn start_async(&mut self) -> Result<(), BackendError>;

    /// Runs to completion before returning.
    fn start_sync(&mut self) -> Result<(), BackendError>;

    fn poll(&mut self) -> RequestStatus;

    fn block_until_ready(&mut self) -> RequestStatus;

    /// Flat output of the last completed run, or the error it failed with.
    fn read_output(&self) -> Result<&[f32], BackendError>;

    fn performance_counts(&self) -> Vec<PerfCounter> {
        Vec::new()
    }
}
