use std::path::PathBuf;

use thiserror::Error;

/// Fatal problems found while loading and validating a network.
///
/// Every variant names the network so startup diagnostics identify which
/// model and which constraint failed.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to load {network} network from {path}: {message}")]
    Read {
        network: String,
        path: PathBuf,
        message: String,
    },
    #[error("{network} network should have exactly one input, found {count}")]
    InputCount { network: String, count: usize },
    #[error("{network} network should have exactly one output, found {count}")]
    OutputCount { network: String, count: usize },
    #[error("{network} network output should have 4 dimensions, but has {rank}")]
    OutputRank { network: String, rank: usize },
    #[error("{network} network output should have {expected} as its last dimension, but has {actual}")]
    ObjectSize {
        network: String,
        expected: usize,
        actual: i64,
    },
    #[error("{network} network output has no usable proposal count (dimension 2 is {value})")]
    ProposalCount { network: String, value: i64 },
    #[error("{network} network output should carry the `{attribute}` attribute")]
    MissingAttribute {
        network: String,
        attribute: &'static str,
    },
    #[error("failed to read labels for {network} network from {path}: {source}")]
    Labels {
        network: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported inference device `{device}`")]
    UnsupportedDevice { device: String },
    #[error("failed to create an inference request for {network} network: {source}")]
    Request {
        network: String,
        #[source]
        source: BackendError,
    },
}

/// Failures reported by the backend while executing a request.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum BackendError {
    #[error("failed to prepare input: {0}")]
    Input(String),
    #[error("inference failed: {0}")]
    Execution(String),
    #[error("inference worker is no longer running")]
    WorkerGone,
}

/// Misuse of the single request slot, or a backend failure surfaced through it.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("no inference request is outstanding")]
    NoOutstandingRequest,
    #[error("status and wait are only available in async mode")]
    NotAsync,
    #[error("an inference request is already in flight")]
    RequestInFlight,
    #[error("no inference request has completed since the last submit")]
    NoCompletedRequest,
    #[error(transparent)]
    Backend(#[from] BackendError),
}
