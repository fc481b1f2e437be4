use crate::shared::frame::Frame;

use super::inference_backend::{
    ExecutionMode, InferRequest, LoadedNetwork, NetworkInfo, PerfCounter, RequestStatus,
};
use super::inference_error::{ModelLoadError, SessionError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    Idle,
    Submitted,
    Ready,
    Failed,
}

/// Exclusive owner of a loaded network's single execution slot.
///
/// Lifecycle of the slot: `idle → submitted → ready/failed → idle`. The
/// session rejects a second submit while a run is in flight, so at most one
/// request is ever outstanding. Dropping the session drops the backend
/// request, which releases the backend's resources.
pub struct InferenceSession {
    network: NetworkInfo,
    request: Box<dyn InferRequest>,
    mode: ExecutionMode,
    state: SlotState,
    input_ready: bool,
}

impl InferenceSession {
    pub fn open(network: Box<dyn LoadedNetwork>, mode: ExecutionMode) -> Result<Self, ModelLoadError> {
        let info = network.info().clone();
        let request = network
            .into_request()
            .map_err(|source| ModelLoadError::Request {
                network: info.name.clone(),
                source,
            })?;
        if mode == ExecutionMode::Async {
            log::info!("Using async mode for {}", info.name);
        }
        Ok(Self {
            network: info,
            request,
            mode,
            state: SlotState::Idle,
            input_ready: false,
        })
    }

    pub fn network(&self) -> &NetworkInfo {
        &self.network
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Prepares the input slot with one frame.
    pub fn enqueue(&mut self, frame: &Frame) -> Result<(), SessionError> {
        if self.state == SlotState::Submitted {
            return Err(SessionError::RequestInFlight);
        }
        self.request.set_input(frame)?;
        self.input_ready = true;
        Ok(())
    }

    /// Starts a run on the enqueued frame.
    ///
    /// Returns `Ok(false)` without touching the backend when nothing was
    /// enqueued since the last submit.
    pub fn submit(&mut self) -> Result<bool, SessionError> {
        if self.state == SlotState::Submitted {
            return Err(SessionError::RequestInFlight);
        }
        if !self.input_ready {
            return Ok(false);
        }
        self.input_ready = false;

        match self.mode {
            ExecutionMode::Async => {
                self.request.start_async()?;
                self.state = SlotState::Submitted;
            }
            ExecutionMode::Sync => {
                self.state = match self.request.start_sync() {
                    Ok(()) => SlotState::Ready,
                    Err(e) => {
                        log::warn!("{} request failed: {e}", self.network.name);
                        SlotState::Failed
                    }
                };
            }
        }
        Ok(true)
    }

    /// Non-blocking completion check (async mode only).
    pub fn status(&mut self) -> Result<RequestStatus, SessionError> {
        self.require_async()?;
        match self.state {
            SlotState::Idle => Err(SessionError::NoOutstandingRequest),
            SlotState::Ready => Ok(RequestStatus::Ready),
            SlotState::Failed => Ok(RequestStatus::Failed),
            SlotState::Submitted => {
                let status = self.request.poll();
                self.observe(status);
                Ok(status)
            }
        }
    }

    /// Blocks until the outstanding run finishes (async mode only).
    pub fn wait(&mut self) -> Result<RequestStatus, SessionError> {
        self.require_async()?;
        match self.state {
            SlotState::Idle => Err(SessionError::NoOutstandingRequest),
            SlotState::Ready => Ok(RequestStatus::Ready),
            SlotState::Failed => Ok(RequestStatus::Failed),
            SlotState::Submitted => {
                let status = self.request.block_until_ready();
                self.observe(status);
                Ok(status)
            }
        }
    }

    /// Returns the raw output of the most recently completed run and moves
    /// the slot back to idle.
    ///
    /// Fails with `NoCompletedRequest` unless a run has finished since the
    /// last call, so stale buffers are never handed out.
    pub fn read_output(&mut self) -> Result<&[f32], SessionError> {
        if self.state == SlotState::Submitted && self.mode == ExecutionMode::Async {
            let status = self.request.poll();
            self.observe(status);
        }
        match self.state {
            SlotState::Ready => {
                self.state = SlotState::Idle;
                Ok(self.request.read_output()?)
            }
            SlotState::Failed => {
                self.state = SlotState::Idle;
                match self.request.read_output() {
                    Err(e) => Err(SessionError::Backend(e)),
                    Ok(_) => Err(SessionError::NoCompletedRequest),
                }
            }
            SlotState::Idle | SlotState::Submitted => Err(SessionError::NoCompletedRequest),
        }
    }

    pub fn performance_counts(&self) -> Vec<PerfCounter> {
        self.request.performance_counts()
    }

    fn require_async(&self) -> Result<(), SessionError> {
        if self.mode == ExecutionMode::Async {
            Ok(())
        } else {
            Err(SessionError::NotAsync)
        }
    }

    fn observe(&mut self, status: RequestStatus) {
        match status {
            RequestStatus::Pending => {}
            RequestStatus::Ready => self.state = SlotState::Ready,
            RequestStatus::Failed => {
                log::warn!("{} request failed", self.network.name);
                self.state = SlotState::Failed;
            }
        }
    }
}
