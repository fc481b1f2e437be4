use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::detection::domain::detection::Detection;
use crate::shared::geometry::Point2;

/// Action the fusion controller took for a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionState {
    /// Harvested the previous request, tracked the buffered frames and
    /// submitted the current frame.
    DetectAndEnqueueNext,
    /// Buffered the frame behind an outstanding request.
    BufferForTrack,
    /// End of stream: tracked the remaining frames without detecting.
    TrackOnly,
}

impl fmt::Display for FusionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FusionState::DetectAndEnqueueNext => "detect",
            FusionState::BufferForTrack => "buffer",
            FusionState::TrackOnly => "track",
        };
        f.write_str(name)
    }
}

/// Corrected boxes for a frame that was displayed before its tracking pass.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BackfilledFrame {
    pub frame_index: usize,
    pub detections: Vec<Detection>,
}

/// Result of feeding one frame to the controller.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameOutcome {
    pub frame_index: usize,
    pub state: FusionState,
    /// Boxes to display, already shifted by the tracked displacement.
    pub detections: Vec<Detection>,
    pub points: Vec<Point2>,
    /// Positions for earlier frames resolved by this frame's tracking pass,
    /// oldest first.
    pub backfilled: Vec<BackfilledFrame>,
    /// Time spent per phase while handling this frame.
    pub phase_timings: Vec<(&'static str, Duration)>,
}
