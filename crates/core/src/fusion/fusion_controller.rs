use std::time::{Duration, Instant};

use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::{DetectorError, FaceDetector};
use crate::inference::domain::inference_backend::RequestStatus;
use crate::shared::constants::{PHASE_DETECTION, PHASE_KEYPOINTS, PHASE_TRACKER};
use crate::shared::frame::Frame;
use crate::shared::geometry::{BoundingBox, Point2};
use crate::tracking::domain::feature_selector::FeatureSelector;
use crate::tracking::domain::flow_estimator::FlowEstimator;
use crate::tracking::domain::frame_ring_buffer::{BufferedFrame, FrameRingBuffer};
use crate::tracking::domain::optical_flow_tracker::{Displacement, OpticalFlowTracker};

use super::frame_outcome::{BackfilledFrame, FrameOutcome, FusionState};
use super::fusion_config::FusionConfig;

/// Per-frame decision between detecting, buffering and tracking.
///
/// The detector runs on one frame every `cadence` frames. While its
/// request is outstanding, frames are buffered as grayscale. When the
/// result is harvested, feature points are selected inside the new boxes
/// on the frame the request was submitted with, then tracked across every
/// buffered frame up to the current one. Boxes reported for a frame are the
/// latest detections shifted by all displacement tracked since.
pub struct FusionController {
    detector: Box<dyn FaceDetector>,
    selector: Box<dyn FeatureSelector>,
    tracker: OpticalFlowTracker,
    config: FusionConfig,
    buffer: FrameRingBuffer,
    /// Frame the next tracking pass starts from: the last harvest frame,
    /// which the outstanding request (if any) was submitted with.
    submission: Option<BufferedFrame>,
    request_pending: bool,
    started: bool,
    frames_since_cycle: usize,
    detections: Vec<Detection>,
    points: Vec<Point2>,
    offset: Displacement,
    live_points: Vec<Point2>,
    live_offset: Displacement,
    timings: Vec<(&'static str, Duration)>,
}

impl FusionController {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        selector: Box<dyn FeatureSelector>,
        flow: Box<dyn FlowEstimator>,
        config: FusionConfig,
    ) -> Self {
        // room for the submission and harvest frames around a full buffer
        let buffer = FrameRingBuffer::new(config.max_buffered_frames + 2);
        Self {
            detector,
            selector,
            tracker: OpticalFlowTracker::new(flow, config.fb_tolerance),
            config,
            buffer,
            submission: None,
            request_pending: false,
            started: false,
            frames_since_cycle: 0,
            detections: Vec::new(),
            points: Vec::new(),
            offset: Displacement::default(),
            live_points: Vec::new(),
            live_offset: Displacement::default(),
            timings: Vec::new(),
        }
    }

    pub fn detector(&self) -> &dyn FaceDetector {
        self.detector.as_ref()
    }

    /// Frames waiting for the next tracking pass, excluding the submission
    /// frame.
    pub fn buffered_frames(&self) -> usize {
        self.buffer.len()
    }

    pub fn has_pending_request(&self) -> bool {
        self.request_pending
    }

    /// Feeds the next frame. `is_last` marks the final frame of the stream:
    /// no request is submitted on it and any buffered frames are tracked.
    pub fn process(&mut self, frame: &Frame, is_last: bool) -> Result<FrameOutcome, DetectorError> {
        self.timings.clear();
        let current = BufferedFrame::new(frame.index(), frame.to_gray());

        if self.started {
            self.frames_since_cycle += 1;
        }
        let due = !self.started
            || self.frames_since_cycle >= self.config.cadence
            || self.buffer_is_full();
        if due && self.request_completed()? {
            return self.detect_and_enqueue_next(frame, current, is_last);
        }

        self.buffer.push_back(current);
        if is_last {
            return Ok(self.track_only());
        }
        Ok(self.buffer_for_track())
    }

    /// Tracks whatever is still buffered when the stream ended without a
    /// frame flagged as last. Returns `None` when nothing is buffered.
    pub fn finish(&mut self) -> Option<FrameOutcome> {
        self.timings.clear();
        if self.buffer.is_empty() {
            self.submission = None;
            return None;
        }
        Some(self.track_only())
    }

    fn buffer_is_full(&self) -> bool {
        self.buffer.len() >= self.config.max_buffered_frames
    }

    /// True when there is no request to wait for or the outstanding one has
    /// finished. Blocks only when the buffer has no room left.
    fn request_completed(&mut self) -> Result<bool, DetectorError> {
        if !self.request_pending || !self.detector.is_async() {
            return Ok(true);
        }
        let started = Instant::now();
        let mut status = self.detector.status()?;
        if status == RequestStatus::Pending && self.buffer_is_full() {
            log::debug!(
                "Frame buffer holds {} frames, waiting for {}",
                self.buffer.len(),
                self.detector.name()
            );
            status = self.detector.wait()?;
        }
        self.record(PHASE_DETECTION, started.elapsed());
        Ok(status != RequestStatus::Pending)
    }

    fn detect_and_enqueue_next(
        &mut self,
        frame: &Frame,
        current: BufferedFrame,
        is_last: bool,
    ) -> Result<FrameOutcome, DetectorError> {
        let frame_index = current.index;
        if self.request_pending {
            self.harvest();
        }

        self.buffer.push_back(current);
        let mut backfilled = self.track_buffered();
        backfilled.pop();
        let current = self.buffer.pop_back();
        self.buffer.clear();
        self.reset_live_estimate();

        self.submission = None;
        if !is_last {
            if self.detector.is_enabled() {
                let started = Instant::now();
                match self.submit(frame) {
                    Ok(submitted) => self.request_pending = submitted,
                    Err(e) => log::warn!("Could not start detection on frame {frame_index}: {e}"),
                }
                self.record(PHASE_DETECTION, started.elapsed());
            }
            self.submission = current;
        }
        self.started = true;
        self.frames_since_cycle = 0;

        let detections = shifted(&self.detections, self.offset);
        let points = self.points.clone();
        Ok(self.outcome(
            frame_index,
            FusionState::DetectAndEnqueueNext,
            detections,
            points,
            backfilled,
        ))
    }

    fn submit(&mut self, frame: &Frame) -> Result<bool, DetectorError> {
        self.detector.enqueue(frame)?;
        self.detector.submit()
    }

    /// Replaces detections and points with the finished request's result.
    /// A failed request keeps the previous ones.
    fn harvest(&mut self) {
        self.request_pending = false;
        let started = Instant::now();
        let fetched = self.detector.fetch_results();
        self.record(PHASE_DETECTION, started.elapsed());

        let detections = match fetched {
            Ok(detections) => detections,
            Err(e) => {
                log::warn!("Detection request failed, keeping previous boxes: {e}");
                return;
            }
        };

        let started = Instant::now();
        let regions: Vec<BoundingBox> = detections.iter().map(|d| d.location).collect();
        self.points = match &self.submission {
            Some(source) if !regions.is_empty() => self.selector.select(
                &source.gray,
                &regions,
                self.config.max_points_per_face * regions.len(),
            ),
            _ => Vec::new(),
        };
        self.record(PHASE_KEYPOINTS, started.elapsed());

        log::debug!(
            "Harvested {} detections with {} feature points",
            detections.len(),
            self.points.len()
        );
        self.detections = detections;
        self.offset = Displacement::default();
    }

    /// Tracks from the submission frame through every buffered frame.
    ///
    /// Returns the boxes for each frame after the submission frame, oldest
    /// first, and folds the total displacement into the cycle offset.
    fn track_buffered(&mut self) -> Vec<BackfilledFrame> {
        if let Some(source) = self.submission.take() {
            self.buffer.push_front(source);
        }

        let started = Instant::now();
        let running = self.tracker.track_buffer(&self.buffer, &mut self.points);
        let mut indices = Vec::with_capacity(running.len());
        self.buffer
            .for_each_consecutive_pair(|_, next| indices.push(next.index));

        let backfilled = indices
            .into_iter()
            .zip(&running)
            .map(|(frame_index, step)| {
                let mut total = self.offset;
                total += *step;
                BackfilledFrame {
                    frame_index,
                    detections: shifted(&self.detections, total),
                }
            })
            .collect();
        if let Some(last) = running.last() {
            self.offset += *last;
        }
        self.record(PHASE_TRACKER, started.elapsed());
        backfilled
    }

    fn track_only(&mut self) -> FrameOutcome {
        let frame_index = self.buffer.back().map_or(0, |f| f.index);
        let mut backfilled = self.track_buffered();
        backfilled.pop();
        self.buffer.clear();
        self.request_pending = false;
        self.reset_live_estimate();

        let detections = shifted(&self.detections, self.offset);
        let points = self.points.clone();
        self.outcome(frame_index, FusionState::TrackOnly, detections, points, backfilled)
    }

    fn buffer_for_track(&mut self) -> FrameOutcome {
        let frame_index = self.buffer.back().map_or(0, |f| f.index);

        if self.config.live_tracking && !self.live_points.is_empty() {
            let started = Instant::now();
            let len = self.buffer.len();
            let prev = if len >= 2 {
                self.buffer.get(len - 2)
            } else {
                self.submission.as_ref()
            };
            if let (Some(prev), Some(next)) = (prev, self.buffer.back()) {
                if let Some(step) = self
                    .tracker
                    .track_pair(&prev.gray, &next.gray, &mut self.live_points)
                {
                    self.live_offset += step;
                }
            }
            self.record(PHASE_TRACKER, started.elapsed());
        }

        let mut estimate = self.offset;
        estimate += self.live_offset;
        let detections = shifted(&self.detections, estimate);
        let points = if self.config.live_tracking {
            self.live_points.clone()
        } else {
            self.points.clone()
        };
        self.outcome(
            frame_index,
            FusionState::BufferForTrack,
            detections,
            points,
            Vec::new(),
        )
    }

    fn reset_live_estimate(&mut self) {
        self.live_points = self.points.clone();
        self.live_offset = Displacement::default();
    }

    fn record(&mut self, phase: &'static str, elapsed: Duration) {
        match self.timings.iter_mut().find(|(name, _)| *name == phase) {
            Some((_, total)) => *total += elapsed,
            None => self.timings.push((phase, elapsed)),
        }
    }

    fn outcome(
        &mut self,
        frame_index: usize,
        state: FusionState,
        detections: Vec<Detection>,
        points: Vec<Point2>,
        backfilled: Vec<BackfilledFrame>,
    ) -> FrameOutcome {
        FrameOutcome {
            frame_index,
            state,
            detections,
            points,
            backfilled,
            phase_timings: std::mem::take(&mut self.timings),
        }
    }
}

/// Moves every box by the whole-pixel rounding of `by`.
fn shifted(detections: &[Detection], by: Displacement) -> Vec<Detection> {
    let (dx, dy) = by.rounded();
    detections
        .iter()
        .map(|d| Detection {
            location: d.location.translated(dx, dy),
            ..d.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    use crate::detection::domain::label_map::LabelMap;
    use crate::detection::infrastructure::disabled_face_detector::DisabledFaceDetector;
    use crate::inference::domain::inference_error::{BackendError, SessionError};
    use crate::shared::frame::GrayImage;
    use crate::tracking::domain::flow_estimator::FlowEstimator;

    // ── Stubs ──

    /// Detector returning canned detections keyed by the index of the frame
    /// each request was submitted with.
    struct ScriptedDetector {
        results: HashMap<usize, Vec<Detection>>,
        failing: HashSet<usize>,
        failing_submits: HashSet<usize>,
        asynchronous: bool,
        pending_polls: usize,
        polls_left: usize,
        enqueued: Option<usize>,
        submitted: Option<usize>,
        labels: LabelMap,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedDetector {
        fn new(results: HashMap<usize, Vec<Detection>>) -> Self {
            Self {
                results,
                failing: HashSet::new(),
                failing_submits: HashSet::new(),
                asynchronous: true,
                pending_polls: 0,
                polls_left: 0,
                enqueued: None,
                submitted: None,
                labels: LabelMap::default(),
                log: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl FaceDetector for ScriptedDetector {
        fn name(&self) -> &str {
            "scripted"
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn is_async(&self) -> bool {
            self.asynchronous
        }

        fn enqueue(&mut self, frame: &Frame) -> Result<(), DetectorError> {
            if self.asynchronous && self.submitted.is_some() {
                return Err(SessionError::RequestInFlight.into());
            }
            self.enqueued = Some(frame.index());
            Ok(())
        }

        fn submit(&mut self) -> Result<bool, DetectorError> {
            if self.asynchronous && self.submitted.is_some() {
                return Err(SessionError::RequestInFlight.into());
            }
            let Some(index) = self.enqueued.take() else {
                return Ok(false);
            };
            if self.failing_submits.remove(&index) {
                return Err(SessionError::Backend(BackendError::WorkerGone).into());
            }
            self.log.lock().unwrap().push(format!("submit {index}"));
            self.submitted = Some(index);
            self.polls_left = self.pending_polls;
            Ok(true)
        }

        fn status(&mut self) -> Result<RequestStatus, DetectorError> {
            if !self.asynchronous {
                return Err(SessionError::NotAsync.into());
            }
            let index = self.submitted.ok_or(SessionError::NoOutstandingRequest)?;
            if self.polls_left > 0 {
                self.polls_left -= 1;
                Ok(RequestStatus::Pending)
            } else if self.failing.contains(&index) {
                Ok(RequestStatus::Failed)
            } else {
                Ok(RequestStatus::Ready)
            }
        }

        fn wait(&mut self) -> Result<RequestStatus, DetectorError> {
            self.log.lock().unwrap().push("wait".to_string());
            self.polls_left = 0;
            self.status()
        }

        fn fetch_results(&mut self) -> Result<Vec<Detection>, DetectorError> {
            let index = self.submitted.take().ok_or(SessionError::NoCompletedRequest)?;
            self.log.lock().unwrap().push(format!("fetch {index}"));
            if self.failing.contains(&index) {
                return Err(SessionError::Backend(BackendError::Execution("boom".into())).into());
            }
            Ok(self.results.get(&index).cloned().unwrap_or_default())
        }

        fn labels(&self) -> &LabelMap {
            &self.labels
        }
    }

    /// Like [`ConstantVelocityFlow`], but tracking back towards an older
    /// frame lands `drift` pixels right of where the point started.
    struct DriftingFlow {
        velocity: f32,
        drift: f32,
    }

    impl FlowEstimator for DriftingFlow {
        fn estimate(&self, prev: &GrayImage, next: &GrayImage, points: &[Point2]) -> Vec<Option<Point2>> {
            let steps = next[[0, 0]] as f32 - prev[[0, 0]] as f32;
            let drift = if steps < 0.0 { self.drift } else { 0.0 };
            points
                .iter()
                .map(|p| Some(Point2::new(p.x + self.velocity * steps + drift, p.y)))
                .collect()
        }
    }

    /// One point at the centre of every region.
    struct CentreSelector;

    impl FeatureSelector for CentreSelector {
        fn select(&self, _image: &GrayImage, regions: &[BoundingBox], max_points: usize) -> Vec<Point2> {
            regions
                .iter()
                .map(|r| {
                    let (cx, cy) = r.center();
                    Point2::new(cx as f32, cy as f32)
                })
                .take(max_points)
                .collect()
        }
    }

    /// Frames carry their index as uniform intensity; points move by
    /// `velocity` per frame of index difference.
    struct ConstantVelocityFlow {
        velocity: (f32, f32),
    }

    impl FlowEstimator for ConstantVelocityFlow {
        fn estimate(&self, prev: &GrayImage, next: &GrayImage, points: &[Point2]) -> Vec<Option<Point2>> {
            let steps = next[[0, 0]] as f32 - prev[[0, 0]] as f32;
            points
                .iter()
                .map(|p| {
                    Some(Point2::new(
                        p.x + self.velocity.0 * steps,
                        p.y + self.velocity.1 * steps,
                    ))
                })
                .collect()
        }
    }

    fn frame(index: usize) -> Frame {
        Frame::new(vec![index as u8; 8 * 8 * 3], 8, 8, 3, index)
    }

    fn face(x: i32, y: i32) -> Detection {
        Detection::new(1, 0.9, BoundingBox::new(x, y, 20, 20))
    }

    fn controller(
        detector: Box<dyn FaceDetector>,
        velocity: (f32, f32),
        config: FusionConfig,
    ) -> FusionController {
        FusionController::new(
            detector,
            Box::new(CentreSelector),
            Box::new(ConstantVelocityFlow { velocity }),
            config,
        )
    }

    fn run(controller: &mut FusionController, frames: usize) -> Vec<FrameOutcome> {
        (0..frames)
            .map(|i| controller.process(&frame(i), i + 1 == frames).unwrap())
            .collect()
    }

    fn box_x(outcome: &FrameOutcome) -> Vec<i32> {
        outcome.detections.iter().map(|d| d.location.x).collect()
    }

    // ── Cycle structure ──

    #[test]
    fn test_ten_frames_cadence_five_static_scene() {
        let known = face(10, 10);
        let results = HashMap::from([(0, vec![known.clone()]), (5, vec![known.clone()])]);
        let detector = ScriptedDetector::new(results);
        let log = Arc::clone(&detector.log);
        let mut c = controller(Box::new(detector), (0.0, 0.0), FusionConfig::with_cadence(5));

        let outcomes = run(&mut c, 10);

        use FusionState::*;
        let states: Vec<FusionState> = outcomes.iter().map(|o| o.state).collect();
        assert_eq!(
            states,
            vec![
                DetectAndEnqueueNext,
                BufferForTrack,
                BufferForTrack,
                BufferForTrack,
                BufferForTrack,
                DetectAndEnqueueNext,
                BufferForTrack,
                BufferForTrack,
                BufferForTrack,
                TrackOnly,
            ]
        );

        // frame 0 has nothing to show yet
        assert!(outcomes[0].detections.is_empty());

        // frame 5 harvests the frame-0 result and backfills frames 1-4
        assert_eq!(outcomes[5].detections, vec![known.clone()]);
        let backfilled: Vec<usize> = outcomes[5].backfilled.iter().map(|b| b.frame_index).collect();
        assert_eq!(backfilled, vec![1, 2, 3, 4]);
        for b in &outcomes[5].backfilled {
            assert_eq!(b.detections, vec![known.clone()]);
        }
        assert_eq!(outcomes[5].points, vec![Point2::new(20.0, 20.0)]);

        // frame 9 tracks the remaining frames with the last known box
        assert_eq!(outcomes[9].detections, vec![known]);
        let tail: Vec<usize> = outcomes[9].backfilled.iter().map(|b| b.frame_index).collect();
        assert_eq!(tail, vec![6, 7, 8]);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["submit 0", "fetch 0", "submit 5"]
        );
        assert_eq!(c.buffered_frames(), 0);
    }

    #[test]
    fn test_buffer_is_empty_after_each_harvest() {
        let detector = ScriptedDetector::new(HashMap::from([(0, vec![face(5, 5)])]));
        let mut c = controller(Box::new(detector), (0.0, 0.0), FusionConfig::with_cadence(3));

        for i in 0..7 {
            let outcome = c.process(&frame(i), false).unwrap();
            if outcome.state == FusionState::DetectAndEnqueueNext {
                assert_eq!(c.buffered_frames(), 0, "frame {i}");
                assert!(c.has_pending_request());
            } else {
                assert!(c.buffered_frames() > 0);
            }
        }
    }

    #[test]
    fn test_last_frame_at_boundary_harvests_without_submitting() {
        let detector = ScriptedDetector::new(HashMap::from([(0, vec![face(5, 5)])]));
        let log = Arc::clone(&detector.log);
        let mut c = controller(Box::new(detector), (0.0, 0.0), FusionConfig::with_cadence(3));

        let outcomes = run(&mut c, 4);
        assert_eq!(outcomes[3].state, FusionState::DetectAndEnqueueNext);
        assert_eq!(box_x(&outcomes[3]), vec![5]);
        assert_eq!(*log.lock().unwrap(), vec!["submit 0", "fetch 0"]);
        assert!(!c.has_pending_request());
        assert!(c.finish().is_none());
    }

    // ── Tracking ──

    #[test]
    fn test_motion_is_applied_to_boxes_and_backfill() {
        let detector = ScriptedDetector::new(HashMap::from([(0, vec![face(10, 10)])]));
        let mut c = controller(Box::new(detector), (1.0, 0.0), FusionConfig::with_cadence(3));

        let outcomes: Vec<FrameOutcome> = (0..4).map(|i| c.process(&frame(i), false).unwrap()).collect();

        // detection from frame 0, tracked to frame 3
        assert_eq!(box_x(&outcomes[3]), vec![13]);
        assert_eq!(outcomes[3].points, vec![Point2::new(23.0, 20.0)]);
        let backfilled: Vec<(usize, i32)> = outcomes[3]
            .backfilled
            .iter()
            .map(|b| (b.frame_index, b.detections[0].location.x))
            .collect();
        assert_eq!(backfilled, vec![(1, 11), (2, 12)]);
    }

    #[test]
    fn test_offset_keeps_accumulating_between_detections() {
        // the second request finds nothing new, so boxes come from tracking
        let detector = ScriptedDetector::new(HashMap::from([(0, vec![face(10, 10)])]));
        let mut c = controller(Box::new(detector), (1.0, 0.0), FusionConfig::with_cadence(2));

        let outcomes = run(&mut c, 5);
        // frame 2 harvests frame 0's box (+2), frame 4 harvests an empty set
        assert_eq!(box_x(&outcomes[2]), vec![12]);
        assert!(outcomes[4].detections.is_empty());
    }

    #[test]
    fn test_all_below_threshold_gives_empty_sets() {
        let detector = ScriptedDetector::new(HashMap::new());
        let mut c = controller(Box::new(detector), (1.0, 1.0), FusionConfig::with_cadence(2));

        for outcome in run(&mut c, 7) {
            assert!(outcome.detections.is_empty());
            assert!(outcome.points.is_empty());
        }
    }

    #[test]
    fn test_failed_request_keeps_tracking_previous_boxes() {
        let mut detector = ScriptedDetector::new(HashMap::from([(0, vec![face(10, 10)])]));
        detector.failing.insert(3);
        let mut c = controller(Box::new(detector), (1.0, 0.0), FusionConfig::with_cadence(3));

        let outcomes: Vec<FrameOutcome> = (0..7).map(|i| c.process(&frame(i), false).unwrap()).collect();
        assert_eq!(box_x(&outcomes[3]), vec![13]);
        // frame 6 harvest fails: the frame-0 box keeps moving
        assert_eq!(outcomes[6].state, FusionState::DetectAndEnqueueNext);
        assert_eq!(box_x(&outcomes[6]), vec![16]);
    }

    #[test]
    fn test_configured_tolerance_decides_which_points_survive() {
        let make = |fb_tolerance: f32| {
            let detector = ScriptedDetector::new(HashMap::from([(0, vec![face(10, 10)])]));
            let config = FusionConfig {
                fb_tolerance,
                ..FusionConfig::with_cadence(2)
            };
            let mut c = FusionController::new(
                Box::new(detector),
                Box::new(CentreSelector),
                Box::new(DriftingFlow {
                    velocity: 1.0,
                    drift: 1.5,
                }),
                config,
            );
            (0..3)
                .map(|i| c.process(&frame(i), false).unwrap())
                .collect::<Vec<_>>()
        };

        // round trips miss by 1.5 px
        let strict = make(1.0);
        assert_eq!(box_x(&strict[2]), vec![10]);
        assert!(strict[2].points.is_empty());

        let loose = make(2.0);
        assert_eq!(box_x(&loose[2]), vec![12]);
        assert_eq!(loose[2].points, vec![Point2::new(22.0, 20.0)]);
    }

    // ── Request lifecycle ──

    #[test]
    fn test_failed_submit_keeps_tracking_from_harvest_frame() {
        let mut detector = ScriptedDetector::new(HashMap::from([(0, vec![face(10, 10)])]));
        detector.failing_submits.insert(3);
        let log = Arc::clone(&detector.log);
        let mut c = controller(Box::new(detector), (1.0, 0.0), FusionConfig::with_cadence(3));

        let outcomes: Vec<FrameOutcome> = (0..8).map(|i| c.process(&frame(i), false).unwrap()).collect();

        // frame 3 still harvests and backfills although its own submit fails
        assert_eq!(outcomes[3].state, FusionState::DetectAndEnqueueNext);
        assert_eq!(box_x(&outcomes[3]), vec![13]);
        let backfilled: Vec<(usize, i32)> = outcomes[3]
            .backfilled
            .iter()
            .map(|b| (b.frame_index, b.detections[0].location.x))
            .collect();
        assert_eq!(backfilled, vec![(1, 11), (2, 12)]);

        // the next cycle tracks on from frame 3 and submits again
        assert_eq!(outcomes[4].state, FusionState::BufferForTrack);
        assert_eq!(outcomes[6].state, FusionState::DetectAndEnqueueNext);
        assert_eq!(box_x(&outcomes[6]), vec![16]);
        let backfilled: Vec<(usize, i32)> = outcomes[6]
            .backfilled
            .iter()
            .map(|b| (b.frame_index, b.detections[0].location.x))
            .collect();
        assert_eq!(backfilled, vec![(4, 14), (5, 15)]);
        assert_eq!(box_x(&outcomes[7]), vec![16]);
        assert_eq!(*log.lock().unwrap(), vec!["submit 0", "fetch 0", "submit 6"]);
        assert!(c.has_pending_request());
    }

    #[test]
    fn test_pending_request_defers_harvest_until_buffer_fills() {
        let mut detector = ScriptedDetector::new(HashMap::from([(0, vec![face(10, 10)])]));
        detector.pending_polls = 100;
        let log = Arc::clone(&detector.log);
        let config = FusionConfig {
            max_buffered_frames: 4,
            ..FusionConfig::with_cadence(2)
        };
        let mut c = controller(Box::new(detector), (0.0, 0.0), config);

        let outcomes: Vec<FrameOutcome> = (0..6).map(|i| c.process(&frame(i), false).unwrap()).collect();
        let states: Vec<FusionState> = outcomes.iter().map(|o| o.state).collect();
        use FusionState::*;
        assert_eq!(
            states,
            vec![
                DetectAndEnqueueNext,
                BufferForTrack,
                BufferForTrack,
                BufferForTrack,
                BufferForTrack,
                DetectAndEnqueueNext,
            ]
        );
        let backfilled: Vec<usize> = outcomes[5].backfilled.iter().map(|b| b.frame_index).collect();
        assert_eq!(backfilled, vec![1, 2, 3, 4]);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["submit 0", "wait", "fetch 0", "submit 5"]
        );
    }

    #[test]
    fn test_sync_detector_is_harvested_on_cadence() {
        let mut detector = ScriptedDetector::new(HashMap::from([(0, vec![face(10, 10)])]));
        detector.asynchronous = false;
        let mut c = controller(Box::new(detector), (0.0, 0.0), FusionConfig::with_cadence(2));

        let outcomes = run(&mut c, 3);
        assert_eq!(outcomes[2].state, FusionState::DetectAndEnqueueNext);
        assert_eq!(box_x(&outcomes[2]), vec![10]);
    }

    #[test]
    fn test_disabled_detector_only_cycles() {
        let mut c = controller(
            Box::new(DisabledFaceDetector::new()),
            (1.0, 0.0),
            FusionConfig::with_cadence(2),
        );
        let outcomes = run(&mut c, 5);
        assert!(outcomes.iter().all(|o| o.detections.is_empty()));
        assert_eq!(outcomes[2].state, FusionState::DetectAndEnqueueNext);
        assert!(!c.has_pending_request());
    }

    #[test]
    fn test_phase_timings_reported_on_harvest() {
        let detector = ScriptedDetector::new(HashMap::from([(0, vec![face(10, 10)])]));
        let mut c = controller(Box::new(detector), (0.0, 0.0), FusionConfig::with_cadence(2));

        let outcomes = run(&mut c, 3);
        let phases: Vec<&str> = outcomes[2].phase_timings.iter().map(|(p, _)| *p).collect();
        assert!(phases.contains(&PHASE_DETECTION));
        assert!(phases.contains(&PHASE_KEYPOINTS));
        assert!(phases.contains(&PHASE_TRACKER));
    }

    // ── Live tracking and end of stream ──

    #[test]
    fn test_live_tracking_moves_displayed_boxes_only() {
        let make = |live_tracking: bool| {
            let results = HashMap::from([(0, vec![face(10, 10)]), (3, vec![face(30, 10)])]);
            let detector = ScriptedDetector::new(results);
            let config = FusionConfig {
                live_tracking,
                ..FusionConfig::with_cadence(3)
            };
            let mut c = controller(Box::new(detector), (1.0, 0.0), config);
            (0..8)
                .map(|i| c.process(&frame(i), false).unwrap())
                .collect::<Vec<_>>()
        };

        let without = make(false);
        let with = make(true);
        // frame 4 is buffered behind the frame-3 request
        assert_eq!(box_x(&without[4]), vec![13]);
        assert_eq!(box_x(&with[4]), vec![14]);
        assert_eq!(box_x(&with[5]), vec![15]);
        // harvests agree regardless of the live estimate
        assert_eq!(box_x(&without[6]), vec![33]);
        assert_eq!(box_x(&with[6]), vec![33]);
    }

    #[test]
    fn test_finish_tracks_remaining_frames() {
        let detector = ScriptedDetector::new(HashMap::from([(0, vec![face(10, 10)])]));
        let mut c = controller(Box::new(detector), (1.0, 0.0), FusionConfig::with_cadence(3));
        for i in 0..6 {
            c.process(&frame(i), false).unwrap();
        }

        let outcome = c.finish().unwrap();
        assert_eq!(outcome.state, FusionState::TrackOnly);
        assert_eq!(outcome.frame_index, 5);
        // harvested at frame 3 with x = 13, then two more frames
        assert_eq!(box_x(&outcome), vec![15]);
        assert_eq!(c.buffered_frames(), 0);
        assert!(c.finish().is_none());
    }
}
