use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Instant;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::label_map::LabelMap;
use crate::fusion::frame_outcome::{FrameOutcome, FusionState};
use crate::fusion::fusion_controller::FusionController;
use crate::shared::constants::{PHASE_DECODING, PHASE_TOTAL, PHASE_VISUALIZATION};
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;
use crate::video::domain::overlay::Overlay;
use crate::video::domain::overlay_sink::OverlaySink;

use super::pipeline_logger::PipelineLogger;

/// Counts reported once a stream has been processed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackSummary {
    pub frames: usize,
    pub detection_cycles: usize,
}

/// Drives a frame source through the fusion controller into an overlay sink.
///
/// Frames buffered behind an outstanding detection are held back and
/// presented once their tracked boxes are known, so the sink always sees
/// frames in index order with corrected positions.
pub struct TrackFacesUseCase {
    source: Box<dyn FrameSource>,
    controller: FusionController,
    sink: Box<dyn OverlaySink>,
    logger: Box<dyn PipelineLogger>,
    report_perf_counts: bool,
    pending: VecDeque<(Frame, Overlay)>,
}

impl TrackFacesUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        controller: FusionController,
        sink: Box<dyn OverlaySink>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            source,
            controller,
            sink,
            logger,
            report_perf_counts: false,
            pending: VecDeque::new(),
        }
    }

    /// Logs the detector's backend counters after the run.
    pub fn with_perf_counts(mut self, enabled: bool) -> Self {
        self.report_perf_counts = enabled;
        self
    }

    pub fn execute(&mut self, input: &Path) -> Result<TrackSummary, Box<dyn std::error::Error>> {
        let metadata = self.source.open(input)?;
        let total = metadata.total_frames;
        let labels = self.controller.detector().labels().clone();
        self.logger.info(&format!(
            "Tracking faces in {} ({}x{}) with {} detector",
            input.display(),
            metadata.width,
            metadata.height,
            self.controller.detector().name()
        ));

        let decode_started = Instant::now();
        let first = match self.source.read() {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Err(format!("failed to read the first frame: {e}").into()),
            None => return Err(format!("{} contains no frames", input.display()).into()),
        };
        self.logger.timing(PHASE_DECODING, decode_started.elapsed());

        let mut summary = TrackSummary::default();
        let mut next = Some(first);
        while let Some(frame) = next.take() {
            let frame_started = Instant::now();

            let decode_started = Instant::now();
            next = match self.source.read() {
                Some(Ok(frame)) => Some(frame),
                Some(Err(e)) => {
                    log::warn!("Stopping after frame {}: {e}", frame.index());
                    None
                }
                None => None,
            };
            self.logger.timing(PHASE_DECODING, decode_started.elapsed());

            let outcome = self.controller.process(&frame, next.is_none())?;
            if outcome.state == FusionState::DetectAndEnqueueNext {
                summary.detection_cycles += 1;
            }
            summary.frames += 1;
            self.handle_outcome(Some(frame), outcome, &labels)?;

            self.logger.timing(PHASE_TOTAL, frame_started.elapsed());
            self.logger.progress(summary.frames, total);
        }

        if let Some(outcome) = self.controller.finish() {
            self.handle_outcome(None, outcome, &labels)?;
        }
        self.flush_pending()?;
        self.sink.finish()?;
        self.source.close();

        if self.report_perf_counts {
            self.log_perf_counts();
        }
        self.logger.summary();
        Ok(summary)
    }

    fn handle_outcome(
        &mut self,
        frame: Option<Frame>,
        outcome: FrameOutcome,
        labels: &LabelMap,
    ) -> Result<(), Box<dyn std::error::Error>> {
        for (phase, elapsed) in &outcome.phase_timings {
            self.logger.timing(phase, *elapsed);
        }
        self.logger
            .metric("buffered_frames", self.controller.buffered_frames() as f64);
        self.logger.metric("tracked_points", outcome.points.len() as f64);

        let overlay = Overlay::new(
            outcome.frame_index,
            outcome.state,
            &outcome.detections,
            &outcome.points,
            labels,
        );

        if outcome.state == FusionState::BufferForTrack {
            if let Some(frame) = frame {
                self.pending.push_back((frame, overlay));
            }
            return Ok(());
        }

        let corrected: HashMap<usize, &[Detection]> = outcome
            .backfilled
            .iter()
            .map(|b| (b.frame_index, b.detections.as_slice()))
            .collect();
        while let Some((held, mut held_overlay)) = self.pending.pop_front() {
            if held.index() == outcome.frame_index {
                held_overlay = overlay.clone();
            } else if let Some(detections) = corrected.get(&held.index()) {
                held_overlay = Overlay::new(held.index(), held_overlay.state, detections, &[], labels);
            }
            self.present(&held, &held_overlay)?;
        }
        if let Some(frame) = frame {
            self.present(&frame, &overlay)?;
        }
        Ok(())
    }

    fn flush_pending(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        while let Some((frame, overlay)) = self.pending.pop_front() {
            self.present(&frame, &overlay)?;
        }
        Ok(())
    }

    fn present(&mut self, frame: &Frame, overlay: &Overlay) -> Result<(), Box<dyn std::error::Error>> {
        let started = Instant::now();
        self.sink.present(frame, overlay)?;
        self.logger.timing(PHASE_VISUALIZATION, started.elapsed());
        Ok(())
    }

    fn log_perf_counts(&mut self) {
        let counts = self.controller.detector().performance_counts();
        if counts.is_empty() {
            self.logger.info("No performance counters reported by the detector");
            return;
        }
        for counter in counts {
            let avg_us = if counter.calls > 0 {
                counter.total_us / counter.calls
            } else {
                0
            };
            self.logger.info(&format!(
                "{}: {} calls, avg {avg_us}us, last {}us, total {}us",
                counter.name, counter.calls, counter.last_us, counter.total_us
            ));
        }
    }
}
