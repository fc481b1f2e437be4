use std::ops::AddAssign;

use serde::Serialize;

use crate::shared::frame::GrayImage;
use crate::shared::geometry::Point2;

use super::flow_estimator::FlowEstimator;
use super::frame_ring_buffer::FrameRingBuffer;

/// Sub-pixel translation accumulated by the tracker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Displacement {
    pub dx: f32,
    pub dy: f32,
}

impl Displacement {
    pub fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }

    /// Whole-pixel shift for integer boxes.
    pub fn rounded(&self) -> (i32, i32) {
        (self.dx.round() as i32, self.dy.round() as i32)
    }
}

impl AddAssign for Displacement {
    fn add_assign(&mut self, other: Self) {
        self.dx += other.dx;
        self.dy += other.dy;
    }
}

/// Forward-backward validated point tracking with a consensus translation.
pub struct OpticalFlowTracker {
    estimator: Box<dyn FlowEstimator>,
    fb_tolerance: f32,
}

impl OpticalFlowTracker {
    pub fn new(estimator: Box<dyn FlowEstimator>, fb_tolerance: f32) -> Self {
        Self {
            estimator,
            fb_tolerance,
        }
    }

    /// Tracks `points` from `prev` to `next`.
    ///
    /// Points failing the forward-backward check are removed; survivors are
    /// replaced by their positions in `next`. Returns the mean displacement
    /// of the survivors, or `None` when none survive.
    pub fn track_pair(
        &self,
        prev: &GrayImage,
        next: &GrayImage,
        points: &mut Vec<Point2>,
    ) -> Option<Displacement> {
        if points.is_empty() {
            return None;
        }

        let forward = self.estimator.estimate(prev, next, points);
        let starts: Vec<Point2> = forward
            .iter()
            .zip(points.iter())
            .map(|(f, p)| f.unwrap_or(*p))
            .collect();
        let backward = self.estimator.estimate(next, prev, &starts);

        let survivors = forward_backward_filter(points, &forward, &backward, self.fb_tolerance);
        let displacement = mean_displacement(&survivors);
        log::debug!(
            "Tracked {} of {} points, displacement {:?}",
            survivors.len(),
            points.len(),
            displacement
        );
        *points = survivors.into_iter().map(|(_, next)| next).collect();
        displacement
    }

    /// Runs [`track_pair`](Self::track_pair) across every adjacent pair in
    /// `buffer` and returns the summed displacement. Each entry of the
    /// returned list is the running total after that pair.
    pub fn track_buffer(
        &self,
        buffer: &FrameRingBuffer,
        points: &mut Vec<Point2>,
    ) -> Vec<Displacement> {
        let mut total = Displacement::default();
        let mut running = Vec::with_capacity(buffer.len().saturating_sub(1));
        buffer.for_each_consecutive_pair(|prev, next| {
            if let Some(step) = self.track_pair(&prev.gray, &next.gray, points) {
                total += step;
            }
            running.push(total);
        });
        running
    }
}

/// `(original, forward)` pairs for the points whose round trip lands within
/// `tolerance` (L∞) of where they started. Points lost in either direction
/// are dropped.
pub fn forward_backward_filter(
    original: &[Point2],
    forward: &[Option<Point2>],
    backward: &[Option<Point2>],
    tolerance: f32,
) -> Vec<(Point2, Point2)> {
    original
        .iter()
        .zip(forward.iter())
        .zip(backward.iter())
        .filter_map(|((orig, fwd), back)| {
            let (fwd, back) = ((*fwd)?, (*back)?);
            (orig.max_abs_diff(&back) <= tolerance).then_some((*orig, fwd))
        })
        .collect()
}

pub fn mean_displacement(pairs: &[(Point2, Point2)]) -> Option<Displacement> {
    if pairs.is_empty() {
        return None;
    }
    let n = pairs.len() as f32;
    let (sx, sy) = pairs
        .iter()
        .fold((0.0f32, 0.0f32), |(sx, sy), (from, to)| {
            (sx + (to.x - from.x), sy + (to.y - from.y))
        });
    Some(Displacement::new(sx / n, sy / n))
}
