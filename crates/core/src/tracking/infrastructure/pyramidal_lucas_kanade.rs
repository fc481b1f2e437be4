use crate::shared::constants::{
    DEFAULT_FLOW_EPSILON, DEFAULT_FLOW_ITERATIONS, DEFAULT_FLOW_WINDOW, DEFAULT_PYRAMID_LEVELS,
};
use crate::shared::frame::GrayImage;
use crate::shared::geometry::Point2;
use crate::tracking::domain::flow_estimator::FlowEstimator;

use super::image_pyramid::{sample_bilinear, ImagePyramid, PyramidLevel};

/// Smallest mean per-pixel eigenvalue of the gradient matrix (intensity²)
/// for a window to be considered trackable.
const MIN_EIGEN_THRESHOLD: f32 = 0.1;

/// Lucas-Kanade parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlowConfig {
    /// Side of the square integration window; even values grow by one.
    pub window_size: usize,
    pub max_iterations: usize,
    /// Stop iterating once an update moves the estimate less than this.
    pub epsilon: f32,
    /// Pyramid levels above full resolution.
    pub pyramid_levels: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_FLOW_WINDOW,
            max_iterations: DEFAULT_FLOW_ITERATIONS,
            epsilon: DEFAULT_FLOW_EPSILON,
            pyramid_levels: DEFAULT_PYRAMID_LEVELS,
        }
    }
}

/// Coarse-to-fine iterative Lucas-Kanade.
#[derive(Clone, Debug, Default)]
pub struct PyramidalLucasKanade {
    config: FlowConfig,
}

impl PyramidalLucasKanade {
    pub fn new(config: FlowConfig) -> Self {
        Self { config }
    }

    fn half_window(&self) -> isize {
        (self.config.window_size / 2).max(1) as isize
    }

    fn track_point(&self, prev: &ImagePyramid, next: &ImagePyramid, point: Point2) -> Option<Point2> {
        let half = self.half_window();
        let mut guess = (0.0f32, 0.0f32);

        for (level, (prev_level, next_level)) in prev
            .levels()
            .iter()
            .zip(next.levels())
            .enumerate()
            .rev()
        {
            let scale = (1u32 << level) as f32;
            let at = (point.x / scale, point.y / scale);
            let step = match self.refine(prev_level, next_level, at, guess, half) {
                Some(step) => step,
                None if level == 0 => return None,
                None => (0.0, 0.0),
            };
            guess = if level > 0 {
                (2.0 * (guess.0 + step.0), 2.0 * (guess.1 + step.1))
            } else {
                (guess.0 + step.0, guess.1 + step.1)
            };
        }

        let tracked = Point2::new(point.x + guess.0, point.y + guess.1);
        let base = &next.levels()[0];
        let inside = tracked.x >= 0.0
            && tracked.y >= 0.0
            && tracked.x <= (base.width() - 1) as f32
            && tracked.y <= (base.height() - 1) as f32;
        (inside && tracked.x.is_finite() && tracked.y.is_finite()).then_some(tracked)
    }

    /// Iterative refinement on one level. Returns the residual flow on top
    /// of `guess`, or `None` when the window is untrackable.
    fn refine(
        &self,
        prev: &PyramidLevel,
        next: &PyramidLevel,
        at: (f32, f32),
        guess: (f32, f32),
        half: isize,
    ) -> Option<(f32, f32)> {
        let (w, h) = (prev.width() as f32, prev.height() as f32);
        let margin = half as f32;
        if at.0 < -margin || at.1 < -margin || at.0 >= w + margin || at.1 >= h + margin {
            return None;
        }

        let side = (2 * half + 1) as usize;
        let mut template = Vec::with_capacity(side * side);
        let (mut gxx, mut gxy, mut gyy) = (0.0f32, 0.0f32, 0.0f32);
        for dy in -half..=half {
            for dx in -half..=half {
                let x = at.0 + dx as f32;
                let y = at.1 + dy as f32;
                let ix = sample_bilinear(&prev.grad_x, x, y);
                let iy = sample_bilinear(&prev.grad_y, x, y);
                gxx += ix * ix;
                gxy += ix * iy;
                gyy += iy * iy;
                template.push((sample_bilinear(&prev.image, x, y), ix, iy));
            }
        }

        let area = (side * side) as f32;
        let trace = gxx + gyy;
        let det = gxx * gyy - gxy * gxy;
        let min_eigen = (trace - ((gxx - gyy).powi(2) + 4.0 * gxy * gxy).sqrt()) / 2.0;
        if min_eigen / area < MIN_EIGEN_THRESHOLD || det < f32::EPSILON {
            return None;
        }

        let mut flow = (0.0f32, 0.0f32);
        for _ in 0..self.config.max_iterations {
            let cx = at.0 + guess.0 + flow.0;
            let cy = at.1 + guess.1 + flow.1;
            if cx < -margin || cy < -margin || cx >= w + margin || cy >= h + margin {
                return None;
            }

            let (mut bx, mut by) = (0.0f32, 0.0f32);
            let mut samples = template.iter();
            for dy in -half..=half {
                for dx in -half..=half {
                    let Some(&(value, ix, iy)) = samples.next() else {
                        break;
                    };
                    let diff = value - sample_bilinear(&next.image, cx + dx as f32, cy + dy as f32);
                    bx += diff * ix;
                    by += diff * iy;
                }
            }

            let step_x = (gyy * bx - gxy * by) / det;
            let step_y = (gxx * by - gxy * bx) / det;
            flow.0 += step_x;
            flow.1 += step_y;
            if step_x * step_x + step_y * step_y <= self.config.epsilon * self.config.epsilon {
                break;
            }
        }
        Some(flow)
    }
}

impl FlowEstimator for PyramidalLucasKanade {
    fn estimate(&self, prev: &GrayImage, next: &GrayImage, points: &[Point2]) -> Vec<Option<Point2>> {
        if points.is_empty() || prev.dim() != next.dim() || prev.is_empty() {
            return vec![None; points.len()];
        }
        let prev_pyramid = ImagePyramid::build(prev, self.config.pyramid_levels);
        let next_pyramid = ImagePyramid::build(next, self.config.pyramid_levels);
        points
            .iter()
            .map(|&p| self.track_point(&prev_pyramid, &next_pyramid, p))
            .collect()
    }
}
