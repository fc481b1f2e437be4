use crate::shared::frame::GrayImage;
use crate::shared::geometry::Point2;

/// Sparse optical flow between two grayscale frames.
pub trait FlowEstimator: Send {
    /// Position of each of `points` in `next`, in input order. `None` marks
    /// a point the estimator lost.
    fn estimate(&self, prev: &GrayImage, next: &GrayImage, points: &[Point2]) -> Vec<Option<Point2>>;
}
