use serde::Serialize;

/// A 2D pixel position with sub-pixel precision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Chebyshev (L∞) distance, the metric used by the forward-backward check.
    pub fn max_abs_diff(&self, other: &Point2) -> f32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// Axis-aligned rectangle in integer pixel coordinates.
///
/// `(x, y)` is the top-left corner. Coordinates may lie outside the frame;
/// consumers that index pixels clamp with [`BoundingBox::clamped`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Integer center, rounding toward the top-left like `x + w / 2`.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Makes the box square and scales its side by `coefficient`, keeping
    /// the original center.
    ///
    /// The new side is `coefficient * max(width, height)`, truncated.
    pub fn square_and_enlarge(&self, coefficient: f64) -> BoundingBox {
        let (cx, cy) = self.center();
        let side = (coefficient * self.width.max(self.height) as f64) as i32;
        BoundingBox {
            x: cx - side / 2,
            y: cy - side / 2,
            width: side,
            height: side,
        }
    }

    /// Shifts the box by whole pixels; size is unchanged.
    pub fn translated(&self, dx: i32, dy: i32) -> BoundingBox {
        BoundingBox {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Intersection with `[0, width) x [0, height)`, or `None` when empty.
    pub fn clamped(&self, width: u32, height: u32) -> Option<BoundingBox> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.right().min(width as i32);
        let y2 = self.bottom().min(height as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(BoundingBox::new(x1, y1, x2 - x1, y2 - y1))
    }

    pub fn contains(&self, point: &Point2) -> bool {
        point.x >= self.x as f32
            && point.y >= self.y as f32
            && point.x < self.right() as f32
            && point.y < self.bottom() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_center_truncates_half_pixels() {
        assert_eq!(BoundingBox::new(10, 20, 31, 41).center(), (25, 40));
    }

    #[rstest]
    #[case::wide(BoundingBox::new(100, 100, 80, 40))]
    #[case::tall(BoundingBox::new(50, 10, 30, 90))]
    #[case::square(BoundingBox::new(0, 0, 64, 64))]
    #[case::odd_sizes(BoundingBox::new(7, 13, 33, 21))]
    fn test_square_and_enlarge_keeps_center(#[case] b: BoundingBox) {
        let enlarged = b.square_and_enlarge(1.2);
        let expected_side = (1.2 * b.width.max(b.height) as f64) as i32;
        assert_eq!(enlarged.width, expected_side);
        assert_eq!(enlarged.height, expected_side);

        let (cx, cy) = b.center();
        let (ex, ey) = enlarged.center();
        assert!((cx - ex).abs() <= 1);
        assert!((cy - ey).abs() <= 1);
    }

    #[test]
    fn test_square_and_enlarge_unit_coefficient_only_squares() {
        let b = BoundingBox::new(10, 10, 40, 20).square_and_enlarge(1.0);
        assert_eq!(b, BoundingBox::new(10, 0, 40, 40));
    }

    #[test]
    fn test_translated_preserves_size() {
        let b = BoundingBox::new(5, 5, 10, 12).translated(-3, 4);
        assert_eq!(b, BoundingBox::new(2, 9, 10, 12));
    }

    #[test]
    fn test_clamped_inside_frame_is_identity() {
        let b = BoundingBox::new(10, 10, 20, 20);
        assert_eq!(b.clamped(100, 100), Some(b));
    }

    #[test]
    fn test_clamped_cuts_at_edges() {
        let b = BoundingBox::new(-10, 90, 30, 30);
        assert_eq!(b.clamped(100, 100), Some(BoundingBox::new(0, 90, 20, 10)));
    }

    #[test]
    fn test_clamped_outside_frame_is_none() {
        assert!(BoundingBox::new(200, 200, 10, 10).clamped(100, 100).is_none());
    }

    #[test]
    fn test_contains_is_half_open() {
        let b = BoundingBox::new(0, 0, 10, 10);
        assert!(b.contains(&Point2::new(0.0, 9.5)));
        assert!(!b.contains(&Point2::new(10.0, 5.0)));
    }

    #[test]
    fn test_max_abs_diff_takes_larger_axis() {
        let a = Point2::new(1.0, 1.0);
        let b = Point2::new(1.5, -0.25);
        assert_relative_eq!(a.max_abs_diff(&b), 1.25);
    }
}
