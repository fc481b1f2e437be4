use ndarray::Array2;

use crate::shared::frame::GrayImage;

/// Floating-point single-channel image in (row, column) order.
pub type FloatImage = Array2<f32>;

const PYRAMID_KERNEL_SIZE: usize = 5;

/// Coarsest level kept; smaller images carry no usable texture.
const MIN_LEVEL_SIDE: usize = 8;

/// One pyramid level with its spatial derivatives.
#[derive(Clone, Debug)]
pub struct PyramidLevel {
    pub image: FloatImage,
    pub grad_x: FloatImage,
    pub grad_y: FloatImage,
}

impl PyramidLevel {
    fn new(image: FloatImage) -> Self {
        let (grad_x, grad_y) = central_gradients(&image);
        Self {
            image,
            grad_x,
            grad_y,
        }
    }

    pub fn width(&self) -> usize {
        self.image.ncols()
    }

    pub fn height(&self) -> usize {
        self.image.nrows()
    }
}

/// Gaussian pyramid, level 0 at full resolution, each next level half the
/// size of the previous one.
#[derive(Clone, Debug)]
pub struct ImagePyramid {
    levels: Vec<PyramidLevel>,
}

impl ImagePyramid {
    /// Builds up to `extra_levels` levels above the base image, stopping
    /// early once a level would drop below 8 pixels on a side.
    pub fn build(image: &GrayImage, extra_levels: usize) -> Self {
        let kernel = gaussian_kernel_1d(PYRAMID_KERNEL_SIZE);
        let mut current = image.mapv(f32::from);
        let mut levels = Vec::with_capacity(extra_levels + 1);
        for _ in 0..extra_levels {
            let (h, w) = current.dim();
            if h / 2 < MIN_LEVEL_SIDE || w / 2 < MIN_LEVEL_SIDE {
                break;
            }
            let next = downsample(&current, &kernel);
            levels.push(PyramidLevel::new(current));
            current = next;
        }
        levels.push(PyramidLevel::new(current));
        Self { levels }
    }

    pub fn levels(&self) -> &[PyramidLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Precompute a 1D Gaussian kernel of the given size.
///
/// `kernel_size` must be odd and >= 1. Sigma is derived as `kernel_size / 6.0`.
pub fn gaussian_kernel_1d(kernel_size: usize) -> Vec<f32> {
    debug_assert!(kernel_size >= 1 && kernel_size % 2 == 1);
    let sigma = kernel_size as f64 / 6.0;
    let half = (kernel_size / 2) as f64;
    let weights: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - half;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|&v| (v / sum) as f32).collect()
}

/// Separable blur with replicated borders.
pub fn separable_blur(image: &FloatImage, kernel: &[f32]) -> FloatImage {
    let (height, width) = image.dim();
    if kernel.len() <= 1 || width == 0 || height == 0 {
        return image.clone();
    }
    let half = (kernel.len() / 2) as isize;

    let horizontal = Array2::from_shape_fn((height, width), |(y, x)| {
        kernel
            .iter()
            .enumerate()
            .map(|(k, &w)| {
                let sx = (x as isize + k as isize - half).clamp(0, width as isize - 1) as usize;
                image[[y, sx]] * w
            })
            .sum::<f32>()
    });

    Array2::from_shape_fn((height, width), |(y, x)| {
        kernel
            .iter()
            .enumerate()
            .map(|(k, &w)| {
                let sy = (y as isize + k as isize - half).clamp(0, height as isize - 1) as usize;
                horizontal[[sy, x]] * w
            })
            .sum::<f32>()
    })
}

/// Blurs and keeps every second row and column.
pub fn downsample(image: &FloatImage, kernel: &[f32]) -> FloatImage {
    let blurred = separable_blur(image, kernel);
    let (height, width) = image.dim();
    Array2::from_shape_fn((height.div_ceil(2), width.div_ceil(2)), |(y, x)| {
        blurred[[y * 2, x * 2]]
    })
}

/// Central differences, one-sided at the borders.
pub fn central_gradients(image: &FloatImage) -> (FloatImage, FloatImage) {
    let (height, width) = image.dim();
    let grad_x = Array2::from_shape_fn((height, width), |(y, x)| {
        let left = x.saturating_sub(1);
        let right = (x + 1).min(width - 1);
        let span = (right - left).max(1) as f32;
        (image[[y, right]] - image[[y, left]]) / span
    });
    let grad_y = Array2::from_shape_fn((height, width), |(y, x)| {
        let up = y.saturating_sub(1);
        let down = (y + 1).min(height - 1);
        let span = (down - up).max(1) as f32;
        (image[[down, x]] - image[[up, x]]) / span
    });
    (grad_x, grad_y)
}

/// Bilinear sample at sub-pixel `(x, y)`, clamping to the border.
pub fn sample_bilinear(image: &FloatImage, x: f32, y: f32) -> f32 {
    let (height, width) = image.dim();
    let x = x.clamp(0.0, (width - 1) as f32);
    let y = y.clamp(0.0, (height - 1) as f32);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    image[[y0, x0]] * (1.0 - fx) * (1.0 - fy)
        + image[[y0, x1]] * fx * (1.0 - fy)
        + image[[y1, x0]] * (1.0 - fx) * fy
        + image[[y1, x1]] * fx * fy
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kernel_sums_to_one() {
        let k = gaussian_kernel_1d(5);
        let sum: f32 = k.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_kernel_is_symmetric_with_peak_in_centre() {
        let k = gaussian_kernel_1d(5);
        assert_relative_eq!(k[0], k[4], epsilon = 1e-6);
        assert_relative_eq!(k[1], k[3], epsilon = 1e-6);
        assert!(k[2] > k[1] && k[1] > k[0]);
    }

    #[test]
    fn test_blur_keeps_uniform_image() {
        let image = Array2::from_elem((6, 6), 42.0f32);
        let blurred = separable_blur(&image, &gaussian_kernel_1d(5));
        assert!(blurred.iter().all(|&v| (v - 42.0).abs() < 1e-4));
    }

    #[test]
    fn test_downsample_halves_rounding_up() {
        let image = Array2::zeros((9, 16));
        assert_eq!(downsample(&image, &gaussian_kernel_1d(5)).dim(), (5, 8));
    }

    #[test]
    fn test_pyramid_stops_at_minimum_side() {
        let image: GrayImage = Array2::zeros((40, 64));
        let pyramid = ImagePyramid::build(&image, 5);
        // 40x64 -> 20x32 -> 10x16, then 5 would be too small
        assert_eq!(pyramid.len(), 3);
        assert_eq!(pyramid.levels()[2].height(), 10);
        assert_eq!(pyramid.levels()[2].width(), 16);
    }

    #[test]
    fn test_zero_extra_levels_is_base_only() {
        let image: GrayImage = Array2::zeros((40, 64));
        assert_eq!(ImagePyramid::build(&image, 0).len(), 1);
    }

    #[test]
    fn test_gradients_of_ramp() {
        let image = Array2::from_shape_fn((4, 5), |(y, x)| (2 * x + 3 * y) as f32);
        let (gx, gy) = central_gradients(&image);
        assert_relative_eq!(gx[[1, 2]], 2.0);
        assert_relative_eq!(gy[[1, 2]], 3.0);
        // one-sided at the border
        assert_relative_eq!(gx[[0, 0]], 2.0);
        assert_relative_eq!(gy[[3, 4]], 3.0);
    }

    #[test]
    fn test_bilinear_interpolates_and_clamps() {
        let image = Array2::from_shape_fn((2, 2), |(y, x)| (10 * x + 20 * y) as f32);
        assert_relative_eq!(sample_bilinear(&image, 0.5, 0.5), 15.0);
        assert_relative_eq!(sample_bilinear(&image, -3.0, 0.0), 0.0);
        assert_relative_eq!(sample_bilinear(&image, 5.0, 5.0), 30.0);
    }
}
