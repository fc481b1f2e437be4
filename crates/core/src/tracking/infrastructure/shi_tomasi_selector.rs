use ndarray::Array2;

use crate::shared::constants::{
    DEFAULT_CORNER_BLOCK_SIZE, DEFAULT_CORNER_QUALITY, DEFAULT_MIN_CORNER_DISTANCE,
};
use crate::shared::frame::GrayImage;
use crate::shared::geometry::{BoundingBox, Point2};
use crate::tracking::domain::feature_selector::{region_mask, FeatureSelector};

/// Corner selection parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CornerConfig {
    /// Fraction of the strongest response a corner must exceed.
    pub quality_level: f64,
    pub min_distance: f64,
    pub block_size: usize,
}

impl Default for CornerConfig {
    fn default() -> Self {
        Self {
            quality_level: DEFAULT_CORNER_QUALITY,
            min_distance: DEFAULT_MIN_CORNER_DISTANCE,
            block_size: DEFAULT_CORNER_BLOCK_SIZE,
        }
    }
}

/// "Good features to track": minimum-eigenvalue corners, thresholded
/// against the strongest masked response, non-maximum suppressed and
/// spaced greedily strongest first.
#[derive(Clone, Debug, Default)]
pub struct ShiTomasiSelector {
    config: CornerConfig,
}

impl ShiTomasiSelector {
    pub fn new(config: CornerConfig) -> Self {
        Self { config }
    }
}

impl FeatureSelector for ShiTomasiSelector {
    fn select(&self, image: &GrayImage, regions: &[BoundingBox], max_points: usize) -> Vec<Point2> {
        let (height, width) = image.dim();
        if max_points == 0 || regions.is_empty() || width < 3 || height < 3 {
            return Vec::new();
        }

        let mask = region_mask(width, height, regions);
        let response = min_eigen_response(image, self.config.block_size);

        let max_response = response
            .indexed_iter()
            .filter(|((y, x), _)| mask[y * width + x])
            .map(|(_, &r)| r)
            .fold(0.0f32, f32::max);
        if max_response <= 0.0 {
            return Vec::new();
        }
        let threshold = max_response * self.config.quality_level as f32;

        let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let r = response[[y, x]];
                if !mask[y * width + x] || r <= threshold || !is_local_maximum(&response, x, y) {
                    continue;
                }
                candidates.push((r, x, y));
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let min_dist_sq = (self.config.min_distance * self.config.min_distance) as f32;
        let mut selected: Vec<Point2> = Vec::with_capacity(max_points);
        for (_, x, y) in candidates {
            let p = Point2::new(x as f32, y as f32);
            let spaced = selected.iter().all(|q| {
                let (dx, dy) = (p.x - q.x, p.y - q.y);
                dx * dx + dy * dy >= min_dist_sq
            });
            if spaced {
                selected.push(p);
                if selected.len() == max_points {
                    break;
                }
            }
        }
        selected
    }
}

/// Smaller eigenvalue of the Sobel structure tensor summed over a
/// `block_size` window around each pixel.
fn min_eigen_response(image: &GrayImage, block_size: usize) -> Array2<f32> {
    let (height, width) = image.dim();
    let px = |x: isize, y: isize| -> f32 {
        let x = x.clamp(0, width as isize - 1) as usize;
        let y = y.clamp(0, height as isize - 1) as usize;
        f32::from(image[[y, x]])
    };

    let mut ixx = Array2::<f32>::zeros((height, width));
    let mut ixy = Array2::<f32>::zeros((height, width));
    let mut iyy = Array2::<f32>::zeros((height, width));
    for y in 0..height as isize {
        for x in 0..width as isize {
            let gx = (px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x - 1, y) + px(x - 1, y + 1));
            let gy = (px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x, y - 1) + px(x + 1, y - 1));
            let idx = [y as usize, x as usize];
            ixx[idx] = gx * gx;
            ixy[idx] = gx * gy;
            iyy[idx] = gy * gy;
        }
    }

    let half = (block_size.max(1) / 2) as isize;
    Array2::from_shape_fn((height, width), |(y, x)| {
        let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
        for dy in -half..=half {
            for dx in -half..=half {
                let sy = (y as isize + dy).clamp(0, height as isize - 1) as usize;
                let sx = (x as isize + dx).clamp(0, width as isize - 1) as usize;
                a += ixx[[sy, sx]];
                b += ixy[[sy, sx]];
                c += iyy[[sy, sx]];
            }
        }
        ((a + c) - ((a - c).powi(2) + 4.0 * b * b).sqrt()) / 2.0
    })
}

fn is_local_maximum(response: &Array2<f32>, x: usize, y: usize) -> bool {
    let r = response[[y, x]];
    (y - 1..=y + 1).all(|ny| (x - 1..=x + 1).all(|nx| response[[ny, nx]] <= r))
}
