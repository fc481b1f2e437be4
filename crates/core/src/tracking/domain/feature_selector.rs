use crate::shared::frame::GrayImage;
use crate::shared::geometry::{BoundingBox, Point2};

/// Picks trackable points inside a set of regions.
pub trait FeatureSelector: Send {
    /// At most `max_points` points, strongest first, each lying inside at
    /// least one of `regions`.
    fn select(&self, image: &GrayImage, regions: &[BoundingBox], max_points: usize) -> Vec<Point2>;
}

/// Union of `regions` clipped to the image, as a row-major boolean mask.
pub fn region_mask(width: usize, height: usize, regions: &[BoundingBox]) -> Vec<bool> {
    let mut mask = vec![false; width * height];
    for region in regions {
        let Some(r) = region.clamped(width as u32, height as u32) else {
            continue;
        };
        for y in r.y as usize..r.bottom() as usize {
            let row = y * width;
            mask[row + r.x as usize..row + r.right() as usize].fill(true);
        }
    }
    mask
}
