use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::shared::frame::Frame;
use crate::video::domain::overlay::Overlay;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const POINT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: i32 = 2;
const POINT_RADIUS: i32 = 2;

/// RGB copy of `frame` with the overlay's boxes and points drawn on it.
/// Returns `None` when the frame buffer does not match its dimensions.
pub fn render_overlay(frame: &Frame, overlay: &Overlay) -> Option<RgbImage> {
    let mut img = to_rgb_image(frame)?;
    for labeled in &overlay.boxes {
        let b = labeled.location;
        for inset in 0..BOX_THICKNESS {
            let width = b.width - 2 * inset;
            let height = b.height - 2 * inset;
            if width <= 0 || height <= 0 {
                break;
            }
            let rect = Rect::at(b.x + inset, b.y + inset).of_size(width as u32, height as u32);
            draw_hollow_rect_mut(&mut img, rect, BOX_COLOR);
        }
    }
    for p in &overlay.points {
        let centre = (p.x.round() as i32, p.y.round() as i32);
        draw_filled_circle_mut(&mut img, centre, POINT_RADIUS, POINT_COLOR);
    }
    Some(img)
}

fn to_rgb_image(frame: &Frame) -> Option<RgbImage> {
    let data = match frame.channels() {
        3 => frame.data().to_vec(),
        1 => frame.data().iter().flat_map(|&v| [v, v, v]).collect(),
        _ => return None,
    };
    RgbImage::from_raw(frame.width(), frame.height(), data)
}
