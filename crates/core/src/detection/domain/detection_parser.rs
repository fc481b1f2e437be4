use crate::shared::geometry::BoundingBox;

use super::detection::Detection;
use super::output_layout::OutputLayout;

/// Turns a flat SSD output buffer into squared, enlarged face boxes.
///
/// Each proposal is `[image_id, label, confidence, x1, y1, x2, y2]` with
/// corner coordinates normalised to `[0, 1]`. A negative `image_id` marks
/// the end of valid proposals.
#[derive(Clone, Debug)]
pub struct DetectionParser {
    layout: OutputLayout,
    threshold: f64,
    enlarge_coefficient: f64,
    raw_output_messages: bool,
}

impl DetectionParser {
    pub fn new(layout: OutputLayout, threshold: f64, enlarge_coefficient: f64) -> Self {
        Self {
            layout,
            threshold,
            enlarge_coefficient,
            raw_output_messages: false,
        }
    }

    /// Logs every accepted proposal.
    pub fn with_raw_output_messages(mut self, enabled: bool) -> Self {
        self.raw_output_messages = enabled;
        self
    }

    pub fn parse(&self, raw: &[f32], frame_width: u32, frame_height: u32) -> Vec<Detection> {
        let object_size = self.layout.object_size;
        let available = raw.len() / object_size;
        let count = self
            .layout
            .max_proposal_count
            .map_or(available, |max| max.min(available));
        let width = frame_width as f32;
        let height = frame_height as f32;

        let mut detections = Vec::new();
        for (i, proposal) in raw.chunks_exact(object_size).take(count).enumerate() {
            if proposal[0] < 0.0 {
                break;
            }
            let label = proposal[1] as i32;
            let confidence = proposal[2];
            if confidence as f64 <= self.threshold {
                continue;
            }

            let x = (proposal[3] * width) as i32;
            let y = (proposal[4] * height) as i32;
            let w = (proposal[5] * width - x as f32) as i32;
            let h = (proposal[6] * height - y as f32) as i32;
            let location = BoundingBox::new(x, y, w, h).square_and_enlarge(self.enlarge_coefficient);

            if self.raw_output_messages {
                log::info!(
                    "[{i},{label}] element, prob = {confidence}    ({},{})-({},{})",
                    location.x,
                    location.y,
                    location.width,
                    location.height
                );
            }
            detections.push(Detection::new(label, confidence, location));
        }
        detections
    }
}
