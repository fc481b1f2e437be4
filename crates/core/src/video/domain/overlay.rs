use serde::Serialize;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::label_map::LabelMap;
use crate::fusion::frame_outcome::FusionState;
use crate::shared::geometry::{BoundingBox, Point2};

/// A box to draw together with its caption.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LabeledBox {
    pub location: BoundingBox,
    pub label: String,
    pub confidence: f32,
}

impl LabeledBox {
    /// Caption such as `face: 0.873`.
    pub fn caption(&self) -> String {
        format!("{}: {:.3}", self.label, self.confidence)
    }
}

/// Everything a sink needs to render one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Overlay {
    pub frame_index: usize,
    pub state: FusionState,
    pub boxes: Vec<LabeledBox>,
    pub points: Vec<Point2>,
}

impl Overlay {
    pub fn new(
        frame_index: usize,
        state: FusionState,
        detections: &[Detection],
        points: &[Point2],
        labels: &LabelMap,
    ) -> Self {
        let boxes = detections
            .iter()
            .map(|d| LabeledBox {
                location: d.location,
                label: labels.display_name(d.label),
                confidence: d.confidence,
            })
            .collect();
        Self {
            frame_index,
            state,
            boxes,
            points: points.to_vec(),
        }
    }
}
