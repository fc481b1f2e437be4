use serde::Serialize;

use crate::shared::geometry::BoundingBox;

/// One accepted detector proposal, already squared and enlarged.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    /// Class id as reported by the network.
    pub label: i32,
    pub confidence: f32,
    pub location: BoundingBox,
}

impl Detection {
    pub fn new(label: i32, confidence: f32, location: BoundingBox) -> Self {
        Self {
            label,
            confidence,
            location,
        }
    }
}
