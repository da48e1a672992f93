use super::face_tracker::FaceTracker;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::GrayFrame;

/// A face carried between detection passes by its own tracker.
pub struct TrackedFace {
    pub bbox: BoundingBox,
    pub label: String,
    tracker: Box<dyn FaceTracker>,
}

impl TrackedFace {
    pub fn new(bbox: BoundingBox, label: String, tracker: Box<dyn FaceTracker>) -> Self {
        Self {
            bbox,
            label,
            tracker,
        }
    }

    /// Advance the tracker. Returns `false` when the face was lost.
    pub fn advance(&mut self, gray: &GrayFrame) -> bool {
        match self.tracker.update(gray) {
            Some(bbox) if !bbox.is_empty() => {
                self.bbox = bbox;
                true
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for TrackedFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedFace")
            .field("bbox", &self.bbox)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
