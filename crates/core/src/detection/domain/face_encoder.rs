use super::face_matcher::Descriptor;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Turns face regions into fixed-length descriptors.
///
/// Returns one descriptor per box, in the same order.
pub trait FaceEncoder: Send {
    fn encode(
        &mut self,
        frame: &Frame,
        boxes: &[BoundingBox],
    ) -> Result<Vec<Descriptor>, Box<dyn std::error::Error>>;
}
