use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::GrayFrame;

/// Short-term single-object tracker seeded from one detection.
///
/// Trackers work on the luma plane; the caller converts each frame once.
pub trait FaceTracker: Send {
    fn init(&mut self, gray: &GrayFrame, bbox: BoundingBox) -> Result<(), Box<dyn std::error::Error>>;

    /// Follow the object into `gray`; `None` once the track is lost.
    fn update(&mut self, gray: &GrayFrame) -> Option<BoundingBox>;
}

/// Produces fresh trackers. Resolved once at startup.
pub trait TrackerFactory: Send {
    fn name(&self) -> &str;

    fn create(&self) -> Box<dyn FaceTracker>;
}
