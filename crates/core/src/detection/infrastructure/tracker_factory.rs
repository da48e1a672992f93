use thiserror::Error;

use crate::detection::domain::face_tracker::TrackerFactory;

use super::template_tracker::TemplateTrackerFactory;

pub const AVAILABLE_TRACKERS: &[&str] = &["template"];

#[derive(Error, Debug)]
#[error("unknown tracker '{0}' (available: {list})", list = AVAILABLE_TRACKERS.join(", "))]
pub struct UnknownTrackerError(pub String);

/// Resolve the configured tracker once at startup.
///
/// There is no runtime probing: an unrecognised name is a startup error.
pub fn create_tracker_factory(name: &str) -> Result<Box<dyn TrackerFactory>, UnknownTrackerError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "template" | "" => {
            log::info!("Using template tracker");
            Ok(Box::new(TemplateTrackerFactory::default()))
        }
        other => Err(UnknownTrackerError(other.to_string())),
    }
}
