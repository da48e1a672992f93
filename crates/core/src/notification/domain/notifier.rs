use thiserror::Error;

use super::event_log::EventLogError;
use super::notification_channel::ChannelKind;
use crate::notification::infrastructure::event_image_store::ImageStoreError;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("failed to store event image: {0}")]
    Image(#[from] ImageStoreError),
    #[error("failed to record event: {0}")]
    Log(#[from] EventLogError),
    #[error("failed to start notification dispatcher: {0}")]
    Dispatcher(#[source] std::io::Error),
}

/// Outcome of one fired notification.
///
/// Channel delivery happens in the background; `queued` lists the channels
/// the event was handed to.
#[derive(Debug, Default)]
pub struct NotificationReport {
    pub image_file: String,
    pub queued: Vec<ChannelKind>,
    /// The dispatch queue was full and the event was not sent.
    pub dropped: bool,
    /// Image or log writes that failed. Channels are still notified.
    pub storage_errors: Vec<NotificationError>,
}

impl NotificationReport {
    pub fn is_complete(&self) -> bool {
        !self.dropped && self.storage_errors.is_empty()
    }
}

#[derive(Debug)]
pub enum NotifyOutcome {
    /// Still inside the identity's cooldown; nothing was written or sent.
    Suppressed,
    Fired(NotificationReport),
}

impl NotifyOutcome {
    pub fn fired(&self) -> bool {
        matches!(self, NotifyOutcome::Fired(_))
    }
}

/// Identity notification sink used by the processor.
pub trait Notifier: Send {
    /// Persist and fan out an identity event unless throttled.
    fn notify(&mut self, identity: &str, frame: &Frame, forced: bool) -> NotifyOutcome;

    /// Show `identity` on text displays only. No image, no log entry.
    fn announce_identity(&mut self, identity: &str);

    /// Retention sweep and log prune, run between trigger windows.
    fn housekeeping(&mut self);
}
