use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use super::channel_dispatcher::{ChannelDispatcher, DEFAULT_DISPATCH_CAPACITY};
use super::domain::event_log::{EventLog, EventLogEntry};
use super::domain::message_template::NotificationEvent;
use super::domain::notification_channel::{ChannelKind, ChannelProvider};
use super::domain::notifier::{NotificationError, NotificationReport, Notifier, NotifyOutcome};
use super::infrastructure::event_image_store::EventImageStore;
use super::retention_sweeper::RetentionSweeper;
use crate::config::config_store::ConfigSource;
use crate::config::settings::Settings;
use crate::shared::clock::Clock;
use crate::shared::constants::EVENT_IMAGE_ROUTE;
use crate::shared::frame::Frame;

/// Per-identity cooldown in front of image, log and channel fan-out.
///
/// For one identity, two non-forced notifications are never closer than
/// `notification_delay` seconds. A forced notification skips the check but
/// still restarts the cooldown.
///
/// Image and log writes happen on the caller's thread. Channel sends are
/// handed to a [`ChannelDispatcher`] so a slow endpoint never stalls frame
/// processing.
pub struct NotificationThrottle {
    config: Arc<dyn ConfigSource>,
    clock: Arc<dyn Clock>,
    provider: Box<dyn ChannelProvider>,
    dispatcher: ChannelDispatcher,
    cooldown: HashMap<String, f64>,
}

impl NotificationThrottle {
    pub fn new(
        config: Arc<dyn ConfigSource>,
        clock: Arc<dyn Clock>,
        provider: Box<dyn ChannelProvider>,
    ) -> Result<Self, NotificationError> {
        let dispatcher =
            ChannelDispatcher::start(DEFAULT_DISPATCH_CAPACITY).map_err(NotificationError::Dispatcher)?;
        Ok(Self {
            config,
            clock,
            provider,
            dispatcher,
            cooldown: HashMap::new(),
        })
    }

    pub fn last_fired(&self, identity: &str) -> Option<f64> {
        self.cooldown.get(identity).copied()
    }

    fn sweeper(settings: &Settings) -> RetentionSweeper {
        RetentionSweeper::new(
            EventImageStore::new(&settings.image_path),
            EventLog::new(&settings.log_file),
        )
    }

    fn sweep(&self, settings: &Settings, now: f64) {
        if settings.eventimage_cleanup_days <= 0 {
            return;
        }
        let at = UNIX_EPOCH + Duration::from_secs_f64(now.max(0.0));
        if let Err(e) = Self::sweeper(settings).sweep_and_prune(settings.eventimage_cleanup_days, at) {
            log::warn!("Event image retention failed: {e}");
        }
    }
}

impl Notifier for NotificationThrottle {
    fn notify(&mut self, identity: &str, frame: &Frame, forced: bool) -> NotifyOutcome {
        let now = self.clock.now();
        let settings = self.config.snapshot();
        if !forced {
            if let Some(last) = self.last_fired(identity) {
                if now - last <= settings.notification_delay {
                    log::debug!("Notification for {identity} suppressed by cooldown");
                    return NotifyOutcome::Suppressed;
                }
            }
        }
        self.cooldown.insert(identity.to_string(), now);

        let mut storage_errors: Vec<NotificationError> = Vec::new();
        let image_file = match EventImageStore::new(&settings.image_path).save(identity, frame, now) {
            Ok(name) => name,
            Err(e) => {
                log::error!("Event image for {identity} not stored: {e}");
                storage_errors.push(e.into());
                EventImageStore::file_name(identity, now)
            }
        };
        self.sweep(&settings, now);

        let image_url = format!("{}/{EVENT_IMAGE_ROUTE}/{image_file}", settings.base_url);
        if let Err(e) = EventLog::new(&settings.log_file).append(&EventLogEntry::at(now, identity, &image_url)) {
            log::error!("Event for {identity} not logged: {e}");
            storage_errors.push(e.into());
        }

        let event = NotificationEvent {
            identity: identity.to_string(),
            image_url,
            fired_at: now,
        };
        let channels = self.provider.channels(&settings);
        let queued: Vec<ChannelKind> = channels.iter().map(|c| c.kind()).collect();
        let report = NotificationReport {
            image_file,
            queued,
            dropped: !self.dispatcher.dispatch(channels, event),
            storage_errors,
        };
        log::info!(
            "Notification fired for {identity}{} ({} channels queued)",
            if forced { " (forced)" } else { "" },
            if report.dropped { 0 } else { report.queued.len() }
        );
        NotifyOutcome::Fired(report)
    }

    fn announce_identity(&mut self, identity: &str) {
        let settings = self.config.snapshot();
        let event = NotificationEvent {
            identity: identity.to_string(),
            image_url: String::new(),
            fired_at: self.clock.now(),
        };
        let channels = self
            .provider
            .channels(&settings)
            .into_iter()
            .filter(|c| c.kind() == ChannelKind::TextEndpoint)
            .collect();
        self.dispatcher.dispatch(channels, event);
    }

    fn housekeeping(&mut self) {
        let settings = self.config.snapshot();
        self.sweep(&settings, self.clock.now());
    }
}
