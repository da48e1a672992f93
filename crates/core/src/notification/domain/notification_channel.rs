use thiserror::Error;

use super::message_template::NotificationEvent;
use crate::config::settings::Settings;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("channel not configured: {0}")]
    Misconfigured(String),
    #[error("payload is not valid JSON: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("endpoint answered HTTP {0}")]
    Status(u16),
    #[error("http client unavailable: {0}")]
    ClientUnavailable(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Udp,
    Http,
    TextEndpoint,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ChannelKind::Udp => "udp",
            ChannelKind::Http => "http",
            ChannelKind::TextEndpoint => "text-endpoint",
        })
    }
}

/// One outbound notification transport. Delivery is best effort.
pub trait NotificationChannel: Send {
    fn kind(&self) -> ChannelKind;
    fn send(&self, event: &NotificationEvent) -> Result<(), ChannelError>;
}

/// Builds the enabled channel set from the current settings.
pub trait ChannelProvider: Send {
    fn channels(&self, settings: &Settings) -> Vec<Box<dyn NotificationChannel>>;
}

#[derive(Debug)]
pub struct ChannelFailure {
    pub channel: ChannelKind,
    pub error: ChannelError,
}

/// Per-channel outcome of one fan-out.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub delivered: Vec<ChannelKind>,
    pub failures: Vec<ChannelFailure>,
}

impl DeliveryReport {
    pub fn all_delivered(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Send `event` to every channel in order. One failing channel never
/// keeps the others from being tried.
pub fn deliver_all(channels: &[Box<dyn NotificationChannel>], event: &NotificationEvent) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for channel in channels {
        let kind = channel.kind();
        match channel.send(event) {
            Ok(()) => report.delivered.push(kind),
            Err(error) => {
                log::warn!("{kind} notification for {} failed: {error}", event.identity);
                report.failures.push(ChannelFailure { channel: kind, error });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Fixed {
        kind: ChannelKind,
        fail: bool,
        calls: Arc<Mutex<Vec<ChannelKind>>>,
    }

    impl NotificationChannel for Fixed {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        fn send(&self, _: &NotificationEvent) -> Result<(), ChannelError> {
            self.calls.lock().unwrap().push(self.kind);
            if self.fail {
                Err(ChannelError::Status(500))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_failure_does_not_block_later_channels() {
        let calls: Arc<Mutex<Vec<ChannelKind>>> = Arc::default();
        let channels: Vec<Box<dyn NotificationChannel>> = [
            (ChannelKind::Http, true),
            (ChannelKind::Udp, false),
            (ChannelKind::TextEndpoint, false),
        ]
        .into_iter()
        .map(|(kind, fail)| {
            Box::new(Fixed { kind, fail, calls: Arc::clone(&calls) }) as Box<dyn NotificationChannel>
        })
        .collect();
        let event = NotificationEvent {
            identity: "bob".into(),
            image_url: String::new(),
            fired_at: 1.0,
        };

        let report = deliver_all(&channels, &event);
        assert_eq!(report.delivered, vec![ChannelKind::Udp, ChannelKind::TextEndpoint]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].channel, ChannelKind::Http);
        assert!(!report.all_delivered());
        assert_eq!(calls.lock().unwrap().len(), 3);
    }
}
