use crossbeam_channel::{bounded, Sender, TrySendError};

use super::domain::message_template::NotificationEvent;
use super::domain::notification_channel::{deliver_all, NotificationChannel};

/// Deliveries waiting for the worker before new ones are dropped.
pub const DEFAULT_DISPATCH_CAPACITY: usize = 16;

struct Delivery {
    channels: Vec<Box<dyn NotificationChannel>>,
    event: NotificationEvent,
}

/// Sends notification events from a dedicated `notify` thread.
///
/// Deliveries wait in a bounded queue and run one after another. When the
/// queue is full the new delivery is dropped with a warning. The worker
/// exits once the dispatcher is dropped and the queue is drained.
pub struct ChannelDispatcher {
    tx: Sender<Delivery>,
}

impl ChannelDispatcher {
    pub fn start(capacity: usize) -> std::io::Result<Self> {
        let (tx, rx) = bounded::<Delivery>(capacity.max(1));
        std::thread::Builder::new()
            .name("notify".into())
            .spawn(move || {
                for delivery in rx {
                    let report = deliver_all(&delivery.channels, &delivery.event);
                    log::debug!(
                        "Delivered {} to {}/{} channels",
                        delivery.event.identity,
                        report.delivered.len(),
                        delivery.channels.len()
                    );
                }
                log::debug!("Notification dispatcher stopped");
            })?;
        Ok(Self { tx })
    }

    /// Queue `event` for `channels` without blocking.
    ///
    /// Returns `false` when the event had to be dropped.
    pub fn dispatch(&self, channels: Vec<Box<dyn NotificationChannel>>, event: NotificationEvent) -> bool {
        if channels.is_empty() {
            return true;
        }
        match self.tx.try_send(Delivery { channels, event }) {
            Ok(()) => true,
            Err(TrySendError::Full(d)) => {
                log::warn!("Notification queue full, dropping event for {}", d.event.identity);
                false
            }
            Err(TrySendError::Disconnected(d)) => {
                log::error!("Notification worker is gone, dropping event for {}", d.event.identity);
                false
            }
        }
    }
}
