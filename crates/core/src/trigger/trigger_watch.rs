use super::domain::trigger_channel::{TriggerChannel, TriggerEvent};
use super::domain::trigger_window::{TriggerWindow, WindowPhase};

/// One reader's view of the manual trigger.
///
/// Every new descriptor fully replaces the previous window; nothing is
/// merged across activations.
pub struct TriggerWatch {
    channel: Box<dyn TriggerChannel>,
    window: Option<TriggerWindow>,
}

impl TriggerWatch {
    pub fn new(channel: Box<dyn TriggerChannel>) -> Self {
        Self {
            channel,
            window: None,
        }
    }

    /// Poll the channel and apply any change. Returns `true` on change.
    pub fn refresh(&mut self, grace_seconds: f64) -> bool {
        match self.channel.poll() {
            Some(TriggerEvent::Activated(descriptor)) => {
                log::info!(
                    "Trigger activated: duration={}s cadence={}Hz stop_on_match={}",
                    descriptor.duration,
                    descriptor.cadence_hz,
                    descriptor.stop_on_match
                );
                self.window = Some(TriggerWindow::open(&descriptor, grace_seconds));
                true
            }
            Some(TriggerEvent::Cleared) => {
                let had_window = self.window.take().is_some();
                if had_window {
                    log::debug!("Trigger cleared");
                }
                had_window
            }
            None => false,
        }
    }

    pub fn window(&self) -> Option<&TriggerWindow> {
        self.window.as_ref()
    }

    pub fn window_mut(&mut self) -> Option<&mut TriggerWindow> {
        self.window.as_mut()
    }

    pub fn phase(&self, now: f64) -> WindowPhase {
        self.window
            .as_ref()
            .map_or(WindowPhase::Ended, |w| w.phase(now))
    }

    pub fn suspend_active(&self, now: f64) -> bool {
        self.window.as_ref().is_some_and(|w| w.suspend_active(now))
    }

    /// End the window here and withdraw the descriptor for all readers.
    pub fn terminate(&mut self) {
        if let Some(w) = self.window.as_mut() {
            w.terminate();
        }
        self.channel.clear();
    }
}
