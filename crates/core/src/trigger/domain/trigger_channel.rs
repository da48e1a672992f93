use super::trigger_descriptor::TriggerDescriptor;

#[derive(Clone, Debug, PartialEq)]
pub enum TriggerEvent {
    /// A new descriptor replaced whatever came before.
    Activated(TriggerDescriptor),
    /// The descriptor disappeared or became unreadable.
    Cleared,
}

/// Source of manual trigger requests.
///
/// Polled once per frame by each reader; every reader owns its own channel
/// instance and therefore its own "last seen" marker.
pub trait TriggerChannel: Send {
    /// Report a change since the previous poll, `None` when nothing changed.
    fn poll(&mut self) -> Option<TriggerEvent>;

    /// Withdraw the current request for every reader.
    fn clear(&mut self);
}
