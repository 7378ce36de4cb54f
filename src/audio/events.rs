use tracing::trace;

use super::device::{BindingId, DeviceEvent, DeviceEventKind, DeviceEventSender, DeviceSignal, ListenerId};

struct Listener {
    id: ListenerId,
    kinds: Vec<DeviceEventKind>,
    sender: DeviceEventSender,
}

/// Subscriber bookkeeping shared by the device backends.
#[derive(Default)]
pub struct ListenerSet {
    last_id: u64,
    listeners: Vec<Listener>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kinds: &[DeviceEventKind], sender: DeviceEventSender) -> ListenerId {
        self.last_id += 1;
        let id = ListenerId(self.last_id);
        self.listeners.push(Listener {
            id,
            kinds: kinds.to_vec(),
            sender,
        });
        trace!(listener = id.0, ?kinds, "device listener added");
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|listener| listener.id != id);
        let removed = self.listeners.len() != before;
        if removed {
            trace!(listener = id.0, "device listener removed");
        }
        removed
    }

    /// Deliver `signal` to every listener interested in its kind.
    /// Listeners whose receiving side is gone are dropped.
    pub fn emit(&mut self, binding: BindingId, signal: DeviceSignal) {
        let kind = signal.kind();
        self.listeners.retain(|listener| {
            if !listener.kinds.contains(&kind) {
                return true;
            }
            listener
                .sender
                .send(DeviceEvent {
                    listener: listener.id,
                    binding,
                    signal: signal.clone(),
                })
                .is_ok()
        });
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::BindingSequence;
    use tokio::sync::mpsc;

    #[test]
    fn test_emit_filters_by_kind() {
        let mut set = ListenerSet::new();
        let mut bindings = BindingSequence::default();
        let binding = bindings.next_id();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let ended = set.subscribe(&[DeviceEventKind::Ended], tx.clone());
        let _progress = set.subscribe(&[DeviceEventKind::Progressed], tx);

        set.emit(binding, DeviceSignal::Ended);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.listener, ended);
        assert_eq!(event.binding, binding);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribed_listener_gets_nothing() {
        let mut set = ListenerSet::new();
        let binding = BindingSequence::default().next_id();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let id = set.subscribe(&[DeviceEventKind::Ended], tx);
        assert!(set.unsubscribe(id));
        assert!(!set.unsubscribe(id));

        set.emit(binding, DeviceSignal::Ended);
        assert!(rx.try_recv().is_err());
        assert!(set.is_empty());
    }

    #[test]
    fn test_closed_receivers_are_pruned() {
        let mut set = ListenerSet::new();
        let binding = BindingSequence::default().next_id();
        let (tx, rx) = mpsc::unbounded_channel();
        set.subscribe(&[DeviceEventKind::Ended], tx);
        drop(rx);

        set.emit(binding, DeviceSignal::Ended);
        assert_eq!(set.len(), 0);
    }
}
