use std::ops::Range;

use crossbeam::channel::{unbounded, Receiver, Sender};

/// Signals the engine sends to its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    IndexRebuilt { version: u64, len: usize },
    HighlightChanged { range: Range<usize> },
    HighlightCleared,
    SubstitutionApplied { replacements: usize },
    RestoreCompleted { restored: usize, dropped: usize },
}

/// Fan-out of [`EngineEvent`]s. Subscribers that hung up are dropped on the
/// next send.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<EngineEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, event: EngineEvent) {
        if self.subscribers.is_empty() {
            return;
        }
        tracing::trace!(?event, "emit");
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out_and_disconnect() {
        let mut bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.emit(EngineEvent::HighlightCleared);
        assert_eq!(a.try_recv(), Ok(EngineEvent::HighlightCleared));
        assert_eq!(b.try_recv(), Ok(EngineEvent::HighlightCleared));

        drop(b);
        bus.emit(EngineEvent::SubstitutionApplied { replacements: 2 });
        assert_eq!(
            a.try_recv(),
            Ok(EngineEvent::SubstitutionApplied { replacements: 2 })
        );
        assert!(a.try_recv().is_err());
    }
}
