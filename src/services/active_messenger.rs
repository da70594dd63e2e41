use std::sync::{Arc, RwLock};
use log::{info, warn};
use crate::messengers::Messenger;

/// Handed out by [`ActiveMessenger::begin_selection`]. Only the newest ticket
/// may install an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionTicket(u64);

struct Slot {
    generation: u64,
    current: Option<Arc<dyn Messenger>>,
}

/// Process-wide slot holding the one adapter that REST and WebSocket calls
/// are routed to.
#[derive(Clone)]
pub struct ActiveMessenger {
    inner: Arc<RwLock<Slot>>,
}

impl ActiveMessenger {
    pub fn new() -> Self {
        ActiveMessenger {
            inner: Arc::new(RwLock::new(Slot {
                generation: 0,
                current: None,
            })),
        }
    }

    pub fn begin_selection(&self) -> SelectionTicket {
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        slot.generation += 1;
        SelectionTicket(slot.generation)
    }

    /// Installs `messenger` unless a newer selection started after `ticket`
    /// was issued. Returns whether the adapter became active.
    pub fn install(&self, ticket: SelectionTicket, messenger: Arc<dyn Messenger>) -> bool {
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if slot.generation != ticket.0 {
            warn!(
                "Discarding {} adapter from superseded selection {} (current {})",
                messenger.name(),
                ticket.0,
                slot.generation
            );
            return false;
        }
        info!("Active messenger is now {}", messenger.name());
        slot.current = Some(messenger);
        true
    }

    pub fn current(&self) -> Option<Arc<dyn Messenger>> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .current
            .clone()
    }

    pub fn current_name(&self) -> Option<String> {
        self.current().map(|m| m.name().to_string())
    }
}

impl Default for ActiveMessenger {
    fn default() -> Self {
        Self::new()
    }
}
