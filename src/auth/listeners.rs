//! Registry of session-change callbacks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;

use crate::auth::types::SessionChange;

pub type SessionChangeHandler = Arc<dyn Fn(&SessionChange) + Send + Sync>;

type HandlerMap = DashMap<u64, SessionChangeHandler>;

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    handlers: Arc<HandlerMap>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: SessionChangeHandler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.insert(id, handler);
        Subscription {
            id,
            registry: Arc::downgrade(&self.handlers),
            active: AtomicBool::new(true),
        }
    }

    /// Invoke every registered handler. Handlers are collected first so a
    /// callback may unsubscribe without deadlocking on the map.
    pub fn emit(&self, change: &SessionChange) {
        let handlers: Vec<SessionChangeHandler> = self
            .handlers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        log::debug!(
            "emitting {:?} to {} session listener(s)",
            change.event,
            handlers.len()
        );

        for handler in handlers {
            handler(change);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Handle returned by `on_session_change`. `unsubscribe` detaches the
/// handler; further calls are no-ops.
pub struct Subscription {
    id: u64,
    registry: Weak<HandlerMap>,
    active: AtomicBool,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(handlers) = self.registry.upgrade() {
            handlers.remove(&self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
