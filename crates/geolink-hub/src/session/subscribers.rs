//! Id-keyed list of location callbacks.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::protocol::LocationEvent;

use super::types::SubscriptionId;

pub(crate) type LocationCallback = Arc<dyn Fn(&LocationEvent) + Send + Sync>;

pub(crate) type CloseHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Inner {
    next_id: u64,
    entries: BTreeMap<SubscriptionId, LocationCallback>,
    /// Slot managed by `on_location_received`.
    primary: Option<SubscriptionId>,
    /// Run once, outside the lock, when the list closes.
    close_hooks: Vec<CloseHook>,
    closed: bool,
}

impl Inner {
    fn insert(&mut self, callback: LocationCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        if !self.closed {
            self.entries.insert(id, callback);
        }
        id
    }
}

/// Shared between the session handle (registration) and the session task
/// (dispatch). Callbacks run outside the lock, in registration order.
#[derive(Default)]
pub(crate) struct Subscribers {
    inner: Mutex<Inner>,
}

impl Subscribers {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn subscribe(&self, callback: LocationCallback) -> SubscriptionId {
        self.lock().insert(callback)
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        if inner.primary == Some(id) {
            inner.primary = None;
        }
        inner.entries.remove(&id).is_some()
    }

    /// Replace the single primary callback, keeping other subscriptions.
    pub(crate) fn replace_primary(&self, callback: LocationCallback) -> SubscriptionId {
        let mut inner = self.lock();
        if let Some(previous) = inner.primary.take() {
            inner.entries.remove(&previous);
        }
        let id = inner.insert(callback);
        if !inner.closed {
            inner.primary = Some(id);
        }
        id
    }

    pub(crate) fn dispatch(&self, event: &LocationEvent) {
        let callbacks: Vec<LocationCallback> = {
            let inner = self.lock();
            if inner.closed {
                return;
            }
            inner.entries.values().cloned().collect()
        };
        for callback in callbacks {
            callback(event);
        }
    }

    /// Run `hook` when the list closes, or right away if it already has.
    pub(crate) fn on_close(&self, hook: CloseHook) {
        let mut inner = self.lock();
        if !inner.closed {
            inner.close_hooks.push(hook);
            return;
        }
        drop(inner);
        hook();
    }

    /// Drop every callback, refuse new ones and run the close hooks.
    pub(crate) fn close(&self) {
        let hooks = {
            let mut inner = self.lock();
            inner.closed = true;
            inner.primary = None;
            inner.entries.clear();
            std::mem::take(&mut inner.close_hooks)
        };
        for hook in hooks {
            hook();
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }
}
