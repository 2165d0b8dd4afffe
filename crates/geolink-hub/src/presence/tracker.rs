//! Presence tracker: peer set plus one expiry timer per peer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::peer_set::{PeerSet, Upsert};
use super::{PeerRecord, PresenceConfig};
use crate::protocol::LocationEvent;
use crate::session::{HubSession, SubscriptionId};

#[derive(Default)]
struct State {
    peers: PeerSet,
    timers: HashMap<String, JoinHandle<()>>,
    closed: bool,
}

struct Shared {
    state: Mutex<State>,
    expiry: Duration,
    revision: watch::Sender<u64>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
    }
}

/// Folds location events into a live, expiring peer set.
///
/// Cheap to clone; clones share the same set. Recording an event spawns its
/// expiry timer, so it must happen inside a tokio runtime.
#[derive(Clone)]
pub struct PresenceTracker {
    shared: Arc<Shared>,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(PresenceConfig::default())
    }
}

impl std::fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceTracker")
            .field("expiry", &self.shared.expiry)
            .field("count", &self.count())
            .finish()
    }
}

impl PresenceTracker {
    pub fn new(config: PresenceConfig) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                expiry: config.expiry,
                revision,
            }),
        }
    }

    /// Feed every location event from `session` into this tracker. Closing
    /// the session shuts the tracker down with it.
    pub fn attach(&self, session: &HubSession) -> SubscriptionId {
        let tracker = self.clone();
        let id = session.subscribe(move |event| {
            tracker.record_event(event);
        });
        let tracker = self.clone();
        session.on_close(move || tracker.shutdown());
        id
    }

    /// Upsert the peer's record and restart its expiry timer.
    ///
    /// Returns the generation the new timer carries, or `None` after
    /// [`shutdown`](Self::shutdown).
    pub fn record_event(&self, event: &LocationEvent) -> Option<u64> {
        let mut state = self.shared.lock();
        if state.closed {
            return None;
        }

        let Upsert {
            generation,
            inserted,
        } = state.peers.upsert(event, Instant::now(), Utc::now());
        if inserted {
            info!(peer = %event.peer_id, "peer joined");
        }

        let weak = Arc::downgrade(&self.shared);
        let peer_id = event.peer_id.clone();
        let expiry = self.shared.expiry;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(expiry).await;
            expire_from_timer(weak, &peer_id, generation);
        });
        if let Some(previous) = state.timers.insert(event.peer_id.clone(), timer) {
            previous.abort();
        }
        drop(state);

        self.shared.bump();
        Some(generation)
    }

    /// Evict `peer_id` if `generation` is still its latest. Returns whether a
    /// record was removed.
    pub fn expire(&self, peer_id: &str, generation: u64) -> bool {
        let mut state = self.shared.lock();
        let Some(record) = state.peers.expire(peer_id, generation) else {
            debug!(peer = %peer_id, generation, "ignoring stale expiry");
            return false;
        };
        if let Some(timer) = state.timers.remove(peer_id) {
            timer.abort();
        }
        drop(state);

        info!(
            peer = %record.peer_id,
            silent_ms = record.last_seen_at.elapsed().as_millis() as u64,
            "peer expired"
        );
        self.shared.bump();
        true
    }

    /// Current peers in first-seen order.
    pub fn snapshot(&self) -> Vec<PeerRecord> {
        self.shared.lock().peers.snapshot()
    }

    pub fn count(&self) -> usize {
        self.shared.lock().peers.len()
    }

    pub fn get(&self, peer_id: &str) -> Option<PeerRecord> {
        self.shared.lock().peers.get(peer_id).cloned()
    }

    /// Generation of the peer's live timer.
    pub fn generation(&self, peer_id: &str) -> Option<u64> {
        self.shared.lock().peers.generation(peer_id)
    }

    /// Number of armed expiry timers.
    pub fn pending_timers(&self) -> usize {
        self.shared
            .lock()
            .timers
            .values()
            .filter(|timer| !timer.is_finished())
            .count()
    }

    /// Receiver whose value increments on every change to the peer set.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    /// Cancel every expiry timer and ignore further events. The last
    /// snapshot stays readable.
    pub fn shutdown(&self) {
        let mut state = self.shared.lock();
        state.closed = true;
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
    }
}

fn expire_from_timer(shared: Weak<Shared>, peer_id: &str, generation: u64) {
    if let Some(shared) = shared.upgrade() {
        PresenceTracker { shared }.expire(peer_id, generation);
    }
}
