//! Keyed, insertion-ordered peer records with per-peer generations.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use super::PeerRecord;
use crate::protocol::LocationEvent;

struct Entry {
    record: PeerRecord,
    /// Position in display order, fixed at first insertion.
    position: u64,
    /// Bumped on every refresh; only a timer carrying the current value may
    /// evict the record.
    generation: u64,
}

/// Outcome of [`PeerSet::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upsert {
    pub generation: u64,
    pub inserted: bool,
}

#[derive(Default)]
pub(crate) struct PeerSet {
    next_position: u64,
    next_generation: u64,
    order: BTreeMap<u64, String>,
    peers: HashMap<String, Entry>,
}

impl PeerSet {
    pub(crate) fn upsert(
        &mut self,
        event: &LocationEvent,
        now: Instant,
        received_at: DateTime<Utc>,
    ) -> Upsert {
        self.next_generation += 1;
        let generation = self.next_generation;

        if let Some(entry) = self.peers.get_mut(&event.peer_id) {
            entry.record.lat = event.lat;
            entry.record.lon = event.lon;
            entry.record.last_seen_at = entry.record.last_seen_at.max(now);
            entry.record.received_at = entry.record.received_at.max(received_at);
            entry.generation = generation;
            return Upsert {
                generation,
                inserted: false,
            };
        }

        let position = self.next_position;
        self.next_position += 1;
        self.order.insert(position, event.peer_id.clone());
        self.peers.insert(
            event.peer_id.clone(),
            Entry {
                record: PeerRecord {
                    peer_id: event.peer_id.clone(),
                    lat: event.lat,
                    lon: event.lon,
                    last_seen_at: now,
                    received_at,
                },
                position,
                generation,
            },
        );
        Upsert {
            generation,
            inserted: true,
        }
    }

    /// Remove `peer_id` if it has not been refreshed since `generation`.
    pub(crate) fn expire(&mut self, peer_id: &str, generation: u64) -> Option<PeerRecord> {
        if self.peers.get(peer_id)?.generation != generation {
            return None;
        }
        let entry = self.peers.remove(peer_id)?;
        self.order.remove(&entry.position);
        Some(entry.record)
    }

    pub(crate) fn generation(&self, peer_id: &str) -> Option<u64> {
        self.peers.get(peer_id).map(|entry| entry.generation)
    }

    pub(crate) fn get(&self, peer_id: &str) -> Option<&PeerRecord> {
        self.peers.get(peer_id).map(|entry| &entry.record)
    }

    pub(crate) fn snapshot(&self) -> Vec<PeerRecord> {
        self.order
            .values()
            .filter_map(|peer| self.peers.get(peer))
            .map(|entry| entry.record.clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.peers.len()
    }
}
