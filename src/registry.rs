//! # Peer Registry Module
//!
//! Transient bookkeeping for BLE peripherals seen during a scan session.
//! Tracks when each peer was last observed and evicts peers that have been
//! silent for longer than the staleness window, while keeping a stable,
//! deduplicated presentation order for the device picker.
//!
//! ## Key Types
//! - `PeerKey`: identity of a discovered peripheral (display name + address)
//! - `DiscoveryEvent`: one observation delivered by the discovery source
//! - `PeerRegistry`: the last-seen table and presentation order
//!
//! ## Eviction Policy
//! Eviction is coupled to arrival: every `observe` sweeps immediately, so a
//! peer that left the air is only dropped the next time *any* peer is seen.
//! A registry that receives no further observations never shrinks on its
//! own; callers that need a live list when the air goes quiet must call
//! `sweep` from a timer (the scan manager does this).
//!
//! Not thread-safe by design: all mutation goes through `&mut self`, and the
//! scan manager confines the registry to a single session loop. Producers on
//! other threads hand observations off through a channel instead of calling
//! in directly. Timestamps are wall-clock milliseconds supplied by the
//! caller; the registry owns no clock.

use std::fmt;

/// Identity of a discovered peripheral.
///
/// The name/address pair is both the dedup key and the presentation text,
/// rendered as `"<name> (<address>)"`. Two peripherals only collide when
/// both fields match, so the same hardware address under a late-resolved
/// name counts as a new peer until the unnamed entry goes stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerKey {
    pub name: String,
    pub address: String,
}

impl PeerKey {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// One observation from the discovery source: which peer, and when.
#[derive(Debug, Clone)]
pub struct DiscoveryEvent {
    pub key: PeerKey,
    /// Wall-clock milliseconds at the moment the advertisement was seen.
    pub at_ms: i64,
}

/// A tracked peer: its key and the last time it was observed.
#[derive(Debug, Clone)]
struct PeerRecord {
    key: PeerKey,
    last_seen_ms: i64,
}

/// Last-seen table for one scan session.
///
/// A single insertion-ordered `Vec` of records: membership is a linear scan
/// and eviction is a `retain`, so the presentation order can never drift
/// from the timestamp bookkeeping. Linear membership is fine at device
/// picker scale (tens of peers in radio range).
#[derive(Debug)]
pub struct PeerRegistry {
    stale_after_ms: i64,
    records: Vec<PeerRecord>,
}

impl PeerRegistry {
    /// Create an empty registry with the given staleness window.
    pub fn new(stale_after_ms: i64) -> Self {
        Self {
            stale_after_ms,
            records: Vec::new(),
        }
    }

    /// Record or refresh a peer's presence at `now_ms`.
    ///
    /// A new key is appended to the presentation order; a known key only has
    /// its timestamp overwritten and keeps its position. Every observation
    /// immediately sweeps at the same instant — eviction rides on arrival.
    pub fn observe(&mut self, key: PeerKey, now_ms: i64) {
        match self.records.iter_mut().find(|record| record.key == key) {
            Some(record) => record.last_seen_ms = now_ms,
            None => self.records.push(PeerRecord {
                key,
                last_seen_ms: now_ms,
            }),
        }
        self.sweep(now_ms);
    }

    /// Evict every peer whose silence strictly exceeds the staleness window.
    ///
    /// A peer last seen exactly `stale_after_ms` ago survives. Survivors
    /// keep their relative order. Idempotent for a fixed `now_ms`. Returns
    /// the number of peers evicted.
    pub fn sweep(&mut self, now_ms: i64) -> usize {
        let before = self.records.len();
        let window = self.stale_after_ms;
        self.records
            .retain(|record| now_ms - record.last_seen_ms <= window);
        before - self.records.len()
    }

    /// The current presentation order, oldest first-sighting first.
    ///
    /// Owned copy — safe to hand to the UI thread and render without further
    /// synchronization.
    pub fn snapshot(&self) -> Vec<PeerKey> {
        self.records.iter().map(|record| record.key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
