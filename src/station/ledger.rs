//! Conversation log and delivery-acknowledgment bookkeeping.
//!
//! The ledger keeps an append-only per-peer message log and a single
//! latest-delivery-status slot per peer. Radio-layer acknowledgments arrive
//! uncorrelated (no packet id survives to this layer), so every send claims
//! a monotonically increasing per-peer sequence number and a status update
//! only lands if it names the most recent sequence issued for that peer.
//! A late ACK for an older send is dropped instead of clobbering the status
//! of the send currently in flight.
//!
//! All methods take `&self`; the short internal mutex is never held across
//! I/O or await points.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::transport::{PeerId, SignalInfo};

/// Direction of a logged message relative to this station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

/// One logged message.
#[derive(Debug, Clone)]
pub struct ConversationEntry {
    pub timestamp: DateTime<Utc>,
    pub peer: PeerId,
    pub direction: Direction,
    pub text: String,
    pub signal: Option<SignalInfo>,
}

/// Latest known outcome of the most recent send to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Pending,
    Acknowledged,
    NegativeAcknowledged(String),
    Unknown,
}

#[derive(Debug, Clone)]
struct StatusSlot {
    status: DeliveryStatus,
    seq: u64,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct LedgerInner {
    log: HashMap<PeerId, VecDeque<ConversationEntry>>,
    status: HashMap<PeerId, StatusSlot>,
    next_seq: HashMap<PeerId, u64>,
}

/// Append-only per-peer conversation log plus one delivery-status slot per
/// peer.
#[derive(Default)]
pub struct ConversationLedger {
    inner: Mutex<LedgerInner>,
}

impl ConversationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry to the peer's log. O(1).
    pub fn append(&self, entry: ConversationEntry) {
        let mut inner = self.inner.lock().expect("ledger mutex poisoned");
        inner.log.entry(entry.peer.clone()).or_default().push_back(entry);
    }

    /// The last `k` entries for `peer`, oldest first. O(k).
    pub fn recent(&self, peer: &PeerId, k: usize) -> Vec<ConversationEntry> {
        let inner = self.inner.lock().expect("ledger mutex poisoned");
        match inner.log.get(peer) {
            Some(entries) => {
                let skip = entries.len().saturating_sub(k);
                entries.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Total logged entries for `peer`.
    pub fn len(&self, peer: &PeerId) -> usize {
        let inner = self.inner.lock().expect("ledger mutex poisoned");
        inner.log.get(peer).map_or(0, |e| e.len())
    }

    /// Claim the next send sequence number for `peer` and mark its status
    /// slot Pending. Called at the moment a send is handed to the transport.
    pub fn begin_send(&self, peer: &PeerId, now: DateTime<Utc>) -> u64 {
        let mut inner = self.inner.lock().expect("ledger mutex poisoned");
        let seq = {
            let counter = inner.next_seq.entry(peer.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        inner.status.insert(
            peer.clone(),
            StatusSlot {
                status: DeliveryStatus::Pending,
                seq,
                updated_at: now,
            },
        );
        seq
    }

    /// Apply a status update correlated to sequence `seq`. Returns false and
    /// leaves the slot untouched when `seq` is not the most recent sequence
    /// issued for that peer (a stale, out-of-order update).
    pub fn resolve(
        &self,
        peer: &PeerId,
        seq: u64,
        status: DeliveryStatus,
        now: DateTime<Utc>,
    ) -> bool {
        let mut inner = self.inner.lock().expect("ledger mutex poisoned");
        match inner.status.get_mut(peer) {
            Some(slot) if slot.seq == seq => {
                slot.status = status;
                slot.updated_at = now;
                true
            }
            _ => false,
        }
    }

    /// Apply an uncorrelated status update to the most recent pending send
    /// for `peer`. This is the explicit "most recent send wins"
    /// approximation for transports whose acks carry no correlation id.
    /// Returns false when there is no pending send to match.
    pub fn resolve_latest(&self, peer: &PeerId, status: DeliveryStatus, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock().expect("ledger mutex poisoned");
        match inner.status.get_mut(peer) {
            Some(slot) if slot.status == DeliveryStatus::Pending => {
                slot.status = status;
                slot.updated_at = now;
                true
            }
            _ => false,
        }
    }

    /// Latest delivery status for `peer`; Unknown when nothing was ever sent.
    pub fn delivery_status(&self, peer: &PeerId) -> DeliveryStatus {
        let inner = self.inner.lock().expect("ledger mutex poisoned");
        inner
            .status
            .get(peer)
            .map(|slot| slot.status.clone())
            .unwrap_or(DeliveryStatus::Unknown)
    }

    /// Sequence number of the most recent send to `peer`, if any.
    pub fn latest_seq(&self, peer: &PeerId) -> Option<u64> {
        let inner = self.inner.lock().expect("ledger mutex poisoned");
        inner.status.get(peer).map(|slot| slot.seq)
    }
}
