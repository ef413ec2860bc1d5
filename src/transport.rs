//! Narrow contract between the station core and a radio transport.
//!
//! The physical device link (serial framing, protobuf decode, retransmit
//! pacing) lives outside this crate. A transport backend feeds the station
//! three event streams over tokio mpsc channels and consumes one outbound
//! queue:
//!
//! * [`InboundMessage`] — a decoded text packet from a peer, with signal info
//! * [`AckEvent`] — a routing acknowledgment; NOT correlated to a specific
//!   send (the radio layer reports per-peer outcomes only)
//! * partial telemetry readings (see [`crate::station::telemetry`])
//! * [`OutgoingMessage`] — text the station wants transmitted
//!
//! Keeping the boundary at plain channels means the whole station core can be
//! exercised in tests without any device attached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque stable identifier for a mesh node.
///
/// The wire format (`!hexid`, decimal node number, long name) is a transport
/// concern; the core only compares and hashes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Signal quality of the most recent packet from a peer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalInfo {
    pub snr_db: Option<f32>,
    pub rssi_dbm: Option<i32>,
}

/// A decoded text message from the mesh.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub peer: PeerId,
    pub text: String,
    pub signal: SignalInfo,
    /// Mesh hops the packet took to reach us, when the radio reports it.
    pub hops_away: Option<u32>,
    pub received_at: DateTime<Utc>,
}

/// Routing acknowledgment reported by the radio for some earlier send to
/// `peer`. Carries no packet id; the ledger matches it to the most recent
/// pending send for that peer.
#[derive(Debug, Clone)]
pub struct AckEvent {
    pub peer: PeerId,
    pub success: bool,
    pub reason: Option<String>,
}

/// Text the station wants the transport to transmit to one peer.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub to: PeerId,
    pub content: String,
}
