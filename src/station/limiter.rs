//! Fixed-window rate limiting for free-text traffic.
//!
//! Peers outside the scheduler's target set get a bounded number of
//! responder queries per window; trusted peers bypass this entirely (they
//! already passed the authorization gate). On the first denial inside a
//! window the caller is told to send one "rate limited" notice; further
//! denials in the same window stay silent so a chatty peer cannot make us
//! flood the channel with notices.
//!
//! Timestamps are injected by the caller so tests can drive the window with
//! a virtual clock. A backward clock jump that would leave a window
//! unreachable (`now` earlier than the window's start) resets the window
//! immediately rather than denying forever.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::transport::PeerId;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    /// Denied. `notify` is true exactly once per violated window.
    Limited { notify: bool },
}

#[derive(Debug, Clone)]
struct WindowEntry {
    count: u32,
    window_reset_at: DateTime<Utc>,
    notified: bool,
}

/// Per-peer fixed-window counter.
pub struct RateLimiter {
    max_per_window: u32,
    window: Duration,
    entries: Mutex<HashMap<PeerId, WindowEntry>>,
}

impl RateLimiter {
    pub fn new(max_per_window: u32, window_seconds: i64) -> Self {
        Self {
            max_per_window,
            window: Duration::seconds(window_seconds),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether `peer` may send one more free-text message right now.
    pub fn check(&self, peer: &PeerId) -> RateDecision {
        self.check_at(peer, Utc::now())
    }

    /// Clock-injected variant of [`check`](Self::check).
    pub fn check_at(&self, peer: &PeerId, now: DateTime<Utc>) -> RateDecision {
        let mut entries = self.entries.lock().expect("rate limiter mutex poisoned");
        let entry = entries.entry(peer.clone()).or_insert_with(|| WindowEntry {
            count: 0,
            window_reset_at: now + self.window,
            notified: false,
        });

        // Window rollover, plus the impossible-window guard for backward
        // clock jumps (now earlier than the window's own start).
        if now >= entry.window_reset_at || now < entry.window_reset_at - self.window {
            entry.count = 0;
            entry.window_reset_at = now + self.window;
            entry.notified = false;
        }

        entry.count = entry.count.saturating_add(1);
        if entry.count <= self.max_per_window {
            RateDecision::Allowed
        } else {
            let notify = !entry.notified;
            entry.notified = true;
            RateDecision::Limited { notify }
        }
    }
}
