//! Auto-send scheduler.
//!
//! A one-second tick loop checks whether a telemetry digest is due and, when
//! it is, initiates a send batch to every target peer. The batch runs as its
//! own task so a slow transmit never delays the next tick check, and
//! `last_send_at` is stamped when the batch is initiated rather than when it
//! completes, so per-peer transmit latency does not stretch the effective
//! interval.
//!
//! States are Disabled, Enabled-Running and Enabled-Paused. STOP and START
//! keywords flip the paused flag; enable/disable is an operator action.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::station::error::StationError;
use crate::station::ledger::{ConversationEntry, ConversationLedger, DeliveryStatus, Direction};
use crate::station::telemetry::TelemetryAggregator;
use crate::station::{chunker, MAX_INTERVAL_SECONDS, MIN_INTERVAL_SECONDS};
use crate::transport::{OutgoingMessage, PeerId};

/// Snapshot of the scheduler's mutable state.
#[derive(Debug, Clone)]
pub struct SchedulerState {
    pub enabled: bool,
    pub paused: bool,
    pub interval_seconds: u32,
    pub last_send_at: Option<DateTime<Utc>>,
    pub target_peers: BTreeSet<PeerId>,
}

impl SchedulerState {
    fn new(enabled: bool, interval_seconds: u32, target_peers: BTreeSet<PeerId>) -> Self {
        Self {
            enabled,
            paused: false,
            interval_seconds: interval_seconds.clamp(MIN_INTERVAL_SECONDS, MAX_INTERVAL_SECONDS),
            last_send_at: None,
            target_peers,
        }
    }
}

/// Shared scheduler control. All mutation happens under one short mutex so a
/// due-check and its `last_send_at` stamp are a single atomic step.
pub struct SchedulerControl {
    state: Mutex<SchedulerState>,
}

impl SchedulerControl {
    pub fn new(enabled: bool, interval_seconds: u32, target_peers: BTreeSet<PeerId>) -> Self {
        Self {
            state: Mutex::new(SchedulerState::new(enabled, interval_seconds, target_peers)),
        }
    }

    pub fn snapshot(&self) -> SchedulerState {
        self.state.lock().expect("scheduler mutex poisoned").clone()
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.state.lock().expect("scheduler mutex poisoned");
        state.enabled = enabled;
        if !enabled {
            state.paused = false;
        }
    }

    /// Pause periodic sends (STOP keyword). Returns false when already paused.
    pub fn pause(&self) -> bool {
        let mut state = self.state.lock().expect("scheduler mutex poisoned");
        let changed = !state.paused;
        state.paused = true;
        changed
    }

    /// Resume periodic sends (START keyword). Returns false when not paused.
    pub fn resume(&self) -> bool {
        let mut state = self.state.lock().expect("scheduler mutex poisoned");
        let changed = state.paused;
        state.paused = false;
        changed
    }

    pub fn interval_seconds(&self) -> u32 {
        self.state.lock().expect("scheduler mutex poisoned").interval_seconds
    }

    /// Set the send interval, returning the prior value. Out-of-range values
    /// are rejected without touching state.
    pub fn set_interval(&self, seconds: u32) -> Result<u32, StationError> {
        if !(MIN_INTERVAL_SECONDS..=MAX_INTERVAL_SECONDS).contains(&seconds) {
            return Err(StationError::IntervalOutOfRange(seconds));
        }
        let mut state = self.state.lock().expect("scheduler mutex poisoned");
        let prior = state.interval_seconds;
        state.interval_seconds = seconds;
        Ok(prior)
    }

    /// Whether `peer` is in the target set and therefore authorized to issue
    /// control keywords.
    pub fn is_trusted(&self, peer: &PeerId) -> bool {
        let state = self.state.lock().expect("scheduler mutex poisoned");
        state.target_peers.contains(peer)
    }

    pub fn set_targets(&self, targets: BTreeSet<PeerId>) {
        let mut state = self.state.lock().expect("scheduler mutex poisoned");
        state.target_peers = targets;
    }

    /// Atomically decide whether a send batch is due at `now`. When it is,
    /// `last_send_at` is stamped to `now` (batch initiation time) and the
    /// target set is returned; the caller owns the actual sending.
    pub fn claim_due(&self, now: DateTime<Utc>) -> Option<Vec<PeerId>> {
        let mut state = self.state.lock().expect("scheduler mutex poisoned");
        if !state.enabled || state.paused || state.target_peers.is_empty() {
            return None;
        }
        let due = match state.last_send_at {
            None => true,
            Some(last) => (now - last).num_seconds() >= i64::from(state.interval_seconds),
        };
        if !due {
            return None;
        }
        state.last_send_at = Some(now);
        Some(state.target_peers.iter().cloned().collect())
    }
}

/// Transmit one digest batch to `targets`.
///
/// Each peer gets a freshly rendered digest, a Pending delivery slot and a
/// Sent ledger entry. A failed hand-off to the transport is logged and
/// recorded against that peer only; remaining peers still get their send.
pub fn send_digest_batch(
    targets: &[PeerId],
    telemetry: &TelemetryAggregator,
    ledger: &ConversationLedger,
    outgoing: &mpsc::UnboundedSender<OutgoingMessage>,
    max_payload: usize,
    now: DateTime<Utc>,
) {
    for peer in targets {
        let digest = telemetry.render_digest(now, Some(peer));
        ledger.begin_send(peer, now);
        ledger.append(ConversationEntry {
            timestamp: now,
            peer: peer.clone(),
            direction: Direction::Sent,
            text: digest.clone(),
            signal: None,
        });
        let mut failed = false;
        for piece in chunker::chunk(&digest, max_payload) {
            if outgoing
                .send(OutgoingMessage {
                    to: peer.clone(),
                    content: piece,
                })
                .is_err()
            {
                failed = true;
                break;
            }
        }
        if failed {
            let err = StationError::Transport("outgoing channel closed".to_string());
            log::warn!("digest send to {peer} failed: {err}");
            ledger.resolve_latest(
                peer,
                DeliveryStatus::NegativeAcknowledged(err.to_string()),
                now,
            );
        } else {
            log::debug!("digest queued for {peer}");
        }
    }
}

pub enum SchedulerCommand {
    Shutdown(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct AutosendHandle {
    tx: mpsc::UnboundedSender<SchedulerCommand>,
}

impl AutosendHandle {
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        let _ = self.tx.send(SchedulerCommand::Shutdown(tx));
        let _ = rx.await;
    }
}

/// Spawn the auto-send tick loop.
pub fn start_autosend(
    control: Arc<SchedulerControl>,
    telemetry: Arc<TelemetryAggregator>,
    ledger: Arc<ConversationLedger>,
    outgoing: mpsc::UnboundedSender<OutgoingMessage>,
    max_payload: usize,
) -> AutosendHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<SchedulerCommand>();
    let handle = AutosendHandle { tx };

    tokio::spawn(async move {
        const TICK: Duration = Duration::from_secs(1);
        loop {
            tokio::select! {
                Some(cmd) = rx.recv() => {
                    match cmd {
                        SchedulerCommand::Shutdown(done) => {
                            log::info!("auto-send scheduler stopping");
                            let _ = done.send(());
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep(TICK) => {}
            }

            let now = Utc::now();
            if let Some(targets) = control.claim_due(now) {
                log::info!("auto-send due, {} target(s)", targets.len());
                // Independent task so a slow batch never delays the tick.
                let telemetry = Arc::clone(&telemetry);
                let ledger = Arc::clone(&ledger);
                let outgoing = outgoing.clone();
                tokio::spawn(async move {
                    send_digest_batch(&targets, &telemetry, &ledger, &outgoing, max_payload, now);
                });
            }
        }
    });

    handle
}
