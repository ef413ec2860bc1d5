#![allow(dead_code)]
//! Shared plumbing for integration tests: builds a station with an in-memory
//! transport and a controllable responder backend.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use meshbeacon::station::ledger::ConversationLedger;
use meshbeacon::station::limiter::RateLimiter;
use meshbeacon::station::responder::{Responder, ResponderHandle};
use meshbeacon::station::scheduler::SchedulerControl;
use meshbeacon::station::server::StationServer;
use meshbeacon::station::telemetry::TelemetryAggregator;
use meshbeacon::transport::{InboundMessage, OutgoingMessage, PeerId, SignalInfo};

pub const MAX_PAYLOAD: usize = 200;

/// Echoes prompts back; load blocks for a configurable delay.
pub struct EchoResponder {
    load_delay: Duration,
    loaded: AtomicBool,
    pub load_calls: AtomicUsize,
}

impl EchoResponder {
    pub fn new(load_delay: Duration) -> Self {
        Self {
            load_delay,
            loaded: AtomicBool::new(false),
            load_calls: AtomicUsize::new(0),
        }
    }

    pub fn preloaded() -> Self {
        let responder = Self::new(Duration::ZERO);
        responder.loaded.store(true, Ordering::SeqCst);
        responder
    }
}

impl Responder for EchoResponder {
    fn is_available(&self) -> bool {
        true
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    fn load(&self) -> bool {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.load_delay);
        self.loaded.store(true, Ordering::SeqCst);
        true
    }

    fn unload(&self) {
        self.loaded.store(false, Ordering::SeqCst);
    }

    fn generate(&self, prompt: &str) -> Option<String> {
        Some(format!("echo: {prompt}"))
    }
}

pub struct TestStation {
    pub server: StationServer,
    pub outgoing_rx: mpsc::UnboundedReceiver<OutgoingMessage>,
    pub responder: ResponderHandle,
}

pub fn build_station(targets: &[&str], backend: Arc<dyn Responder>) -> TestStation {
    let targets: BTreeSet<PeerId> = targets.iter().map(|id| PeerId::from(*id)).collect();
    let control = Arc::new(SchedulerControl::new(true, 300, targets));
    let telemetry = Arc::new(TelemetryAggregator::new());
    let ledger = Arc::new(ConversationLedger::new());
    let limiter = RateLimiter::new(50, 3600);
    let responder = ResponderHandle::new(backend);
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
    let server = StationServer::new(
        control,
        telemetry,
        ledger,
        limiter,
        responder.clone(),
        outgoing_tx,
        MAX_PAYLOAD,
        None,
    );
    TestStation {
        server,
        outgoing_rx,
        responder,
    }
}

pub fn inbound(peer: &str, text: &str) -> InboundMessage {
    InboundMessage {
        peer: PeerId::from(peer),
        text: text.to_string(),
        signal: SignalInfo {
            snr_db: Some(6.0),
            rssi_dbm: Some(-85),
        },
        hops_away: Some(1),
        received_at: chrono::Utc::now(),
    }
}

/// Drain every outgoing message that arrives before the queue stays idle for
/// `idle`.
pub async fn drain_outgoing(
    rx: &mut mpsc::UnboundedReceiver<OutgoingMessage>,
    idle: Duration,
) -> Vec<OutgoingMessage> {
    let mut out = Vec::new();
    while let Ok(Some(msg)) = tokio::time::timeout(idle, rx.recv()).await {
        out.push(msg);
    }
    out
}
