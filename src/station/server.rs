//! Station event loop and inbound-message handling.
//!
//! [`StationServer`] owns the shared structures and reacts to the three
//! transport event streams (inbound text, routing acks, telemetry
//! fragments). The inbound path does bookkeeping only: anything slow (model
//! load, text generation) is handed to a blocking worker and replied to
//! asynchronously, so packet handling latency stays bounded no matter what
//! the responder is doing.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::logutil::escape_log;
use crate::station::error::StationError;
use crate::station::ledger::{ConversationEntry, ConversationLedger, DeliveryStatus, Direction};
use crate::station::limiter::{RateDecision, RateLimiter};
use crate::station::responder::ResponderHandle;
use crate::station::router::{self, Command, RouterAction};
use crate::station::scheduler::SchedulerControl;
use crate::station::state::PersistedState;
use crate::station::telemetry::{PartialMetrics, TelemetryAggregator};
use crate::station::{chunker, MAX_INTERVAL_SECONDS, MIN_INTERVAL_SECONDS};
use crate::transport::{AckEvent, InboundMessage, OutgoingMessage, PeerId};

/// Cheaply clonable reply path: chunks, records and enqueues one outbound
/// text. Handed into worker tasks so they can reply without the server.
#[derive(Clone)]
pub struct Replier {
    ledger: Arc<ConversationLedger>,
    outgoing: mpsc::UnboundedSender<OutgoingMessage>,
    max_payload: usize,
}

impl Replier {
    /// Send `text` to `peer`, chunking as needed. Claims a send sequence and
    /// appends a Sent ledger entry. Transport loss is logged, not retried.
    pub fn send(&self, peer: &PeerId, text: &str) {
        let now = Utc::now();
        self.ledger.begin_send(peer, now);
        self.ledger.append(ConversationEntry {
            timestamp: now,
            peer: peer.clone(),
            direction: Direction::Sent,
            text: text.to_string(),
            signal: None,
        });
        for piece in chunker::chunk(text, self.max_payload) {
            if self
                .outgoing
                .send(OutgoingMessage {
                    to: peer.clone(),
                    content: piece,
                })
                .is_err()
            {
                let err = StationError::Transport("outgoing channel closed".to_string());
                log::warn!("reply to {peer} dropped: {err}");
                self.ledger.resolve_latest(
                    peer,
                    DeliveryStatus::NegativeAcknowledged(err.to_string()),
                    now,
                );
                return;
            }
        }
        log::debug!("reply queued for {peer}: {}", escape_log(text));
    }
}

pub struct StationServer {
    control: Arc<SchedulerControl>,
    telemetry: Arc<TelemetryAggregator>,
    ledger: Arc<ConversationLedger>,
    limiter: RateLimiter,
    responder: ResponderHandle,
    outgoing: mpsc::UnboundedSender<OutgoingMessage>,
    max_payload: usize,
    data_dir: Option<std::path::PathBuf>,
}

impl StationServer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        control: Arc<SchedulerControl>,
        telemetry: Arc<TelemetryAggregator>,
        ledger: Arc<ConversationLedger>,
        limiter: RateLimiter,
        responder: ResponderHandle,
        outgoing: mpsc::UnboundedSender<OutgoingMessage>,
        max_payload: usize,
        data_dir: Option<std::path::PathBuf>,
    ) -> Self {
        Self {
            control,
            telemetry,
            ledger,
            limiter,
            responder,
            outgoing,
            max_payload,
            data_dir,
        }
    }

    pub fn replier(&self) -> Replier {
        Replier {
            ledger: Arc::clone(&self.ledger),
            outgoing: self.outgoing.clone(),
            max_payload: self.max_payload,
        }
    }

    pub fn ledger(&self) -> Arc<ConversationLedger> {
        Arc::clone(&self.ledger)
    }

    pub fn control(&self) -> Arc<SchedulerControl> {
        Arc::clone(&self.control)
    }

    /// Drive the server from the transport's event streams until every
    /// stream has closed.
    pub async fn run(
        &self,
        mut inbound_rx: mpsc::UnboundedReceiver<InboundMessage>,
        mut ack_rx: mpsc::UnboundedReceiver<AckEvent>,
        mut telemetry_rx: mpsc::UnboundedReceiver<PartialMetrics>,
    ) {
        loop {
            tokio::select! {
                Some(msg) = inbound_rx.recv() => self.handle_inbound(msg),
                Some(ev) = ack_rx.recv() => self.handle_ack(ev),
                Some(partial) = telemetry_rx.recv() => self.telemetry.ingest(partial),
                else => {
                    log::info!("all transport streams closed, station loop exiting");
                    break;
                }
            }
        }
    }

    /// Bookkeep and classify one inbound message. Never blocks on the
    /// responder; replies happen from worker tasks.
    pub fn handle_inbound(&self, msg: InboundMessage) {
        self.telemetry.note_signal(msg.signal);
        self.telemetry.note_peer(&msg.peer, msg.hops_away);
        self.ledger.append(ConversationEntry {
            timestamp: msg.received_at,
            peer: msg.peer.clone(),
            direction: Direction::Received,
            text: msg.text.clone(),
            signal: Some(msg.signal),
        });

        let trusted = self.control.is_trusted(&msg.peer);
        let action = router::route(&msg.text, trusted, self.responder.accepts_free_text());
        log::debug!(
            "inbound from {} (trusted={trusted}): {} -> {action:?}",
            msg.peer,
            escape_log(&msg.text)
        );

        match action {
            RouterAction::Command(cmd) => {
                if let Some(reply) = self.handle_command(&msg.peer, cmd) {
                    self.replier().send(&msg.peer, &reply);
                }
            }
            RouterAction::FreeText => self.handle_free_text(&msg.peer, &msg.text, trusted),
            RouterAction::Log => {}
        }
    }

    /// Resolve an uncorrelated routing ack against the most recent pending
    /// send to that peer.
    pub fn handle_ack(&self, ev: AckEvent) {
        let status = if ev.success {
            DeliveryStatus::Acknowledged
        } else {
            DeliveryStatus::NegativeAcknowledged(
                ev.reason.unwrap_or_else(|| "unspecified".to_string()),
            )
        };
        if self.ledger.resolve_latest(&ev.peer, status, Utc::now()) {
            log::debug!("delivery status for {} updated", ev.peer);
        } else {
            log::debug!("unmatched ack from {} discarded", ev.peer);
        }
    }

    /// Execute one trusted control keyword. Returns the reply to send, or
    /// None when the reply will arrive asynchronously (model load).
    pub fn handle_command(&self, peer: &PeerId, cmd: Command) -> Option<String> {
        match cmd {
            Command::Stop => Some(if self.control.pause() {
                log::info!("auto-send paused by {peer}");
                "Auto-send paused. Send START to resume.".to_string()
            } else {
                "Auto-send is already paused.".to_string()
            }),
            Command::Start => Some(if self.control.resume() {
                log::info!("auto-send resumed by {peer}");
                "Auto-send resumed.".to_string()
            } else {
                "Auto-send is already running.".to_string()
            }),
            Command::Freq(seconds) => match self.control.set_interval(seconds) {
                Ok(prior) => {
                    log::info!("interval changed by {peer}: {prior}s -> {seconds}s");
                    self.persist();
                    Some(format!("Interval set to {seconds}s (was {prior}s)."))
                }
                Err(err) => Some(err.to_string()),
            },
            Command::FreqInvalid(arg) => {
                log::info!("rejected FREQ '{}' from {peer}", escape_log(&arg));
                Some(format!(
                    "FREQ needs a whole number of seconds between \
                     {MIN_INTERVAL_SECONDS} and {MAX_INTERVAL_SECONDS}."
                ))
            }
            Command::RadioCheck => Some(self.telemetry.render_radio_report()),
            Command::WeatherCheck => Some(self.telemetry.render_weather_report()),
            Command::Keywords => Some(router::keywords_reply()),
            Command::ResponderOn => self.handle_responder_on(peer),
            Command::ResponderOff => {
                self.responder.set_enabled(false);
                log::info!("responder disabled by {peer}");
                Some("Responder off.".to_string())
            }
        }
    }

    /// RESPONDERON. The model load can take seconds, so it runs on a
    /// blocking worker and the reply is sent when it resolves; the inbound
    /// path returns immediately.
    fn handle_responder_on(&self, peer: &PeerId) -> Option<String> {
        let backend = self.responder.backend();
        if !backend.is_available() {
            return Some("No responder model is configured.".to_string());
        }
        if backend.is_loaded() {
            self.responder.set_enabled(true);
            log::info!("responder enabled by {peer}");
            return Some("Responder on.".to_string());
        }
        if !self.responder.begin_load() {
            return Some("Responder is already loading.".to_string());
        }

        let responder = self.responder.clone();
        let replier = self.replier();
        let peer = peer.clone();
        tokio::spawn(async move {
            log::info!("loading responder model for {peer}");
            let loaded = tokio::task::spawn_blocking(move || backend.load())
                .await
                .unwrap_or(false);
            responder.finish_load();
            if loaded {
                responder.set_enabled(true);
                log::info!("responder model loaded, enabled by {peer}");
                replier.send(&peer, "Responder on.");
            } else {
                log::warn!("responder model load failed for {peer}");
                replier.send(&peer, "Responder load failed; still off.");
            }
        });
        None
    }

    /// Free-text path: rate limit untrusted peers, then generate a reply on
    /// a blocking worker.
    fn handle_free_text(&self, peer: &PeerId, text: &str, trusted: bool) {
        if !trusted {
            match self.limiter.check(peer) {
                RateDecision::Allowed => {}
                RateDecision::Limited { notify: true } => {
                    log::info!("rate limited {peer}, sending notice");
                    self.replier()
                        .send(peer, "Rate limited; please retry later.");
                    return;
                }
                RateDecision::Limited { notify: false } => {
                    log::debug!("rate limited {peer}, already notified this window");
                    return;
                }
            }
        }

        let backend = self.responder.backend();
        let replier = self.replier();
        let peer = peer.clone();
        let prompt = text.to_string();
        tokio::spawn(async move {
            let reply = tokio::task::spawn_blocking(move || backend.generate(&prompt))
                .await
                .unwrap_or(None);
            match reply {
                Some(reply) if !reply.trim().is_empty() => replier.send(&peer, reply.trim()),
                _ => log::warn!("responder produced no reply for {peer}"),
            }
        });
    }

    /// Write the minimal resume-after-restart snapshot, if persistence is
    /// configured.
    pub fn persist(&self) {
        let Some(data_dir) = &self.data_dir else {
            return;
        };
        let snapshot = self.control.snapshot();
        let state = PersistedState {
            enabled: snapshot.enabled,
            interval_seconds: snapshot.interval_seconds,
            target_peers: snapshot.target_peers,
        };
        if let Err(err) = state.save(data_dir) {
            log::warn!("failed to persist station state: {err}");
        }
    }
}
