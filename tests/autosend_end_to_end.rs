mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use meshbeacon::station::ledger::{ConversationLedger, DeliveryStatus};
use meshbeacon::station::scheduler::{start_autosend, SchedulerControl};
use meshbeacon::station::telemetry::{PartialMetrics, TelemetryAggregator};
use meshbeacon::transport::PeerId;

fn two_targets() -> BTreeSet<PeerId> {
    [PeerId::from("!aaaa0001"), PeerId::from("!aaaa0002")]
        .into_iter()
        .collect()
}

/// Interval arithmetic drives a batch exactly when 31s have elapsed on a
/// 30s interval, stamping `last_send_at` to the batch-initiation time.
#[test]
fn thirty_one_seconds_after_a_send_a_new_batch_is_due() {
    let control = SchedulerControl::new(true, 30, two_targets());
    let t0: chrono::DateTime<chrono::Utc> = "2026-03-01T00:00:00Z".parse().unwrap();

    let first = control.claim_due(t0).expect("first batch due immediately");
    assert_eq!(first.len(), 2);

    assert!(control.claim_due(t0 + chrono::Duration::seconds(29)).is_none());
    let t31 = t0 + chrono::Duration::seconds(31);
    let second = control.claim_due(t31).expect("due after interval");
    assert_eq!(second.len(), 2);
    assert_eq!(control.snapshot().last_send_at, Some(t31));
}

/// One tick-loop pass produces exactly one batch: one digest per target
/// peer, each with a Pending delivery slot and a Sent ledger entry.
#[tokio::test(start_paused = true)]
async fn loop_sends_one_batch_per_due_window() {
    let control = Arc::new(SchedulerControl::new(true, 30, two_targets()));
    let telemetry = Arc::new(TelemetryAggregator::new());
    telemetry.ingest(PartialMetrics {
        battery_percent: Some(76),
        ..Default::default()
    });
    let ledger = Arc::new(ConversationLedger::new());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = start_autosend(
        Arc::clone(&control),
        Arc::clone(&telemetry),
        Arc::clone(&ledger),
        tx,
        200,
    );

    // A few virtual ticks; only the first can be due because the chrono
    // clock has barely moved.
    tokio::time::sleep(Duration::from_secs(5)).await;
    handle.shutdown().await;

    let mut sent = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        sent.push(msg);
    }
    assert_eq!(sent.len(), 2, "one digest per target peer");
    let mut peers: Vec<String> = sent.iter().map(|m| m.to.to_string()).collect();
    peers.sort();
    assert_eq!(peers, vec!["!aaaa0001", "!aaaa0002"]);
    for msg in &sent {
        assert!(msg.content.contains("🔋 76%"));
        assert_eq!(ledger.delivery_status(&msg.to), DeliveryStatus::Pending);
        assert_eq!(ledger.recent(&msg.to, 10).len(), 1);
    }
    assert!(control.snapshot().last_send_at.is_some());
}

/// A paused scheduler produces no batches even across many ticks.
#[tokio::test(start_paused = true)]
async fn paused_loop_stays_silent() {
    let control = Arc::new(SchedulerControl::new(true, 30, two_targets()));
    control.pause();
    let telemetry = Arc::new(TelemetryAggregator::new());
    let ledger = Arc::new(ConversationLedger::new());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = start_autosend(control, telemetry, ledger, tx, 200);
    tokio::time::sleep(Duration::from_secs(10)).await;
    handle.shutdown().await;

    assert!(rx.try_recv().is_err());
}
