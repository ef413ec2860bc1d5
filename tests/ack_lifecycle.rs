mod common;

use common::{build_station, inbound};
use std::sync::Arc;

use meshbeacon::station::ledger::DeliveryStatus;
use meshbeacon::station::responder::NullResponder;
use meshbeacon::transport::{AckEvent, PeerId};

const TRUSTED: &str = "!aabbccdd";

#[tokio::test]
async fn reply_send_goes_pending_then_acknowledged() {
    let station = build_station(&[TRUSTED], Arc::new(NullResponder));
    let peer = PeerId::from(TRUSTED);

    station.server.handle_inbound(inbound(TRUSTED, "KEYWORDS"));
    assert_eq!(
        station.server.ledger().delivery_status(&peer),
        DeliveryStatus::Pending
    );

    station.server.handle_ack(AckEvent {
        peer: peer.clone(),
        success: true,
        reason: None,
    });
    assert_eq!(
        station.server.ledger().delivery_status(&peer),
        DeliveryStatus::Acknowledged
    );
}

#[tokio::test]
async fn failed_delivery_records_the_reason() {
    let station = build_station(&[TRUSTED], Arc::new(NullResponder));
    let peer = PeerId::from(TRUSTED);

    station.server.handle_inbound(inbound(TRUSTED, "KEYWORDS"));
    station.server.handle_ack(AckEvent {
        peer: peer.clone(),
        success: false,
        reason: Some("MAX_RETRANSMIT".to_string()),
    });
    assert_eq!(
        station.server.ledger().delivery_status(&peer),
        DeliveryStatus::NegativeAcknowledged("MAX_RETRANSMIT".to_string())
    );
}

#[tokio::test]
async fn duplicate_ack_does_not_flip_a_resolved_status() {
    let station = build_station(&[TRUSTED], Arc::new(NullResponder));
    let peer = PeerId::from(TRUSTED);

    station.server.handle_inbound(inbound(TRUSTED, "KEYWORDS"));
    station.server.handle_ack(AckEvent {
        peer: peer.clone(),
        success: true,
        reason: None,
    });
    // A late duplicate with a failure outcome finds nothing pending.
    station.server.handle_ack(AckEvent {
        peer: peer.clone(),
        success: false,
        reason: Some("stale".to_string()),
    });
    assert_eq!(
        station.server.ledger().delivery_status(&peer),
        DeliveryStatus::Acknowledged
    );
}

#[tokio::test]
async fn ack_from_unknown_peer_is_discarded() {
    let station = build_station(&[TRUSTED], Arc::new(NullResponder));
    let ghost = PeerId::from("!00000000");
    station.server.handle_ack(AckEvent {
        peer: ghost.clone(),
        success: true,
        reason: None,
    });
    assert_eq!(
        station.server.ledger().delivery_status(&ghost),
        DeliveryStatus::Unknown
    );
}
