//! Station core: command routing, auto-send scheduling, rate limiting,
//! chunking, the conversation ledger and telemetry aggregation.

pub mod chunker;
pub mod error;
pub mod ledger;
pub mod limiter;
pub mod responder;
pub mod router;
pub mod scheduler;
pub mod server;
pub mod state;
pub mod telemetry;

/// Shortest auto-send interval peers may request.
pub const MIN_INTERVAL_SECONDS: u32 = 30;

/// Longest auto-send interval peers may request.
pub const MAX_INTERVAL_SECONDS: u32 = 3600;
