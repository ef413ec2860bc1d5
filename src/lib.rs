//! # Meshbeacon - Telemetry Beacon Station for Meshtastic Networks
//!
//! Meshbeacon is a remote-controllable telemetry station for Meshtastic mesh
//! networks. It periodically transmits a telemetry digest to a configured set
//! of target peers and accepts short control keywords from those peers over
//! the radio channel.
//!
//! ## Features
//!
//! - **Auto-Send Scheduler**: Periodic telemetry digests to target peers, with
//!   pause/resume and interval changes issued remotely by keyword.
//! - **Command Keywords**: `STOP`, `START`, `FREQ<n>`, `RADIOCHECK`,
//!   `WEATHERCHECK`, `KEYWORDS`, `RESPONDERON`, `RESPONDEROFF` accepted from
//!   trusted peers, case-insensitive.
//! - **Telemetry Aggregation**: Device and environment metric fragments are
//!   coalesced into complete readings.
//! - **Conversational Responder**: Optional pluggable model replies to
//!   free-text messages, rate-limited per peer for untrusted senders.
//! - **Delivery Tracking**: Per-peer conversation log and latest delivery
//!   status from routing acknowledgments.
//! - **Async Design**: Built with Tokio; the inbound packet path never blocks
//!   on model loading or transmission.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meshbeacon::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Station: {}", config.station.name);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`station`] - Command routing, scheduling, rate limiting, chunking,
//!   ledger and telemetry aggregation
//! - [`transport`] - Channel-level contract between the core and a device
//!   backend
//! - [`config`] - Configuration management and validation

pub mod config;
pub mod logutil;
pub mod station;
pub mod transport;
