//! Binary entrypoint for the meshbeacon CLI.
//!
//! Commands:
//! - `start [--port <path>]` - run the station, optionally connecting to a device
//! - `init` - create a starter `config.toml`
//! - `status` - print the persisted scheduler state and a brief summary
//!
//! See the library crate docs for module-level details: `meshbeacon::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use meshbeacon::config::Config;
use meshbeacon::station::ledger::ConversationLedger;
use meshbeacon::station::limiter::RateLimiter;
use meshbeacon::station::responder::{NullResponder, ResponderHandle};
use meshbeacon::station::scheduler::{start_autosend, SchedulerControl};
use meshbeacon::station::server::StationServer;
use meshbeacon::station::state::PersistedState;
use meshbeacon::station::telemetry::TelemetryAggregator;
use meshbeacon::transport::{OutgoingMessage, PeerId};

#[derive(Parser)]
#[command(name = "meshbeacon")]
#[command(about = "A telemetry beacon and remote-control station for Meshtastic mesh networks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the station
    Start {
        /// Meshtastic device port (e.g., /dev/ttyUSB0)
        #[arg(short, long)]
        port: Option<String>,
    },
    /// Initialize a new station configuration
    Init,
    /// Show station status from config and persisted state
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config early to configure logging (except for Init which writes it)
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Start { port } => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            info!("Starting meshbeacon v{}", env!("CARGO_PKG_VERSION"));

            let chosen_port = port.or_else(|| {
                if config.meshtastic.port.is_empty() {
                    None
                } else {
                    Some(config.meshtastic.port.clone())
                }
            });
            match chosen_port {
                Some(port_path) => {
                    // Device transports attach through the channel contract in
                    // `meshbeacon::transport`; the core runs the same either way.
                    if config.meshtastic.require_device_at_startup {
                        anyhow::bail!(
                            "no device transport is compiled in, but \
                             require_device_at_startup is set (port {port_path})"
                        );
                    }
                    warn!(
                        "Device on {} not attached in this build (station continuing without device)",
                        port_path
                    );
                }
                None => {
                    info!("No --port specified and no configured device port set; starting without device.");
                }
            }

            run_station(config).await?;
        }
        Commands::Init => {
            info!("Initializing new station configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Status => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            let state = PersistedState::load(PathBuf::from(&config.storage.data_dir).as_path())?;
            println!("Station:   {}", config.station.name);
            println!("Auto-send: {}", if state.enabled { "enabled" } else { "disabled" });
            println!("Interval:  {}s", state.interval_seconds);
            println!("Targets:   {}", peer_list(&state.target_peers));
        }
    }

    Ok(())
}

fn peer_list(peers: &BTreeSet<PeerId>) -> String {
    if peers.is_empty() {
        "(none)".to_string()
    } else {
        peers
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Build the shared structures, restore persisted state, and run the event
/// loop until shutdown.
async fn run_station(config: Config) -> Result<()> {
    let data_dir = PathBuf::from(&config.storage.data_dir);
    let persisted = PersistedState::load(&data_dir)?;

    // Persisted state wins over config defaults once it exists.
    let (enabled, interval, targets) = if data_dir.join("station_state.json").exists() {
        (
            persisted.enabled,
            persisted.interval_seconds,
            persisted.target_peers,
        )
    } else {
        (
            config.scheduler.enabled,
            config.scheduler.clamped_interval(),
            config.scheduler.target_peers.iter().cloned().collect(),
        )
    };
    info!(
        "Scheduler: enabled={} interval={}s targets={}",
        enabled,
        interval,
        targets.len()
    );

    let control = Arc::new(SchedulerControl::new(enabled, interval, targets));
    let telemetry = Arc::new(TelemetryAggregator::new());
    let ledger = Arc::new(ConversationLedger::new());
    let limiter = RateLimiter::new(
        config.rate_limit.max_per_window,
        i64::from(config.rate_limit.window_seconds),
    );
    if config.responder.model_path.is_some() {
        warn!("responder.model_path set, but no model backend is compiled into this build");
    }
    let responder = ResponderHandle::new(Arc::new(NullResponder));

    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<OutgoingMessage>();
    let (_inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (_ack_tx, ack_rx) = mpsc::unbounded_channel();
    let (_telemetry_tx, telemetry_rx) = mpsc::unbounded_channel();

    // Without a device the outbound queue drains to the log so the rest of
    // the station stays observable.
    tokio::spawn(async move {
        while let Some(msg) = outgoing_rx.recv().await {
            info!(
                "TX (no device) -> {}: {}",
                msg.to,
                meshbeacon::logutil::escape_log(&msg.content)
            );
        }
    });

    let autosend = start_autosend(
        Arc::clone(&control),
        Arc::clone(&telemetry),
        Arc::clone(&ledger),
        outgoing_tx.clone(),
        config.station.max_payload_bytes,
    );

    let server = StationServer::new(
        control,
        telemetry,
        ledger,
        limiter,
        responder,
        outgoing_tx,
        config.station.max_payload_bytes,
        Some(data_dir),
    );

    info!("Station running; press Ctrl-C to stop");
    tokio::select! {
        _ = server.run(inbound_rx, ack_rx, telemetry_rx) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }
    autosend.shutdown().await;
    server.persist();
    info!("Station stopped");
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Config level applies unless the CLI asked for more.
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .map(|cfg| cfg.logging.level_filter())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    if let Some(file) = config.as_ref().and_then(|cfg| cfg.logging.file.clone()) {
        if let Ok(f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
        {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));

            // When stdout is a terminal, mirror log lines to the console.
            let is_tty = atty::is(atty::Stream::Stdout);

            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        } else {
            builder.format(|fmt, record| {
                writeln!(
                    fmt,
                    "{} [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.args()
                )
            });
        }
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
