//! Telemetry aggregation and digest rendering.
//!
//! Device metrics (battery, voltage, channel utilization) and environment
//! metrics (temperature, humidity, pressure) arrive in separate packets that
//! describe the same moment. Fragments landing within a short coalescing
//! window are merged field by field into the newest sample instead of
//! starting a new one, so `latest()` usually has a complete picture.
//!
//! Signal quality (SNR/RSSI) is tracked separately from the sample history:
//! every inbound packet carries it, not just telemetry frames.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::transport::{PeerId, SignalInfo};

/// Fragments arriving closer together than this merge into one sample.
const COALESCE_WINDOW_SECS: i64 = 5;

/// Bounded in-memory sample history.
const HISTORY_CAP: usize = 50;

/// One partial metric report as decoded off the wire. Every field optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartialMetrics {
    pub battery_percent: Option<u32>,
    pub voltage: Option<f32>,
    pub channel_util_percent: Option<f32>,
    pub air_util_percent: Option<f32>,
    pub temperature_c: Option<f32>,
    pub humidity_percent: Option<f32>,
    pub pressure_hpa: Option<f32>,
}

/// A coalesced telemetry reading.
#[derive(Debug, Clone, Copy)]
pub struct TelemetrySample {
    pub captured_at: DateTime<Utc>,
    pub battery_percent: Option<u32>,
    pub voltage: Option<f32>,
    pub channel_util_percent: Option<f32>,
    pub air_util_percent: Option<f32>,
    pub temperature_c: Option<f32>,
    pub humidity_percent: Option<f32>,
    pub pressure_hpa: Option<f32>,
}

impl TelemetrySample {
    fn from_partial(partial: &PartialMetrics, now: DateTime<Utc>) -> Self {
        Self {
            captured_at: now,
            battery_percent: partial.battery_percent,
            voltage: partial.voltage,
            channel_util_percent: partial.channel_util_percent,
            air_util_percent: partial.air_util_percent,
            temperature_c: partial.temperature_c,
            humidity_percent: partial.humidity_percent,
            pressure_hpa: partial.pressure_hpa,
        }
    }

    fn merge(&mut self, partial: &PartialMetrics, now: DateTime<Utc>) {
        if partial.battery_percent.is_some() {
            self.battery_percent = partial.battery_percent;
        }
        if partial.voltage.is_some() {
            self.voltage = partial.voltage;
        }
        if partial.channel_util_percent.is_some() {
            self.channel_util_percent = partial.channel_util_percent;
        }
        if partial.air_util_percent.is_some() {
            self.air_util_percent = partial.air_util_percent;
        }
        if partial.temperature_c.is_some() {
            self.temperature_c = partial.temperature_c;
        }
        if partial.humidity_percent.is_some() {
            self.humidity_percent = partial.humidity_percent;
        }
        if partial.pressure_hpa.is_some() {
            self.pressure_hpa = partial.pressure_hpa;
        }
        self.captured_at = now;
    }
}

#[derive(Default)]
struct AggregatorInner {
    history: VecDeque<TelemetrySample>,
    signal: SignalInfo,
    // Peers heard so far, with the last known hop distance per peer. The
    // full mesh node table lives in the transport; this is what the event
    // streams let us know.
    heard: HashMap<PeerId, Option<u32>>,
}

/// Shared telemetry state. No I/O happens inside the critical section.
#[derive(Default)]
pub struct TelemetryAggregator {
    inner: Mutex<AggregatorInner>,
}

impl TelemetryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one partial report with the current wall clock.
    pub fn ingest(&self, partial: PartialMetrics) {
        self.ingest_at(partial, Utc::now());
    }

    /// Clock-injected variant of [`ingest`](Self::ingest).
    pub fn ingest_at(&self, partial: PartialMetrics, now: DateTime<Utc>) {
        let mut inner = self.inner.lock().expect("telemetry mutex poisoned");
        let coalesce = inner.history.back().is_some_and(|last| {
            (now - last.captured_at).num_seconds().abs() < COALESCE_WINDOW_SECS
        });
        if coalesce {
            inner
                .history
                .back_mut()
                .expect("history non-empty")
                .merge(&partial, now);
        } else {
            if inner.history.len() >= HISTORY_CAP {
                inner.history.pop_front();
            }
            inner
                .history
                .push_back(TelemetrySample::from_partial(&partial, now));
        }
    }

    /// Most recent coalesced sample, if any telemetry was seen yet.
    pub fn latest(&self) -> Option<TelemetrySample> {
        let inner = self.inner.lock().expect("telemetry mutex poisoned");
        inner.history.back().copied()
    }

    pub fn sample_count(&self) -> usize {
        let inner = self.inner.lock().expect("telemetry mutex poisoned");
        inner.history.len()
    }

    /// Record signal quality from any inbound packet.
    pub fn note_signal(&self, signal: SignalInfo) {
        let mut inner = self.inner.lock().expect("telemetry mutex poisoned");
        if signal.snr_db.is_some() {
            inner.signal.snr_db = signal.snr_db;
        }
        if signal.rssi_dbm.is_some() {
            inner.signal.rssi_dbm = signal.rssi_dbm;
        }
    }

    pub fn latest_signal(&self) -> SignalInfo {
        let inner = self.inner.lock().expect("telemetry mutex poisoned");
        inner.signal
    }

    /// Record that `peer` was heard, with its hop distance when the packet
    /// carried one. A packet without hop info keeps the last known value.
    pub fn note_peer(&self, peer: &PeerId, hops_away: Option<u32>) {
        let mut inner = self.inner.lock().expect("telemetry mutex poisoned");
        let slot = inner.heard.entry(peer.clone()).or_insert(None);
        if hops_away.is_some() {
            *slot = hops_away;
        }
    }

    /// Number of distinct peers heard so far.
    pub fn peers_heard(&self) -> usize {
        let inner = self.inner.lock().expect("telemetry mutex poisoned");
        inner.heard.len()
    }

    /// Render the periodic digest sent to target peers.
    ///
    /// Field order is fixed: clock, hop distance to the recipient (when
    /// known), environment readings, signal quality, power, network
    /// utilization, then the count of peers heard. Fields without data are
    /// omitted. A battery reading of 101 means externally powered.
    pub fn render_digest(&self, now: DateTime<Utc>, for_peer: Option<&PeerId>) -> String {
        let (sample, signal, hops, heard_count) = {
            let inner = self.inner.lock().expect("telemetry mutex poisoned");
            let hops = for_peer.and_then(|peer| inner.heard.get(peer).copied().flatten());
            (
                inner.history.back().copied(),
                inner.signal,
                hops,
                inner.heard.len(),
            )
        };

        let mut lines = vec![format!("⏰ {}", now.format("%H:%M:%S"))];
        if let Some(hops) = hops.filter(|&h| h > 0) {
            lines.push(format!("🔗 Hops: {hops}"));
        }
        if let Some(sample) = sample {
            if let Some(temp_c) = sample.temperature_c {
                lines.push(format!("🌡️ {:.1}°F", c_to_f(temp_c)));
            }
            if let Some(humidity) = sample.humidity_percent {
                lines.push(format!("💧 {humidity:.1}%"));
            }
            if let Some(pressure) = sample.pressure_hpa {
                lines.push(format!("🔘 {pressure:.1}hPa"));
            }
            if let Some(snr) = signal.snr_db {
                lines.push(format!("📶 SNR: {snr:.1}dB"));
            }
            if let Some(rssi) = signal.rssi_dbm {
                lines.push(format!("📡 RSSI: {rssi}dBm"));
            }
            if let Some(battery) = sample.battery_percent {
                lines.push(render_battery(battery));
            }
            if let Some(voltage) = sample.voltage {
                lines.push(format!("⚡ {voltage:.2}V"));
            }
            if let Some(ch) = sample.channel_util_percent {
                lines.push(format!("📻 CH:{ch:.1}%"));
            }
            if let Some(air) = sample.air_util_percent {
                lines.push(format!("🌐 Air:{air:.1}%"));
            }
        }
        if heard_count > 0 {
            lines.push(format!("👥 {heard_count}"));
        }
        lines.join(" | ")
    }

    /// Reply body for a signal-quality query.
    pub fn render_radio_report(&self) -> String {
        let (sample, signal) = {
            let inner = self.inner.lock().expect("telemetry mutex poisoned");
            (inner.history.back().copied(), inner.signal)
        };

        let mut lines = Vec::new();
        if let Some(snr) = signal.snr_db {
            lines.push(format!("📶 SNR: {snr:.1}dB"));
        }
        if let Some(rssi) = signal.rssi_dbm {
            lines.push(format!("📡 RSSI: {rssi}dBm"));
        }
        if let Some(sample) = sample {
            if let Some(ch) = sample.channel_util_percent {
                lines.push(format!("📻 CH:{ch:.1}%"));
            }
            if let Some(air) = sample.air_util_percent {
                lines.push(format!("🌐 Air:{air:.1}%"));
            }
        }
        if lines.is_empty() {
            "No signal data yet".to_string()
        } else {
            lines.join(" | ")
        }
    }

    /// Reply body for an environment-sensor query.
    pub fn render_weather_report(&self) -> String {
        let sample = self.latest();
        let mut lines = Vec::new();
        if let Some(sample) = sample {
            if let Some(temp_c) = sample.temperature_c {
                lines.push(format!("🌡️ {:.1}°F", c_to_f(temp_c)));
            }
            if let Some(humidity) = sample.humidity_percent {
                lines.push(format!("💧 {humidity:.1}%"));
            }
            if let Some(pressure) = sample.pressure_hpa {
                lines.push(format!("🔘 {pressure:.1}hPa"));
            }
        }
        if lines.is_empty() {
            "No weather data yet".to_string()
        } else {
            lines.join(" | ")
        }
    }
}

fn c_to_f(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

fn render_battery(percent: u32) -> String {
    // 101 is the firmware's "on external power" sentinel.
    if percent == 101 {
        "🔋 PWR".to_string()
    } else {
        format!("🔋 {percent}%")
    }
}
