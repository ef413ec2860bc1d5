//! Minimal persisted scheduler state.
//!
//! Only the subset needed to resume after a restart is written: enablement,
//! interval and the target set. Paused-state, rate windows, delivery status
//! and the conversation ledger are process-lifetime by design.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::station::error::StationError;
use crate::station::{MAX_INTERVAL_SECONDS, MIN_INTERVAL_SECONDS};
use crate::transport::PeerId;

const STATE_FILE: &str = "station_state.json";

fn default_interval() -> u32 {
    MIN_INTERVAL_SECONDS
}

/// Schema-stable snapshot written to `station_state.json` in the data dir.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub enabled: bool,
    #[serde(default = "default_interval")]
    pub interval_seconds: u32,
    #[serde(default)]
    pub target_peers: BTreeSet<PeerId>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: default_interval(),
            target_peers: BTreeSet::new(),
        }
    }
}

impl PersistedState {
    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join(STATE_FILE)
    }

    /// Load from the data dir; a missing file yields the defaults. Intervals
    /// from older or hand-edited files are clamped into range.
    pub fn load(data_dir: &Path) -> Result<Self, StationError> {
        let path = Self::path_in(data_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        let mut state: Self = serde_json::from_str(&raw)?;
        state.interval_seconds = state
            .interval_seconds
            .clamp(MIN_INTERVAL_SECONDS, MAX_INTERVAL_SECONDS);
        Ok(state)
    }

    /// Write to the data dir, creating it if needed. The file is replaced
    /// via a temporary sibling so a crash mid-write cannot truncate it.
    pub fn save(&self, data_dir: &Path) -> Result<(), StationError> {
        std::fs::create_dir_all(data_dir)?;
        let path = Self::path_in(data_dir);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}
