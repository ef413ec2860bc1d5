use thiserror::Error;

/// Errors that can arise inside the station core.
///
/// Everything here is locally recoverable; none of these abort the scheduler
/// or the inbound loop.
#[derive(Debug, Error)]
pub enum StationError {
    /// Requested auto-send interval falls outside the permitted range.
    #[error("interval {0}s out of range (allowed 30-3600)")]
    IntervalOutOfRange(u32),

    /// The outbound channel to the transport is gone.
    #[error("transport unavailable: {0}")]
    Transport(String),

    /// Wrapper around IO errors (state file, data directory creation).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around JSON serialization of the persisted state file.
    #[error("state serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
