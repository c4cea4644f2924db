//! Error types for the tracker facade.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`Tracker`](crate::Tracker) operations.
///
/// The storage layer (`EventLog`, `View`, snapshots) speaks `std::io::Error`;
/// those failures arrive here as [`TrackerError::Io`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TrackerError {
    /// Filesystem or storage failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configuration file is not valid TOML.
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Another writer holds the lock on the event log.
    #[error("event log is locked by another writer: {}", path.display())]
    LockHeld { path: PathBuf },

    /// No view with this name is registered.
    #[error("view not found: {0}")]
    ViewNotFound(String),

    /// A view exists under this name but with a different state type.
    #[error("view type mismatch: {0}")]
    ViewTypeMismatch(String),

    /// An outcome was recorded while no impulse is awaiting one.
    #[error("no active impulse to resolve")]
    NoActiveImpulse,

    /// An outcome names an impulse other than the active one.
    #[error("outcome references impulse {requested}, but the active impulse is {active}")]
    OutcomeMismatch { active: String, requested: String },

    /// The clock has not moved past the active impulse's start, so an
    /// outcome written now would not resolve it.
    #[error("outcome at {at} is not after impulse {impulse} started at {started}")]
    OutcomeNotAfterImpulse {
        impulse: String,
        started: DateTime<Utc>,
        at: DateTime<Utc>,
    },

    /// A payload failed validation before being written.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
