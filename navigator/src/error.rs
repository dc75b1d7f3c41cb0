//! Error types for navigation setup and telemetry.

use std::path::PathBuf;

use thiserror::Error;

/// Setup errors. None of these can happen once the control loop runs.
#[derive(Debug, Error)]
pub enum NavError {
    /// The waypoint list was empty.
    #[error("at least one waypoint is required")]
    NoWaypoints,

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`crate::NavConfig`].
    #[error("failed to parse {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// A failed telemetry fetch. Always recoverable: the tick is skipped.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("server returned status {0}")]
    Status(u16),

    /// The response body was not a valid game snapshot.
    #[error("malformed game state: {0}")]
    Decode(String),

    /// No response within the configured fetch timeout.
    #[error("no game state within {0} ms")]
    Timeout(u64),
}
