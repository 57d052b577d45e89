//! Typed error hierarchy for EcosystIA.
//!
//! Three enums cover the three library subsystems:
//! - `ApiError`: REST client and service-module failures
//! - `StorageError`: client-local storage backends
//! - `SupervisorError`: process supervisor configuration and spawning
//!
//! The HTTP server renders its own failures through `server::ServerError`.

use thiserror::Error;

/// Errors from the API client and the service modules built on it.
///
/// Nothing in the service layer catches or reinterprets these; they are
/// returned to the caller as-is.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid API URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Backend returned {status} for {path}")]
    Status {
        status: u16,
        path: String,
        /// Backend error payload, or the raw text wrapped in a JSON string
        /// when the body was not JSON.
        body: serde_json::Value,
    },

    #[error("Failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// HTTP status of a backend rejection, if this error is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage quota exceeded: writing '{key}' needs {needed} bytes, limit is {limit}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    #[error("Storage file {path} is corrupt: {source}")]
    Corrupt {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Errors from the process supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to read supervisor config at {path}: {source}")]
    ConfigRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid supervisor config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid supervisor config: {0}")]
    Invalid(String),

    #[error("Failed to open log file {path}: {source}")]
    LogFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn instance {instance} of '{command}': {source}")]
    SpawnFailed {
        instance: usize,
        command: String,
        #[source]
        source: std::io::Error,
    },
}
