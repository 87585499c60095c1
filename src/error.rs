// src/error.rs
use thiserror::Error;

/// Feed could not be obtained or understood. Fatal to a run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source:#}")]
    Network {
        url: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("HTTP error! status: {status} ({url})")]
    Status { url: String, status: u16 },
    #[error("feed document could not be parsed: {0}")]
    Parse(String),
}

/// Seen-set persistence failed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored value under '{key}' is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("storage backend: {0}")]
    Backend(String),
}
