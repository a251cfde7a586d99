use std::path::PathBuf;

use thiserror::Error;

/// Failures while talking to the weather archive.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network request to weather archive failed")]
    Network(#[source] reqwest::Error),

    #[error("Weather archive request failed with status {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },

    #[error("Failed to parse weather archive response")]
    Parse(#[source] serde_json::Error),

    #[error("Weather archive response is missing daily variable {index} ('{name}')")]
    MissingVariable { index: usize, name: &'static str },

    #[error("Weather archive response has {values} daily values but no timestamps")]
    MissingTime { values: usize },

    #[error("Weather archive response contained no locations")]
    EmptyResponse,

    #[error("Response cache I/O failed at '{0}'")]
    Cache(PathBuf, #[source] std::io::Error),
}

impl FetchError {
    /// Whether this came from the transport rather than from the payload.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Status { .. })
    }
}

/// Failures while writing to or reading from the weather store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Stored date '{0}' is not a valid YYYY-MM-DD date")]
    InvalidDate(String),
}
