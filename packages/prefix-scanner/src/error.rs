//! Typed errors for the prefix scanner.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Probe failures are not
//! errors at this level: rate limits and transport failures surface as
//! [`ProbeOutcome`](crate::classifier::ProbeOutcome) variants so that a single
//! bad request never aborts a scan.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop a scan before dispatch begins.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Prefix length outside the supported range
    #[error("prefix length must be between 1 and {max}, got {length}")]
    InvalidLength { length: usize, max: usize },

    /// A candidate string that is not lowercase hex of a supported length
    #[error("invalid candidate {value:?}: {reason}")]
    InvalidCandidate { value: String, reason: String },

    /// The stored cursor belongs to a differently sized search space
    #[error("checkpoint cursor {cursor} does not fit a {length}-character search space")]
    CursorMismatch { cursor: String, length: usize },

    /// Concurrency bound of zero
    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    /// Repository identifier is not `owner/repo`
    #[error("invalid repository {0:?}: expected owner/repo")]
    InvalidRepository(String),

    /// URL template does not produce a valid URL
    #[error("invalid URL template: {0}")]
    InvalidTemplate(String),

    /// Environment override could not be parsed
    #[error("invalid value {value:?} for {key}")]
    InvalidConfig { key: String, value: String },

    /// Checkpoint could not be read at startup
    #[error("checkpoint unavailable: {0}")]
    Checkpoint(#[from] PersistenceError),
}

/// Errors raised by a [`Fetcher`](crate::fetch::Fetcher).
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request did not finish within the probe timeout
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Connection, TLS or protocol failure
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors raised by checkpoint stores and match recorders.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem operation failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored value is not a valid candidate
    #[error("corrupt record in {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Backend refused the write
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for scan setup.
pub type ScanResult<T> = std::result::Result<T, ScanError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for persistence operations.
pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;
