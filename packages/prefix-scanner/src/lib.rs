//! Resumable Hex-Prefix Scanner
//!
//! Walks every fixed-length lowercase hex prefix in order, asks a remote
//! endpoint whether each one resolves, and records the ones that do. Built
//! for finding commits that a hosting service still serves by short SHA.
//!
//! # Design
//!
//! - Bounded concurrency, checkpointed in completion order
//! - Rate-limit responses pause new submissions without losing work
//! - Cancellation drains in-flight probes before returning
//! - Fetching, checkpoints and match output are traits, so tests run offline
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prefix_scanner::{
//!     shutdown, FileCheckpointStore, FileMatchLog, HttpFetcher, ScanConfig, ScanEngine,
//!     UrlTemplate,
//! };
//!
//! let engine = ScanEngine::new(
//!     UrlTemplate::github_commit("owner/repo")?,
//!     Arc::new(HttpFetcher::new()?),
//!     Arc::new(FileCheckpointStore::default()),
//!     Arc::new(FileMatchLog::default()),
//! )
//! .with_config(ScanConfig::from_env()?);
//!
//! shutdown::listen(engine.shutdown_token());
//! let report = engine.run().await?;
//! println!("{report}");
//! ```
//!
//! # Modules
//!
//! - [`candidate`] - Hex prefix value type
//! - [`space`] - Ordered enumeration and resume
//! - [`checkpoint`] - Cursor persistence and checkpoint policies
//! - [`matches`] - Match log
//! - [`fetch`] - Fetcher trait and HTTP implementation
//! - [`classifier`] - Response to outcome mapping
//! - [`engine`] - Bounded dispatch loop
//! - [`shutdown`] - Signal handling
//! - [`testing`] - Mock implementations for testing

pub mod candidate;
pub mod checkpoint;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod matches;
pub mod report;
pub mod shutdown;
pub mod space;
pub mod testing;
pub mod url_template;

// Re-export core types at crate root
pub use candidate::Candidate;
pub use checkpoint::{CheckpointPolicy, CheckpointStore, FileCheckpointStore, Watermark};
pub use classifier::{classify, ProbeOutcome};
pub use config::ScanConfig;
pub use engine::{EngineState, ScanEngine};
pub use error::{
    FetchError, FetchResult, PersistenceError, PersistenceResult, ScanError, ScanResult,
};
pub use fetch::{FetchResponse, Fetcher, HttpFetcher};
pub use matches::{FileMatchLog, MatchRecorder};
pub use report::{ScanReport, StopReason};
pub use space::{CandidateSpace, Candidates};
pub use url_template::UrlTemplate;
