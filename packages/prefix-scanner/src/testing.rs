//! Testing utilities including mock implementations.
//!
//! These let applications drive a [`ScanEngine`](crate::engine::ScanEngine)
//! without network access or files on disk.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::candidate::Candidate;
use crate::checkpoint::CheckpointStore;
use crate::error::{FetchError, FetchResult, PersistenceError, PersistenceResult};
use crate::fetch::{FetchResponse, Fetcher};
use crate::matches::MatchRecorder;

#[derive(Debug, Clone)]
enum Script {
    Status(u16),
    Error(String),
    Hang,
    Panic,
}

/// Record of a request made to the mock fetcher.
#[derive(Debug, Clone)]
pub struct FetchCall {
    /// Last path segment of the URL
    pub candidate: String,
    pub url: String,
    pub started: Instant,
}

/// A fetcher that answers from a script keyed by candidate.
///
/// The candidate is taken from the last path segment of the requested URL.
/// Unscripted candidates answer 404. Clones share scripts and call history.
#[derive(Clone)]
pub struct ScriptedFetcher {
    default_status: u16,
    default_delay: Duration,
    scripts: Arc<RwLock<HashMap<String, Script>>>,
    delays: Arc<RwLock<HashMap<String, Duration>>>,
    cancel_on: Arc<RwLock<HashMap<String, CancellationToken>>>,
    cancel_after: Option<(usize, CancellationToken)>,
    calls: Arc<RwLock<Vec<FetchCall>>>,
}

impl Default for ScriptedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            default_status: 404,
            default_delay: Duration::ZERO,
            scripts: Arc::default(),
            delays: Arc::default(),
            cancel_on: Arc::default(),
            cancel_after: None,
            calls: Arc::default(),
        }
    }

    /// Status for every unscripted candidate.
    pub fn with_default_status(mut self, status: u16) -> Self {
        self.default_status = status;
        self
    }

    pub fn with_status(self, candidate: &str, status: u16) -> Self {
        self.script(candidate, Script::Status(status))
    }

    /// Fail the request for `candidate` with a transport error.
    pub fn with_error(self, candidate: &str, message: impl Into<String>) -> Self {
        self.script(candidate, Script::Error(message.into()))
    }

    /// Never answer for `candidate`.
    pub fn with_hang(self, candidate: &str) -> Self {
        self.script(candidate, Script::Hang)
    }

    /// Panic inside the fetch for `candidate`.
    pub fn with_panic(self, candidate: &str) -> Self {
        self.script(candidate, Script::Panic)
    }

    /// Delay every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn with_delay_for(self, candidate: &str, delay: Duration) -> Self {
        self.delays
            .write()
            .unwrap()
            .insert(candidate.to_string(), delay);
        self
    }

    /// Cancel `token` when `candidate` is requested.
    pub fn cancel_on(self, candidate: &str, token: CancellationToken) -> Self {
        self.cancel_on
            .write()
            .unwrap()
            .insert(candidate.to_string(), token);
        self
    }

    /// Cancel `token` when the `count`th request starts.
    pub fn cancel_after(mut self, count: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((count, token));
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.read().unwrap().clone()
    }

    /// Candidates requested, in request order.
    pub fn fetched(&self) -> Vec<String> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .map(|call| call.candidate.clone())
            .collect()
    }

    fn script(self, candidate: &str, script: Script) -> Self {
        self.scripts
            .write()
            .unwrap()
            .insert(candidate.to_string(), script);
        self
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> FetchResult<FetchResponse> {
        let candidate = url.rsplit('/').next().unwrap_or(url).to_string();

        let count = {
            let mut calls = self.calls.write().unwrap();
            calls.push(FetchCall {
                candidate: candidate.clone(),
                url: url.to_string(),
                started: Instant::now(),
            });
            calls.len()
        };

        let token = self.cancel_on.read().unwrap().get(&candidate).cloned();
        if let Some(token) = token {
            token.cancel();
        }
        if let Some((after, token)) = &self.cancel_after {
            if count >= *after {
                token.cancel();
            }
        }

        let delay = self
            .delays
            .read()
            .unwrap()
            .get(&candidate)
            .copied()
            .unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let script = self.scripts.read().unwrap().get(&candidate).cloned();
        match script.unwrap_or(Script::Status(self.default_status)) {
            Script::Status(status) => Ok(FetchResponse::new(status, url)),
            Script::Error(message) => Err(FetchError::Http(message.into())),
            Script::Hang => std::future::pending().await,
            Script::Panic => panic!("scripted panic fetching {candidate}"),
        }
    }
}

/// In-memory checkpoint store that keeps every write.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    cursor: RwLock<Option<Candidate>>,
    history: RwLock<Vec<Candidate>>,
    failing: bool,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a previously saved cursor.
    pub fn with_cursor(cursor: Candidate) -> Self {
        Self {
            cursor: RwLock::new(Some(cursor)),
            ..Self::default()
        }
    }

    /// A store whose writes always fail.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn current(&self) -> Option<Candidate> {
        self.cursor.read().unwrap().clone()
    }

    /// Every cursor persisted, in write order.
    pub fn history(&self) -> Vec<Candidate> {
        self.history.read().unwrap().clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> PersistenceResult<Option<Candidate>> {
        Ok(self.current())
    }

    async fn persist(&self, cursor: &Candidate) -> PersistenceResult<()> {
        if self.failing {
            return Err(PersistenceError::Unavailable(
                "checkpoint writes disabled".to_string(),
            ));
        }
        *self.cursor.write().unwrap() = Some(cursor.clone());
        self.history.write().unwrap().push(cursor.clone());
        Ok(())
    }
}

/// In-memory match recorder.
#[derive(Debug, Default)]
pub struct MemoryMatchLog {
    entries: RwLock<Vec<Candidate>>,
    failing: bool,
}

impl MemoryMatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder whose writes always fail.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn entries(&self) -> Vec<Candidate> {
        self.entries.read().unwrap().clone()
    }
}

#[async_trait]
impl MatchRecorder for MemoryMatchLog {
    async fn record(&self, candidate: &Candidate) -> PersistenceResult<()> {
        if self.failing {
            return Err(PersistenceError::Unavailable(
                "match log writes disabled".to_string(),
            ));
        }
        self.entries.write().unwrap().push(candidate.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_fetcher_answers_by_candidate() {
        let fetcher = ScriptedFetcher::new()
            .with_status("7f", 200)
            .with_error("80", "connection reset");

        let found = fetcher.fetch("https://x.test/commit/7f", Duration::from_secs(1)).await;
        assert_eq!(found.unwrap().status, 200);

        let missing = fetcher.fetch("https://x.test/commit/00", Duration::from_secs(1)).await;
        assert_eq!(missing.unwrap().status, 404);

        let failed = fetcher.fetch("https://x.test/commit/80", Duration::from_secs(1)).await;
        assert!(matches!(failed, Err(FetchError::Http(_))));

        assert_eq!(fetcher.fetched(), vec!["7f", "00", "80"]);
    }

    #[tokio::test]
    async fn test_clones_share_history() {
        let fetcher = ScriptedFetcher::new();
        let observer = fetcher.clone();

        fetcher
            .fetch("https://x.test/commit/0a", Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(observer.calls().len(), 1);
        assert_eq!(observer.calls()[0].url, "https://x.test/commit/0a");
    }

    #[tokio::test]
    async fn test_cancel_after_fires_on_nth_call() {
        let token = CancellationToken::new();
        let fetcher = ScriptedFetcher::new().cancel_after(2, token.clone());

        fetcher.fetch("https://x.test/0", Duration::from_secs(1)).await.unwrap();
        assert!(!token.is_cancelled());
        fetcher.fetch("https://x.test/1", Duration::from_secs(1)).await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_memory_checkpoint_store_wraps_through_save() {
        let store = MemoryCheckpointStore::new();
        store.save(&Candidate::parse("0e").unwrap()).await.unwrap();
        store.save(&Candidate::parse("ff").unwrap()).await.unwrap();

        assert_eq!(store.current(), Some(Candidate::parse("00").unwrap()));
        assert_eq!(store.history().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_stores_reject_writes() {
        let candidate = Candidate::parse("01").unwrap();
        assert!(MemoryCheckpointStore::failing().save(&candidate).await.is_err());
        assert!(MemoryMatchLog::failing().record(&candidate).await.is_err());
    }
}
