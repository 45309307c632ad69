//! Scan checkpoints.
//!
//! A checkpoint is a single persisted cursor: the last candidate whose probe
//! completed. Stores serialise their own writes, so completed probes can save
//! concurrently without coordinating.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::candidate::Candidate;
use crate::error::{PersistenceError, PersistenceResult, ScanError};

/// Persistence for the scan cursor.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last saved cursor, or `None` on a fresh run.
    async fn load(&self) -> PersistenceResult<Option<Candidate>>;

    /// Replace the stored cursor verbatim.
    async fn persist(&self, cursor: &Candidate) -> PersistenceResult<()>;

    /// Save a completed candidate, wrapping the maximum back to the minimum.
    ///
    /// Returns the cursor that was actually stored.
    async fn save(&self, candidate: &Candidate) -> PersistenceResult<Candidate> {
        let cursor = candidate.wrapped();
        self.persist(&cursor).await?;
        Ok(cursor)
    }
}

/// Which completed candidate the engine hands to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointPolicy {
    /// Save whichever probe finished most recently. Under concurrency the
    /// cursor may move backwards; it always names a completed candidate.
    #[default]
    LatestCompleted,
    /// Save the highest candidate below which every dispatched probe has
    /// completed. Monotonic within a pass.
    Watermark,
}

impl fmt::Display for CheckpointPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LatestCompleted => f.write_str("latest"),
            Self::Watermark => f.write_str("watermark"),
        }
    }
}

impl FromStr for CheckpointPolicy {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" | "latest-completed" | "latest_completed" => Ok(Self::LatestCompleted),
            "watermark" => Ok(Self::Watermark),
            other => Err(ScanError::InvalidConfig {
                key: "checkpoint policy".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Index-addressed completion map for [`CheckpointPolicy::Watermark`].
#[derive(Debug, Clone)]
pub struct Watermark {
    next: u64,
    completed: BTreeSet<u64>,
}

impl Watermark {
    /// Track a pass whose first dispatched candidate has index `start`.
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: start,
            completed: BTreeSet::new(),
        }
    }

    /// Mark `index` complete.
    ///
    /// Returns the new contiguous high point when this completion advanced it.
    pub fn complete(&mut self, index: u64) -> Option<u64> {
        if index < self.next {
            return None;
        }
        self.completed.insert(index);

        let mut advanced = None;
        while self.completed.remove(&self.next) {
            advanced = Some(self.next);
            self.next += 1;
        }
        advanced
    }

    /// Completions held back by a gap below them.
    pub fn pending(&self) -> usize {
        self.completed.len()
    }
}

/// Checkpoint kept in a text file holding just the cursor.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash mid-write leaves the previous cursor intact.
#[derive(Debug)]
pub struct FileCheckpointStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCheckpointStore {
    pub const DEFAULT_PATH: &'static str = "progress_checkpoint.txt";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Default for FileCheckpointStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PATH)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> PersistenceResult<Option<Candidate>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistenceError::io(&self.path, e)),
        };

        let value = raw.trim();
        if value.is_empty() {
            return Ok(None);
        }

        Candidate::parse(value)
            .map(Some)
            .map_err(|e| PersistenceError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    async fn persist(&self, cursor: &Candidate) -> PersistenceResult<()> {
        let _guard = self.write_lock.lock().await;

        let temp = self.temp_path();
        tokio::fs::write(&temp, cursor.as_str())
            .await
            .map_err(|e| PersistenceError::io(&temp, e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| PersistenceError::io(&self.path, e))?;

        debug!(cursor = %cursor, path = %self.path.display(), "checkpoint saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn candidate(value: &str) -> Candidate {
        Candidate::parse(value).unwrap()
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            "latest".parse::<CheckpointPolicy>().unwrap(),
            CheckpointPolicy::LatestCompleted
        );
        assert_eq!(
            "Watermark".parse::<CheckpointPolicy>().unwrap(),
            CheckpointPolicy::Watermark
        );
        assert!("furthest".parse::<CheckpointPolicy>().is_err());
        assert_eq!(CheckpointPolicy::default(), CheckpointPolicy::LatestCompleted);
    }

    #[test]
    fn test_watermark_waits_for_gaps() {
        let mut watermark = Watermark::starting_at(10);

        assert_eq!(watermark.complete(12), None);
        assert_eq!(watermark.complete(11), None);
        assert_eq!(watermark.pending(), 2);

        assert_eq!(watermark.complete(10), Some(12));
        assert_eq!(watermark.pending(), 0);

        assert_eq!(watermark.complete(13), Some(13));
    }

    #[test]
    fn test_watermark_ignores_stale_indices() {
        let mut watermark = Watermark::starting_at(5);
        assert_eq!(watermark.complete(3), None);
        assert_eq!(watermark.pending(), 0);
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_fresh_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("checkpoint.txt"));
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("checkpoint.txt"));

        let saved = store.save(&candidate("0a1f")).await.unwrap();
        assert_eq!(saved, candidate("0a1f"));
        assert_eq!(store.load().await.unwrap(), Some(candidate("0a1f")));

        let on_disk = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(on_disk, "0a1f");
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_file_store_wraps_max() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("checkpoint.txt"));

        let saved = store.save(&candidate("ffff")).await.unwrap();
        assert_eq!(saved, candidate("0000"));
        assert_eq!(store.load().await.unwrap(), Some(candidate("0000")));
    }

    #[tokio::test]
    async fn test_file_store_trims_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.txt");
        std::fs::write(&path, "00ab\n").unwrap();

        let store = FileCheckpointStore::new(&path);
        assert_eq!(store.load().await.unwrap(), Some(candidate("00ab")));
    }

    #[tokio::test]
    async fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.txt");
        std::fs::write(&path, "not-a-prefix").unwrap();

        let store = FileCheckpointStore::new(&path);
        assert!(matches!(
            store.load().await,
            Err(PersistenceError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_store_concurrent_saves_leave_a_saved_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileCheckpointStore::new(dir.path().join("checkpoint.txt")));

        let mut handles = Vec::new();
        for index in 0..32u64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.save(&Candidate::from_index(index, 4)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let loaded = store.load().await.unwrap().unwrap();
        assert!(loaded.index() < 32);
        assert_eq!(loaded.len(), 4);
    }

    #[tokio::test]
    async fn test_file_store_reports_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("missing").join("checkpoint.txt"));

        assert!(matches!(
            store.save(&candidate("0001")).await,
            Err(PersistenceError::Io { .. })
        ));
    }
}
