//! Append-only record of confirmed matches.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::candidate::Candidate;
use crate::error::{PersistenceError, PersistenceResult};

/// Sink for candidates whose probe came back Found.
///
/// Entries are never deduplicated: a candidate found again on a later pass is
/// recorded again.
#[async_trait]
pub trait MatchRecorder: Send + Sync {
    async fn record(&self, candidate: &Candidate) -> PersistenceResult<()>;
}

/// Line-delimited match log, one candidate per line.
#[derive(Debug)]
pub struct FileMatchLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileMatchLog {
    pub const DEFAULT_PATH: &'static str = "commit_entries.txt";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every recorded candidate, in append order. A missing log is empty.
    pub async fn read_all(&self) -> PersistenceResult<Vec<Candidate>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistenceError::io(&self.path, e)),
        };

        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                Candidate::parse(line).map_err(|e| PersistenceError::Corrupt {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

impl Default for FileMatchLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PATH)
    }
}

#[async_trait]
impl MatchRecorder for FileMatchLog {
    async fn record(&self, candidate: &Candidate) -> PersistenceResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| PersistenceError::io(&self.path, e))?;

        let line = format!("{candidate}\n");
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| PersistenceError::io(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| PersistenceError::io(&self.path, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_missing_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileMatchLog::new(dir.path().join("matches.txt"));
        assert!(log.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_appends_one_line_per_match() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileMatchLog::new(dir.path().join("matches.txt"));

        log.record(&Candidate::parse("7f").unwrap()).await.unwrap();
        log.record(&Candidate::parse("7f").unwrap()).await.unwrap();
        log.record(&Candidate::parse("a0").unwrap()).await.unwrap();

        let raw = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(raw, "7f\n7f\na0\n");
        assert_eq!(log.read_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_appends_to_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matches.txt");
        std::fs::write(&path, "0001\n").unwrap();

        let log = FileMatchLog::new(&path);
        log.record(&Candidate::parse("0002").unwrap()).await.unwrap();

        let entries: Vec<String> = log
            .read_all()
            .await
            .unwrap()
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(entries, vec!["0001", "0002"]);
    }

    #[tokio::test]
    async fn test_concurrent_records_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(FileMatchLog::new(dir.path().join("matches.txt")));

        let mut handles = Vec::new();
        for index in 0..64u64 {
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                log.record(&Candidate::from_index(index, 4)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let raw = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 64);
        assert!(lines.iter().all(|line| line.len() == 4));

        let mut entries = log.read_all().await.unwrap();
        entries.sort();
        entries.dedup();
        assert_eq!(entries.len(), 64);
    }
}
