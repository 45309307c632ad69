//! Dispatch engine.
//!
//! The `ScanEngine` drives one scan:
//! - Resumes after the stored checkpoint, if any
//! - Keeps at most `concurrency` probes in flight
//! - Records matches and advances the checkpoint as probes complete
//! - Pauses new submissions after a rate-limit response
//! - Drains in-flight probes when the shutdown token is cancelled
//!
//! # Architecture
//!
//! ```text
//! ScanEngine
//!     │
//!     ├─► CheckpointStore.load ──► CandidateSpace.resume_after
//!     ├─► spawn probe (bounded) ──► Fetcher.fetch ──► classify
//!     └─► on completion (completion order)
//!             ├─► MatchRecorder.record   (Found)
//!             ├─► cool-down              (RateLimited)
//!             └─► CheckpointStore.save   (per CheckpointPolicy)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let engine = ScanEngine::new(
//!     UrlTemplate::github_commit("owner/repo")?,
//!     Arc::new(HttpFetcher::new()?),
//!     Arc::new(FileCheckpointStore::default()),
//!     Arc::new(FileMatchLog::default()),
//! )
//! .with_config(ScanConfig::default());
//!
//! shutdown::listen(engine.shutdown_token());
//! let report = engine.run().await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::candidate::Candidate;
use crate::checkpoint::{CheckpointPolicy, CheckpointStore, Watermark};
use crate::classifier::{classify, ProbeOutcome};
use crate::config::ScanConfig;
use crate::error::{FetchError, ScanResult};
use crate::fetch::Fetcher;
use crate::matches::MatchRecorder;
use crate::report::{ScanReport, StopReason};
use crate::space::{CandidateSpace, Candidates};
use crate::url_template::UrlTemplate;

/// Lifecycle of a scan. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Starting,
    Resuming,
    Running,
    /// Submissions held back by a rate-limit cool-down
    Pausing,
    /// Shutdown requested; waiting for in-flight probes
    Draining,
    Stopped,
}

/// A probe task's candidate and how its inner task ended. A panic inside the
/// probe comes back as the `JoinError`.
type Probed = (Candidate, Result<Option<ProbeOutcome>, JoinError>);

/// Bookkeeping for one pass over the candidate space.
struct Pass {
    candidates: Candidates,
    in_flight: JoinSet<Probed>,
    watermark: Watermark,
    paused_until: Option<Instant>,
}

impl Pass {
    fn new(candidates: Candidates) -> Self {
        let watermark = Watermark::starting_at(candidates.position());
        Self {
            candidates,
            in_flight: JoinSet::new(),
            watermark,
            paused_until: None,
        }
    }

    fn is_exhausted(&self) -> bool {
        self.candidates.remaining() == 0
    }
}

/// Bounded-concurrency prober over a [`CandidateSpace`](crate::space::CandidateSpace).
pub struct ScanEngine {
    config: ScanConfig,
    template: UrlTemplate,
    fetcher: Arc<dyn Fetcher>,
    checkpoints: Arc<dyn CheckpointStore>,
    matches: Arc<dyn MatchRecorder>,
    shutdown: CancellationToken,
    state: watch::Sender<EngineState>,
}

impl ScanEngine {
    /// Create an engine with default configuration.
    pub fn new(
        template: UrlTemplate,
        fetcher: Arc<dyn Fetcher>,
        checkpoints: Arc<dyn CheckpointStore>,
        matches: Arc<dyn MatchRecorder>,
    ) -> Self {
        let (state, _) = watch::channel(EngineState::Starting);
        Self {
            config: ScanConfig::default(),
            template,
            fetcher,
            checkpoints,
            matches,
            shutdown: CancellationToken::new(),
            state,
        }
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an externally owned shutdown token.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Cancel this token to stop submitting and drain in-flight probes.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Watch the engine's lifecycle.
    pub fn state(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Run until the pass is exhausted or shutdown is requested.
    ///
    /// Only startup problems (bad configuration, unreadable checkpoint) are
    /// returned as errors. Probe and persistence failures are logged and
    /// counted in the report.
    pub async fn run(&self) -> ScanResult<ScanReport> {
        let result = self.start_and_dispatch().await;
        self.transition(EngineState::Stopped);
        result
    }

    async fn start_and_dispatch(&self) -> ScanResult<ScanReport> {
        self.transition(EngineState::Starting);

        let space = self.config.validate()?;
        let mut report = ScanReport::new(space.length(), self.config.policy);

        info!(
            run_id = %report.run_id,
            length = space.length(),
            candidates = space.size(),
            concurrency = self.config.concurrency,
            policy = %self.config.policy,
            "scan starting"
        );

        let mut candidates = match self.checkpoints.load().await? {
            Some(cursor) => {
                self.transition(EngineState::Resuming);
                let resumed = space.resume_after(&cursor)?;
                info!(
                    cursor = %cursor,
                    remaining = resumed.remaining(),
                    "resuming from checkpoint"
                );
                report.resumed_from = Some(cursor);
                resumed
            }
            None => space.iter(),
        };

        let reason = loop {
            let reason = self.run_pass(candidates, &mut report).await;
            if reason == StopReason::Exhausted {
                report.passes_completed += 1;
                self.close_pass(&space, &mut report).await;
            }
            if reason == StopReason::Cancelled || !self.config.continuous {
                break reason;
            }

            info!(
                passes = report.passes_completed,
                "pass complete, starting over from {}",
                space.min()
            );
            candidates = space.iter();
        };

        report.finish(reason);
        info!(run_id = %report.run_id, summary = %report, "scan stopped");
        Ok(report)
    }

    async fn run_pass(&self, candidates: Candidates, report: &mut ScanReport) -> StopReason {
        let mut pass = Pass::new(candidates);
        self.transition(EngineState::Running);

        loop {
            let cancelled = self.shutdown.is_cancelled();
            if cancelled {
                self.begin_draining(pass.in_flight.len());
            }

            if let Some(until) = pass.paused_until {
                if Instant::now() >= until {
                    pass.paused_until = None;
                    if !cancelled {
                        info!("cool-down elapsed, resuming dispatch");
                        self.transition(EngineState::Running);
                    }
                }
            }

            if !cancelled && pass.paused_until.is_none() {
                self.fill(&mut pass, report);
            }

            if pass.in_flight.is_empty() {
                if pass.is_exhausted() {
                    return StopReason::Exhausted;
                }
                if cancelled {
                    return StopReason::Cancelled;
                }
            }

            let paused = pass.paused_until.is_some();
            let resume_at = pass.paused_until.unwrap_or_else(Instant::now);
            tokio::select! {
                _ = self.shutdown.cancelled(), if !cancelled => {}
                _ = sleep_until(resume_at), if paused => {}
                Some(joined) = pass.in_flight.join_next() => {
                    self.settle(joined, &mut pass, report).await;
                }
            }
        }
    }

    /// Leave the cursor at the wrapped minimum after an exhausted pass.
    ///
    /// Completion order can leave a mid-pass candidate as the last save, so
    /// the pass end is saved explicitly unless the cursor already wrapped.
    async fn close_pass(&self, space: &CandidateSpace, report: &mut ScanReport) {
        if report.checkpoint.as_ref() == Some(&space.min()) {
            return;
        }
        self.save_cursor(&space.max(), report).await;
    }

    /// Submit candidates until the concurrency bound is reached.
    fn fill(&self, pass: &mut Pass, report: &mut ScanReport) {
        while pass.in_flight.len() < self.config.concurrency {
            let Some(candidate) = pass.candidates.next() else {
                break;
            };
            self.spawn_probe(&mut pass.in_flight, candidate);
            report.submitted += 1;
        }
    }

    fn spawn_probe(&self, in_flight: &mut JoinSet<Probed>, candidate: Candidate) {
        let fetcher = Arc::clone(&self.fetcher);
        let shutdown = self.shutdown.clone();
        let url = self.template.render(&candidate);
        let timeout = self.config.probe_timeout;

        in_flight.spawn(async move {
            let probed =
                tokio::spawn(probe(fetcher, candidate.clone(), url, timeout, shutdown)).await;
            (candidate, probed)
        });
    }

    async fn settle(
        &self,
        joined: Result<Probed, JoinError>,
        pass: &mut Pass,
        report: &mut ScanReport,
    ) {
        let (candidate, probed) = match joined {
            Ok(probed) => probed,
            Err(e) => {
                error!(error = %e, "probe task failed");
                report.task_failures += 1;
                return;
            }
        };

        let outcome = match probed {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                report.skipped += 1;
                return;
            }
            Err(e) => {
                // Counted as completed so a watermark can move past it.
                error!(candidate = %candidate, error = %e, "probe task failed");
                report.task_failures += 1;
                self.advance_checkpoint(&candidate, pass, report).await;
                return;
            }
        };

        report.observe(&outcome);

        match &outcome {
            ProbeOutcome::Found { candidate, url } => {
                info!(candidate = %candidate, url = %url, "found");
                if let Err(e) = self.matches.record(candidate).await {
                    error!(candidate = %candidate, error = %e, "failed to record match");
                    report.record_failures += 1;
                }
            }
            ProbeOutcome::NotFound { candidate, status } => {
                info!(candidate = %candidate, status, "not found");
            }
            ProbeOutcome::RateLimited { candidate, status } => {
                warn!(
                    candidate = %candidate,
                    status,
                    cooldown_secs = self.config.cooldown.as_secs(),
                    "rate limited, pausing dispatch"
                );
                self.pause(pass);
            }
            ProbeOutcome::TransientError { candidate, cause } => {
                warn!(candidate = %candidate, error = %cause, "probe failed");
            }
        }

        self.advance_checkpoint(outcome.candidate(), pass, report).await;
    }

    /// Hold back new submissions for the cool-down. Never shortens a pause.
    fn pause(&self, pass: &mut Pass) {
        let until = Instant::now() + self.config.cooldown;
        pass.paused_until = Some(match pass.paused_until {
            Some(current) => current.max(until),
            None => until,
        });

        if !self.shutdown.is_cancelled() {
            self.transition(EngineState::Pausing);
        }
    }

    async fn advance_checkpoint(
        &self,
        completed: &Candidate,
        pass: &mut Pass,
        report: &mut ScanReport,
    ) {
        let cursor = match self.config.policy {
            CheckpointPolicy::LatestCompleted => Some(completed.clone()),
            CheckpointPolicy::Watermark => pass
                .watermark
                .complete(completed.index())
                .map(|index| Candidate::from_index(index, completed.len())),
        };
        if let Some(cursor) = cursor {
            self.save_cursor(&cursor, report).await;
        }
    }

    async fn save_cursor(&self, cursor: &Candidate, report: &mut ScanReport) {
        match self.checkpoints.save(cursor).await {
            Ok(saved) => report.checkpoint = Some(saved),
            Err(e) => {
                error!(cursor = %cursor, error = %e, "failed to save checkpoint");
                report.checkpoint_failures += 1;
            }
        }
    }

    fn begin_draining(&self, in_flight: usize) {
        if *self.state.borrow() == EngineState::Draining {
            return;
        }
        info!(in_flight, "shutdown requested, draining in-flight probes");
        self.transition(EngineState::Draining);
    }

    fn transition(&self, next: EngineState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = ?previous, to = ?next, "engine state changed");
        }
    }
}

/// One probe. Returns `None` when shutdown was requested before the request
/// went out.
async fn probe(
    fetcher: Arc<dyn Fetcher>,
    candidate: Candidate,
    url: String,
    timeout: Duration,
    shutdown: CancellationToken,
) -> Option<ProbeOutcome> {
    if shutdown.is_cancelled() {
        debug!(candidate = %candidate, "shutdown requested, skipping probe");
        return None;
    }

    let result = match tokio::time::timeout(timeout, fetcher.fetch(&url, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout { url }),
    };

    Some(classify(candidate, result))
}
