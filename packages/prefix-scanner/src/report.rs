//! Run summary returned by the engine.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::candidate::Candidate;
use crate::checkpoint::CheckpointPolicy;
use crate::classifier::ProbeOutcome;

/// Why the dispatch loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every candidate in the pass was dispatched and settled
    Exhausted,
    /// Cancellation was observed and in-flight probes drained
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => f.write_str("exhausted"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Counters and final state for one engine run.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub length: usize,
    pub policy: CheckpointPolicy,
    pub resumed_from: Option<Candidate>,
    /// Passes that ran to exhaustion
    pub passes_completed: u64,
    pub submitted: u64,
    pub found: u64,
    pub not_found: u64,
    pub rate_limited: u64,
    pub transient_errors: u64,
    /// Tasks that saw cancellation before issuing their request
    pub skipped: u64,
    /// Tasks that panicked
    pub task_failures: u64,
    pub record_failures: u64,
    pub checkpoint_failures: u64,
    pub matches: Vec<Candidate>,
    /// Last cursor the store accepted
    pub checkpoint: Option<Candidate>,
    pub stop_reason: Option<StopReason>,
}

impl ScanReport {
    pub(crate) fn new(length: usize, policy: CheckpointPolicy) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            length,
            policy,
            resumed_from: None,
            passes_completed: 0,
            submitted: 0,
            found: 0,
            not_found: 0,
            rate_limited: 0,
            transient_errors: 0,
            skipped: 0,
            task_failures: 0,
            record_failures: 0,
            checkpoint_failures: 0,
            matches: Vec::new(),
            checkpoint: None,
            stop_reason: None,
        }
    }

    pub(crate) fn observe(&mut self, outcome: &ProbeOutcome) {
        match outcome {
            ProbeOutcome::Found { candidate, .. } => {
                self.found += 1;
                self.matches.push(candidate.clone());
            }
            ProbeOutcome::NotFound { .. } => self.not_found += 1,
            ProbeOutcome::RateLimited { .. } => self.rate_limited += 1,
            ProbeOutcome::TransientError { .. } => self.transient_errors += 1,
        }
    }

    pub(crate) fn finish(&mut self, reason: StopReason) {
        self.stop_reason = Some(reason);
        self.finished_at = Some(Utc::now());
    }

    /// Probes that issued a request and produced an outcome.
    pub fn probed(&self) -> u64 {
        self.found + self.not_found + self.rate_limited + self.transient_errors
    }

    /// Wall-clock duration of a finished run.
    pub fn elapsed(&self) -> Option<TimeDelta> {
        self.finished_at.map(|finished| finished - self.started_at)
    }

    pub fn was_cancelled(&self) -> bool {
        self.stop_reason == Some(StopReason::Cancelled)
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "probed {} candidates ({} found, {} not found, {} rate limited, {} errors)",
            self.probed(),
            self.found,
            self.not_found,
            self.rate_limited,
            self.transient_errors
        )?;
        if let Some(reason) = self.stop_reason {
            write!(f, ", {reason}")?;
        }
        match &self.checkpoint {
            Some(cursor) => write!(f, ", progress saved at {cursor}"),
            None => write!(f, ", no progress saved"),
        }
    }
}
