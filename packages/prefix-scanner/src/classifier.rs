//! Turns a fetch result into a probe outcome.

use std::fmt;

use crate::candidate::Candidate;
use crate::error::FetchResult;
use crate::fetch::FetchResponse;

const STATUS_OK: u16 = 200;
const STATUS_FORBIDDEN: u16 = 403;
const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Result of probing one candidate. Produced once per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint resolved the candidate
    Found { candidate: Candidate, url: String },
    /// Any status other than success or a rate-limit signal
    NotFound { candidate: Candidate, status: u16 },
    /// 429 or 403: the endpoint wants us to slow down
    RateLimited { candidate: Candidate, status: u16 },
    /// Timeout or connection failure. Counts as completed for checkpointing.
    TransientError { candidate: Candidate, cause: String },
}

impl ProbeOutcome {
    pub fn candidate(&self) -> &Candidate {
        match self {
            Self::Found { candidate, .. }
            | Self::NotFound { candidate, .. }
            | Self::RateLimited { candidate, .. }
            | Self::TransientError { candidate, .. } => candidate,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    /// Whether the engine should pause new submissions.
    pub fn requests_cooldown(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found { candidate, url } => write!(f, "found {candidate} -> {url}"),
            Self::NotFound { candidate, status } => write!(f, "{candidate} - {status}"),
            Self::RateLimited { candidate, status } => {
                write!(f, "{candidate} rate limited ({status})")
            }
            Self::TransientError { candidate, cause } => {
                write!(f, "{candidate} failed: {cause}")
            }
        }
    }
}

/// Classify the result of fetching `candidate`'s URL.
///
/// Never retries: a rate-limited or failed candidate is revisited only on a
/// later pass.
pub fn classify(candidate: Candidate, result: FetchResult<FetchResponse>) -> ProbeOutcome {
    match result {
        Ok(response) => match response.status {
            STATUS_OK => ProbeOutcome::Found {
                candidate,
                url: response.effective_url,
            },
            STATUS_TOO_MANY_REQUESTS | STATUS_FORBIDDEN => ProbeOutcome::RateLimited {
                candidate,
                status: response.status,
            },
            status => ProbeOutcome::NotFound { candidate, status },
        },
        Err(e) => ProbeOutcome::TransientError {
            candidate,
            cause: e.to_string(),
        },
    }
}
