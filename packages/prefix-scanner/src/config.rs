//! Scan tunables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;

use crate::checkpoint::CheckpointPolicy;
use crate::error::{ScanError, ScanResult};
use crate::space::CandidateSpace;

pub const DEFAULT_LENGTH: usize = 4;
pub const DEFAULT_CONCURRENCY: usize = 20;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Characters per candidate
    pub length: usize,
    /// Maximum probes in flight
    pub concurrency: usize,
    /// Pause applied to new submissions after a rate-limit response
    pub cooldown: Duration,
    /// Upper bound on a single probe
    pub probe_timeout: Duration,
    pub policy: CheckpointPolicy,
    /// Start a new pass at the minimum once a pass is exhausted
    pub continuous: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
            concurrency: DEFAULT_CONCURRENCY,
            cooldown: DEFAULT_COOLDOWN,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            policy: CheckpointPolicy::default(),
            continuous: false,
        }
    }
}

impl ScanConfig {
    /// Defaults overridden by `GITSHA_*` environment variables.
    ///
    /// Loads `.env` first when present.
    pub fn from_env() -> ScanResult<Self> {
        let _ = dotenv();

        let mut config = Self::default();
        if let Some(length) = env_override("GITSHA_LENGTH")? {
            config.length = length;
        }
        if let Some(concurrency) = env_override("GITSHA_CONCURRENCY")? {
            config.concurrency = concurrency;
        }
        if let Some(secs) = env_override("GITSHA_COOLDOWN_SECS")? {
            config.cooldown = Duration::from_secs(secs);
        }
        if let Some(secs) = env_override("GITSHA_TIMEOUT_SECS")? {
            config.probe_timeout = Duration::from_secs(secs);
        }
        if let Some(policy) = env_override("GITSHA_POLICY")? {
            config.policy = policy;
        }
        if let Some(continuous) = env_override("GITSHA_CONTINUOUS")? {
            config.continuous = continuous;
        }

        Ok(config)
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn with_policy(mut self, policy: CheckpointPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn continuous(mut self) -> Self {
        self.continuous = true;
        self
    }

    /// Check the configuration and build the search space it describes.
    pub fn validate(&self) -> ScanResult<CandidateSpace> {
        if self.concurrency == 0 {
            return Err(ScanError::InvalidConcurrency);
        }
        CandidateSpace::new(self.length)
    }
}

fn env_override<T: FromStr>(key: &str) -> ScanResult<Option<T>> {
    match env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ScanError::InvalidConfig {
                key: key.to_string(),
                value: raw,
            }),
        Err(_) => Ok(None),
    }
}
