//! Candidate to probe URL.

use url::Url;

use crate::candidate::Candidate;
use crate::error::{ScanError, ScanResult};

/// Marker replaced by the candidate when rendering.
pub const PLACEHOLDER: &str = "{candidate}";

/// A URL with one slot for the candidate.
///
/// Templates without [`PLACEHOLDER`] get the candidate appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    prefix: String,
    suffix: String,
}

impl UrlTemplate {
    pub fn new(template: &str) -> ScanResult<Self> {
        let (prefix, suffix) = template.split_once(PLACEHOLDER).unwrap_or((template, ""));
        if suffix.contains(PLACEHOLDER) {
            return Err(ScanError::InvalidTemplate(format!(
                "{template}: placeholder appears more than once"
            )));
        }

        let parsed = Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        };

        let sample = parsed.render(&Candidate::min(1));
        Url::parse(&sample).map_err(|e| ScanError::InvalidTemplate(format!("{template}: {e}")))?;

        Ok(parsed)
    }

    /// Commit lookups on GitHub for `owner/repo`.
    pub fn github_commit(repo: &str) -> ScanResult<Self> {
        let repo = repo.trim().trim_matches('/');
        let valid_part = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };

        match repo.split_once('/') {
            Some((owner, name)) if valid_part(owner) && valid_part(name) => {
                Self::new(&format!("https://github.com/{owner}/{name}/commit/{PLACEHOLDER}"))
            }
            _ => Err(ScanError::InvalidRepository(repo.to_string())),
        }
    }

    pub fn render(&self, candidate: &Candidate) -> String {
        format!("{}{}{}", self.prefix, candidate, self.suffix)
    }
}
