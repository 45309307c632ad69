//! Candidate prefixes.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{ScanError, ScanResult};

/// Probe alphabet in enumeration order: digits, then `a-f`.
pub const ALPHABET: &[u8; 16] = b"0123456789abcdef";

/// Longest supported prefix. 16^15 is the largest power of 16 whose index
/// space still leaves headroom in a `u64`.
pub const MAX_LENGTH: usize = 15;

/// A fixed-length lowercase hex prefix.
///
/// Ordering is lexicographic, which for equal-length hex strings matches the
/// numeric order of [`Candidate::index`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Candidate(String);

impl Candidate {
    /// Parse a candidate, normalising upper-case digits.
    pub fn parse(value: &str) -> ScanResult<Self> {
        let invalid = |reason: &str| ScanError::InvalidCandidate {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        if value.is_empty() {
            return Err(invalid("empty"));
        }
        if value.len() > MAX_LENGTH {
            return Err(invalid("longer than the supported prefix length"));
        }
        if !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid("not a hexadecimal string"));
        }

        Ok(Self(value.to_ascii_lowercase()))
    }

    /// Build the candidate at `index` in a space of `length`-character prefixes.
    ///
    /// Indices beyond the space keep only their low `length` digits.
    pub fn from_index(index: u64, length: usize) -> Self {
        let mut digits = vec!['0'; length];
        let mut rest = index;
        for slot in digits.iter_mut().rev() {
            *slot = char::from(ALPHABET[(rest % 16) as usize]);
            rest /= 16;
        }
        Self(digits.into_iter().collect())
    }

    /// Smallest candidate of the given length (`"00..0"`).
    pub fn min(length: usize) -> Self {
        Self("0".repeat(length))
    }

    /// Largest candidate of the given length (`"ff..f"`).
    pub fn max(length: usize) -> Self {
        Self("f".repeat(length))
    }

    /// Position of this candidate in enumeration order.
    pub fn index(&self) -> u64 {
        self.0
            .chars()
            .filter_map(|c| c.to_digit(16))
            .fold(0u64, |acc, digit| acc * 16 + u64::from(digit))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_max(&self) -> bool {
        self.0.bytes().all(|b| b == b'f')
    }

    /// The cursor to persist after this candidate completes.
    ///
    /// The maximum candidate wraps to the minimum so the next run restarts
    /// the cycle instead of finding nothing left to scan.
    pub fn wrapped(&self) -> Self {
        if self.is_max() {
            Self::min(self.len())
        } else {
            self.clone()
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Candidate {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Candidate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalises_case() {
        let candidate = Candidate::parse("0A1F").unwrap();
        assert_eq!(candidate.as_str(), "0a1f");
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        assert!(matches!(
            Candidate::parse("00g0"),
            Err(ScanError::InvalidCandidate { .. })
        ));
        assert!(Candidate::parse("").is_err());
        assert!(Candidate::parse(&"0".repeat(MAX_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_index_and_from_index_agree() {
        let candidate = Candidate::parse("0a1f").unwrap();
        assert_eq!(candidate.index(), 0x0a1f);
        assert_eq!(Candidate::from_index(0x0a1f, 4), candidate);
    }

    #[test]
    fn test_from_index_pads_to_length() {
        assert_eq!(Candidate::from_index(4, 4).as_str(), "0004");
        assert_eq!(Candidate::from_index(255, 2).as_str(), "ff");
    }

    #[test]
    fn test_wrapped_resets_max_only() {
        assert_eq!(Candidate::max(4).wrapped(), Candidate::min(4));
        assert_eq!(Candidate::max(2).wrapped().as_str(), "00");

        let middle = Candidate::parse("7f").unwrap();
        assert_eq!(middle.wrapped(), middle);
    }

    #[test]
    fn test_ordering_matches_index() {
        let a = Candidate::parse("09").unwrap();
        let b = Candidate::parse("0a").unwrap();
        assert!(a < b);
        assert!(a.index() < b.index());
    }
}
