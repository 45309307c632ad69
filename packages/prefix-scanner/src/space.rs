//! Candidate enumeration.
//!
//! The space of `length`-character hex prefixes is walked by index, so the
//! enumerator never buffers candidates and can re-enter the order at any
//! offset in constant time.

use std::iter::FusedIterator;

use crate::candidate::{Candidate, MAX_LENGTH};
use crate::error::{ScanError, ScanResult};

/// All hex prefixes of one fixed length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateSpace {
    length: usize,
}

impl CandidateSpace {
    /// Create a space of `length`-character prefixes.
    pub fn new(length: usize) -> ScanResult<Self> {
        if length == 0 || length > MAX_LENGTH {
            return Err(ScanError::InvalidLength {
                length,
                max: MAX_LENGTH,
            });
        }
        Ok(Self { length })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of candidates, 16^length.
    pub fn size(&self) -> u64 {
        16u64.pow(self.length as u32)
    }

    pub fn min(&self) -> Candidate {
        Candidate::min(self.length)
    }

    pub fn max(&self) -> Candidate {
        Candidate::max(self.length)
    }

    pub fn contains(&self, candidate: &Candidate) -> bool {
        candidate.len() == self.length
    }

    /// Every candidate, in order.
    pub fn iter(&self) -> Candidates {
        self.iter_from(0)
    }

    /// Candidates starting at `index`.
    pub fn iter_from(&self, index: u64) -> Candidates {
        let end = self.size();
        Candidates {
            length: self.length,
            next: index.min(end),
            end,
        }
    }

    /// Candidates strictly after `cursor`.
    ///
    /// A cursor equal to the maximum has no successor in this pass, so the
    /// walk restarts at the minimum.
    pub fn resume_after(&self, cursor: &Candidate) -> ScanResult<Candidates> {
        if !self.contains(cursor) {
            return Err(ScanError::CursorMismatch {
                cursor: cursor.to_string(),
                length: self.length,
            });
        }

        if cursor.is_max() {
            Ok(self.iter())
        } else {
            Ok(self.iter_from(cursor.index() + 1))
        }
    }
}

/// Lazy iterator over a [`CandidateSpace`].
#[derive(Debug, Clone)]
pub struct Candidates {
    length: usize,
    next: u64,
    end: u64,
}

impl Candidates {
    /// Index of the next candidate to be produced.
    pub fn position(&self) -> u64 {
        self.next
    }

    pub fn remaining(&self) -> u64 {
        self.end - self.next
    }
}

impl Iterator for Candidates {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let candidate = Candidate::from_index(self.next, self.length);
        self.next += 1;
        Some(candidate)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Candidates {}

impl FusedIterator for Candidates {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rejects_unsupported_lengths() {
        assert!(matches!(
            CandidateSpace::new(0),
            Err(ScanError::InvalidLength { .. })
        ));
        assert!(CandidateSpace::new(MAX_LENGTH + 1).is_err());
        assert!(CandidateSpace::new(MAX_LENGTH).is_ok());
    }

    #[test]
    fn test_enumerates_full_space_in_order() {
        for length in 1..=3 {
            let space = CandidateSpace::new(length).unwrap();
            let all: Vec<Candidate> = space.iter().collect();

            assert_eq!(all.len() as u64, space.size());
            assert_eq!(all.first(), Some(&space.min()));
            assert_eq!(all.last(), Some(&space.max()));
            assert!(all.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn test_alphabet_order_digits_then_letters() {
        let space = CandidateSpace::new(1).unwrap();
        let joined: String = space.iter().map(|c| c.to_string()).collect();
        assert_eq!(joined, "0123456789abcdef");
    }

    #[test]
    fn test_large_space_is_lazy() {
        let space = CandidateSpace::new(MAX_LENGTH).unwrap();
        let mut iter = space.iter();
        assert_eq!(iter.len() as u64, space.size());
        assert_eq!(iter.next(), Some(space.min()));
        assert_eq!(iter.position(), 1);
    }

    #[test]
    fn test_resume_after_starts_at_successor() {
        let space = CandidateSpace::new(4).unwrap();
        let cursor = Candidate::parse("0a1f").unwrap();
        let mut resumed = space.resume_after(&cursor).unwrap();

        assert_eq!(resumed.next().unwrap().as_str(), "0a20");
        assert_eq!(resumed.len() as u64, space.size() - 0x0a20 - 1);
    }

    #[test]
    fn test_resume_after_max_restarts_cycle() {
        let space = CandidateSpace::new(2).unwrap();
        let mut resumed = space.resume_after(&space.max()).unwrap();
        assert_eq!(resumed.next(), Some(space.min()));
    }

    #[test]
    fn test_resume_after_rejects_foreign_cursor() {
        let space = CandidateSpace::new(4).unwrap();
        let cursor = Candidate::parse("7f").unwrap();
        assert!(matches!(
            space.resume_after(&cursor),
            Err(ScanError::CursorMismatch { length: 4, .. })
        ));
    }

    #[test]
    fn test_iterator_is_fused() {
        let space = CandidateSpace::new(1).unwrap();
        let mut iter = space.iter_from(15);
        assert_eq!(iter.next().unwrap().as_str(), "f");
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next(), None);
    }

    proptest! {
        #[test]
        fn resume_skips_everything_up_to_cursor(length in 1usize..=3, seed in any::<u64>()) {
            let space = CandidateSpace::new(length).unwrap();
            let cursor = Candidate::from_index(seed % space.size(), length);
            let resumed: Vec<Candidate> = space.resume_after(&cursor).unwrap().collect();

            if cursor.is_max() {
                prop_assert_eq!(resumed.len() as u64, space.size());
            } else {
                prop_assert!(resumed.iter().all(|c| c > &cursor));
                prop_assert_eq!(resumed.len() as u64, space.size() - cursor.index() - 1);
                if let Some(first) = resumed.first() {
                    prop_assert_eq!(first.index(), cursor.index() + 1);
                }
            }
        }

        #[test]
        fn index_round_trips_through_candidate(length in 1usize..=MAX_LENGTH, seed in any::<u64>()) {
            let space = CandidateSpace::new(length).unwrap();
            let index = seed % space.size();
            prop_assert_eq!(Candidate::from_index(index, length).index(), index);
        }
    }
}
