// src/miner/job.rs
//! Mining job and solution types
//!
//! A [`Job`] is immutable once issued. The coordinator owns it for one
//! mining attempt and shares it read-only with the workers through an `Arc`.

use std::fmt;
use std::time::{Duration, Instant};

/// A unit of mining work received from a job source
#[derive(Debug, Clone)]
pub struct Job {
    /// Opaque identifier assigned by the issuer
    pub job_id: String,
    /// Block header template the nonce is appended to
    pub template: Vec<u8>,
    /// Minimum difficulty required by the issuer (leading zero nibbles)
    pub difficulty: u32,
    /// Nonce space the issuer allows for this job
    pub nonce_space: NonceRange,
    /// Local time the job was received
    pub issued_at: Instant,
}

impl Job {
    /// Creates a job over the full `u64` nonce space, issued now
    pub fn new(job_id: impl Into<String>, template: impl Into<Vec<u8>>, difficulty: u32) -> Self {
        Job {
            job_id: job_id.into(),
            template: template.into(),
            difficulty,
            nonce_space: NonceRange::FULL,
            issued_at: Instant::now(),
        }
    }

    /// Restricts the nonce space of this job
    pub fn with_nonce_space(mut self, nonce_space: NonceRange) -> Self {
        self.nonce_space = nonce_space;
        self
    }

    /// Time elapsed since the job was issued
    pub fn age(&self) -> Duration {
        self.issued_at.elapsed()
    }
}

/// Half-open nonce interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceRange {
    /// First nonce in the range
    pub start: u64,
    /// One past the last nonce in the range
    pub end: u64,
}

impl NonceRange {
    /// Every representable nonce except `u64::MAX`
    pub const FULL: NonceRange = NonceRange {
        start: 0,
        end: u64::MAX,
    };

    /// Creates a range; an inverted range is treated as empty
    pub fn new(start: u64, end: u64) -> Self {
        NonceRange {
            start,
            end: end.max(start),
        }
    }

    /// Number of nonces in the range
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Whether the range holds no nonces
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `nonce` falls inside the range
    pub fn contains(&self, nonce: u64) -> bool {
        (self.start..self.end).contains(&nonce)
    }
}

impl fmt::Display for NonceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A single hash attempt
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Trial nonce
    pub nonce: u64,
    /// Digest of the candidate block
    pub digest: Vec<u8>,
}

/// A candidate that satisfied the difficulty predicate for a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    /// Job this solution belongs to
    pub job_id: String,
    /// Nonce that produced the valid digest
    pub nonce: u64,
    /// Digest meeting the difficulty
    pub digest: Vec<u8>,
    /// Difficulty the digest was checked against
    pub difficulty: u32,
    /// Worker that found it
    pub worker_id: usize,
}

impl Solution {
    /// Promotes a candidate that passed the predicate
    pub fn from_candidate(job_id: &str, candidate: Candidate, difficulty: u32, worker_id: usize) -> Self {
        Solution {
            job_id: job_id.to_string(),
            nonce: candidate.nonce,
            digest: candidate.digest,
            difficulty,
            worker_id,
        }
    }

    /// Lowercase hex rendering of the digest
    pub fn digest_hex(&self) -> String {
        hex::encode(&self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_range_is_empty() {
        let range = NonceRange::new(10, 5);
        assert!(range.is_empty());
        assert_eq!(range.len(), 0);
    }

    #[test]
    fn range_is_half_open() {
        let range = NonceRange::new(0, 100);
        assert!(range.contains(0));
        assert!(range.contains(99));
        assert!(!range.contains(100));
        assert_eq!(range.to_string(), "[0, 100)");
    }

    #[test]
    fn solution_renders_digest_as_hex() {
        let candidate = Candidate {
            nonce: 42,
            digest: vec![0x00, 0xab],
        };
        let solution = Solution::from_candidate("job-1", candidate, 2, 3);
        assert_eq!(solution.digest_hex(), "00ab");
        assert_eq!(solution.nonce, 42);
        assert_eq!(solution.worker_id, 3);
    }
}
