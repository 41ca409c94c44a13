// src/miner/algorithm/mod.rs
//! Proof-of-work hash algorithms
//!
//! This module contains the supported digest algorithms and their common
//! interface. The algorithm is chosen once at startup from configuration;
//! the hashing loop only ever sees `Arc<dyn Algorithm>`.

/// RustCrypto-backed digests (SHA-256, SHA-1, MD5)
pub mod digest;

pub use self::digest::{Md5Algo, Sha1Algo, Sha256Algo};

use crate::types::AlgorithmType;
use std::io::Write;
use std::sync::Arc;

/// Common interface for all mining algorithms
///
/// All mining algorithm implementations must provide these basic operations
/// to be compatible with the nonce search workers.
pub trait Algorithm: Send + Sync {
    /// Compute the digest of the candidate block for `nonce`
    ///
    /// # Arguments
    /// * `input` - The block header template (without nonce)
    /// * `nonce` - The nonce value substituted into the candidate
    fn hash(&self, input: &[u8], nonce: u64) -> Vec<u8>;

    /// Verify that `nonce` solves `input` at the given difficulty
    ///
    /// # Returns
    /// `true` if the digest has at least `difficulty` leading zero nibbles
    fn verify(&self, input: &[u8], nonce: u64, difficulty: u32) -> bool {
        meets_difficulty(&self.hash(input, nonce), difficulty)
    }

    /// Get the algorithm type
    fn algorithm_type(&self) -> AlgorithmType;
}

/// Builds the candidate block bytes: template followed by the decimal nonce
///
/// This is the exact byte string the API server re-hashes to verify a
/// submitted block, so it must not change independently of the server.
pub fn candidate_bytes(input: &[u8], nonce: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(input.len() + 20);
    data.extend_from_slice(input);
    // Writing into a Vec cannot fail.
    let _ = write!(data, "{}", nonce);
    data
}

/// Difficulty predicate: at least `difficulty` leading '0' hex characters
///
/// Works on raw bytes, two nibbles per byte, which is equivalent to
/// checking the lowercase hex rendering of the digest.
pub fn meets_difficulty(digest: &[u8], difficulty: u32) -> bool {
    let nibbles = difficulty as usize;
    if nibbles > digest.len() * 2 {
        return false;
    }

    let full_bytes = nibbles / 2;
    if digest[..full_bytes].iter().any(|&b| b != 0) {
        return false;
    }

    nibbles % 2 == 0 || digest[full_bytes] >> 4 == 0
}

/// Creates the algorithm implementation for `algo`
pub fn create_algorithm(algo: AlgorithmType) -> Arc<dyn Algorithm> {
    match algo {
        AlgorithmType::Sha256 => Arc::new(Sha256Algo::new()),
        AlgorithmType::Sha1 => Arc::new(Sha1Algo::new()),
        AlgorithmType::Md5 => Arc::new(Md5Algo::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn zero_difficulty_always_passes() {
        assert!(meets_difficulty(&[0xff; 32], 0));
        assert!(meets_difficulty(&[], 0));
    }

    #[test]
    fn difficulty_beyond_digest_length_never_passes() {
        assert!(!meets_difficulty(&[0x12; 32], 64));
        assert!(!meets_difficulty(&[0x00; 16], 33));
    }

    #[test]
    fn full_zero_digest_meets_its_own_length() {
        assert!(meets_difficulty(&[0x00; 32], 64));
    }

    #[test]
    fn boundary_with_even_number_of_zero_nibbles() {
        let digest = hex!("0000f1aa");
        assert!(meets_difficulty(&digest, 4));
        assert!(!meets_difficulty(&digest, 5));
    }

    #[test]
    fn boundary_with_odd_number_of_zero_nibbles() {
        let digest = hex!("00000abc");
        assert!(meets_difficulty(&digest, 5));
        assert!(meets_difficulty(&digest, 4));
        assert!(!meets_difficulty(&digest, 6));
    }

    #[test]
    fn predicate_matches_hex_string_definition() {
        let digests = [hex!("000fff00"), hex!("0a000000"), hex!("00000000"), hex!("f0000000")];
        for digest in digests {
            let rendered = hex::encode(digest);
            for d in 0..=9u32 {
                let expected = rendered.len() >= d as usize
                    && rendered.starts_with(&"0".repeat(d as usize));
                assert_eq!(meets_difficulty(&digest, d), expected, "{} at {}", rendered, d);
            }
        }
    }

    #[test]
    fn candidate_appends_decimal_nonce() {
        assert_eq!(candidate_bytes(b"block_", 42), b"block_42".to_vec());
        assert_eq!(candidate_bytes(b"", 0), b"0".to_vec());
    }

    #[test]
    fn factory_honours_algorithm_type() {
        for algo in [AlgorithmType::Sha256, AlgorithmType::Sha1, AlgorithmType::Md5] {
            let imp = create_algorithm(algo);
            assert_eq!(imp.algorithm_type(), algo);
        }
        assert_eq!(create_algorithm(AlgorithmType::Sha256).hash(b"x", 1).len(), 32);
        assert_eq!(create_algorithm(AlgorithmType::Sha1).hash(b"x", 1).len(), 20);
        assert_eq!(create_algorithm(AlgorithmType::Md5).hash(b"x", 1).len(), 16);
    }
}
