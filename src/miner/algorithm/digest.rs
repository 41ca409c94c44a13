// src/miner/algorithm/digest.rs
//! Digest-based proof-of-work algorithms
//!
//! Every supported algorithm is a plain cryptographic digest over the
//! candidate block bytes, so one generic implementation backed by the
//! RustCrypto `Digest` trait covers all of them.

use crate::miner::algorithm::{Algorithm, candidate_bytes};
use crate::types::AlgorithmType;
use sha2::Digest;
use std::marker::PhantomData;

/// Stateless digest algorithm parameterised by the RustCrypto hasher
pub struct DigestAlgo<D> {
    algorithm: AlgorithmType,
    _digest: PhantomData<fn() -> D>,
}

/// SHA-256 proof-of-work (the default)
pub type Sha256Algo = DigestAlgo<sha2::Sha256>;
/// SHA-1 proof-of-work
pub type Sha1Algo = DigestAlgo<sha1::Sha1>;
/// MD5 proof-of-work
pub type Md5Algo = DigestAlgo<md5::Md5>;

impl Sha256Algo {
    /// Creates the SHA-256 algorithm
    pub fn new() -> Self {
        Self::with_type(AlgorithmType::Sha256)
    }
}

impl Sha1Algo {
    /// Creates the SHA-1 algorithm
    pub fn new() -> Self {
        Self::with_type(AlgorithmType::Sha1)
    }
}

impl Md5Algo {
    /// Creates the MD5 algorithm
    pub fn new() -> Self {
        Self::with_type(AlgorithmType::Md5)
    }
}

impl Default for Sha256Algo {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Sha1Algo {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Md5Algo {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> DigestAlgo<D> {
    fn with_type(algorithm: AlgorithmType) -> Self {
        Self {
            algorithm,
            _digest: PhantomData,
        }
    }
}

impl<D: Digest> Algorithm for DigestAlgo<D> {
    fn hash(&self, input: &[u8], nonce: u64) -> Vec<u8> {
        D::digest(candidate_bytes(input, nonce)).to_vec()
    }

    fn algorithm_type(&self) -> AlgorithmType {
        self.algorithm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    // Empty template with nonce 0 hashes the single byte "0".

    #[test]
    fn sha256_known_vector() {
        let out = Sha256Algo::new().hash(b"", 0);
        assert_eq!(
            out,
            hex!("5feceb66ffc86f38d952786c6d696c79c2dbc239dd4e91b46729d73a27fb57e9")
        );
    }

    #[test]
    fn sha1_known_vector() {
        let out = Sha1Algo::new().hash(b"", 0);
        assert_eq!(out, hex!("b6589fc6ab0dc82cf12099d1c2d40ab994e8410c"));
    }

    #[test]
    fn md5_known_vector() {
        let out = Md5Algo::new().hash(b"", 0);
        assert_eq!(out, hex!("cfcd208495d565ef66e7dff9f98764da"));
    }

    #[test]
    fn verify_agrees_with_hash() {
        let algo = Sha256Algo::new();
        let digest = algo.hash(b"job", 7);
        let leading = hex::encode(&digest).chars().take_while(|c| *c == '0').count() as u32;
        assert!(algo.verify(b"job", 7, leading));
        assert!(!algo.verify(b"job", 7, leading + 1));
    }

    #[test]
    fn different_nonces_give_different_digests() {
        let algo = Md5Algo::new();
        assert_ne!(algo.hash(b"job", 1), algo.hash(b"job", 2));
    }

    #[test]
    fn default_matches_new() {
        assert_eq!(Sha256Algo::default().algorithm_type(), AlgorithmType::Sha256);
        assert_eq!(Sha1Algo::default().algorithm_type(), AlgorithmType::Sha1);
        assert_eq!(Md5Algo::default().algorithm_type(), AlgorithmType::Md5);
        assert_eq!(Md5Algo::default().hash(b"job", 3), Md5Algo::new().hash(b"job", 3));
    }
}
