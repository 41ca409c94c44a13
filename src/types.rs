// src/types.rs
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported digest algorithms for proof-of-work hashing
///
/// The coordinator verifies solutions with the same digest, so the
/// choice must match what the API server expects.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmType {
    /// SHA-256 (32-byte digest, 64 hex characters)
    #[default]
    #[value(name = "sha256")]
    Sha256,

    /// SHA-1 (20-byte digest, 40 hex characters)
    #[value(name = "sha1")]
    Sha1,

    /// MD5 (16-byte digest, 32 hex characters)
    #[value(name = "md5")]
    Md5,
}

impl fmt::Display for AlgorithmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmType::Sha256 => write!(f, "sha256"),
            AlgorithmType::Sha1 => write!(f, "sha1"),
            AlgorithmType::Md5 => write!(f, "md5"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_cli_and_config_names() {
        for algo in [AlgorithmType::Sha256, AlgorithmType::Sha1, AlgorithmType::Md5] {
            let name = algo.to_string();
            assert_eq!(AlgorithmType::from_str(&name, false).unwrap(), algo);

            let quoted: AlgorithmType = serde_json::from_str(&format!("\"{}\"", name)).unwrap();
            assert_eq!(quoted, algo);
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(AlgorithmType::from_str("blake2", false).is_err());
        assert!(serde_json::from_str::<AlgorithmType>("\"sha-512\"").is_err());
    }
}
