//! PoW Miner - multi-threaded proof-of-work miner in Rust
//!
//! This crate provides a complete client-side proof-of-work miner with support for:
//! - Pluggable digest algorithms (SHA-256, SHA-1, MD5)
//! - Parallel nonce search with per-job timeouts and job rotation
//! - Rate-limited, retried solution submission to an API server
//! - Optional automatic difficulty adjustment
//! - CPU throttling, memory warnings and hash rate statistics

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Miner core implementation including algorithms and scheduling
pub mod miner;

/// Network communication with the API server
pub mod network;

/// Statistics collection and resource governance
pub mod stats;

/// Utility functions and error handling
pub mod utils;

/// Command-line interface definitions
pub mod cli;

/// Configuration management
pub mod config;

/// Shared type definitions
pub mod types;

// Core exports
pub use cli::Commands;
pub use config::Config;
pub use miner::{Algorithm, EngineSettings, EngineState, Job, NonceRange, Scheduler, Solution, Worker};
pub use network::{ApiClient, JobSource, RateLimiter, SubmissionPipeline, Submitter};
pub use stats::{HardwareStats, MiningStats, ResourceGovernor, StatsReporter};
pub use types::AlgorithmType;
pub use utils::{MinerError, init_logging};
