// src/miner/mod.rs
//! Core mining functionality
//!
//! This module contains all components related to the mining process:
//! - Hash algorithm implementations (SHA-256, SHA-1, MD5)
//! - Job, nonce range and solution types
//! - Job scheduling and distribution
//! - Worker logic for scanning nonce ranges

/// Mining algorithm implementations
///
/// Contains the digest algorithms selectable with `hash_algorithm`
/// and the shared difficulty predicate.
pub mod algorithm;

/// Jobs, nonce ranges and solutions
pub mod job;

/// Mining job scheduler
///
/// Partitions each job across the workers, enforces the mining timeout,
/// hands solutions to the submission pipeline and rotates jobs.
pub mod scheduler;

/// Worker implementation
///
/// Contains the batch loop that performs the actual hash computations
/// for one nonce range.
pub mod worker;

// Re-export main components for cleaner imports
pub use self::algorithm::Algorithm;
pub use self::job::{Job, NonceRange, Solution};
pub use self::scheduler::{EnginePhase, EngineSettings, EngineState, JobResolution, Scheduler};
pub use self::worker::{Worker, WorkerOutcome, WorkerReport};
