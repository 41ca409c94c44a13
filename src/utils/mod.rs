// src/utils/mod.rs
//! Shared error type, logging setup and the single-instance guard
//!
//! Everything here is used by the binary at startup and by every
//! module that reports failures.

/// [`MinerError`] and its conversions from library errors
pub mod error;

/// PID file guard against a second miner on the same host
pub mod instance;

/// `env_logger` setup, with optional mirroring into a log file
pub mod logging;

/// SIGINT/SIGTERM handling
pub mod shutdown;

pub use error::MinerError;
pub use instance::InstanceLock;
pub use logging::init_logging;
pub use shutdown::cancel_on_signal;
