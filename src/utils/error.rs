// src/utils/error.rs
use std::io;
use thiserror::Error;

/// Main error type for the mining application
///
/// Only `ConfigError`, `AlreadyRunning` and startup failures are fatal;
/// everything raised inside the mining loop is logged and recovered from
/// locally.
#[derive(Error, Debug)]
pub enum MinerError {
    /// Missing or invalid configuration parameter (fatal at startup)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Errors related to network connectivity
    #[error("Network connection error: {0}")]
    ConnectionError(String),

    /// Malformed or unexpected response from the API server
    #[error("Protocol violation: {0}")]
    ProtocolError(String),

    /// Standard I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Another miner holds the single-instance PID file
    #[error("Another miner is already running with PID {pid} ({})", .path.display())]
    AlreadyRunning {
        /// PID recorded in the file
        pid: u32,
        /// The PID file
        path: std::path::PathBuf,
    },

    /// Hashing pool or benchmark thread failures
    #[error("Task execution error: {0}")]
    TaskError(String),
}

impl MinerError {
    /// Whether the failure is worth retrying after a delay
    ///
    /// Connection trouble and server-side HTTP failures are transient.
    pub fn is_transient(&self) -> bool {
        match self {
            MinerError::ConnectionError(_) | MinerError::IoError(_) => true,
            MinerError::HttpError(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            _ => false,
        }
    }
}

/// Converts TOML parse errors into MinerError
impl From<toml::de::Error> for MinerError {
    fn from(e: toml::de::Error) -> Self {
        MinerError::ConfigError(format!("Invalid config format: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_failures_are_transient() {
        assert!(MinerError::ConnectionError("refused".into()).is_transient());
        assert!(MinerError::IoError(io::Error::from(io::ErrorKind::ConnectionReset)).is_transient());
    }

    #[test]
    fn config_and_protocol_failures_are_not_transient() {
        assert!(!MinerError::ConfigError("missing BASE_URL".into()).is_transient());
        assert!(!MinerError::ProtocolError("missing job_id".into()).is_transient());
        assert!(
            !MinerError::AlreadyRunning {
                pid: 42,
                path: "miner.pid".into()
            }
            .is_transient()
        );
    }
}
