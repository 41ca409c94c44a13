// src/utils/logging.rs
//! `env_logger` setup for the `start`, `probe` and `benchmark` commands
//!
//! Mining runs can mirror every line into `LOG_FILE`; benchmarks only
//! print to stdout and default to debug output.

use crate::utils::error::MinerError;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Installs the global logger for mining and probing
///
/// # Configuration
/// - Logs to stdout, and to `log_file` as well when one is given
/// - Default log level: Info
/// - Custom timestamp and source location formatting
/// - Respects `RUST_LOG` environment variable if set
///
/// # Errors
/// Returns `MinerError::IoError` if the log file cannot be opened.
pub fn init_logging(log_file: Option<&Path>) -> Result<(), MinerError> {
    let mut builder = common_log_config();
    builder.filter_level(LevelFilter::Info);
    if env::var("RUST_LOG").is_ok() {
        builder.parse_env("RUST_LOG");
    }

    if let Some(path) = log_file {
        builder.target(Target::Pipe(Box::new(TeeWriter::open(path)?)));
    }

    builder
        .try_init()
        .map_err(|e| MinerError::ConfigError(format!("Logger already initialized: {}", e)))
}

/// Configures benchmark-specific logging
///
/// # Differences from Standard Logging
/// - Default log level: Debug (if RUST_LOG not set)
/// - Never writes to a file
pub fn init_bench_logging() {
    let mut builder = common_log_config();

    // Set default to debug level if RUST_LOG not configured
    if env::var("RUST_LOG").is_err() {
        builder.filter_level(LevelFilter::Debug);
    } else {
        builder.parse_env("RUST_LOG");
    }

    builder.init();
}

/// Creates and configures a base logger builder with common settings
///
/// Line format: `[<timestamp> <LEVEL> <module>:<line>] <message>`
fn common_log_config() -> Builder {
    let mut builder = Builder::new();

    builder
        .format(|buf, record| {
            let ts = buf.timestamp_seconds();
            let level = record.level();
            let module = record.module_path().unwrap_or_default();
            let line = record.line().unwrap_or(0);

            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                ts,
                level,
                module,
                line,
                record.args()
            )
        })
        .target(Target::Stdout);

    builder
}

/// Writes every formatted record to stdout and appends it to a file
struct TeeWriter {
    file: File,
}

impl TeeWriter {
    fn open(path: &Path) -> Result<Self, MinerError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        // File trouble must never take the miner down.
        let _ = self.file.write_all(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        let _ = self.file.flush();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tee_writer_appends_to_file_and_creates_parent_dirs() {
        let dir = env::temp_dir().join(format!("pow-miner-log-{}", std::process::id()));
        let path = dir.join("nested").join("miner.log");

        let mut tee = TeeWriter::open(&path).unwrap();
        tee.write_all(b"first line\n").unwrap();
        tee.write_all(b"second line\n").unwrap();
        tee.flush().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first line\nsecond line\n");
        let _ = fs::remove_dir_all(dir);
    }
}
