// src/config/config.rs
use crate::miner::scheduler::EngineSettings;
use crate::network::submission::RetryPolicy;
use crate::types::AlgorithmType;
use crate::utils::error::MinerError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Main configuration structure for the mining application
///
/// Every field has a default, so an empty or missing file is a valid
/// starting point; `api_secret` still has to be supplied before mining.
/// Values are fixed once the miner starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// API server base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the API endpoint below the base URL
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// Starting difficulty in leading zero hex digits
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,

    /// Shared secret sent with every submission
    #[serde(default)]
    pub api_secret: String,

    /// Number of worker threads (capped to the CPU count)
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Network request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Submission attempts including the first
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Seconds between submission attempts
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,

    /// Nonces assigned to each worker per job
    #[serde(default = "default_nonce_range")]
    pub nonce_range: u64,

    /// Hashes between cancellation checks
    #[serde(default = "default_hash_batch_size")]
    pub hash_batch_size: u64,

    /// Adjust difficulty from job resolution times
    #[serde(default)]
    pub auto_difficulty: bool,

    /// CPU usage ceiling in percent
    #[serde(default = "default_cpu_limit")]
    pub cpu_limit: u8,

    /// Advisory process memory ceiling in MB
    #[serde(default = "default_memory_limit")]
    pub memory_limit: u64,

    /// Seconds before an unsolved job is rotated
    #[serde(default = "default_mining_timeout")]
    pub mining_timeout: u64,

    /// Also write log lines to `log_file`
    #[serde(default)]
    pub log_to_file: bool,

    /// Log file path
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Digest used for proof of work
    #[serde(default)]
    pub hash_algorithm: AlgorithmType,

    /// Minimum seconds between API calls (fractional allowed)
    #[serde(default = "default_min_api_interval")]
    pub min_api_interval: f64,

    /// Account id reported with submissions
    #[serde(default)]
    pub user_id: Option<u64>,

    /// Where jobs come from
    #[serde(default)]
    pub job_source: JobSourceKind,

    /// Final submission failures in a row before cooling down (0 disables)
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Cool-down length in seconds
    #[serde(default = "default_failure_cooldown")]
    pub failure_cooldown: u64,

    /// Seconds in-flight submissions may take after shutdown
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace: u64,

    /// Seconds between statistics summaries
    #[serde(default = "default_stats_interval")]
    pub stats_interval: u64,

    /// Seconds between CPU/memory samples
    #[serde(default = "default_governor_interval")]
    pub governor_interval: u64,

    /// PID file that keeps a second miner from starting on this host
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,
}

/// Upper bound for every setting given in seconds (one week)
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// Where the miner gets its jobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum JobSourceKind {
    /// Ask the API server for each job
    #[default]
    Remote,
    /// Generate block templates locally
    Local,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".into()
}

fn default_api_path() -> String {
    "api".into()
}

fn default_difficulty() -> u32 {
    5
}

fn default_threads() -> usize {
    4
}

fn default_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    2
}

fn default_nonce_range() -> u64 {
    2_000_000
}

fn default_hash_batch_size() -> u64 {
    50_000
}

fn default_cpu_limit() -> u8 {
    80
}

fn default_memory_limit() -> u64 {
    1024
}

fn default_mining_timeout() -> u64 {
    120
}

fn default_log_file() -> PathBuf {
    PathBuf::from("logs/pow-miner.log")
}

fn default_min_api_interval() -> f64 {
    1.0
}

fn default_max_consecutive_failures() -> u32 {
    5
}

fn default_failure_cooldown() -> u64 {
    30
}

fn default_shutdown_grace() -> u64 {
    5
}

fn default_stats_interval() -> u64 {
    60
}

fn default_governor_interval() -> u64 {
    5
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("pow-miner.pid")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: default_base_url(),
            api_path: default_api_path(),
            difficulty: default_difficulty(),
            api_secret: String::new(),
            threads: default_threads(),
            timeout: default_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_delay: default_retry_delay(),
            nonce_range: default_nonce_range(),
            hash_batch_size: default_hash_batch_size(),
            auto_difficulty: false,
            cpu_limit: default_cpu_limit(),
            memory_limit: default_memory_limit(),
            mining_timeout: default_mining_timeout(),
            log_to_file: false,
            log_file: default_log_file(),
            hash_algorithm: AlgorithmType::default(),
            min_api_interval: default_min_api_interval(),
            user_id: None,
            job_source: JobSourceKind::default(),
            max_consecutive_failures: default_max_consecutive_failures(),
            failure_cooldown: default_failure_cooldown(),
            shutdown_grace: default_shutdown_grace(),
            stats_interval: default_stats_interval(),
            governor_interval: default_governor_interval(),
            pid_file: default_pid_file(),
        }
    }
}

impl Config {
    /// Loads configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded configuration
    /// * `Err(MinerError)` - If file couldn't be read or parsed
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MinerError> {
        let path = path.into();
        let config_str = std::fs::read_to_string(&path).map_err(|e| {
            MinerError::ConfigError(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::parse(&config_str)
    }

    /// Loads `path` if it exists, otherwise starts from the defaults
    pub fn load_or_default(path: &Path) -> Result<Self, MinerError> {
        if path.exists() {
            Self::load(path)
        } else {
            log::info!(
                "No config file at {}, using defaults and overrides",
                path.display()
            );
            Ok(Config::default())
        }
    }

    /// Parses configuration from TOML text
    pub fn parse(config_str: &str) -> Result<Self, MinerError> {
        Ok(toml::from_str(config_str)?)
    }

    /// Checks every parameter before the miner starts
    ///
    /// # Errors
    /// Returns `MinerError::ConfigError` naming the first invalid parameter
    pub fn validate(&self) -> Result<(), MinerError> {
        if self.base_url.trim().is_empty() {
            return Err(invalid("BASE_URL must not be empty"));
        }
        Url::parse(&self.base_url)
            .map_err(|e| invalid(&format!("BASE_URL '{}' is not a valid URL: {}", self.base_url, e)))?;
        if self.api_secret.is_empty() {
            return Err(invalid("API_SECRET is required"));
        }
        if self.threads < 1 {
            return Err(invalid("THREADS must be at least 1"));
        }
        if self.nonce_range < 1 {
            return Err(invalid("NONCE_RANGE must be at least 1"));
        }
        if self.hash_batch_size < 1 {
            return Err(invalid("HASH_BATCH_SIZE must be at least 1"));
        }
        if !(1..=100).contains(&self.cpu_limit) {
            return Err(invalid("CPU_LIMIT must be between 1 and 100"));
        }
        for (name, secs) in [
            ("TIMEOUT", self.timeout),
            ("MINING_TIMEOUT", self.mining_timeout),
            ("STATS_INTERVAL", self.stats_interval),
            ("GOVERNOR_INTERVAL", self.governor_interval),
        ] {
            if secs == 0 {
                return Err(invalid(&format!("{} must be greater than 0", name)));
            }
        }
        for (name, secs) in [
            ("TIMEOUT", self.timeout),
            ("MINING_TIMEOUT", self.mining_timeout),
            ("RETRY_DELAY", self.retry_delay),
            ("FAILURE_COOLDOWN", self.failure_cooldown),
            ("SHUTDOWN_GRACE", self.shutdown_grace),
            ("STATS_INTERVAL", self.stats_interval),
            ("GOVERNOR_INTERVAL", self.governor_interval),
        ] {
            if secs > MAX_INTERVAL_SECS {
                return Err(invalid(&format!(
                    "{} must be at most {} seconds",
                    name, MAX_INTERVAL_SECS
                )));
            }
        }
        self.min_api_interval()?;
        if self.pid_file.as_os_str().is_empty() {
            return Err(invalid("PID_FILE must not be empty"));
        }
        Ok(())
    }

    /// Caps `threads` to the number of available CPUs
    ///
    /// # Returns
    /// The effective thread count
    pub fn cap_threads(&mut self, available: usize) -> usize {
        let available = available.max(1);
        if self.threads > available {
            log::warn!(
                "THREADS={} exceeds the {} available CPUs, using {}",
                self.threads,
                available,
                available
            );
            self.threads = available;
        }
        self.threads
    }

    /// Engine tuning derived from this configuration
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            threads: self.threads,
            nonce_range: self.nonce_range,
            batch_size: self.hash_batch_size,
            mining_timeout: Duration::from_secs(self.mining_timeout),
            auto_difficulty: self.auto_difficulty,
            fetch_backoff: Duration::from_secs(self.retry_delay),
            max_consecutive_failures: self.max_consecutive_failures,
            failure_cooldown: Duration::from_secs(self.failure_cooldown),
            shutdown_grace: Duration::from_secs(self.shutdown_grace),
        }
    }

    /// Submission retry policy
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_secs(self.retry_delay))
    }

    /// Network request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Minimum spacing between API calls
    ///
    /// # Errors
    /// Returns `MinerError::ConfigError` unless the value is a finite
    /// number of seconds between 0 and [`MAX_INTERVAL_SECS`]
    pub fn min_api_interval(&self) -> Result<Duration, MinerError> {
        let secs = self.min_api_interval;
        if !secs.is_finite() || !(0.0..=MAX_INTERVAL_SECS as f64).contains(&secs) {
            return Err(invalid(&format!(
                "MIN_API_INTERVAL must be between 0 and {} seconds, got {}",
                MAX_INTERVAL_SECS, secs
            )));
        }
        Duration::try_from_secs_f64(secs).map_err(|e| invalid(&format!("MIN_API_INTERVAL: {}", e)))
    }

    /// Generates a configuration template string
    ///
    /// # Returns
    /// String containing a commented TOML configuration template
    pub fn generate_template() -> String {
        let mut template = String::new();
        template.push_str("# PoW Miner Configuration\n");
        template.push_str("# Every setting can also be given as a CLI flag or an upper-case\n");
        template.push_str("# environment variable (e.g. THREADS=8).\n\n");

        template.push_str("# API server\n");
        template.push_str("base_url = \"http://127.0.0.1:8000\"\n");
        template.push_str("api_path = \"api\"\n");
        template.push_str("# Shared secret sent with submissions (required)\n");
        template.push_str("api_secret = \"\"\n");
        template.push_str("# user_id = 1\n");
        template.push_str("# Job source: remote or local\n");
        template.push_str("job_source = \"remote\"\n\n");

        template.push_str("# Mining\n");
        template.push_str("# Supported algorithms: sha256, sha1, md5\n");
        template.push_str("hash_algorithm = \"sha256\"\n");
        template.push_str("difficulty = 5\n");
        template.push_str("auto_difficulty = false\n");
        template.push_str("threads = 4\n");
        template.push_str("nonce_range = 2000000\n");
        template.push_str("hash_batch_size = 50000\n");
        template.push_str("# Seconds before an unsolved job is rotated\n");
        template.push_str("mining_timeout = 120\n\n");

        template.push_str("# Network (seconds)\n");
        template.push_str("timeout = 30\n");
        template.push_str("retry_attempts = 5\n");
        template.push_str("retry_delay = 2\n");
        template.push_str("min_api_interval = 1.0\n");
        template.push_str("max_consecutive_failures = 5\n");
        template.push_str("failure_cooldown = 30\n");
        template.push_str("shutdown_grace = 5\n\n");

        template.push_str("# Resources\n");
        template.push_str("# CPU usage ceiling in percent (1-100)\n");
        template.push_str("cpu_limit = 80\n");
        template.push_str("# Advisory memory ceiling in MB\n");
        template.push_str("memory_limit = 1024\n");
        template.push_str("governor_interval = 5\n\n");

        template.push_str("# Logging\n");
        template.push_str("log_to_file = false\n");
        template.push_str("log_file = \"logs/pow-miner.log\"\n");
        template.push_str("stats_interval = 60\n\n");

        template.push_str("# Refuses to start while another miner holds this file\n");
        template.push_str("pid_file = \"pow-miner.pid\"\n");

        template
    }
}

fn invalid(message: &str) -> MinerError {
    MinerError::ConfigError(message.to_string())
}
