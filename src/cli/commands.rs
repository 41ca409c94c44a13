// src/cli/commands.rs
use crate::config::{Config, JobSourceKind};
use crate::types::AlgorithmType;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// PoW Miner CLI - multi-threaded proof-of-work miner in Rust
#[derive(Parser, Debug)]
#[command(name = "pow-miner-rs")]
#[command(version, about, long_about = None)]
pub struct Commands {
    /// The action to perform (start mining, run benchmarks, generate config or probe the API)
    #[command(subcommand)]
    pub action: Action,
}

/// Top-level commands for the miner application
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Start mining operation with specified options
    Start(StartOptions),

    /// Measure the hash rate of an algorithm
    Benchmark(BenchmarkOptions),

    /// Generate configuration file template
    Config(ConfigOptions),

    /// Check that the API server is online
    Probe(ProbeOptions),
}

/// Options for starting the mining operation
///
/// Every override also reads the environment variable of the same name.
#[derive(Parser, Debug, Default)]
pub struct StartOptions {
    /// Path to configuration file (optional; defaults apply when missing)
    #[arg(short, long, default_value = "config.toml", env = "CONFIG_FILE")]
    pub config: PathBuf,

    /// API server base URL
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Starting difficulty (leading zero hex digits)
    #[arg(long, env = "DIFFICULTY")]
    pub difficulty: Option<u32>,

    /// Shared API secret
    #[arg(long, env = "API_SECRET", hide_env_values = true)]
    pub api_secret: Option<String>,

    /// Number of worker threads
    #[arg(short, long, env = "THREADS")]
    pub threads: Option<usize>,

    /// Network request timeout in seconds
    #[arg(long, env = "TIMEOUT")]
    pub timeout: Option<u64>,

    /// Submission attempts including the first
    #[arg(long, env = "RETRY_ATTEMPTS")]
    pub retry_attempts: Option<u32>,

    /// Seconds between submission attempts
    #[arg(long, env = "RETRY_DELAY")]
    pub retry_delay: Option<u64>,

    /// Nonces per worker per job
    #[arg(long, env = "NONCE_RANGE")]
    pub nonce_range: Option<u64>,

    /// Hashes between cancellation checks
    #[arg(long, env = "HASH_BATCH_SIZE")]
    pub hash_batch_size: Option<u64>,

    /// Adjust difficulty automatically (true/false)
    #[arg(long, env = "AUTO_DIFFICULTY")]
    pub auto_difficulty: Option<bool>,

    /// CPU usage ceiling in percent
    #[arg(long, env = "CPU_LIMIT")]
    pub cpu_limit: Option<u8>,

    /// Advisory memory ceiling in MB
    #[arg(long, env = "MEMORY_LIMIT")]
    pub memory_limit: Option<u64>,

    /// Seconds before an unsolved job is rotated
    #[arg(long, env = "MINING_TIMEOUT")]
    pub mining_timeout: Option<u64>,

    /// Also write logs to the configured log file (true/false)
    #[arg(long, env = "LOG_TO_FILE")]
    pub log_to_file: Option<bool>,

    /// Mining algorithm to use
    #[arg(short, long, env = "HASH_ALGORITHM")]
    pub algorithm: Option<AlgorithmType>,

    /// Minimum seconds between API calls
    #[arg(long, env = "MIN_API_INTERVAL")]
    pub min_api_interval: Option<f64>,

    /// Account id reported with submissions
    #[arg(long, env = "USER_ID")]
    pub user_id: Option<u64>,

    /// Where jobs come from
    #[arg(long, env = "JOB_SOURCE")]
    pub job_source: Option<JobSourceKind>,

    /// Single-instance PID file
    #[arg(long, env = "PID_FILE")]
    pub pid_file: Option<PathBuf>,
}

impl StartOptions {
    /// Applies every given override on top of `config`
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(api_secret) = &self.api_secret {
            config.api_secret = api_secret.clone();
        }
        if let Some(difficulty) = self.difficulty {
            config.difficulty = difficulty;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(retry_attempts) = self.retry_attempts {
            config.retry_attempts = retry_attempts;
        }
        if let Some(retry_delay) = self.retry_delay {
            config.retry_delay = retry_delay;
        }
        if let Some(nonce_range) = self.nonce_range {
            config.nonce_range = nonce_range;
        }
        if let Some(hash_batch_size) = self.hash_batch_size {
            config.hash_batch_size = hash_batch_size;
        }
        if let Some(auto_difficulty) = self.auto_difficulty {
            config.auto_difficulty = auto_difficulty;
        }
        if let Some(cpu_limit) = self.cpu_limit {
            config.cpu_limit = cpu_limit;
        }
        if let Some(memory_limit) = self.memory_limit {
            config.memory_limit = memory_limit;
        }
        if let Some(mining_timeout) = self.mining_timeout {
            config.mining_timeout = mining_timeout;
        }
        if let Some(log_to_file) = self.log_to_file {
            config.log_to_file = log_to_file;
        }
        if let Some(algorithm) = self.algorithm {
            config.hash_algorithm = algorithm;
        }
        if let Some(min_api_interval) = self.min_api_interval {
            config.min_api_interval = min_api_interval;
        }
        if let Some(user_id) = self.user_id {
            config.user_id = Some(user_id);
        }
        if let Some(job_source) = self.job_source {
            config.job_source = job_source;
        }
        if let Some(pid_file) = &self.pid_file {
            config.pid_file = pid_file.clone();
        }
    }
}

/// Options for running mining benchmarks
#[derive(Parser, Debug)]
pub struct BenchmarkOptions {
    /// Algorithm to benchmark
    #[arg(short, long, default_value_t = AlgorithmType::Sha256)]
    pub algorithm: AlgorithmType,

    /// Duration of benchmark in seconds
    #[arg(short, long, default_value_t = 10)]
    pub duration: u64,

    /// Number of threads to use
    #[arg(short, long, default_value_t = num_cpus::get())]
    pub threads: usize,
}

/// Options for generating configuration files
#[derive(Parser, Debug)]
pub struct ConfigOptions {
    /// Output file path
    #[arg(short, long, default_value = "config.toml")]
    pub output: PathBuf,
}

/// Options for probing the API server
#[derive(Parser, Debug)]
pub struct ProbeOptions {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "CONFIG_FILE")]
    pub config: PathBuf,

    /// API server base URL (overrides config)
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_overrides_replace_config_values() {
        let cli = Commands::try_parse_from([
            "pow-miner-rs",
            "start",
            "--threads",
            "2",
            "--algorithm",
            "md5",
            "--auto-difficulty",
            "true",
            "--min-api-interval",
            "0.5",
            "--job-source",
            "local",
            "--api-secret",
            "s3cret",
            "--pid-file",
            "run/miner.pid",
        ])
        .unwrap();

        let Action::Start(opts) = cli.action else {
            panic!("expected start");
        };
        let mut config = Config::default();
        opts.apply_to(&mut config);

        assert_eq!(config.threads, 2);
        assert_eq!(config.hash_algorithm, AlgorithmType::Md5);
        assert!(config.auto_difficulty);
        assert_eq!(config.min_api_interval, 0.5);
        assert_eq!(config.job_source, JobSourceKind::Local);
        assert_eq!(config.api_secret, "s3cret");
        assert_eq!(config.pid_file, PathBuf::from("run/miner.pid"));
    }

    #[test]
    fn missing_overrides_keep_config_values() {
        let mut config = Config {
            difficulty: 9,
            ..Config::default()
        };
        StartOptions::default().apply_to(&mut config);
        assert_eq!(config.difficulty, 9);
        assert_eq!(config.threads, 4);
    }

    #[test]
    fn benchmark_defaults() {
        let cli = Commands::try_parse_from(["pow-miner-rs", "benchmark"]).unwrap();
        let Action::Benchmark(opts) = cli.action else {
            panic!("expected benchmark");
        };
        assert_eq!(opts.algorithm, AlgorithmType::Sha256);
        assert_eq!(opts.duration, 10);
    }
}
