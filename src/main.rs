// src/main.rs
use clap::Parser;
use pow_miner_rs::config::JobSourceKind;
use pow_miner_rs::miner::algorithm::create_algorithm;
use pow_miner_rs::network::{
    HttpSubmitter, LOCAL_TEMPLATE_PREFIX, LocalJobSource, RemoteJobSource,
};
use pow_miner_rs::utils::logging::init_bench_logging;
use pow_miner_rs::*;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

/// Main entry point for the PoW miner
///
/// # Returns
/// - `Ok(())` on successful execution, including a SIGINT/SIGTERM shutdown
/// - `Err(MinerError)` if configuration or startup fails
///
/// # Flow
/// 1. Parses command line arguments
/// 2. Delegates to appropriate subcommand handler
/// 3. Propagates any errors upward
fn main() -> Result<(), MinerError> {
    let cli = cli::Commands::parse();

    match cli.action {
        cli::Action::Start(opts) => start_mining(opts),
        cli::Action::Benchmark(opts) => run_benchmark(opts),
        cli::Action::Config(opts) => generate_config(opts),
        cli::Action::Probe(opts) => probe(opts),
    }
}

/// Starts the mining operation with given configuration options
///
/// # Operations
/// 1. Loads configuration and applies CLI/environment overrides
/// 2. Initializes logging
/// 3. Validates configuration
/// 4. Takes the single-instance PID file
/// 5. Runs the mining engine until SIGINT or SIGTERM
fn start_mining(opts: cli::StartOptions) -> Result<(), MinerError> {
    let mut config = Config::load_or_default(&opts.config)?;
    opts.apply_to(&mut config);

    let log_file = config.log_to_file.then(|| config.log_file.clone());
    utils::init_logging(log_file.as_deref())?;

    config.validate()?;
    config.cap_threads(num_cpus::get());

    // Held until the engine has stopped; dropping it removes the PID file
    let _instance = utils::InstanceLock::acquire(&config.pid_file)?;

    let rt = Runtime::new()?;
    rt.block_on(run_miner(config))
}

/// Wires the components together and runs the engine to completion
async fn run_miner(config: Config) -> Result<(), MinerError> {
    let settings = config.engine_settings();
    let stats = StatsReporter::new();
    let state = Arc::new(EngineState::new(config.difficulty, stats.clone()));

    // Resource governance and periodic statistics
    let governor = Arc::new(ResourceGovernor::new(config.cpu_limit, config.memory_limit));
    let governor_task = governor.start(Duration::from_secs(config.governor_interval));
    let reporter_task = stats.start_reporting(
        Arc::clone(&state),
        Arc::clone(&governor),
        Duration::from_secs(config.stats_interval),
    );

    // Network setup
    let api = Arc::new(ApiClient::new(
        &config.base_url,
        &config.api_path,
        config.api_secret.clone(),
        config.user_id,
        config.request_timeout(),
    )?);
    let limiter = Arc::new(RateLimiter::new(config.min_api_interval()?));
    let job_source: Arc<dyn JobSource> = match config.job_source {
        JobSourceKind::Remote => Arc::new(RemoteJobSource::new(Arc::clone(&api), Arc::clone(&limiter))),
        JobSourceKind::Local => Arc::new(LocalJobSource::new(LOCAL_TEMPLATE_PREFIX, config.user_id)),
    };
    let submitter = Arc::new(HttpSubmitter::new(
        Arc::clone(&api),
        stats.clone(),
        Arc::clone(&governor),
        settings.threads,
    ));
    let pipeline = Arc::new(SubmissionPipeline::new(
        submitter,
        limiter,
        config.retry_policy(),
        config.request_timeout(),
    ));

    log::info!(
        "Starting miner against {} ({} job source, {}, {} threads)",
        api.endpoint(),
        match config.job_source {
            JobSourceKind::Remote => "remote",
            JobSourceKind::Local => "local",
        },
        config.hash_algorithm,
        settings.threads
    );

    // Shutdown on SIGINT or SIGTERM
    let shutdown = CancellationToken::new();
    let signal_task = utils::cancel_on_signal(shutdown.clone())?;

    let scheduler = Scheduler::new(
        settings,
        create_algorithm(config.hash_algorithm),
        job_source,
        pipeline,
        Arc::clone(&state),
        governor.throttle(),
        shutdown,
    )?;
    let result = scheduler.run().await;

    signal_task.abort();
    reporter_task.shutdown();
    governor_task.shutdown();

    let final_stats = result?;
    stats.log_summary(&state, &governor);
    log::info!(
        "Mined for {:.0}s: {} hashes, {} accepted, {} rejected, {} failed",
        final_stats.elapsed.as_secs_f64(),
        final_stats.hashes_total,
        final_stats.shares_accepted,
        final_stats.shares_rejected,
        final_stats.submissions_failed
    );
    Ok(())
}

/// Runs a hash rate benchmark
///
/// # Operations
/// 1. Initializes benchmark-specific logging
/// 2. Creates specified algorithm instance
/// 3. Hashes on `threads` threads for `duration` seconds
/// 4. Reports total hashes and average hash rate
fn run_benchmark(opts: cli::BenchmarkOptions) -> Result<(), MinerError> {
    init_bench_logging();

    let algorithm = create_algorithm(opts.algorithm);
    let reporter = StatsReporter::new();
    let duration = Duration::from_secs(opts.duration);
    let threads = opts.threads.max(1);

    log::info!(
        "Starting {} benchmark for {} seconds on {} threads",
        opts.algorithm,
        opts.duration,
        threads
    );

    let start_time = Instant::now();
    let handles: Vec<_> = (0..threads)
        .map(|id| {
            let algo = Arc::clone(&algorithm);
            let counter = reporter.hash_counter();
            std::thread::spawn(move || {
                let template = format!("benchmark_{}_", id).into_bytes();
                let mut nonce = 0u64;
                let mut last_log = Instant::now();
                let mut hashes = 0u64;

                while start_time.elapsed() < duration {
                    for _ in 0..1_000 {
                        let _ = algo.hash(&template, nonce);
                        nonce += 1;
                    }
                    hashes += 1_000;
                    counter.fetch_add(1_000, Ordering::Relaxed);

                    // Log progress every second
                    if last_log.elapsed().as_secs() >= 1 {
                        log::debug!(
                            "Thread {}: {:.1} H/s",
                            id,
                            hashes as f64 / last_log.elapsed().as_secs_f64()
                        );
                        hashes = 0;
                        last_log = Instant::now();
                    }
                }
            })
        })
        .collect();

    // Wait for all threads to complete
    for handle in handles {
        handle
            .join()
            .map_err(|_| MinerError::TaskError("benchmark thread panicked".into()))?;
    }

    // Report final results
    let total = reporter.hashes();
    let secs = start_time.elapsed().as_secs_f64();
    log::info!("Benchmark results:");
    log::info!("Total hashes: {}", total);
    log::info!("Average hashrate: {:.2} H/s", total as f64 / secs);
    log::logger().flush(); // Ensure final results appear

    Ok(())
}

/// Generates configuration template file
fn generate_config(opts: cli::ConfigOptions) -> Result<(), MinerError> {
    if let Some(parent) = opts.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&opts.output, config::generate_template())?;
    println!("Configuration template written to {}", opts.output.display());
    Ok(())
}

/// Checks that the configured API server is online
fn probe(opts: cli::ProbeOptions) -> Result<(), MinerError> {
    utils::init_logging(None)?;

    let mut config = Config::load_or_default(&opts.config)?;
    if let Some(base_url) = opts.base_url {
        config.base_url = base_url;
    }

    let api = ApiClient::new(
        &config.base_url,
        &config.api_path,
        config.api_secret.clone(),
        config.user_id,
        config.request_timeout(),
    )?;

    let rt = Runtime::new()?;
    let status = rt.block_on(api.status())?;
    log::info!(
        "API {} is {} (server: {}, version: {}, load: {})",
        api.endpoint(),
        status.status,
        status.server.as_deref().unwrap_or("-"),
        status.version.as_deref().unwrap_or("-"),
        status
            .server_load
            .map(|l| format!("{:.1}%", l))
            .unwrap_or_else(|| "-".into())
    );
    Ok(())
}
