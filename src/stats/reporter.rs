// src/stats/reporter.rs
use crate::miner::scheduler::{EngineState, JobResolution};
use crate::network::submission::SubmissionStatus;
use crate::stats::{BackgroundTask, ResourceGovernor};
use crossbeam_channel::{select, tick};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Statistics related to mining performance
#[derive(Debug, Clone, Default)]
pub struct MiningStats {
    /// Total number of hashes computed
    pub hashes_total: u64,
    /// Time since mining started
    pub elapsed: Duration,
    /// Average hashrate since start (hashes per second)
    pub avg_hashrate: f64,
    /// Best per-job hashrate observed (hashes per second)
    pub best_hashrate: f64,
    /// Jobs that ended with a solution
    pub jobs_solved: u64,
    /// Jobs that hit the mining timeout
    pub jobs_timed_out: u64,
    /// Jobs whose nonce space ran out
    pub jobs_exhausted: u64,
    /// Number of solutions accepted by the API server
    pub shares_accepted: u64,
    /// Number of solutions rejected by the API server
    pub shares_rejected: u64,
    /// Submissions that ran out of retries
    pub submissions_failed: u64,
    /// Failed requests of any kind (job fetches and submissions)
    pub network_errors: u64,
}

impl MiningStats {
    /// Accepted share of all finished submissions, in percent
    pub fn success_rate(&self) -> f64 {
        let finished = self.shares_accepted + self.shares_rejected + self.submissions_failed;
        if finished == 0 {
            return 0.0;
        }
        self.shares_accepted as f64 / finished as f64 * 100.0
    }
}

/// Collects mining statistics
///
/// Cloning shares the same counters.
#[derive(Clone)]
pub struct StatsReporter {
    stats: Arc<MiningStatsAtomic>,
}

/// Atomic version of MiningStats for thread-safe operations
struct MiningStatsAtomic {
    hashes: Arc<AtomicU64>,
    solved: AtomicU64,
    timed_out: AtomicU64,
    exhausted: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
    network_errors: AtomicU64,
    best_hashrate_bits: AtomicU64,
    start_time: Instant,
}

impl Default for StatsReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsReporter {
    /// Creates a StatsReporter with all counters at zero
    pub fn new() -> Self {
        StatsReporter {
            stats: Arc::new(MiningStatsAtomic {
                hashes: Arc::new(AtomicU64::new(0)),
                solved: AtomicU64::new(0),
                timed_out: AtomicU64::new(0),
                exhausted: AtomicU64::new(0),
                accepted: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                network_errors: AtomicU64::new(0),
                best_hashrate_bits: AtomicU64::new(0f64.to_bits()),
                start_time: Instant::now(),
            }),
        }
    }

    /// Counter the workers add their hash counts to
    pub fn hash_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.stats.hashes)
    }

    /// Total hashes computed so far
    pub fn hashes(&self) -> u64 {
        self.stats.hashes.load(Ordering::Relaxed)
    }

    /// Records how a job ended
    pub fn record_job(&self, resolution: &JobResolution) {
        let counter = match resolution {
            JobResolution::Solved(_) => &self.stats.solved,
            JobResolution::TimedOut => &self.stats.timed_out,
            JobResolution::Exhausted => &self.stats.exhausted,
            JobResolution::Shutdown => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the final status of a submission
    pub fn record_submission(&self, status: &SubmissionStatus) {
        let counter = match status {
            SubmissionStatus::Accepted(_) => &self.stats.accepted,
            SubmissionStatus::Rejected(_) => &self.stats.rejected,
            SubmissionStatus::Failed(_) => &self.stats.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one failed network request
    pub fn record_network_error(&self) {
        self.stats.network_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a per-job hashrate, keeping the best one
    pub fn record_hashrate(&self, hashrate: f64) {
        let _ = self.stats.best_hashrate_bits.fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |bits| (hashrate > f64::from_bits(bits)).then(|| hashrate.to_bits()),
        );
    }

    /// Gets the current mining statistics
    ///
    /// # Returns
    /// A snapshot of the current mining statistics
    pub fn snapshot(&self) -> MiningStats {
        let elapsed = self.stats.start_time.elapsed();
        let hashes = self.hashes();
        let secs = elapsed.as_secs_f64();

        MiningStats {
            hashes_total: hashes,
            elapsed,
            avg_hashrate: if secs > 0.0 { hashes as f64 / secs } else { 0.0 },
            best_hashrate: f64::from_bits(self.stats.best_hashrate_bits.load(Ordering::Relaxed)),
            jobs_solved: self.stats.solved.load(Ordering::Relaxed),
            jobs_timed_out: self.stats.timed_out.load(Ordering::Relaxed),
            jobs_exhausted: self.stats.exhausted.load(Ordering::Relaxed),
            shares_accepted: self.stats.accepted.load(Ordering::Relaxed),
            shares_rejected: self.stats.rejected.load(Ordering::Relaxed),
            submissions_failed: self.stats.failed.load(Ordering::Relaxed),
            network_errors: self.stats.network_errors.load(Ordering::Relaxed),
        }
    }

    /// Logs a one-line summary of the current statistics
    pub fn log_summary(&self, state: &EngineState, governor: &ResourceGovernor) {
        let stats = self.snapshot();
        let hw = governor.latest();
        let job = state
            .current_job()
            .map(|j| j.job_id.clone())
            .unwrap_or_else(|| "-".to_string());

        log::info!(
            "Hashrate: {:.0} H/s (best {:.0}) | Hashes: {} | Jobs solved/timed out/exhausted: {}/{}/{} | \
             Accepted/Rejected/Failed: {}/{}/{} ({:.1}%) | Net errors: {} | Difficulty: {} | Job: {} | CPU: {:.1}% | Mem: {} MB",
            stats.avg_hashrate,
            stats.best_hashrate,
            stats.hashes_total,
            stats.jobs_solved,
            stats.jobs_timed_out,
            stats.jobs_exhausted,
            stats.shares_accepted,
            stats.shares_rejected,
            stats.submissions_failed,
            stats.success_rate(),
            stats.network_errors,
            state.difficulty(),
            job,
            hw.cpu_usage,
            hw.memory_used / (1024 * 1024),
        );
    }

    /// Starts the periodic reporting of statistics
    ///
    /// This spawns a background thread that logs stats at `interval`
    /// until the returned task is shut down.
    pub fn start_reporting(
        &self,
        state: Arc<EngineState>,
        governor: Arc<ResourceGovernor>,
        interval: Duration,
    ) -> BackgroundTask {
        let reporter = self.clone();
        BackgroundTask::spawn("stats-reporter", move |stop| {
            let ticker = tick(interval);
            loop {
                select! {
                    recv(ticker) -> _ => reporter.log_summary(&state, &governor),
                    recv(stop) -> _ => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::api::Receipt;

    #[test]
    fn hash_counter_is_shared_with_snapshot() {
        let reporter = StatsReporter::new();
        reporter.hash_counter().fetch_add(500, Ordering::Relaxed);
        reporter.clone().hash_counter().fetch_add(250, Ordering::Relaxed);
        assert_eq!(reporter.snapshot().hashes_total, 750);
    }

    #[test]
    fn job_and_submission_outcomes_are_counted() {
        let reporter = StatsReporter::new();
        reporter.record_job(&JobResolution::TimedOut);
        reporter.record_job(&JobResolution::Exhausted);
        reporter.record_job(&JobResolution::Shutdown);
        reporter.record_submission(&SubmissionStatus::Accepted(Receipt::default()));
        reporter.record_submission(&SubmissionStatus::Rejected("stale".into()));
        reporter.record_submission(&SubmissionStatus::Failed("timeout".into()));

        let stats = reporter.snapshot();
        assert_eq!(stats.jobs_timed_out, 1);
        assert_eq!(stats.jobs_exhausted, 1);
        assert_eq!(stats.jobs_solved, 0);
        assert_eq!(stats.shares_accepted, 1);
        assert_eq!(stats.shares_rejected, 1);
        assert_eq!(stats.submissions_failed, 1);
        assert!((stats.success_rate() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn best_hashrate_only_increases() {
        let reporter = StatsReporter::new();
        reporter.record_hashrate(1_000.0);
        reporter.record_hashrate(500.0);
        reporter.record_hashrate(2_000.0);
        assert_eq!(reporter.snapshot().best_hashrate, 2_000.0);
    }
}
