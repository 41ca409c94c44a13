// src/miner/scheduler.rs
//! Mining coordinator
//!
//! Owns the job lifecycle: fetches a job, partitions its nonce space
//! across the workers, waits for a solution, exhaustion or the mining
//! timeout, hands solutions to the submission pipeline and rotates to the
//! next job. Hashing runs on a dedicated rayon pool; the coordinator
//! itself is an async task on the tokio runtime.

use crate::miner::algorithm::Algorithm;
use crate::miner::job::{Job, NonceRange, Solution};
use crate::miner::worker::{Worker, WorkerOutcome, WorkerReport};
use crate::network::job_source::JobSource;
use crate::network::submission::{SubmissionPipeline, SubmissionReport, SubmissionStatus};
use crate::stats::governor::Throttle;
use crate::stats::reporter::{MiningStats, StatsReporter};
use crate::utils::error::MinerError;
use arc_swap::{ArcSwap, ArcSwapOption};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// A job solved faster than this fraction of the mining timeout raises
/// the difficulty under auto-adjustment
pub const FAST_SOLVE_FRACTION: f64 = 0.25;

/// Splits `space` into contiguous, disjoint ranges of `range_size` nonces
///
/// At most `workers` ranges are produced; fewer when the space runs out.
/// The last range may be shorter than `range_size`. The union of the
/// returned ranges covers exactly `min(space.len(), workers * range_size)`
/// nonces starting at `space.start`.
pub fn partition(space: NonceRange, range_size: u64, workers: usize) -> Vec<NonceRange> {
    let range_size = range_size.max(1);
    let mut ranges = Vec::with_capacity(workers);
    let mut start = space.start;

    while ranges.len() < workers && start < space.end {
        let end = start.saturating_add(range_size).min(space.end);
        ranges.push(NonceRange::new(start, end));
        start = end;
    }
    ranges
}

/// How the coordinator finished one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResolution {
    /// A worker found a solution
    Solved(Solution),
    /// The mining timeout elapsed first
    TimedOut,
    /// Every worker exhausted its range
    Exhausted,
    /// Shutdown interrupted the search
    Shutdown,
}

impl JobResolution {
    fn label(&self) -> &'static str {
        match self {
            JobResolution::Solved(_) => "solved",
            JobResolution::TimedOut => "timed out",
            JobResolution::Exhausted => "exhausted",
            JobResolution::Shutdown => "interrupted",
        }
    }
}

/// Feedback rule for auto-difficulty
///
/// Raises the difficulty by one when a job was solved in less than
/// [`FAST_SOLVE_FRACTION`] of `mining_timeout`, lowers it by one (never
/// below zero) when a job timed out or ran out of nonces, and keeps it
/// otherwise.
pub fn next_difficulty(
    current: u32,
    resolution: &JobResolution,
    elapsed: Duration,
    mining_timeout: Duration,
) -> u32 {
    match resolution {
        JobResolution::Solved(_) if elapsed < mining_timeout.mul_f64(FAST_SOLVE_FRACTION) => {
            current.saturating_add(1)
        }
        JobResolution::TimedOut | JobResolution::Exhausted => current.saturating_sub(1),
        _ => current,
    }
}

/// Coordinator state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// No job yet, or cooling down
    Idle,
    /// Fetching and partitioning a job
    Dispatching,
    /// Workers are hashing
    Searching,
    /// Job resolved, about to fetch the next one
    Rotating,
    /// Shut down
    Stopped,
}

/// Process-wide engine state
///
/// Only the coordinator mutates it. Workers read the difficulty through
/// the shared atomic; the stats reporter reads the current job.
pub struct EngineState {
    current_job: ArcSwapOption<Job>,
    difficulty: Arc<AtomicU32>,
    phase: ArcSwap<EnginePhase>,
    stats: StatsReporter,
}

impl EngineState {
    /// Creates the state with the configured starting difficulty
    pub fn new(difficulty: u32, stats: StatsReporter) -> Self {
        EngineState {
            current_job: ArcSwapOption::empty(),
            difficulty: Arc::new(AtomicU32::new(difficulty)),
            phase: ArcSwap::from_pointee(EnginePhase::Idle),
            stats,
        }
    }

    /// The job currently being mined, if any
    pub fn current_job(&self) -> Option<Arc<Job>> {
        self.current_job.load_full()
    }

    /// Current engine difficulty
    pub fn difficulty(&self) -> u32 {
        self.difficulty.load(Ordering::Relaxed)
    }

    /// Current phase of the coordinator
    pub fn phase(&self) -> EnginePhase {
        **self.phase.load()
    }

    /// Shared statistics
    pub fn stats(&self) -> &StatsReporter {
        &self.stats
    }

    fn difficulty_handle(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.difficulty)
    }

    fn set_difficulty(&self, difficulty: u32) {
        self.difficulty.store(difficulty, Ordering::Relaxed);
    }

    fn set_phase(&self, phase: EnginePhase) {
        self.phase.store(Arc::new(phase));
    }

    fn publish_job(&self, job: Option<Arc<Job>>) {
        self.current_job.store(job);
    }
}

/// Engine tuning, with all durations already converted
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Number of hashing threads
    pub threads: usize,
    /// Nonces assigned to each worker per job
    pub nonce_range: u64,
    /// Hashes between cooperative checkpoints
    pub batch_size: u64,
    /// Per-job deadline, measured from job issuance
    pub mining_timeout: Duration,
    /// Whether to adjust the difficulty after each job
    pub auto_difficulty: bool,
    /// Wait before retrying a failed job fetch
    pub fetch_backoff: Duration,
    /// Final submission failures in a row before cooling down (0 disables)
    pub max_consecutive_failures: u32,
    /// Length of the cool-down
    pub failure_cooldown: Duration,
    /// How long in-flight submissions may finish after shutdown
    pub shutdown_grace: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            threads: 4,
            nonce_range: 2_000_000,
            batch_size: 50_000,
            mining_timeout: Duration::from_secs(120),
            auto_difficulty: false,
            fetch_backoff: Duration::from_secs(2),
            max_consecutive_failures: 5,
            failure_cooldown: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Coordinates mining jobs across worker threads
pub struct Scheduler {
    settings: EngineSettings,
    algorithm: Arc<dyn Algorithm>,
    job_source: Arc<dyn JobSource>,
    pipeline: Arc<SubmissionPipeline>,
    state: Arc<EngineState>,
    throttle: Throttle,
    shutdown: CancellationToken,
    pool: rayon::ThreadPool,
}

impl Scheduler {
    /// Creates a new Scheduler instance
    ///
    /// # Arguments
    /// * `settings` - Engine tuning
    /// * `algorithm` - Hash algorithm selected at startup
    /// * `job_source` - Where jobs come from
    /// * `pipeline` - Where solutions go
    /// * `state` - Shared engine state, also read by the stats reporter
    /// * `throttle` - Per-batch pause published by the resource governor
    /// * `shutdown` - Root cancellation token
    ///
    /// # Errors
    /// Returns `MinerError::TaskError` if the hashing pool cannot be built
    pub fn new(
        settings: EngineSettings,
        algorithm: Arc<dyn Algorithm>,
        job_source: Arc<dyn JobSource>,
        pipeline: Arc<SubmissionPipeline>,
        state: Arc<EngineState>,
        throttle: Throttle,
        shutdown: CancellationToken,
    ) -> Result<Self, MinerError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.threads.max(1))
            .thread_name(|i| format!("pow-worker-{}", i))
            .build()
            .map_err(|e| MinerError::TaskError(format!("Failed to build hashing pool: {}", e)))?;

        Ok(Scheduler {
            settings,
            algorithm,
            job_source,
            pipeline,
            state,
            throttle,
            shutdown,
            pool,
        })
    }

    /// Shared engine state
    pub fn state(&self) -> Arc<EngineState> {
        Arc::clone(&self.state)
    }

    /// Runs the mining loop until the shutdown token is cancelled
    ///
    /// # Returns
    /// Final statistics once in-flight submissions are settled or abandoned
    pub async fn run(&self) -> Result<MiningStats, MinerError> {
        let mut submissions: JoinSet<SubmissionReport> = JoinSet::new();
        let mut consecutive_failures = 0u32;
        let mut last_solved: Option<String> = None;

        log::info!(
            "Mining engine started: {} workers, {} nonces per worker, batch {}, difficulty {}, {}",
            self.settings.threads,
            self.settings.nonce_range,
            self.settings.batch_size,
            self.state.difficulty(),
            self.algorithm.algorithm_type()
        );

        while !self.shutdown.is_cancelled() {
            while let Some(result) = submissions.try_join_next() {
                self.settle(result, &mut consecutive_failures);
            }

            let limit = self.settings.max_consecutive_failures;
            if limit > 0 && consecutive_failures >= limit {
                log::warn!(
                    "{} submissions failed in a row, pausing for {:?}",
                    consecutive_failures,
                    self.settings.failure_cooldown
                );
                self.state.set_phase(EnginePhase::Idle);
                if !self.sleep_or_shutdown(self.settings.failure_cooldown).await {
                    break;
                }
                consecutive_failures = 0;
            }

            self.state.set_phase(EnginePhase::Dispatching);
            let Some(job) = self.next_job().await else {
                break;
            };

            if last_solved.as_deref() == Some(job.job_id.as_str()) {
                log::debug!("Job {} was already solved, waiting for a new one", job.job_id);
                if !self.sleep_or_shutdown(self.settings.fetch_backoff).await {
                    break;
                }
                continue;
            }

            let job = Arc::new(job);
            let resolution = self.mine(Arc::clone(&job)).await;
            let elapsed = job.age();

            if resolution == JobResolution::Shutdown {
                break;
            }

            self.state.set_phase(EnginePhase::Rotating);
            self.state.stats().record_job(&resolution);
            log::info!(
                "Job {} {} after {:.2}s",
                job.job_id,
                resolution.label(),
                elapsed.as_secs_f64()
            );

            if let JobResolution::Solved(solution) = &resolution {
                last_solved = Some(solution.job_id.clone());
                let pipeline = Arc::clone(&self.pipeline);
                let solution = solution.clone();
                submissions.spawn(async move { pipeline.deliver(solution).await });
            }

            self.adjust_difficulty(&resolution, elapsed);
        }

        self.state.set_phase(EnginePhase::Stopped);
        self.state.publish_job(None);
        self.drain_submissions(&mut submissions, &mut consecutive_failures)
            .await;

        log::info!("Mining engine stopped");
        Ok(self.state.stats().snapshot())
    }

    /// Searches one job to resolution
    ///
    /// Workers are always stopped and drained before this returns, so the
    /// next job is never dispatched while the previous one is still hashed.
    pub async fn mine(&self, job: Arc<Job>) -> JobResolution {
        let ranges = partition(job.nonce_space, self.settings.nonce_range, self.settings.threads);
        self.state.publish_job(Some(Arc::clone(&job)));

        log::info!(
            "New job {}: difficulty {}, {} worker(s) from nonce {}",
            job.job_id,
            job.difficulty.max(self.state.difficulty()),
            ranges.len(),
            job.nonce_space.start
        );
        if ranges.is_empty() {
            return JobResolution::Exhausted;
        }

        let stop = self.shutdown.child_token();
        let (tx, mut rx) = mpsc::unbounded_channel::<WorkerReport>();
        let hashes_before = self.state.stats().hashes();

        for (id, range) in ranges.into_iter().enumerate() {
            let worker = Worker::new(
                id,
                Arc::clone(&self.algorithm),
                self.settings.batch_size,
                self.state.stats().hash_counter(),
                self.state.difficulty_handle(),
                self.throttle.clone(),
            );
            let job = Arc::clone(&job);
            let stop = stop.clone();
            let tx = tx.clone();
            self.pool.spawn(move || {
                let _ = tx.send(worker.run(&job, range, &stop));
            });
        }
        drop(tx);

        self.state.set_phase(EnginePhase::Searching);
        let deadline = job_deadline(job.issued_at, self.settings.mining_timeout);
        if deadline.is_none() {
            log::warn!(
                "Mining timeout {:?} is out of range, job {} will not time out",
                self.settings.mining_timeout,
                job.job_id
            );
        }

        let resolution = loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break JobResolution::Shutdown,
                _ = expire(deadline) => break JobResolution::TimedOut,
                report = rx.recv() => match report {
                    Some(report) => {
                        if let Some(solution) = self.observe(&job, report) {
                            break JobResolution::Solved(solution);
                        }
                    }
                    None => break JobResolution::Exhausted,
                },
            }
        };

        stop.cancel();
        while let Some(report) = rx.recv().await {
            if let WorkerOutcome::Solved(late) = report.outcome {
                log::debug!(
                    "Discarding late solution from worker {} (nonce {})",
                    late.worker_id,
                    late.nonce
                );
            }
        }

        let hashed = self.state.stats().hashes().saturating_sub(hashes_before);
        let secs = job.age().as_secs_f64();
        if secs > 0.0 {
            self.state.stats().record_hashrate(hashed as f64 / secs);
        }

        resolution
    }

    /// Inspects one worker report; returns the solution if it wins
    fn observe(&self, job: &Job, report: WorkerReport) -> Option<Solution> {
        if report.job_id != job.job_id {
            log::debug!(
                "Ignoring report from worker {} for stale job {}",
                report.worker_id,
                report.job_id
            );
            return None;
        }

        match report.outcome {
            WorkerOutcome::Solved(solution) => {
                log::info!(
                    "Worker {} solved job {}: nonce {}, hash {}",
                    solution.worker_id,
                    solution.job_id,
                    solution.nonce,
                    solution.digest_hex()
                );
                Some(solution)
            }
            WorkerOutcome::Failed(reason) => {
                log::error!(
                    "Worker {} failed on range {}: {}; treating range as exhausted",
                    report.worker_id,
                    report.range,
                    reason
                );
                None
            }
            WorkerOutcome::Exhausted => {
                log::debug!("Worker {} exhausted range {}", report.worker_id, report.range);
                None
            }
            WorkerOutcome::Cancelled => None,
        }
    }

    /// Fetches the next job, backing off on errors; `None` on shutdown
    async fn next_job(&self) -> Option<Job> {
        loop {
            let result = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return None,
                result = self.job_source.fetch_job() => result,
            };

            match result {
                Ok(job) => return Some(job),
                Err(e) => {
                    self.state.stats().record_network_error();
                    let level = if e.is_transient() { log::Level::Warn } else { log::Level::Error };
                    log::log!(
                        level,
                        "Failed to fetch job: {}; retrying in {:?}",
                        e,
                        self.settings.fetch_backoff
                    );
                    if !self.sleep_or_shutdown(self.settings.fetch_backoff).await {
                        return None;
                    }
                }
            }
        }
    }

    fn adjust_difficulty(&self, resolution: &JobResolution, elapsed: Duration) {
        if !self.settings.auto_difficulty {
            return;
        }
        let current = self.state.difficulty();
        let next = next_difficulty(current, resolution, elapsed, self.settings.mining_timeout);
        if next != current {
            self.state.set_difficulty(next);
            log::info!("Difficulty adjusted: {} -> {}", current, next);
        }
    }

    /// Accounts for a finished submission task
    fn settle(&self, result: Result<SubmissionReport, JoinError>, consecutive_failures: &mut u32) {
        let stats = self.state.stats();
        match result {
            Ok(report) => {
                stats.record_submission(&report.status);
                for _ in 0..report.transient_failures {
                    stats.record_network_error();
                }
                match report.status {
                    SubmissionStatus::Accepted(_) => *consecutive_failures = 0,
                    _ => *consecutive_failures += 1,
                }
            }
            Err(e) => {
                log::error!("Submission task failed: {}", e);
                *consecutive_failures += 1;
            }
        }
    }

    /// Lets in-flight submissions finish within the grace period
    async fn drain_submissions(
        &self,
        submissions: &mut JoinSet<SubmissionReport>,
        consecutive_failures: &mut u32,
    ) {
        if submissions.is_empty() {
            return;
        }
        log::info!(
            "Waiting up to {:?} for {} in-flight submission(s)",
            self.settings.shutdown_grace,
            submissions.len()
        );

        let drained = tokio::time::timeout(self.settings.shutdown_grace, async {
            while let Some(result) = submissions.join_next().await {
                self.settle(result, consecutive_failures);
            }
        })
        .await;

        if drained.is_err() {
            log::warn!("Abandoning {} submission(s) after grace period", submissions.len());
            submissions.abort_all();
        }
    }

    /// Sleeps for `duration`; returns `false` if shutdown came first
    async fn sleep_or_shutdown(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

/// Instant at which a job issued at `issued_at` times out
///
/// `None` when the sum does not fit in an `Instant`; such a job never
/// times out.
fn job_deadline(issued_at: std::time::Instant, timeout: Duration) -> Option<tokio::time::Instant> {
    issued_at.checked_add(timeout).map(tokio::time::Instant::from_std)
}

async fn expire(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn covered(ranges: &[NonceRange]) -> u64 {
        ranges.iter().map(NonceRange::len).sum()
    }

    fn assert_contiguous(space: NonceRange, ranges: &[NonceRange]) {
        let mut next = space.start;
        for range in ranges {
            assert_eq!(range.start, next, "gap or overlap at {}", range);
            assert!(!range.is_empty());
            assert!(range.end <= space.end);
            next = range.end;
        }
    }

    #[test]
    fn partition_covers_min_of_space_and_capacity() {
        let cases = [
            (NonceRange::new(0, 1_000), 100, 4),
            (NonceRange::new(0, 250), 100, 4),
            (NonceRange::new(10, 11), 100, 4),
            (NonceRange::new(0, 400), 100, 4),
            (NonceRange::new(5, 5), 100, 4),
            (NonceRange::new(0, 1_000), 100, 0),
            (NonceRange::FULL, 2_000_000, 16),
            (NonceRange::new(u64::MAX - 150, u64::MAX), 100, 3),
        ];

        for (space, size, workers) in cases {
            let ranges = partition(space, size, workers);
            assert!(ranges.len() <= workers);
            assert_contiguous(space, &ranges);
            assert_eq!(
                covered(&ranges),
                space.len().min(size * workers as u64),
                "space {} size {} workers {}",
                space,
                size,
                workers
            );
        }
    }

    #[test]
    fn partition_stops_allocating_when_space_runs_out() {
        let ranges = partition(NonceRange::new(0, 250), 100, 4);
        assert_eq!(
            ranges,
            vec![
                NonceRange::new(0, 100),
                NonceRange::new(100, 200),
                NonceRange::new(200, 250),
            ]
        );
    }

    #[test]
    fn zero_range_size_is_treated_as_one() {
        let ranges = partition(NonceRange::new(0, 10), 0, 3);
        assert_eq!(covered(&ranges), 3);
    }

    fn solved() -> JobResolution {
        JobResolution::Solved(Solution {
            job_id: "j".into(),
            nonce: 1,
            digest: vec![0],
            difficulty: 1,
            worker_id: 0,
        })
    }

    #[test]
    fn fast_solves_raise_difficulty() {
        let timeout = Duration::from_secs(100);
        assert_eq!(next_difficulty(4, &solved(), Duration::from_secs(10), timeout), 5);
        assert_eq!(next_difficulty(4, &solved(), Duration::from_secs(25), timeout), 4);
        assert_eq!(next_difficulty(4, &solved(), Duration::from_secs(90), timeout), 4);
    }

    #[test]
    fn timeouts_lower_difficulty_down_to_zero() {
        let timeout = Duration::from_secs(1);
        assert_eq!(next_difficulty(2, &JobResolution::TimedOut, timeout, timeout), 1);
        assert_eq!(next_difficulty(1, &JobResolution::Exhausted, timeout, timeout), 0);
        assert_eq!(next_difficulty(0, &JobResolution::TimedOut, timeout, timeout), 0);
        assert_eq!(next_difficulty(3, &JobResolution::Shutdown, Duration::ZERO, timeout), 3);
    }

    #[test]
    fn engine_state_publishes_job_and_phase() {
        let state = EngineState::new(3, StatsReporter::new());
        assert!(state.current_job().is_none());
        assert_eq!(state.phase(), EnginePhase::Idle);

        state.publish_job(Some(Arc::new(Job::new("abc", "tpl", 1))));
        state.set_phase(EnginePhase::Searching);
        state.set_difficulty(7);

        assert_eq!(state.current_job().map(|j| j.job_id.clone()), Some("abc".to_string()));
        assert_eq!(state.phase(), EnginePhase::Searching);
        assert_eq!(state.difficulty(), 7);
        assert_eq!(state.difficulty_handle().load(Ordering::Relaxed), 7);
    }

    #[test]
    fn oversized_mining_timeout_has_no_deadline() {
        let now = std::time::Instant::now();
        assert!(job_deadline(now, Duration::MAX).is_none());
        assert!(job_deadline(now, Duration::from_secs(u64::MAX)).is_none());
        assert_eq!(
            job_deadline(now, Duration::from_secs(120)),
            Some(tokio::time::Instant::from_std(now + Duration::from_secs(120)))
        );
    }

    #[tokio::test]
    async fn missing_deadline_never_expires() {
        let expired = tokio::time::timeout(Duration::from_millis(20), expire(None)).await;
        assert!(expired.is_err());
    }
}
