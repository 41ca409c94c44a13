// src/miner/worker.rs
//! Nonce search worker
//!
//! Scans one assigned nonce range for a job in fixed-size batches. The
//! stop token and the range bound are only checked between batches, so a
//! stop request is observed within one batch of hashing.

use crate::miner::algorithm::{Algorithm, meets_difficulty};
use crate::miner::job::{Candidate, Job, NonceRange, Solution};
use crate::stats::governor::Throttle;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

/// How a worker finished its assigned range
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// A nonce satisfying the difficulty was found
    Solved(Solution),
    /// Every nonce in the range was tried without success
    Exhausted,
    /// The stop token fired before the range was finished
    Cancelled,
    /// The hash loop panicked; the range counts as exhausted
    Failed(String),
}

/// Outcome of one worker, tagged with the job it was dispatched for
#[derive(Debug, Clone)]
pub struct WorkerReport {
    /// Index of the reporting worker
    pub worker_id: usize,
    /// Job the worker was dispatched with
    pub job_id: String,
    /// Range that was assigned
    pub range: NonceRange,
    /// Result of the scan
    pub outcome: WorkerOutcome,
}

/// Worker that performs the hash computations for one nonce range
///
/// Workers are cheap to build; the coordinator creates one per range on
/// every dispatch and moves it onto the hashing pool.
pub struct Worker {
    /// Index of this worker within the pool
    id: usize,
    /// The mining algorithm implementation to use
    algorithm: Arc<dyn Algorithm>,
    /// Number of hashes between cooperative checkpoints
    batch_size: u64,
    /// Shared counter of hashes computed by all workers
    hash_counter: Arc<AtomicU64>,
    /// Live engine difficulty, sampled once per batch
    difficulty: Arc<AtomicU32>,
    /// Pause inserted between batches by the resource governor
    throttle: Throttle,
}

impl Worker {
    /// Creates a new Worker instance
    pub fn new(
        id: usize,
        algorithm: Arc<dyn Algorithm>,
        batch_size: u64,
        hash_counter: Arc<AtomicU64>,
        difficulty: Arc<AtomicU32>,
        throttle: Throttle,
    ) -> Self {
        Worker {
            id,
            algorithm,
            batch_size: batch_size.max(1),
            hash_counter,
            difficulty,
            throttle,
        }
    }

    /// Scans `range` for a solution to `job`
    ///
    /// Returns at the first batch boundary after `stop` is cancelled, when
    /// the range is exhausted, or as soon as a solution is found.
    pub fn search(&self, job: &Job, range: NonceRange, stop: &CancellationToken) -> WorkerOutcome {
        let mut nonce = range.start;

        loop {
            if stop.is_cancelled() {
                return WorkerOutcome::Cancelled;
            }
            if nonce >= range.end {
                return WorkerOutcome::Exhausted;
            }

            // Difficulty is fixed for the duration of a batch.
            let difficulty = job.difficulty.max(self.difficulty.load(Ordering::Relaxed));
            let batch_end = nonce.saturating_add(self.batch_size).min(range.end);

            let mut computed = 0u64;
            let mut found = None;
            for trial in nonce..batch_end {
                let digest = self.algorithm.hash(&job.template, trial);
                computed += 1;
                if meets_difficulty(&digest, difficulty) {
                    found = Some(Candidate {
                        nonce: trial,
                        digest,
                    });
                    break;
                }
            }
            self.hash_counter.fetch_add(computed, Ordering::Relaxed);

            if let Some(candidate) = found {
                log::debug!(
                    "Worker {} found nonce {} for job {}",
                    self.id,
                    candidate.nonce,
                    job.job_id
                );
                return WorkerOutcome::Solved(Solution::from_candidate(
                    &job.job_id,
                    candidate,
                    difficulty,
                    self.id,
                ));
            }

            nonce = batch_end;
            self.throttle.pause();
        }
    }

    /// Runs [`Worker::search`] and packages the outcome as a report
    ///
    /// A panic inside the hash loop is caught and reported as
    /// [`WorkerOutcome::Failed`] so the rest of the pool keeps going.
    pub fn run(&self, job: &Job, range: NonceRange, stop: &CancellationToken) -> WorkerReport {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.search(job, range, stop)))
            .unwrap_or_else(|payload| WorkerOutcome::Failed(panic_message(payload.as_ref())));

        WorkerReport {
            worker_id: self.id,
            job_id: job.job_id.clone(),
            range,
            outcome,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
