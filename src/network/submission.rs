// src/network/submission.rs
//! Solution submission pipeline
//!
//! Every attempt goes through the shared rate limiter and is bounded by
//! the request timeout. Transient failures are retried after a fixed
//! delay; acceptance and final rejections end the submission at once.

use crate::miner::job::Solution;
use crate::network::api::{ApiClient, Receipt, SubmitOutcome, SystemInfo};
use crate::network::rate_limiter::RateLimiter;
use crate::stats::{ResourceGovernor, StatsReporter};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Delivers one submission attempt to the remote coordinator
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Performs a single attempt and classifies the answer
    async fn submit(&self, solution: &Solution) -> SubmitOutcome;
}

/// Submits over HTTP, attaching hash rate and host telemetry
pub struct HttpSubmitter {
    api: Arc<ApiClient>,
    stats: StatsReporter,
    governor: Arc<ResourceGovernor>,
    threads: usize,
}

impl HttpSubmitter {
    /// Creates an HTTP submitter
    pub fn new(
        api: Arc<ApiClient>,
        stats: StatsReporter,
        governor: Arc<ResourceGovernor>,
        threads: usize,
    ) -> Self {
        HttpSubmitter {
            api,
            stats,
            governor,
            threads,
        }
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(&self, solution: &Solution) -> SubmitOutcome {
        let hw = self.governor.latest();
        let system_info = SystemInfo {
            threads: self.threads,
            cpu_usage: hw.cpu_usage,
            memory_usage: hw.memory_used / (1024 * 1024),
        };
        let hash_rate = self.stats.snapshot().avg_hashrate as u64;
        self.api.submit(solution, hash_rate, &system_info).await
    }
}

/// Bounded retries with a fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (always at least one)
    pub attempts: u32,
    /// Wait between consecutive attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy from the configured attempt count and delay
    pub fn new(attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            attempts: attempts.max(1),
            delay,
        }
    }
}

/// Final status of a submission
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionStatus {
    /// Accepted by the server
    Accepted(Receipt),
    /// Rejected for a reason retrying cannot fix
    Rejected(String),
    /// Every attempt failed transiently; carries the last reason
    Failed(String),
}

/// What happened to one solution
#[derive(Debug, Clone)]
pub struct SubmissionReport {
    /// The submitted solution
    pub solution: Solution,
    /// Terminal status
    pub status: SubmissionStatus,
    /// Attempts made
    pub attempts: u32,
    /// Attempts that ended in a transient failure
    pub transient_failures: u32,
}

impl SubmissionReport {
    /// Whether the server accepted the solution
    pub fn is_accepted(&self) -> bool {
        matches!(self.status, SubmissionStatus::Accepted(_))
    }
}

/// Packages, rate-limits and retries solution submissions
pub struct SubmissionPipeline {
    submitter: Arc<dyn Submitter>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    request_timeout: Duration,
}

impl SubmissionPipeline {
    /// Creates a pipeline
    ///
    /// # Arguments
    /// * `submitter` - Performs individual attempts
    /// * `limiter` - Process-wide rate limiter shared with job fetching
    /// * `policy` - Attempt budget and inter-attempt delay
    /// * `request_timeout` - Bound on each attempt
    pub fn new(
        submitter: Arc<dyn Submitter>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Self {
        SubmissionPipeline {
            submitter,
            limiter,
            policy,
            request_timeout,
        }
    }

    /// Delivers `solution`, retrying transient failures
    pub async fn deliver(&self, solution: Solution) -> SubmissionReport {
        let mut transient_failures = 0;
        let mut last_error = String::new();

        for attempt in 1..=self.policy.attempts {
            if attempt > 1 {
                log::warn!(
                    "Retry attempt {}/{} for job {} in {:?}",
                    attempt,
                    self.policy.attempts,
                    solution.job_id,
                    self.policy.delay
                );
                tokio::time::sleep(self.policy.delay).await;
            }

            self.limiter.acquire().await;
            log::info!(
                "Submitting nonce {} for job {} (attempt {}/{})",
                solution.nonce,
                solution.job_id,
                attempt,
                self.policy.attempts
            );

            let outcome =
                match tokio::time::timeout(self.request_timeout, self.submitter.submit(&solution)).await {
                    Ok(outcome) => outcome,
                    Err(_) => SubmitOutcome::Transient(format!(
                        "no response within {:?}",
                        self.request_timeout
                    )),
                };

            let status = match outcome {
                SubmitOutcome::Accepted(receipt) => {
                    log::info!(
                        "Block accepted for job {} (reward: {}, balance: {}, block #{})",
                        solution.job_id,
                        fmt_opt(receipt.final_reward),
                        fmt_opt(receipt.new_balance),
                        fmt_opt(receipt.block_number)
                    );
                    SubmissionStatus::Accepted(receipt)
                }
                SubmitOutcome::RejectedFinal(reason) => {
                    log::error!("Block for job {} rejected: {}", solution.job_id, reason);
                    SubmissionStatus::Rejected(reason)
                }
                SubmitOutcome::Transient(reason) => {
                    log::warn!(
                        "Submission attempt {}/{} for job {} failed: {}",
                        attempt,
                        self.policy.attempts,
                        solution.job_id,
                        reason
                    );
                    transient_failures += 1;
                    last_error = reason;
                    continue;
                }
            };

            return SubmissionReport {
                solution,
                status,
                attempts: attempt,
                transient_failures,
            };
        }

        log::error!(
            "Block submission for job {} failed after {} attempts",
            solution.job_id,
            self.policy.attempts
        );
        SubmissionReport {
            solution,
            status: SubmissionStatus::Failed(last_error),
            attempts: self.policy.attempts,
            transient_failures,
        }
    }
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Plays back scripted outcomes, repeating the last one
    struct Scripted {
        outcomes: Mutex<VecDeque<SubmitOutcome>>,
        calls: Mutex<Vec<Instant>>,
        hang: Option<Duration>,
    }

    impl Scripted {
        fn new(outcomes: Vec<SubmitOutcome>) -> Arc<Self> {
            Arc::new(Scripted {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
                hang: None,
            })
        }

        fn calls(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Submitter for Scripted {
        async fn submit(&self, _solution: &Solution) -> SubmitOutcome {
            self.calls.lock().unwrap().push(Instant::now());
            if let Some(hang) = self.hang {
                tokio::time::sleep(hang).await;
            }
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.len() > 1 {
                outcomes.pop_front().unwrap()
            } else {
                outcomes.front().cloned().unwrap()
            }
        }
    }

    fn solution() -> Solution {
        Solution {
            job_id: "job-1".into(),
            nonce: 42,
            digest: vec![0, 0, 1],
            difficulty: 4,
            worker_id: 0,
        }
    }

    fn pipeline(submitter: Arc<dyn Submitter>, attempts: u32, delay: Duration) -> SubmissionPipeline {
        SubmissionPipeline::new(
            submitter,
            Arc::new(RateLimiter::new(Duration::ZERO)),
            RetryPolicy::new(attempts, delay),
            Duration::from_millis(200),
        )
    }

    fn transient() -> SubmitOutcome {
        SubmitOutcome::Transient("connection reset".into())
    }

    #[tokio::test]
    async fn always_transient_uses_every_attempt_spaced_by_delay() {
        let delay = Duration::from_millis(40);
        let submitter = Scripted::new(vec![transient()]);
        let report = pipeline(submitter.clone(), 3, delay).deliver(solution()).await;

        assert_eq!(report.status, SubmissionStatus::Failed("connection reset".into()));
        assert_eq!(report.attempts, 3);
        assert_eq!(report.transient_failures, 3);

        let calls = submitter.calls();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= delay);
        }
    }

    #[tokio::test]
    async fn success_on_second_attempt_stops_retrying() {
        let submitter = Scripted::new(vec![
            transient(),
            SubmitOutcome::Accepted(Receipt::default()),
            transient(),
        ]);
        let report = pipeline(submitter.clone(), 5, Duration::from_millis(5))
            .deliver(solution())
            .await;

        assert!(report.is_accepted());
        assert_eq!(report.attempts, 2);
        assert_eq!(submitter.calls().len(), 2);
    }

    #[tokio::test]
    async fn final_rejection_is_not_retried() {
        let submitter = Scripted::new(vec![SubmitOutcome::RejectedFinal("stale job".into())]);
        let report = pipeline(submitter.clone(), 5, Duration::from_millis(5))
            .deliver(solution())
            .await;

        assert_eq!(report.status, SubmissionStatus::Rejected("stale job".into()));
        assert_eq!(submitter.calls().len(), 1);
    }

    #[tokio::test]
    async fn zero_retry_budget_still_attempts_once() {
        let submitter = Scripted::new(vec![transient()]);
        let report = pipeline(submitter.clone(), 0, Duration::from_millis(5))
            .deliver(solution())
            .await;

        assert_eq!(report.attempts, 1);
        assert_eq!(submitter.calls().len(), 1);
    }

    #[tokio::test]
    async fn hung_request_times_out_as_transient() {
        let submitter = Arc::new(Scripted {
            outcomes: Mutex::new(vec![SubmitOutcome::Accepted(Receipt::default())].into()),
            calls: Mutex::new(Vec::new()),
            hang: Some(Duration::from_secs(5)),
        });
        let report = pipeline(submitter.clone(), 2, Duration::from_millis(5))
            .deliver(solution())
            .await;

        assert!(matches!(report.status, SubmissionStatus::Failed(ref r) if r.starts_with("no response")));
        assert_eq!(submitter.calls().len(), 2);
    }

    #[tokio::test]
    async fn attempts_pass_through_rate_limiter() {
        let interval = Duration::from_millis(50);
        let submitter = Scripted::new(vec![transient()]);
        let pipeline = SubmissionPipeline::new(
            submitter.clone(),
            Arc::new(RateLimiter::new(interval)),
            RetryPolicy::new(3, Duration::ZERO),
            Duration::from_millis(200),
        );

        pipeline.deliver(solution()).await;

        let calls = submitter.calls();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] + Duration::from_millis(5) >= interval);
        }
    }
}
