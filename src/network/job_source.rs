// src/network/job_source.rs
//! Where mining jobs come from
//!
//! The coordinator only knows the [`JobSource`] trait. The remote source
//! asks the API server for work; the local source synthesizes a fresh
//! template per job for servers that accept self-issued blocks.

use crate::miner::job::Job;
use crate::network::api::ApiClient;
use crate::network::rate_limiter::RateLimiter;
use crate::utils::error::MinerError;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix of locally generated block templates
pub const LOCAL_TEMPLATE_PREFIX: &str = "block";

/// Supplies the next job to mine
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Returns a fresh job, or an error the caller may retry after a backoff
    async fn fetch_job(&self) -> Result<Job, MinerError>;
}

/// Fetches jobs from the API server through the shared rate limiter
pub struct RemoteJobSource {
    api: Arc<ApiClient>,
    limiter: Arc<RateLimiter>,
}

impl RemoteJobSource {
    /// Creates a remote job source
    pub fn new(api: Arc<ApiClient>, limiter: Arc<RateLimiter>) -> Self {
        RemoteJobSource { api, limiter }
    }
}

#[async_trait]
impl JobSource for RemoteJobSource {
    async fn fetch_job(&self) -> Result<Job, MinerError> {
        self.limiter.acquire().await;
        self.api.fetch_job().await
    }
}

/// Generates block templates locally
///
/// Template format: `<prefix>_<unix seconds>_<random>_<user>_<session>`.
/// Local jobs carry difficulty 0, so the engine difficulty applies.
pub struct LocalJobSource {
    prefix: String,
    user_id: Option<u64>,
    session_id: u32,
    sequence: AtomicU64,
}

impl LocalJobSource {
    /// Creates a local source with a random session id
    pub fn new(prefix: impl Into<String>, user_id: Option<u64>) -> Self {
        LocalJobSource {
            prefix: prefix.into(),
            user_id,
            session_id: rand::rng().random_range(0..1_000_000),
            sequence: AtomicU64::new(0),
        }
    }

    /// Builds the next job synchronously
    pub fn next_job(&self) -> Job {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let entropy: u32 = rand::rng().random_range(1_000_000..10_000_000);
        let user = self
            .user_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "anon".to_string());

        let template = format!(
            "{}_{}_{}_{}_{}",
            self.prefix, timestamp, entropy, user, self.session_id
        );
        Job::new(format!("local-{}-{}", self.session_id, seq), template, 0)
    }
}

#[async_trait]
impl JobSource for LocalJobSource {
    async fn fetch_job(&self) -> Result<Job, MinerError> {
        Ok(self.next_job())
    }
}
