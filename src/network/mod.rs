// src/network/mod.rs
//! Network communication components
//!
//! This module handles all interactions with the API server:
//! - `ApiClient`: HTTP requests for status, jobs and submissions
//! - `JobSource`: where the coordinator gets its next job
//! - `SubmissionPipeline`: rate-limited, retried solution delivery

/// HTTP API client
///
/// Builds request payloads and classifies server answers into
/// accepted, final rejection or transient failure.
pub mod api;

/// Job sources
///
/// Remote jobs come from the API server; local jobs are synthesized
/// on the fly.
pub mod job_source;

/// Minimum-interval limiter shared by every outbound API call
pub mod rate_limiter;

/// Solution submission with bounded retries
pub mod submission;

// Re-export main components for cleaner imports
pub use api::{ApiClient, Receipt, SubmitOutcome};
pub use job_source::{JobSource, LOCAL_TEMPLATE_PREFIX, LocalJobSource, RemoteJobSource};
pub use rate_limiter::RateLimiter;
pub use submission::{
    HttpSubmitter, RetryPolicy, SubmissionPipeline, SubmissionReport, SubmissionStatus, Submitter,
};
