// src/network/api.rs
//! HTTP client for the mining API server
//!
//! All calls are JSON POSTs (or a GET for the status probe) to a single
//! endpoint, `<base_url>/<api_path>`, distinguished by an `action` field.
//! Responses are classified here so the submission pipeline only ever
//! sees accepted / rejected-final / transient.

use crate::miner::job::{Job, NonceRange, Solution};
use crate::utils::error::MinerError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Version string reported to the server
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Rejection reasons that will never succeed on retry
const FINAL_REJECTIONS: &[&str] = &[
    "duplicate",
    "already submitted",
    "exists",
    "invalid hash",
    "expired",
    "stale",
    "secret",
    "unauthorized",
    "forbidden",
];

/// Response of the status probe
#[derive(Debug, Clone, Deserialize)]
pub struct ApiStatus {
    /// `"online"` when the server is accepting work
    pub status: String,
    /// Server name, if reported
    #[serde(default)]
    pub server: Option<String>,
    /// API version, if reported
    #[serde(default)]
    pub version: Option<String>,
    /// Server load percentage, if reported
    #[serde(default)]
    pub server_load: Option<f64>,
}

/// Details returned with an accepted block
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Receipt {
    /// Reward credited for the block
    #[serde(default)]
    pub final_reward: Option<f64>,
    /// Balance after the reward
    #[serde(default)]
    pub new_balance: Option<f64>,
    /// Height assigned to the block
    #[serde(default)]
    pub block_number: Option<u64>,
    /// Miner tier reported by the server
    #[serde(default)]
    pub power_level: Option<String>,
}

/// Host information sent along with each submission
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemInfo {
    /// Worker threads in use
    pub threads: usize,
    /// Last sampled CPU usage in percent
    pub cpu_usage: f32,
    /// Process memory in megabytes
    pub memory_usage: u64,
}

/// Classified result of a single submission request
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The server accepted the block
    Accepted(Receipt),
    /// The server refused the block for a reason retrying cannot fix
    RejectedFinal(String),
    /// Network trouble or a server-side failure worth retrying
    Transient(String),
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    action: &'static str,
    job_id: &'a str,
    user_id: Option<u64>,
    block_hash: String,
    nonce: u64,
    difficulty: u32,
    hash_rate: u64,
    api_secret: &'a str,
    client_version: &'static str,
    system_info: &'a SystemInfo,
}

#[derive(Debug, Serialize)]
struct JobRequest<'a> {
    action: &'static str,
    user_id: Option<u64>,
    api_secret: &'a str,
    client_version: &'static str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    receipt: Receipt,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    job_id: Option<String>,
    block_data: Option<String>,
    #[serde(default)]
    difficulty: Option<u32>,
    #[serde(default)]
    nonce_start: Option<u64>,
    #[serde(default)]
    nonce_end: Option<u64>,
}

/// Client for the API server
pub struct ApiClient {
    client: Client,
    endpoint: Url,
    api_secret: String,
    user_id: Option<u64>,
}

impl ApiClient {
    /// Creates a client for `<base_url>/<api_path>`
    ///
    /// # Arguments
    /// * `base_url` - Server root, e.g. `http://127.0.0.1:8000`
    /// * `api_path` - Endpoint path below the root, e.g. `api`
    /// * `api_secret` - Shared secret sent with every request
    /// * `user_id` - Miner account, if the server tracks one
    /// * `timeout` - Bound on each request
    pub fn new(
        base_url: &str,
        api_path: &str,
        api_secret: impl Into<String>,
        user_id: Option<u64>,
        timeout: Duration,
    ) -> Result<Self, MinerError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("pow-miner-rs/{}", CLIENT_VERSION))
            .build()?;

        Ok(ApiClient {
            client,
            endpoint: endpoint_url(base_url, api_path)?,
            api_secret: api_secret.into(),
            user_id,
        })
    }

    /// Full URL of the API endpoint
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Checks that the server is online
    ///
    /// # Errors
    /// Returns `MinerError` if the request fails or the server does not
    /// report itself as online.
    pub async fn status(&self) -> Result<ApiStatus, MinerError> {
        let response = self.client.get(self.endpoint.clone()).send().await?;
        let code = response.status();
        if !code.is_success() {
            return Err(MinerError::ProtocolError(format!(
                "API endpoint returned status {}",
                code
            )));
        }

        let status: ApiStatus = serde_json::from_str(&response.text().await?)?;
        if status.status != "online" {
            return Err(MinerError::ProtocolError(format!(
                "API reports status '{}'",
                status.status
            )));
        }
        Ok(status)
    }

    /// Requests a new mining job
    ///
    /// # Errors
    /// Returns `MinerError` if the request fails, the server refuses, or
    /// required fields are missing from the response.
    pub async fn fetch_job(&self) -> Result<Job, MinerError> {
        let request = JobRequest {
            action: "get_job",
            user_id: self.user_id,
            api_secret: &self.api_secret,
            client_version: CLIENT_VERSION,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;
        let code = response.status();
        if !code.is_success() {
            let err = format!("job request failed with status {}", code);
            return Err(if code.is_server_error() || code == StatusCode::TOO_MANY_REQUESTS {
                MinerError::ConnectionError(err)
            } else {
                MinerError::ProtocolError(err)
            });
        }

        let body: JobResponse = serde_json::from_str(&response.text().await?)?;
        job_from_response(body)
    }

    /// Submits a solution and classifies the answer
    ///
    /// Never fails: transport errors are folded into
    /// [`SubmitOutcome::Transient`].
    pub async fn submit(
        &self,
        solution: &Solution,
        hash_rate: u64,
        system_info: &SystemInfo,
    ) -> SubmitOutcome {
        let request = SubmitRequest {
            action: "submit_block",
            job_id: &solution.job_id,
            user_id: self.user_id,
            block_hash: solution.digest_hex(),
            nonce: solution.nonce,
            difficulty: solution.difficulty,
            hash_rate,
            api_secret: &self.api_secret,
            client_version: CLIENT_VERSION,
            system_info,
        };

        let response = match self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return SubmitOutcome::Transient("request timeout".into()),
            Err(e) => return SubmitOutcome::Transient(format!("connection error: {}", e)),
        };

        let status = response.status();
        match response.text().await {
            Ok(body) => classify_submit_response(status, &body),
            Err(e) => SubmitOutcome::Transient(format!("failed to read response: {}", e)),
        }
    }
}

/// Joins the endpoint path onto the base URL
pub fn endpoint_url(base_url: &str, api_path: &str) -> Result<Url, MinerError> {
    let mut base = base_url.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    let base = Url::parse(&base)?;
    Ok(base.join(api_path.trim_start_matches('/'))?)
}

/// Maps an HTTP status and body to a submission outcome
pub fn classify_submit_response(status: StatusCode, body: &str) -> SubmitOutcome {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SubmitOutcome::RejectedFinal(format!("authentication failed ({})", status))
        }
        StatusCode::CONFLICT => SubmitOutcome::RejectedFinal("duplicate block".into()),
        StatusCode::TOO_MANY_REQUESTS => SubmitOutcome::Transient("rate limited by server".into()),
        s if s.is_success() => match serde_json::from_str::<SubmitResponse>(body) {
            Ok(r) if r.success => SubmitOutcome::Accepted(r.receipt),
            Ok(r) => {
                let reason = r.error.unwrap_or_else(|| "unknown error".to_string());
                if is_final_rejection(&reason) {
                    SubmitOutcome::RejectedFinal(reason)
                } else {
                    SubmitOutcome::Transient(reason)
                }
            }
            Err(e) => SubmitOutcome::Transient(format!("invalid JSON response: {}", e)),
        },
        s => SubmitOutcome::Transient(format!("server error: {}", s)),
    }
}

fn is_final_rejection(reason: &str) -> bool {
    let reason = reason.to_lowercase();
    FINAL_REJECTIONS.iter().any(|k| reason.contains(k))
}

fn job_from_response(body: JobResponse) -> Result<Job, MinerError> {
    if !body.success {
        return Err(MinerError::ProtocolError(
            body.error.unwrap_or_else(|| "job request refused".to_string()),
        ));
    }

    let job_id = body
        .job_id
        .ok_or_else(|| MinerError::ProtocolError("Missing job_id".to_string()))?;
    let template = body
        .block_data
        .ok_or_else(|| MinerError::ProtocolError("Missing block_data".to_string()))?;

    let mut job = Job::new(job_id, template.into_bytes(), body.difficulty.unwrap_or(0));
    if body.nonce_start.is_some() || body.nonce_end.is_some() {
        job = job.with_nonce_space(NonceRange::new(
            body.nonce_start.unwrap_or(NonceRange::FULL.start),
            body.nonce_end.unwrap_or(NonceRange::FULL.end),
        ));
    }
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn solution() -> Solution {
        Solution {
            job_id: "job-7".into(),
            nonce: 42,
            digest: vec![0x00, 0x0f, 0xab],
            difficulty: 3,
            worker_id: 0,
        }
    }

    fn client(server: &mockito::Server) -> ApiClient {
        ApiClient::new(&server.url(), "api", "s3cret", Some(9), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn endpoint_joins_without_dropping_base_path() {
        let url = endpoint_url("http://host:8000/phonesium", "api.php").unwrap();
        assert_eq!(url.as_str(), "http://host:8000/phonesium/api.php");
        let url = endpoint_url("http://host:8000/", "/api").unwrap();
        assert_eq!(url.as_str(), "http://host:8000/api");
        assert!(endpoint_url("not a url", "api").is_err());
    }

    #[test]
    fn success_body_is_accepted_with_receipt() {
        let body = r#"{"success":true,"final_reward":1.5,"new_balance":10.0,"block_number":77}"#;
        match classify_submit_response(StatusCode::OK, body) {
            SubmitOutcome::Accepted(receipt) => {
                assert_eq!(receipt.final_reward, Some(1.5));
                assert_eq!(receipt.block_number, Some(77));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn known_rejections_are_final() {
        for reason in ["Duplicate block", "Job expired", "Invalid API secret", "stale job"] {
            let body = json!({"success": false, "error": reason}).to_string();
            assert!(matches!(
                classify_submit_response(StatusCode::OK, &body),
                SubmitOutcome::RejectedFinal(_)
            ));
        }
        assert!(matches!(
            classify_submit_response(StatusCode::CONFLICT, ""),
            SubmitOutcome::RejectedFinal(_)
        ));
        assert!(matches!(
            classify_submit_response(StatusCode::UNAUTHORIZED, ""),
            SubmitOutcome::RejectedFinal(_)
        ));
    }

    #[test]
    fn server_trouble_is_transient() {
        let body = json!({"success": false, "error": "database busy"}).to_string();
        assert!(matches!(
            classify_submit_response(StatusCode::OK, &body),
            SubmitOutcome::Transient(_)
        ));
        assert!(matches!(
            classify_submit_response(StatusCode::SERVICE_UNAVAILABLE, ""),
            SubmitOutcome::Transient(_)
        ));
        assert!(matches!(
            classify_submit_response(StatusCode::TOO_MANY_REQUESTS, ""),
            SubmitOutcome::Transient(_)
        ));
        assert!(matches!(
            classify_submit_response(StatusCode::OK, "<html>oops</html>"),
            SubmitOutcome::Transient(_)
        ));
    }

    #[tokio::test]
    async fn submit_posts_solution_with_secret() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api")
            .match_body(Matcher::PartialJson(json!({
                "action": "submit_block",
                "job_id": "job-7",
                "nonce": 42,
                "block_hash": "000fab",
                "api_secret": "s3cret",
                "user_id": 9
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":true,"new_balance":3.0}"#)
            .create_async()
            .await;

        let outcome = client(&server)
            .submit(&solution(), 1_000, &SystemInfo::default())
            .await;

        mock.assert_async().await;
        assert!(matches!(outcome, SubmitOutcome::Accepted(r) if r.new_balance == Some(3.0)));
    }

    #[tokio::test]
    async fn fetch_job_maps_response_fields() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api")
            .match_body(Matcher::PartialJson(json!({"action": "get_job"})))
            .with_status(200)
            .with_body(
                r#"{"success":true,"job_id":"j1","block_data":"blk_1","difficulty":4,"nonce_start":10,"nonce_end":20}"#,
            )
            .create_async()
            .await;

        let job = client(&server).fetch_job().await.unwrap();

        assert_eq!(job.job_id, "j1");
        assert_eq!(job.template, b"blk_1".to_vec());
        assert_eq!(job.difficulty, 4);
        assert_eq!(job.nonce_space, NonceRange::new(10, 20));
    }

    #[tokio::test]
    async fn fetch_job_without_job_id_is_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api")
            .with_status(200)
            .with_body(r#"{"success":true,"block_data":"x"}"#)
            .create_async()
            .await;

        let err = client(&server).fetch_job().await.unwrap_err();
        assert!(matches!(err, MinerError::ProtocolError(_)));
    }

    #[tokio::test]
    async fn status_requires_online() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api")
            .with_status(200)
            .with_body(r#"{"status":"online","server":"test","version":"2.0"}"#)
            .create_async()
            .await;

        let status = client(&server).status().await.unwrap();
        assert_eq!(status.server.as_deref(), Some("test"));
    }
}
