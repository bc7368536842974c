//! HTTP transport backed by a shared `reqwest` connection pool.

use super::{ByteStream, DownloadOutcome, ErrorBody, JobStatus, JobSubmission, SubmitOutcome, Transport};
use crate::config::Settings;
use crate::context::FAR_FUTURE;
use crate::error::{Error, JobError, Result};
use crate::types::{JobState, Stage};
use futures::TryStreamExt;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct SubmitBody {
    #[serde(rename = "jobId", alias = "job_id", alias = "id")]
    job_id: Option<String>,
    #[serde(rename = "mappingId", alias = "mapping_id")]
    mapping_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(alias = "state")]
    status: String,
    #[serde(rename = "finalUrl", alias = "final_url", alias = "downloadUrl")]
    final_url: Option<String>,
    #[serde(rename = "mappingId", alias = "mapping_id")]
    mapping_id: Option<String>,
}

/// Per-request timeout, capped so the timer never overflows the clock
fn request_timeout(settings: &Settings) -> Duration {
    settings.timeout.min(FAR_FUTURE)
}

/// Production [`Transport`] speaking the service's REST API
///
/// The inner `reqwest::Client` is a connection pool that is safe to share
/// between concurrent jobs; cloning the transport shares the pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with its own connection pool
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("netrias-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to build HTTP client: {e}"),
                key: None,
            })?;
        Ok(Self { client })
    }

    /// Wrap an existing `reqwest::Client`
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn submit_job(
        &self,
        settings: &Settings,
        submission: JobSubmission,
    ) -> Result<SubmitOutcome> {
        let response = self
            .client
            .post(settings.submit_url())
            .bearer_auth(&settings.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::CONTENT_ENCODING, "gzip")
            .header("Idempotency-Key", &submission.idempotency_key)
            .timeout(request_timeout(settings))
            .body(submission.payload)
            .send()
            .await
            .map_err(|e| Error::unavailable(Stage::Submit, &e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::unavailable(Stage::Submit, &e))?;

        if !status.is_success() {
            return Ok(SubmitOutcome::Rejected(ErrorBody::new(status.as_u16(), body)));
        }

        let parsed: SubmitBody = serde_json::from_slice(&body).map_err(|e| {
            JobError::MalformedResponse {
                stage: Stage::Submit,
                message: e.to_string(),
            }
        })?;
        let job_id = parsed
            .job_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(JobError::MissingJobId)?;

        Ok(SubmitOutcome::Accepted {
            job_id,
            mapping_id: parsed.mapping_id,
        })
    }

    async fn job_status(&self, settings: &Settings, job_id: &str) -> Result<JobStatus> {
        let response = self
            .client
            .get(settings.status_url(job_id))
            .bearer_auth(&settings.api_key)
            .timeout(request_timeout(settings))
            .send()
            .await
            .map_err(|e| Error::unavailable(Stage::Poll, &e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::unavailable(Stage::Poll, &e))?;

        if !status.is_success() {
            return Ok(JobStatus::failed(ErrorBody::new(status.as_u16(), body)));
        }

        let parsed: StatusBody =
            serde_json::from_slice(&body).map_err(|e| JobError::MalformedResponse {
                stage: Stage::Poll,
                message: e.to_string(),
            })?;
        let state = JobState::from_server(&parsed.status);
        let error = (state == JobState::Failed).then(|| ErrorBody::new(status.as_u16(), body));

        Ok(JobStatus {
            state,
            final_url: parsed.final_url,
            error,
            mapping_id: parsed.mapping_id,
        })
    }

    async fn download_final(&self, settings: &Settings, url: &str) -> Result<DownloadOutcome> {
        // Signed location: the URL itself carries the authorization
        let response = self
            .client
            .get(url)
            .timeout(request_timeout(settings))
            .send()
            .await
            .map_err(|e| Error::unavailable(Stage::Download, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|e| Error::unavailable(Stage::Download, &e))?;
            return Ok(DownloadOutcome::Rejected(ErrorBody::new(status.as_u16(), body)));
        }

        let stream: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map_err(|e| Error::unavailable(Stage::Download, &e)),
        );
        Ok(DownloadOutcome::Stream(stream))
    }
}
