//! Transport boundary: the three remote operations the job engine needs
//!
//! [`HttpTransport`] is the production implementation. Tests substitute their
//! own [`Transport`] to script server behavior without a network.

mod http;

pub use http::HttpTransport;

use crate::config::Settings;
use crate::error::Result;
use crate::types::JobState;
use bytes::Bytes;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;

/// Stream of downloaded bytes; an `Err` item aborts the download
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A job submission request
#[derive(Debug, Clone)]
pub struct JobSubmission {
    /// Gzip-compressed JSON envelope
    pub payload: Vec<u8>,
    /// Key letting the server deduplicate a repeated submission
    pub idempotency_key: String,
}

/// Error response captured for message extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    /// HTTP status of the response carrying the error
    pub status: u16,
    /// Raw response body
    pub body: Bytes,
}

impl ErrorBody {
    /// Capture an error response
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Human-readable description of the failure
    ///
    /// Uses the first non-empty string among the JSON fields `message`,
    /// `detail` and `error`. Falls back to `harmonization failed (HTTP <status>)`
    /// when the body is not a JSON object or has none of those fields.
    pub fn description(&self) -> String {
        serde_json::from_slice::<Value>(&self.body)
            .ok()
            .and_then(|value| {
                ["message", "detail", "error"].iter().find_map(|field| {
                    value
                        .get(field)
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                })
            })
            .unwrap_or_else(|| format!("harmonization failed (HTTP {})", self.status))
    }
}

/// Result of a submit call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The server created a job
    Accepted {
        /// Server-assigned job id
        job_id: String,
        /// Mapping identifier echoed by the server
        mapping_id: Option<String>,
    },
    /// The server refused the submission (non-2xx)
    Rejected(ErrorBody),
}

/// Result of a status call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    /// Reported state
    pub state: JobState,
    /// Signed download location, present once the job succeeded
    pub final_url: Option<String>,
    /// Error response, present when the job failed
    pub error: Option<ErrorBody>,
    /// Mapping identifier echoed by the server
    pub mapping_id: Option<String>,
}

impl JobStatus {
    /// A status with only a state
    pub fn with_state(state: JobState) -> Self {
        Self {
            state,
            final_url: None,
            error: None,
            mapping_id: None,
        }
    }

    /// A succeeded status pointing at `url`
    pub fn succeeded(url: impl Into<String>) -> Self {
        Self {
            final_url: Some(url.into()),
            ..Self::with_state(JobState::Succeeded)
        }
    }

    /// A failed status carrying `error`
    pub fn failed(error: ErrorBody) -> Self {
        Self {
            error: Some(error),
            ..Self::with_state(JobState::Failed)
        }
    }
}

/// Result of a download call
pub enum DownloadOutcome {
    /// 2xx response; the body streams from here
    Stream(ByteStream),
    /// Non-2xx response
    Rejected(ErrorBody),
}

impl std::fmt::Debug for DownloadOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadOutcome::Stream(_) => f.write_str("Stream(..)"),
            DownloadOutcome::Rejected(body) => f.debug_tuple("Rejected").field(body).finish(),
        }
    }
}

/// The remote operations of a harmonization job
///
/// Implementations must be safe to share between concurrent jobs. Every call
/// receives the caller's pinned [`Settings`], so credentials and timeouts are
/// taken from the operation context rather than from shared state.
/// Network-level faults are reported as
/// [`Error::Unavailable`](crate::error::Error::Unavailable).
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Submit a job and obtain its id
    async fn submit_job(&self, settings: &Settings, submission: JobSubmission)
    -> Result<SubmitOutcome>;

    /// Query the state of `job_id`
    async fn job_status(&self, settings: &Settings, job_id: &str) -> Result<JobStatus>;

    /// Open the finished artifact at the signed location `url`
    async fn download_final(&self, settings: &Settings, url: &str) -> Result<DownloadOutcome>;
}
