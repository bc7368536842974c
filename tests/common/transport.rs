//! Scripted in-memory transport

use super::fixtures::HARMONIZED_CHUNKS;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use netrias_client::transport::{
    DownloadOutcome, ErrorBody, JobStatus, JobSubmission, SubmitOutcome, Transport,
};
use netrias_client::{Error, Result, Settings, Stage};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Default signed download location
pub const FINAL_URL: &str = "https://files.example.test/final.csv";

/// Which transport operation was called
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    Submit,
    Status(String),
    Download(String),
}

/// One recorded transport call with the settings it carried
#[derive(Debug, Clone)]
pub struct Call {
    pub kind: CallKind,
    pub api_key: String,
    pub timeout: Duration,
    pub at: Instant,
}

/// How a download responds
#[derive(Debug, Clone)]
pub enum DownloadScript {
    /// Stream these chunks, then end
    Chunks(Vec<&'static [u8]>),
    /// Stream these chunks, then fail with a connection reset
    FailAfter(Vec<&'static [u8]>),
    /// Stream these chunks, then never finish
    Pending(Vec<&'static [u8]>),
    /// Non-2xx response
    Rejected(ErrorBody),
}

/// Holds status calls made with one API key until released
struct Gate {
    api_key: String,
    entered: Notify,
    release: Notify,
    released: AtomicBool,
}

/// A [`Transport`] replaying scripted responses and recording every call
pub struct ScriptedTransport {
    submits: Mutex<VecDeque<SubmitOutcome>>,
    statuses: Mutex<VecDeque<JobStatus>>,
    fallback_status: Mutex<JobStatus>,
    downloads: Mutex<VecDeque<DownloadScript>>,
    calls: Mutex<Vec<Call>>,
    gate: Mutex<Option<std::sync::Arc<Gate>>>,
    status_answer_at: Mutex<Option<Instant>>,
    jobs: AtomicUsize,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self {
            submits: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
            fallback_status: Mutex::new(JobStatus::succeeded(FINAL_URL)),
            downloads: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
            status_answer_at: Mutex::new(None),
            jobs: AtomicUsize::new(0),
        }
    }
}

impl ScriptedTransport {
    /// Transport where every job succeeds on its first poll
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Queue the response of the next submission
    pub fn push_submit(&self, outcome: SubmitOutcome) -> &Self {
        self.submits.lock().unwrap().push_back(outcome);
        self
    }

    /// Queue the response of the next status call
    pub fn push_status(&self, status: JobStatus) -> &Self {
        self.statuses.lock().unwrap().push_back(status);
        self
    }

    /// Response of every status call once the queue is empty
    pub fn set_fallback_status(&self, status: JobStatus) -> &Self {
        *self.fallback_status.lock().unwrap() = status;
        self
    }

    /// Queue the behavior of the next download
    pub fn push_download(&self, script: DownloadScript) -> &Self {
        self.downloads.lock().unwrap().push_back(script);
        self
    }

    /// Delay every status answer until `at`
    pub fn answer_status_at(&self, at: Instant) -> &Self {
        *self.status_answer_at.lock().unwrap() = Some(at);
        self
    }

    /// Hold status calls carrying `api_key` until [`release`](Self::release)
    pub fn hold_status_for(&self, api_key: &str) {
        *self.gate.lock().unwrap() = Some(std::sync::Arc::new(Gate {
            api_key: api_key.to_string(),
            entered: Notify::new(),
            release: Notify::new(),
            released: AtomicBool::new(false),
        }));
    }

    /// Wait until a held status call has arrived
    pub async fn wait_until_held(&self) {
        let gate = self.gate.lock().unwrap().clone().expect("gate installed");
        gate.entered.notified().await;
    }

    /// Let held status calls proceed
    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            gate.released.store(true, Ordering::SeqCst);
            gate.release.notify_one();
        }
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls made with `api_key`
    pub fn calls_with_key(&self, api_key: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.api_key == api_key)
            .collect()
    }

    /// Instants of every status call
    pub fn status_times(&self) -> Vec<Instant> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c.kind, CallKind::Status(_)))
            .map(|c| c.at)
            .collect()
    }

    fn record(&self, kind: CallKind, settings: &Settings) {
        self.calls.lock().unwrap().push(Call {
            kind,
            api_key: settings.api_key.clone(),
            timeout: settings.timeout,
            at: Instant::now(),
        });
    }
}

fn chunks(list: Vec<&'static [u8]>) -> impl futures::Stream<Item = Result<Bytes>> + Send {
    futures::stream::iter(list.into_iter().map(|c| Ok(Bytes::from_static(c))))
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn submit_job(
        &self,
        settings: &Settings,
        submission: JobSubmission,
    ) -> Result<SubmitOutcome> {
        assert!(!submission.payload.is_empty(), "payload must not be empty");
        assert_eq!(submission.idempotency_key.len(), 32);
        self.record(CallKind::Submit, settings);

        if let Some(outcome) = self.submits.lock().unwrap().pop_front() {
            return Ok(outcome);
        }
        let n = self.jobs.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SubmitOutcome::Accepted {
            job_id: format!("job-{n}"),
            mapping_id: Some(format!("mapping-{n}")),
        })
    }

    async fn job_status(&self, settings: &Settings, job_id: &str) -> Result<JobStatus> {
        self.record(CallKind::Status(job_id.to_string()), settings);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate
            && gate.api_key == settings.api_key
            && !gate.released.load(Ordering::SeqCst)
        {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let answer_at = *self.status_answer_at.lock().unwrap();
        if let Some(at) = answer_at {
            tokio::time::sleep_until(at).await;
        }

        let next = self.statuses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback_status.lock().unwrap().clone()))
    }

    async fn download_final(&self, settings: &Settings, url: &str) -> Result<DownloadOutcome> {
        self.record(CallKind::Download(url.to_string()), settings);

        let script = self
            .downloads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| DownloadScript::Chunks(HARMONIZED_CHUNKS.to_vec()));

        let outcome = match script {
            DownloadScript::Chunks(list) => DownloadOutcome::Stream(Box::pin(chunks(list))),
            DownloadScript::FailAfter(list) => {
                let failure = futures::stream::once(async {
                    Err(Error::Unavailable {
                        stage: Stage::Download,
                        message: "connection reset by peer".into(),
                    })
                });
                DownloadOutcome::Stream(Box::pin(chunks(list).chain(failure)))
            }
            DownloadScript::Pending(list) => {
                DownloadOutcome::Stream(Box::pin(chunks(list).chain(futures::stream::pending())))
            }
            DownloadScript::Rejected(body) => DownloadOutcome::Rejected(body),
        };
        Ok(outcome)
    }
}
