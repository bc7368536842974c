//! Job workflow engine: submit, poll until terminal, download.
//!
//! Runs entirely on the pinned [`OperationContext`]. Business-level outcomes
//! (the job failed, the deadline passed) are returned as a
//! [`HarmonizationResult`]; only transport faults and broken responses become
//! errors.

use crate::context::OperationContext;
use crate::error::{JobError, Result};
use crate::logging::log_event;
use crate::storage;
use crate::transport::{DownloadOutcome, JobStatus, JobSubmission, SubmitOutcome, Transport};
use crate::types::{HarmonizationResult, JobState};
use std::path::PathBuf;
use tokio::time::Instant;

/// A job ready to be submitted: payload built and output path resolved
#[derive(Debug, Clone)]
pub struct PreparedJob {
    /// Gzip-compressed upload payload
    pub payload: Vec<u8>,
    /// Where the result goes on success
    pub output_path: PathBuf,
    /// Deduplication key sent with the submission
    pub idempotency_key: String,
}

/// A submitted job: server id plus client-side deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    /// Server-assigned job id
    pub id: String,
    /// Absolute time after which the client stops waiting
    pub deadline: Instant,
}

/// Drive one job from submission to a result
pub async fn run_job(
    ctx: &OperationContext,
    transport: &dyn Transport,
    job: PreparedJob,
) -> Result<HarmonizationResult> {
    let logger = ctx.logger();
    let PreparedJob {
        payload,
        output_path,
        idempotency_key,
    } = job;

    log_event!(
        logger,
        INFO,
        output = %output_path.display(),
        payload_bytes = payload.len(),
        "harmonization job starting"
    );

    let submission = JobSubmission {
        payload,
        idempotency_key,
    };
    let (handle, submit_mapping_id) = match transport.submit_job(ctx.settings(), submission).await? {
        SubmitOutcome::Accepted { job_id, mapping_id } => (
            JobHandle {
                id: job_id,
                deadline: ctx.deadline(),
            },
            mapping_id,
        ),
        SubmitOutcome::Rejected(error) => {
            let description = error.description();
            log_event!(
                logger,
                WARN,
                http_status = error.status,
                reason = %description,
                "harmonization submission rejected"
            );
            return Ok(finish(
                ctx,
                HarmonizationResult::failed(output_path, description, None),
            ));
        }
    };

    log_event!(logger, INFO, job_id = %handle.id, "harmonization job submitted");

    let status = poll_until_terminal(ctx, transport, &handle).await?;
    match status.state {
        JobState::TimedOut => {
            log_event!(
                logger,
                WARN,
                job_id = %handle.id,
                timeout_secs = ctx.settings().timeout.as_secs_f64(),
                "harmonization job timed out"
            );
            return Ok(finish(
                ctx,
                HarmonizationResult::timed_out(output_path, submit_mapping_id),
            ));
        }
        JobState::Failed => {
            let description = status
                .error
                .as_ref()
                .map(|e| e.description())
                .unwrap_or_else(|| "harmonization failed".to_string());
            log_event!(logger, WARN, job_id = %handle.id, reason = %description, "harmonization job failed");
            return Ok(finish(
                ctx,
                HarmonizationResult::failed(
                    output_path,
                    description,
                    status.mapping_id.or(submit_mapping_id),
                ),
            ));
        }
        JobState::Succeeded | JobState::Submitted | JobState::Running | JobState::Unknown => {}
    }

    let mapping_id = status.mapping_id.or(submit_mapping_id);

    let url = status.final_url.ok_or_else(|| JobError::MissingDownloadUrl {
        job_id: handle.id.clone(),
    })?;
    let result = download(ctx, transport, &handle, &url, output_path, mapping_id).await?;
    Ok(finish(ctx, result))
}

/// Poll until the server reports a terminal state or the deadline passes
///
/// Returns the terminal status, or a [`JobState::TimedOut`] status once the
/// deadline is reached. The deadline is checked before every request and also
/// bounds each request, so no status call is issued (or awaited) past it. A
/// terminal state returned by the server wins over a deadline reached in the
/// same cycle.
async fn poll_until_terminal(
    ctx: &OperationContext,
    transport: &dyn Transport,
    handle: &JobHandle,
) -> Result<JobStatus> {
    let logger = ctx.logger();
    let settings = ctx.settings();
    let timed_out = || JobStatus::with_state(JobState::TimedOut);
    let mut polls: u64 = 0;

    loop {
        if Instant::now() >= handle.deadline {
            return Ok(timed_out());
        }

        let status = match tokio::time::timeout_at(
            handle.deadline,
            transport.job_status(settings, &handle.id),
        )
        .await
        {
            Ok(status) => status?,
            Err(_) => return Ok(timed_out()),
        };
        polls += 1;

        if status.state.is_terminal() {
            log_event!(logger, DEBUG, job_id = %handle.id, polls, state = ?status.state, "job reached terminal state");
            return Ok(status);
        }
        if status.state == JobState::Unknown {
            log_event!(logger, WARN, job_id = %handle.id, "service reported an unrecognized job state; still waiting");
        } else {
            log_event!(logger, DEBUG, job_id = %handle.id, state = ?status.state, "job still in progress");
        }

        let remaining = handle.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(timed_out());
        }
        tokio::time::sleep(settings.poll_interval.min(remaining)).await;

        log_event!(
            logger,
            INFO,
            job_id = %handle.id,
            elapsed_secs = ctx.elapsed().as_secs(),
            polls,
            "harmonization job still running"
        );
    }
}

async fn download(
    ctx: &OperationContext,
    transport: &dyn Transport,
    handle: &JobHandle,
    url: &str,
    output_path: PathBuf,
    mapping_id: Option<String>,
) -> Result<HarmonizationResult> {
    let logger = ctx.logger();

    match transport.download_final(ctx.settings(), url).await? {
        DownloadOutcome::Rejected(error) => {
            let description = error.description();
            log_event!(
                logger,
                WARN,
                job_id = %handle.id,
                http_status = error.status,
                reason = %description,
                "harmonization download rejected"
            );
            Ok(HarmonizationResult::failed(output_path, description, mapping_id))
        }
        DownloadOutcome::Stream(stream) => {
            let Some(stored) = storage::stream_to_file(stream, &output_path).await? else {
                log_event!(logger, WARN, job_id = %handle.id, "harmonization returned an empty file");
                return Ok(HarmonizationResult::failed(
                    output_path,
                    "harmonization returned an empty file",
                    mapping_id,
                ));
            };
            if stored.path != output_path {
                log_event!(
                    logger,
                    WARN,
                    job_id = %handle.id,
                    requested = %output_path.display(),
                    output = %stored.path.display(),
                    "output path taken by another writer, using versioned name"
                );
            }
            log_event!(
                logger,
                INFO,
                job_id = %handle.id,
                bytes = stored.bytes,
                output = %stored.path.display(),
                "harmonized file downloaded"
            );
            Ok(HarmonizationResult::succeeded(stored.path, mapping_id))
        }
    }
}

fn finish(ctx: &OperationContext, result: HarmonizationResult) -> HarmonizationResult {
    log_event!(
        ctx.logger(),
        INFO,
        status = %result.status,
        duration_secs = ctx.elapsed().as_secs_f64(),
        "harmonization job finished"
    );
    result
}
