//! Error types for netrias-client
//!
//! The taxonomy separates "I could not even talk to the service" from
//! "my job ran and failed":
//! - local errors (configuration, validation) are raised before any network access
//! - transport errors ([`Error::Unavailable`]) mean the service could not be reached
//! - job errors ([`JobError`]) mean the service answered with something the
//!   workflow cannot continue from
//!
//! A job that ran and failed, or did not finish in time, is not an error at all:
//! it is returned as a [`HarmonizationResult`](crate::types::HarmonizationResult).

use crate::types::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for netrias-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for netrias-client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "timeout")
        key: Option<String>,
    },

    /// Local input validation failed (source, manifest, output location, payload size)
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The service could not be reached at all
    #[error("harmonization service unavailable during {stage}: {message}")]
    Unavailable {
        /// Workflow stage that was in progress
        stage: Stage,
        /// Description of the network-level fault
        message: String,
    },

    /// Submission or polling infrastructure failure
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// The blocking entry point was called from a thread driving an async runtime
    #[error("blocking harmonize() called from within an async runtime; use harmonize_async() instead")]
    BlockingInAsyncContext,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Local validation errors, raised before any network access
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Source file does not exist
    #[error("source file not found: {}", path.display())]
    SourceNotFound {
        /// The missing path
        path: PathBuf,
    },

    /// A path that must be a regular file is something else
    #[error("{what} path is not a file: {}", path.display())]
    NotAFile {
        /// "source" or "manifest"
        what: &'static str,
        /// The offending path
        path: PathBuf,
    },

    /// Source file extension is not supported
    #[error("unsupported source file extension {extension:?} for {}; expected .csv or .tsv", path.display())]
    UnsupportedExtension {
        /// The offending path
        path: PathBuf,
        /// The extension found (empty if none)
        extension: String,
    },

    /// Source file is larger than the upload limit
    #[error("source file {} is {size} bytes, which exceeds the {limit} byte limit", path.display())]
    SourceTooLarge {
        /// The offending path
        path: PathBuf,
        /// Actual size in bytes
        size: u64,
        /// Maximum allowed size in bytes
        limit: u64,
    },

    /// Source file could not be parsed as a table
    #[error("source file {} could not be read as a table: {reason}", path.display())]
    UnreadableSource {
        /// The offending path
        path: PathBuf,
        /// Parser error
        reason: String,
    },

    /// Manifest is missing, has the wrong extension or is not a JSON object
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Compressed upload payload exceeds the service limit
    #[error("compressed harmonization payload is {size} bytes, which exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// Compressed size in bytes
        size: usize,
        /// Maximum allowed size in bytes
        limit: usize,
    },

    /// Output location cannot be used
    #[error("output location {} is not usable: {reason}", path.display())]
    OutputLocation {
        /// The offending path
        path: PathBuf,
        /// Why the location was rejected
        reason: String,
    },
}

/// Submission or polling infrastructure failures
///
/// These are distinct from a job that ran and failed, which is reported as a
/// result. A `JobError` means the workflow itself cannot proceed.
#[derive(Debug, Error)]
pub enum JobError {
    /// The service accepted the submission but returned no job id
    #[error("submission response did not include a job identifier")]
    MissingJobId,

    /// The job succeeded but no download location was provided
    #[error("job {job_id} succeeded but the service returned no download location")]
    MissingDownloadUrl {
        /// The server-assigned job id
        job_id: String,
    },

    /// A success response could not be interpreted
    #[error("malformed {stage} response: {message}")]
    MalformedResponse {
        /// Workflow stage that produced the response
        stage: Stage,
        /// Parser error or description of what was missing
        message: String,
    },
}

impl Error {
    /// Create a configuration error for a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Map a network-level `reqwest` failure to [`Error::Unavailable`]
    pub(crate) fn unavailable(stage: Stage, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "request timed out"
        } else if err.is_connect() {
            "connection failed"
        } else if err.is_body() || err.is_decode() {
            "response body interrupted"
        } else {
            "request failed"
        };
        Error::Unavailable {
            stage,
            message: format!("{kind}: {err}"),
        }
    }

    /// Whether this error means the service could not be reached
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::Unavailable { .. })
    }

    /// Whether this error was raised locally, before any network access
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Error::Config { .. } | Error::Validation(_) | Error::BlockingInAsyncContext
        )
    }

    /// Stable machine-readable code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(ValidationError::OutputLocation { .. }) => "output_location_error",
            Error::Validation(ValidationError::InvalidManifest(_)) => "manifest_error",
            Error::Validation(ValidationError::PayloadTooLarge { .. }) => "payload_too_large",
            Error::Validation(_) => "file_validation_error",
            Error::Unavailable { .. } => "service_unavailable",
            Error::Job(_) => "job_error",
            Error::BlockingInAsyncContext => "blocking_in_async_context",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
        }
    }
}
