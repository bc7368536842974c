//! Core types shared by the client, the job engine and transports

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Stage of the job workflow an operation or error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Uploading the payload and obtaining a job id
    Submit,
    /// Querying job status
    Poll,
    /// Retrieving the finished artifact
    Download,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Submit => "submit",
            Stage::Poll => "poll",
            Stage::Download => "download",
        })
    }
}

/// State of a remote job
///
/// The first four states are reported by the server. [`JobState::TimedOut`] is
/// derived on the client when the deadline passes before a terminal state arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Accepted by the server, not yet started
    Submitted,
    /// Being processed
    Running,
    /// Finished; a signed download location is available
    Succeeded,
    /// Finished without a usable artifact
    Failed,
    /// Client-side deadline elapsed before a terminal state
    TimedOut,
    /// State string the client does not recognize (treated as non-terminal)
    Unknown,
}

impl JobState {
    /// Parse a server-reported state, case-insensitively
    ///
    /// Unrecognized values map to [`JobState::Unknown`] rather than failing, so a
    /// server adding a new intermediate state does not break polling.
    pub fn from_server(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "SUBMITTED" | "QUEUED" | "PENDING" => JobState::Submitted,
            "RUNNING" | "IN_PROGRESS" | "PROCESSING" => JobState::Running,
            "SUCCEEDED" | "COMPLETED" | "SUCCESS" => JobState::Succeeded,
            "FAILED" | "ERROR" => JobState::Failed,
            _ => JobState::Unknown,
        }
    }

    /// Whether no further transition can occur
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::TimedOut
        )
    }
}

/// Outcome status of a harmonization call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarmonizationStatus {
    /// The output file was written completely
    Succeeded,
    /// The service reported a failure; no output file exists
    Failed,
    /// The deadline elapsed first; no output file exists
    Timeout,
}

impl fmt::Display for HarmonizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HarmonizationStatus::Succeeded => "succeeded",
            HarmonizationStatus::Failed => "failed",
            HarmonizationStatus::Timeout => "timeout",
        })
    }
}

/// Result of one harmonization job
///
/// Business-level failures and timeouts are reported here rather than as errors.
/// When `status` is [`HarmonizationStatus::Succeeded`] the file at `file_path`
/// exists and is complete; for any other status no file exists at that path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarmonizationResult {
    /// Resolved output path
    pub file_path: PathBuf,
    /// Outcome
    pub status: HarmonizationStatus,
    /// Human-readable description suitable for display
    pub description: String,
    /// Mapping identifier echoed by the service, if any
    pub mapping_id: Option<String>,
}

impl HarmonizationResult {
    pub(crate) fn succeeded(file_path: PathBuf, mapping_id: Option<String>) -> Self {
        Self {
            file_path,
            status: HarmonizationStatus::Succeeded,
            description: "harmonization succeeded".to_string(),
            mapping_id,
        }
    }

    pub(crate) fn failed(
        file_path: PathBuf,
        description: impl Into<String>,
        mapping_id: Option<String>,
    ) -> Self {
        Self {
            file_path,
            status: HarmonizationStatus::Failed,
            description: description.into(),
            mapping_id,
        }
    }

    pub(crate) fn timed_out(file_path: PathBuf, mapping_id: Option<String>) -> Self {
        Self {
            file_path,
            status: HarmonizationStatus::Timeout,
            description: "request timed out".to_string(),
            mapping_id,
        }
    }

    /// Whether the output file was produced
    pub fn is_success(&self) -> bool {
        self.status == HarmonizationStatus::Succeeded
    }
}

/// Column mapping manifest sent alongside the source table
#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
    /// A `.json` manifest file on disk
    Path(PathBuf),
    /// An in-memory mapping (for example one produced by a discovery step)
    Mapping(serde_json::Value),
}

impl From<PathBuf> for Manifest {
    fn from(path: PathBuf) -> Self {
        Manifest::Path(path)
    }
}

impl From<&Path> for Manifest {
    fn from(path: &Path) -> Self {
        Manifest::Path(path.to_path_buf())
    }
}

impl From<serde_json::Value> for Manifest {
    fn from(value: serde_json::Value) -> Self {
        Manifest::Mapping(value)
    }
}

/// Inputs of a harmonization call
#[derive(Debug, Clone)]
pub struct HarmonizeRequest {
    /// CSV or TSV file to harmonize
    pub source_path: PathBuf,
    /// Column mapping manifest
    pub manifest: Manifest,
    /// Output file or directory; defaults to `<stem>.harmonized.csv` next to the source
    pub output_path: Option<PathBuf>,
}

impl HarmonizeRequest {
    /// Create a request writing to the default output location
    pub fn new(source_path: impl Into<PathBuf>, manifest: impl Into<Manifest>) -> Self {
        Self {
            source_path: source_path.into(),
            manifest: manifest.into(),
            output_path: None,
        }
    }

    /// Write the result to `path` (a file, or a directory for the default file name)
    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }
}
