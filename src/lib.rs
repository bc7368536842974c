//! # netrias-client
//!
//! Client library for the Netrias harmonization service.
//!
//! A harmonization call uploads a CSV or TSV table together with a column
//! mapping manifest, waits for the remote job to finish, and streams the
//! harmonized table to local disk.
//!
//! ## Design Philosophy
//!
//! - **Snapshot configuration** - every call pins the settings current at its
//!   start; reconfiguring a client never affects calls already running
//! - **No partial output** - results are written to a hidden temp file and
//!   renamed into place only once complete
//! - **Outcomes, not exceptions** - a job that fails or times out is a returned
//!   [`HarmonizationResult`]; only local problems and transport faults are errors
//! - **Bring your own subscriber** - events are emitted through `tracing` under
//!   the `netrias_client` target
//!
//! ## Quick Start
//!
//! ```no_run
//! use netrias_client::{HarmonizationClient, HarmonizeRequest};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HarmonizationClient::new(std::env::var("NETRIAS_API_KEY")?)?;
//!
//!     let request = HarmonizeRequest::new("sample.csv", Path::new("manifest.json"))
//!         .output_path("results/");
//!     let result = client.harmonize(request)?;
//!
//!     if result.is_success() {
//!         println!("wrote {}", result.file_path.display());
//!     } else {
//!         println!("{}: {}", result.status, result.description);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Client facade
pub mod client;
/// Configuration types
pub mod config;
/// Per-call settings snapshot
pub mod context;
/// Error types
pub mod error;
/// Submit, poll and download workflow
pub mod job;
/// Per-instance log level gate
pub mod logging;
/// Upload payload construction
pub mod payload;
/// Atomic streaming writes
pub mod storage;
/// Remote job operations
pub mod transport;
/// Core result and request types
pub mod types;
/// Input validation and output path resolution
pub mod validation;

// Re-export commonly used types
pub use client::HarmonizationClient;
pub use config::{ConfigUpdate, GatewayBypass, LogLevel, Settings};
pub use error::{Error, JobError, Result, ValidationError};
pub use transport::{HttpTransport, Transport};
pub use types::{
    HarmonizationResult, HarmonizationStatus, HarmonizeRequest, JobState, Manifest, Stage,
};
