//! Streaming writes with atomic promotion to the final path
//!
//! Bytes are written to a hidden sibling temp file (`.<name>.<random>.part`)
//! and renamed onto the final path only after the source is fully consumed.
//! The temp file lives in the same directory so the rename stays on one
//! filesystem. Every other exit path (source error, write error, the future
//! being dropped on cancellation) deletes the temp file through the
//! [`NamedTempFile`] guard, so no partial output is ever visible.
//!
//! Promotion never replaces an existing file. When another writer claimed the
//! final path first, the file lands on the next free `<stem>.vN.<ext>` name.

use crate::error::{Error, Result, ValidationError};
use crate::validation::{MAX_VERSION_ATTEMPTS, versioned_name};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

/// Suffix of in-flight download files
pub const PARTIAL_SUFFIX: &str = ".part";

/// A fully written output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Where the bytes landed; differs from the requested path on collision
    pub path: PathBuf,
    /// Number of bytes written
    pub bytes: u64,
}

/// Stream `source` into `final_path`
///
/// An empty source writes nothing and returns `Ok(None)`; no file is created.
/// Whatever the outcome, no temp file is left behind.
pub async fn stream_to_file<S>(mut source: S, final_path: &Path) -> Result<Option<StoredFile>>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let temp = create_sibling_temp(final_path)?;
    let mut file = tokio::fs::File::from_std(temp.as_file().try_clone()?);

    let mut written: u64 = 0;
    while let Some(chunk) = source.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    if written == 0 {
        return Ok(None);
    }

    let path = persist_unique(temp, final_path)?;
    Ok(Some(StoredFile {
        path,
        bytes: written,
    }))
}

/// Move `temp` onto `final_path`, or onto its first free versioned name
fn persist_unique(temp: NamedTempFile, final_path: &Path) -> Result<PathBuf> {
    let mut temp = match temp.persist_noclobber(final_path) {
        Ok(_) => return Ok(final_path.to_path_buf()),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => e.file,
        Err(e) => return Err(Error::Io(e.error)),
    };

    for version in 1..=MAX_VERSION_ATTEMPTS {
        let candidate = versioned_name(final_path, version)?;
        temp = match temp.persist_noclobber(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => e.file,
            Err(e) => return Err(Error::Io(e.error)),
        };
    }

    Err(ValidationError::OutputLocation {
        path: final_path.to_path_buf(),
        reason: format!("no free versioned name after {MAX_VERSION_ATTEMPTS} attempts"),
    }
    .into())
}

fn create_sibling_temp(final_path: &Path) -> Result<NamedTempFile> {
    let file_name = final_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ValidationError::OutputLocation {
            path: final_path.to_path_buf(),
            reason: "path has no file name".to_string(),
        })?;

    let parent = match final_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let temp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(parent)?;
    Ok(temp)
}
