//! Local input checks and output path resolution
//!
//! Everything here runs before any network access, so a bad source file,
//! manifest, or output location fails fast with an actionable message.

use crate::error::{Result, ValidationError};
use crate::types::Manifest;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Largest source file accepted for upload (250 MiB)
pub const HARD_MAX_SOURCE_BYTES: u64 = 250 * 1024 * 1024;

/// Suffix appended to the source stem for the default output name
pub const HARMONIZED_SUFFIX: &str = "harmonized";

/// Source file extensions the service understands
const SOURCE_EXTENSIONS: [&str; 2] = ["csv", "tsv"];

/// Maximum number of versioned names tried when the output already exists
pub(crate) const MAX_VERSION_ATTEMPTS: u32 = 9999;

/// Check that `path` is an existing CSV or TSV file within the upload limit
pub fn validate_source(path: &Path) -> Result<()> {
    check_source(path, HARD_MAX_SOURCE_BYTES)
}

pub(crate) fn check_source(path: &Path, limit: u64) -> Result<()> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ValidationError::SourceNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        Err(e) => return Err(e.into()),
    };

    if !metadata.is_file() {
        return Err(ValidationError::NotAFile {
            what: "source",
            path: path.to_path_buf(),
        }
        .into());
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !SOURCE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ValidationError::UnsupportedExtension {
            path: path.to_path_buf(),
            extension,
        }
        .into());
    }

    if metadata.len() > limit {
        return Err(ValidationError::SourceTooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            limit,
        }
        .into());
    }

    Ok(())
}

/// Check that `manifest` is usable as a column mapping
///
/// A manifest path must name an existing `.json` file whose content is a JSON
/// object. An inline mapping must itself be a JSON object.
pub fn validate_manifest(manifest: &Manifest) -> Result<()> {
    match manifest {
        Manifest::Mapping(value) => {
            if !value.is_object() {
                return Err(ValidationError::InvalidManifest(
                    "inline manifest must be a JSON object".to_string(),
                )
                .into());
            }
            Ok(())
        }
        Manifest::Path(path) => validate_manifest_file(path),
    }
}

fn validate_manifest_file(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(ValidationError::InvalidManifest(format!(
            "manifest file not found: {}",
            path.display()
        ))
        .into());
    }
    if !path.is_file() {
        return Err(ValidationError::NotAFile {
            what: "manifest",
            path: path.to_path_buf(),
        }
        .into());
    }

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if !is_json {
        return Err(ValidationError::InvalidManifest(format!(
            "manifest file must have a .json extension: {}",
            path.display()
        ))
        .into());
    }

    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content).map_err(|e| {
        ValidationError::InvalidManifest(format!(
            "manifest {} is not valid JSON: {e}",
            path.display()
        ))
    })?;
    if !value.is_object() {
        return Err(ValidationError::InvalidManifest(format!(
            "manifest {} must contain a JSON object",
            path.display()
        ))
        .into());
    }
    Ok(())
}

/// Decide where the harmonized file for `source` will be written
///
/// With no `output`, the file goes next to the source as
/// `<stem>.harmonized.csv`. An `output` that is an existing directory, or that
/// has no extension, is treated as a directory and receives the default name.
/// Any other `output` is used as the file path. Missing parent directories are
/// created.
///
/// An existing file is never overwritten: `report.csv` becomes
/// `report.v1.csv`, then `report.v2.csv`, and so on.
pub fn resolve_output_path(output: Option<&Path>, source: &Path) -> Result<PathBuf> {
    let default_name = default_output_name(source);

    let candidate = match output {
        None => source
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .join(&default_name),
        Some(path) if path.is_dir() || (!path.exists() && path.extension().is_none()) => {
            path.join(&default_name)
        }
        Some(path) => path.to_path_buf(),
    };

    let parent = match candidate.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| ValidationError::OutputLocation {
        path: parent.clone(),
        reason: format!("cannot create directory: {e}"),
    })?;
    ensure_writable(&parent)?;

    versioned_path(&candidate)
}

fn default_output_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("output");
    format!("{stem}.{HARMONIZED_SUFFIX}.csv")
}

/// First of `path`, `<stem>.v1.<ext>`, `<stem>.v2.<ext>`, ... that does not exist
fn versioned_path(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    for version in 1..=MAX_VERSION_ATTEMPTS {
        let candidate = versioned_name(path, version)?;
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(ValidationError::OutputLocation {
        path: path.to_path_buf(),
        reason: format!("no free versioned name after {MAX_VERSION_ATTEMPTS} attempts"),
    }
    .into())
}

/// `<stem>.v<version>.<ext>` next to `path`
pub(crate) fn versioned_name(path: &Path, version: u32) -> Result<PathBuf> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ValidationError::OutputLocation {
            path: path.to_path_buf(),
            reason: "cannot extract file stem".to_string(),
        })?;
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}.v{version}.{ext}"),
        None => format!("{stem}.v{version}"),
    };
    Ok(path.parent().unwrap_or(Path::new(".")).join(name))
}

fn ensure_writable(dir: &Path) -> Result<()> {
    tempfile::Builder::new()
        .prefix(".netrias-probe.")
        .tempfile_in(dir)
        .map(drop)
        .map_err(|e| {
            ValidationError::OutputLocation {
                path: dir.to_path_buf(),
                reason: format!("directory is not writable: {e}"),
            }
            .into()
        })
}
