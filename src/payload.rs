//! Upload payload construction
//!
//! The service takes a gzip-compressed JSON envelope holding the source table
//! and the normalized column mapping:
//!
//! ```json
//! {
//!   "schemaVersion": "1.0",
//!   "modelVersion": "v1",
//!   "document": {"name": "sample.csv", "sheetName": null, "header": [...], "rows": [[...]]},
//!   "mapping": {"primary_diagnosis": -200}
//! }
//! ```

use crate::error::{Result, ValidationError};
use crate::types::Manifest;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Envelope schema version
pub const SCHEMA_VERSION: &str = "1.0";

/// Model version requested from the service
pub const DEFAULT_MODEL_VERSION: &str = "v1";

/// Largest compressed payload the service accepts (10 MiB)
pub const MAX_COMPRESSED_BYTES: usize = 10 * 1024 * 1024;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    schema_version: &'static str,
    model_version: &'a str,
    document: Document<'a>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    mapping: BTreeMap<String, i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Document<'a> {
    name: &'a str,
    sheet_name: Option<&'a str>,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Build the gzip-compressed payload for `source` and `manifest`
///
/// Fails locally, before any network access, when the source cannot be parsed,
/// the manifest cannot be read, or the compressed payload exceeds
/// [`MAX_COMPRESSED_BYTES`].
pub fn build_harmonize_payload(source: &Path, manifest: &Manifest) -> Result<Vec<u8>> {
    build_payload_with_limit(source, manifest, MAX_COMPRESSED_BYTES)
}

pub(crate) fn build_payload_with_limit(
    source: &Path,
    manifest: &Manifest,
    limit: usize,
) -> Result<Vec<u8>> {
    let mut rows = read_table(source)?;
    let header = if rows.is_empty() {
        Vec::new()
    } else {
        rows.remove(0)
    };

    let name = source
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let envelope = Envelope {
        schema_version: SCHEMA_VERSION,
        model_version: DEFAULT_MODEL_VERSION,
        document: Document {
            name,
            sheet_name: None,
            header,
            rows,
        },
        mapping: normalized_mapping(&manifest_value(manifest)?),
    };

    let raw = serde_json::to_vec(&envelope)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw)?;
    let compressed = encoder.finish()?;

    if compressed.len() > limit {
        return Err(ValidationError::PayloadTooLarge {
            size: compressed.len(),
            limit,
        }
        .into());
    }
    Ok(compressed)
}

/// Read a CSV (comma) or TSV (tab) file into rows of strings
fn read_table(path: &Path) -> Result<Vec<Vec<String>>> {
    let delimiter = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    };

    let unreadable = |e: csv::Error| ValidationError::UnreadableSource {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .map_err(unreadable)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(unreadable)?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn manifest_value(manifest: &Manifest) -> Result<Value> {
    match manifest {
        Manifest::Mapping(value) => Ok(value.clone()),
        Manifest::Path(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                ValidationError::InvalidManifest(format!(
                    "cannot read {}: {e}",
                    path.display()
                ))
            })?;
            serde_json::from_str(&content).map_err(|e| {
                ValidationError::InvalidManifest(format!("manifest must be valid JSON: {e}"))
                    .into()
            })
        }
    }
}

/// Normalize a manifest into `column -> CDE id`
///
/// Accepts either `{"column_mappings": {...}}` or the mapping object itself.
/// Each value may be an integer, a numeric string, or an object carrying
/// `cdeId` / `cde_id`. Entries that do not yield an integer id are skipped.
pub fn normalized_mapping(manifest: &Value) -> BTreeMap<String, i64> {
    let Some(root) = manifest.as_object() else {
        return BTreeMap::new();
    };
    let mapping: &Map<String, Value> = root
        .get("column_mappings")
        .and_then(Value::as_object)
        .unwrap_or(root);

    mapping
        .iter()
        .filter_map(|(field, value)| {
            let name = field.trim();
            if name.is_empty() {
                return None;
            }
            cde_id(value).map(|id| (name.to_string(), id))
        })
        .collect()
}

fn cde_id(value: &Value) -> Option<i64> {
    let candidate = match value.as_object() {
        Some(entry) => entry
            .get("cdeId")
            .filter(|v| !v.is_null())
            .or_else(|| entry.get("cde_id").filter(|v| !v.is_null()))?,
        None => value,
    };

    match candidate {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
