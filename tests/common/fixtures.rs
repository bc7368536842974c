//! On-disk fixtures

use netrias_client::HarmonizeRequest;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Source table used by most tests
pub const SAMPLE_CSV: &str = "patient_id,primary_diagnosis\n1,melanoma\n2,glioma\n";

/// Manifest mapping the sample's diagnosis column
pub const SAMPLE_MANIFEST: &str = r#"{"column_mappings": {"primary_diagnosis": {"cdeId": 6161032}}}"#;

/// Harmonized body streamed back by the scripted transport, in chunks
pub const HARMONIZED_CHUNKS: [&[u8]; 3] = [
    b"patient_id,primary_diagnosis\n",
    b"1,Melanoma, NOS\n",
    b"2,Glioma\n",
];

/// Concatenation of [`HARMONIZED_CHUNKS`]
pub fn harmonized_bytes() -> Vec<u8> {
    HARMONIZED_CHUNKS.concat()
}

/// A temp directory holding `sample.csv` and `manifest.json`
pub struct Workspace {
    pub dir: TempDir,
    pub source: PathBuf,
    pub manifest: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let source = dir.path().join("sample.csv");
        let manifest = dir.path().join("manifest.json");
        std::fs::write(&source, SAMPLE_CSV).expect("write source");
        std::fs::write(&manifest, SAMPLE_MANIFEST).expect("write manifest");
        Self {
            dir,
            source,
            manifest,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Request for the sample with the default output location
    pub fn request(&self) -> HarmonizeRequest {
        HarmonizeRequest::new(&self.source, self.manifest.as_path())
    }

    /// Where the default output lands
    pub fn default_output(&self) -> PathBuf {
        self.path().join("sample.harmonized.csv")
    }

    /// File names currently in the workspace, sorted
    pub fn entries(&self) -> Vec<String> {
        entries(self.path())
    }
}

/// File names in `dir`, sorted
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Whether any in-flight download file is left in `dir`
pub fn has_partial_files(dir: &Path) -> bool {
    entries(dir).iter().any(|name| name.ends_with(".part"))
}
