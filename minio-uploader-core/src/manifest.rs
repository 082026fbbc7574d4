//! Manifest parsing and pre-flight validation.
//!
//! A manifest is UTF-8 text with one transfer per line:
//!
//! ```text
//! # comment
//! store-id;/local/source/file;target/key/in/bucket
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Every other line must have
//! exactly three `;`-separated fields. The first field is carried through as
//! [`TransferEntry::store_id`] but nothing downstream reads it.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEntry {
    /// First manifest field. Kept for format compatibility; unused.
    pub store_id: String,
    pub source_path: String,
    pub target_path: String,
    /// 1-based line in the manifest this entry came from.
    pub line: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line} is malformed: {content} (expected 3 fields separated by ';')")]
    Malformed { line: usize, content: String },
    #[error("line {line} has an empty path: {content}")]
    EmptyPath { line: usize, content: String },
    #[error("manifest {path} contains no entries")]
    Empty { path: PathBuf },
    #[error("source file does not exist (entry {position}, line {line}): {path}")]
    SourceMissing {
        position: usize,
        line: usize,
        path: String,
    },
}

/// Read and parse the manifest at `path`.
pub fn read_manifest(path: impl AsRef<Path>) -> Result<Vec<TransferEntry>, ManifestError> {
    let path = path.as_ref();
    info!(manifest = %path.display(), "Reading manifest");

    let content = fs::read_to_string(path).map_err(|source| {
        error!(error = ?source, manifest = %path.display(), "Failed to read manifest");
        ManifestError::Io {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let entries = parse_manifest(&content)?;
    if entries.is_empty() {
        error!(manifest = %path.display(), "Manifest has no entries");
        return Err(ManifestError::Empty {
            path: path.to_path_buf(),
        });
    }

    info!(manifest = %path.display(), entries = entries.len(), "Parsed manifest");
    Ok(entries)
}

/// Parse manifest text. An input without entries yields an empty vector; the
/// emptiness check belongs to [`read_manifest`], which knows the file name.
pub fn parse_manifest(content: &str) -> Result<Vec<TransferEntry>, ManifestError> {
    let mut entries = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(';').collect();
        let [store_id, source, target] = fields.as_slice() else {
            error!(line = line_no, content = line, fields = fields.len(), "Malformed manifest line");
            return Err(ManifestError::Malformed {
                line: line_no,
                content: line.to_string(),
            });
        };

        let (source, target) = (source.trim(), target.trim());
        if source.is_empty() || target.is_empty() {
            error!(line = line_no, content = line, "Manifest line has an empty path");
            return Err(ManifestError::EmptyPath {
                line: line_no,
                content: line.to_string(),
            });
        }

        debug!(line = line_no, source, target, "Parsed manifest entry");
        entries.push(TransferEntry {
            store_id: store_id.trim().to_string(),
            source_path: source.to_string(),
            target_path: target.to_string(),
            line: line_no,
        });
    }

    Ok(entries)
}

/// Check that every source exists, failing on the first one that does not.
pub fn validate_sources(entries: &[TransferEntry]) -> Result<(), ManifestError> {
    for (idx, entry) in entries.iter().enumerate() {
        if !Path::new(&entry.source_path).exists() {
            error!(
                position = idx + 1,
                line = entry.line,
                path = %entry.source_path,
                "Source file does not exist"
            );
            return Err(ManifestError::SourceMissing {
                position: idx + 1,
                line: entry.line,
                path: entry.source_path.clone(),
            });
        }
    }
    info!(entries = entries.len(), "All source files present");
    Ok(())
}
