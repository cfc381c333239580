//! Sidecar files stored in each index directory

use crate::error::{IndexError, RagError};
use crate::types::IndexMetadata;
use std::path::{Path, PathBuf};

/// Ordered list of the files an index was built from
pub const MANIFEST_FILE: &str = "file_paths.json";

/// Embedding model and chunking parameters used at build time
pub const METADATA_FILE: &str = "index_meta.json";

fn index_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| dir.display().to_string())
}

fn corrupted(dir: &Path, file: &str, err: impl std::fmt::Display) -> RagError {
    IndexError::Corrupted {
        name: index_name(dir),
        reason: format!("{}: {}", file, err),
    }
    .into()
}

pub fn write_manifest(dir: &Path, file_paths: &[PathBuf]) -> Result<(), RagError> {
    let json = serde_json::to_string(file_paths).map_err(|e| corrupted(dir, MANIFEST_FILE, e))?;
    std::fs::write(dir.join(MANIFEST_FILE), json)?;
    Ok(())
}

/// Read the manifest, failing with `ManifestNotFound` when it is missing or unreadable
pub fn read_manifest(dir: &Path) -> Result<Vec<PathBuf>, RagError> {
    let path = dir.join(MANIFEST_FILE);
    if !path.is_file() {
        return Err(IndexError::ManifestNotFound(index_name(dir)).into());
    }

    let raw = std::fs::read_to_string(&path)?;
    serde_json::from_str(&raw).map_err(|e| {
        tracing::warn!("Unreadable manifest {}: {}", path.display(), e);
        RagError::from(IndexError::ManifestNotFound(index_name(dir)))
    })
}

pub fn write_metadata(dir: &Path, metadata: &IndexMetadata) -> Result<(), RagError> {
    let json =
        serde_json::to_string_pretty(metadata).map_err(|e| corrupted(dir, METADATA_FILE, e))?;
    std::fs::write(dir.join(METADATA_FILE), json)?;
    Ok(())
}

/// Read build metadata; `None` for indexes built without it
pub fn read_metadata(dir: &Path) -> Result<Option<IndexMetadata>, RagError> {
    let path = dir.join(METADATA_FILE);
    if !path.is_file() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(&path)?;
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| corrupted(dir, METADATA_FILE, e))
}
