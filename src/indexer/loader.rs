use super::pdf_extractor::extract_pdf_text;
use crate::error::LoadError;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Separator appended after every loaded document
pub const DOCUMENT_SEPARATOR: &str = "\n\n";

/// Supported document formats, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
    Csv,
    Json,
}

impl DocumentKind {
    /// Detect the kind from a path's extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Text),
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Combined text of several documents
#[derive(Debug, Default)]
pub struct LoadedDocuments {
    /// Concatenated text, each document followed by [`DOCUMENT_SEPARATOR`]
    pub text: String,
    /// Files that contributed text, in load order
    pub loaded: Vec<PathBuf>,
    /// Files skipped because of their extension
    pub skipped: Vec<PathBuf>,
    /// Human-readable descriptions of files that failed to load
    pub errors: Vec<String>,
}

/// Converts files into plain text
pub struct DocumentLoader;

impl DocumentLoader {
    /// Load a single file as plain text
    pub fn load(path: &Path) -> Result<String, LoadError> {
        let kind = DocumentKind::from_path(path)
            .ok_or_else(|| LoadError::UnsupportedFormat(path.display().to_string()))?;

        tracing::debug!("Loading {:?} document: {}", kind, path.display());

        match kind {
            DocumentKind::Pdf => extract_pdf_text(path).map_err(|e| LoadError::PdfExtraction {
                file: path.display().to_string(),
                reason: format!("{:#}", e),
            }),
            DocumentKind::Text => read_to_string(path),
            DocumentKind::Csv => load_csv(path),
            DocumentKind::Json => load_json(path),
        }
    }

    /// Load many files (and directories) into one text, in the given order
    ///
    /// Unsupported files are skipped silently; failing files are logged,
    /// reported in [`LoadedDocuments::errors`] and skipped.
    pub fn load_many(paths: &[PathBuf]) -> LoadedDocuments {
        let mut result = LoadedDocuments::default();

        let mut candidates = Vec::new();
        for path in paths {
            if path.is_dir() {
                candidates.extend(expand_directory(path));
            } else if DocumentKind::from_path(path).is_some() {
                candidates.push(path.clone());
            } else {
                tracing::debug!("Skipping unsupported file: {}", path.display());
                result.skipped.push(path.clone());
            }
        }

        let loaded: Vec<(PathBuf, Result<String, LoadError>)> = candidates
            .into_par_iter()
            .map(|path| {
                let text = Self::load(&path);
                (path, text)
            })
            .collect();

        for (path, text) in loaded {
            match text {
                Ok(text) => {
                    result.text.push_str(&text);
                    result.text.push_str(DOCUMENT_SEPARATOR);
                    result.loaded.push(path);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    result.errors.push(e.to_string());
                }
            }
        }

        tracing::info!(
            "Loaded {} documents ({} characters), {} skipped, {} failed",
            result.loaded.len(),
            result.text.chars().count(),
            result.skipped.len(),
            result.errors.len()
        );

        result
    }
}

/// Supported files below a directory, sorted by file name at every level
fn expand_directory(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Error walking {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| DocumentKind::from_path(path).is_some())
        .collect()
}

fn read_to_string(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|e| LoadError::ReadFailed {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Each row's fields joined by a space, every row terminated by a newline
fn load_csv(path: &Path) -> Result<String, LoadError> {
    let csv_error = |e: csv::Error| LoadError::Csv {
        file: path.display().to_string(),
        reason: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;

    let mut text = String::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let fields: Vec<&str> = record.iter().collect();
        text.push_str(&fields.join(" "));
        text.push('\n');
    }

    Ok(text)
}

/// Parse and re-serialize with two-space indentation, keeping key order
fn load_json(path: &Path) -> Result<String, LoadError> {
    let raw = read_to_string(path)?;

    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| LoadError::Json {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;

    serde_json::to_string_pretty(&value).map_err(|e| LoadError::Json {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}
