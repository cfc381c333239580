//! Requests answered locally without retrieval or generation
//!
//! Only two literal phrases are recognized; anything else goes to the model.

use std::path::{Path, PathBuf};

const LIST_FILES: &str = "list files in directory";
const LIST_FILES_ANCHOR: &str = "directory";
const CREATE_FILE: &str = "create a file named";
const CREATED_FILE_CONTENT: &str = "File created.";

/// Text following the last ASCII case-insensitive occurrence of `needle`
fn text_after_last<'a>(haystack: &'a str, needle: &str) -> Option<&'a str> {
    // ASCII lowercasing keeps byte offsets valid for the original string
    let lowered = haystack.to_ascii_lowercase();
    lowered
        .rfind(needle)
        .map(|at| haystack[at + needle.len()..].trim())
}

/// Runs the locally handled tasks, resolving relative paths against `base_dir`
#[derive(Debug, Clone)]
pub struct TaskHandler {
    base_dir: PathBuf,
}

impl TaskHandler {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Handle `query` if it matches a task pattern, returning the answer
    pub fn handle(&self, query: &str) -> Option<String> {
        let lowered = query.to_ascii_lowercase();

        if lowered.contains(LIST_FILES) {
            let directory = text_after_last(query, LIST_FILES_ANCHOR).unwrap_or_default();
            return Some(self.list_files(directory));
        }

        if lowered.contains(CREATE_FILE) {
            let file_name = text_after_last(query, CREATE_FILE).unwrap_or_default();
            return Some(self.create_file(file_name));
        }

        None
    }

    fn list_files(&self, directory: &str) -> String {
        let path = self.resolve(directory);
        if !path.is_dir() {
            return format!("Directory {} does not exist.", directory);
        }

        tracing::info!("Listing files in {}", path.display());

        match std::fs::read_dir(&path) {
            Ok(entries) => {
                let mut names: Vec<String> = entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.file_name().to_string_lossy().to_string())
                    .collect();
                names.sort();
                format!("Files in {}:\n{}", directory, names.join("\n"))
            }
            Err(e) => format!("Failed to list directory {}: {}", directory, e),
        }
    }

    fn create_file(&self, file_name: &str) -> String {
        let path = self.resolve(file_name);
        tracing::info!("Creating file {}", path.display());

        match std::fs::write(&path, CREATED_FILE_CONTENT) {
            Ok(()) => format!("File '{}' created successfully.", file_name),
            Err(e) => format!("Failed to create file '{}': {}", file_name, e),
        }
    }
}

impl Default for TaskHandler {
    fn default() -> Self {
        Self::new(".")
    }
}
