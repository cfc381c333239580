use anyhow::{Context, Result, anyhow};
use std::path::Path;

/// Extract the text of every page of a PDF, in page order
pub fn extract_pdf_text(path: &Path) -> Result<String> {
    // pdf-extract panics on some malformed documents instead of returning an error
    let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text(path))
        .map_err(|_| anyhow!("PDF parser panicked"))?;

    let text = extracted.context("Failed to extract text from PDF")?;

    Ok(normalize_page_text(&text))
}

/// Clean up raw extraction output
///
/// Page breaks arrive as form feeds; lines keep their content but lose trailing
/// whitespace, and runs of blank lines collapse to a single paragraph break.
fn normalize_page_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut pending_break = false;

    for line in text.split(['\n', '\u{c}']) {
        let line = line.trim_end();

        if line.is_empty() {
            pending_break = !normalized.is_empty();
            continue;
        }

        if pending_break {
            normalized.push('\n');
            pending_break = false;
        }
        normalized.push_str(line);
        normalized.push('\n');
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_blank_lines() {
        let text = "INTRODUCTION\n\n\n\nThis is some text.   \n";
        assert_eq!(normalize_page_text(text), "INTRODUCTION\n\nThis is some text.\n");
    }

    #[test]
    fn test_normalize_splits_pages() {
        let text = "page one\u{c}page two";
        assert_eq!(normalize_page_text(text), "page one\npage two\n");
    }

    #[test]
    fn test_normalize_drops_leading_blank_lines() {
        assert_eq!(normalize_page_text("\n\n\nbody"), "body\n");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_page_text(""), "");
    }

    #[test]
    fn test_extract_missing_file_is_error() {
        let result = extract_pdf_text(Path::new("/nonexistent/file.pdf"));
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_garbage_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();
        assert!(extract_pdf_text(&path).is_err());
    }
}
