//! Document loading and chunking
//!
//! Turns PDF, text, CSV and JSON files into plain text and splits that text
//! into overlapping segments ready for embedding.

mod chunker;
mod loader;
mod pdf_extractor;

pub use chunker::{Chunk, TextChunker};
pub use loader::{DOCUMENT_SEPARATOR, DocumentKind, DocumentLoader, LoadedDocuments};
pub use pdf_extractor::extract_pdf_text;
