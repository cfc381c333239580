use crate::config::ChunkingConfig;
use crate::error::ChunkingError;

/// A contiguous slice of the input text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk in the split sequence
    pub index: usize,
    /// The chunk text
    pub content: String,
}

impl Chunk {
    /// Positional source tag stored with the chunk ("{index}-pl")
    pub fn source_tag(&self) -> String {
        format!("{}-pl", self.index)
    }
}

/// Splits text into overlapping segments of bounded length
///
/// Lengths are counted in characters. Every chunk after the first starts with
/// the last `overlap` characters of the previous one, so dropping those
/// prefixes and concatenating gives back the input exactly.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize(
                "chunk size must be greater than 0".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(ChunkingError::InvalidChunkSize(format!(
                "overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self, ChunkingError> {
        Self::new(config.chunk_size, config.overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into chunks
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        self.split_ranges(text)
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| Chunk {
                index,
                content: text[start..end].to_string(),
            })
            .collect()
    }

    /// Byte ranges of each chunk in `text`
    fn split_ranges(&self, text: &str) -> Vec<(usize, usize)> {
        let chars: Vec<char> = text.chars().collect();
        // Byte offset of every char boundary, including the end of the text
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();

        let total = chars.len();
        let mut ranges = Vec::new();
        let mut start = 0;

        while start < total {
            let hard_end = (start + self.chunk_size).min(total);
            if hard_end == total {
                ranges.push((offsets[start], offsets[total]));
                break;
            }

            // A break must leave more than `overlap` chars behind so the next start advances
            let lower = start + (self.overlap + 1).max(self.chunk_size / 2);
            let end = find_break(&chars, lower, hard_end).unwrap_or(hard_end);

            ranges.push((offsets[start], offsets[end]));
            start = end - self.overlap;
        }

        ranges
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// Best chunk end in `lower..=upper`: paragraph break, then sentence end, then whitespace
fn find_break(chars: &[char], lower: usize, upper: usize) -> Option<usize> {
    let ends = || (lower.max(1)..=upper).rev();

    let paragraph = ends().find(|&end| end >= 2 && chars[end - 2] == '\n' && chars[end - 1] == '\n');
    if paragraph.is_some() {
        return paragraph;
    }

    let sentence = ends().find(|&end| {
        let last = chars[end - 1];
        last == '\n'
            || (end >= 2 && matches!(chars[end - 2], '.' | '!' | '?') && last.is_whitespace())
    });
    if sentence.is_some() {
        return sentence;
    }

    ends().find(|&end| chars[end - 1].is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
        let mut text = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                text.push_str(&chunk.content);
            } else {
                text.extend(chunk.content.chars().skip(overlap));
            }
        }
        text
    }

    fn sample_text() -> String {
        let mut text = String::new();
        for i in 0..40 {
            text.push_str(&format!(
                "Paragraph {} talks about indexing. It has two sentences! Does it?\n\n",
                i
            ));
            if i % 7 == 0 {
                text.push_str("averyveryverylongwordwithoutanybreakpointsatallinsideofit");
            }
        }
        text
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(TextChunker::new(0, 0).is_err());
        assert!(TextChunker::new(10, 10).is_err());
        assert!(TextChunker::new(10, 11).is_err());
        assert!(TextChunker::new(10, 9).is_ok());
        assert!(TextChunker::new(1, 0).is_ok());
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunker = TextChunker::default();
        assert!(chunker.split("").is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunker = TextChunker::default();
        let chunks = chunker.split("Paris is the capital of France.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Paris is the capital of France.");
        assert_eq!(chunks[0].source_tag(), "0-pl");
    }

    #[test]
    fn test_reconstruction_for_many_parameters() {
        let text = sample_text();
        for (size, overlap) in [(1, 0), (2, 1), (7, 3), (50, 0), (64, 63), (100, 20), (1000, 200)] {
            let chunker = TextChunker::new(size, overlap).unwrap();
            let chunks = chunker.split(&text);
            assert_eq!(
                reconstruct(&chunks, overlap),
                text,
                "size={} overlap={}",
                size,
                overlap
            );
        }
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let text = sample_text();
        let chunker = TextChunker::new(120, 30).unwrap();
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);

        for window in chunks.windows(2) {
            let prev: Vec<char> = window[0].content.chars().collect();
            let next: Vec<char> = window[1].content.chars().collect();
            assert!(prev.len() <= 120);
            assert_eq!(&prev[prev.len() - 30..], &next[..30]);
        }

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let text = format!("{}\n\n{}", "a".repeat(70), "b ".repeat(50));
        let chunker = TextChunker::new(100, 0).unwrap();
        let chunks = chunker.split(&text);
        assert_eq!(chunks[0].content, format!("{}\n\n", "a".repeat(70)));
    }

    #[test]
    fn test_prefers_sentence_over_whitespace() {
        let text = format!("{}. {}", "word ".repeat(13).trim_end(), "tail ".repeat(20));
        let chunker = TextChunker::new(80, 0).unwrap();
        let chunks = chunker.split(&text);
        assert!(chunks[0].content.ends_with(". "), "{:?}", chunks[0].content);
    }

    #[test]
    fn test_hard_cut_without_breakpoints() {
        let text = "x".repeat(250);
        let chunker = TextChunker::new(100, 10).unwrap();
        let chunks = chunker.split(&text);
        assert_eq!(chunks[0].content.len(), 100);
        assert_eq!(chunks[1].content.len(), 100);
        assert_eq!(reconstruct(&chunks, 10), text);
    }

    #[test]
    fn test_unicode_is_split_on_char_boundaries() {
        let text = "日本語のテキストです。".repeat(30) + "🦀 crab 🦀 ".repeat(20).as_str();
        let chunker = TextChunker::new(37, 5).unwrap();
        let chunks = chunker.split(&text);
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 37));
        assert_eq!(reconstruct(&chunks, 5), text);
    }

    #[test]
    fn test_deterministic() {
        let text = sample_text();
        let chunker = TextChunker::new(90, 15).unwrap();
        assert_eq!(chunker.split(&text), chunker.split(&text));
    }
}
