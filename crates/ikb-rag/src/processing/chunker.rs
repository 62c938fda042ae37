use crate::config::ChunkingConfig;
use crate::error::{RagError, Result};
use crate::processing::sections::detect_section;
use crate::types::Chunk;

/// Sliding-window chunker over characters.
///
/// Windows are `chunk_size` characters wide and advance by
/// `chunk_size - chunk_overlap`, so consecutive chunks share `chunk_overlap`
/// characters. The final window may be shorter; nothing is padded.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be > 0".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be < chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Distance between consecutive window starts, always >= 1.
    pub fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    /// Split `text` into trimmed, section-tagged chunks.
    /// Windows that are only whitespace produce no chunk.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        // Byte offset of every char boundary, plus the end of the text.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = bounds.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < char_count {
            let end = (start + self.chunk_size).min(char_count);
            let window = &text[bounds[start]..bounds[end]];
            let content = window.trim();

            if !content.is_empty() {
                chunks.push(Chunk {
                    content: content.to_string(),
                    section: detect_section(window),
                    sequence_index: chunks.len(),
                    start_offset: start,
                    sensitive: false,
                });
            }

            start += self.step();
        }

        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 150,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Section;

    fn sample_text(len: usize) -> String {
        "abcdefghijklmnopqrstuvwxyz0123456789"
            .chars()
            .cycle()
            .take(len)
            .collect()
    }

    #[test]
    fn test_overlap_guard() {
        assert!(matches!(TextChunker::new(100, 100), Err(RagError::Config(_))));
        assert!(matches!(TextChunker::new(100, 150), Err(RagError::Config(_))));
        assert!(matches!(TextChunker::new(0, 0), Err(RagError::Config(_))));
        assert!(TextChunker::new(100, 99).is_ok());
    }

    #[test]
    fn test_default_windows() {
        let chunker = TextChunker::default();
        let text = sample_text(2000);
        let chunks = chunker.chunk(&text);

        let starts: Vec<usize> = chunks.iter().map(|c| c.start_offset).collect();
        assert_eq!(starts, vec![0, 650, 1300, 1950]);
        assert_eq!(chunks[0].content.chars().count(), 800);
        assert_eq!(chunks[3].content.chars().count(), 50);
        assert_eq!(chunks[1].content, text[650..1450]);
    }

    #[test]
    fn test_every_character_is_covered() {
        for (size, overlap) in [(10, 0), (10, 3), (7, 6), (800, 150), (1, 0)] {
            let chunker = TextChunker::new(size, overlap).unwrap();
            for len in [1, 9, 10, 11, 57, 1000] {
                let text = sample_text(len);
                let chunks = chunker.chunk(&text);

                let mut covered = vec![false; len];
                for chunk in &chunks {
                    let n = chunk.content.chars().count();
                    for flag in covered.iter_mut().skip(chunk.start_offset).take(n) {
                        *flag = true;
                    }
                    assert_eq!(
                        chunk.content,
                        text.chars().skip(chunk.start_offset).take(n).collect::<String>()
                    );
                }
                assert!(covered.iter().all(|c| *c), "size={size} overlap={overlap} len={len}");

                for pair in chunks.windows(2) {
                    assert_eq!(pair[1].start_offset - pair[0].start_offset, size - overlap);
                }
            }
        }
    }

    #[test]
    fn test_multibyte_text_splits_on_characters() {
        let chunker = TextChunker::new(4, 1).unwrap();
        let chunks = chunker.chunk("ñandú añejo");
        assert_eq!(chunks[0].content, "ñand");
        assert_eq!(chunks[1].content, "dú a");
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 4));
    }

    #[test]
    fn test_chunks_are_trimmed_and_blank_windows_skipped() {
        let chunker = TextChunker::new(5, 0).unwrap();
        let chunks = chunker.chunk("  ab      cd ");
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["ab", "cd"]);
        assert_eq!(chunks[1].sequence_index, 1);
        assert_eq!(chunks[1].start_offset, 10);
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert!(TextChunker::default().chunk("").is_empty());
    }

    #[test]
    fn test_chunks_are_section_tagged() {
        let chunker = TextChunker::new(40, 0).unwrap();
        let text = format!("{:<40}{:<40}", "Wear PPE near the press", "Quarterly sales figures");
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks[0].section, Section::Safety);
        assert_eq!(chunks[1].section, Section::General);
        assert!(chunks.iter().all(|c| !c.sensitive));
    }
}
