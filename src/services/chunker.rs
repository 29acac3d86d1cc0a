//! Word-window chunking for resume text.

use crate::models::PipelineConfig;

/// Splits text into windows of whitespace-separated words.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Words per chunk
    chunk_words: usize,
    /// Words shared with the previous chunk
    overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_words: usize, overlap: usize) -> Self {
        let chunk_words = chunk_words.max(1);
        Self {
            chunk_words,
            // An overlap as large as the window would never advance
            overlap: overlap.min(chunk_words - 1),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.chunk_words, config.chunk_overlap_words)
    }

    pub fn with_defaults() -> Self {
        Self::from_config(&PipelineConfig::default())
    }

    /// Chunk `content`. Whitespace runs collapse to single spaces; text with
    /// no words yields no chunks.
    pub fn chunk(&self, content: &str) -> Vec<String> {
        let words: Vec<&str> = content.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_words - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.chunk_words).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end == words.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// Estimate the number of tokens in a text.
/// Uses a simple heuristic: ~4 characters per token on average.
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}
