use crate::error::ConfigurationError;
use crate::models::{Chunk, DocumentId, IngestionOptions};

/// Window geometry in characters (Unicode scalar values, not bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl ChunkingConfig {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self, ConfigurationError> {
        if max_chars == 0 {
            return Err(ConfigurationError::ZeroMaxLen);
        }
        if overlap_chars >= max_chars {
            return Err(ConfigurationError::OverlapTooLarge {
                max_len: max_chars,
                overlap: overlap_chars,
            });
        }
        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }

    fn step(&self) -> usize {
        self.max_chars - self.overlap_chars
    }
}

impl TryFrom<IngestionOptions> for ChunkingConfig {
    type Error = ConfigurationError;

    fn try_from(value: IngestionOptions) -> Result<Self, Self::Error> {
        Self::new(value.chunk_max_chars, value.chunk_overlap_chars)
    }
}

/// Lazy iterator over the overlapping windows of a text.
///
/// Yields borrowed slices in left-to-right order. Each step scans at most
/// `max_chars` characters. A fresh iterator over the same text and config
/// always yields the same sequence.
pub struct Windows<'a> {
    text: &'a str,
    config: ChunkingConfig,
    next_start: Option<usize>,
}

impl<'a> Iterator for Windows<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        let rest = &self.text[start..];

        if rest.is_empty() {
            self.next_start = None;
            return None;
        }

        let step = self.config.step();
        let mut step_offset = None;
        let mut end = rest.len();
        for (count, (offset, _)) in rest.char_indices().enumerate() {
            if count == step {
                step_offset = Some(offset);
            }
            if count == self.config.max_chars {
                end = offset;
                break;
            }
        }

        // A window that reaches the end of the text is the last one.
        self.next_start = if end == rest.len() {
            None
        } else {
            step_offset.map(|offset| start + offset)
        };

        Some(&rest[..end])
    }
}

pub fn windows(text: &str, config: ChunkingConfig) -> Windows<'_> {
    Windows {
        text,
        config,
        next_start: Some(0),
    }
}

pub fn chunk_text(
    text: &str,
    max_len: usize,
    overlap: usize,
) -> Result<Vec<String>, ConfigurationError> {
    let config = ChunkingConfig::new(max_len, overlap)?;
    Ok(windows(text, config).map(str::to_string).collect())
}

/// Splits a document's text into chunks tagged with the parent id and a
/// contiguous 0-based index.
pub fn build_chunks(document_id: DocumentId, text: &str, config: ChunkingConfig) -> Vec<Chunk> {
    (0u32..)
        .zip(windows(text, config))
        .map(|(chunk_index, window)| Chunk {
            document_id,
            chunk_index,
            text: window.to_string(),
        })
        .collect()
}
