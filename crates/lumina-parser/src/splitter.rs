//! Fixed-size sliding-window text splitter
//!
//! Windows are measured in Unicode scalar values and ignore sentence and
//! paragraph boundaries. Consecutive windows share exactly `overlap`
//! characters; every window but the last is exactly `chunk_size` long.

use crate::{ParsedDocument, ParserError, Result};

/// A window of document text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Chunk content
    pub content: String,

    /// Chunk index within the document
    pub index: u32,

    /// Character offset of the first character in the joined text
    pub start_offset: usize,

    /// Character offset one past the last character
    pub end_offset: usize,

    /// Page on which the chunk starts
    pub page: u32,
}

impl TextChunk {
    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }
}

/// Sliding-window splitter
#[derive(Debug, Clone, Copy)]
pub struct SlidingWindowSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl SlidingWindowSplitter {
    /// Create a splitter; the overlap must be smaller than the window
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ParserError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(ParserError::InvalidChunkConfig(format!(
                "overlap {overlap} must be smaller than chunk size {chunk_size}"
            )));
        }

        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split the concatenated page text of a document
    pub fn split_document(&self, doc: &ParsedDocument) -> Vec<TextChunk> {
        // Character offset at which each page starts in the joined text
        let mut page_starts = Vec::with_capacity(doc.pages.len());
        let mut offset = 0usize;
        for page in &doc.pages {
            page_starts.push((offset, page.number));
            offset += page.text.chars().count() + 1;
        }

        let mut chunks = self.split_text(&doc.full_text());
        for chunk in &mut chunks {
            chunk.page = page_starts
                .iter()
                .take_while(|(start, _)| *start <= chunk.start_offset)
                .last()
                .map(|(_, number)| *number)
                .unwrap_or(1);
        }
        chunks
    }

    /// Split a single string; every chunk is attributed to page 1
    pub fn split_text(&self, text: &str) -> Vec<TextChunk> {
        // Byte position of every character boundary, including the end
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = boundaries.len() - 1;

        let mut chunks = Vec::new();
        if total == 0 {
            return chunks;
        }

        let step = self.chunk_size - self.overlap;
        let mut start = 0usize;

        loop {
            let end = (start + self.chunk_size).min(total);
            chunks.push(TextChunk {
                content: text[boundaries[start]..boundaries[end]].to_string(),
                index: chunks.len() as u32,
                start_offset: start,
                end_offset: end,
                page: 1,
            });

            if end == total {
                break;
            }
            start += step;
        }

        chunks
    }
}

impl Default for SlidingWindowSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}
