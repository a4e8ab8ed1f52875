//! Lumina Parser - Document loading and chunking
//!
//! Turns an uploaded PDF into per-page text and cuts the concatenated text
//! into fixed-size, overlapping windows ready for embedding.
//!
//! Each loader implements the `DocumentParser` trait and produces a
//! `ParsedDocument`; `SlidingWindowSplitter` produces the `TextChunk`s.

use std::path::Path;
use thiserror::Error;

pub mod pdf;
pub mod splitter;

pub use pdf::PdfParser;
pub use splitter::{SlidingWindowSplitter, TextChunk};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while loading or splitting a document
#[derive(Error, Debug)]
pub enum ParserError {
    /// IO error while reading the file
    #[error("IO error reading file {path}: {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// PDF parsing error
    #[error("PDF parsing error: {0}")]
    PdfError(String),

    /// Splitter settings that cannot produce a sliding window
    #[error("Invalid chunking config: {0}")]
    InvalidChunkConfig(String),
}

pub type Result<T> = std::result::Result<T, ParserError>;

// ============================================================================
// Parsed Document Types
// ============================================================================

/// Text of one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number
    pub number: u32,

    /// Extracted text
    pub text: String,
}

/// A loaded document, page by page
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Original file path
    pub source: String,

    /// Pages in reading order
    pub pages: Vec<PageText>,
}

impl ParsedDocument {
    /// Create a document from raw page strings, numbering them from 1
    pub fn from_pages<I, S>(source: impl Into<String>, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source: source.into(),
            pages: pages
                .into_iter()
                .enumerate()
                .map(|(i, text)| PageText {
                    number: i as u32 + 1,
                    text: text.into(),
                })
                .collect(),
        }
    }

    /// Number of pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Pages joined by a newline, the text the splitter windows over
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether any page holds non-whitespace text
    pub fn has_text(&self) -> bool {
        self.pages.iter().any(|p| !p.text.trim().is_empty())
    }
}

// ============================================================================
// Parser Trait
// ============================================================================

/// Trait for document loaders
pub trait DocumentParser: Send + Sync {
    /// Parse a document from a file path
    fn parse(&self, path: &Path) -> Result<ParsedDocument>;
}

// ============================================================================
// Tests
// ============================================================================
