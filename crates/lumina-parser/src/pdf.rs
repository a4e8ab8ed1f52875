//! PDF document parser using pdf-extract
//!
//! Extracts text content from PDF files page by page.

use std::path::Path;

use crate::{DocumentParser, PageText, ParsedDocument, ParserError, Result};

/// PDF document parser
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfParser;

impl PdfParser {
    /// Create a new PDF parser
    pub fn new() -> Self {
        Self
    }

    /// Parse PDF bytes already in memory
    pub fn parse_bytes(&self, bytes: &[u8], source: impl Into<String>) -> Result<ParsedDocument> {
        let source = source.into();

        if !has_pdf_header(bytes) {
            return Err(ParserError::PdfError(format!(
                "{source} is not a PDF file (missing %PDF header)"
            )));
        }

        // pdf-extract panics on some malformed inputs instead of returning an error
        let extracted =
            std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
                .map_err(|_| ParserError::PdfError(format!("{source} could not be decoded")))?
                .map_err(|e| ParserError::PdfError(e.to_string()))?;

        let pages: Vec<PageText> = extracted
            .into_iter()
            .enumerate()
            .map(|(i, text)| PageText {
                number: i as u32 + 1,
                text,
            })
            .collect();
        tracing::debug!(source = %source, pages = pages.len(), "PDF text extracted");

        Ok(ParsedDocument { source, pages })
    }
}

impl DocumentParser for PdfParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let bytes = std::fs::read(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        self.parse_bytes(&bytes, path.display().to_string())
    }
}

/// PDF files must carry `%PDF-` within their first kilobyte
fn has_pdf_header(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(5).any(|w| w == b"%PDF-")
}
