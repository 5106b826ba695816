//! Full-text extraction: PDF URL → bytes → plain text

use papertrail_core::{HttpError, get_bytes_capped, retry_with_backoff};
use serde_json::Value;

/// Largest PDF download accepted by default
pub const DEFAULT_MAX_PDF_BYTES: u64 = 50 * 1024 * 1024;

/// Why a document yielded no text. Never fatal to the enrichment pipeline.
#[derive(Debug)]
pub enum ExtractError {
    Http(HttpError),
    Pdf(String),
    /// Parsed, but no text layer (scanned images, empty document)
    NoText,
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "download failed: {e}"),
            Self::Pdf(e) => write!(f, "PDF extraction failed: {e}"),
            Self::NoText => f.write_str("document has no extractable text"),
        }
    }
}

impl std::error::Error for ExtractError {}

impl From<HttpError> for ExtractError {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

/// Given a URL, returns the document's text
pub trait TextExtractor {
    fn extract(&self, url: &str) -> Result<String, ExtractError>;
}

impl<T: TextExtractor + ?Sized> TextExtractor for &T {
    fn extract(&self, url: &str) -> Result<String, ExtractError> {
        (**self).extract(url)
    }
}

/// Downloads over the shared HTTP client and extracts with `pdf-extract`
#[derive(Debug, Clone)]
pub struct PdfTextExtractor {
    max_bytes: u64,
}

impl PdfTextExtractor {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PDF_BYTES)
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, url: &str) -> Result<String, ExtractError> {
        let bytes = retry_with_backoff("pdf download", || get_bytes_capped(url, self.max_bytes))?;
        text_from_pdf(&bytes)
    }
}

/// Extract and normalize the text layer of an in-memory PDF
pub fn text_from_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let raw = pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let text = collapse_whitespace(&raw);
    if text.is_empty() {
        return Err(ExtractError::NoText);
    }
    Ok(text)
}

/// Collapse whitespace runs (PDF line breaks, column gaps) into single spaces
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// PDF link of a record's `openAccessPdf` field: either `{"url": ...}` or a
/// bare string. Anything else, or a blank URL, means no PDF.
pub fn pdf_url(field: Option<&Value>) -> Option<&str> {
    let url = match field? {
        Value::Object(obj) => obj.get("url")?.as_str()?,
        Value::String(s) => s.as_str(),
        _ => return None,
    };
    let url = url.trim();
    (!url.is_empty()).then_some(url)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn pdf_url_shapes() {
        let obj = json!({"url": "https://arxiv.org/pdf/1.pdf", "status": "GREEN"});
        assert_eq!(pdf_url(Some(&obj)), Some("https://arxiv.org/pdf/1.pdf"));
        let bare = json!("https://x.org/a.pdf");
        assert_eq!(pdf_url(Some(&bare)), Some("https://x.org/a.pdf"));
    }

    #[test]
    fn pdf_url_absent() {
        assert_eq!(pdf_url(None), None);
        assert_eq!(pdf_url(Some(&Value::Null)), None);
        assert_eq!(pdf_url(Some(&json!({"status": "CLOSED"}))), None);
        assert_eq!(pdf_url(Some(&json!({"url": null}))), None);
        assert_eq!(pdf_url(Some(&json!({"url": ""}))), None);
        assert_eq!(pdf_url(Some(&json!(42))), None);
    }

    #[test]
    fn whitespace_collapsed() {
        assert_eq!(collapse_whitespace("  Deep\n\nlearning\t is  "), "Deep learning is");
    }

    #[test]
    fn garbage_bytes_are_pdf_error() {
        assert!(matches!(text_from_pdf(b"not a pdf"), Err(ExtractError::Pdf(_))));
    }

    /// Run with: cargo test -p papertrail-index -- --ignored live_pdf_extract
    #[test]
    #[ignore]
    fn live_pdf_extract() {
        let text = PdfTextExtractor::default()
            .extract("https://arxiv.org/pdf/1706.03762")
            .expect("extraction should succeed");
        assert!(text.contains("attention"));
    }
}
