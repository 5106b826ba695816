//! Papertrail Index - downstream pipeline over the harvested corpus
//!
//! Full-text extraction from open-access PDFs, the enrichment pipeline that
//! writes the body file, an in-memory search index, and per-user
//! personalization of search results.

pub mod enrich;
pub mod extract;
pub mod index;
pub mod personalize;

// Re-exports
pub use enrich::{EnrichSummary, enrich};
pub use extract::{ExtractError, PdfTextExtractor, TextExtractor, pdf_url};
pub use index::{IndexError, IndexedDocument, MemoryIndex, QueryError, SearchHit, SearchIndex, SearchQuery, SortOrder};
pub use personalize::{InteractionCounters, RankedHit, UserPreferences, UserProfile, recommend, rerank};
