//! Page fetcher: paging through the sorted bulk search endpoint
//!
//! Each fetch starts at a lower-bound date and follows continuation tokens
//! until the upstream reports none remain. Continuation requests are the
//! base request plus the latest token only.

use chrono::NaiveDate;
use papertrail_core::{HttpError, get_text, retry_with_backoff};
use serde::Deserialize;

use crate::record::{Record, format_date};

/// Semantic Scholar bulk paper search
pub const DEFAULT_API_URL: &str = "https://api.semanticscholar.org/graph/v1/paper/search/bulk";

/// Fields requested when none are configured
pub const DEFAULT_FIELDS: &[&str] = &[
    "paperId",
    "publicationDate",
    "year",
    "title",
    "openAccessPdf",
];

/// One page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub lower_bound: NaiveDate,
    /// Continuation token from the previous page; `None` for the first page
    pub token: Option<String>,
}

/// One page of results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Upstream estimate of the total result count
    pub total: Option<u64>,
    pub records: Vec<Record>,
    /// Continuation token; `None` marks the end of the stream
    pub token: Option<String>,
}

/// Why a page request failed. Any failure abandons the whole fetch attempt.
#[derive(Debug)]
pub enum FetchError {
    Http(HttpError),
    Json(serde_json::Error),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "{e}"),
            Self::Json(e) => write!(f, "malformed response: {e}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<HttpError> for FetchError {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

/// Source of externally sorted record pages
pub trait PageFetcher {
    fn fetch_page(&self, request: &PageRequest) -> Result<Page, FetchError>;
}

impl<T: PageFetcher + ?Sized> PageFetcher for &T {
    fn fetch_page(&self, request: &PageRequest) -> Result<Page, FetchError> {
        (**self).fetch_page(request)
    }
}

/// Lazy page sequence for one fetch attempt.
///
/// Yields pages until one arrives without a token. The first error is
/// yielded once and ends the sequence.
pub struct Pages<'a, F: ?Sized> {
    fetcher: &'a F,
    lower_bound: NaiveDate,
    next_token: Option<String>,
    done: bool,
}

/// Start a fetch attempt at `lower_bound`
pub fn pages<F: PageFetcher + ?Sized>(fetcher: &F, lower_bound: NaiveDate) -> Pages<'_, F> {
    Pages {
        fetcher,
        lower_bound,
        next_token: None,
        done: false,
    }
}

impl<F: PageFetcher + ?Sized> Iterator for Pages<'_, F> {
    type Item = Result<Page, FetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let request = PageRequest {
            lower_bound: self.lower_bound,
            token: self.next_token.take(),
        };
        match self.fetcher.fetch_page(&request) {
            Ok(page) => {
                match page.token.as_deref().filter(|t| !t.is_empty()) {
                    Some(t) => self.next_token = Some(t.to_string()),
                    None => self.done = true,
                }
                Some(Ok(page))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Bulk search response body
#[derive(Debug, Deserialize)]
struct BulkSearchResponse {
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    data: Vec<Record>,
    #[serde(default)]
    token: Option<String>,
}

/// Parse a bulk search response body into a page
pub fn parse_page(body: &str) -> Result<Page, FetchError> {
    let resp: BulkSearchResponse = serde_json::from_str(body).map_err(FetchError::Json)?;
    Ok(Page {
        total: resp.total,
        records: resp.data,
        token: resp.token,
    })
}

/// Static parameters of the upstream query
#[derive(Debug, Clone)]
pub struct BulkSearchConfig {
    pub api_url: String,
    pub query: String,
    pub fields: Vec<String>,
    /// Optional inclusive upper bound on publication date
    pub until: Option<NaiveDate>,
    pub api_key: Option<String>,
}

impl Default for BulkSearchConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            query: "computer science".to_string(),
            fields: DEFAULT_FIELDS.iter().map(|s| (*s).to_string()).collect(),
            until: None,
            api_key: None,
        }
    }
}

/// HTTP page fetcher for the bulk search endpoint
#[derive(Debug, Clone)]
pub struct BulkSearchFetcher {
    config: BulkSearchConfig,
}

impl BulkSearchFetcher {
    pub fn new(config: BulkSearchConfig) -> Self {
        Self { config }
    }

    /// Query string pairs for `request`, sorted ascending by publication date
    pub fn query_pairs(&self, request: &PageRequest) -> Vec<(String, String)> {
        let range = match self.config.until {
            Some(until) => format!("{}:{}", format_date(request.lower_bound), format_date(until)),
            None => format!("{}:", format_date(request.lower_bound)),
        };
        let mut pairs = vec![
            ("query".to_string(), self.config.query.clone()),
            ("fields".to_string(), self.config.fields.join(",")),
            ("publicationDateOrYear".to_string(), range),
            ("sort".to_string(), "publicationDate:asc".to_string()),
        ];
        if let Some(token) = &request.token {
            pairs.push(("token".to_string(), token.clone()));
        }
        pairs
    }
}

impl PageFetcher for BulkSearchFetcher {
    fn fetch_page(&self, request: &PageRequest) -> Result<Page, FetchError> {
        let pairs = self.query_pairs(request);
        let headers: Vec<(&'static str, String)> = self
            .config
            .api_key
            .iter()
            .map(|k| ("x-api-key", k.clone()))
            .collect();
        let body = retry_with_backoff("bulk search", || {
            get_text(&self.config.api_url, &pairs, &headers)
        })?;
        parse_page(&body)
    }
}
