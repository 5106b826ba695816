//! Search index: upsert documents, answer scored relevance queries
//!
//! [`MemoryIndex`] is an in-RAM tantivy index. Queries are parsed against
//! `content` (boost 3) and `title` (boost 1) and scored with tantivy's BM25;
//! date bounds become an inclusive range over the `publicationDate` fast field.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::ops::Bound;
use std::path::Path;

use chrono::{NaiveDate, NaiveTime};
use papertrail_harvest::parse_date;
use serde::{Deserialize, Serialize};
use tantivy::collector::{DocSetCollector, TopDocs};
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, QueryParser, RangeQuery, TermQuery};
use tantivy::schema::{
    FAST, Field, INDEXED, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing,
    TextOptions, Value,
};
use tantivy::snippet::SnippetGenerator;
use tantivy::tokenizer::{Language, LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::{
    DateTime, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, TantivyError, Term,
};

const TOKENIZER_NAME: &str = "papertrail_en";
const WRITER_HEAP_BYTES: usize = 50_000_000;
const CONTENT_BOOST: f32 = 3.0;
const TITLE_BOOST: f32 = 1.0;
const FRAGMENT_SIZE: usize = 150;
const HIGHLIGHT_PRE: &str = "<mark>";
const HIGHLIGHT_POST: &str = "</mark>";
pub const DEFAULT_SIZE: usize = 10;
pub const MAX_SIZE: usize = 100;

/// A searchable paper, as stored in the body file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    #[serde(rename = "paperId")]
    pub paper_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "publicationDate", default)]
    pub publication_date: Option<String>,
    #[serde(rename = "authorId", default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub document_content: String,
    #[serde(default)]
    pub indexed_date: Option<String>,
}

impl IndexedDocument {
    fn date(&self) -> Option<NaiveDate> {
        self.publication_date.as_deref().and_then(parse_date)
    }
}

/// One ranked result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "paperId")]
    pub paper_id: String,
    pub title: Option<String>,
    #[serde(rename = "publicationDate")]
    pub publication_date: Option<String>,
    #[serde(rename = "authorId")]
    pub author_id: Option<String>,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
}

impl SearchHit {
    fn from_doc(doc: IndexedDocument, score: f64) -> Self {
        Self {
            paper_id: doc.paper_id,
            title: doc.title,
            publication_date: doc.publication_date,
            author_id: doc.author_id,
            score,
            highlights: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Why a query was rejected or could not run
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    EmptyQuery,
    SizeOutOfRange(usize),
    NegativeMinScore(f64),
    InvertedDateRange { min: NaiveDate, max: NaiveDate },
    Engine(String),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyQuery => f.write_str("query must not be empty"),
            Self::SizeOutOfRange(n) => write!(f, "size must be between 1 and {MAX_SIZE}, got {n}"),
            Self::NegativeMinScore(s) => write!(f, "min_score must be >= 0, got {s}"),
            Self::InvertedDateRange { min, max } => {
                write!(f, "min_date {min} is after max_date {max}")
            }
            Self::Engine(e) => write!(f, "search failed: {e}"),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<TantivyError> for QueryError {
    fn from(e: TantivyError) -> Self {
        Self::Engine(e.to_string())
    }
}

/// Index construction, write or read failure
#[derive(Debug)]
pub enum IndexError {
    Io(io::Error),
    Engine(TantivyError),
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "{e}"),
            Self::Engine(e) => write!(f, "search index: {e}"),
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Engine(e) => Some(e),
        }
    }
}

impl From<io::Error> for IndexError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<TantivyError> for IndexError {
    fn from(e: TantivyError) -> Self {
        Self::Engine(e)
    }
}

/// Relevance query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub size: usize,
    /// Inclusive bounds on publication date
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    /// Order by date instead of score
    pub sort_by_date: Option<SortOrder>,
    /// Hits below this score are dropped
    pub min_score: Option<f64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            size: DEFAULT_SIZE,
            min_date: None,
            max_date: None,
            sort_by_date: None,
            min_score: None,
        }
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if self.query.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        if !(1..=MAX_SIZE).contains(&self.size) {
            return Err(QueryError::SizeOutOfRange(self.size));
        }
        if let Some(s) = self.min_score.filter(|s| *s < 0.0) {
            return Err(QueryError::NegativeMinScore(s));
        }
        if let (Some(min), Some(max)) = (self.min_date, self.max_date) {
            if min > max {
                return Err(QueryError::InvertedDateRange { min, max });
            }
        }
        Ok(())
    }
}

/// Stores documents and answers scored queries. Writes are staged until
/// [`commit`](SearchIndex::commit); reads only see committed documents.
pub trait SearchIndex {
    /// Insert or replace the document with the same `paper_id`
    fn upsert(&mut self, doc: IndexedDocument) -> Result<(), IndexError>;

    fn commit(&mut self) -> Result<(), IndexError>;

    fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, QueryError>;

    /// Every document, ordered by publication date (undated last), score 1
    fn all(&self, order: SortOrder) -> Result<Vec<SearchHit>, IndexError>;

    fn get(&self, paper_id: &str) -> Result<Option<IndexedDocument>, IndexError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cmp_dates(a: &Option<String>, b: &Option<String>, order: SortOrder) -> Ordering {
    let da = a.as_deref().and_then(parse_date);
    let db = b.as_deref().and_then(parse_date);
    match (da, db) {
        (Some(x), Some(y)) => match order {
            SortOrder::Asc => x.cmp(&y),
            SortOrder::Desc => y.cmp(&x),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort hits by date, undated last, ties by id
pub fn sort_by_date(hits: &mut [SearchHit], order: SortOrder) {
    hits.sort_by(|a, b| {
        cmp_dates(&a.publication_date, &b.publication_date, order)
            .then_with(|| a.paper_id.cmp(&b.paper_id))
    });
}

/// Midnight UTC, the granularity dates are indexed at
fn day(date: NaiveDate) -> DateTime {
    DateTime::from_timestamp_secs(date.and_time(NaiveTime::MIN).and_utc().timestamp())
}

/// Lowercased words with English stop words removed
fn analyzer() -> TextAnalyzer {
    let stop_words = StopWordFilter::new(Language::English)
        .unwrap_or_else(|| StopWordFilter::remove(Vec::<String>::new()));
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(stop_words)
        .build()
}

#[derive(Debug, Clone, Copy)]
struct Fields {
    paper_id: Field,
    title: Field,
    content: Field,
    published: Field,
    published_raw: Field,
    author_id: Field,
    indexed_date: Field,
}

impl Fields {
    fn schema() -> (Schema, Self) {
        let mut builder = Schema::builder();
        let analyzed = TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer(TOKENIZER_NAME)
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions),
            )
            .set_stored();

        let fields = Self {
            paper_id: builder.add_text_field("paperId", STRING | STORED),
            title: builder.add_text_field("title", analyzed.clone()),
            content: builder.add_text_field("content", analyzed),
            published: builder.add_date_field("publicationDate", INDEXED | FAST),
            published_raw: builder.add_text_field("publicationDateText", STORED),
            author_id: builder.add_text_field("authorId", STRING | STORED),
            indexed_date: builder.add_text_field("indexedDate", STORED),
        };
        (builder.build(), fields)
    }

    fn encode(self, doc: &IndexedDocument) -> TantivyDocument {
        let mut out = TantivyDocument::default();
        out.add_text(self.paper_id, &doc.paper_id);
        out.add_text(self.content, &doc.document_content);
        if let Some(title) = &doc.title {
            out.add_text(self.title, title);
        }
        if let Some(raw) = &doc.publication_date {
            out.add_text(self.published_raw, raw);
        }
        // Undated documents carry no date term and fall outside every date range
        if let Some(date) = doc.date() {
            out.add_date(self.published, day(date));
        }
        if let Some(author) = &doc.author_id {
            out.add_text(self.author_id, author);
        }
        if let Some(indexed) = &doc.indexed_date {
            out.add_text(self.indexed_date, indexed);
        }
        out
    }

    fn decode(self, doc: &TantivyDocument) -> IndexedDocument {
        let text = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        };
        IndexedDocument {
            paper_id: text(self.paper_id).unwrap_or_default(),
            title: text(self.title),
            publication_date: text(self.published_raw),
            author_id: text(self.author_id),
            document_content: text(self.content).unwrap_or_default(),
            indexed_date: text(self.indexed_date),
        }
    }
}

/// In-RAM tantivy index
pub struct MemoryIndex {
    index: Index,
    reader: IndexReader,
    writer: IndexWriter,
    fields: Fields,
}

impl MemoryIndex {
    pub fn new() -> Result<Self, IndexError> {
        let (schema, fields) = Fields::schema();
        let index = Index::create_in_ram(schema);
        index.tokenizers().register(TOKENIZER_NAME, analyzer());
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        let writer = index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
        Ok(Self {
            index,
            reader,
            writer,
            fields,
        })
    }

    /// Build from a body NDJSON file. Unparsable lines are logged and skipped.
    pub fn load_jsonl(path: &Path) -> Result<Self, IndexError> {
        let mut index = Self::new()?;
        let reader = BufReader::new(File::open(path)?);
        let mut skipped = 0usize;
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<IndexedDocument>(&line) {
                Ok(doc) => index.upsert(doc)?,
                Err(e) => {
                    log::warn!("{}:{}: skipping document: {e}", path.display(), idx + 1);
                    skipped += 1;
                }
            }
        }
        index.commit()?;
        log::info!(
            "Indexed {} documents from {} ({skipped} skipped)",
            index.len(),
            path.display()
        );
        Ok(index)
    }

    /// Free text against content and title. Malformed query syntax is
    /// dropped rather than rejected.
    fn parse_text(&self, text: &str) -> Box<dyn Query> {
        let mut parser = QueryParser::for_index(&self.index, vec![self.fields.content, self.fields.title]);
        parser.set_field_boost(self.fields.content, CONTENT_BOOST);
        parser.set_field_boost(self.fields.title, TITLE_BOOST);
        let (parsed, errors) = parser.parse_query_lenient(text);
        if let Some(first) = errors.first() {
            log::debug!("query {text:?}: {} parse warnings, first: {first}", errors.len());
        }
        parsed
    }

    fn date_range(&self, query: &SearchQuery) -> Option<RangeQuery> {
        if query.min_date.is_none() && query.max_date.is_none() {
            return None;
        }
        let bound = |date: Option<NaiveDate>| match date {
            Some(d) => Bound::Included(Term::from_field_date(self.fields.published, day(d))),
            None => Bound::Unbounded,
        };
        Some(RangeQuery::new(bound(query.min_date), bound(query.max_date)))
    }
}

impl SearchIndex for MemoryIndex {
    fn upsert(&mut self, doc: IndexedDocument) -> Result<(), IndexError> {
        self.writer
            .delete_term(Term::from_field_text(self.fields.paper_id, &doc.paper_id));
        self.writer.add_document(self.fields.encode(&doc))?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), IndexError> {
        self.writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, QueryError> {
        query.validate()?;
        let searcher = self.reader.searcher();

        let text = self.parse_text(&query.query);
        let combined: Box<dyn Query> = match self.date_range(query) {
            Some(range) => Box::new(BooleanQuery::new(vec![
                (Occur::Must, text),
                (Occur::Must, Box::new(range) as Box<dyn Query>),
            ])),
            None => text,
        };

        // Date ordering applies to every match before the size cut
        let limit = match query.sort_by_date {
            Some(_) => usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX).max(1),
            None => query.size,
        };
        let top = searcher.search(&*combined, &TopDocs::with_limit(limit))?;

        let mut matched = Vec::with_capacity(top.len());
        for (score, addr) in top {
            let stored = searcher.doc::<TantivyDocument>(addr)?;
            let doc = self.fields.decode(&stored);
            matched.push((stored, doc, f64::from(score)));
        }
        if let Some(order) = query.sort_by_date {
            matched.sort_by(|(_, a, _), (_, b, _)| {
                cmp_dates(&a.publication_date, &b.publication_date, order)
            });
        }
        matched.truncate(query.size);

        let mut snippets = SnippetGenerator::create(&searcher, &*combined, self.fields.content)?;
        snippets.set_max_num_chars(FRAGMENT_SIZE);

        Ok(matched
            .into_iter()
            .filter(|(_, _, score)| query.min_score.is_none_or(|min| *score >= min))
            .map(|(stored, doc, score)| {
                let mut snippet = snippets.snippet_from_doc(&stored);
                snippet.set_snippet_prefix_postfix(HIGHLIGHT_PRE, HIGHLIGHT_POST);
                let html = snippet.to_html();
                SearchHit {
                    highlights: if html.is_empty() { Vec::new() } else { vec![html] },
                    ..SearchHit::from_doc(doc, score)
                }
            })
            .collect())
    }

    fn all(&self, order: SortOrder) -> Result<Vec<SearchHit>, IndexError> {
        let searcher = self.reader.searcher();
        let addrs = searcher.search(&AllQuery, &DocSetCollector)?;
        let mut hits = Vec::with_capacity(addrs.len());
        for addr in addrs {
            let doc = self.fields.decode(&searcher.doc::<TantivyDocument>(addr)?);
            hits.push(SearchHit::from_doc(doc, 1.0));
        }
        sort_by_date(&mut hits, order);
        Ok(hits)
    }

    fn get(&self, paper_id: &str) -> Result<Option<IndexedDocument>, IndexError> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(
            Term::from_field_text(self.fields.paper_id, paper_id),
            IndexRecordOption::Basic,
        );
        let Some((_, addr)) = searcher.search(&query, &TopDocs::with_limit(1))?.pop() else {
            return Ok(None);
        };
        Ok(Some(self.fields.decode(&searcher.doc::<TantivyDocument>(addr)?)))
    }

    fn len(&self) -> usize {
        usize::try_from(self.reader.searcher().num_docs()).unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, title: &str, date: Option<&str>, content: &str) -> IndexedDocument {
        IndexedDocument {
            paper_id: id.into(),
            title: Some(title.into()),
            publication_date: date.map(String::from),
            author_id: None,
            document_content: content.into(),
            indexed_date: None,
        }
    }

    fn index_of(docs: Vec<IndexedDocument>) -> MemoryIndex {
        let mut index = MemoryIndex::new().unwrap();
        for d in docs {
            index.upsert(d).unwrap();
        }
        index.commit().unwrap();
        index
    }

    fn sample() -> MemoryIndex {
        index_of(vec![
            doc(
                "gnn",
                "Graph Neural Networks",
                Some("2021-05-01"),
                "We study graph neural networks for node classification on citation graphs.",
            ),
            doc(
                "cnn",
                "Convolutional Networks",
                Some("2019-03-01"),
                "Convolutional neural networks for image recognition.",
            ),
            doc(
                "db",
                "Query Optimization",
                Some("2023-01-01"),
                "Cost based query optimization in relational databases.",
            ),
        ])
    }

    fn ids(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.paper_id.as_str()).collect()
    }

    #[test]
    fn ranks_by_relevance() {
        let index = sample();
        let hits = index.search(&SearchQuery::new("graph neural")).unwrap();
        assert_eq!(ids(&hits)[0], "gnn");
        assert!(hits.iter().all(|h| h.score > 0.0));
        assert!(hits[0].highlights[0].contains("<mark>graph</mark>"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let hits = sample().search(&SearchQuery::new("DATABASES")).unwrap();
        assert_eq!(ids(&hits), vec!["db"]);
        assert!(hits[0].highlights[0].contains("<mark>databases</mark>"));
    }

    #[test]
    fn content_outweighs_title() {
        let index = index_of(vec![
            doc("t", "transformers", None, "unrelated body text"),
            doc("c", "unrelated", None, "transformers everywhere in this body"),
        ]);
        let hits = index.search(&SearchQuery::new("transformers")).unwrap();
        assert_eq!(ids(&hits), vec!["c", "t"]);
        assert!(hits[0].score > hits[1].score);
        // Title-only match has nothing to highlight in the body
        assert!(hits[1].highlights.is_empty());
    }

    #[test]
    fn date_filter_and_sort() {
        let index = sample();
        let query = SearchQuery {
            min_date: parse_date("2020-01-01"),
            sort_by_date: Some(SortOrder::Asc),
            ..SearchQuery::new("networks optimization")
        };
        assert_eq!(ids(&index.search(&query).unwrap()), vec!["gnn", "db"]);

        let query = SearchQuery {
            sort_by_date: Some(SortOrder::Desc),
            ..SearchQuery::new("networks")
        };
        assert_eq!(ids(&index.search(&query).unwrap()), vec!["gnn", "cnn"]);
    }

    #[test]
    fn date_bounds_are_inclusive_and_skip_undated() {
        let mut index = sample();
        index.upsert(doc("undated", "Neural", None, "neural networks")).unwrap();
        index.commit().unwrap();

        let query = SearchQuery {
            min_date: parse_date("2019-03-01"),
            max_date: parse_date("2021-05-01"),
            ..SearchQuery::new("networks")
        };
        let mut found = ids(&index.search(&query).unwrap())
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        found.sort();
        assert_eq!(found, vec!["cnn", "gnn"]);

        let query = SearchQuery {
            max_date: parse_date("2019-03-01"),
            ..SearchQuery::new("networks")
        };
        assert_eq!(ids(&index.search(&query).unwrap()), vec!["cnn"]);
    }

    #[test]
    fn size_and_min_score() {
        let index = sample();
        let query = SearchQuery {
            size: 1,
            ..SearchQuery::new("networks")
        };
        assert_eq!(index.search(&query).unwrap().len(), 1);

        let query = SearchQuery {
            min_score: Some(1_000.0),
            ..SearchQuery::new("networks")
        };
        assert!(index.search(&query).unwrap().is_empty());
    }

    #[test]
    fn rejects_invalid_queries() {
        let index = sample();
        assert_eq!(index.search(&SearchQuery::new("  ")), Err(QueryError::EmptyQuery));
        let q = SearchQuery {
            size: 101,
            ..SearchQuery::new("x")
        };
        assert_eq!(index.search(&q), Err(QueryError::SizeOutOfRange(101)));
        let q = SearchQuery {
            min_score: Some(-1.0),
            ..SearchQuery::new("x")
        };
        assert!(index.search(&q).is_err());
    }

    #[test]
    fn stop_word_query_matches_nothing() {
        assert!(sample().search(&SearchQuery::new("the of")).unwrap().is_empty());
    }

    #[test]
    fn upsert_replaces() {
        let mut index = sample();
        index
            .upsert(doc("gnn", "Renamed", Some("2021-05-01"), "completely different text"))
            .unwrap();
        index.commit().unwrap();
        assert_eq!(index.len(), 3);
        assert!(index.search(&SearchQuery::new("graph")).unwrap().is_empty());
        assert_eq!(ids(&index.search(&SearchQuery::new("different")).unwrap()), vec!["gnn"]);
        let stored = index.get("gnn").unwrap().unwrap();
        assert_eq!(stored.title.as_deref(), Some("Renamed"));
        assert_eq!(stored.publication_date.as_deref(), Some("2021-05-01"));
    }

    #[test]
    fn duplicate_in_one_batch_keeps_last() {
        let index = index_of(vec![
            doc("a", "First", None, "first version"),
            doc("a", "Second", None, "second version"),
        ]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("a").unwrap().unwrap().title.as_deref(), Some("Second"));
    }

    #[test]
    fn staged_writes_hidden_until_commit() {
        let mut index = MemoryIndex::new().unwrap();
        index.upsert(doc("a", "A", None, "alpha")).unwrap();
        assert!(index.is_empty());
        assert!(index.get("a").unwrap().is_none());
        index.commit().unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn all_sorted_by_date() {
        let mut index = sample();
        index.upsert(doc("undated", "x", None, "y")).unwrap();
        index.commit().unwrap();
        assert_eq!(ids(&index.all(SortOrder::Desc).unwrap()), vec!["db", "gnn", "cnn", "undated"]);
        assert_eq!(ids(&index.all(SortOrder::Asc).unwrap()), vec!["cnn", "gnn", "db", "undated"]);
        assert!(index.all(SortOrder::Asc).unwrap().iter().all(|h| h.score == 1.0));
    }

    #[test]
    fn load_jsonl_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.jsonl");
        std::fs::write(
            &path,
            "{\"paperId\":\"a\",\"title\":\"A\",\"document_content\":\"alpha\"}\n{broken\n\n",
        )
        .unwrap();
        let index = MemoryIndex::load_jsonl(&path).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.get("a").unwrap().is_some());
    }
}
