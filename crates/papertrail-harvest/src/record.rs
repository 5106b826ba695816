//! Paper metadata records as returned by the bulk search API

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Date format used by the API, the checkpoint file and the cursor.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a calendar date in `YYYY-MM-DD` form
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

/// Format a date in `YYYY-MM-DD` form
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// One paper as delivered upstream. Read-only to the harvester and written
/// to the corpus verbatim, so fields we do not model are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "paperId", default)]
    pub paper_id: Option<String>,
    #[serde(rename = "publicationDate", default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "openAccessPdf", default)]
    pub open_access_pdf: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// How a record's `publicationDate` sorts against the watermark
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordDate {
    /// Missing, null or empty: accepted without a sort position
    Absent,
    Valid(NaiveDate),
    /// Non-empty but unparsable
    Invalid(String),
}

impl Record {
    /// Stable identifier, if present and non-blank
    pub fn id(&self) -> Option<&str> {
        self.paper_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn date(&self) -> RecordDate {
        match self.publication_date.as_deref().map(str::trim) {
            None | Some("") => RecordDate::Absent,
            Some(s) => match parse_date(s) {
                Some(d) => RecordDate::Valid(d),
                None => RecordDate::Invalid(s.to_string()),
            },
        }
    }

    /// Single NDJSON line (with trailing newline)
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: &str) -> Record {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_bulk_search_item() {
        let r = record(
            r#"{"paperId":"abc","publicationDate":"2024-01-02","year":2024,"title":"T",
                "openAccessPdf":{"url":"https://x/y.pdf","status":"GREEN"}}"#,
        );
        assert_eq!(r.id(), Some("abc"));
        assert_eq!(
            r.date(),
            RecordDate::Valid(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        );
        assert_eq!(r.extra.get("year"), Some(&Value::from(2024)));
    }

    #[test]
    fn blank_id_is_missing() {
        assert_eq!(record(r#"{"paperId":"  "}"#).id(), None);
        assert_eq!(record(r#"{"title":"no id"}"#).id(), None);
        assert_eq!(record(r#"{"paperId":null}"#).id(), None);
    }

    #[test]
    fn date_classification() {
        assert_eq!(record(r#"{"paperId":"a"}"#).date(), RecordDate::Absent);
        assert_eq!(
            record(r#"{"paperId":"a","publicationDate":null}"#).date(),
            RecordDate::Absent
        );
        assert_eq!(
            record(r#"{"paperId":"a","publicationDate":""}"#).date(),
            RecordDate::Absent
        );
        assert_eq!(
            record(r#"{"paperId":"a","publicationDate":"2024-13-40"}"#).date(),
            RecordDate::Invalid("2024-13-40".into())
        );
        assert_eq!(
            record(r#"{"paperId":"a","publicationDate":"2024"}"#).date(),
            RecordDate::Invalid("2024".into())
        );
    }

    #[test]
    fn json_line_keeps_unknown_fields() {
        let r = record(r#"{"paperId":"a","venue":"NeurIPS"}"#);
        let line = r.to_json_line().unwrap();
        assert!(line.ends_with('\n'));
        let back: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(back["venue"], "NeurIPS");
        assert_eq!(back["paperId"], "a");
    }

    #[test]
    fn date_format_roundtrip() {
        let d = parse_date("2016-03-05").unwrap();
        assert_eq!(format_date(d), "2016-03-05");
        assert!(parse_date("05/03/2016").is_none());
    }
}
