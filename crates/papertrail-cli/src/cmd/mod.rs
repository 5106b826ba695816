//! Subcommand implementations

pub mod enrich;
pub mod harvest;
pub mod papers;
pub mod prefs;
pub mod search;
pub mod status;

use chrono::NaiveDate;

/// clap value parser for `YYYY-MM-DD` dates
pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("Invalid date format: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_formats() {
        assert_eq!(
            parse_date("2024-02-29"),
            Ok(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert!(parse_date("2023-02-29").is_err());
        assert!(parse_date("29/02/2024").is_err());
    }
}
