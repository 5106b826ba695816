//! Search subcommand - query the body file, optionally personalized

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use papertrail_index::{
    MemoryIndex, RankedHit, SearchHit, SearchIndex, SearchQuery, SortOrder, UserPreferences,
    rerank,
};

use super::parse_date;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Free-text query
    pub query: String,

    /// Number of hits (1-100)
    #[arg(short = 'n', long, default_value_t = 10)]
    pub size: usize,

    /// Earliest publication date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub min_date: Option<NaiveDate>,

    /// Latest publication date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub max_date: Option<NaiveDate>,

    /// Order hits by publication date instead of score
    #[arg(long, value_enum)]
    pub sort: Option<SortArg>,

    /// Drop hits scoring below this
    #[arg(long)]
    pub min_score: Option<f64>,

    /// Re-rank for this user's interactions
    #[arg(short, long)]
    pub user: Option<String>,

    /// Print one JSON object per hit instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum SortArg {
    Asc,
    Desc,
}

impl From<SortArg> for SortOrder {
    fn from(s: SortArg) -> Self {
        match s {
            SortArg::Asc => SortOrder::Asc,
            SortArg::Desc => SortOrder::Desc,
        }
    }
}

/// Index built from the body file
pub(crate) fn open_index(config: &Config) -> Result<MemoryIndex> {
    let body = &config.paths.body;
    MemoryIndex::load_jsonl(body).with_context(|| {
        format!(
            "Cannot read body file {} (run `papertrail enrich` first)",
            body.display()
        )
    })
}

pub(crate) fn open_preferences(config: &Config) -> Result<UserPreferences> {
    let path = &config.paths.preferences;
    UserPreferences::load(path)
        .with_context(|| format!("Cannot read preferences {}", path.display()))
}

/// Hits as a table on stdout; `score` is the plain or personalized score
pub(crate) fn print_hits<'a>(rows: impl IntoIterator<Item = (&'a SearchHit, f64)>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("#").fg(Color::Cyan),
            Cell::new("Paper").fg(Color::Cyan),
            Cell::new("Date").fg(Color::Cyan),
            Cell::new("Title").fg(Color::Cyan),
            Cell::new("Score").fg(Color::Cyan),
        ]);
    let mut count = 0;
    for (rank, (hit, score)) in rows.into_iter().enumerate() {
        let mut title = hit.title.clone().unwrap_or_default();
        for fragment in &hit.highlights {
            title.push_str("\n  … ");
            title.push_str(fragment);
        }
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(&hit.paper_id),
            Cell::new(hit.publication_date.as_deref().unwrap_or("-")),
            Cell::new(title),
            Cell::new(format!("{score:.3}")),
        ]);
        count += 1;
    }
    if count == 0 {
        println!("No results");
    } else {
        println!("{table}");
    }
}

fn print_json<T: serde::Serialize>(items: &[T]) -> Result<()> {
    for item in items {
        println!("{}", serde_json::to_string(item)?);
    }
    Ok(())
}

pub fn run(args: SearchArgs, config: &Config) -> Result<()> {
    let query = SearchQuery {
        size: args.size,
        min_date: args.min_date,
        max_date: args.max_date,
        sort_by_date: args.sort.map(SortOrder::from),
        min_score: args.min_score,
        ..SearchQuery::new(args.query)
    };
    query.validate()?;

    let index = open_index(config)?;
    let hits = index.search(&query)?;
    log::info!("{} hits for {:?}", hits.len(), query.query);

    match args.user {
        Some(user) => {
            let prefs = open_preferences(config)?;
            let ranked: Vec<RankedHit> = rerank(hits, &prefs, &user);
            if args.json {
                print_json(&ranked)
            } else {
                print_hits(ranked.iter().map(|r| (&r.hit, r.final_score)));
                Ok(())
            }
        }
        None if args.json => print_json(&hits),
        None => {
            print_hits(hits.iter().map(|h| (h, h.score)));
            Ok(())
        }
    }
}
