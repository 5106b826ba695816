//! Papers subcommand - list enriched papers or a user's recommendations

use anyhow::Result;
use clap::Args;
use papertrail_index::{SearchIndex, SortOrder, recommend};

use super::search::{SortArg, open_index, open_preferences, print_hits};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct PapersArgs {
    /// Publication date order
    #[arg(long, value_enum, default_value = "desc")]
    pub sort: SortArg,

    /// Maximum number of papers shown
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,

    /// Recommend papers for this user instead of listing by date
    #[arg(short, long)]
    pub user: Option<String>,

    /// Print one JSON object per paper instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: PapersArgs, config: &Config) -> Result<()> {
    let index = open_index(config)?;
    let mut papers = index.all(SortOrder::from(args.sort))?;

    if let Some(user) = &args.user {
        let prefs = open_preferences(config)?;
        papers = recommend(&papers, &prefs, user, args.limit);
        log::info!("{} recommendations for {user}", papers.len());
    } else {
        papers.truncate(args.limit);
    }

    if args.json {
        for paper in &papers {
            println!("{}", serde_json::to_string(paper)?);
        }
    } else {
        print_hits(papers.iter().map(|p| (p, p.score)));
    }
    Ok(())
}
