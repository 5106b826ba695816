//! Prefs subcommand - record user interactions that drive personalization

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use papertrail_index::{UserPreferences, UserProfile};

use super::search::open_preferences;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct PrefsArgs {
    /// User id
    pub user: String,

    #[command(subcommand)]
    pub action: PrefsAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PrefsAction {
    /// Record time spent reading a paper
    View { paper: String, seconds: f64 },
    /// Toggle a bookmark
    Bookmark { paper: String },
    /// Toggle the downloaded mark
    Download { paper: String },
    /// Toggle "show more like this"
    More { paper: String },
    /// Toggle "show less like this"
    Less { paper: String },
    /// Toggle following an author
    Follow { author: String },
    /// Toggle blocking an author
    Block { author: String },
    /// Print the user's profile
    Show,
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

/// Apply a mutating action; returns the message to report, or `None` for `Show`
fn apply(prefs: &mut UserPreferences, user: &str, action: &PrefsAction) -> Option<String> {
    let msg = match action {
        PrefsAction::View { paper, seconds } => {
            if prefs.record_view(user, paper, *seconds) {
                format!("recorded {seconds:.0}s view of {paper}")
            } else {
                format!("ignored view of {paper}: duration {seconds}s out of range")
            }
        }
        PrefsAction::Bookmark { paper } => {
            format!("bookmark {paper}: {}", on_off(prefs.toggle_bookmark(user, paper)))
        }
        PrefsAction::Download { paper } => {
            format!("download {paper}: {}", on_off(prefs.toggle_download(user, paper)))
        }
        PrefsAction::More { paper } => {
            format!("show more {paper}: {}", on_off(prefs.toggle_show_more(user, paper)))
        }
        PrefsAction::Less { paper } => {
            format!("show less {paper}: {}", on_off(prefs.toggle_show_less(user, paper)))
        }
        PrefsAction::Follow { author } => format!(
            "follow {author}: {}",
            on_off(prefs.toggle_follow_author(user, author))
        ),
        PrefsAction::Block { author } => format!(
            "block {author}: {}",
            on_off(prefs.toggle_block_author(user, author))
        ),
        PrefsAction::Show => return None,
    };
    Some(msg)
}

fn join(items: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    let items: Vec<String> = items.into_iter().map(|s| s.as_ref().to_string()).collect();
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

fn print_profile(user: &str, profile: &UserProfile) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new(user).fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    let views = profile
        .view_counts
        .iter()
        .map(|(paper, count)| {
            let secs = profile.view_times.get(paper).copied().unwrap_or_default();
            format!("{paper} ×{count} ({secs:.0}s)")
        });
    table.add_row(vec!["Views".to_string(), join(views)]);
    table.add_row(vec!["Bookmarks".to_string(), join(&profile.bookmarks)]);
    table.add_row(vec!["Downloads".to_string(), join(&profile.downloads)]);
    table.add_row(vec!["Show more".to_string(), join(&profile.show_more)]);
    table.add_row(vec!["Show less".to_string(), join(&profile.show_less)]);
    table.add_row(vec!["Following".to_string(), join(&profile.followed_authors)]);
    table.add_row(vec!["Blocked".to_string(), join(&profile.blocked_authors)]);
    println!("{table}");
}

pub fn run(args: PrefsArgs, config: &Config) -> Result<()> {
    let path = &config.paths.preferences;
    let mut prefs = open_preferences(config)?;

    let Some(msg) = apply(&mut prefs, &args.user, &args.action) else {
        match prefs.profile(&args.user) {
            Some(profile) => print_profile(&args.user, profile),
            None => println!("No interactions recorded for {}", args.user),
        }
        return Ok(());
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create directory {}", parent.display()))?;
    }
    prefs
        .save(path)
        .with_context(|| format!("Cannot write preferences {}", path.display()))?;
    log::info!("{}: {msg}", args.user);
    println!("{msg}");
    Ok(())
}
