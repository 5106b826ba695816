//! Personalization: per-user interaction state, score multipliers,
//! re-ranking and recommendations

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::index::{SearchHit, SortOrder, sort_by_date};

/// Views at or above this duration are treated as idle tabs and ignored
pub const MAX_VIEW_SECS: f64 = 7200.0;

/// Score assigned to papers by blocked authors
pub const BLOCKED_SCORE: f64 = -1000.0;

/// Interaction state of one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    /// paper → total seconds viewed
    pub view_times: BTreeMap<String, f64>,
    pub view_counts: BTreeMap<String, u32>,
    pub bookmarks: BTreeSet<String>,
    pub downloads: BTreeSet<String>,
    pub show_more: BTreeSet<String>,
    pub show_less: BTreeSet<String>,
    pub followed_authors: BTreeSet<String>,
    pub blocked_authors: BTreeSet<String>,
    pub last_interactions: BTreeMap<String, DateTime<Utc>>,
}

fn toggle(set: &mut BTreeSet<String>, key: &str) -> bool {
    if set.remove(key) {
        return false;
    }
    set.insert(key.to_string());
    true
}

impl UserProfile {
    pub fn counters(&self, paper_id: &str) -> InteractionCounters {
        InteractionCounters {
            view_seconds: self.view_times.get(paper_id).copied().unwrap_or(0.0),
            view_count: self.view_counts.get(paper_id).copied().unwrap_or(0),
            bookmarked: self.bookmarks.contains(paper_id),
            downloaded: self.downloads.contains(paper_id),
            show_more: self.show_more.contains(paper_id),
            show_less: self.show_less.contains(paper_id),
        }
    }

    fn is_blocked(&self, author: Option<&str>) -> bool {
        author.is_some_and(|a| self.blocked_authors.contains(a))
    }

    fn is_followed(&self, author: Option<&str>) -> bool {
        author.is_some_and(|a| self.followed_authors.contains(a))
    }

    /// Engagement with one paper, roughly in [-0.15, 1.0]; papers by blocked
    /// authors score [`BLOCKED_SCORE`].
    pub fn engagement_score(&self, paper_id: &str, author_id: Option<&str>) -> f64 {
        if self.is_blocked(author_id) {
            return BLOCKED_SCORE;
        }
        let c = self.counters(paper_id);
        let mut score = (f64::from(c.view_count) / 5.0).min(1.0) * 0.15;
        score += (c.view_seconds / 1800.0).min(1.0) * 0.25;
        if c.bookmarked {
            score += 0.15;
        }
        if c.downloaded {
            score += 0.15;
        }
        if c.show_more {
            score += 0.15;
        }
        if c.show_less {
            score -= 0.15;
        }
        if self.is_followed(author_id) {
            score += 0.15;
        }
        score
    }
}

/// Counters for one (user, paper) pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InteractionCounters {
    pub view_seconds: f64,
    pub view_count: u32,
    pub bookmarked: bool,
    pub downloaded: bool,
    pub show_more: bool,
    pub show_less: bool,
}

impl InteractionCounters {
    /// Weight applied to a paper's relevance score
    pub fn score_multiplier(&self) -> f64 {
        let mut m = 1.0;
        if self.bookmarked {
            m *= 1.5;
        }
        if self.downloaded {
            m *= 1.3;
        }
        if self.show_more {
            m *= 1.5;
        }
        if self.show_less {
            m *= 0.5;
        }
        m * (1.0 + self.view_seconds / 3600.0)
    }
}

/// All users' interaction state, persisted as one JSON file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    users: BTreeMap<String, UserProfile>,
}

impl UserPreferences {
    /// Load from `path`; a missing file is an empty store
    pub fn load(path: &Path) -> io::Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let bytes = serde_json::to_vec_pretty(self).map_err(io::Error::other)?;
        papertrail_core::write_atomic(path, &bytes)
    }

    pub fn profile(&self, user_id: &str) -> Option<&UserProfile> {
        self.users.get(user_id)
    }

    fn profile_mut(&mut self, user_id: &str) -> &mut UserProfile {
        self.users.entry(user_id.to_string()).or_default()
    }

    pub fn users(&self) -> impl Iterator<Item = (&String, &UserProfile)> {
        self.users.iter()
    }

    /// Counters for `(user, paper)`; all zero for unknown users
    pub fn counters(&self, user_id: &str, paper_id: &str) -> InteractionCounters {
        self.profile(user_id)
            .map(|p| p.counters(paper_id))
            .unwrap_or_default()
    }

    /// Count a view lasting `duration_secs`. Only durations in (0, 7200)
    /// are recorded; returns whether this one was.
    pub fn record_view(&mut self, user_id: &str, paper_id: &str, duration_secs: f64) -> bool {
        if !(duration_secs > 0.0 && duration_secs < MAX_VIEW_SECS) {
            return false;
        }
        let p = self.profile_mut(user_id);
        *p.view_times.entry(paper_id.to_string()).or_default() += duration_secs;
        *p.view_counts.entry(paper_id.to_string()).or_default() += 1;
        p.last_interactions.insert(paper_id.to_string(), Utc::now());
        true
    }

    /// Returns whether the paper is bookmarked afterwards
    pub fn toggle_bookmark(&mut self, user_id: &str, paper_id: &str) -> bool {
        toggle(&mut self.profile_mut(user_id).bookmarks, paper_id)
    }

    pub fn toggle_download(&mut self, user_id: &str, paper_id: &str) -> bool {
        toggle(&mut self.profile_mut(user_id).downloads, paper_id)
    }

    /// Show-more and show-less are mutually exclusive
    pub fn toggle_show_more(&mut self, user_id: &str, paper_id: &str) -> bool {
        let p = self.profile_mut(user_id);
        let on = toggle(&mut p.show_more, paper_id);
        if on {
            p.show_less.remove(paper_id);
        }
        on
    }

    pub fn toggle_show_less(&mut self, user_id: &str, paper_id: &str) -> bool {
        let p = self.profile_mut(user_id);
        let on = toggle(&mut p.show_less, paper_id);
        if on {
            p.show_more.remove(paper_id);
        }
        on
    }

    /// Following and blocking an author are mutually exclusive
    pub fn toggle_follow_author(&mut self, user_id: &str, author_id: &str) -> bool {
        let p = self.profile_mut(user_id);
        let on = toggle(&mut p.followed_authors, author_id);
        if on {
            p.blocked_authors.remove(author_id);
        }
        on
    }

    pub fn toggle_block_author(&mut self, user_id: &str, author_id: &str) -> bool {
        let p = self.profile_mut(user_id);
        let on = toggle(&mut p.blocked_authors, author_id);
        if on {
            p.followed_authors.remove(author_id);
        }
        on
    }
}

/// A hit with its personalized score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedHit {
    #[serde(flatten)]
    pub hit: SearchHit,
    pub final_score: f64,
}

/// Re-rank search hits for `user_id`: drop blocked authors, double followed
/// authors, apply the interaction multiplier, sort by final score.
pub fn rerank(hits: Vec<SearchHit>, prefs: &UserPreferences, user_id: &str) -> Vec<RankedHit> {
    let profile = prefs.profile(user_id);
    let mut ranked: Vec<RankedHit> = hits
        .into_iter()
        .filter_map(|hit| {
            let Some(p) = profile else {
                let final_score = hit.score;
                return Some(RankedHit { hit, final_score });
            };
            let author = hit.author_id.as_deref();
            if p.is_blocked(author) {
                return None;
            }
            let mut score = hit.score * p.counters(&hit.paper_id).score_multiplier();
            if p.is_followed(author) {
                score *= 2.0;
            }
            Some(RankedHit {
                hit,
                final_score: score,
            })
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

/// Pick `n` papers for `user_id`.
///
/// Unknown users get the newest papers. Otherwise papers by blocked authors
/// are excluded, papers by followed authors fill up to half the slots, and
/// the rest go to the highest engagement scores, skipping show-less papers.
pub fn recommend(
    papers: &[SearchHit],
    prefs: &UserPreferences,
    user_id: &str,
    n: usize,
) -> Vec<SearchHit> {
    let Some(p) = prefs.profile(user_id) else {
        let mut newest = papers.to_vec();
        sort_by_date(&mut newest, SortOrder::Desc);
        newest.truncate(n);
        return newest;
    };

    let allowed: Vec<&SearchHit> = papers
        .iter()
        .filter(|h| !p.is_blocked(h.author_id.as_deref()))
        .collect();

    let mut picks: Vec<SearchHit> = allowed
        .iter()
        .filter(|h| p.is_followed(h.author_id.as_deref()))
        .take(n / 2)
        .map(|h| (*h).clone())
        .collect();

    let mut scored: Vec<(&SearchHit, f64)> = allowed
        .iter()
        .filter(|h| !p.show_less.contains(&h.paper_id))
        .map(|h| (*h, p.engagement_score(&h.paper_id, h.author_id.as_deref())))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    for (hit, _) in scored {
        if picks.len() >= n {
            break;
        }
        if !picks.iter().any(|h| h.paper_id == hit.paper_id) {
            picks.push(hit.clone());
        }
    }
    picks
}
