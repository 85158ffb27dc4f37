use crate::gh::PullRequest;
use chrono::{DateTime, Utc};

/// A pull request as shown in the list, with ages relative to the batch's
/// reference instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayEntry {
    pub repo_name: String,
    pub number: u64,
    pub title: String,
    pub author: String,
    pub url: String,
    pub comments_count: u64,
    pub age: String,
    pub since_update: String,
}

impl DisplayEntry {
    /// Text the list filter matches against.
    pub fn filter_value(&self) -> String {
        format!("{} {}", self.repo_name, self.title)
    }
}

pub fn build_entries(prs: &[PullRequest], now: DateTime<Utc>) -> Vec<DisplayEntry> {
    prs.iter()
        .map(|pr| DisplayEntry {
            repo_name: pr.repo_name.clone(),
            number: pr.number,
            title: pr.title.clone(),
            author: pr.author.clone(),
            url: pr.url.clone(),
            comments_count: pr.comments_count,
            age: humanize_duration(elapsed_secs(pr.created_at, now)),
            since_update: humanize_duration(elapsed_secs(pr.updated_at, now)),
        })
        .collect()
}

// Clock skew can put timestamps in the future; show those as 0s.
fn elapsed_secs(then: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from((now - then).num_seconds()).unwrap_or(0)
}

/// Format seconds in the coarsest unit that keeps the value at least 1.
pub fn humanize_duration(secs: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;
    const WEEK: u64 = 7 * DAY;

    match secs {
        s if s < MINUTE => format!("{s}s"),
        s if s < HOUR => format!("{}m", s / MINUTE),
        s if s < DAY => format!("{}h", s / HOUR),
        s if s < WEEK => format!("{}d", s / DAY),
        s => format!("{}w", s / WEEK),
    }
}
