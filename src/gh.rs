use crate::category::SearchFilter;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::process::Command;

const SEARCH_JSON_FIELDS: &str =
    "--json=author,title,url,repository,createdAt,updatedAt,commentsCount,number";

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchRepository {
    #[serde(rename = "nameWithOwner")]
    name_with_owner: String,
}

/// PR data from gh search prs command
#[derive(Debug, Deserialize)]
struct SearchPrData {
    number: u64,
    title: String,
    author: Option<Author>,
    url: String,
    #[serde(rename = "commentsCount", default)]
    comments_count: u64,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    updated_at: DateTime<Utc>,
    repository: SearchRepository,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub repo_name: String,
    pub title: String,
    pub author: String,
    pub url: String,
    pub comments_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Runs one pull request query. Implementations must tolerate being called
/// from several threads at once.
pub trait PrSearch: Send + Sync {
    fn search(&self, filters: &[SearchFilter]) -> Result<Vec<PullRequest>>;
}

/// Queries GitHub through the authenticated `gh` CLI.
#[derive(Debug, Clone, Default)]
pub struct GhCli {
    limit: Option<u32>,
}

impl GhCli {
    pub fn new(limit: Option<u32>) -> Self {
        Self { limit }
    }

    fn search_args(&self, filters: &[SearchFilter]) -> Vec<String> {
        let mut args = Vec::with_capacity(filters.len() + 5);
        args.push("search".to_string());
        args.push("prs".to_string());
        args.push(SEARCH_JSON_FIELDS.to_string());
        if let Some(limit) = self.limit {
            args.push("--limit".to_string());
            args.push(limit.to_string());
        }
        args.extend(filters.iter().map(|f| f.as_arg().to_string()));
        args
    }
}

impl PrSearch for GhCli {
    fn search(&self, filters: &[SearchFilter]) -> Result<Vec<PullRequest>> {
        let output = Command::new("gh")
            .args(self.search_args(filters))
            .output()
            .context("Failed to run gh cli")?;

        if !output.status.success() {
            anyhow::bail!(
                "Failed to fetch pull requests: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        parse_search_output(&output.stdout)
    }
}

pub fn parse_search_output(stdout: &[u8]) -> Result<Vec<PullRequest>> {
    let prs_data: Vec<SearchPrData> =
        serde_json::from_slice(stdout).context("Failed to parse pull requests")?;

    Ok(prs_data
        .into_iter()
        .map(|pr_data| {
            let author = pr_data
                .author
                .and_then(|a| a.login)
                .unwrap_or_else(|| "unknown".to_string());

            PullRequest {
                number: pr_data.number,
                repo_name: pr_data.repository.name_with_owner,
                title: pr_data.title,
                author,
                url: pr_data.url,
                comments_count: pr_data.comments_count,
                created_at: pr_data.created_at,
                updated_at: pr_data.updated_at,
            }
        })
        .collect())
}
