use crate::category::Category;
use crate::entry::{build_entries, DisplayEntry};
use crate::gh::{PrSearch, PullRequest};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// One aggregator run: a list per category, in category order, all aged
/// against `fetched_at`. `generation` orders overlapping runs.
#[derive(Debug, Clone)]
pub struct Batch {
    pub generation: u64,
    pub entries: Vec<Vec<DisplayEntry>>,
    pub fetched_at: DateTime<Utc>,
    pub failures: usize,
}

fn search_category(searcher: &dyn PrSearch, category: &Category) -> Option<Vec<PullRequest>> {
    let started = Instant::now();
    match searcher.search(&category.filters) {
        Ok(prs) => {
            log::debug!(
                "refresh: {} returned {} PRs in {:.3}s",
                category.label,
                prs.len(),
                started.elapsed().as_secs_f64()
            );
            Some(prs)
        }
        Err(err) => {
            log::warn!("refresh: {} failed: {:#}", category.label, err);
            None
        }
    }
}

fn search_all(searcher: &dyn PrSearch, categories: &[Category]) -> Vec<Option<Vec<PullRequest>>> {
    let run = || -> Vec<Option<Vec<PullRequest>>> {
        categories
            .par_iter()
            .map(|category| search_category(searcher, category))
            .collect()
    };

    // One worker per category so a stalled query never holds up the rest.
    match rayon::ThreadPoolBuilder::new()
        .num_threads(categories.len().max(1))
        .thread_name(|i| format!("gh-rr-fetch-{i}"))
        .build()
    {
        Ok(pool) => pool.install(run),
        Err(err) => {
            log::warn!("refresh: falling back to the global pool: {}", err);
            run()
        }
    }
}

/// Fetch every category concurrently. A failed category comes back empty.
pub fn fetch_all(searcher: &dyn PrSearch, categories: &[Category], generation: u64) -> Batch {
    let started = Instant::now();
    let results = search_all(searcher, categories);

    let fetched_at = Utc::now();
    let failures = results.iter().filter(|r| r.is_none()).count();
    let entries = results
        .into_iter()
        .map(|prs| build_entries(&prs.unwrap_or_default(), fetched_at))
        .collect();

    log::info!(
        "refresh #{}: {} categories in {:.3}s ({} failed)",
        generation,
        categories.len(),
        started.elapsed().as_secs_f64(),
        failures
    );

    Batch {
        generation,
        entries,
        fetched_at,
        failures,
    }
}

/// Run [`fetch_all`] on its own thread and hand the batch to `deliver`.
/// Nothing waits on the thread; an abandoned refresh simply finishes unseen.
/// If the thread cannot be started, `deliver` is never called.
pub fn spawn_refresh<F>(
    searcher: Arc<dyn PrSearch>,
    categories: Vec<Category>,
    generation: u64,
    deliver: F,
) -> Result<()>
where
    F: FnOnce(Batch) + Send + 'static,
{
    thread::Builder::new()
        .name(format!("gh-rr-refresh-{generation}"))
        .spawn(move || deliver(fetch_all(searcher.as_ref(), &categories, generation)))
        .context("Failed to spawn refresh worker")?;
    Ok(())
}
