//! The interactive session state machine.
//!
//! [`Session::handle`] is the only transition function. It never performs I/O:
//! anything that has to reach the outside world (starting a fetch, opening a
//! browser) is returned as an [`Effect`] for the event loop to carry out.

use crate::category::Category;
use crate::entry::DisplayEntry;
use crate::fetch::Batch;
use anyhow::Result;
use chrono::{DateTime, Utc};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use ratatui::widgets::ListState;
use std::time::{Duration, Instant};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub enum Event {
    /// The refresh deadline may have been reached.
    Tick,
    RefreshCompleted(Batch),
    /// A scheduled refresh never started.
    RefreshFailed,
    NavigatePrev,
    NavigateNext,
    RowPrev,
    RowNext,
    RowFirst,
    RowLast,
    ManualRefresh,
    /// Replace the list filter; an empty string shows every row.
    Filter(String),
    Select,
    RequestCheckout,
    Quit,
    /// Geometry belongs to the list view; the session ignores it.
    Resize { width: u16, height: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Refresh,
    OpenUrl(String),
}

/// How the interactive loop ended. Set at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Quit,
    Checkout,
    Open,
}

pub struct Session {
    categories: Vec<Category>,
    category_index: usize,
    entries: Vec<Vec<DisplayEntry>>,
    filter: String,
    // Rows of the active category that pass the filter, best match first.
    visible: Vec<usize>,
    list_state: ListState,
    interval: Duration,
    next_refresh: Instant,
    exit: Option<Exit>,
    exit_on_open: bool,
    pending_refreshes: usize,
    issued_generation: u64,
    applied_generation: u64,
    last_refresh: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(categories: Vec<Category>, interval: Duration, now: Instant) -> Result<Self> {
        anyhow::ensure!(!categories.is_empty(), "At least one category is required");
        let entries = vec![Vec::new(); categories.len()];
        Ok(Self {
            categories,
            category_index: 0,
            entries,
            filter: String::new(),
            visible: Vec::new(),
            list_state: ListState::default(),
            interval,
            next_refresh: now + interval,
            exit: None,
            exit_on_open: false,
            pending_refreshes: 0,
            issued_generation: 0,
            applied_generation: 0,
            last_refresh: None,
        })
    }

    /// End the loop on Select and leave the browser to the action resolver.
    pub fn with_exit_on_open(mut self, exit_on_open: bool) -> Self {
        self.exit_on_open = exit_on_open;
        self
    }

    /// Kick off the initial fetch. The next automatic refresh is rescheduled
    /// from `now`.
    pub fn start(&mut self, now: Instant) -> Effect {
        self.schedule_refresh(now)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category_index(&self) -> usize {
        self.category_index
    }

    /// Rows of the active category that pass the filter, in display order.
    pub fn entries(&self) -> Vec<&DisplayEntry> {
        let list = &self.entries[self.category_index];
        self.visible.iter().filter_map(|&i| list.get(i)).collect()
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn entry_count(&self, category: usize) -> usize {
        self.entries.get(category).map_or(0, Vec::len)
    }

    pub fn list_state_mut(&mut self) -> &mut ListState {
        &mut self.list_state
    }

    pub fn highlighted_index(&self) -> Option<usize> {
        self.list_state.selected()
    }

    pub fn highlighted(&self) -> Option<&DisplayEntry> {
        self.list_state
            .selected()
            .and_then(|i| self.visible.get(i))
            .and_then(|&i| self.entries[self.category_index].get(i))
    }

    pub fn next_refresh(&self) -> Instant {
        self.next_refresh
    }

    /// How long the loop may block before the refresh deadline.
    pub fn time_until_refresh(&self, now: Instant) -> Duration {
        self.next_refresh.saturating_duration_since(now)
    }

    /// Generation of the most recently scheduled refresh.
    pub fn refresh_generation(&self) -> u64 {
        self.issued_generation
    }

    pub fn is_refreshing(&self) -> bool {
        self.pending_refreshes > 0
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    pub fn exit(&self) -> Option<Exit> {
        self.exit
    }

    pub fn is_finished(&self) -> bool {
        self.exit.is_some()
    }

    pub fn handle(&mut self, event: Event, now: Instant) -> Option<Effect> {
        if self.exit.is_some() {
            return None;
        }

        match event {
            Event::Tick => {
                if now >= self.next_refresh {
                    return Some(self.schedule_refresh(now));
                }
            }
            Event::ManualRefresh => return Some(self.schedule_refresh(now)),
            Event::RefreshCompleted(batch) => self.apply_batch(batch),
            Event::RefreshFailed => {
                self.pending_refreshes = self.pending_refreshes.saturating_sub(1);
            }
            Event::NavigatePrev => {
                let count = self.categories.len();
                self.category_index = (self.category_index + count - 1) % count;
                self.refilter();
            }
            Event::NavigateNext => {
                self.category_index = (self.category_index + 1) % self.categories.len();
                self.refilter();
            }
            Event::Filter(filter) => {
                self.filter = filter;
                self.refilter();
            }
            Event::RowNext => self.next_row(),
            Event::RowPrev => self.previous_row(),
            Event::RowFirst => self.reset_highlight(),
            Event::RowLast => {
                self.list_state.select(self.visible.len().checked_sub(1));
            }
            Event::Select => return self.select(),
            Event::RequestCheckout => {
                if self.highlighted().is_some() {
                    self.finish(Exit::Checkout);
                } else {
                    log::debug!("checkout ignored: nothing highlighted");
                }
            }
            Event::Quit => self.finish(Exit::Quit),
            Event::Resize { width, height } => {
                log::trace!("viewport resized to {width}x{height}");
            }
        }
        None
    }

    fn schedule_refresh(&mut self, now: Instant) -> Effect {
        self.next_refresh = now + self.interval;
        self.pending_refreshes += 1;
        self.issued_generation += 1;
        Effect::Refresh
    }

    fn apply_batch(&mut self, batch: Batch) {
        self.pending_refreshes = self.pending_refreshes.saturating_sub(1);
        if batch.generation < self.applied_generation {
            log::debug!(
                "dropping refresh #{}: #{} already applied",
                batch.generation,
                self.applied_generation
            );
            return;
        }
        self.applied_generation = batch.generation;

        let mut entries = batch.entries;
        if entries.len() != self.categories.len() {
            log::warn!(
                "refresh returned {} lists for {} categories",
                entries.len(),
                self.categories.len()
            );
            entries.resize_with(self.categories.len(), Vec::new);
        }
        if batch.failures > 0 {
            log::warn!(
                "{} of {} categories failed to refresh",
                batch.failures,
                self.categories.len()
            );
        }
        self.entries = entries;
        self.last_refresh = Some(batch.fetched_at);
        self.refilter();
    }

    fn select(&mut self) -> Option<Effect> {
        let url = match self.highlighted() {
            Some(entry) => entry.url.clone(),
            None => {
                log::debug!("select ignored: nothing highlighted");
                return None;
            }
        };

        if self.exit_on_open {
            self.finish(Exit::Open);
            None
        } else {
            Some(Effect::OpenUrl(url))
        }
    }

    fn finish(&mut self, exit: Exit) {
        log::info!("session finished: {:?}", exit);
        self.exit = Some(exit);
    }

    fn refilter(&mut self) {
        let list = &self.entries[self.category_index];
        let pattern = self.filter.trim();
        self.visible = if pattern.is_empty() {
            (0..list.len()).collect()
        } else {
            let matcher = SkimMatcherV2::default();
            let mut scored: Vec<(usize, i64)> = list
                .iter()
                .enumerate()
                .filter_map(|(i, entry)| {
                    matcher
                        .fuzzy_match(&entry.filter_value(), pattern)
                        .map(|score| (i, score))
                })
                .collect();
            scored.sort_by(|a, b| b.1.cmp(&a.1));
            scored.into_iter().map(|(i, _)| i).collect()
        };
        self.reset_highlight();
    }

    fn reset_highlight(&mut self) {
        if self.visible.is_empty() {
            self.list_state.select(None);
        } else {
            self.list_state.select(Some(0));
        }
        *self.list_state.offset_mut() = 0;
    }

    fn next_row(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1) % len,
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    fn previous_row(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::default_categories;
    use pretty_assertions::assert_eq;

    const MINUTE: Duration = Duration::from_secs(60);

    fn entry(category: usize, row: usize) -> DisplayEntry {
        let number = (category * 100 + row) as u64;
        DisplayEntry {
            repo_name: format!("octo/cat{category}"),
            number,
            title: format!("PR {number}"),
            author: "octocat".to_string(),
            url: format!("https://github.com/octo/cat{category}/pull/{number}"),
            comments_count: 0,
            age: "1d".to_string(),
            since_update: "2h".to_string(),
        }
    }

    fn batch(sizes: &[usize]) -> Batch {
        Batch {
            generation: 0,
            entries: sizes
                .iter()
                .enumerate()
                .map(|(c, &n)| (0..n).map(|r| entry(c, r)).collect())
                .collect(),
            fetched_at: Utc::now(),
            failures: 0,
        }
    }

    fn session(now: Instant) -> Session {
        Session::new(default_categories(), MINUTE, now).unwrap()
    }

    fn loaded(sizes: &[usize], now: Instant) -> Session {
        let mut s = session(now);
        s.handle(Event::RefreshCompleted(batch(sizes)), now);
        s
    }

    #[test]
    fn starts_empty_on_first_category() {
        let now = Instant::now();
        let mut s = session(now);

        assert_eq!(s.category_index(), 0);
        assert!(s.entries().is_empty());
        assert_eq!(s.highlighted_index(), None);
        assert_eq!(s.next_refresh(), now + MINUTE);
        assert_eq!(s.exit(), None);

        let later = now + Duration::from_millis(5);
        assert_eq!(s.start(later), Effect::Refresh);
        assert!(s.is_refreshing());
        assert_eq!(s.next_refresh(), later + MINUTE);
    }

    #[test]
    fn requires_a_category() {
        assert!(Session::new(Vec::new(), MINUTE, Instant::now()).is_err());
    }

    #[test]
    fn tick_refreshes_only_at_the_deadline() {
        let now = Instant::now();
        let mut s = session(now);

        assert_eq!(s.handle(Event::Tick, now + Duration::from_secs(59)), None);
        assert_eq!(s.next_refresh(), now + MINUTE);

        let deadline = now + MINUTE;
        assert_eq!(s.handle(Event::Tick, deadline), Some(Effect::Refresh));
        assert_eq!(s.next_refresh(), deadline + MINUTE);

        let late = deadline + MINUTE + Duration::from_secs(3);
        assert_eq!(s.handle(Event::Tick, late), Some(Effect::Refresh));
        assert_eq!(s.next_refresh(), late + MINUTE);
    }

    #[test]
    fn manual_refresh_reschedules_before_the_deadline() {
        let now = Instant::now();
        let mut s = session(now);
        let at = now + Duration::from_secs(10);

        assert_eq!(s.handle(Event::ManualRefresh, at), Some(Effect::Refresh));
        assert_eq!(s.next_refresh(), at + MINUTE);
        assert_eq!(s.time_until_refresh(at), MINUTE);
        assert_eq!(s.handle(Event::Tick, now + MINUTE), None);
    }

    #[test]
    fn refresh_replaces_every_list_and_resets_highlight() {
        let now = Instant::now();
        let mut s = loaded(&[3, 2, 1, 4], now);
        s.handle(Event::RowNext, now);
        s.handle(Event::RowNext, now);
        assert_eq!(s.highlighted_index(), Some(2));

        s.handle(Event::RefreshCompleted(batch(&[1, 0, 0, 2])), now);
        assert_eq!(s.highlighted_index(), Some(0));
        let counts: Vec<_> = (0..4).map(|c| s.entry_count(c)).collect();
        assert_eq!(counts, vec![1, 0, 0, 2]);

        s.handle(Event::RefreshCompleted(batch(&[0, 0, 0, 0])), now);
        assert_eq!(s.highlighted_index(), None);
        assert!(s.highlighted().is_none());
        assert!(s.last_refresh().is_some());
    }

    #[test]
    fn short_batch_is_padded_to_category_count() {
        let now = Instant::now();
        let s = loaded(&[2], now);
        let counts: Vec<_> = (0..4).map(|c| s.entry_count(c)).collect();
        assert_eq!(counts, vec![2, 0, 0, 0]);
    }

    #[test]
    fn refresh_completion_clears_the_refreshing_flag() {
        let now = Instant::now();
        let mut s = session(now);
        s.start(now);
        s.handle(Event::ManualRefresh, now);
        s.handle(Event::RefreshCompleted(batch(&[1, 1, 1, 1])), now);
        assert!(s.is_refreshing());
        s.handle(Event::RefreshCompleted(batch(&[1, 1, 1, 1])), now);
        assert!(!s.is_refreshing());
    }

    #[test]
    fn category_navigation_is_cyclic() {
        let now = Instant::now();
        let mut s = loaded(&[1, 1, 1, 1], now);
        let count = s.categories().len();

        for start in 0..count {
            while s.category_index() != start {
                s.handle(Event::NavigateNext, now);
            }
            for _ in 0..count {
                s.handle(Event::NavigateNext, now);
            }
            assert_eq!(s.category_index(), start);

            s.handle(Event::NavigateNext, now);
            s.handle(Event::NavigatePrev, now);
            assert_eq!(s.category_index(), start);
        }

        while s.category_index() != 0 {
            s.handle(Event::NavigateNext, now);
        }
        s.handle(Event::NavigatePrev, now);
        assert_eq!(s.category_index(), count - 1);
    }

    #[test]
    fn navigating_next_three_times_lands_on_last_category() {
        let now = Instant::now();
        let mut s = loaded(&[3, 0, 1, 2], now);
        s.handle(Event::RowLast, now);
        assert_eq!(s.highlighted_index(), Some(2));

        s.handle(Event::NavigateNext, now);
        assert_eq!(s.highlighted_index(), None);
        s.handle(Event::NavigateNext, now);
        assert_eq!(s.highlighted_index(), Some(0));
        s.handle(Event::NavigateNext, now);

        assert_eq!(s.category_index(), 3);
        assert_eq!(s.entries().len(), 2);
        assert_eq!(s.highlighted_index(), Some(0));
    }

    #[test]
    fn row_navigation_wraps() {
        let now = Instant::now();
        let mut s = loaded(&[3, 0, 0, 0], now);

        s.handle(Event::RowPrev, now);
        assert_eq!(s.highlighted_index(), Some(2));
        s.handle(Event::RowNext, now);
        assert_eq!(s.highlighted_index(), Some(0));
        s.handle(Event::RowLast, now);
        s.handle(Event::RowFirst, now);
        assert_eq!(s.highlighted_index(), Some(0));

        s.handle(Event::NavigateNext, now);
        s.handle(Event::RowNext, now);
        s.handle(Event::RowLast, now);
        assert_eq!(s.highlighted_index(), None);
    }

    #[test]
    fn select_opens_the_highlighted_entry_and_keeps_running() {
        let now = Instant::now();
        let mut s = loaded(&[3, 2, 0, 0], now);
        s.handle(Event::NavigateNext, now);
        s.handle(Event::RowNext, now);

        assert_eq!(
            s.handle(Event::Select, now),
            Some(Effect::OpenUrl(entry(1, 1).url))
        );
        assert!(!s.is_finished());
    }

    #[test]
    fn select_with_exit_on_open_ends_the_loop() {
        let now = Instant::now();
        let mut s = session(now).with_exit_on_open(true);
        s.handle(Event::RefreshCompleted(batch(&[1, 0, 0, 0])), now);

        assert_eq!(s.handle(Event::Select, now), None);
        assert_eq!(s.exit(), Some(Exit::Open));
    }

    #[test]
    fn actions_on_an_empty_list_are_ignored() {
        let now = Instant::now();
        let mut s = loaded(&[0, 0, 0, 0], now);

        assert_eq!(s.handle(Event::Select, now), None);
        s.handle(Event::RequestCheckout, now);
        assert!(!s.is_finished());
    }

    #[test]
    fn checkout_and_quit_are_terminal() {
        let now = Instant::now();
        let mut s = loaded(&[2, 0, 0, 0], now);
        s.handle(Event::RequestCheckout, now);
        assert_eq!(s.exit(), Some(Exit::Checkout));

        s.handle(Event::Quit, now);
        s.handle(Event::NavigateNext, now);
        assert_eq!(s.handle(Event::ManualRefresh, now), None);
        assert_eq!(s.exit(), Some(Exit::Checkout));
        assert_eq!(s.category_index(), 0);

        let mut s = loaded(&[2, 0, 0, 0], now);
        s.handle(Event::Quit, now);
        s.handle(Event::RequestCheckout, now);
        assert_eq!(s.exit(), Some(Exit::Quit));
    }

    #[test]
    fn resize_leaves_state_alone() {
        let now = Instant::now();
        let mut s = loaded(&[2, 0, 0, 0], now);
        s.handle(Event::RowNext, now);
        assert_eq!(
            s.handle(Event::Resize { width: 40, height: 10 }, now),
            None
        );
        assert_eq!(s.highlighted_index(), Some(1));
        assert_eq!(s.category_index(), 0);
    }

    fn batch_of(generation: u64, sizes: &[usize]) -> Batch {
        Batch {
            generation,
            ..batch(sizes)
        }
    }

    #[test]
    fn a_slow_older_refresh_never_overwrites_a_newer_one() {
        let now = Instant::now();
        let mut s = session(now);
        s.start(now);
        let first = s.refresh_generation();
        s.handle(Event::ManualRefresh, now);
        let second = s.refresh_generation();
        assert!(second > first);

        s.handle(Event::RefreshCompleted(batch_of(second, &[2, 0, 0, 0])), now);
        assert!(s.is_refreshing());
        s.handle(Event::RefreshCompleted(batch_of(first, &[5, 5, 5, 5])), now);

        let counts: Vec<_> = (0..4).map(|c| s.entry_count(c)).collect();
        assert_eq!(counts, vec![2, 0, 0, 0]);
        assert!(!s.is_refreshing());
    }

    #[test]
    fn failed_refresh_start_clears_the_refreshing_flag() {
        let now = Instant::now();
        let mut s = session(now);
        s.start(now);
        assert!(s.is_refreshing());

        assert_eq!(s.handle(Event::RefreshFailed, now), None);
        assert!(!s.is_refreshing());
        assert!(s.last_refresh().is_none());
    }

    #[test]
    fn filter_narrows_the_active_list_and_drives_actions() {
        let now = Instant::now();
        let mut s = loaded(&[3, 3, 0, 0], now);
        s.handle(Event::NavigateNext, now);
        s.handle(Event::RowLast, now);

        s.handle(Event::Filter("102".to_string()), now);
        let shown: Vec<_> = s.entries().iter().map(|e| e.number).collect();
        assert_eq!(shown, vec![102]);
        assert_eq!(s.highlighted_index(), Some(0));
        assert_eq!(s.entry_count(1), 3);
        assert_eq!(
            s.handle(Event::Select, now),
            Some(Effect::OpenUrl(entry(1, 2).url))
        );

        s.handle(Event::RequestCheckout, now);
        assert_eq!(s.exit(), Some(Exit::Checkout));
        assert_eq!(s.highlighted(), Some(&entry(1, 2)));
    }

    #[test]
    fn filter_survives_refresh_and_clears_with_an_empty_pattern() {
        let now = Instant::now();
        let mut s = loaded(&[3, 0, 0, 0], now);
        s.handle(Event::Filter("zzz".to_string()), now);
        assert!(s.entries().is_empty());
        assert_eq!(s.highlighted_index(), None);
        assert_eq!(s.handle(Event::Select, now), None);
        s.handle(Event::RequestCheckout, now);
        assert!(!s.is_finished());

        s.handle(Event::RefreshCompleted(batch(&[4, 0, 0, 0])), now);
        assert_eq!(s.filter(), "zzz");
        assert!(s.entries().is_empty());

        s.handle(Event::Filter(String::new()), now);
        assert_eq!(s.entries().len(), 4);
        assert_eq!(s.highlighted_index(), Some(0));
    }
}
