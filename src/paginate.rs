//! "Load more" pagination over the post list.
//!
//! The list page is generated with only the first page of summaries plus the
//! CMS's `next_page` URL. [`Paginator`] owns that state and extends it one page
//! at a time:
//!
//! ```text
//! initialize(items, cursor)      items = [a]          cursor = page-2 URL
//! load_next()                    items = [a, b]       cursor = page-3 URL
//! load_next()                    items = [a, b, c]    cursor = None
//! load_next()                    no-op, no request
//! ```
//!
//! `load_next` holds the state lock across the fetch, so two callers never
//! fetch the same cursor twice; the second one continues from wherever the
//! first left off. A failed fetch leaves the state untouched and returns the
//! error, so the caller can simply call again to retry.
//!
//! The generated list page embeds the same state machine in
//! `static/load-more.js` for browsers.

use crate::cms::{CmsError, ContentClient};
use crate::summary::PostSummary;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaginationState {
    /// Summaries in arrival order. Append-only.
    pub items: Vec<PostSummary>,
    /// URL of the next page; `None` once exhausted.
    pub next_page: Option<String>,
}

/// What a single [`Paginator::load_next`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched and this many summaries were appended.
    Appended(usize),
    /// The cursor was already `None`; nothing was requested.
    Exhausted,
}

pub struct Paginator<'c, C: ContentClient + ?Sized> {
    client: &'c C,
    state: Mutex<PaginationState>,
}

impl<'c, C: ContentClient + ?Sized> Paginator<'c, C> {
    /// Start from the statically generated first page.
    pub fn initialize(client: &'c C, items: Vec<PostSummary>, next_page: Option<String>) -> Self {
        Self {
            client,
            state: Mutex::new(PaginationState { items, next_page }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PaginationState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fetch the page behind the cursor and append it.
    pub fn load_next(&self) -> Result<LoadOutcome, CmsError> {
        let mut state = self.lock();
        let Some(url) = state.next_page.clone() else {
            return Ok(LoadOutcome::Exhausted);
        };

        debug!(loaded = state.items.len(), "loading next page");
        let page = self.client.fetch_page(&url)?;

        let known: HashSet<&str> = state.items.iter().filter_map(|s| s.uid.as_deref()).collect();
        let duplicates = page
            .results
            .iter()
            .filter(|d| d.uid.as_deref().is_some_and(|uid| known.contains(uid)))
            .count();
        if duplicates > 0 {
            warn!(duplicates, "next page repeats already loaded posts");
        }

        let appended = page.results.len();
        state
            .items
            .extend(page.results.iter().map(PostSummary::project));
        state.next_page = page.next_page;
        Ok(LoadOutcome::Appended(appended))
    }

    /// Keep loading until the cursor runs out. Returns the number of pages fetched.
    pub fn load_all(&self) -> Result<usize, CmsError> {
        let mut pages = 0;
        while let LoadOutcome::Appended(_) = self.load_next()? {
            pages += 1;
        }
        Ok(pages)
    }

    pub fn items(&self) -> Vec<PostSummary> {
        self.lock().items.clone()
    }

    pub fn next_page(&self) -> Option<String> {
        self.lock().next_page.clone()
    }

    pub fn has_more(&self) -> bool {
        self.lock().next_page.is_some()
    }

    pub fn snapshot(&self) -> PaginationState {
        self.lock().clone()
    }

    pub fn into_state(self) -> PaginationState {
        self.state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
