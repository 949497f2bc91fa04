//! Page-by-page ingestion driver.
//!
//! A run walks `Idle → Fetching(n) → Fetching(n+1) … → Done | Aborted`:
//!
//! - `Done(Exhausted)`: the provider returned an empty page.
//! - `Done(CapReached)`: the configured number of stored items was reached.
//! - `Done(PageLimit)`: the configured number of pages was fetched.
//! - `Aborted`: the provider failed. Items stored before the failure stay
//!   stored; nothing is rolled back.
//!
//! Provider failures end the run as a state, not as an error. Errors from
//! the [`ItemSink`] (the catalog store) are fatal and propagate.
//!
//! Runs are not resumable; a restarted run begins again at its start page.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::ProviderError;
use crate::models::ItemOutcome;

/// One page request: `page` counts from the run's start page, `offset` is
/// the item offset for providers that page by offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub offset: usize,
    pub size: usize,
}

impl PageWindow {
    fn at(page: u32, size: usize) -> Self {
        Self {
            page,
            offset: (page.saturating_sub(1) as usize) * size,
            size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pagination {
    /// 1-based; page `n` starts at offset `(n - 1) * page_size`.
    pub start_page: u32,
    pub max_pages: Option<u32>,
    pub page_size: usize,
    /// Stop once this many items were created or updated.
    pub item_cap: Option<usize>,
    /// Pause before every page after the first.
    pub delay: Duration,
}

impl Pagination {
    pub fn new(page_size: usize) -> Self {
        Self {
            start_page: 1,
            max_pages: None,
            page_size,
            item_cap: None,
            delay: Duration::ZERO,
        }
    }
}

/// A provider endpoint that can be read one window at a time.
#[async_trait]
pub trait PageSource: Send {
    type Item: Send;

    async fn fetch(&mut self, window: PageWindow) -> Result<Vec<Self::Item>, ProviderError>;
}

/// Receives every fetched item in order.
#[async_trait]
pub trait ItemSink<T: Send>: Send {
    async fn accept(&mut self, item: T) -> Result<ItemOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    Exhausted,
    CapReached,
    PageLimit,
}

#[derive(Debug)]
pub enum PageState {
    Idle,
    Fetching { page: u32 },
    Done(DoneReason),
    Aborted { page: u32, error: ProviderError },
}

impl PageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PageState::Done(_) | PageState::Aborted { .. })
    }
}

#[derive(Debug)]
pub struct PageReport {
    pub state: PageState,
    pub pages_fetched: u32,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl PageReport {
    pub fn stored(&self) -> usize {
        self.created + self.updated
    }

    pub fn done_reason(&self) -> Option<DoneReason> {
        match self.state {
            PageState::Done(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn aborted(&self) -> Option<&ProviderError> {
        match &self.state {
            PageState::Aborted { error, .. } => Some(error),
            _ => None,
        }
    }

    fn tally(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Created => self.created += 1,
            ItemOutcome::Updated => self.updated += 1,
            ItemOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Drive `source` through the state machine, handing every item to `sink`.
pub async fn drive<S, K>(pagination: &Pagination, source: &mut S, sink: &mut K) -> Result<PageReport>
where
    S: PageSource,
    K: ItemSink<S::Item>,
{
    let mut report = PageReport {
        state: PageState::Idle,
        pages_fetched: 0,
        created: 0,
        updated: 0,
        skipped: 0,
    };
    let cap_reached = |r: &PageReport| pagination.item_cap.is_some_and(|cap| r.stored() >= cap);

    while !report.state.is_terminal() {
        report.state = match std::mem::replace(&mut report.state, PageState::Idle) {
            PageState::Idle if cap_reached(&report) => PageState::Done(DoneReason::CapReached),
            PageState::Idle => PageState::Fetching {
                page: pagination.start_page.max(1),
            },
            PageState::Fetching { page } => {
                if pagination
                    .max_pages
                    .is_some_and(|max| report.pages_fetched >= max)
                {
                    PageState::Done(DoneReason::PageLimit)
                } else {
                    if report.pages_fetched > 0 && !pagination.delay.is_zero() {
                        tokio::time::sleep(pagination.delay).await;
                    }
                    let window = PageWindow::at(page, pagination.page_size);
                    debug!(page, offset = window.offset, "fetching page");

                    match source.fetch(window).await {
                        Err(error) => PageState::Aborted { page, error },
                        Ok(items) if items.is_empty() => PageState::Done(DoneReason::Exhausted),
                        Ok(items) => {
                            report.pages_fetched += 1;
                            for item in items {
                                if cap_reached(&report) {
                                    break;
                                }
                                let outcome = sink.accept(item).await?;
                                report.tally(outcome);
                            }
                            if cap_reached(&report) {
                                PageState::Done(DoneReason::CapReached)
                            } else {
                                PageState::Fetching { page: page + 1 }
                            }
                        }
                    }
                }
            }
            terminal => terminal,
        };
    }

    Ok(report)
}
