//! Pagination controller: walks one listing across its postback pages.
//!
//! The traversal is an explicit state machine:
//!
//! ```text
//! FetchingFirst ──GET ok──▶ HasPage ──next──▶ FetchingNext ──POST ok──▶ HasPage ...
//!       │                      │                   │
//!       └──GET failed──▶ Done  └──stop──▶ Done     └──POST failed──▶ Done
//! ```
//!
//! `HasPage` folds the page's records into an id-keyed accumulator and then
//! asks [`decide_continuation`] whether (and with which tokens) to go on. The
//! controller never touches persisted state; its only output is a
//! [`HarvestBatch`].

use crate::extract::RecordExtractor;
use crate::postback::{ContinuationState, has_next_control};
use lexharvest_common::DocumentRecord;
use lexharvest_config::HarvestConfig;
use lexharvest_http::PageSource;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

/// Knobs for one pagination run.
#[derive(Debug, Clone)]
pub struct PaginationOptions {
    /// `__EVENTTARGET` naming the next-page control.
    pub event_target: String,
    /// Substring whose presence means the page offers a next page.
    pub next_marker: String,
    pub inter_page_delay: Duration,
    /// `None` walks as far as the server goes.
    pub max_pages: Option<u32>,
}

impl PaginationOptions {
    pub fn from_config(cfg: &HarvestConfig) -> Self {
        Self {
            event_target: cfg.pagination.event_target.clone(),
            next_marker: cfg.pagination.next_marker.clone(),
            inter_page_delay: cfg.pagination.inter_page_delay(),
            max_pages: cfg.page_budget(),
        }
    }
}

/// Why a run ended. All of these are normal terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The listing GET failed; the batch is empty.
    FirstPageFailed,
    /// A postback failed; treated like an empty page.
    NextPageFailed,
    /// The page has no next-page control.
    NoNextPage,
    /// A next-page control exists but the hidden tokens are incomplete.
    MissingContinuationState,
    /// The configured page budget was reached.
    PageBudgetExhausted,
    /// A continuation page brought no new ids.
    Stalled,
    /// The source is a single, non-paginated page.
    SinglePage,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::FirstPageFailed => "first_page_failed",
            StopReason::NextPageFailed => "next_page_failed",
            StopReason::NoNextPage => "no_next_page",
            StopReason::MissingContinuationState => "missing_continuation_state",
            StopReason::PageBudgetExhausted => "page_budget_exhausted",
            StopReason::Stalled => "stalled",
            StopReason::SinglePage => "single_page",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a pagination run: the cross-page deduplicated records in fetch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestBatch {
    pub records: Vec<DocumentRecord>,
    pub pages_fetched: u32,
    pub stop_reason: StopReason,
}

impl HarvestBatch {
    pub fn failed() -> Self {
        Self {
            records: Vec::new(),
            pages_fetched: 0,
            stop_reason: StopReason::FirstPageFailed,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// False only when not even the first page could be fetched.
    pub fn reached_source(&self) -> bool {
        self.stop_reason != StopReason::FirstPageFailed
    }
}

/// What to do after a page has been absorbed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    Stop(StopReason),
    Next(ContinuationState),
}

/// Decide whether to request another page after `pages_fetched` pages, the
/// last of which is `markup`.
pub fn decide_continuation(
    markup: &str,
    pages_fetched: u32,
    opts: &PaginationOptions,
) -> Continuation {
    if !has_next_control(markup, &opts.next_marker) {
        return Continuation::Stop(StopReason::NoNextPage);
    }
    if matches!(opts.max_pages, Some(max) if pages_fetched >= max) {
        return Continuation::Stop(StopReason::PageBudgetExhausted);
    }
    match ContinuationState::capture(markup) {
        Some(state) => Continuation::Next(state),
        None => Continuation::Stop(StopReason::MissingContinuationState),
    }
}

/// Records folded across pages, keyed by id; first sighting wins.
#[derive(Debug, Default)]
pub struct BatchAccumulator {
    seen: HashSet<String>,
    records: Vec<DocumentRecord>,
}

impl BatchAccumulator {
    /// Append the records whose ids are new; returns how many were new.
    pub fn absorb(&mut self, page: Vec<DocumentRecord>) -> usize {
        let before = self.records.len();
        for record in page {
            if self.seen.insert(record.id.clone()) {
                self.records.push(record);
            }
        }
        self.records.len() - before
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<DocumentRecord> {
        self.records
    }
}

#[derive(Debug)]
enum PageState {
    FetchingFirst,
    HasPage {
        markup: String,
        page: u32,
    },
    FetchingNext {
        continuation: ContinuationState,
        page: u32,
    },
    Done(StopReason),
}

/// Drives the continuation protocol for one listing URL.
#[derive(Debug, Clone)]
pub struct Paginator {
    extractor: RecordExtractor,
    options: PaginationOptions,
}

impl Paginator {
    pub fn new(extractor: RecordExtractor, options: PaginationOptions) -> Self {
        Self { extractor, options }
    }

    pub fn options(&self) -> &PaginationOptions {
        &self.options
    }

    /// Walk `url` to completion. All requests go through `source`, so a
    /// session-bound source keeps one session for the whole walk.
    pub async fn run<S>(&self, source: &S, url: &Url) -> HarvestBatch
    where
        S: PageSource + ?Sized,
    {
        let mut acc = BatchAccumulator::default();
        let mut pages_fetched = 0u32;
        let mut state = PageState::FetchingFirst;

        let stop_reason = loop {
            state = match state {
                PageState::FetchingFirst => match source.get_page(url).await {
                    Ok(markup) => PageState::HasPage { markup, page: 1 },
                    Err(err) => {
                        tracing::warn!(%url, error = %err, "pagination.first_page_failed");
                        PageState::Done(StopReason::FirstPageFailed)
                    }
                },
                PageState::HasPage { markup, page } => {
                    pages_fetched = page;
                    self.on_page(&markup, page, &mut acc)
                }
                PageState::FetchingNext { continuation, page } => {
                    if !self.options.inter_page_delay.is_zero() {
                        sleep(self.options.inter_page_delay).await;
                    }
                    let form = continuation.postback_form(&self.options.event_target);
                    match source.post_page(url, &form).await {
                        Ok(markup) => PageState::HasPage { markup, page },
                        Err(err) => {
                            tracing::warn!(%url, page, error = %err, "pagination.next_page_failed");
                            PageState::Done(StopReason::NextPageFailed)
                        }
                    }
                }
                PageState::Done(reason) => break reason,
            };
        };

        tracing::info!(
            %url,
            pages = pages_fetched,
            records = acc.len(),
            stop = %stop_reason,
            "pagination.done"
        );

        HarvestBatch {
            records: acc.into_records(),
            pages_fetched,
            stop_reason,
        }
    }

    fn on_page(&self, markup: &str, page: u32, acc: &mut BatchAccumulator) -> PageState {
        let found = self.extractor.extract(markup);
        let found_len = found.len();
        let fresh = acc.absorb(found);
        tracing::debug!(
            page,
            found = found_len,
            fresh,
            total = acc.len(),
            "pagination.page"
        );

        if page > 1 && fresh == 0 {
            return PageState::Done(StopReason::Stalled);
        }
        match decide_continuation(markup, page, &self.options) {
            Continuation::Stop(reason) => PageState::Done(reason),
            Continuation::Next(continuation) => PageState::FetchingNext {
                continuation,
                page: page + 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(max_pages: Option<u32>) -> PaginationOptions {
        PaginationOptions {
            event_target: "pager$next".into(),
            next_marker: "lbNext".into(),
            inter_page_delay: Duration::ZERO,
            max_pages,
        }
    }

    const TOKENS: &str = r#"<input name="__VIEWSTATE" value="v"><input name="__VIEWSTATEGENERATOR" value="g"><input name="__EVENTVALIDATION" value="e">"#;

    #[test]
    fn no_marker_stops_even_with_tokens() {
        assert_eq!(
            decide_continuation(TOKENS, 1, &opts(None)),
            Continuation::Stop(StopReason::NoNextPage)
        );
    }

    #[test]
    fn marker_without_tokens_cannot_continue() {
        assert_eq!(
            decide_continuation("<a id=lbNext>»</a>", 1, &opts(None)),
            Continuation::Stop(StopReason::MissingContinuationState)
        );
    }

    #[test]
    fn marker_with_tokens_continues_with_captured_state() {
        let page = format!("{TOKENS}<a id=lbNext>»</a>");
        assert_eq!(
            decide_continuation(&page, 1, &opts(None)),
            Continuation::Next(ContinuationState::new("v", "g", "e"))
        );
    }

    #[test]
    fn budget_is_checked_against_pages_already_fetched() {
        let page = format!("{TOKENS}<a id=lbNext>»</a>");
        assert!(matches!(
            decide_continuation(&page, 1, &opts(Some(2))),
            Continuation::Next(_)
        ));
        assert_eq!(
            decide_continuation(&page, 2, &opts(Some(2))),
            Continuation::Stop(StopReason::PageBudgetExhausted)
        );
    }

    #[test]
    fn accumulator_counts_only_new_ids() {
        let mut acc = BatchAccumulator::default();
        let rec = |id: &str| DocumentRecord::new(id, "t", format!("https://lex.uz/docs/{id}"));
        assert_eq!(acc.absorb(vec![rec("1"), rec("2")]), 2);
        assert_eq!(acc.absorb(vec![rec("2"), rec("3"), rec("1")]), 1);
        let ids: Vec<String> = acc.into_records().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }
}
