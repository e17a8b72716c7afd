// Drives the portal's search form and walks every result page.
use crate::config::PortalConfig;
use crate::model::{BrowserError, RowOutcome, ScanError, SkipReason};
use crate::normalizer::parse_count;
use crate::scraper::traits::{Browser, RowHandle};
use crate::utils::{search_window, total_pages};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationState {
    Init,
    FormSubmitted,
    ResultsReady,
    PagedView,
    PageLoaded(u32),
    Done,
    Failed,
}

/// Receives every visible row, in page order.
#[async_trait::async_trait]
pub trait RowSink: Send {
    async fn accept(&mut self, page: u32, row: &dyn RowHandle) -> RowOutcome;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    /// Result count shown by the portal, when it could be read.
    pub advertised_total: Option<u32>,
    pub page_size: u32,
    pub total_pages: u32,
    pub pages_read: u32,
    pub rows_visible: usize,
    pub rows_hidden: usize,
    /// Set when the portal showed no result table.
    pub no_results: bool,
    /// Why the page loop ended before the last page.
    pub stopped_early: Option<String>,
}

pub struct PaginationController<'a> {
    portal: &'a PortalConfig,
    state: PaginationState,
}

impl<'a> PaginationController<'a> {
    pub fn new(portal: &'a PortalConfig) -> Self {
        Self { portal, state: PaginationState::Init }
    }

    #[cfg(test)]
    pub fn state(&self) -> PaginationState {
        self.state
    }

    fn transition(&mut self, next: PaginationState) {
        debug!("🔀 Pagination {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Runs one harvest. Only navigation and form errors are returned; page
    /// advance failures end the loop and keep what was read.
    pub async fn run(
        &mut self,
        browser: &mut dyn Browser,
        today: NaiveDate,
        sink: &mut dyn RowSink,
    ) -> Result<HarvestReport, ScanError> {
        if let Err(e) = self.submit_search(browser, today).await {
            self.transition(PaginationState::Failed);
            return Err(e);
        }
        self.transition(PaginationState::FormSubmitted);

        let portal = self.portal;
        let selectors = &portal.selectors;
        let mut report = HarvestReport {
            page_size: portal.default_page_size,
            ..Default::default()
        };

        if let Err(e) = browser
            .wait_for_selector(&selectors.results_table, portal.results_timeout())
            .await
        {
            if e.is_timeout() {
                info!("📭 No results table, nothing to read");
            } else {
                warn!("⚠️ Results table unavailable: {}", e);
            }
            report.no_results = true;
            self.transition(PaginationState::Done);
            return Ok(report);
        }
        self.transition(PaginationState::ResultsReady);

        report.advertised_total = match browser.text(&selectors.result_count).await {
            Ok(Some(text)) => parse_count(&text),
            Ok(None) => None,
            Err(e) => {
                warn!("⚠️ Cannot read result count: {}", e);
                None
            }
        };

        if let Some(total) = report.advertised_total {
            info!("🔎 Portal reports {} offers", total);
            if total > portal.default_page_size && self.enlarge_page_size(browser).await {
                report.page_size = portal.max_page_size;
            }
        } else {
            info!("🔎 Result count unavailable, reading the current view only");
        }
        report.total_pages = report
            .advertised_total
            .map(|total| total_pages(total, report.page_size))
            .unwrap_or(1);
        self.transition(PaginationState::PagedView);

        for page in 1..=report.total_pages {
            self.transition(PaginationState::PageLoaded(page));
            match self.read_page(browser, page, sink, &mut report).await {
                Ok(()) => report.pages_read += 1,
                Err(e) => {
                    warn!("⚠️ Page {} unreadable: {}", page, e);
                    report.stopped_early = Some(format!("page {} unreadable: {}", page, e));
                    break;
                }
            }

            if page < report.total_pages {
                if let Err(e) = self.advance(browser).await {
                    warn!("⚠️ Cannot open page {}: {}", page + 1, e);
                    report.stopped_early =
                        Some(format!("advance to page {} failed: {}", page + 1, e));
                    break;
                }
            }
        }

        self.transition(PaginationState::Done);
        info!(
            "📚 Read {}/{} pages ({} rows)",
            report.pages_read, report.total_pages, report.rows_visible
        );
        Ok(report)
    }

    async fn submit_search(
        &self,
        browser: &mut dyn Browser,
        today: NaiveDate,
    ) -> Result<(), ScanError> {
        let portal = self.portal;
        let s = &portal.selectors;
        let (date_start, date_end) = search_window(today, portal.lookback_days);
        info!("🌍 Opening search: {} -> {}", date_start, date_end);

        browser
            .navigate(&portal.search_url, portal.navigation_timeout())
            .await
            .map_err(|source| ScanError::Navigation { stage: "navigation", source })?;

        let form = async {
            browser.fill(&s.date_start, &date_start).await?;
            browser.fill(&s.date_end, &date_end).await?;
            browser.select_option(&s.category, &portal.category_value).await?;
            info!("📝 Form filled, submitting search...");
            browser.click(&s.submit).await?;
            browser.wait_for_network_idle(portal.submit_timeout()).await
        };
        form.await
            .map_err(|source| ScanError::Navigation { stage: "search form", source })
    }

    /// Switches to the largest page size; false leaves the default view.
    async fn enlarge_page_size(&self, browser: &mut dyn Browser) -> bool {
        let portal = self.portal;
        let size = portal.max_page_size.to_string();
        let switched = async {
            browser.select_option(&portal.selectors.page_size, &size).await?;
            browser.wait_for_network_idle(portal.page_timeout()).await
        };
        match switched.await {
            Ok(()) => {
                info!("📄 Page size set to {}", size);
                true
            }
            Err(e) => {
                warn!(
                    "⚠️ Page size switch failed, paging by {}: {}",
                    portal.default_page_size, e
                );
                false
            }
        }
    }

    async fn read_page(
        &self,
        browser: &mut dyn Browser,
        page: u32,
        sink: &mut dyn RowSink,
        report: &mut HarvestReport,
    ) -> Result<(), BrowserError> {
        let rows = browser.rows(&self.portal.selectors.rows).await?;
        info!("🔎 Page {}/{}: {} rows", page, report.total_pages, rows.len());

        for row in rows {
            match row.is_visible().await {
                Ok(true) => {}
                Ok(false) => {
                    report.rows_hidden += 1;
                    continue;
                }
                Err(e) => {
                    debug!("Row visibility unknown, skipping: {}", e);
                    report.rows_hidden += 1;
                    continue;
                }
            }
            report.rows_visible += 1;
            let outcome = sink.accept(page, row.as_ref()).await;
            if let RowOutcome::Skipped(SkipReason::Unreadable(reason)) = outcome {
                debug!("Skipped unreadable row on page {}: {}", page, reason);
            }
        }
        Ok(())
    }

    async fn advance(&self, browser: &mut dyn Browser) -> Result<(), BrowserError> {
        browser.click(&self.portal.selectors.next_page).await?;
        browser.wait_for_network_idle(self.portal.page_timeout()).await
    }
}
