// One scan attempt: harvest, filter, alert, remember.
use crate::analyzer::{sort_for_dispatch, ScoringEngine};
use crate::config::PortalConfig;
use crate::model::{Offer, RowOutcome, ScanError, SkipReason};
use crate::notifier::AlertDispatcher;
use crate::parser::TenderExtractor;
use crate::scraper::{BrowserLauncher, HarvestReport, PaginationController, RowHandle, RowSink};
use crate::storage::{SeenSet, SeenStore};
use crate::supervisor::{Clock, Scanner};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowStats {
    pub accepted: usize,
    pub already_seen: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub unreadable: usize,
}

impl RowStats {
    fn record(&mut self, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Accepted => self.accepted += 1,
            RowOutcome::Skipped(SkipReason::AlreadySeen) => self.already_seen += 1,
            RowOutcome::Skipped(SkipReason::Duplicate) => self.duplicates += 1,
            RowOutcome::Skipped(SkipReason::Rejected(_)) => self.rejected += 1,
            RowOutcome::Skipped(SkipReason::Unreadable(_)) => self.unreadable += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub harvest: HarvestReport,
    pub rows: RowStats,
    pub dispatched: usize,
    pub delivery_failures: usize,
}

/// Row sink that runs the dedup check, extraction and scoring.
struct ScanCollector<'a> {
    extractor: &'a TenderExtractor,
    engine: &'a ScoringEngine,
    seen: &'a SeenSet,
    this_attempt: HashSet<String>,
    accepted: Vec<Offer>,
    stats: RowStats,
}

impl<'a> ScanCollector<'a> {
    fn new(extractor: &'a TenderExtractor, engine: &'a ScoringEngine, seen: &'a SeenSet) -> Self {
        Self {
            extractor,
            engine,
            seen,
            this_attempt: HashSet::new(),
            accepted: Vec::new(),
            stats: RowStats::default(),
        }
    }

    async fn evaluate(&mut self, row: &dyn RowHandle) -> RowOutcome {
        let fingerprint = match self.extractor.fingerprint(row).await {
            Ok(fp) => fp,
            Err(e) => return RowOutcome::Skipped(SkipReason::Unreadable(e.to_string())),
        };
        if self.seen.contains(&fingerprint) {
            return RowOutcome::Skipped(SkipReason::AlreadySeen);
        }
        if self.this_attempt.contains(&fingerprint) {
            return RowOutcome::Skipped(SkipReason::Duplicate);
        }

        let offer = match self.extractor.extract(row, fingerprint).await {
            Ok(offer) => offer,
            Err(e) => return RowOutcome::Skipped(SkipReason::Unreadable(e.to_string())),
        };
        self.this_attempt.insert(offer.fingerprint.clone());

        let verdict = self.engine.score(&offer.object_text, &offer.buyer);
        if !verdict.is_accepted() {
            debug!("   ⛔ {} ({})", offer.buyer, verdict.tag);
            return RowOutcome::Skipped(SkipReason::Rejected(verdict.tag));
        }

        if verdict.is_priority() {
            info!("      🚜 Priority buyer match ({})", offer.buyer);
        } else {
            info!("      ✅ Match {} score {} ({})", verdict.tag, verdict.score, offer.buyer);
        }
        self.accepted.push(offer.with_verdict(verdict));
        RowOutcome::Accepted
    }

    fn finish(self) -> (Vec<Offer>, RowStats) {
        (self.accepted, self.stats)
    }
}

#[async_trait::async_trait]
impl<'a> RowSink for ScanCollector<'a> {
    async fn accept(&mut self, page: u32, row: &dyn RowHandle) -> RowOutcome {
        let outcome = self.evaluate(row).await;
        debug!("Page {} row -> {:?}", page, outcome);
        self.stats.record(&outcome);
        outcome
    }
}

pub struct TenderScanner {
    portal: PortalConfig,
    launcher: Arc<dyn BrowserLauncher>,
    extractor: TenderExtractor,
    engine: ScoringEngine,
    store: SeenStore,
    dispatcher: Arc<AlertDispatcher>,
    clock: Arc<dyn Clock>,
}

impl TenderScanner {
    pub fn new(
        portal: PortalConfig,
        launcher: Arc<dyn BrowserLauncher>,
        engine: ScoringEngine,
        store: SeenStore,
        dispatcher: Arc<AlertDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let extractor = TenderExtractor::new(&portal);
        Self { portal, launcher, extractor, engine, store, dispatcher, clock }
    }
}

#[async_trait::async_trait]
impl Scanner for TenderScanner {
    async fn scan(&self) -> Result<ScanReport, ScanError> {
        let mut seen = self.store.load().await;
        let today = self.clock.now().date_naive();

        let mut browser = self.launcher.launch().await.map_err(ScanError::Launch)?;
        let mut collector = ScanCollector::new(&self.extractor, &self.engine, &seen);
        let harvest = PaginationController::new(&self.portal)
            .run(browser.as_mut(), today, &mut collector)
            .await;
        browser.close().await;
        let harvest = harvest?;

        let (mut accepted, stats) = collector.finish();
        info!(
            "🧮 {} new matches, {} already seen, {} rejected, {} unreadable",
            stats.accepted, stats.already_seen, stats.rejected, stats.unreadable
        );

        let mut report = ScanReport { harvest, rows: stats, ..Default::default() };
        if accepted.is_empty() {
            info!("Ø Nothing new.");
        } else {
            sort_for_dispatch(&mut accepted);
            let summary = self.dispatcher.dispatch_all(&accepted).await;
            report.dispatched = summary.dispatched.len();
            report.delivery_failures = summary.failed;
            seen.merge(summary.dispatched);
        }

        if let Err(e) = self.store.persist(&seen).await {
            error!("❌ Cannot save seen offers to {}: {}", self.store.path().display(), e);
        }
        Ok(report)
    }
}
