// Scrape orchestration: budgeted concurrent page fetches feeding the
// extract -> filter -> dedup pipeline, with progress reporting.

use crate::config::ScrapeConfig;
use crate::filter::{self, Verdict};
use crate::preferences::{PreferenceError, PreferenceSet};
use crate::progress::{ProgressPublisher, ScrapeProgress, ScrapeStatus, publish_quietly};
use crate::store::{CounterDelta, InsertOutcome, JobMeta, JobStore, try_insert};
use jobflow_scanner::{
    FetchError, FetchedPage, IdentityPool, ListingExtractor, NormalizedJob, PageFetcher, Throttle,
    load_proxies,
};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Observed average number of listings on one results page.
pub const AVERAGE_LISTINGS_PER_PAGE: f64 = 12.5;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error(transparent)]
    InvalidPreferences(#[from] PreferenceError),

    #[error("Invalid search URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP client setup failed: {0}")]
    Client(String),

    #[error("Failed to load proxies: {0}")]
    Proxies(String),
}

/// Pages to request for a result budget, never fewer than one or more than `max_pages`.
pub fn pages_needed(result_budget: usize, max_pages: usize) -> usize {
    let pages = (result_budget as f64 / AVERAGE_LISTINGS_PER_PAGE).ceil() as usize;
    pages.clamp(1, max_pages.max(1))
}

/// Identity pool for a config, with the proxy file loaded when one is set.
pub fn load_identities(config: &ScrapeConfig) -> Result<IdentityPool, ScrapeError> {
    match &config.proxies_file {
        Some(path) => {
            let proxies =
                load_proxies(path).map_err(|e| ScrapeError::Proxies(format!("{}: {}", path.display(), e)))?;
            info!("Loaded {} proxies from {}", proxies.len(), path.display());
            Ok(IdentityPool::with_proxies(proxies))
        }
        None => Ok(IdentityPool::new()),
    }
}

/// Final account of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub status: ScrapeStatus,
    pub jobs_found: usize,
    pub pages_requested: usize,
    pub pages_completed: usize,
    pub pages_timed_out: usize,
    pub pages_failed: usize,
    /// True when the wall-clock limit cut the run short.
    pub run_timed_out: bool,
    pub error_message: Option<String>,
}

impl RunReport {
    fn new(pages_requested: usize) -> Self {
        Self {
            status: ScrapeStatus::Running,
            jobs_found: 0,
            pages_requested,
            pages_completed: 0,
            pages_timed_out: 0,
            pages_failed: 0,
            run_timed_out: false,
            error_message: None,
        }
    }

    fn failed_before_start(message: String) -> Self {
        Self {
            status: ScrapeStatus::Failed,
            error_message: Some(message),
            ..Self::new(0)
        }
    }
}

/// Per-page tallies, used for logging.
#[derive(Debug, Default, Clone, Copy)]
struct PageSummary {
    cards: usize,
    incomplete: usize,
    rejected: usize,
    accepted: usize,
    duplicates: usize,
    skipped: usize,
    store_errors: usize,
}

enum Acceptance {
    Accepted,
    Duplicate,
    Closed,
    StoreFailed,
}

/// State shared by every page task of one run.
struct RunContext {
    user_id: String,
    prefs: PreferenceSet,
    search_query: String,
    search_location: String,
    store: Arc<dyn JobStore>,
    publisher: Arc<dyn ProgressPublisher>,
    fetcher: PageFetcher,
    throttle: Throttle,
    identities: IdentityPool,
    extractor: ListingExtractor,
    max_retries: u32,
    debug_dump_dir: Option<std::path::PathBuf>,

    accepted: AtomicUsize,
    /// Serializes budget check, duplicate check and insert.
    gate: Mutex<()>,
    /// Serializes emission so jobsFound never goes backwards.
    emit: Mutex<()>,
    halted: AtomicBool,
    finished: AtomicBool,
    usage_counted: AtomicBool,
}

fn lock(mutex: &Mutex<()>) -> MutexGuard<'_, ()> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl RunContext {
    fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    fn accept(&self, job: &NormalizedJob) -> Acceptance {
        let _gate = lock(&self.gate);

        if self.halted.load(Ordering::SeqCst) || self.accepted() >= self.prefs.result_budget() {
            return Acceptance::Closed;
        }

        let meta = JobMeta::new(&self.search_query, &self.search_location);
        match try_insert(self.store.as_ref(), &self.user_id, job, &meta) {
            Ok(InsertOutcome::Inserted(id)) => {
                let total = self.accepted.fetch_add(1, Ordering::SeqCst) + 1;
                debug!("Accepted job {} ({} at {}), {} so far", id, job.title, job.company_name, total);
                Acceptance::Accepted
            }
            Ok(InsertOutcome::DuplicateSkipped) => Acceptance::Duplicate,
            Err(e) => {
                warn!("Failed to store {} at {}: {}", job.title, job.company_name, e);
                Acceptance::StoreFailed
            }
        }
    }

    /// Publish a non-terminal update, dropped once the run has finished.
    fn emit(&self, build: impl FnOnce(usize) -> ScrapeProgress) {
        let _emit = lock(&self.emit);
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        publish_quietly(self.publisher.as_ref(), &build(self.accepted()));
    }

    /// Publish the one terminal event. Returns false if the run already finished.
    fn finish(&self, status: ScrapeStatus, error_message: Option<String>) -> bool {
        let _gate = lock(&self.gate);
        self.halted.store(true, Ordering::SeqCst);

        let _emit = lock(&self.emit);
        if self.finished.swap(true, Ordering::SeqCst) {
            return false;
        }

        let jobs_found = self.accepted();
        let progress = match status {
            ScrapeStatus::Failed => {
                ScrapeProgress::failed(jobs_found, error_message.unwrap_or_default())
            }
            _ => ScrapeProgress::completed(jobs_found),
        };
        publish_quietly(self.publisher.as_ref(), &progress);

        if status == ScrapeStatus::Completed && !self.usage_counted.swap(true, Ordering::SeqCst) {
            if let Err(e) = self
                .store
                .increment_user_counters(&self.user_id, CounterDelta::scrape_completed())
            {
                warn!("Failed to record scrape for user {}: {}", self.user_id, e);
            }
        }
        true
    }

    async fn fetch_with_retries(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut attempt = 0;
        loop {
            let permit = self.throttle.acquire().await.map_err(|e| FetchError::Client {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

            let identity = self.identities.next();
            let started = Instant::now();
            let result = self.fetcher.fetch(url, &identity).await;
            drop(permit);

            let err = match result {
                Ok(page) => {
                    self.throttle.record_response(page.response_time, true);
                    return Ok(page);
                }
                Err(err) => err,
            };

            match &err {
                FetchError::Blocked { .. } => self.throttle.record_response(started.elapsed(), false),
                FetchError::Timeout { .. } | FetchError::Transport { .. } => {
                    self.throttle.record_failure()
                }
                _ => {}
            }

            if err.is_retryable() && attempt < self.max_retries {
                attempt += 1;
                warn!("{} (retry {}/{} with a fresh identity)", err, attempt, self.max_retries);
                continue;
            }
            return Err(err);
        }
    }

    fn process_page(&self, page_number: usize, page: &FetchedPage) -> PageSummary {
        let extraction = self.extractor.extract_page(&page.body, &page.url);
        if extraction.cards_found == 0 {
            self.dump_page(page_number, page);
        }

        let mut summary = PageSummary {
            cards: extraction.cards_found,
            incomplete: extraction.incomplete,
            ..Default::default()
        };

        for job in extraction.jobs {
            if let Verdict::Rejected(criterion) = filter::evaluate(&job, &self.prefs) {
                debug!("Rejected {} at {} on {}", job.title, job.company_name, criterion);
                summary.rejected += 1;
                continue;
            }

            match self.accept(&job) {
                Acceptance::Accepted => summary.accepted += 1,
                Acceptance::Duplicate => summary.duplicates += 1,
                Acceptance::Closed => summary.skipped += 1,
                Acceptance::StoreFailed => summary.store_errors += 1,
            }
        }

        summary
    }

    fn dump_page(&self, page_number: usize, page: &FetchedPage) {
        let Some(dir) = &self.debug_dump_dir else {
            return;
        };
        let file = dir.join(format!(
            "page-{}-{}.html",
            page_number,
            chrono::Utc::now().format("%Y%m%dT%H%M%S")
        ));
        match write_dump(dir, &file, &page.body) {
            Ok(()) => info!("Saved card-less page {} to {}", page_number, file.display()),
            Err(e) => warn!("Failed to save page {} to {}: {}", page_number, file.display(), e),
        }
    }
}

fn write_dump(dir: &Path, file: &Path, body: &str) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(file, body)
}

async fn scrape_page(
    ctx: Arc<RunContext>,
    page_number: usize,
    url: String,
) -> Result<PageSummary, FetchError> {
    let page = ctx.fetch_with_retries(&url).await?;

    // parsing and sqlite writes stay off the async workers
    let worker = Arc::clone(&ctx);
    let processed =
        tokio::task::spawn_blocking(move || worker.process_page(page_number, &page)).await;
    let summary = match processed {
        Ok(summary) => summary,
        Err(join_err) => match join_err.try_into_panic() {
            Ok(payload) => std::panic::resume_unwind(payload),
            Err(join_err) => {
                warn!("Processing of page {} was cancelled: {}", page_number, join_err);
                return Ok(PageSummary::default());
            }
        },
    };

    debug!(
        "Page {}: {} cards, {} incomplete, {} rejected, {} accepted, {} duplicates, {} past budget, {} store errors",
        page_number,
        summary.cards,
        summary.incomplete,
        summary.rejected,
        summary.accepted,
        summary.duplicates,
        summary.skipped,
        summary.store_errors
    );

    ctx.emit(|jobs_found| ScrapeProgress::page_completed(page_number, jobs_found));
    Ok(summary)
}

/// Runs one search for one user.
pub struct Scraper {
    config: ScrapeConfig,
    store: Arc<dyn JobStore>,
    publisher: Arc<dyn ProgressPublisher>,
    identities: IdentityPool,
}

impl Scraper {
    pub fn new(
        config: ScrapeConfig,
        store: Arc<dyn JobStore>,
        publisher: Arc<dyn ProgressPublisher>,
    ) -> Self {
        Self {
            config,
            store,
            publisher,
            identities: IdentityPool::new(),
        }
    }

    pub fn with_identities(mut self, identities: IdentityPool) -> Self {
        self.identities = identities;
        self
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Parse a raw preference payload and run it.
    pub async fn run_payload(&self, user_id: &str, payload: &Value) -> RunReport {
        match PreferenceSet::from_value(payload) {
            Ok(prefs) => self.run(user_id, &prefs).await,
            Err(e) => self.fail_before_start(user_id, ScrapeError::from(e)),
        }
    }

    /// Scrape, filter and store listings. Always publishes exactly one terminal event.
    pub async fn run(&self, user_id: &str, prefs: &PreferenceSet) -> RunReport {
        let started = Instant::now();
        let (ctx, urls) = match self.prepare(user_id, prefs) {
            Ok(prepared) => prepared,
            Err(e) => return self.fail_before_start(user_id, e),
        };

        info!(
            "Scraping {} page(s) for user {}: '{}' in '{}' (budget {})",
            urls.len(),
            user_id,
            ctx.search_query,
            ctx.search_location,
            prefs.result_budget()
        );

        let mut report = RunReport::new(urls.len());
        ctx.emit(ScrapeProgress::running);

        let mut tasks = JoinSet::new();
        for (index, url) in urls.into_iter().enumerate() {
            let ctx = Arc::clone(&ctx);
            let page_number = index + 1;
            tasks.spawn(async move { (page_number, scrape_page(ctx, page_number, url).await) });
        }

        let deadline = tokio::time::Instant::now() + self.config.run_timeout();
        loop {
            let joined = match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(joined)) => joined,
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Run timeout of {:?} reached, abandoning {} outstanding page(s)",
                        self.config.run_timeout(),
                        tasks.len()
                    );
                    tasks.abort_all();
                    report.run_timed_out = true;
                    break;
                }
            };

            match joined {
                Ok((_, Ok(_))) => report.pages_completed += 1,
                Ok((page_number, Err(err))) if err.is_fatal() => {
                    error!("Page {} blocked, failing run: {}", page_number, err);
                    let message = err.to_string();
                    ctx.finish(ScrapeStatus::Failed, Some(message.clone()));
                    tasks.abort_all();
                    report.status = ScrapeStatus::Failed;
                    report.error_message = Some(message);
                    break;
                }
                Ok((page_number, Err(err))) => {
                    warn!("Page {} contributed nothing: {}", page_number, err);
                    match err {
                        FetchError::Timeout { .. } => report.pages_timed_out += 1,
                        _ => report.pages_failed += 1,
                    }
                }
                Err(join_err) => {
                    error!("Page task ended abnormally: {}", join_err);
                    report.pages_failed += 1;
                }
            }
        }

        if report.status != ScrapeStatus::Failed {
            ctx.finish(ScrapeStatus::Completed, None);
            report.status = ScrapeStatus::Completed;
        }
        report.jobs_found = ctx.accepted();

        info!(
            "Scrape {:?} for user {}: {} job(s) from {}/{} page(s) in {:.1}s",
            report.status,
            user_id,
            report.jobs_found,
            report.pages_completed,
            report.pages_requested,
            started.elapsed().as_secs_f64()
        );

        report
    }

    fn prepare(
        &self,
        user_id: &str,
        prefs: &PreferenceSet,
    ) -> Result<(Arc<RunContext>, Vec<String>), ScrapeError> {
        let site = self.config.site.clone();
        let search_query = prefs.search_query();
        let search_location = prefs.search_location().to_string();

        let pages = pages_needed(prefs.result_budget(), self.config.max_pages);
        let urls = (0..pages)
            .map(|page| site.search_url(&search_query, &search_location, prefs.radius(), page))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ScrapeError::InvalidUrl(e.to_string()))?;

        let fetcher = PageFetcher::new(site.clone(), self.config.request_timeout())
            .map_err(|e| ScrapeError::Client(e.to_string()))?;

        let ctx = RunContext {
            user_id: user_id.to_string(),
            prefs: prefs.clone(),
            search_query,
            search_location,
            store: Arc::clone(&self.store),
            publisher: Arc::clone(&self.publisher),
            fetcher,
            throttle: Throttle::new(self.config.throttle.clone()),
            identities: self.identities.clone(),
            extractor: ListingExtractor::new(site),
            max_retries: self.config.max_retries,
            debug_dump_dir: self.config.debug_dump_dir.clone(),
            accepted: AtomicUsize::new(0),
            gate: Mutex::new(()),
            emit: Mutex::new(()),
            halted: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            usage_counted: AtomicBool::new(false),
        };

        Ok((Arc::new(ctx), urls))
    }

    fn fail_before_start(&self, user_id: &str, err: ScrapeError) -> RunReport {
        let message = err.to_string();
        error!("Scrape for user {} failed before start: {}", user_id, message);
        publish_quietly(self.publisher.as_ref(), &ScrapeProgress::failed(0, message.clone()));
        RunReport::failed_before_start(message)
    }
}
