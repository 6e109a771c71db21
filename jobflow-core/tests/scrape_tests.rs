// Tests for scrape orchestration against a mock job board

use jobflow_core::config::ScrapeConfig;
use jobflow_core::preferences::{MISSING_REQUIRED_MESSAGE, PreferenceSet, TermSet};
use jobflow_core::progress::{ChannelPublisher, ScrapeProgress, ScrapeStatus};
use jobflow_core::scrape::{Scraper, pages_needed};
use jobflow_core::store::{
    CounterDelta, JobMeta, JobStore, MemoryStore, Result as StoreResult, StoredJob, UserStatistics,
};
use jobflow_scanner::{NormalizedJob, SiteProfile, ThrottleConfig};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER: &str = "user-42";

fn card(id: &str, title: &str, company: &str, location: &str) -> String {
    format!(
        r#"<div class="job_seen_beacon">
            <h2 class="jobTitle"><a data-jk="{id}" href="/rc/clk?jk={id}"><span title="{title}">{title}</span></a></h2>
            <span data-testid="company-name">{company}</span>
            <div data-testid="text-location">{location}</div>
            <div class="metadata"><div class="attribute_snippet">Full-time</div></div>
        </div>"#
    )
}

fn results_page(cards: &[String]) -> String {
    format!(
        "<html><body><div id=\"mosaic-jobResults\">{}</div></body></html>",
        cards.join("\n")
    )
}

/// `count` distinct Python jobs in New York for one page.
fn python_cards(page: usize, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            card(
                &format!("p{}-{}", page, i),
                &format!("Python Developer {}-{}", page, i),
                &format!("Company {}-{}", page, i),
                "New York, NY",
            )
        })
        .collect()
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

async fn mount_page(server: &MockServer, start: usize, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/jobs"))
        .and(query_param("start", start.to_string().as_str()))
        .respond_with(response)
        .mount(server)
        .await;
}

fn config(server: &MockServer) -> ScrapeConfig {
    ScrapeConfig {
        site: SiteProfile::default().with_base_url(server.uri()),
        max_pages: 10,
        run_timeout_secs: 30,
        request_timeout_secs: 5,
        max_retries: 0,
        throttle: ThrottleConfig::unthrottled(4),
        proxies_file: None,
        debug_dump_dir: None,
    }
}

fn python_in_new_york(budget: usize) -> PreferenceSet {
    PreferenceSet::new(TermSet::parse("python"), TermSet::parse("new york"))
        .unwrap()
        .with_result_budget(budget)
}

fn scraper<S: JobStore + 'static>(config: ScrapeConfig, store: Arc<S>) -> (Scraper, UnboundedReceiver<ScrapeProgress>) {
    let (publisher, receiver) = ChannelPublisher::new();
    (Scraper::new(config, store, Arc::new(publisher)), receiver)
}

fn drain(receiver: &mut UnboundedReceiver<ScrapeProgress>) -> Vec<ScrapeProgress> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

/// Exactly one terminal event, last, with non-decreasing counts before it.
fn assert_well_formed(events: &[ScrapeProgress]) {
    assert!(!events.is_empty(), "no progress published");

    let finished: Vec<_> = events.iter().filter(|e| e.spider_finished).collect();
    assert_eq!(finished.len(), 1, "expected one terminal event, got {:?}", events);
    assert!(events.last().unwrap().spider_finished);
    assert!(events.last().unwrap().status.is_terminal());

    for pair in events.windows(2) {
        assert!(
            pair[0].jobs_found <= pair[1].jobs_found,
            "jobsFound went backwards: {:?}",
            events
        );
    }
}

// ============================================================================
// Page Budget Tests
// ============================================================================

#[test]
fn test_pages_needed() {
    assert_eq!(pages_needed(50, 10), 4);
    assert_eq!(pages_needed(12, 10), 1);
    assert_eq!(pages_needed(13, 10), 2);
    assert_eq!(pages_needed(25, 10), 2);
    assert_eq!(pages_needed(1, 10), 1);
    assert_eq!(pages_needed(0, 10), 1);
    assert_eq!(pages_needed(1000, 10), 10);
    assert_eq!(pages_needed(1000, 0), 1);
}

// ============================================================================
// Successful Runs
// ============================================================================

#[tokio::test]
async fn test_run_collects_matching_jobs_from_every_page() {
    let server = MockServer::start().await;
    for page in 0..3 {
        let mut cards = python_cards(page, 2);
        cards.push(card(&format!("j{}", page), "Java Engineer", "Initech", "New York, NY"));
        mount_page(&server, page * 10, html(results_page(&cards))).await;
    }

    let store = Arc::new(MemoryStore::new());
    let (scraper, mut receiver) = scraper(config(&server), store.clone());

    let report = scraper.run(USER, &python_in_new_york(30)).await;

    assert_eq!(report.status, ScrapeStatus::Completed);
    assert_eq!(report.pages_requested, 3);
    assert_eq!(report.pages_completed, 3);
    assert_eq!(report.jobs_found, 6);

    let events = drain(&mut receiver);
    assert_well_formed(&events);
    assert_eq!(events[0], ScrapeProgress::running(0));
    assert_eq!(events.last().unwrap(), &ScrapeProgress::completed(6));

    let mut pages: Vec<usize> = events.iter().filter_map(|e| e.page_completed).collect();
    pages.sort();
    assert_eq!(pages, vec![1, 2, 3]);

    let stored = store.jobs_for_user(USER).unwrap();
    assert_eq!(stored.len(), 6);
    assert!(stored.iter().all(|s| s.job.title.starts_with("Python Developer")));
    assert!(stored.iter().all(|s| s.job.job_type == "Full-time"));
    assert!(stored.iter().all(|s| s.meta.search_query == "python"));
    assert!(stored.iter().all(|s| s.job.url.contains("/viewjob?jk=")));

    let stats = store.user_statistics(USER).unwrap().unwrap();
    assert_eq!(stats.total_jobs, 6);
    assert_eq!(stats.total_scrapes, 1);
}

#[tokio::test]
async fn test_search_url_carries_query_and_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs"))
        .and(query_param("q", "python OR django"))
        .and(query_param("l", "new york"))
        .and(query_param("radius", "25"))
        .and(query_param("start", "0"))
        .respond_with(html(results_page(&python_cards(0, 1))))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let (scraper, _receiver) = scraper(config(&server), store);
    let prefs = PreferenceSet::new(TermSet::parse("python,django"), TermSet::parse("New York"))
        .unwrap()
        .with_radius(25)
        .with_result_budget(5);

    let report = scraper.run(USER, &prefs).await;
    assert_eq!(report.status, ScrapeStatus::Completed);
    assert_eq!(report.jobs_found, 1);
}

#[tokio::test]
async fn test_budget_caps_accepted_jobs() {
    let server = MockServer::start().await;
    mount_page(&server, 0, html(results_page(&python_cards(0, 10)))).await;
    mount_page(&server, 10, html(results_page(&python_cards(1, 10)))).await;

    let store = Arc::new(MemoryStore::new());
    let (scraper, mut receiver) = scraper(config(&server), store.clone());

    // 13 listings need two pages, which carry 20 matches between them
    let report = scraper.run(USER, &python_in_new_york(13)).await;

    assert_eq!(report.status, ScrapeStatus::Completed);
    assert_eq!(report.pages_completed, 2);
    assert_eq!(report.jobs_found, 13);
    assert_eq!(store.jobs_for_user(USER).unwrap().len(), 13);

    let events = drain(&mut receiver);
    assert_well_formed(&events);
    assert_eq!(events.last().unwrap().jobs_found, 13);
}

#[tokio::test]
async fn test_same_listing_on_two_pages_counts_once() {
    let server = MockServer::start().await;
    let backend = |id: &str| card(id, "Backend Engineer", "Acme", "Remote");
    mount_page(&server, 0, html(results_page(&[backend("first-id")]))).await;
    mount_page(&server, 10, html(results_page(&[backend("second-id")]))).await;

    let store = Arc::new(MemoryStore::new());
    let (scraper, mut receiver) = scraper(config(&server), store.clone());
    let prefs = PreferenceSet::new(TermSet::parse("backend"), TermSet::parse("remote"))
        .unwrap()
        .with_result_budget(20);

    let report = scraper.run(USER, &prefs).await;

    assert_eq!(report.status, ScrapeStatus::Completed);
    assert_eq!(report.jobs_found, 1);
    assert_eq!(store.jobs_for_user(USER).unwrap().len(), 1);

    let events = drain(&mut receiver);
    assert_well_formed(&events);
    assert_eq!(events.last().unwrap().jobs_found, 1);
}

#[tokio::test]
async fn test_incomplete_cards_are_dropped() {
    let server = MockServer::start().await;
    let mut cards = python_cards(0, 1);
    // no company
    cards.push(
        r#"<div class="job_seen_beacon">
            <h2 class="jobTitle"><a data-jk="nocompany"><span title="Python Developer">Python Developer</span></a></h2>
            <div data-testid="text-location">New York, NY</div>
        </div>"#
            .to_string(),
    );
    mount_page(&server, 0, html(results_page(&cards))).await;

    let store = Arc::new(MemoryStore::new());
    let (scraper, _receiver) = scraper(config(&server), store.clone());

    let report = scraper.run(USER, &python_in_new_york(10)).await;
    assert_eq!(report.jobs_found, 1);
    assert_eq!(store.jobs_for_user(USER).unwrap()[0].job.external_id, "p0-0");
}

// ============================================================================
// Failure Handling
// ============================================================================

#[tokio::test]
async fn test_forbidden_page_fails_run_with_partial_count() {
    let server = MockServer::start().await;
    mount_page(&server, 0, html(results_page(&python_cards(0, 2)))).await;
    mount_page(&server, 10, html(results_page(&python_cards(1, 2)))).await;
    // the block lands after the other pages are in
    mount_page(
        &server,
        20,
        ResponseTemplate::new(403).set_delay(Duration::from_millis(500)),
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    let (scraper, mut receiver) = scraper(config(&server), store.clone());

    let report = scraper.run(USER, &python_in_new_york(30)).await;

    assert_eq!(report.status, ScrapeStatus::Failed);
    assert_eq!(report.jobs_found, 4);
    assert!(report.error_message.as_deref().unwrap().contains("403"));

    let events = drain(&mut receiver);
    assert_well_formed(&events);
    let terminal = events.last().unwrap();
    assert_eq!(terminal.status, ScrapeStatus::Failed);
    assert_eq!(terminal.jobs_found, 4);
    assert!(terminal.error_message.as_deref().unwrap().contains("403"));

    // failed runs are not counted as scrapes
    let stats = store.user_statistics(USER).unwrap().unwrap();
    assert_eq!(stats.total_jobs, 4);
    assert_eq!(stats.total_scrapes, 0);
}

#[tokio::test]
async fn test_challenge_redirect_fails_run() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        0,
        ResponseTemplate::new(302)
            .insert_header("location", format!("{}/account/login?dest=%2Fjobs", server.uri()).as_str()),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/account/login"))
        .respond_with(html("<html><body>Sign in</body></html>".to_string()))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let (scraper, mut receiver) = scraper(config(&server), store);

    let report = scraper.run(USER, &python_in_new_york(5)).await;

    assert_eq!(report.status, ScrapeStatus::Failed);
    assert!(report.error_message.as_deref().unwrap().contains("challenge"));

    let events = drain(&mut receiver);
    assert_well_formed(&events);
    assert_eq!(events.last().unwrap().status, ScrapeStatus::Failed);
}

#[tokio::test]
async fn test_timed_out_page_contributes_nothing() {
    let server = MockServer::start().await;
    mount_page(&server, 0, html(results_page(&python_cards(0, 3)))).await;
    mount_page(
        &server,
        10,
        html(results_page(&python_cards(1, 3))).set_delay(Duration::from_secs(3)),
    )
    .await;
    mount_page(&server, 20, html(results_page(&python_cards(2, 3)))).await;

    let mut config = config(&server);
    config.request_timeout_secs = 1;
    let store = Arc::new(MemoryStore::new());
    let (scraper, mut receiver) = scraper(config, store.clone());

    let report = scraper.run(USER, &python_in_new_york(30)).await;

    assert_eq!(report.status, ScrapeStatus::Completed);
    assert_eq!(report.jobs_found, 6);
    assert_eq!(report.pages_completed, 2);
    assert_eq!(report.pages_timed_out, 1);

    let events = drain(&mut receiver);
    assert_well_formed(&events);
    assert_eq!(events.last().unwrap(), &ScrapeProgress::completed(6));
    assert_eq!(store.user_statistics(USER).unwrap().unwrap().total_scrapes, 1);
}

#[tokio::test]
async fn test_run_timeout_completes_with_partial_results() {
    let server = MockServer::start().await;
    mount_page(&server, 0, html(results_page(&python_cards(0, 2)))).await;
    mount_page(
        &server,
        10,
        html(results_page(&python_cards(1, 2))).set_delay(Duration::from_secs(5)),
    )
    .await;

    let mut config = config(&server);
    config.run_timeout_secs = 1;
    config.request_timeout_secs = 10;
    let store = Arc::new(MemoryStore::new());
    let (scraper, mut receiver) = scraper(config, store);

    let report = scraper.run(USER, &python_in_new_york(20)).await;

    assert_eq!(report.status, ScrapeStatus::Completed);
    assert!(report.run_timed_out);
    assert_eq!(report.jobs_found, 2);

    let events = drain(&mut receiver);
    assert_well_formed(&events);
    assert_eq!(events.last().unwrap(), &ScrapeProgress::completed(2));
}

#[tokio::test]
async fn test_missing_preferences_fail_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(results_page(&[])))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let (scraper, mut receiver) = scraper(config(&server), store.clone());

    let report = scraper
        .run_payload(USER, &json!({ "title": "python", "location": "" }))
        .await;

    assert_eq!(report.status, ScrapeStatus::Failed);
    assert_eq!(report.error_message.as_deref(), Some(MISSING_REQUIRED_MESSAGE));

    let events = drain(&mut receiver);
    assert_eq!(events, vec![ScrapeProgress::failed(0, MISSING_REQUIRED_MESSAGE)]);
    assert!(store.user_statistics(USER).unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_base_url_fails_run() {
    let store = Arc::new(MemoryStore::new());
    let config = ScrapeConfig {
        site: SiteProfile::default().with_base_url("not a url"),
        ..ScrapeConfig::default()
    };
    let (scraper, mut receiver) = scraper(config, store);

    let report = scraper.run(USER, &python_in_new_york(5)).await;

    assert_eq!(report.status, ScrapeStatus::Failed);
    assert!(report.error_message.as_deref().unwrap().contains("Invalid search URL"));
    let events = drain(&mut receiver);
    assert_eq!(events.len(), 1);
    assert!(events[0].spider_finished);
}

#[tokio::test]
async fn test_closed_progress_channel_does_not_abort_run() {
    let server = MockServer::start().await;
    mount_page(&server, 0, html(results_page(&python_cards(0, 2)))).await;

    let store = Arc::new(MemoryStore::new());
    let (scraper, receiver) = scraper(config(&server), store.clone());
    drop(receiver);

    let report = scraper.run(USER, &python_in_new_york(5)).await;

    assert_eq!(report.status, ScrapeStatus::Completed);
    assert_eq!(report.jobs_found, 2);
    assert_eq!(store.jobs_for_user(USER).unwrap().len(), 2);
}

#[tokio::test]
async fn test_store_failure_drops_only_that_job() {
    let server = MockServer::start().await;
    mount_page(&server, 0, html(results_page(&python_cards(0, 3)))).await;

    let store = Arc::new(MemoryStore::new().with_failing_inserts_for("Python Developer 0-1"));
    let (scraper, mut receiver) = scraper(config(&server), store.clone());

    let report = scraper.run(USER, &python_in_new_york(10)).await;

    assert_eq!(report.status, ScrapeStatus::Completed);
    assert_eq!(report.jobs_found, 2);

    let stored: Vec<String> = store
        .jobs_for_user(USER)
        .unwrap()
        .into_iter()
        .map(|s| s.job.external_id)
        .collect();
    assert_eq!(stored, vec!["p0-0".to_string(), "p0-2".to_string()]);

    let events = drain(&mut receiver);
    assert_well_formed(&events);
    assert_eq!(events.last().unwrap(), &ScrapeProgress::completed(2));
    assert_eq!(store.user_statistics(USER).unwrap().unwrap().total_scrapes, 1);
}

// ============================================================================
// Retries
// ============================================================================

/// A board that hangs up on the first connection and serves `body` afterwards.
async fn flaky_board(body: String) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                drop(socket);
                continue;
            }
            let body = body.clone();
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}", address), connections)
}

fn flaky_config(base_url: String, max_retries: u32) -> ScrapeConfig {
    ScrapeConfig {
        site: SiteProfile::default().with_base_url(base_url),
        max_retries,
        request_timeout_secs: 5,
        throttle: ThrottleConfig::unthrottled(4),
        ..ScrapeConfig::default()
    }
}

#[tokio::test]
async fn test_dropped_connection_is_retried() {
    let (base_url, connections) = flaky_board(results_page(&python_cards(0, 2))).await;

    let store = Arc::new(MemoryStore::new());
    let (scraper, mut receiver) = scraper(flaky_config(base_url, 2), store.clone());

    let report = scraper.run(USER, &python_in_new_york(5)).await;

    assert_eq!(report.status, ScrapeStatus::Completed);
    assert_eq!(report.pages_completed, 1);
    assert_eq!(report.pages_failed, 0);
    assert_eq!(report.jobs_found, 2);
    assert_eq!(connections.load(Ordering::SeqCst), 2);

    let events = drain(&mut receiver);
    assert_well_formed(&events);
    assert_eq!(events.last().unwrap(), &ScrapeProgress::completed(2));
}

#[tokio::test]
async fn test_dropped_connection_without_retries_fails_page() {
    let (base_url, connections) = flaky_board(results_page(&python_cards(0, 2))).await;

    let store = Arc::new(MemoryStore::new());
    let (scraper, _receiver) = scraper(flaky_config(base_url, 0), store.clone());

    let report = scraper.run(USER, &python_in_new_york(5)).await;

    assert_eq!(report.status, ScrapeStatus::Completed);
    assert_eq!(report.pages_failed, 1);
    assert_eq!(report.jobs_found, 0);
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_timed_out_page_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs"))
        .and(query_param("start", "0"))
        .respond_with(html(results_page(&python_cards(0, 2))).set_delay(Duration::from_secs(3)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.request_timeout_secs = 1;
    config.max_retries = 3;
    let store = Arc::new(MemoryStore::new());
    let (scraper, _receiver) = scraper(config, store);

    let report = scraper.run(USER, &python_in_new_york(5)).await;

    assert_eq!(report.status, ScrapeStatus::Completed);
    assert_eq!(report.pages_timed_out, 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_blocked_page_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.max_retries = 3;
    let store = Arc::new(MemoryStore::new());
    let (scraper, _receiver) = scraper(config, store);

    let report = scraper.run(USER, &python_in_new_york(5)).await;

    assert_eq!(report.status, ScrapeStatus::Failed);
    assert!(report.error_message.as_deref().unwrap().contains("429"));
}

// ============================================================================
// Page Processing
// ============================================================================

/// Records the thread every insert runs on.
struct ThreadRecordingStore {
    inner: MemoryStore,
    insert_threads: Mutex<Vec<ThreadId>>,
}

impl JobStore for ThreadRecordingStore {
    fn find_duplicate(&self, user_id: &str, title: &str, company: &str, location: &str) -> StoreResult<bool> {
        self.inner.find_duplicate(user_id, title, company, location)
    }

    fn insert_job(&self, user_id: &str, job: &NormalizedJob, meta: &JobMeta) -> StoreResult<i64> {
        self.insert_threads.lock().unwrap().push(thread::current().id());
        self.inner.insert_job(user_id, job, meta)
    }

    fn increment_user_counters(&self, user_id: &str, delta: CounterDelta) -> StoreResult<()> {
        self.inner.increment_user_counters(user_id, delta)
    }

    fn jobs_for_user(&self, user_id: &str) -> StoreResult<Vec<StoredJob>> {
        self.inner.jobs_for_user(user_id)
    }

    fn user_statistics(&self, user_id: &str) -> StoreResult<Option<UserStatistics>> {
        self.inner.user_statistics(user_id)
    }
}

#[tokio::test]
async fn test_pages_are_processed_off_the_async_thread() {
    let server = MockServer::start().await;
    mount_page(&server, 0, html(results_page(&python_cards(0, 2)))).await;

    let store = Arc::new(ThreadRecordingStore {
        inner: MemoryStore::new(),
        insert_threads: Mutex::new(Vec::new()),
    });
    let (scraper, _receiver) = scraper(config(&server), store.clone());

    let report = scraper.run(USER, &python_in_new_york(5)).await;
    assert_eq!(report.jobs_found, 2);

    // the test runtime is single threaded, so async tasks run on this thread
    let async_thread = thread::current().id();
    let insert_threads = store.insert_threads.lock().unwrap();
    assert_eq!(insert_threads.len(), 2);
    assert!(insert_threads.iter().all(|id| *id != async_thread));
}

// ============================================================================
// Debug Dump
// ============================================================================

#[tokio::test]
async fn test_cardless_page_is_dumped_for_debugging() {
    let server = MockServer::start().await;
    mount_page(&server, 0, html("<html><body>Please verify you are human</body></html>".to_string())).await;

    let dump_dir = TempDir::new().unwrap();
    let mut config = config(&server);
    config.debug_dump_dir = Some(dump_dir.path().join("dumps"));
    let store = Arc::new(MemoryStore::new());
    let (scraper, _receiver) = scraper(config, store);

    let report = scraper.run(USER, &python_in_new_york(5)).await;
    assert_eq!(report.status, ScrapeStatus::Completed);
    assert_eq!(report.jobs_found, 0);

    let dumps: Vec<_> = std::fs::read_dir(dump_dir.path().join("dumps"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(dumps.len(), 1);
    let saved = std::fs::read_to_string(&dumps[0]).unwrap();
    assert!(saved.contains("verify you are human"));
}
