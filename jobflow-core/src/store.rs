use chrono::{DateTime, Utc};
use jobflow_scanner::NormalizedJob;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Search context stored alongside each accepted job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMeta {
    pub search_query: String,
    pub search_location: String,
    pub scraped_at: DateTime<Utc>,
}

impl JobMeta {
    pub fn new(search_query: impl Into<String>, search_location: impl Into<String>) -> Self {
        Self {
            search_query: search_query.into(),
            search_location: search_location.into(),
            scraped_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredJob {
    pub id: i64,
    pub user_id: String,
    #[serde(flatten)]
    pub job: NormalizedJob,
    #[serde(flatten)]
    pub meta: JobMeta,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    pub total_jobs: i64,
    pub current_jobs: i64,
    pub total_scrapes: i64,
}

impl CounterDelta {
    pub fn job_accepted() -> Self {
        Self {
            total_jobs: 1,
            current_jobs: 1,
            total_scrapes: 0,
        }
    }

    pub fn scrape_completed() -> Self {
        Self {
            total_scrapes: 1,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatistics {
    pub user_id: String,
    pub total_jobs: i64,
    pub current_jobs: i64,
    pub total_scrapes: i64,
}

/// Persistence consumed by the scrape orchestrator.
pub trait JobStore: Send + Sync {
    /// Duplicates are keyed on the listing text, not the site id.
    fn find_duplicate(&self, user_id: &str, title: &str, company: &str, location: &str) -> Result<bool>;

    fn insert_job(&self, user_id: &str, job: &NormalizedJob, meta: &JobMeta) -> Result<i64>;

    fn increment_user_counters(&self, user_id: &str, delta: CounterDelta) -> Result<()>;

    fn jobs_for_user(&self, user_id: &str) -> Result<Vec<StoredJob>>;

    fn user_statistics(&self, user_id: &str) -> Result<Option<UserStatistics>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    DuplicateSkipped,
}

/// Insert a job unless an identical listing is already stored for the user.
///
/// Counter updates after an insert are advisory: a failure is logged and the
/// insert stands.
pub fn try_insert(
    store: &dyn JobStore,
    user_id: &str,
    job: &NormalizedJob,
    meta: &JobMeta,
) -> Result<InsertOutcome> {
    if store.find_duplicate(user_id, &job.title, &job.company_name, &job.location)? {
        debug!(
            "Duplicate listing skipped: {} at {} ({})",
            job.title, job.company_name, job.location
        );
        return Ok(InsertOutcome::DuplicateSkipped);
    }

    let id = store.insert_job(user_id, job, meta)?;

    if let Err(e) = store.increment_user_counters(user_id, CounterDelta::job_accepted()) {
        warn!("Failed to update job counters for user {}: {}", user_id, e);
    }

    Ok(InsertOutcome::Inserted(id))
}

/// SQLite-backed store.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn drop(path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("connection lock poisoned: {}", e)))
    }

    fn init_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    external_id TEXT NOT NULL,
    title TEXT NOT NULL,
    company_name TEXT NOT NULL,
    location TEXT NOT NULL DEFAULT '',
    job_type TEXT NOT NULL DEFAULT '',
    salary TEXT,
    benefits TEXT,
    description TEXT,
    url TEXT NOT NULL,

    -- Search that produced the listing
    search_query TEXT NOT NULL,
    search_location TEXT NOT NULL,
    scraped_at INTEGER NOT NULL
);

-- Not unique: the duplicate check is done by the writer
CREATE INDEX IF NOT EXISTS idx_jobs_dedup ON jobs(user_id, title, company_name, location);
CREATE INDEX IF NOT EXISTS idx_jobs_user ON jobs(user_id, scraped_at);

CREATE TABLE IF NOT EXISTS user_statistics (
    user_id TEXT PRIMARY KEY,
    total_jobs INTEGER NOT NULL DEFAULT 0,
    current_jobs INTEGER NOT NULL DEFAULT 0,
    total_scrapes INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL
);
            ",
        )?;
        Ok(())
    }
}

impl JobStore for Database {
    fn find_duplicate(&self, user_id: &str, title: &str, company: &str, location: &str) -> Result<bool> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT 1 FROM jobs WHERE user_id = ?1 AND title = ?2 AND company_name = ?3 AND location = ?4 LIMIT 1",
        )?;
        let found = stmt
            .query_row(params![user_id, title, company, location], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn insert_job(&self, user_id: &str, job: &NormalizedJob, meta: &JobMeta) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO jobs (
                user_id, external_id, title, company_name, location, job_type,
                salary, benefits, description, url,
                search_query, search_location, scraped_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                user_id,
                &job.external_id,
                &job.title,
                &job.company_name,
                &job.location,
                &job.job_type,
                &job.salary,
                &job.benefits,
                &job.description,
                &job.url,
                &meta.search_query,
                &meta.search_location,
                meta.scraped_at.timestamp(),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn increment_user_counters(&self, user_id: &str, delta: CounterDelta) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user_statistics (user_id, total_jobs, current_jobs, total_scrapes, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                total_jobs = total_jobs + excluded.total_jobs,
                current_jobs = current_jobs + excluded.current_jobs,
                total_scrapes = total_scrapes + excluded.total_scrapes,
                updated_at = excluded.updated_at",
            params![
                user_id,
                delta.total_jobs,
                delta.current_jobs,
                delta.total_scrapes,
                Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    fn jobs_for_user(&self, user_id: &str) -> Result<Vec<StoredJob>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, external_id, title, company_name, location, job_type,
                    salary, benefits, description, url,
                    search_query, search_location, scraped_at
             FROM jobs WHERE user_id = ?1 ORDER BY id",
        )?;

        let jobs = stmt
            .query_map(params![user_id], |row| {
                let scraped_at: i64 = row.get(13)?;
                Ok(StoredJob {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    job: NormalizedJob {
                        external_id: row.get(2)?,
                        title: row.get(3)?,
                        company_name: row.get(4)?,
                        location: row.get(5)?,
                        job_type: row.get(6)?,
                        salary: row.get(7)?,
                        benefits: row.get(8)?,
                        description: row.get(9)?,
                        url: row.get(10)?,
                    },
                    meta: JobMeta {
                        search_query: row.get(11)?,
                        search_location: row.get(12)?,
                        scraped_at: DateTime::from_timestamp(scraped_at, 0).unwrap_or_default(),
                    },
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(jobs)
    }

    fn user_statistics(&self, user_id: &str) -> Result<Option<UserStatistics>> {
        let conn = self.conn()?;
        let stats = conn
            .query_row(
                "SELECT user_id, total_jobs, current_jobs, total_scrapes FROM user_statistics WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(UserStatistics {
                        user_id: row.get(0)?,
                        total_jobs: row.get(1)?,
                        current_jobs: row.get(2)?,
                        total_scrapes: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(stats)
    }
}

#[derive(Default)]
struct MemoryState {
    jobs: Vec<StoredJob>,
    statistics: HashMap<String, UserStatistics>,
}

/// Process-local store, mostly for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_counters: AtomicBool,
    failing_titles: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every counter update fail, inserts keep working.
    pub fn with_failing_counters(self) -> Self {
        self.fail_counters.store(true, Ordering::SeqCst);
        self
    }

    /// Make inserts of jobs with this exact title fail.
    pub fn with_failing_inserts_for(mut self, title: impl Into<String>) -> Self {
        self.failing_titles.push(title.into());
        self
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("memory store poisoned: {}", e)))
    }
}

impl JobStore for MemoryStore {
    fn find_duplicate(&self, user_id: &str, title: &str, company: &str, location: &str) -> Result<bool> {
        Ok(self.state()?.jobs.iter().any(|stored| {
            stored.user_id == user_id
                && stored.job.title == title
                && stored.job.company_name == company
                && stored.job.location == location
        }))
    }

    fn insert_job(&self, user_id: &str, job: &NormalizedJob, meta: &JobMeta) -> Result<i64> {
        if self.failing_titles.iter().any(|title| *title == job.title) {
            return Err(StoreError::Unavailable(format!("insert rejected for {}", job.title)));
        }
        let mut state = self.state()?;
        let id = state.jobs.len() as i64 + 1;
        state.jobs.push(StoredJob {
            id,
            user_id: user_id.to_string(),
            job: job.clone(),
            meta: meta.clone(),
        });
        Ok(id)
    }

    fn increment_user_counters(&self, user_id: &str, delta: CounterDelta) -> Result<()> {
        if self.fail_counters.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("counter updates disabled".to_string()));
        }
        let mut state = self.state()?;
        let stats = state
            .statistics
            .entry(user_id.to_string())
            .or_insert_with(|| UserStatistics {
                user_id: user_id.to_string(),
                ..Default::default()
            });
        stats.total_jobs += delta.total_jobs;
        stats.current_jobs += delta.current_jobs;
        stats.total_scrapes += delta.total_scrapes;
        Ok(())
    }

    fn jobs_for_user(&self, user_id: &str) -> Result<Vec<StoredJob>> {
        Ok(self
            .state()?
            .jobs
            .iter()
            .filter(|stored| stored.user_id == user_id)
            .cloned()
            .collect())
    }

    fn user_statistics(&self, user_id: &str) -> Result<Option<UserStatistics>> {
        Ok(self.state()?.statistics.get(user_id).cloned())
    }
}
