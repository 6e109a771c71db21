use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ScrapeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScrapeStatus::Completed | ScrapeStatus::Failed)
    }
}

/// A progress message as it goes out on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeProgress {
    pub status: ScrapeStatus,
    pub jobs_found: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_completed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub spider_finished: bool,
}

impl ScrapeProgress {
    pub fn pending() -> Self {
        Self::running(0).with_status(ScrapeStatus::Pending)
    }

    pub fn running(jobs_found: usize) -> Self {
        Self {
            status: ScrapeStatus::Running,
            jobs_found,
            page_completed: None,
            error_message: None,
            spider_finished: false,
        }
    }

    pub fn page_completed(page: usize, jobs_found: usize) -> Self {
        Self {
            page_completed: Some(page),
            ..Self::running(jobs_found)
        }
    }

    pub fn completed(jobs_found: usize) -> Self {
        Self {
            status: ScrapeStatus::Completed,
            spider_finished: true,
            ..Self::running(jobs_found)
        }
    }

    pub fn failed(jobs_found: usize, error_message: impl Into<String>) -> Self {
        Self {
            status: ScrapeStatus::Failed,
            error_message: Some(error_message.into()),
            spider_finished: true,
            ..Self::running(jobs_found)
        }
    }

    fn with_status(mut self, status: ScrapeStatus) -> Self {
        self.status = status;
        self
    }
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Progress channel closed")]
    ChannelClosed,

    #[error("Failed to encode progress: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to write progress: {0}")]
    Io(#[from] std::io::Error),

    #[error("Progress sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for progress messages. Delivery is at most once.
pub trait ProgressPublisher: Send + Sync {
    fn publish(&self, progress: &ScrapeProgress) -> Result<(), PublishError>;
}

/// Publish and swallow failures, a broken sink must never abort a scrape.
pub fn publish_quietly(publisher: &dyn ProgressPublisher, progress: &ScrapeProgress) {
    if let Err(e) = publisher.publish(progress) {
        warn!("Dropped progress update ({:?}): {}", progress.status, e);
    }
}

/// Forwards progress into a tokio channel.
#[derive(Clone)]
pub struct ChannelPublisher {
    sender: mpsc::UnboundedSender<ScrapeProgress>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScrapeProgress>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressPublisher for ChannelPublisher {
    fn publish(&self, progress: &ScrapeProgress) -> Result<(), PublishError> {
        self.sender
            .send(progress.clone())
            .map_err(|_| PublishError::ChannelClosed)
    }
}

pub type ProgressCallback = Arc<dyn Fn(&ScrapeProgress) + Send + Sync>;

pub struct CallbackPublisher {
    callback: ProgressCallback,
}

impl CallbackPublisher {
    pub fn new(callback: ProgressCallback) -> Self {
        Self { callback }
    }
}

impl ProgressPublisher for CallbackPublisher {
    fn publish(&self, progress: &ScrapeProgress) -> Result<(), PublishError> {
        (self.callback)(progress);
        Ok(())
    }
}

/// Writes one JSON document per line.
pub struct JsonLinesPublisher<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesPublisher<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> ProgressPublisher for JsonLinesPublisher<W> {
    fn publish(&self, progress: &ScrapeProgress) -> Result<(), PublishError> {
        let line = serde_json::to_string(progress)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| PublishError::Unavailable(e.to_string()))?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Drops everything.
pub struct NullPublisher;

impl ProgressPublisher for NullPublisher {
    fn publish(&self, _progress: &ScrapeProgress) -> Result<(), PublishError> {
        Ok(())
    }
}
