//! Durable article storage
//!
//! This module handles all record persistence, including:
//! - Per-source delimited stores and one shared merged store
//! - Link deduplication through a cached, size-checked `LinkIndex`
//! - A single write queue that serializes every store mutation
//! - An optional SQLite secondary store (articles, runs, triage)

mod index;
mod queue;
mod record;
pub mod rows;
mod schema;
mod sqlite;
mod traits;

pub use index::{file_size, link_key, read_link_keys, LinkIndex};
pub use record::ArticleRecord;
pub use schema::initialize_schema;
pub use sqlite::SqliteStore;
pub use traits::{RunStatus, SecondaryStore, StoreError, StoreResult};

use crate::config::StoreConfig;
use crate::report::RunReport;
use crate::retry::IngestError;
use crate::triage::{TriageRecord, TriageStatus};
use queue::{Job, StoreWriter};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Jobs buffered ahead of the writer
const QUEUE_DEPTH: usize = 256;

/// Outcome of one record in an append
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStatus {
    /// Written to the merged store
    Saved,
    /// Already present in the merged store (or earlier in the batch)
    Duplicate,
    /// Rejected before reaching the queue
    Failed(IngestError),
}

/// Per-record and aggregate result of [`ArticleStore::append`]
#[derive(Debug, Clone, Default)]
pub struct AppendReport {
    pub saved: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// `(link, status)` in input order
    pub statuses: Vec<(String, RecordStatus)>,
}

impl AppendReport {
    fn push(&mut self, link: String, status: RecordStatus) {
        match status {
            RecordStatus::Saved => self.saved += 1,
            RecordStatus::Duplicate => self.duplicates += 1,
            RecordStatus::Failed(_) => self.failed += 1,
        }
        self.statuses.push((link, status));
    }

    pub fn merge(&mut self, other: AppendReport) {
        self.saved += other.saved;
        self.duplicates += other.duplicates;
        self.failed += other.failed;
        self.statuses.extend(other.statuses);
    }
}

/// Handle to the record stores
///
/// Cloning is not needed: share it behind an `Arc`. Every mutation and
/// every index read goes through one FIFO write queue served by a blocking
/// worker, so concurrent callers never interleave partial writes.
pub struct ArticleStore {
    jobs: mpsc::Sender<Job>,
    worker: Mutex<Option<JoinHandle<()>>>,
    data_dir: PathBuf,
    merged_file: String,
    min_extract_length: usize,
}

impl ArticleStore {
    /// Opens the stores described by `config`
    ///
    /// Creates the data directory if needed and opens the SQLite secondary
    /// store when `database-path` is set. A secondary store that cannot be
    /// opened is logged and left out. Must be called inside a Tokio runtime.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let secondary: Option<Box<dyn SecondaryStore>> = match &config.database_path {
            Some(path) => match SqliteStore::open(Path::new(path)) {
                Ok(db) => Some(Box::new(db)),
                Err(e) => {
                    tracing::warn!("Secondary store {} unavailable: {}", path, e);
                    None
                }
            },
            None => None,
        };
        Self::open_with_secondary(config, secondary)
    }

    /// Opens the stores with an explicit secondary store
    pub fn open_with_secondary(
        config: &StoreConfig,
        secondary: Option<Box<dyn SecondaryStore>>,
    ) -> StoreResult<Self> {
        let data_dir = PathBuf::from(&config.data_dir);
        std::fs::create_dir_all(&data_dir).map_err(|e| StoreError::io(&data_dir, e))?;

        let (jobs, receiver) = mpsc::channel(QUEUE_DEPTH);
        let writer_dir = data_dir.clone();
        let merged_file = config.merged_file.clone();
        let worker = tokio::task::spawn_blocking(move || {
            StoreWriter::new(writer_dir, &merged_file, secondary).run(receiver)
        });

        tracing::info!("Record store opened at {}", data_dir.display());

        Ok(Self {
            jobs,
            worker: Mutex::new(Some(worker)),
            data_dir,
            merged_file: config.merged_file.clone(),
            min_extract_length: config.min_extract_length,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn merged_path(&self) -> PathBuf {
        self.data_dir.join(&self.merged_file)
    }

    pub fn source_path(&self, source: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", source))
    }

    pub fn min_extract_length(&self) -> usize {
        self.min_extract_length
    }

    /// Durably records a batch for one source
    ///
    /// Invalid records are rejected up front and never reach the queue.
    /// Valid records go to the source's own store (once per link) and to the
    /// merged store unless the link is already known there.
    ///
    /// # Returns
    ///
    /// * `Ok(AppendReport)` - per-record statuses, in input order
    /// * `Err(StoreError)` - the primary write failed; nothing after the
    ///   failing file was written for this batch
    pub async fn append(
        &self,
        records: Vec<ArticleRecord>,
        source: &str,
    ) -> StoreResult<AppendReport> {
        check_source_name(source)?;

        let mut outcome: Vec<Option<(String, RecordStatus)>> = Vec::with_capacity(records.len());
        let mut valid = Vec::new();
        for record in records {
            match record.validate(self.min_extract_length) {
                Ok(()) => {
                    outcome.push(None);
                    valid.push(record);
                }
                Err(e) => {
                    tracing::debug!("Rejected {}: {}", record.link, e);
                    outcome.push(Some((record.link, RecordStatus::Failed(e))));
                }
            }
        }

        let links: Vec<String> = valid.iter().map(|r| r.link.clone()).collect();
        let statuses = if valid.is_empty() {
            Vec::new()
        } else {
            let (reply, response) = oneshot::channel();
            self.submit(Job::Append {
                source: source.to_string(),
                records: valid,
                reply,
            })
            .await?;
            response.await.map_err(|_| StoreError::QueueClosed)??
        };

        let mut written = links.into_iter().zip(statuses);
        let mut report = AppendReport::default();
        for slot in outcome {
            let (link, status) = match slot {
                Some(rejected) => rejected,
                None => match written.next() {
                    Some(entry) => entry,
                    None => break,
                },
            };
            report.push(link, status);
        }

        tracing::debug!(
            "Appended for {}: {} saved, {} duplicates, {} failed",
            source,
            report.saved,
            report.duplicates,
            report.failed
        );
        Ok(report)
    }

    /// Canonical keys of every link in a source's own store
    pub async fn existing_links(&self, source: &str) -> StoreResult<HashSet<String>> {
        check_source_name(source)?;
        let (reply, response) = oneshot::channel();
        self.submit(Job::SourceKeys {
            source: source.to_string(),
            reply,
        })
        .await?;
        response.await.map_err(|_| StoreError::QueueClosed)?
    }

    /// Canonical keys of every link in the merged store and secondary store
    ///
    /// Re-reads the merged store if its size changed since the last look.
    pub async fn known_links(&self) -> StoreResult<HashSet<String>> {
        let (reply, response) = oneshot::channel();
        self.submit(Job::MergedKeys { reply }).await?;
        response.await.map_err(|_| StoreError::QueueClosed)?
    }

    /// Whether a link is already recorded in the merged store
    pub async fn is_known(&self, link: &str) -> StoreResult<bool> {
        let key = link_key(link);
        Ok(self.known_links().await?.contains(&key))
    }

    /// Runs an operation on the secondary store inside the write queue
    ///
    /// Returns `Ok(None)` when no secondary store is configured.
    pub async fn with_secondary<T, F>(&self, op: F) -> StoreResult<Option<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn SecondaryStore) -> StoreResult<T> + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        self.submit(Job::Secondary(Box::new(move |secondary| {
            let result = secondary.map(|db| op(db)).transpose();
            let _ = reply.send(result);
        })))
        .await?;
        response.await.map_err(|_| StoreError::QueueClosed)?
    }

    /// Records the start of a run; `None` without a secondary store
    pub async fn begin_run(&self, source: &str, mode: &str, config_hash: &str) -> Option<i64> {
        let (source, mode, hash) = (source.to_string(), mode.to_string(), config_hash.to_string());
        self.best_effort("begin run", move |db| db.begin_run(&source, &mode, &hash))
            .await
    }

    /// Records the end of a run
    pub async fn finish_run(&self, run_id: i64, status: RunStatus, report: &RunReport) {
        let report = report.clone();
        self.best_effort("finish run", move |db| db.finish_run(run_id, status, &report))
            .await;
    }

    /// Persists triage records; existing links keep their stored status
    pub async fn save_triage(&self, records: Vec<TriageRecord>) {
        if records.is_empty() {
            return;
        }
        self.best_effort("save triage", move |db| db.upsert_triage(&records))
            .await;
    }

    /// Moves a stored triage record to a new status
    pub async fn set_triage_status(&self, link: &str, status: TriageStatus) {
        let link = link.to_string();
        self.best_effort("update triage", move |db| {
            db.set_triage_status(&link, status)
        })
        .await;
    }

    /// Stored triage records of a source in the given status
    pub async fn triage_by_status(&self, source: &str, status: TriageStatus) -> Vec<TriageRecord> {
        let source = source.to_string();
        self.best_effort("load triage", move |db| db.triage_by_status(&source, status))
            .await
            .unwrap_or_default()
    }

    /// Drains the write queue and stops the worker
    ///
    /// Jobs submitted before this call complete first. Later calls to any
    /// store method fail with [`StoreError::QueueClosed`].
    pub async fn shutdown(&self) {
        let _ = self.jobs.send(Job::Shutdown).await;
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!("Store writer ended abnormally: {}", e);
            }
        }
    }

    async fn submit(&self, job: Job) -> StoreResult<()> {
        self.jobs.send(job).await.map_err(|_| StoreError::QueueClosed)
    }

    async fn best_effort<T, F>(&self, what: &str, op: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn SecondaryStore) -> StoreResult<T> + Send + 'static,
    {
        match self.with_secondary(op).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Secondary store: {} failed: {}", what, e);
                None
            }
        }
    }
}

/// Source names become file stems, so they are restricted
fn check_source_name(source: &str) -> StoreResult<()> {
    let valid = !source.is_empty()
        && source
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidSource(source.to_string()))
    }
}
