//! Store error types and the secondary-store interface

use crate::report::RunReport;
use crate::store::ArticleRecord;
use crate::triage::{TriageRecord, TriageStatus};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid source name: {0}")]
    InvalidSource(String),

    #[error("Invalid triage transition for {link}: {from} -> {to}")]
    InvalidTransition {
        link: String,
        from: TriageStatus,
        to: TriageStatus,
    },

    #[error("Corrupt row in secondary store: {0}")]
    CorruptRow(String),

    #[error("Store write queue is closed")]
    QueueClosed,
}

impl StoreError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Status of an ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Best-effort mirror of the file stores
///
/// Implementations run on the store's blocking worker, one call at a
/// time. Failures are logged by the caller and never fail a primary write.
pub trait SecondaryStore: Send {
    // ===== Articles =====

    /// Every article link the store holds
    fn known_links(&mut self) -> StoreResult<Vec<String>>;

    /// Inserts articles, ignoring links already present
    ///
    /// Returns the number of rows actually inserted.
    fn insert_articles(&mut self, records: &[ArticleRecord]) -> StoreResult<usize>;

    // ===== Runs =====

    /// Records the start of a run and returns its id
    fn begin_run(&mut self, source: &str, mode: &str, config_hash: &str) -> StoreResult<i64>;

    /// Records the end of a run with its counts
    fn finish_run(&mut self, run_id: i64, status: RunStatus, report: &RunReport) -> StoreResult<()>;

    // ===== Triage =====

    /// Inserts triage records; links already stored keep their row
    fn upsert_triage(&mut self, records: &[TriageRecord]) -> StoreResult<()>;

    /// Moves a record to `status`, enforcing one-way transitions
    fn set_triage_status(&mut self, link: &str, status: TriageStatus) -> StoreResult<()>;

    /// Records of a source currently in `status`, highest score first
    fn triage_by_status(&mut self, source: &str, status: TriageStatus) -> StoreResult<Vec<TriageRecord>>;
}
