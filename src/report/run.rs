use crate::retry::{ErrorKind, IngestError};
use crate::store::{AppendReport, RecordStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

/// Counts for one source run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub source: String,
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Unique links returned by discovery
    pub discovered: usize,
    /// Discovered links not already in the merged store
    pub new_links: usize,
    pub saved: usize,
    pub duplicates: usize,
    /// Fetch or extract failures after retries
    pub failed: usize,
    /// Extracts rejected before persistence
    pub validation_failed: usize,
    /// Disallowed by robots.txt or left over at shutdown
    pub skipped: usize,
    /// Deferred to a backlog run by triage
    pub queued: usize,
    /// Dropped by triage
    pub ignored: usize,

    /// Fetch failures by kind
    pub failures: HashMap<ErrorKind, usize>,
    pub interrupted: bool,
}

impl RunReport {
    pub fn new(source: &str, mode: &str) -> Self {
        Self {
            source: source.to_string(),
            mode: mode.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            discovered: 0,
            new_links: 0,
            saved: 0,
            duplicates: 0,
            failed: 0,
            validation_failed: 0,
            skipped: 0,
            queued: 0,
            ignored: 0,
            failures: HashMap::new(),
            interrupted: false,
        }
    }

    /// Counts one per-link failure under its category
    pub fn record_failure(&mut self, error: &IngestError) {
        match error {
            IngestError::ValidationFailed(_) => self.validation_failed += 1,
            IngestError::Duplicate(_) => self.duplicates += 1,
            IngestError::Retryable { kind, .. } | IngestError::Terminal { kind, .. } => {
                self.failed += 1;
                *self.failures.entry(*kind).or_insert(0) += 1;
            }
        }
    }

    /// Adds the outcome of a store append
    pub fn absorb(&mut self, append: &AppendReport) {
        for (_, status) in &append.statuses {
            match status {
                RecordStatus::Saved => self.saved += 1,
                RecordStatus::Duplicate => self.duplicates += 1,
                RecordStatus::Failed(e) => self.record_failure(e),
            }
        }
    }

    pub fn failures_of(&self, kind: ErrorKind) -> usize {
        self.failures.get(&kind).copied().unwrap_or(0)
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: discovered {}, new {}, saved {}, duplicates {}, failed {}, invalid {}, skipped {}",
            self.source,
            self.mode,
            self.discovered,
            self.new_links,
            self.saved,
            self.duplicates,
            self.failed,
            self.validation_failed,
            self.skipped
        )?;
        if self.queued > 0 || self.ignored > 0 {
            write!(f, ", queued {}, ignored {}", self.queued, self.ignored)?;
        }
        if self.interrupted {
            write!(f, " (interrupted)")?;
        }
        Ok(())
    }
}

/// Prints a run report to stdout
pub fn print_run_report(report: &RunReport) {
    println!("=== {} ({}) ===", report.source, report.mode);
    println!("  Discovered:        {}", report.discovered);
    println!("  New links:         {}", report.new_links);
    println!("  Saved:             {}", report.saved);
    println!("  Duplicates:        {}", report.duplicates);
    println!("  Failed:            {}", report.failed);
    println!("  Validation failed: {}", report.validation_failed);
    println!("  Skipped:           {}", report.skipped);
    if report.queued > 0 || report.ignored > 0 {
        println!("  Triage queued:     {}", report.queued);
        println!("  Triage ignored:    {}", report.ignored);
    }

    if report.failed > 0 {
        println!("  Failures by kind:");
        for kind in ErrorKind::all() {
            let count = report.failures_of(kind);
            if count > 0 {
                println!("    {}: {}", kind, count);
            }
        }
    }

    if let Some(seconds) = report.duration_seconds() {
        println!("  Duration:          {}s", seconds);
    }
    if report.interrupted {
        println!("  Run was interrupted; remaining links will be picked up next run");
    }
    println!();
}
