use crate::store::index::{file_size, LinkIndex};
use crate::store::rows::header_line;
use crate::store::{ArticleRecord, RecordStatus, SecondaryStore, StoreError, StoreResult};
use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};

/// Operation run against the secondary store, if one is configured
pub(crate) type SecondaryOp = Box<dyn FnOnce(Option<&mut (dyn SecondaryStore + 'static)>) + Send>;

/// Work item for the write queue
pub(crate) enum Job {
    Append {
        source: String,
        records: Vec<ArticleRecord>,
        reply: oneshot::Sender<StoreResult<Vec<RecordStatus>>>,
    },
    SourceKeys {
        source: String,
        reply: oneshot::Sender<StoreResult<HashSet<String>>>,
    },
    MergedKeys {
        reply: oneshot::Sender<StoreResult<HashSet<String>>>,
    },
    Secondary(SecondaryOp),
    Shutdown,
}

/// Owns the store files; runs every job strictly in arrival order
pub(crate) struct StoreWriter {
    data_dir: PathBuf,
    merged: LinkIndex,
    per_source: HashMap<String, LinkIndex>,
    secondary: Option<Box<dyn SecondaryStore>>,
}

impl StoreWriter {
    pub(crate) fn new(
        data_dir: PathBuf,
        merged_file: &str,
        secondary: Option<Box<dyn SecondaryStore>>,
    ) -> Self {
        let mut merged = LinkIndex::new(data_dir.join(merged_file));
        let mut secondary = secondary;

        if let Some(db) = secondary.as_mut() {
            match db.known_links() {
                Ok(links) => {
                    tracing::debug!("Loaded {} links from secondary store", links.len());
                    merged.extend_external(links);
                }
                Err(e) => tracing::warn!("Secondary store links unavailable: {}", e),
            }
        }

        Self {
            data_dir,
            merged,
            per_source: HashMap::new(),
            secondary,
        }
    }

    /// Processes jobs until shutdown or until every sender is gone
    ///
    /// Runs on a blocking thread. A failing job is reported to its caller
    /// and the loop moves on to the next one.
    pub(crate) fn run(mut self, mut jobs: mpsc::Receiver<Job>) {
        while let Some(job) = jobs.blocking_recv() {
            match job {
                Job::Append {
                    source,
                    records,
                    reply,
                } => {
                    let result = self.append(&source, &records);
                    if let Err(e) = &result {
                        tracing::error!("Append for {} failed: {}", source, e);
                    }
                    let _ = reply.send(result);
                }
                Job::SourceKeys { source, reply } => {
                    let result: StoreResult<HashSet<String>> = self
                        .source_index(&source)
                        .map(|index| index.keys().cloned().collect());
                    let _ = reply.send(result);
                }
                Job::MergedKeys { reply } => {
                    let result: StoreResult<HashSet<String>> = self
                        .merged
                        .refresh()
                        .map(|_| self.merged.keys().cloned().collect());
                    let _ = reply.send(result);
                }
                Job::Secondary(op) => {
                    op(self.secondary.as_deref_mut());
                }
                Job::Shutdown => break,
            }
        }
        tracing::debug!("Store write queue stopped");
    }

    fn source_path(&self, source: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", source))
    }

    fn source_index(&mut self, source: &str) -> StoreResult<&mut LinkIndex> {
        let path = self.source_path(source);
        let index = self
            .per_source
            .entry(source.to_string())
            .or_insert_with(|| LinkIndex::new(path));
        index.refresh()?;
        Ok(index)
    }

    /// Writes a validated batch to the per-source and merged stores
    ///
    /// The per-source store skips links it already holds; the merged store
    /// additionally skips links known to the secondary store. Statuses are
    /// aligned with `records`.
    fn append(&mut self, source: &str, records: &[ArticleRecord]) -> StoreResult<Vec<RecordStatus>> {
        self.merged.refresh()?;

        let source_index = self.source_index(source)?;
        let mut source_rows = String::new();
        let mut source_keys = Vec::new();
        for record in records {
            let key = record.key();
            if !source_index.contains(&key) && !source_keys.contains(&key) {
                source_rows.push_str(&record.to_row());
                source_keys.push(key);
            }
        }

        let mut merged_rows = String::new();
        let mut merged_keys: HashSet<String> = HashSet::new();
        let mut written = Vec::new();
        let mut statuses = Vec::with_capacity(records.len());
        for record in records {
            let key = record.key();
            if self.merged.contains(&key) || !merged_keys.insert(key) {
                statuses.push(RecordStatus::Duplicate);
            } else {
                merged_rows.push_str(&record.to_row());
                written.push(record.clone());
                statuses.push(RecordStatus::Saved);
            }
        }

        let source_path = self.source_path(source);
        let source_index = self.source_index(source)?;
        match append_rows(&source_path, &source_rows) {
            Ok(size) => {
                for key in source_keys {
                    source_index.insert(key);
                }
                source_index.mark_written(size);
            }
            Err(e) => {
                source_index.invalidate();
                return Err(e);
            }
        }

        let merged_path = self.merged.path().to_path_buf();
        match append_rows(&merged_path, &merged_rows) {
            Ok(size) => {
                for key in merged_keys {
                    self.merged.insert(key);
                }
                self.merged.mark_written(size);
            }
            Err(e) => {
                self.merged.invalidate();
                return Err(e);
            }
        }

        if let Some(db) = self.secondary.as_mut() {
            if !written.is_empty() {
                if let Err(e) = db.insert_articles(&written) {
                    tracing::warn!("Secondary store write failed for {}: {}", source, e);
                }
            }
        }

        Ok(statuses)
    }
}

/// Appends rows to a store file, writing the header first if it is empty
///
/// Returns the file size afterwards.
fn append_rows(path: &Path, rows: &str) -> StoreResult<u64> {
    if rows.is_empty() {
        return file_size(path);
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;

    let existing = file.metadata().map_err(|e| StoreError::io(path, e))?.len();
    let mut buffer = String::with_capacity(rows.len() + 64);
    if existing == 0 {
        buffer.push_str(&header_line());
    }
    buffer.push_str(rows);

    file.write_all(buffer.as_bytes())
        .and_then(|_| file.sync_data())
        .map_err(|e| StoreError::io(path, e))?;

    Ok(file.metadata().map_err(|e| StoreError::io(path, e))?.len())
}
