use crate::adapter::{AdapterRegistry, SourceAdapter};
use crate::discovery::{DiscoveredLink, MergeOutcome};
use crate::orchestrator::{IngestContext, RunMode, RunOptions};
use crate::report::RunReport;
use crate::store::{ArticleRecord, RecordStatus, RunStatus};
use crate::triage::{route_by_priority, TriageStatus};
use crate::TidewaterError;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// Drives source runs over a shared [`IngestContext`]
///
/// For each source: discover (or load the triage backlog), drop links the
/// merged store already knows, triage, then extract each remaining link
/// under the retry policy and persist in batches of `flush-batch-size`.
pub struct Orchestrator {
    ctx: Arc<IngestContext>,
    registry: AdapterRegistry,
}

/// Links a run will try to extract
struct WorkList {
    links: Vec<DiscoveredLink>,
    /// Links with a stored triage record to mark scraped on success
    tracked: HashSet<String>,
}

impl Orchestrator {
    pub fn new(ctx: Arc<IngestContext>, registry: AdapterRegistry) -> Self {
        Self { ctx, registry }
    }

    pub fn context(&self) -> &Arc<IngestContext> {
        &self.ctx
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Runs several sources concurrently
    ///
    /// One source failing never stops the others.
    pub async fn run_all(
        &self,
        sources: &[String],
        options: &RunOptions,
    ) -> Vec<(String, Result<RunReport, TidewaterError>)> {
        let runs = sources.iter().map(|source| async move {
            let result = self.run_source(source, options).await;
            if let Err(e) = &result {
                tracing::error!("[{}] run failed: {}", source, e);
            }
            (source.clone(), result)
        });
        join_all(runs).await
    }

    /// Runs one source to completion or shutdown
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - the run finished or was interrupted cleanly
    /// * `Err(TidewaterError)` - unknown source, or a primary store write
    ///   failed and the run was aborted
    pub async fn run_source(
        &self,
        source: &str,
        options: &RunOptions,
    ) -> Result<RunReport, TidewaterError> {
        let adapter = self.registry.get(source)?;
        let store = self.ctx.store();
        let mode = options.mode;

        let mut report = RunReport::new(source, mode.as_str());
        let run_id = store
            .begin_run(source, mode.as_str(), self.ctx.config_hash())
            .await;
        tracing::info!("[{}] starting {} run", source, mode);

        let outcome = self.execute(adapter.as_ref(), options, &mut report).await;
        report.finish();

        let status = match &outcome {
            Err(_) => RunStatus::Failed,
            Ok(()) if report.interrupted => RunStatus::Interrupted,
            Ok(()) => RunStatus::Completed,
        };
        if let Some(run_id) = run_id {
            store.finish_run(run_id, status, &report).await;
        }

        outcome?;
        tracing::info!("{}", report);
        Ok(report)
    }

    async fn execute(
        &self,
        adapter: &dyn SourceAdapter,
        options: &RunOptions,
        report: &mut RunReport,
    ) -> Result<(), TidewaterError> {
        let source = adapter.name().to_string();
        let work = match options.mode {
            RunMode::Backlog => self.backlog(&source, report).await?,
            mode => self.discover(adapter, mode, report).await?,
        };

        let limit = options
            .max_articles
            .or_else(|| self.ctx.config().source(&source).and_then(|s| s.max_articles));
        self.extract_all(adapter, work, limit, report).await
    }

    async fn discover(
        &self,
        adapter: &dyn SourceAdapter,
        mode: RunMode,
        report: &mut RunReport,
    ) -> Result<WorkList, TidewaterError> {
        let source = adapter.name();
        let Some(scope) = mode.scope() else {
            return Ok(WorkList {
                links: Vec::new(),
                tracked: HashSet::new(),
            });
        };

        let merged = adapter.discover(scope).await;
        report.discovered = merged.links.len();
        match &merged.outcome {
            MergeOutcome::Complete => {}
            MergeOutcome::Partial { failed } => {
                tracing::warn!("[{}] source temporarily degraded ({} channels failed)", source, failed.len())
            }
            MergeOutcome::Empty { all_failed: true } => {
                tracing::warn!("[{}] source has no usable discovery channel", source)
            }
            MergeOutcome::Empty { all_failed: false } => {
                tracing::info!("[{}] discovery found nothing", source)
            }
        }

        let known = self.ctx.store().known_links().await?;
        let fresh: Vec<DiscoveredLink> = merged
            .links
            .into_iter()
            .filter(|link| !known.contains(&link.key()))
            .collect();
        report.new_links = fresh.len();
        tracing::info!(
            "[{}] {} discovered, {} new",
            source,
            report.discovered,
            report.new_links
        );

        let Some(engine) = self.ctx.triage() else {
            return Ok(WorkList {
                links: fresh,
                tracked: HashSet::new(),
            });
        };

        let scored = fresh.into_iter().map(|link| engine.triage(link)).collect();
        let routed = route_by_priority(scored);
        report.queued = routed.queued.len();
        report.ignored = routed.ignored.len();
        tracing::info!(
            "[{}] triage: {} now, {} queued, {} ignored",
            source,
            routed.immediate.len(),
            report.queued,
            report.ignored
        );

        let tracked = routed.immediate.iter().map(|r| r.link.url.clone()).collect();
        let links = routed.immediate.iter().map(|r| r.link.clone()).collect();
        let mut records = routed.immediate;
        records.extend(routed.queued);
        records.extend(routed.ignored);
        self.ctx.store().save_triage(records).await;

        Ok(WorkList { links, tracked })
    }

    async fn backlog(&self, source: &str, report: &mut RunReport) -> Result<WorkList, TidewaterError> {
        let queued = self
            .ctx
            .store()
            .triage_by_status(source, TriageStatus::Queued)
            .await;
        report.discovered = queued.len();

        let known = self.ctx.store().known_links().await?;
        let mut links = Vec::new();
        let mut tracked = HashSet::new();
        for record in queued {
            if known.contains(&record.link.key()) {
                // Stored by another source since it was queued
                self.ctx
                    .store()
                    .set_triage_status(&record.link.url, TriageStatus::Scraped)
                    .await;
                continue;
            }
            tracked.insert(record.link.url.clone());
            links.push(record.link);
        }
        report.new_links = links.len();
        tracing::info!("[{}] backlog: {} queued, {} to fetch", source, report.discovered, links.len());

        Ok(WorkList { links, tracked })
    }

    async fn extract_all(
        &self,
        adapter: &dyn SourceAdapter,
        work: WorkList,
        limit: Option<usize>,
        report: &mut RunReport,
    ) -> Result<(), TidewaterError> {
        let source = adapter.name();
        let config = self.ctx.config();
        let batch_size = config.store.flush_batch_size.max(1);
        let respect_robots = config.fetch.respect_robots;

        let total = work.links.len();
        let mut batch: Vec<ArticleRecord> = Vec::with_capacity(batch_size);
        let mut attempted = 0usize;

        for (index, link) in work.links.iter().enumerate() {
            if self.ctx.is_shutting_down() {
                report.interrupted = true;
                report.skipped += total - index;
                tracing::warn!("[{}] shutdown requested, {} links left", source, total - index);
                break;
            }
            if limit.is_some_and(|max| attempted >= max) {
                tracing::info!("[{}] article cap of {} reached", source, attempted);
                break;
            }

            if respect_robots {
                if let Ok(url) = Url::parse(&link.url) {
                    if !self.ctx.robots().is_allowed(&url).await {
                        report.skipped += 1;
                        continue;
                    }
                }
            }

            attempted += 1;
            let result = self
                .ctx
                .retry()
                .retry(&link.url, |_| adapter.extract(link))
                .await;

            match result {
                Ok(record) => {
                    tracing::debug!("[{}] extracted {}", source, link.url);
                    batch.push(record);
                    if batch.len() >= batch_size {
                        self.flush(source, std::mem::take(&mut batch), &work.tracked, report)
                            .await?;
                    }
                }
                Err(e) => {
                    tracing::warn!("[{}] {} failed: {}", source, link.url, e);
                    report.record_failure(&e);
                }
            }
        }

        if !batch.is_empty() {
            self.flush(source, batch, &work.tracked, report).await?;
        }
        Ok(())
    }

    /// Appends one batch and advances triage records of what was stored
    async fn flush(
        &self,
        source: &str,
        batch: Vec<ArticleRecord>,
        tracked: &HashSet<String>,
        report: &mut RunReport,
    ) -> Result<(), TidewaterError> {
        let size = batch.len();
        let append = match self.ctx.store().append(batch, source).await {
            Ok(append) => append,
            Err(e) => {
                tracing::error!("[{}] store write failed, aborting batch of {}: {}", source, size, e);
                return Err(e.into());
            }
        };
        report.absorb(&append);

        for (link, status) in &append.statuses {
            let stored = matches!(status, RecordStatus::Saved | RecordStatus::Duplicate);
            if stored && tracked.contains(link) {
                self.ctx
                    .store()
                    .set_triage_status(link, TriageStatus::Scraped)
                    .await;
            }
        }
        tracing::debug!(
            "[{}] flushed {}: {} saved, {} duplicates, {} invalid",
            source,
            size,
            append.saved,
            append.duplicates,
            append.failed
        );
        Ok(())
    }
}
