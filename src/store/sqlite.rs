//! SQLite secondary store
//!
//! Mirrors saved articles, records runs and keeps triage records with
//! their status. Nothing here is authoritative: the delimited files are.

use crate::discovery::{DiscoveredLink, DiscoveryMethod};
use crate::report::RunReport;
use crate::store::schema::initialize_schema;
use crate::store::{ArticleRecord, RunStatus, SecondaryStore, StoreError, StoreResult};
use crate::triage::{Priority, TriageRecord, TriageStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Separator for list-valued columns
const LIST_SEPARATOR: &str = "|";

/// SQLite secondary store backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Number of stored articles
    pub fn count_articles(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Current triage status of a link, if stored
    pub fn triage_status(&self, link: &str) -> StoreResult<Option<TriageStatus>> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM triage WHERE link = ?1",
                params![link],
                |row| row.get(0),
            )
            .optional()?;

        status
            .map(|s| {
                TriageStatus::from_db_string(&s)
                    .ok_or_else(|| StoreError::CorruptRow(format!("triage status '{}'", s)))
            })
            .transpose()
    }

    /// Latest run status for a source
    pub fn latest_run_status(&self, source: &str) -> StoreResult<Option<RunStatus>> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM runs WHERE source = ?1 ORDER BY id DESC LIMIT 1",
                params![source],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status.and_then(|s| RunStatus::from_db_string(&s)))
    }
}

impl SecondaryStore for SqliteStore {
    // ===== Articles =====

    fn known_links(&mut self) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT link FROM articles")?;
        let links = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(links)
    }

    fn insert_articles(&mut self, records: &[ArticleRecord]) -> StoreResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO articles (source, title, date, author, link, extract, scraped_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for record in records {
                inserted += stmt.execute(params![
                    record.source,
                    record.title,
                    record.date,
                    record.author,
                    record.link.trim(),
                    record.extract,
                    record.scraped_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    // ===== Runs =====

    fn begin_run(&mut self, source: &str, mode: &str, config_hash: &str) -> StoreResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (source, mode, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![source, mode, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus, report: &RunReport) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, discovered = ?3, new_links = ?4,
             saved = ?5, duplicates = ?6, failed = ?7, validation_failed = ?8, skipped = ?9
             WHERE id = ?10",
            params![
                status.to_db_string(),
                now,
                report.discovered as i64,
                report.new_links as i64,
                report.saved as i64,
                report.duplicates as i64,
                report.failed as i64,
                report.validation_failed as i64,
                report.skipped as i64,
                run_id
            ],
        )?;
        Ok(())
    }

    // ===== Triage =====

    fn upsert_triage(&mut self, records: &[TriageRecord]) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO triage
                 (link, source, method, title, description, published, author, categories,
                  score, priority, status, matched_keywords, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for record in records {
                let link = &record.link;
                stmt.execute(params![
                    link.url,
                    link.source,
                    link.method.as_str(),
                    link.title,
                    link.description,
                    link.published.map(|d| d.to_rfc3339()),
                    link.author,
                    link.categories.join(LIST_SEPARATOR),
                    record.score,
                    record.priority.as_str(),
                    record.status.to_db_string(),
                    record.matched_keywords.join(LIST_SEPARATOR),
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn set_triage_status(&mut self, link: &str, status: TriageStatus) -> StoreResult<()> {
        let current = match self.triage_status(link)? {
            Some(current) => current,
            None => return Ok(()),
        };

        if current == status {
            return Ok(());
        }

        if !current.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                link: link.to_string(),
                from: current,
                to: status,
            });
        }

        self.conn.execute(
            "UPDATE triage SET status = ?1, updated_at = ?2 WHERE link = ?3",
            params![status.to_db_string(), Utc::now().to_rfc3339(), link],
        )?;
        Ok(())
    }

    fn triage_by_status(&mut self, source: &str, status: TriageStatus) -> StoreResult<Vec<TriageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT link, source, method, title, description, published, author, categories,
             score, priority, status, matched_keywords
             FROM triage WHERE source = ?1 AND status = ?2 ORDER BY score DESC, id ASC",
        )?;

        let rows = stmt
            .query_map(params![source, status.to_db_string()], |row| {
                Ok(TriageRow {
                    link: row.get(0)?,
                    source: row.get(1)?,
                    method: row.get(2)?,
                    title: row.get(3)?,
                    description: row.get(4)?,
                    published: row.get(5)?,
                    author: row.get(6)?,
                    categories: row.get(7)?,
                    score: row.get(8)?,
                    priority: row.get(9)?,
                    status: row.get(10)?,
                    matched_keywords: row.get(11)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(TriageRow::into_record).collect()
    }
}

/// Raw triage row before enum decoding
struct TriageRow {
    link: String,
    source: String,
    method: String,
    title: Option<String>,
    description: Option<String>,
    published: Option<String>,
    author: Option<String>,
    categories: String,
    score: f64,
    priority: String,
    status: String,
    matched_keywords: String,
}

impl TriageRow {
    fn into_record(self) -> StoreResult<TriageRecord> {
        let corrupt = |what: &str, value: &str| StoreError::CorruptRow(format!("{} '{}'", what, value));

        let method = DiscoveryMethod::from_db_string(&self.method)
            .ok_or_else(|| corrupt("discovery method", &self.method))?;
        let priority =
            Priority::from_db_string(&self.priority).ok_or_else(|| corrupt("priority", &self.priority))?;
        let status =
            TriageStatus::from_db_string(&self.status).ok_or_else(|| corrupt("status", &self.status))?;

        let mut link = DiscoveredLink::new(self.link, self.source, method);
        link.title = self.title;
        link.description = self.description;
        link.published = self
            .published
            .and_then(|d| DateTime::parse_from_rfc3339(&d).ok())
            .map(|d| d.with_timezone(&Utc));
        link.author = self.author;
        link.categories = split_list(&self.categories);

        Ok(TriageRecord {
            link,
            score: self.score,
            priority,
            status,
            matched_keywords: split_list(&self.matched_keywords),
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(LIST_SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triage(url: &str, status: TriageStatus, score: f64) -> TriageRecord {
        let mut link = DiscoveredLink::new(url.to_string(), "wire".to_string(), DiscoveryMethod::Rss);
        link.title = Some("FDA approves drug".to_string());
        link.categories = vec!["health".to_string(), "policy".to_string()];
        TriageRecord {
            link,
            score,
            priority: Priority::Medium,
            status,
            matched_keywords: vec!["fda".to_string()],
        }
    }

    #[test]
    fn test_insert_articles_ignores_duplicates() {
        let mut db = SqliteStore::open_in_memory().unwrap();
        let rec = ArticleRecord::new("wire", "https://e.com/1").with_extract("body");

        assert_eq!(db.insert_articles(&[rec.clone()]).unwrap(), 1);
        assert_eq!(db.insert_articles(&[rec]).unwrap(), 0);
        assert_eq!(db.count_articles().unwrap(), 1);
        assert_eq!(db.known_links().unwrap(), vec!["https://e.com/1".to_string()]);
    }

    #[test]
    fn test_run_lifecycle() {
        let mut db = SqliteStore::open_in_memory().unwrap();
        let id = db.begin_run("wire", "full", "abc123").unwrap();
        assert_eq!(db.latest_run_status("wire").unwrap(), Some(RunStatus::Running));

        let report = RunReport::new("wire", "full");
        db.finish_run(id, RunStatus::Completed, &report).unwrap();
        assert_eq!(db.latest_run_status("wire").unwrap(), Some(RunStatus::Completed));
    }

    #[test]
    fn test_triage_round_trip_and_order() {
        let mut db = SqliteStore::open_in_memory().unwrap();
        db.upsert_triage(&[
            triage("https://e.com/low", TriageStatus::Queued, 0.55),
            triage("https://e.com/high", TriageStatus::Queued, 0.75),
            triage("https://e.com/other", TriageStatus::Ignored, 0.1),
        ])
        .unwrap();

        let queued = db.triage_by_status("wire", TriageStatus::Queued).unwrap();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].link.url, "https://e.com/high");
        assert_eq!(queued[0].link.categories, vec!["health", "policy"]);
        assert_eq!(queued[0].matched_keywords, vec!["fda"]);
    }

    #[test]
    fn test_triage_status_is_one_way() {
        let mut db = SqliteStore::open_in_memory().unwrap();
        db.upsert_triage(&[triage("https://e.com/a", TriageStatus::Queued, 0.6)])
            .unwrap();

        db.set_triage_status("https://e.com/a", TriageStatus::Scraped)
            .unwrap();
        assert_eq!(
            db.triage_status("https://e.com/a").unwrap(),
            Some(TriageStatus::Scraped)
        );

        let err = db
            .set_triage_status("https://e.com/a", TriageStatus::Pending)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[test]
    fn test_upsert_keeps_existing_status() {
        let mut db = SqliteStore::open_in_memory().unwrap();
        db.upsert_triage(&[triage("https://e.com/a", TriageStatus::Scraped, 0.9)])
            .unwrap();
        db.upsert_triage(&[triage("https://e.com/a", TriageStatus::Pending, 0.9)])
            .unwrap();
        assert_eq!(
            db.triage_status("https://e.com/a").unwrap(),
            Some(TriageStatus::Scraped)
        );
    }
}
