//! Statistics read back from the record stores
//!
//! Counts come from the delimited files themselves, not from any index, so
//! they reflect exactly what a downstream reader would see.

use crate::config::StoreConfig;
use crate::store::{rows, SqliteStore, StoreError, StoreResult};
use std::path::{Path, PathBuf};

/// Row counts of every store under the data directory
#[derive(Debug, Clone, Default)]
pub struct StoreStatistics {
    pub data_dir: PathBuf,

    /// Rows in the shared merged store
    pub merged_rows: usize,

    /// `(source, rows)` for each per-source store, sorted by name
    pub per_source: Vec<(String, usize)>,

    /// Rows in the SQLite `articles` table, when configured and readable
    pub database_articles: Option<u64>,
}

impl StoreStatistics {
    pub fn total_source_rows(&self) -> usize {
        self.per_source.iter().map(|(_, rows)| rows).sum()
    }
}

/// Counts data rows in one store file; a missing file has none
pub fn count_rows(path: &Path) -> StoreResult<usize> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(rows::data_rows(&content).len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Loads statistics for the stores described by `config`
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - counts for every `.csv` store found
/// * `Err(StoreError)` - a store file exists but could not be read
pub fn load_statistics(config: &StoreConfig) -> StoreResult<StoreStatistics> {
    let data_dir = PathBuf::from(&config.data_dir);
    let mut stats = StoreStatistics {
        data_dir: data_dir.clone(),
        ..Default::default()
    };

    let entries = match std::fs::read_dir(&data_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(stats),
        Err(e) => return Err(StoreError::io(&data_dir, e)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(&data_dir, e))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let rows = count_rows(&path)?;
        if file_name == config.merged_file {
            stats.merged_rows = rows;
        } else if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            stats.per_source.push((stem.to_string(), rows));
        }
    }
    stats.per_source.sort();

    if let Some(db_path) = &config.database_path {
        if Path::new(db_path).exists() {
            match SqliteStore::open(Path::new(db_path)).and_then(|db| db.count_articles()) {
                Ok(count) => stats.database_articles = Some(count),
                Err(e) => tracing::warn!("Could not read {}: {}", db_path, e),
            }
        }
    }

    Ok(stats)
}

/// Prints store statistics to stdout
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Store Statistics ===\n");
    println!("Data directory: {}", stats.data_dir.display());
    println!("  Merged store rows: {}", stats.merged_rows);
    if let Some(count) = stats.database_articles {
        println!("  Database articles: {}", count);
    }
    println!();

    if stats.per_source.is_empty() {
        println!("No per-source stores yet.");
        return;
    }

    println!("Rows by Source:");
    let mut by_count: Vec<_> = stats.per_source.iter().collect();
    by_count.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (source, rows) in by_count {
        println!("  {}: {}", source, rows);
    }
    println!();

    println!(
        "Total: {} rows across {} sources ({} unique in merged store)",
        stats.total_source_rows(),
        stats.per_source.len(),
        stats.merged_rows
    );
}
