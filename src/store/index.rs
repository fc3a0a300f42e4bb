use crate::store::rows::{data_rows, LINK_COLUMN};
use crate::store::{StoreError, StoreResult};
use crate::url::canonical_key;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Links already durably recorded in one store file
///
/// Keys are canonical link keys. The file is re-read whenever its size on
/// disk differs from the size seen at the last read or write; links loaded
/// from an external database are kept across re-reads.
#[derive(Debug)]
pub struct LinkIndex {
    path: PathBuf,
    keys: HashSet<String>,
    external: HashSet<String>,
    cached_size: Option<u64>,
}

impl LinkIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keys: HashSet::new(),
            external: HashSet::new(),
            cached_size: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the file if its size changed
    ///
    /// Returns true when the file was re-read.
    pub fn refresh(&mut self) -> StoreResult<bool> {
        let size = file_size(&self.path)?;
        if self.cached_size == Some(size) {
            return Ok(false);
        }

        self.keys = read_link_keys(&self.path)?;
        self.cached_size = Some(size);
        tracing::debug!(
            "Indexed {} links from {}",
            self.keys.len(),
            self.path.display()
        );
        Ok(true)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key) || self.external.contains(key)
    }

    /// Adds a key written through the normal append path
    pub fn insert(&mut self, key: String) -> bool {
        self.keys.insert(key)
    }

    /// Adds links known to an external database
    pub fn extend_external<I: IntoIterator<Item = String>>(&mut self, links: I) {
        self.external
            .extend(links.into_iter().map(|link| link_key(&link)));
    }

    /// Records the file size after a write made through this index
    pub fn mark_written(&mut self, size: u64) {
        self.cached_size = Some(size);
    }

    /// Forces the next [`LinkIndex::refresh`] to re-read the file
    pub fn invalidate(&mut self) {
        self.cached_size = None;
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.keys.iter().chain(self.external.iter())
    }

    pub fn len(&self) -> usize {
        self.keys.union(&self.external).count()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.external.is_empty()
    }
}

/// Size of a store file; a missing file counts as empty
pub fn file_size(path: &Path) -> StoreResult<u64> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Reads the canonical keys of every link in a store file
pub fn read_link_keys(path: &Path) -> StoreResult<HashSet<String>> {
    let content = match std::fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    Ok(data_rows(&content)
        .into_iter()
        .filter_map(|row| row.get(LINK_COLUMN).cloned())
        .filter(|link| !link.trim().is_empty())
        .map(|link| link_key(&link))
        .collect())
}

/// Deduplication key of a link; unparsable links fall back to their trimmed text
pub fn link_key(link: &str) -> String {
    canonical_key(link).unwrap_or_else(|_| link.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::rows::{encode_row, header_line};
    use std::io::Write;
    use tempfile::TempDir;

    fn row(link: &str) -> String {
        encode_row(&["src", "title", "", "", link, "body"])
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut index = LinkIndex::new(dir.path().join("none.csv"));
        assert!(index.refresh().unwrap());
        assert!(index.is_empty());
        assert!(!index.refresh().unwrap());
    }

    #[test]
    fn test_reload_on_size_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("merged.csv");
        std::fs::write(&path, header_line() + &row("https://example.com/a")).unwrap();

        let mut index = LinkIndex::new(&path);
        index.refresh().unwrap();
        assert!(index.contains("https://example.com/a"));
        assert!(!index.contains("https://example.com/b"));

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(row("http://www.example.com/b/").as_bytes()).unwrap();
        drop(file);

        assert!(index.refresh().unwrap());
        assert!(index.contains("https://example.com/b"));
    }

    #[test]
    fn test_external_links_survive_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("merged.csv");
        let mut index = LinkIndex::new(&path);
        index.extend_external(vec!["https://db.example/x/".to_string()]);

        std::fs::write(&path, header_line()).unwrap();
        index.refresh().unwrap();

        assert!(index.contains("https://db.example/x"));
        assert_eq!(index.len(), 1);
    }
}
