use crate::retry::IngestError;
use crate::store::rows::{self, HEADER};
use crate::store::link_key;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One extracted article
///
/// `link` is the record's global identity. A record is only persisted once
/// it passes [`ArticleRecord::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleRecord {
    pub source: String,
    pub title: String,
    /// Publication date as the site presents it
    pub date: String,
    pub author: String,
    pub link: String,
    /// Body text, abstract or extract
    pub extract: String,
    pub scraped_at: DateTime<Utc>,
}

impl ArticleRecord {
    pub fn new(source: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            title: String::new(),
            date: String::new(),
            author: String::new(),
            link: link.into(),
            extract: String::new(),
            scraped_at: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_extract(mut self, extract: impl Into<String>) -> Self {
        self.extract = extract.into();
        self
    }

    /// Rejects records without a link or with a too-short extract
    pub fn validate(&self, min_extract_length: usize) -> Result<(), IngestError> {
        if self.link.trim().is_empty() {
            return Err(IngestError::ValidationFailed(format!(
                "record '{}' has no link",
                self.title
            )));
        }

        let length = self.extract.trim().chars().count();
        if length == 0 || length < min_extract_length {
            return Err(IngestError::ValidationFailed(format!(
                "extract for {} is {} characters, need {}",
                self.link, length, min_extract_length
            )));
        }

        Ok(())
    }

    /// Deduplication key of the link
    pub fn key(&self) -> String {
        link_key(&self.link)
    }

    /// Encodes the record as one delimited row, newline included
    pub fn to_row(&self) -> String {
        rows::encode_row(&[
            &self.source,
            &self.title,
            &self.date,
            &self.author,
            self.link.trim(),
            &self.extract,
        ])
    }

    /// Rebuilds a record from a parsed row
    ///
    /// `scraped_at` is not persisted in the delimited stores and comes back
    /// as the current time.
    pub fn from_row(fields: &[String]) -> Option<Self> {
        if fields.len() < HEADER.len() {
            return None;
        }
        Some(Self {
            source: fields[0].clone(),
            title: fields[1].clone(),
            date: fields[2].clone(),
            author: fields[3].clone(),
            link: fields[4].clone(),
            extract: fields[5].clone(),
            scraped_at: Utc::now(),
        })
    }
}
