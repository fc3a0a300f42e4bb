//! URL handling module for Tidewater
//!
//! This module provides URL normalization, the canonical dedup key used by
//! every store and index, host extraction and wildcard host matching.

mod host;
mod matcher;
mod normalize;

// Re-export main functions
pub use host::extract_host;
pub use matcher::HostPattern;
pub use normalize::{canonical_key, normalize_url, resolve_link};
