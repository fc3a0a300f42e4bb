//! Fetching for discovery and extraction
//!
//! This module contains:
//! - HTTP client construction with the crawler's user agent
//! - `HttpFetcher`: one paced, classified HTTP request
//! - `BrowserBackend` / `BrowserSession`: the heavier rendering capability
//! - `TieredFetcher`: cheap fetch first, browser only on classified blocking

mod browser;
mod http;

pub use browser::{BrowserBackend, BrowserSession, TieredFetcher};
pub use http::{build_http_client, FetchedPage, HttpFetcher};
