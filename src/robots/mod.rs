//! Robots.txt handling
//!
//! This module provides fetching, parsing, and caching of robots.txt
//! files. Article URLs disallowed for the crawler are skipped, Crawl-delay
//! feeds the politeness limiter, and Sitemap lines feed sitemap discovery.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::RobotsRules;
