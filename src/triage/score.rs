use crate::config::{KeywordTier, TriageConfig};
use crate::discovery::DiscoveredLink;
use crate::triage::{Priority, TriageRecord, TriageStatus};
use crate::ConfigError;
use regex::Regex;
use std::collections::HashSet;

/// Outcome of scoring one link
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    /// Relevance in [0, 1], rounded to two decimals
    pub score: f64,
    pub priority: Priority,
    /// Keywords found in the title or description, in tier order
    pub matched_keywords: Vec<String>,
}

struct CompiledTier {
    patterns: Vec<(String, Regex)>,
    weight: f64,
    cap: f64,
}

impl CompiledTier {
    fn compile(tier: &KeywordTier) -> Result<Self, ConfigError> {
        let patterns = tier
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(|k| Ok((k.to_string(), keyword_regex(k)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self {
            patterns,
            weight: tier.weight,
            cap: tier.cap,
        })
    }

    /// Returns the capped contribution and records matches
    fn contribution(&self, text: &str, matched: &mut Vec<String>) -> f64 {
        let mut hits = 0usize;
        for (keyword, pattern) in &self.patterns {
            if pattern.is_match(text) {
                hits += 1;
                matched.push(keyword.clone());
            }
        }
        (hits as f64 * self.weight).min(self.cap)
    }
}

/// Case-insensitive whole-word pattern for a keyword
///
/// Word boundaries are only asserted next to word characters, so keywords
/// such as `C++` or `.NET` still match.
fn keyword_regex(keyword: &str) -> Result<Regex, ConfigError> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let leading = keyword.chars().next().is_some_and(is_word);
    let trailing = keyword.chars().last().is_some_and(is_word);

    let pattern = format!(
        "(?i){}{}{}",
        if leading { r"\b" } else { "" },
        regex::escape(keyword),
        if trailing { r"\b" } else { "" }
    );
    Regex::new(&pattern).map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", keyword, e)))
}

/// Relevance scorer built once per run from `[triage]`
///
/// The score is the sum of three independently capped parts:
///
/// - keywords: each tier adds `matches * weight` up to its own cap, and the
///   tiers together are capped at `keyword_cap`
/// - URL rules: include substrings add up to `include_cap`; any exclude
///   substring subtracts `exclude_penalty` once
/// - categories: overlap with the allow-list adds up to its cap
///
/// The total is clamped to [0, 1] and rounded to two decimals before the
/// priority thresholds are applied.
pub struct TriageEngine {
    tiers: [CompiledTier; 3],
    keyword_cap: f64,
    include: Vec<String>,
    exclude: Vec<String>,
    include_weight: f64,
    include_cap: f64,
    exclude_penalty: f64,
    categories: HashSet<String>,
    category_weight: f64,
    category_cap: f64,
    high_threshold: f64,
    medium_threshold: f64,
}

impl TriageEngine {
    pub fn new(config: &TriageConfig) -> Result<Self, ConfigError> {
        let lower = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };

        Ok(Self {
            tiers: [
                CompiledTier::compile(&config.keywords.high)?,
                CompiledTier::compile(&config.keywords.medium)?,
                CompiledTier::compile(&config.keywords.low)?,
            ],
            keyword_cap: config.keyword_cap,
            include: lower(&config.url.include),
            exclude: lower(&config.url.exclude),
            include_weight: config.url.include_weight,
            include_cap: config.url.include_cap,
            exclude_penalty: config.url.exclude_penalty,
            categories: lower(&config.categories.allow).into_iter().collect(),
            category_weight: config.categories.weight,
            category_cap: config.categories.cap,
            high_threshold: config.high_threshold,
            medium_threshold: config.medium_threshold,
        })
    }

    pub fn score(&self, link: &DiscoveredLink) -> ScoreResult {
        let text = [link.title.as_deref(), link.description.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("\n");

        let mut matched_keywords = Vec::new();
        let keywords: f64 = self
            .tiers
            .iter()
            .map(|tier| tier.contribution(&text, &mut matched_keywords))
            .sum();
        let keywords = keywords.min(self.keyword_cap);

        let raw = keywords + self.url_contribution(&link.url) + self.category_contribution(&link.categories);
        let score = round2(raw.clamp(0.0, 1.0));

        ScoreResult {
            score,
            priority: self.priority_for(score),
            matched_keywords,
        }
    }

    /// Scores a link into a pending triage record
    pub fn triage(&self, link: DiscoveredLink) -> TriageRecord {
        let result = self.score(&link);
        TriageRecord {
            link,
            score: result.score,
            priority: result.priority,
            status: TriageStatus::Pending,
            matched_keywords: result.matched_keywords,
        }
    }

    pub fn priority_for(&self, score: f64) -> Priority {
        Priority::from_score(score, self.high_threshold, self.medium_threshold)
    }

    fn url_contribution(&self, url: &str) -> f64 {
        let url = url.to_lowercase();
        let includes = self.include.iter().filter(|p| url.contains(p.as_str())).count();
        let bonus = (includes as f64 * self.include_weight).min(self.include_cap);
        let penalty = if self.exclude.iter().any(|p| url.contains(p.as_str())) {
            self.exclude_penalty
        } else {
            0.0
        };
        bonus - penalty
    }

    fn category_contribution(&self, categories: &[String]) -> f64 {
        let overlap: HashSet<String> = categories
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| self.categories.contains(c))
            .collect();
        (overlap.len() as f64 * self.category_weight).min(self.category_cap)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryMethod;

    fn link(url: &str, title: &str) -> DiscoveredLink {
        let mut link = DiscoveredLink::new(url.to_string(), "wire".to_string(), DiscoveryMethod::Rss);
        link.title = Some(title.to_string());
        link
    }

    fn config() -> TriageConfig {
        let mut config = TriageConfig::default();
        config.enabled = true;
        config.keywords.high = KeywordTier {
            keywords: vec!["FDA".into()],
            weight: 0.3,
            cap: 0.2,
        };
        config
    }

    #[test]
    fn test_tier_cap_limits_contribution() {
        let engine = TriageEngine::new(&config()).unwrap();
        let result = engine.score(&link("https://e.com/health/1", "FDA approves new drug"));

        assert_eq!(result.score, 0.2);
        assert_eq!(result.priority, Priority::Low);
        assert_eq!(result.matched_keywords, vec!["FDA"]);
    }

    #[test]
    fn test_reaching_medium_threshold() {
        let mut config = config();
        config.keywords.medium.keywords = vec!["drug".into(), "approves".into()];
        config.url.include = vec!["/health/".into()];
        let engine = TriageEngine::new(&config).unwrap();

        // 0.2 (high, capped) + 0.3 (medium, capped) + 0.1 (url)
        let result = engine.score(&link("https://e.com/health/1", "FDA approves new drug"));
        assert_eq!(result.score, 0.6);
        assert_eq!(result.priority, Priority::Medium);
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        let mut config = config();
        config.keywords.high.keywords = vec!["art".into(), "C++".into()];
        config.keywords.high.cap = 1.0;
        let engine = TriageEngine::new(&config).unwrap();

        let result = engine.score(&link("https://e.com/1", "Startup hires C++ engineers"));
        assert_eq!(result.matched_keywords, vec!["C++"]);
    }

    #[test]
    fn test_keyword_total_is_capped() {
        let mut config = config();
        config.keywords.high = KeywordTier {
            keywords: vec!["a1".into(), "a2".into(), "a3".into()],
            weight: 0.3,
            cap: 0.9,
        };
        config.keywords.medium.keywords = vec!["b1".into()];
        let engine = TriageEngine::new(&config).unwrap();

        let result = engine.score(&link("https://e.com/1", "a1 a2 a3 b1"));
        assert_eq!(result.score, config.keyword_cap);
    }

    #[test]
    fn test_exclude_penalty_never_goes_negative() {
        let mut config = config();
        config.url.exclude = vec!["/opinion/".into()];
        let engine = TriageEngine::new(&config).unwrap();

        let result = engine.score(&link("https://e.com/opinion/1", "Nothing relevant"));
        assert_eq!(result.score, 0.0);
        assert_eq!(result.priority, Priority::Low);
    }

    #[test]
    fn test_category_overlap() {
        let mut config = config();
        config.categories.allow = vec!["Health".into(), "Policy".into(), "Science".into()];
        let engine = TriageEngine::new(&config).unwrap();

        let mut l = link("https://e.com/1", "Quiet day");
        l.categories = vec!["health".into(), "Policy".into(), "Science".into(), "Sports".into()];
        assert_eq!(engine.score(&l).score, 0.2);
    }

    #[test]
    fn test_scores_stay_in_bounds() {
        let mut config = config();
        config.keyword_cap = 5.0;
        config.keywords.high = KeywordTier {
            keywords: vec!["alpha".into(), "beta".into()],
            weight: 2.0,
            cap: 4.0,
        };
        config.url.include = vec!["e.com".into()];
        config.url.include_cap = 3.0;
        config.url.include_weight = 3.0;
        config.url.exclude = vec!["/x/".into()];
        config.url.exclude_penalty = 10.0;
        let engine = TriageEngine::new(&config).unwrap();

        let titles = ["", "alpha", "alpha beta", "nothing"];
        let urls = ["https://e.com/a", "https://e.com/x/a", "https://other.org/x/"];
        for title in titles {
            for url in urls {
                let result = engine.score(&link(url, title));
                assert!((0.0..=1.0).contains(&result.score), "{} {} -> {}", url, title, result.score);
                assert_eq!(result.priority == Priority::High, result.score >= config.high_threshold);
            }
        }
    }
}
