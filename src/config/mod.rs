//! Configuration management for the ranking pipeline
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files. Credentials are never compiled in; they come from
//! `DATAFORSEO_EMAIL` / `DATAFORSEO_API_KEY` or the config file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::utils::retry::RetryConfig;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Ranking API configuration
    pub api: ApiConfig,

    /// Throttling and concurrency configuration
    pub fetch: FetchConfig,

    /// Keyword matching and domain filtering
    pub matching: MatchConfig,

    /// Per-domain qualification thresholds
    pub qualification: QualificationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Ranking API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API root, overridable for mock servers
    pub base_url: String,

    /// Ranked-keywords endpoint path under `base_url`
    pub endpoint: String,

    /// Account login
    pub email: String,

    /// Account API key (password half of basic auth)
    pub api_key: String,

    /// Target market
    pub location_code: u32,

    /// Target language
    pub language_code: String,

    /// Results per request
    pub limit: u32,

    /// Maximum pages followed per domain
    pub max_pages: u32,

    /// Maximum billed calls for the whole run
    pub call_budget: Option<u64>,
}

/// Throttling and concurrency configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Requests per second across all workers
    pub requests_per_second: u32,

    /// Worker pool size; 1 is the sequential baseline
    pub max_concurrent_requests: usize,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Deadline for one domain including pagination and retries
    pub domain_timeout_secs: u64,

    /// Retries after a rate-limit signal
    pub max_retries: u32,

    /// Base backoff delay in milliseconds
    pub base_delay_ms: u64,

    /// Backoff cap in milliseconds
    pub max_delay_ms: u64,
}

/// Keyword matching and domain filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Maximum accepted rank position (inclusive)
    pub rank_threshold: u32,

    /// Compare keywords ignoring case
    pub case_insensitive: bool,

    /// Size of the top-opportunity view
    pub top_k: usize,

    /// Substrings that put a domain in scope
    pub inclusion_terms: Vec<String>,

    /// Metric columns also checked against `inclusion_terms`
    pub category_fields: Vec<String>,

    /// Substrings that mark a ranked keyword as vertical-relevant
    pub vertical_terms: Vec<String>,

    /// Client whose keywords apply to domains that are not clients themselves
    pub default_client: Option<String>,

    /// Process only the first N in-scope domains
    pub max_domains: Option<usize>,
}

/// Thresholds for the per-domain qualification verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualificationConfig {
    pub min_domain_rating: f64,
    pub min_traffic: f64,
    pub domain_rating_column: String,
    pub traffic_column: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

fn default_terms(terms: &[&str]) -> Vec<String> {
    terms.iter().map(|t| (*t).to_string()).collect()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://api.dataforseo.com/v3"),
            endpoint: String::from("/dataforseo_labs/google/ranked_keywords/live"),
            email: String::new(),
            api_key: String::new(),
            location_code: 2840,
            language_code: String::from("en"),
            limit: 20,
            max_pages: 1,
            call_budget: None,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 1,
            max_concurrent_requests: 1,
            request_timeout_secs: 30,
            domain_timeout_secs: 120,
            max_retries: 2,
            base_delay_ms: 2000,
            max_delay_ms: 30_000,
        }
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            rank_threshold: 20,
            case_insensitive: false,
            top_k: 50,
            inclusion_terms: default_terms(&["casino", "poker", "bet", "gambl", "slot"]),
            category_fields: default_terms(&["Category"]),
            vertical_terms: default_terms(&["blackjack", "casino", "poker", "bet", "gambl", "slot"]),
            default_client: None,
            max_domains: None,
        }
    }
}

impl Default for QualificationConfig {
    fn default() -> Self {
        Self {
            min_domain_rating: 20.0,
            min_traffic: 1500.0,
            domain_rating_column: String::from("Domain Rating (DR)"),
            traffic_column: String::from("Traffic (Ah)"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

impl Config {
    /// Load configuration from environment variables over the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(email) = std::env::var("DATAFORSEO_EMAIL") {
            self.api.email = email;
        }
        if let Ok(key) = std::env::var("DATAFORSEO_API_KEY") {
            self.api.api_key = key;
        }
        if let Ok(url) = std::env::var("RANKMATCH_API_BASE_URL") {
            self.api.base_url = url;
        }
        if let Some(v) = env_parse("RANKMATCH_LOCATION_CODE") {
            self.api.location_code = v;
        }
        if let Ok(v) = std::env::var("RANKMATCH_LANGUAGE_CODE") {
            self.api.language_code = v;
        }
        if let Some(v) = env_parse("RANKMATCH_LIMIT") {
            self.api.limit = v;
        }
        if let Some(v) = env_parse("RANKMATCH_MAX_PAGES") {
            self.api.max_pages = v;
        }
        if let Some(v) = env_parse("RANKMATCH_CALL_BUDGET") {
            self.api.call_budget = Some(v);
        }
        if let Some(v) = env_parse("RANKMATCH_RATE_LIMIT") {
            self.fetch.requests_per_second = v;
        }
        if let Some(v) = env_parse("RANKMATCH_MAX_CONCURRENT_REQUESTS") {
            self.fetch.max_concurrent_requests = v;
        }
        if let Some(v) = env_parse("RANKMATCH_REQUEST_TIMEOUT") {
            self.fetch.request_timeout_secs = v;
        }
        if let Some(v) = env_parse("RANKMATCH_MAX_RETRIES") {
            self.fetch.max_retries = v;
        }
        if let Some(v) = env_parse("RANKMATCH_RANK_THRESHOLD") {
            self.matching.rank_threshold = v;
        }
        if let Some(v) = env_parse("RANKMATCH_TOP_K") {
            self.matching.top_k = v;
        }
        if let Some(terms) = env_list("RANKMATCH_INCLUSION_TERMS") {
            self.matching.inclusion_terms = terms;
        }
        if let Ok(v) = std::env::var("RANKMATCH_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("RANKMATCH_LOG_FORMAT") {
            self.logging.format = v;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_concurrent_requests == 0 {
            anyhow::bail!("max_concurrent_requests must be greater than 0");
        }

        if self.fetch.requests_per_second == 0 {
            anyhow::bail!("requests_per_second must be greater than 0");
        }

        if self.api.limit == 0 {
            anyhow::bail!("limit must be greater than 0");
        }

        if self.api.max_pages == 0 {
            anyhow::bail!("max_pages must be greater than 0");
        }

        if self.matching.rank_threshold == 0 {
            anyhow::bail!("rank_threshold must be greater than 0");
        }

        if self.fetch.request_timeout_secs == 0 || self.fetch.domain_timeout_secs == 0 {
            anyhow::bail!("timeouts must be greater than 0");
        }

        Ok(())
    }

    /// Whether API credentials are present
    pub fn has_credentials(&self) -> bool {
        !self.api.email.is_empty() && !self.api.api_key.is_empty()
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.request_timeout_secs)
    }

    /// Get per-domain deadline as Duration
    #[must_use]
    pub fn domain_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.domain_timeout_secs)
    }

    /// Backoff policy for rate-limit retries
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.fetch.max_retries,
            base_delay_ms: self.fetch.base_delay_ms,
            max_delay_ms: self.fetch.max_delay_ms,
            ..RetryConfig::default()
        }
    }
}
