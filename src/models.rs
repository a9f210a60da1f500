// Core data structures for the ranking pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Position assigned to a ranked keyword when the provider returns no rank
pub const UNRANKED_POSITION: u32 = 999;

/// Target keyword for a client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeywordRecord {
    pub client_domain: String,
    pub keyword: String,
}

impl KeywordRecord {
    pub fn new(client_domain: impl Into<String>, keyword: impl Into<String>) -> Self {
        Self {
            client_domain: client_domain.into(),
            keyword: keyword.into(),
        }
    }
}

/// A single metric cell from the domain export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    /// Parse a raw CSV cell. Thousands separators are accepted ("1,500").
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let numeric: String = trimmed.chars().filter(|c| *c != ',').collect();
        match numeric.parse::<f64>() {
            Ok(n) if n.is_finite() => Some(Self::Number(n)),
            _ => Some(Self::Text(trimmed.to_string())),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Domain row from the bulk export
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DomainRecord {
    pub domain: String,
    /// Every non-domain column, keyed by its header
    pub metrics: BTreeMap<String, MetricValue>,
}

impl DomainRecord {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            metrics: BTreeMap::new(),
        }
    }

    /// Builder-style metric insertion
    pub fn with_metric(mut self, name: impl Into<String>, value: MetricValue) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn metric(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }

    pub fn numeric_metric(&self, name: &str) -> Option<f64> {
        self.metric(name).and_then(MetricValue::as_f64)
    }

    /// Eligible for processing only with a non-blank domain
    pub fn is_eligible(&self) -> bool {
        !self.domain.trim().is_empty()
    }
}

/// Ranked keyword returned by the ranking API for a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedPage {
    pub domain: String,
    pub keyword: String,
    /// 1-based rank, `UNRANKED_POSITION` when unknown
    pub position: u32,
    pub search_volume: u64,
    pub url: Option<String>,
}

/// A ranked page that matched one of its client's target keywords
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedOpportunity {
    pub domain: String,
    pub keyword: String,
    pub position: u32,
    pub search_volume: u64,
    pub client_domain: String,
    pub url: Option<String>,
}

impl MatchedOpportunity {
    pub fn from_page(page: &RankedPage, client_domain: &str) -> Self {
        Self {
            domain: page.domain.clone(),
            keyword: page.keyword.clone(),
            position: page.position,
            search_volume: page.search_volume,
            client_domain: client_domain.to_string(),
            url: page.url.clone(),
        }
    }
}

/// Advisory classification of a contained failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InputUnavailable,
    ApiCallFailed,
    RateLimitExceeded,
    MalformedResponse,
    Timeout,
    QuotaExhausted,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputUnavailable => "input_unavailable",
            Self::ApiCallFailed => "api_call_failed",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::MalformedResponse => "malformed_response",
            Self::Timeout => "timeout",
            Self::QuotaExhausted => "quota_exhausted",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure recorded against a single domain or source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainFailure {
    pub domain: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Per-domain fetch lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchState {
    Pending,
    Requested,
    Succeeded,
    Failed,
    /// Never dispatched because the run was aborted
    Skipped,
}

impl FetchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }

    /// Allowed transitions: PENDING -> REQUESTED -> {SUCCEEDED | FAILED}, PENDING -> SKIPPED
    pub fn can_transition_to(&self, next: FetchState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Requested)
                | (Self::Pending, Self::Skipped)
                | (Self::Requested, Self::Succeeded)
                | (Self::Requested, Self::Failed)
        )
    }
}

/// Qualification verdict for a domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualificationStatus {
    Qualified,
    NotQualified,
}

impl QualificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qualified => "QUALIFIED",
            Self::NotQualified => "NOT_QUALIFIED",
        }
    }
}

impl fmt::Display for QualificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
