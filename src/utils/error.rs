//! Error types for the ranking pipeline
//!
//! This module defines the per-call and per-source error types. None of them
//! abort a batch: the pipeline records them against the failing unit.

use thiserror::Error;

use crate::models::FailureKind;

/// Errors that can occur while calling the ranking API
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider signalled throttling (HTTP 429 or task status 40202)
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Non-success HTTP status
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Request or domain deadline elapsed
    #[error("Request timeout")]
    Timeout,

    /// Rate-limit retries exhausted
    #[error("Maximum retry attempts exceeded")]
    MaxRetriesExceeded,

    /// Body was not the expected JSON shape
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Provider-level error status inside a 200 response
    #[error("API status {code}: {message}")]
    ApiStatus { code: u32, message: String },

    /// Account balance or configured call budget exhausted
    #[error("API quota exhausted")]
    QuotaExhausted,

    /// Domain cannot be used as a ranking target
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
}

impl FetchError {
    /// Whether another attempt may succeed after backing off
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    /// Whether the whole run should stop dispatching new requests
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, Self::QuotaExhausted)
    }

    /// Advisory classification for the run summary
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Http(e) if e.is_timeout() => FailureKind::Timeout,
            Self::Http(e) if e.is_decode() => FailureKind::MalformedResponse,
            Self::Http(_) | Self::ServerError(_) | Self::ApiStatus { .. } => {
                FailureKind::ApiCallFailed
            }
            Self::InvalidDomain(_) => FailureKind::ApiCallFailed,
            Self::RateLimited | Self::MaxRetriesExceeded => FailureKind::RateLimitExceeded,
            Self::Timeout => FailureKind::Timeout,
            Self::Malformed(_) => FailureKind::MalformedResponse,
            Self::QuotaExhausted => FailureKind::QuotaExhausted,
        }
    }
}

/// Errors that can occur while loading an input source
#[derive(Error, Debug)]
pub enum InputError {
    /// Source could not be reached or read
    #[error("Input source unavailable ({source_id}): {reason}")]
    Unavailable { source_id: String, reason: String },

    /// Source was read but is not valid CSV
    #[error("Input source unparseable ({source_id}): {reason}")]
    Unparseable { source_id: String, reason: String },

    /// A required column is absent from the header row
    #[error("Input source {source_id} is missing required column '{column}'")]
    MissingColumn { source_id: String, column: String },
}

impl InputError {
    pub fn source_id(&self) -> &str {
        match self {
            Self::Unavailable { source_id, .. }
            | Self::Unparseable { source_id, .. }
            | Self::MissingColumn { source_id, .. } => source_id,
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        FailureKind::InputUnavailable
    }
}
