//! Ranking retrieval with rate limiting
//!
//! This module wraps the ranked-keywords API:
//! - Basic authentication derived from the account email and API key
//! - One shared token bucket (governor) gating every request, whatever the
//!   number of workers calling the client
//! - Continuation paging up to a configured page cap
//! - Bounded exponential backoff on provider throttling only
//! - An optional billed-call budget
//!
//! Failures are returned as [`FetchError`] values for the caller to record
//! against the domain; nothing here aborts a batch.

pub mod pipeline;
pub mod response;

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{ApiConfig, Config};
use crate::models::RankedPage;
use crate::utils::error::FetchError;
use crate::utils::retry::{with_retry_if, RetryConfig};
use crate::utils::{basic_auth_value, normalize_domain, truncate_text};

use response::{parse_ranked_keywords, ParsedResponse, RankedBatch};

/// Provider status: request rate exceeded
const STATUS_RATE_LIMITED: u32 = 40202;
/// Provider status: payment required
const STATUS_PAYMENT_REQUIRED: u32 = 40200;
/// Provider status: insufficient funds
const STATUS_INSUFFICIENT_FUNDS: u32 = 40210;
/// Provider status: target has no search results
const STATUS_NO_RESULTS: u32 = 40102;

/// Direct (unkeyed) token bucket shared by all callers of a client
pub type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Build a shared limiter allowing `requests_per_second` (minimum 1)
pub fn rate_limiter(requests_per_second: u32) -> SharedRateLimiter {
    let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_second(rate)))
}

/// Anything that can produce ranked pages for a domain
///
/// The pipeline only depends on this trait, so tests can drive it with an
/// in-memory source instead of an HTTP endpoint.
#[async_trait]
pub trait RankingSource: Send + Sync {
    /// Ranked keywords for one domain, all pages merged
    async fn fetch_rankings(&self, domain: &str, limit: u32) -> Result<Vec<RankedPage>, FetchError>;

    /// Billed calls made so far
    fn calls_made(&self) -> u64 {
        0
    }
}

/// One task in the request body
#[derive(Debug, Serialize)]
struct RankedKeywordsTask<'a> {
    target: &'a str,
    location_code: u32,
    language_code: &'a str,
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<u64>,
}

/// HTTP client for the ranked-keywords endpoint
pub struct RankingClient {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Rate limiter shared by every request from this client
    rate_limiter: SharedRateLimiter,

    /// Backoff policy for throttling responses
    retry: RetryConfig,

    /// Endpoint, market and paging settings
    api: ApiConfig,

    /// Precomputed `Authorization` value
    auth_header: String,

    /// Requests sent so far
    calls: AtomicU64,
}

impl RankingClient {
    /// Create a client from the run configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        Self::with_rate_limiter(config, rate_limiter(config.fetch.requests_per_second))
    }

    /// Create a client that shares an existing rate limiter
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_rate_limiter(
        config: &Config,
        rate_limiter: SharedRateLimiter,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(format!("rankmatch/{}", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            rate_limiter,
            retry: config.retry_config(),
            api: config.api.clone(),
            auth_header: basic_auth_value(&config.api.email, &config.api.api_key),
            calls: AtomicU64::new(0),
        })
    }

    fn endpoint_url(&self) -> String {
        format!(
            "{}/{}",
            self.api.base_url.trim_end_matches('/'),
            self.api.endpoint.trim_start_matches('/')
        )
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&self.auth_header) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    /// Reserve one billed call, refusing once the budget is spent
    fn reserve_call(&self) -> Result<(), FetchError> {
        let made = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(budget) = self.api.call_budget {
            if made >= budget {
                self.calls.fetch_sub(1, Ordering::SeqCst);
                return Err(FetchError::QuotaExhausted);
            }
        }
        Ok(())
    }

    /// Fetch one page, backing off and retrying only on throttling
    async fn fetch_page(&self, target: &str, limit: u32, offset: u64) -> Result<RankedBatch, FetchError> {
        let outcome = with_retry_if(
            &self.retry,
            || self.request_page(target, limit, offset),
            FetchError::is_rate_limit,
        )
        .await;

        match outcome.result {
            Err(FetchError::RateLimited) if outcome.exhausted => Err(FetchError::MaxRetriesExceeded),
            other => other,
        }
    }

    /// Single request without retry
    async fn request_page(&self, target: &str, limit: u32, offset: u64) -> Result<RankedBatch, FetchError> {
        self.reserve_call()?;

        // Wait for rate limiter
        self.rate_limiter.until_ready().await;

        let task = RankedKeywordsTask {
            target,
            location_code: self.api.location_code,
            language_code: &self.api.language_code,
            limit,
            offset: (offset > 0).then_some(offset),
        };

        debug!(domain = %target, offset, limit, "Requesting ranked keywords");

        let response = self
            .client
            .post(self.endpoint_url())
            .headers(self.build_headers())
            .json(&[task])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Http(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if status == StatusCode::PAYMENT_REQUIRED {
            return Err(FetchError::QuotaExhausted);
        }
        if !status.is_success() {
            return Err(FetchError::ServerError(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Http(e)
            }
        })?;

        match parse_ranked_keywords(&body, target) {
            ParsedResponse::Ranked(batch) => Ok(batch),
            ParsedResponse::Empty => Ok(RankedBatch::default()),
            ParsedResponse::Malformed(reason) => {
                warn!(
                    domain = %target,
                    reason = %reason,
                    body = %truncate_text(&body, 200),
                    "Malformed ranking response"
                );
                Err(FetchError::Malformed(reason))
            }
            ParsedResponse::Rejected { code, message } => classify_status(code, message),
        }
    }
}

/// Map a provider status code to a result
fn classify_status(code: u32, message: String) -> Result<RankedBatch, FetchError> {
    match code {
        STATUS_NO_RESULTS => Ok(RankedBatch::default()),
        STATUS_RATE_LIMITED => Err(FetchError::RateLimited),
        STATUS_PAYMENT_REQUIRED | STATUS_INSUFFICIENT_FUNDS => Err(FetchError::QuotaExhausted),
        _ => Err(FetchError::ApiStatus { code, message }),
    }
}

/// Whether another page should be requested after `batch`
fn has_more(batch: &RankedBatch, limit: u32, fetched_so_far: u64) -> bool {
    if batch.pages.is_empty() || batch.items_count < u64::from(limit) {
        return false;
    }
    match batch.total_count {
        Some(total) => fetched_so_far < total,
        None => true,
    }
}

#[async_trait]
impl RankingSource for RankingClient {
    async fn fetch_rankings(&self, domain: &str, limit: u32) -> Result<Vec<RankedPage>, FetchError> {
        let target =
            normalize_domain(domain).ok_or_else(|| FetchError::InvalidDomain(domain.to_string()))?;
        let limit = limit.max(1);
        let max_pages = self.api.max_pages.max(1);

        let mut pages = Vec::new();
        let mut offset: u64 = 0;

        for page in 0..max_pages {
            let batch = self.fetch_page(&target, limit, offset).await?;
            offset += batch.items_count.max(batch.pages.len() as u64);
            let more = has_more(&batch, limit, offset);
            pages.extend(batch.pages);

            if !more {
                break;
            }
            if page + 1 == max_pages {
                debug!(domain = %target, max_pages, "Page cap reached");
            }
        }

        // Results are reported against the caller's domain identity
        for page in &mut pages {
            page.domain = domain.to_string();
        }

        debug!(domain = %domain, pages = pages.len(), "Fetched rankings");
        Ok(pages)
    }

    fn calls_made(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}
