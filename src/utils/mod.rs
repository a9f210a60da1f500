//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// Reduce a domain or URL to a bare lowercase host
///
/// `https://www.Stake.com/casino` and `stake.com` both become `stake.com`.
/// Returns `None` for blank input or input without a host.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let host = Url::parse(&with_scheme)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))?;

    let host = host.trim_end_matches('.');
    let host = host.strip_prefix("www.").unwrap_or(host);

    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Build an HTTP basic authorization header value from a login pair
pub fn basic_auth_value(login: &str, password: &str) -> String {
    let encoded = STANDARD.encode(format!("{login}:{password}"));
    format!("Basic {encoded}")
}

/// Truncate text to a maximum length on a char boundary
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
