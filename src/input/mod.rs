//! Input loading for keyword and domain lists
//!
//! Both lists arrive as CSV, either from a local path or over HTTP (the
//! spreadsheet export is just a CSV URL). Loading never fails the run: any
//! retrieval or parse problem produces an empty record set plus the
//! [`InputError`] describing it, so later stages report zero matches instead
//! of crashing. There is no retry at this layer.

use reqwest::Client;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::{DomainRecord, KeywordRecord, MetricValue};
use crate::utils::error::InputError;
use crate::utils::normalize_whitespace;

/// Accepted header names for the client column of the keyword list
const CLIENT_COLUMNS: &[&str] = &["client(domain)", "client", "client domain", "client_domain"];
const KEYWORD_COLUMNS: &[&str] = &["keyword", "keywords"];
const DOMAIN_COLUMNS: &[&str] = &["domain"];

/// Where a CSV comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Url(String),
    Path(PathBuf),
}

impl DataSource {
    /// `http://` and `https://` identifiers are URLs, anything else is a path
    pub fn parse(identifier: &str) -> Self {
        let trimmed = identifier.trim();
        let lower = trimmed.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else {
            Self::Path(PathBuf::from(trimmed))
        }
    }

    pub fn id(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Path(path) => path.display().to_string(),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// Records loaded from a source, with the error that degraded it (if any)
#[derive(Debug)]
pub struct LoadResult<T> {
    pub records: Vec<T>,
    pub error: Option<InputError>,
}

impl<T> LoadResult<T> {
    fn ok(records: Vec<T>) -> Self {
        Self {
            records,
            error: None,
        }
    }

    fn degraded(error: InputError) -> Self {
        warn!(error = %error, "Input degraded to empty set");
        Self {
            records: Vec::new(),
            error: Some(error),
        }
    }
}

/// Fetches and parses the CSV inputs
pub struct InputLoader {
    client: Client,
}

impl InputLoader {
    /// Create a loader whose HTTP reads time out after `timeout`
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be created
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).gzip(true).build()?;
        Ok(Self { client })
    }

    /// Load the keyword list (`Client(domain)`, `Keyword`)
    pub async fn load_keywords(&self, source: &DataSource) -> LoadResult<KeywordRecord> {
        let content = match self.read(source).await {
            Ok(content) => content,
            Err(e) => return LoadResult::degraded(e),
        };

        match parse_keywords_csv(&content, &source.id()) {
            Ok(records) => {
                info!(source = %source, count = records.len(), "Loaded keyword list");
                LoadResult::ok(records)
            }
            Err(e) => LoadResult::degraded(e),
        }
    }

    /// Load the domain export (`Domain` plus metric columns)
    pub async fn load_domains(&self, source: &DataSource) -> LoadResult<DomainRecord> {
        let content = match self.read(source).await {
            Ok(content) => content,
            Err(e) => return LoadResult::degraded(e),
        };

        match parse_domains_csv(&content, &source.id()) {
            Ok(records) => {
                info!(source = %source, count = records.len(), "Loaded domain list");
                LoadResult::ok(records)
            }
            Err(e) => LoadResult::degraded(e),
        }
    }

    async fn read(&self, source: &DataSource) -> Result<String, InputError> {
        let unavailable = |reason: String| InputError::Unavailable {
            source_id: source.id(),
            reason,
        };

        match source {
            DataSource::Path(path) => {
                debug!(path = %path.display(), "Reading input file");
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| unavailable(e.to_string()))
            }
            DataSource::Url(url) => {
                debug!(url = %url, "Downloading input");
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| unavailable(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(unavailable(format!("HTTP status {status}")));
                }

                response.text().await.map_err(|e| unavailable(e.to_string()))
            }
        }
    }
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
}

fn reader(content: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.trim_start_matches('\u{feff}').as_bytes())
}

/// Parse keyword CSV content. Blank rows are skipped and exact
/// (client, keyword) duplicates are dropped, keeping first occurrence order.
pub fn parse_keywords_csv(content: &str, source_id: &str) -> Result<Vec<KeywordRecord>, InputError> {
    let unparseable = |reason: String| InputError::Unparseable {
        source_id: source_id.to_string(),
        reason,
    };

    let mut reader = reader(content);
    let headers = reader.headers().map_err(|e| unparseable(e.to_string()))?.clone();

    let client_idx = find_column(&headers, CLIENT_COLUMNS).ok_or_else(|| InputError::MissingColumn {
        source_id: source_id.to_string(),
        column: "Client(domain)".to_string(),
    })?;
    let keyword_idx = find_column(&headers, KEYWORD_COLUMNS).ok_or_else(|| InputError::MissingColumn {
        source_id: source_id.to_string(),
        column: "Keyword".to_string(),
    })?;

    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for row in reader.records() {
        let row = row.map_err(|e| unparseable(e.to_string()))?;

        let client = row.get(client_idx).map(str::trim).unwrap_or_default();
        let keyword = row.get(keyword_idx).map(normalize_whitespace).unwrap_or_default();

        if client.is_empty() || keyword.is_empty() {
            continue;
        }

        let record = KeywordRecord::new(client, keyword);
        if seen.insert(record.clone()) {
            records.push(record);
        }
    }

    Ok(records)
}

/// Parse domain export CSV content. Rows with a blank domain are skipped;
/// every other column becomes a metric.
pub fn parse_domains_csv(content: &str, source_id: &str) -> Result<Vec<DomainRecord>, InputError> {
    let unparseable = |reason: String| InputError::Unparseable {
        source_id: source_id.to_string(),
        reason,
    };

    let mut reader = reader(content);
    let headers = reader.headers().map_err(|e| unparseable(e.to_string()))?.clone();

    let domain_idx = find_column(&headers, DOMAIN_COLUMNS).ok_or_else(|| InputError::MissingColumn {
        source_id: source_id.to_string(),
        column: "Domain".to_string(),
    })?;

    let mut records = Vec::new();

    for row in reader.records() {
        let row = row.map_err(|e| unparseable(e.to_string()))?;

        let mut record = DomainRecord::new(row.get(domain_idx).unwrap_or_default());
        if !record.is_eligible() {
            continue;
        }

        for (idx, header) in headers.iter().enumerate() {
            if idx == domain_idx {
                continue;
            }
            if let Some(value) = row.get(idx).and_then(MetricValue::parse) {
                record.metrics.insert(header.to_string(), value);
            }
        }

        records.push(record);
    }

    Ok(records)
}
