//! Ranked-keywords response parsing
//!
//! The provider wraps results as `tasks[] -> result[] -> items[]`, and each
//! item nests the keyword under `keyword_data` and the rank under
//! `ranked_serp_element.serp_item`. Every level is optional here: a missing
//! or null level yields no pages, while a body that is not JSON (or has the
//! wrong types) is reported as malformed.

use serde::Deserialize;

use crate::models::{RankedPage, UNRANKED_POSITION};

/// Provider status code for a successful request or task
pub const STATUS_OK: u32 = 20000;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct Envelope {
    status_code: Option<u32>,
    status_message: Option<String>,
    tasks: Option<Vec<Task>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct Task {
    status_code: Option<u32>,
    status_message: Option<String>,
    result: Option<Vec<ResultGroup>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ResultGroup {
    total_count: Option<u64>,
    items_count: Option<u64>,
    items: Option<Vec<Item>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct Item {
    keyword_data: Option<KeywordData>,
    ranked_serp_element: Option<RankedSerpElement>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct KeywordData {
    keyword: Option<String>,
    keyword_info: Option<KeywordInfo>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct KeywordInfo {
    search_volume: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RankedSerpElement {
    serp_item: Option<SerpItem>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SerpItem {
    rank_group: Option<f64>,
    rank_absolute: Option<f64>,
    url: Option<String>,
}

/// Pages from one response plus the paging counters the provider reported
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RankedBatch {
    pub pages: Vec<RankedPage>,
    /// Items returned in this response (as reported, or counted)
    pub items_count: u64,
    /// Items available for the target across all pages
    pub total_count: Option<u64>,
}

/// Tagged outcome of parsing one response body
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    /// At least one ranked keyword was found
    Ranked(RankedBatch),
    /// Well-formed, but no ranked keywords at any level
    Empty,
    /// Body is not the expected JSON shape
    Malformed(String),
    /// Provider reported a non-OK status at envelope or task level
    Rejected { code: u32, message: String },
}

fn rank_from(value: Option<f64>) -> Option<u32> {
    value
        .filter(|v| v.is_finite() && *v >= 1.0 && *v <= f64::from(u32::MAX))
        .map(|v| v as u32)
}

fn volume_from(value: Option<f64>) -> u64 {
    value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64)
        .unwrap_or(0)
}

impl Item {
    fn into_page(self, domain: &str) -> Option<RankedPage> {
        let keyword_data = self.keyword_data?;
        let keyword = keyword_data.keyword.filter(|k| !k.trim().is_empty())?;
        let search_volume = volume_from(keyword_data.keyword_info.and_then(|i| i.search_volume));

        let serp_item = self.ranked_serp_element.and_then(|e| e.serp_item);
        let (position, url) = match serp_item {
            Some(item) => (
                rank_from(item.rank_group)
                    .or_else(|| rank_from(item.rank_absolute))
                    .unwrap_or(UNRANKED_POSITION),
                item.url,
            ),
            None => (UNRANKED_POSITION, None),
        };

        Some(RankedPage {
            domain: domain.to_string(),
            keyword,
            position,
            search_volume,
            url,
        })
    }
}

/// Parse a ranked-keywords response body for `domain`
pub fn parse_ranked_keywords(body: &str, domain: &str) -> ParsedResponse {
    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => return ParsedResponse::Malformed(e.to_string()),
    };

    if let Some(code) = envelope.status_code.filter(|c| *c != STATUS_OK) {
        return ParsedResponse::Rejected {
            code,
            message: envelope.status_message.unwrap_or_default(),
        };
    }

    let tasks = envelope.tasks.unwrap_or_default();
    let mut batch = RankedBatch::default();
    let mut saw_result = false;

    for task in tasks {
        if let Some(code) = task.status_code.filter(|c| *c != STATUS_OK) {
            return ParsedResponse::Rejected {
                code,
                message: task.status_message.unwrap_or_default(),
            };
        }

        for group in task.result.unwrap_or_default() {
            saw_result = true;
            let items = group.items.unwrap_or_default();
            batch.items_count += group.items_count.unwrap_or(items.len() as u64);
            if let Some(total) = group.total_count {
                batch.total_count = Some(batch.total_count.unwrap_or(0) + total);
            }

            batch
                .pages
                .extend(items.into_iter().filter_map(|item| item.into_page(domain)));
        }
    }

    if !saw_result || batch.pages.is_empty() {
        return ParsedResponse::Empty;
    }

    ParsedResponse::Ranked(batch)
}
