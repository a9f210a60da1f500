//! Common test utilities

use rankmatch::config::Config;
use serde_json::json;
use std::path::{Path, PathBuf};

pub const TEST_EMAIL: &str = "ops@example.com";
pub const TEST_API_KEY: &str = "secret";
pub const ENDPOINT_PATH: &str = "/v3/dataforseo_labs/google/ranked_keywords/live";

/// Config pointed at a mock server, with fast limits and short backoff
pub fn test_config(server_uri: &str) -> Config {
    let mut config = Config::default();
    config.api.base_url = format!("{server_uri}/v3");
    config.api.email = TEST_EMAIL.to_string();
    config.api.api_key = TEST_API_KEY.to_string();
    config.fetch.requests_per_second = 100;
    config.fetch.request_timeout_secs = 5;
    config.fetch.domain_timeout_secs = 10;
    config.fetch.base_delay_ms = 10;
    config.fetch.max_delay_ms = 50;
    config
}

/// Ranked-keywords response body with one item per `(keyword, rank, volume)`
pub fn ranked_body(target: &str, items: &[(&str, u32, u64)]) -> String {
    paged_body(target, items, items.len() as u64)
}

/// Same as [`ranked_body`] with an explicit `total_count`
#[allow(dead_code)]
pub fn paged_body(target: &str, items: &[(&str, u32, u64)], total_count: u64) -> String {
    let items: Vec<_> = items
        .iter()
        .map(|(keyword, rank, volume)| {
            json!({
                "keyword_data": {
                    "keyword": keyword,
                    "keyword_info": {"search_volume": volume}
                },
                "ranked_serp_element": {
                    "serp_item": {
                        "rank_group": rank,
                        "rank_absolute": rank,
                        "url": format!("https://{target}/{}", keyword.replace(' ', "-"))
                    }
                }
            })
        })
        .collect();

    json!({
        "status_code": 20000,
        "status_message": "Ok.",
        "tasks": [{
            "status_code": 20000,
            "status_message": "Ok.",
            "result": [{
                "target": target,
                "total_count": total_count,
                "items_count": items.len(),
                "items": items
            }]
        }]
    })
    .to_string()
}

/// Response whose task carries a provider error status
#[allow(dead_code)]
pub fn task_status_body(code: u32, message: &str) -> String {
    json!({
        "status_code": 20000,
        "tasks": [{"status_code": code, "status_message": message, "result": null}]
    })
    .to_string()
}

/// Write `content` to `dir/name` and return the path
#[allow(dead_code)]
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
