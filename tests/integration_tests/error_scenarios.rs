//! Error scenario integration tests
//!
//! Tests various failure modes and error handling:
//! 1. Unreachable input sources
//! 2. Quota exhaustion aborting the run
//! 3. Per-domain deadlines
//! 4. Malformed responses
//! 5. Connection failures

use rankmatch::analysis::run_analysis;
use rankmatch::input::DataSource;
use rankmatch::models::{FailureKind, FetchState};
use rankmatch::ranking::RankingClient;
use rankmatch::storage::{ReportWriter, OPPORTUNITIES_FILE};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fixtures::{stage_inputs, DOMAINS_CSV, KEYWORDS_CSV};
use crate::common::{ranked_body, test_config, ENDPOINT_PATH};

// ============================================================================
// Input Error Tests
// ============================================================================

#[tokio::test]
async fn test_both_inputs_unreachable() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let client = RankingClient::new(&config).unwrap();

    let report = run_analysis(
        &config,
        &DataSource::Path(temp_dir.path().join("missing-keywords.csv")),
        &DataSource::Path(temp_dir.path().join("missing-domains.csv")),
        Arc::new(client),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(report.analysis.is_empty());
    assert_eq!(report.summary.domains_processed, 0);
    assert_eq!(report.summary.input_failures.len(), 2);
    assert!(report
        .summary
        .input_failures
        .iter()
        .all(|f| f.kind == FailureKind::InputUnavailable));

    // Still produces well-formed, empty output
    let out = temp_dir.path().join("out");
    ReportWriter::new(&out).unwrap().write(&report).unwrap();
    let csv = std::fs::read_to_string(out.join(OPPORTUNITIES_FILE)).unwrap();
    assert_eq!(csv.lines().count(), 1);
}

#[tokio::test]
async fn test_keyword_url_unavailable_still_fetches_domains() {
    let inputs = stage_inputs(KEYWORDS_CSV, DOMAINS_CSV);
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/keywords.csv"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(ranked_body("x", &[("online casino", 1, 100)])),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let client = RankingClient::new(&config).unwrap();

    let report = run_analysis(
        &config,
        &DataSource::parse(&format!("{}/keywords.csv", mock_server.uri())),
        &DataSource::Path(inputs.domains.clone()),
        Arc::new(client),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(report.analysis.is_empty());
    assert_eq!(report.summary.succeeded, 2);
    assert_eq!(report.summary.input_failures.len(), 1);
    assert!(report.summary.input_failures[0].domain.ends_with("/keywords.csv"));
}

#[tokio::test]
async fn test_domain_csv_from_url() {
    let inputs = stage_inputs(KEYWORDS_CSV, "");
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/export.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Domain\nstake.com\n"))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(ranked_body("stake.com", &[("live poker", 2, 40)])),
        )
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server.uri());
    config.matching.inclusion_terms = vec!["stake".into()];
    let client = RankingClient::new(&config).unwrap();

    let report = run_analysis(
        &config,
        &DataSource::Path(inputs.keywords.clone()),
        &DataSource::parse(&format!("{}/export.csv", mock_server.uri())),
        Arc::new(client),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.analysis.len(), 1);
    assert_eq!(report.analysis[0].keyword, "live poker");
}

// ============================================================================
// Run Abort Tests
// ============================================================================

#[tokio::test]
async fn test_quota_exhaustion_aborts_remaining_domains() {
    let domains_csv = "Domain\ncasino-a.com\ncasino-b.com\ncasino-c.com\n";
    let inputs = stage_inputs(KEYWORDS_CSV, domains_csv);
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(402))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server.uri());
    config.fetch.max_concurrent_requests = 1;
    let client = RankingClient::new(&config).unwrap();
    let cancel = CancellationToken::new();

    let report = run_analysis(
        &config,
        &DataSource::Path(inputs.keywords.clone()),
        &DataSource::Path(inputs.domains.clone()),
        Arc::new(client),
        cancel.clone(),
    )
    .await
    .unwrap();

    assert!(cancel.is_cancelled());
    assert!(report.summary.aborted);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.failures[0].kind, FailureKind::QuotaExhausted);
    assert_eq!(report.summary.skipped, 2);
    assert_eq!(report.domain_summaries[2].state, FetchState::Skipped);
}

#[tokio::test]
async fn test_cancel_before_start_writes_partial_report() {
    let inputs = stage_inputs(KEYWORDS_CSV, DOMAINS_CSV);
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let client = RankingClient::new(&config).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = run_analysis(
        &config,
        &DataSource::Path(inputs.keywords.clone()),
        &DataSource::Path(inputs.domains.clone()),
        Arc::new(client),
        cancel,
    )
    .await
    .unwrap();

    assert!(report.summary.aborted);
    assert_eq!(report.summary.skipped, 2);
    assert_eq!(report.summary.domains_processed, 0);
}

// ============================================================================
// Per-domain Failure Tests
// ============================================================================

#[tokio::test]
async fn test_domain_deadline_elapses() {
    let domains_csv = "Domain\nslowcasino.com\nfastcasino.com\n";
    let inputs = stage_inputs(KEYWORDS_CSV, domains_csv);
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_string_contains("slowcasino.com"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(ranked_body("slowcasino.com", &[]))
                .set_delay(Duration::from_secs(4)),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_string_contains("fastcasino.com"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ranked_body("fastcasino.com", &[])))
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server.uri());
    config.fetch.max_concurrent_requests = 2;
    config.fetch.domain_timeout_secs = 1;
    let client = RankingClient::new(&config).unwrap();

    let report = run_analysis(
        &config,
        &DataSource::Path(inputs.keywords.clone()),
        &DataSource::Path(inputs.domains.clone()),
        Arc::new(client),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.failures[0].domain, "slowcasino.com");
    assert_eq!(report.summary.failures[0].kind, FailureKind::Timeout);
}

#[tokio::test]
async fn test_malformed_response_isolated() {
    let inputs = stage_inputs(KEYWORDS_CSV, DOMAINS_CSV);
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_string_contains("badcasino.com"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"tasks\": \"oops\"}"))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_string_contains("\"target\":\"stake.com\""))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(ranked_body("stake.com", &[("online casino", 7, 300)])),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let client = RankingClient::new(&config).unwrap();

    let report = run_analysis(
        &config,
        &DataSource::Path(inputs.keywords.clone()),
        &DataSource::Path(inputs.domains.clone()),
        Arc::new(client),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.analysis.len(), 1);
    assert_eq!(report.summary.failures.len(), 1);
    assert_eq!(report.summary.failures[0].kind, FailureKind::MalformedResponse);
}

#[tokio::test]
async fn test_connection_refused() {
    let inputs = stage_inputs(KEYWORDS_CSV, DOMAINS_CSV);

    // Nothing listens on port 1
    let config = test_config("http://127.0.0.1:1");
    let client = RankingClient::new(&config).unwrap();

    let report = run_analysis(
        &config,
        &DataSource::Path(inputs.keywords.clone()),
        &DataSource::Path(inputs.domains.clone()),
        Arc::new(client),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.summary.failed, 2);
    assert!(report
        .summary
        .failures
        .iter()
        .all(|f| f.kind == FailureKind::ApiCallFailed));
    assert!(report.analysis.is_empty());
}
