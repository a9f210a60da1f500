//! End-to-end pipeline integration tests
//!
//! Tests the complete workflow:
//! 1. Keyword and domain list loading
//! 2. In-scope domain selection
//! 3. Ranking fetch (mocked)
//! 4. Keyword matching and aggregation
//! 5. Report output

use rankmatch::analysis::run_analysis;
use rankmatch::input::DataSource;
use rankmatch::models::{FailureKind, FetchState, QualificationStatus};
use rankmatch::ranking::RankingClient;
use rankmatch::storage::{ReportWriter, OPPORTUNITIES_FILE, RUN_SUMMARY_FILE};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fixtures::{stage_inputs, DOMAINS_CSV, KEYWORDS_CSV};
use crate::common::{ranked_body, test_config, ENDPOINT_PATH};

async fn mount_rankings(server: &MockServer, target: &str, items: &[(&str, u32, u64)]) {
    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_string_contains(format!("\"target\":\"{target}\"")))
        .respond_with(ResponseTemplate::new(200).set_body_string(ranked_body(target, items)))
        .mount(server)
        .await;
}

// ============================================================================
// Complete Pipeline Tests
// ============================================================================

#[tokio::test]
async fn test_end_to_end_with_one_failing_domain() {
    let inputs = stage_inputs(KEYWORDS_CSV, DOMAINS_CSV);
    let mock_server = MockServer::start().await;

    mount_rankings(
        &mock_server,
        "stake.com",
        &[("online casino", 3, 12000), ("live poker", 45, 800), ("casino bonus", 8, 5000)],
    )
    .await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_string_contains("\"target\":\"badcasino.com\""))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
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

    // Inputs
    let summary = &report.summary;
    assert_eq!(summary.keywords_loaded, 2);
    assert_eq!(summary.domains_loaded, 3);
    assert_eq!(summary.domains_in_scope, 2);
    assert!(summary.input_failures.is_empty());

    // Failure isolation
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].domain, "badcasino.com");
    assert_eq!(summary.failures[0].kind, FailureKind::ApiCallFailed);
    assert!(!summary.aborted);
    assert_eq!(summary.api_calls, 2);

    // Matching: position 45 is outside the default threshold
    assert_eq!(report.analysis.len(), 1);
    let m = &report.analysis[0];
    assert_eq!(m.domain, "stake.com");
    assert_eq!(m.keyword, "online casino");
    assert_eq!(m.position, 3);
    assert_eq!(m.search_volume, 12000);
    assert_eq!(m.client_domain, "stake.com");

    // Per-domain overview
    let stake = &report.domain_summaries[0];
    assert_eq!(stake.domain, "stake.com");
    assert_eq!(stake.ranked_keywords, 3);
    assert_eq!(stake.best_position, Some(3));
    assert_eq!(stake.traffic, Some(1_200_000.0));
    assert_eq!(
        stake.sample_vertical_keywords,
        vec!["online casino".to_string(), "casino bonus".to_string()]
    );
    assert_eq!(stake.status, QualificationStatus::Qualified);

    let bad = &report.domain_summaries[1];
    assert_eq!(bad.state, FetchState::Failed);
    assert_eq!(bad.status, QualificationStatus::NotQualified);

    // Report files
    let writer = ReportWriter::new(&inputs.output_dir()).unwrap();
    writer.write(&report).unwrap();

    let csv = std::fs::read_to_string(inputs.output_dir().join(OPPORTUNITIES_FILE)).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains("stake.com,online casino,3,12000,stake.com"));
    assert!(inputs.output_dir().join(RUN_SUMMARY_FILE).exists());
}

#[tokio::test]
async fn test_default_client_applies_to_non_clients() {
    let inputs = stage_inputs(KEYWORDS_CSV, "Domain\ncasinoguide.org\n");
    let mock_server = MockServer::start().await;

    mount_rankings(&mock_server, "casinoguide.org", &[("live poker", 12, 900), ("poker rules", 2, 50)]).await;

    let mut config = test_config(&mock_server.uri());
    config.matching.default_client = Some("stake.com".into());
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
    assert_eq!(report.analysis[0].domain, "casinoguide.org");
    assert_eq!(report.analysis[0].keyword, "live poker");
    assert_eq!(report.analysis[0].client_domain, "stake.com");
    assert_eq!(
        report.domain_summaries[0].client_domain.as_deref(),
        Some("stake.com")
    );
}

#[tokio::test]
async fn test_non_client_without_default_is_fetched_but_unmatched() {
    let inputs = stage_inputs(KEYWORDS_CSV, "Domain\ncasinoguide.org\n");
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(ranked_body("casinoguide.org", &[("online casino", 1, 10)])),
        )
        .expect(1)
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

    assert!(report.analysis.is_empty());
    assert_eq!(report.summary.succeeded, 1);
    assert!(report.domain_summaries[0].has_vertical_keyword);
    assert_eq!(report.raw_results.len(), 1);
}

#[tokio::test]
async fn test_duplicate_rankings_keep_best_position() {
    let inputs = stage_inputs(KEYWORDS_CSV, "Domain,Category\nstake.com,Casino\n");
    let mock_server = MockServer::start().await;

    mount_rankings(&mock_server, "stake.com", &[("online casino", 12, 500), ("online casino", 5, 500)]).await;

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
    assert_eq!(report.analysis[0].position, 5);
    // Raw results keep every fetched row
    assert_eq!(report.raw_results.len(), 2);
}

#[tokio::test]
async fn test_threshold_and_case_overrides() {
    let inputs = stage_inputs(KEYWORDS_CSV, "Domain,Category\nstake.com,Casino\n");
    let mock_server = MockServer::start().await;

    mount_rankings(&mock_server, "stake.com", &[("Online Casino", 3, 100), ("live poker", 45, 9000)]).await;

    let mut config = test_config(&mock_server.uri());
    config.matching.rank_threshold = 50;
    config.matching.case_insensitive = true;
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

    let keywords: Vec<_> = report.analysis.iter().map(|m| m.keyword.as_str()).collect();
    // Highest search volume first
    assert_eq!(keywords, vec!["live poker", "Online Casino"]);
}

#[tokio::test]
async fn test_concurrent_run_keeps_input_order() {
    let domains_csv = "Domain\ncasino-a.com\ncasino-b.com\ncasino-c.com\ncasino-d.com\ncasino-e.com\n";
    let inputs = stage_inputs(KEYWORDS_CSV, domains_csv);
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(ranked_body("x", &[("slots", 4, 10)]))
                .set_delay(Duration::from_millis(30)),
        )
        .expect(5)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server.uri());
    config.fetch.max_concurrent_requests = 3;
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

    assert_eq!(report.summary.succeeded, 5);
    let order: Vec<_> = report.domain_summaries.iter().map(|s| s.domain.as_str()).collect();
    assert_eq!(
        order,
        vec!["casino-a.com", "casino-b.com", "casino-c.com", "casino-d.com", "casino-e.com"]
    );
}

#[tokio::test]
async fn test_max_domains_cap() {
    let domains_csv = "Domain\ncasino-a.com\ncasino-b.com\ncasino-c.com\n";
    let inputs = stage_inputs(KEYWORDS_CSV, domains_csv);
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(ranked_body("x", &[])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server.uri());
    config.matching.max_domains = Some(1);
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

    assert_eq!(report.summary.domains_in_scope, 1);
    assert_eq!(report.domain_summaries[0].domain, "casino-a.com");
}

#[tokio::test]
async fn test_rate_limit_shared_across_workers() {
    let domains_csv = "Domain\ncasino-a.com\ncasino-b.com\ncasino-c.com\ncasino-d.com\ncasino-e.com\ncasino-f.com\n";
    let inputs = stage_inputs(KEYWORDS_CSV, domains_csv);
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(ranked_body("x", &[])))
        .expect(6)
        .mount(&mock_server)
        .await;

    // Six workers, two requests per second: the burst covers two calls and
    // the remaining four wait on the shared bucket
    let mut config = test_config(&mock_server.uri());
    config.fetch.requests_per_second = 2;
    config.fetch.max_concurrent_requests = 6;
    let client = RankingClient::new(&config).unwrap();

    let started = Instant::now();
    let report = run_analysis(
        &config,
        &DataSource::Path(inputs.keywords.clone()),
        &DataSource::Path(inputs.domains.clone()),
        Arc::new(client),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.summary.succeeded, 6);
    assert_eq!(report.summary.api_calls, 6);
    assert!(
        elapsed >= Duration::from_millis(1800),
        "six calls at 2 rps finished in {elapsed:?}"
    );
}
