use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use rankmatch::analysis::run_analysis;
use rankmatch::config::Config;
use rankmatch::input::DataSource;
use rankmatch::ranking::RankingClient;
use rankmatch::report::Report;
use rankmatch::storage::ReportWriter;

/// Command-line overrides for one analysis run
#[derive(Debug, Clone)]
pub struct AnalyzeParams {
    pub keywords: String,
    pub domains: String,
    pub output: PathBuf,
    pub threshold: Option<u32>,
    pub concurrency: Option<usize>,
    pub max_domains: Option<usize>,
    pub case_insensitive: bool,
}

impl AnalyzeParams {
    fn apply(&self, config: &mut Config) {
        if let Some(threshold) = self.threshold {
            config.matching.rank_threshold = threshold;
        }
        if let Some(concurrency) = self.concurrency {
            config.fetch.max_concurrent_requests = concurrency;
        }
        if let Some(max_domains) = self.max_domains {
            config.matching.max_domains = Some(max_domains);
        }
        if self.case_insensitive {
            config.matching.case_insensitive = true;
        }
    }
}

pub async fn analyze(mut config: Config, params: AnalyzeParams) -> Result<()> {
    params.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    if !config.has_credentials() {
        anyhow::bail!("DATAFORSEO_EMAIL and DATAFORSEO_API_KEY must be set");
    }

    println!("Starting Ranking Analysis");
    println!("=========================");
    println!("Keywords: {}", params.keywords);
    println!("Domains: {}", params.domains);
    println!("Rank threshold: {}", config.matching.rank_threshold);
    println!("Workers: {}", config.fetch.max_concurrent_requests);

    let client = RankingClient::new(&config).context("Failed to create ranking client")?;

    // Ctrl-C stops dispatching; finished work is still written
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight requests");
            signal_token.cancel();
        }
    });

    let report = run_analysis(
        &config,
        &DataSource::parse(&params.keywords),
        &DataSource::parse(&params.domains),
        Arc::new(client),
        cancel,
    )
    .await
    .context("Analysis failed")?;

    let writer = ReportWriter::new(&params.output).context("Failed to create output directory")?;
    writer.write(&report).context("Failed to write report")?;

    print_summary(&report, writer.output_dir());
    Ok(())
}

fn print_summary(report: &Report, output: &std::path::Path) {
    let summary = &report.summary;

    println!("\nAnalysis Summary");
    println!("================");
    println!("Run ID: {}", summary.run_id);
    println!("Domains in scope: {}", summary.domains_in_scope);
    println!("Processed: {}", summary.domains_processed);
    println!("Succeeded: {}", summary.succeeded);
    println!("Failed: {}", summary.failed);
    println!("Skipped: {}", summary.skipped);
    println!("API calls: {}", summary.api_calls);
    println!("Matches: {}", summary.matches);
    println!("Qualified domains: {}", summary.qualified);
    for domain in report.qualified_domains() {
        println!(
            "  {} (DR {}, traffic {})",
            domain.domain,
            domain.domain_rating.map_or("-".to_string(), |v| v.to_string()),
            domain.traffic.map_or("-".to_string(), |v| v.to_string()),
        );
    }
    if summary.aborted {
        println!("Run was aborted; results are partial");
    }

    let failures = summary.failure_counts();
    if !failures.is_empty() {
        println!("\nFailures");
        println!("--------");
        for (kind, count) in failures {
            println!("{kind}: {count}");
        }
    }

    if !report.top_opportunities.is_empty() {
        println!("\nTop Opportunities");
        println!("-----------------");
        for m in report.top_opportunities.iter().take(10) {
            println!(
                "{:<30} {:<35} #{:<4} vol {}",
                m.domain, m.keyword, m.position, m.search_volume
            );
        }
    }

    println!("\nOutput directory: {}", output.display());
}
