//! End-to-end analysis run
//!
//! Load both lists, select in-scope domains, fetch and match rankings, and
//! aggregate. Input problems degrade to empty sets and are carried in the
//! run summary; the run itself only errors on local setup failures.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::filter::DomainFilter;
use crate::input::{DataSource, InputLoader};
use crate::matcher::{KeywordIndex, KeywordMatcher};
use crate::models::DomainRecord;
use crate::ranking::pipeline::{PipelineConfig, RankingPipeline};
use crate::ranking::RankingSource;
use crate::report::{Aggregator, Report};

/// In-scope domains, capped at `max_domains` when configured
pub fn select_domains(config: &Config, records: &[DomainRecord]) -> Vec<DomainRecord> {
    let filter = DomainFilter::new(
        &config.matching.inclusion_terms,
        config.matching.category_fields.clone(),
    );
    let mut selected = filter.apply(records);

    if let Some(cap) = config.matching.max_domains {
        if selected.len() > cap {
            info!(selected = selected.len(), cap, "Capping domain count");
            selected.truncate(cap);
        }
    }

    selected
}

/// Run the whole analysis against `source`
///
/// # Errors
///
/// Returns an error only if the input HTTP client cannot be created
pub async fn run_analysis(
    config: &Config,
    keywords: &DataSource,
    domains: &DataSource,
    source: Arc<dyn RankingSource>,
    cancel: CancellationToken,
) -> Result<Report> {
    let loader = InputLoader::new(config.request_timeout())?;
    let (keyword_load, domain_load) =
        tokio::join!(loader.load_keywords(keywords), loader.load_domains(domains));

    let mut aggregator = Aggregator::new(config.matching.top_k, config.qualification.clone());
    for error in [&keyword_load.error, &domain_load.error].into_iter().flatten() {
        aggregator.record_input_failure(error);
    }

    let index = KeywordIndex::from_records(&keyword_load.records);
    let selected = select_domains(config, &domain_load.records);
    aggregator.set_input_counts(
        keyword_load.records.len(),
        domain_load.records.len(),
        selected.len(),
    );

    info!(
        clients = index.client_count(),
        keywords = index.keyword_count(),
        domains = domain_load.records.len(),
        in_scope = selected.len(),
        "Inputs ready"
    );

    if index.is_empty() && !selected.is_empty() {
        warn!("No client keywords loaded; domains are fetched for relevance only");
    }

    let pipeline = RankingPipeline::new(
        PipelineConfig::from_config(config),
        Arc::clone(&source),
        Arc::new(index),
        KeywordMatcher::from_config(&config.matching),
    );

    let aggregator = pipeline.run(selected, aggregator, cancel.clone()).await;
    let report = aggregator.finish(source.calls_made(), cancel.is_cancelled());

    info!(
        run_id = %report.summary.run_id,
        processed = report.summary.domains_processed,
        matches = report.summary.matches,
        qualified = report.summary.qualified,
        api_calls = report.summary.api_calls,
        aborted = report.summary.aborted,
        "Analysis finished"
    );

    Ok(report)
}
