//! Aggregation of per-domain outcomes into report views
//!
//! The collector pushes one [`DomainOutcome`] per domain (single writer). On
//! [`Aggregator::finish`] the matches are deduplicated on (domain, keyword)
//! keeping the best position, sorted for outreach priority, and exposed as:
//! - the full analysis set
//! - the top-K opportunities by search volume
//! - a per-domain summary
//! - the raw ranked pages
//! - a run summary with failure counts

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use crate::config::QualificationConfig;
use crate::models::{
    DomainFailure, DomainRecord, FailureKind, FetchState, MatchedOpportunity, QualificationStatus,
    RankedPage,
};
use crate::utils::error::InputError;

/// Number of sample vertical keywords kept per domain
const VERTICAL_SAMPLE_SIZE: usize = 2;

/// Everything the pipeline learned about one domain
#[derive(Debug, Clone)]
pub struct DomainOutcome {
    /// Position in the dispatch queue
    pub index: usize,
    pub record: DomainRecord,
    pub state: FetchState,
    pub client_domain: Option<String>,
    pub pages: Vec<RankedPage>,
    pub matches: Vec<MatchedOpportunity>,
    pub vertical_keywords: Vec<String>,
    pub failure: Option<DomainFailure>,
}

impl DomainOutcome {
    pub fn succeeded(
        index: usize,
        record: DomainRecord,
        client_domain: Option<String>,
        pages: Vec<RankedPage>,
        matches: Vec<MatchedOpportunity>,
        vertical_keywords: Vec<String>,
    ) -> Self {
        Self {
            index,
            record,
            state: FetchState::Succeeded,
            client_domain,
            pages,
            matches,
            vertical_keywords,
            failure: None,
        }
    }

    pub fn failed(index: usize, record: DomainRecord, kind: FailureKind, message: impl Into<String>) -> Self {
        let failure = DomainFailure {
            domain: record.domain.clone(),
            kind,
            message: message.into(),
        };
        Self {
            index,
            record,
            state: FetchState::Failed,
            client_domain: None,
            pages: Vec::new(),
            matches: Vec::new(),
            vertical_keywords: Vec::new(),
            failure: Some(failure),
        }
    }

    pub fn skipped(index: usize, record: DomainRecord) -> Self {
        Self {
            index,
            record,
            state: FetchState::Skipped,
            client_domain: None,
            pages: Vec::new(),
            matches: Vec::new(),
            vertical_keywords: Vec::new(),
            failure: None,
        }
    }
}

/// Per-domain overview row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainSummary {
    pub domain: String,
    pub client_domain: Option<String>,
    pub state: FetchState,
    pub ranked_keywords: usize,
    pub match_count: usize,
    pub best_position: Option<u32>,
    pub matched_search_volume: u64,
    pub domain_rating: Option<f64>,
    pub traffic: Option<f64>,
    pub has_vertical_keyword: bool,
    pub sample_vertical_keywords: Vec<String>,
    pub status: QualificationStatus,
}

/// Run-level counters and failures
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub keywords_loaded: usize,
    pub domains_loaded: usize,
    pub domains_in_scope: usize,
    pub domains_processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub api_calls: u64,
    pub matches: usize,
    pub qualified: usize,
    pub aborted: bool,
    pub input_failures: Vec<DomainFailure>,
    pub failures: Vec<DomainFailure>,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            keywords_loaded: 0,
            domains_loaded: 0,
            domains_in_scope: 0,
            domains_processed: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            api_calls: 0,
            matches: 0,
            qualified: 0,
            aborted: false,
            input_failures: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Failure counts by kind, for operator output
    pub fn failure_counts(&self) -> Vec<(FailureKind, usize)> {
        let mut counts: HashMap<FailureKind, usize> = HashMap::new();
        for failure in self.failures.iter().chain(&self.input_failures) {
            *counts.entry(failure.kind).or_default() += 1;
        }
        let mut counts: Vec<_> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        counts
    }
}

/// Final report views
#[derive(Debug, Clone)]
pub struct Report {
    pub analysis: Vec<MatchedOpportunity>,
    pub top_opportunities: Vec<MatchedOpportunity>,
    pub domain_summaries: Vec<DomainSummary>,
    pub raw_results: Vec<RankedPage>,
    pub summary: RunSummary,
}

impl Report {
    pub fn qualified_domains(&self) -> impl Iterator<Item = &DomainSummary> {
        self.domain_summaries
            .iter()
            .filter(|s| s.status == QualificationStatus::Qualified)
    }
}

/// Outreach priority: search volume desc, position asc, then domain and keyword
pub fn priority_order(a: &MatchedOpportunity, b: &MatchedOpportunity) -> Ordering {
    b.search_volume
        .cmp(&a.search_volume)
        .then_with(|| a.position.cmp(&b.position))
        .then_with(|| a.domain.cmp(&b.domain))
        .then_with(|| a.keyword.cmp(&b.keyword))
}

/// Keep one record per (domain, keyword), the one with the lowest position
pub fn dedup_best_position(matches: impl IntoIterator<Item = MatchedOpportunity>) -> Vec<MatchedOpportunity> {
    let mut best: HashMap<(String, String), MatchedOpportunity> = HashMap::new();

    for m in matches {
        let key = (m.domain.clone(), m.keyword.clone());
        match best.get(&key) {
            Some(existing) if existing.position <= m.position => {}
            _ => {
                best.insert(key, m);
            }
        }
    }

    best.into_values().collect()
}

/// Single-writer collector of domain outcomes
pub struct Aggregator {
    top_k: usize,
    qualification: QualificationConfig,
    outcomes: Vec<DomainOutcome>,
    summary: RunSummary,
}

impl Aggregator {
    pub fn new(top_k: usize, qualification: QualificationConfig) -> Self {
        Self {
            top_k,
            qualification,
            outcomes: Vec::new(),
            summary: RunSummary::new(),
        }
    }

    /// Record a degraded input source
    pub fn record_input_failure(&mut self, error: &InputError) {
        self.summary.input_failures.push(DomainFailure {
            domain: error.source_id().to_string(),
            kind: error.failure_kind(),
            message: error.to_string(),
        });
    }

    pub fn set_input_counts(&mut self, keywords_loaded: usize, domains_loaded: usize, domains_in_scope: usize) {
        self.summary.keywords_loaded = keywords_loaded;
        self.summary.domains_loaded = domains_loaded;
        self.summary.domains_in_scope = domains_in_scope;
    }

    /// Record a finished domain; outcomes still in flight are ignored
    pub fn push(&mut self, outcome: DomainOutcome) {
        if !outcome.state.is_terminal() {
            warn!(domain = %outcome.record.domain, state = ?outcome.state, "Ignoring unfinished outcome");
            return;
        }
        match outcome.state {
            FetchState::Succeeded => self.summary.succeeded += 1,
            FetchState::Failed => self.summary.failed += 1,
            _ => self.summary.skipped += 1,
        }
        if let Some(failure) = &outcome.failure {
            self.summary.failures.push(failure.clone());
        }
        self.outcomes.push(outcome);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn qualify(&self, record: &DomainRecord, has_vertical: bool) -> (Option<f64>, Option<f64>, QualificationStatus) {
        let dr = record.numeric_metric(&self.qualification.domain_rating_column);
        let traffic = record.numeric_metric(&self.qualification.traffic_column);

        let qualifies = has_vertical
            && dr.is_some_and(|v| v >= self.qualification.min_domain_rating)
            && traffic.is_some_and(|v| v >= self.qualification.min_traffic);

        let status = if qualifies {
            QualificationStatus::Qualified
        } else {
            QualificationStatus::NotQualified
        };
        (dr, traffic, status)
    }

    /// Build the report views
    pub fn finish(mut self, api_calls: u64, aborted: bool) -> Report {
        self.outcomes.sort_by_key(|o| o.index);

        let mut analysis = dedup_best_position(
            self.outcomes
                .iter()
                .filter(|o| o.state == FetchState::Succeeded)
                .flat_map(|o| o.matches.iter().cloned()),
        );
        analysis.sort_by(priority_order);

        let top_opportunities: Vec<_> = analysis.iter().take(self.top_k).cloned().collect();

        let mut per_domain: HashMap<&str, (usize, Option<u32>, u64)> = HashMap::new();
        for m in &analysis {
            let entry = per_domain.entry(m.domain.as_str()).or_insert((0, None, 0));
            entry.0 += 1;
            entry.1 = Some(entry.1.map_or(m.position, |best| best.min(m.position)));
            entry.2 += m.search_volume;
        }

        let domain_summaries: Vec<DomainSummary> = self
            .outcomes
            .iter()
            .map(|o| {
                let (match_count, best_position, matched_search_volume) = per_domain
                    .get(o.record.domain.as_str())
                    .copied()
                    .unwrap_or((0, None, 0));
                let has_vertical = !o.vertical_keywords.is_empty();
                let (domain_rating, traffic, status) = self.qualify(&o.record, has_vertical);

                DomainSummary {
                    domain: o.record.domain.clone(),
                    client_domain: o.client_domain.clone(),
                    state: o.state,
                    ranked_keywords: o.pages.len(),
                    match_count,
                    best_position,
                    matched_search_volume,
                    domain_rating,
                    traffic,
                    has_vertical_keyword: has_vertical,
                    sample_vertical_keywords: o
                        .vertical_keywords
                        .iter()
                        .take(VERTICAL_SAMPLE_SIZE)
                        .cloned()
                        .collect(),
                    status,
                }
            })
            .collect();

        let raw_results: Vec<RankedPage> = self
            .outcomes
            .iter()
            .filter(|o| o.state == FetchState::Succeeded)
            .flat_map(|o| o.pages.iter().cloned())
            .collect();

        let mut summary = self.summary;
        summary.domains_processed = summary.succeeded + summary.failed;
        summary.api_calls = api_calls;
        summary.matches = analysis.len();
        summary.qualified = domain_summaries
            .iter()
            .filter(|s| s.status == QualificationStatus::Qualified)
            .count();
        summary.aborted = aborted;
        summary.finished_at = Some(Utc::now());

        Report {
            analysis,
            top_opportunities,
            domain_summaries,
            raw_results,
            summary,
        }
    }
}
