//! Bounded worker pool for per-domain ranking retrieval
//!
//! Producer-consumer layout over tokio::mpsc channels:
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Domain    │     │   Ranking   │     │  Collector  │
//! │  Producer   │────▶│   Workers   │────▶│ (Aggregator)│
//! └─────────────┘     └─────────────┘     └─────────────┘
//!       │                   │                   │
//!       └─── mpsc ──────────┴──── mpsc ─────────┘
//!                           │
//!                   CancellationToken
//! ```
//!
//! Workers share one job receiver and one [`RankingSource`] (and therefore
//! one rate limiter). Each domain runs under its own deadline, and a failure
//! is recorded against that domain only. Quota exhaustion cancels the run:
//! undispatched domains become `SKIPPED` while in-flight requests finish.
//! Outcomes reach the aggregator through a single collector, so nothing else
//! writes to the shared result set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::matcher::{KeywordIndex, KeywordMatcher};
use crate::models::{DomainRecord, FailureKind, FetchState};
use crate::report::{Aggregator, DomainOutcome};

use super::RankingSource;

/// Log a progress line every this many collected outcomes
const PROGRESS_INTERVAL: u64 = 25;

// ============================================================================
// Configuration
// ============================================================================

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of concurrent ranking workers
    pub workers: usize,

    /// Channel buffer size
    pub channel_buffer_size: usize,

    /// Deadline for one domain, paging and retries included
    pub domain_timeout: Duration,

    /// Items requested per page
    pub fetch_limit: u32,

    /// Terms marking a ranked keyword as vertical-relevant
    pub vertical_terms: Vec<String>,

    /// Client whose keywords apply to non-client domains
    pub default_client: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            channel_buffer_size: 100,
            domain_timeout: Duration::from_secs(120),
            fetch_limit: 20,
            vertical_terms: Vec::new(),
            default_client: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.fetch.max_concurrent_requests.max(1),
            domain_timeout: config.domain_timeout(),
            fetch_limit: config.api.limit,
            vertical_terms: config.matching.vertical_terms.clone(),
            default_client: config.matching.default_client.clone(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// Message from the producer to a worker
#[derive(Debug, Clone)]
pub struct DomainJob {
    /// Position in the dispatch queue
    pub index: usize,

    /// Domain with its metrics
    pub record: DomainRecord,

    /// Lifecycle position; starts `PENDING`
    pub state: FetchState,
}

impl DomainJob {
    pub fn new(index: usize, record: DomainRecord) -> Self {
        Self {
            index,
            record,
            state: FetchState::Pending,
        }
    }

    /// Move to `next` when the lifecycle allows it
    pub fn advance(&mut self, next: FetchState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(
                domain = %self.record.domain,
                from = ?self.state,
                to = ?next,
                "Illegal fetch state transition"
            );
            return false;
        }
        self.state = next;
        true
    }
}

// ============================================================================
// Pipeline Statistics
// ============================================================================

/// Pipeline statistics (thread-safe)
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub total_jobs: AtomicU64,
    pub dispatched: AtomicU64,
    pub success_count: AtomicU64,
    pub failed_count: AtomicU64,
    pub skipped_count: AtomicU64,
    pub pages_fetched: AtomicU64,
    pub matches_found: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, outcome: &DomainOutcome) {
        if !outcome.state.is_terminal() {
            return;
        }
        let counter = match outcome.state {
            FetchState::Succeeded => &self.success_count,
            FetchState::Failed => &self.failed_count,
            _ => &self.skipped_count,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.pages_fetched
            .fetch_add(outcome.pages.len() as u64, Ordering::Relaxed);
        self.matches_found
            .fetch_add(outcome.matches.len() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_jobs: self.total_jobs.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            success_count: self.success_count.load(Ordering::Relaxed),
            failed_count: self.failed_count.load(Ordering::Relaxed),
            skipped_count: self.skipped_count.load(Ordering::Relaxed),
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            matches_found: self.matches_found.load(Ordering::Relaxed),
        }
    }

    pub fn completion_percentage(&self) -> f64 {
        let snapshot = self.snapshot();
        if snapshot.total_jobs == 0 {
            return 100.0;
        }
        (snapshot.completed() as f64 / snapshot.total_jobs as f64) * 100.0
    }
}

/// Snapshot of pipeline statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_jobs: u64,
    pub dispatched: u64,
    pub success_count: u64,
    pub failed_count: u64,
    pub skipped_count: u64,
    pub pages_fetched: u64,
    pub matches_found: u64,
}

impl StatsSnapshot {
    pub fn completed(&self) -> u64 {
        self.success_count + self.failed_count + self.skipped_count
    }
}

// ============================================================================
// Pipeline Implementation
// ============================================================================

/// Shared, read-only state handed to every worker
struct WorkerContext {
    config: PipelineConfig,
    source: Arc<dyn RankingSource>,
    index: Arc<KeywordIndex>,
    matcher: KeywordMatcher,
    cancel: CancellationToken,
}

/// Concurrent ranking retrieval feeding an [`Aggregator`]
pub struct RankingPipeline {
    config: PipelineConfig,
    source: Arc<dyn RankingSource>,
    index: Arc<KeywordIndex>,
    matcher: KeywordMatcher,
    stats: Arc<PipelineStats>,
}

impl RankingPipeline {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn RankingSource>,
        index: Arc<KeywordIndex>,
        matcher: KeywordMatcher,
    ) -> Self {
        Self {
            config,
            source,
            index,
            matcher,
            stats: PipelineStats::new(),
        }
    }

    /// Process every domain and return the aggregator holding one outcome
    /// per domain
    pub async fn run(
        &self,
        domains: Vec<DomainRecord>,
        mut aggregator: Aggregator,
        cancel: CancellationToken,
    ) -> Aggregator {
        let total = domains.len() as u64;
        self.stats.total_jobs.store(total, Ordering::Relaxed);

        info!(
            total,
            workers = self.config.workers,
            domain_timeout_secs = self.config.domain_timeout.as_secs(),
            "Starting ranking pipeline"
        );

        let buffer = self.config.channel_buffer_size.max(1);
        let (job_tx, job_rx) = mpsc::channel::<DomainJob>(buffer);
        let (result_tx, mut result_rx) = mpsc::channel::<DomainOutcome>(buffer);

        let context = Arc::new(WorkerContext {
            config: self.config.clone(),
            source: Arc::clone(&self.source),
            index: Arc::clone(&self.index),
            matcher: self.matcher.clone(),
            cancel: cancel.clone(),
        });

        let worker_handles = spawn_workers(self.config.workers.max(1), job_rx, result_tx.clone(), context);
        let producer = tokio::spawn(produce(
            domains,
            job_tx,
            result_tx,
            cancel.clone(),
            Arc::clone(&self.stats),
        ));

        // Single collector
        while let Some(outcome) = result_rx.recv().await {
            self.stats.record(&outcome);
            if let Some(failure) = &outcome.failure {
                warn!(
                    domain = %failure.domain,
                    kind = %failure.kind,
                    error = %failure.message,
                    "Domain failed"
                );
            }
            aggregator.push(outcome);

            let completed = self.stats.snapshot().completed();
            if completed % PROGRESS_INTERVAL == 0 {
                info!(
                    completed,
                    total,
                    percent = self.stats.completion_percentage(),
                    "Progress"
                );
            }
        }

        if let Err(e) = producer.await {
            error!(error = %e, "Producer task failed");
        }
        for result in futures::future::join_all(worker_handles).await {
            if let Err(e) = result {
                error!(error = %e, "Ranking worker failed");
            }
        }

        let snapshot = self.stats.snapshot();
        info!(
            success = snapshot.success_count,
            failed = snapshot.failed_count,
            skipped = snapshot.skipped_count,
            pages = snapshot.pages_fetched,
            matches = snapshot.matches_found,
            aborted = cancel.is_cancelled(),
            "Ranking pipeline completed"
        );

        aggregator
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

/// Queue domains in order; once cancelled, report the rest as skipped
async fn produce(
    domains: Vec<DomainRecord>,
    job_tx: mpsc::Sender<DomainJob>,
    result_tx: mpsc::Sender<DomainOutcome>,
    cancel: CancellationToken,
    stats: Arc<PipelineStats>,
) {
    for (index, record) in domains.into_iter().enumerate() {
        if cancel.is_cancelled() {
            if result_tx.send(DomainOutcome::skipped(index, record)).await.is_err() {
                break;
            }
            continue;
        }

        let permit = tokio::select! {
            permit = job_tx.reserve() => permit.ok(),
            _ = cancel.cancelled() => None,
        };

        match permit {
            Some(permit) => {
                permit.send(DomainJob::new(index, record));
                stats.dispatched.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                debug!(index, domain = %record.domain, "Not dispatched");
                if result_tx.send(DomainOutcome::skipped(index, record)).await.is_err() {
                    break;
                }
            }
        }
    }
}

fn spawn_workers(
    workers: usize,
    job_rx: mpsc::Receiver<DomainJob>,
    result_tx: mpsc::Sender<DomainOutcome>,
    context: Arc<WorkerContext>,
) -> Vec<JoinHandle<()>> {
    let job_rx = Arc::new(tokio::sync::Mutex::new(job_rx));
    let mut handles = Vec::with_capacity(workers);

    for worker_id in 0..workers {
        let job_rx = Arc::clone(&job_rx);
        let result_tx = result_tx.clone();
        let context = Arc::clone(&context);

        let handle = tokio::spawn(async move {
            loop {
                let job = {
                    let mut rx = job_rx.lock().await;
                    rx.recv().await
                };

                let Some(mut job) = job else {
                    break; // Channel closed
                };

                let outcome = if context.cancel.is_cancelled() {
                    job.advance(FetchState::Skipped);
                    DomainOutcome::skipped(job.index, job.record)
                } else {
                    job.advance(FetchState::Requested);
                    debug!(worker_id, index = job.index, domain = %job.record.domain, "Fetching rankings");
                    process_domain(&context, job).await
                };

                if result_tx.send(outcome).await.is_err() {
                    error!(worker_id, "Result channel closed");
                    break;
                }
            }

            debug!(worker_id, "Ranking worker shutting down");
        });

        handles.push(handle);
    }

    handles
}

/// Fetch, match and classify a single domain under its deadline
async fn process_domain(context: &WorkerContext, job: DomainJob) -> DomainOutcome {
    let DomainJob { index, record, .. } = job;
    let domain = record.domain.clone();

    let fetched = tokio::time::timeout(
        context.config.domain_timeout,
        context
            .source
            .fetch_rankings(&domain, context.config.fetch_limit),
    )
    .await;

    let pages = match fetched {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            if e.is_fatal_for_run() && !context.cancel.is_cancelled() {
                error!(domain = %domain, error = %e, "Quota exhausted, aborting run");
                context.cancel.cancel();
            }
            return DomainOutcome::failed(index, record, e.failure_kind(), e.to_string());
        }
        Err(_) => {
            return DomainOutcome::failed(
                index,
                record,
                FailureKind::Timeout,
                format!(
                    "Domain deadline of {}s elapsed",
                    context.config.domain_timeout.as_secs_f64()
                ),
            );
        }
    };

    let keywords = context
        .index
        .resolve(&domain, context.config.default_client.as_deref());

    let matches = match keywords {
        Some(keywords) => context.matcher.match_pages(&pages, keywords),
        None => {
            debug!(domain = %domain, "No client keywords apply");
            Vec::new()
        }
    };
    let vertical = context
        .matcher
        .vertical_keywords(&pages, &context.config.vertical_terms);

    debug!(
        domain = %domain,
        pages = pages.len(),
        matches = matches.len(),
        vertical = vertical.len(),
        "Domain processed"
    );

    DomainOutcome::succeeded(
        index,
        record,
        keywords.map(|k| k.client_domain().to_string()),
        pages,
        matches,
        vertical,
    )
}

// ============================================================================
// Pipeline Builder
// ============================================================================

/// Builder for [`PipelineConfig`]
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workers(mut self, count: usize) -> Self {
        self.config.workers = count;
        self
    }

    pub fn channel_buffer_size(mut self, size: usize) -> Self {
        self.config.channel_buffer_size = size;
        self
    }

    pub fn domain_timeout(mut self, timeout: Duration) -> Self {
        self.config.domain_timeout = timeout;
        self
    }

    pub fn fetch_limit(mut self, limit: u32) -> Self {
        self.config.fetch_limit = limit;
        self
    }

    pub fn vertical_terms(mut self, terms: Vec<String>) -> Self {
        self.config.vertical_terms = terms;
        self
    }

    pub fn default_client(mut self, client: Option<String>) -> Self {
        self.config.default_client = client;
        self
    }

    pub fn build(
        self,
        source: Arc<dyn RankingSource>,
        index: Arc<KeywordIndex>,
        matcher: KeywordMatcher,
    ) -> RankingPipeline {
        RankingPipeline::new(self.config, source, index, matcher)
    }
}

// ============================================================================
// Tests
// ============================================================================
