//! rankmatch - Ranking-to-keyword matching for link-building outreach
//!
//! Loads a client keyword list and a domain export, selects the iGaming
//! domains, fetches each domain's ranked keywords from the ranking API, and
//! reports the domains that rank for client keywords.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`input`] - Keyword and domain list loading (file or URL)
//! - [`filter`] - In-scope domain selection
//! - [`ranking`] - Rate-limited ranking API client and worker pipeline
//! - [`matcher`] - Keyword index and threshold matching
//! - [`report`] - Deduplication, ordering and summary views
//! - [`storage`] - CSV and JSON report output
//! - [`models`] - Core data structures and types
//! - [`utils`] - Retry, normalization and error helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rankmatch::analysis::run_analysis;
//! use rankmatch::config::Config;
//! use rankmatch::input::DataSource;
//! use rankmatch::ranking::RankingClient;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let client = RankingClient::new(&config)?;
//!     let report = run_analysis(
//!         &config,
//!         &DataSource::parse("keywords.csv"),
//!         &DataSource::parse("domains.csv"),
//!         Arc::new(client),
//!         CancellationToken::new(),
//!     )
//!     .await?;
//!     println!("{} matches", report.analysis.len());
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod filter;
pub mod input;
pub mod matcher;
pub mod models;
pub mod ranking;
pub mod report;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::analysis::run_analysis;
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::input::{DataSource, InputLoader};
    pub use crate::matcher::{KeywordIndex, KeywordMatcher};
    pub use crate::models::{
        DomainRecord, FailureKind, KeywordRecord, MatchedOpportunity, RankedPage,
    };
    pub use crate::ranking::{RankingClient, RankingSource};
    pub use crate::report::{Aggregator, Report, RunSummary};
    pub use crate::storage::ReportWriter;
}

// Direct re-exports for convenience
pub use models::{DomainRecord, KeywordRecord, MatchedOpportunity, RankedPage};
