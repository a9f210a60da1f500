//! Report file output
//!
//! Writes the report views into an output directory:
//! - `outreach_opportunities.csv`: every deduplicated match, priority order
//! - `top_keywords.csv`: the top-K matches by search volume
//! - `domain_overview.csv`: one row per processed domain
//! - `raw_results.csv`: every ranked page fetched
//! - `run_summary.json`: counters, failures and timing
//!
//! Each file is written through a temporary sibling and renamed into place,
//! so a reader never sees a half-written report.

use csv::Writer;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{FetchState, MatchedOpportunity, RankedPage};
use crate::report::{DomainSummary, Report, RunSummary};

pub const OPPORTUNITIES_FILE: &str = "outreach_opportunities.csv";
pub const TOP_KEYWORDS_FILE: &str = "top_keywords.csv";
pub const DOMAIN_OVERVIEW_FILE: &str = "domain_overview.csv";
pub const RAW_RESULTS_FILE: &str = "raw_results.csv";
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

#[derive(Debug, Serialize)]
struct OpportunityRow<'a> {
    domain: &'a str,
    keyword: &'a str,
    position: u32,
    search_volume: u64,
    client_domain: &'a str,
    url: &'a str,
}

impl<'a> From<&'a MatchedOpportunity> for OpportunityRow<'a> {
    fn from(m: &'a MatchedOpportunity) -> Self {
        Self {
            domain: &m.domain,
            keyword: &m.keyword,
            position: m.position,
            search_volume: m.search_volume,
            client_domain: &m.client_domain,
            url: m.url.as_deref().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OverviewRow<'a> {
    domain: &'a str,
    client_domain: &'a str,
    fetch_state: FetchState,
    ranked_keywords: usize,
    match_count: usize,
    best_position: Option<u32>,
    matched_search_volume: u64,
    domain_rating: Option<f64>,
    traffic: Option<f64>,
    has_vertical_keyword: bool,
    sample_keywords: String,
    status: &'static str,
}

impl<'a> From<&'a DomainSummary> for OverviewRow<'a> {
    fn from(s: &'a DomainSummary) -> Self {
        Self {
            domain: &s.domain,
            client_domain: s.client_domain.as_deref().unwrap_or_default(),
            fetch_state: s.state,
            ranked_keywords: s.ranked_keywords,
            match_count: s.match_count,
            best_position: s.best_position,
            matched_search_volume: s.matched_search_volume,
            domain_rating: s.domain_rating,
            traffic: s.traffic,
            has_vertical_keyword: s.has_vertical_keyword,
            sample_keywords: s.sample_vertical_keywords.join("; "),
            status: s.status.as_str(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RawRow<'a> {
    domain: &'a str,
    keyword: &'a str,
    position: u32,
    search_volume: u64,
    url: &'a str,
}

impl<'a> From<&'a RankedPage> for RawRow<'a> {
    fn from(p: &'a RankedPage) -> Self {
        Self {
            domain: &p.domain,
            keyword: &p.keyword,
            position: p.position,
            search_volume: p.search_volume,
            url: p.url.as_deref().unwrap_or_default(),
        }
    }
}

/// Paths of the files produced by one write
#[derive(Debug, Clone)]
pub struct WrittenReport {
    pub opportunities: PathBuf,
    pub top_keywords: PathBuf,
    pub domain_overview: PathBuf,
    pub raw_results: PathBuf,
    pub run_summary: PathBuf,
}

/// Writes report views into one directory
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    /// Create the writer, creating `output_dir` if needed
    pub fn new(output_dir: &Path) -> Result<Self> {
        fs::create_dir_all(output_dir)?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every file for `report`
    pub fn write(&self, report: &Report) -> Result<WrittenReport> {
        let written = WrittenReport {
            opportunities: self.write_rows(
                OPPORTUNITIES_FILE,
                report.analysis.iter().map(OpportunityRow::from),
                &["domain", "keyword", "position", "search_volume", "client_domain", "url"],
            )?,
            top_keywords: self.write_rows(
                TOP_KEYWORDS_FILE,
                report.top_opportunities.iter().map(OpportunityRow::from),
                &["domain", "keyword", "position", "search_volume", "client_domain", "url"],
            )?,
            domain_overview: self.write_rows(
                DOMAIN_OVERVIEW_FILE,
                report.domain_summaries.iter().map(OverviewRow::from),
                &[
                    "domain",
                    "client_domain",
                    "fetch_state",
                    "ranked_keywords",
                    "match_count",
                    "best_position",
                    "matched_search_volume",
                    "domain_rating",
                    "traffic",
                    "has_vertical_keyword",
                    "sample_keywords",
                    "status",
                ],
            )?,
            raw_results: self.write_rows(
                RAW_RESULTS_FILE,
                report.raw_results.iter().map(RawRow::from),
                &["domain", "keyword", "position", "search_volume", "url"],
            )?,
            run_summary: self.write_summary(&report.summary)?,
        };

        info!(
            dir = %self.output_dir.display(),
            opportunities = report.analysis.len(),
            domains = report.domain_summaries.len(),
            "Report written"
        );

        Ok(written)
    }

    /// Write a CSV file; the header row is written even when there are no rows
    fn write_rows<R, I>(&self, name: &str, rows: I, headers: &[&str]) -> Result<PathBuf>
    where
        R: Serialize,
        I: IntoIterator<Item = R>,
    {
        let path = self.output_dir.join(name);
        let tmp = temp_path(&path);

        let mut wtr = Writer::from_writer(File::create(&tmp)?);
        let mut count = 0usize;
        // serialize() emits the header row from the first record
        for row in rows {
            wtr.serialize(row)?;
            count += 1;
        }
        if count == 0 {
            wtr.write_record(headers)?;
        }
        wtr.flush()?;
        drop(wtr);

        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), rows = count, "Wrote CSV");
        Ok(path)
    }

    fn write_summary(&self, summary: &RunSummary) -> Result<PathBuf> {
        let path = self.output_dir.join(RUN_SUMMARY_FILE);
        let tmp = temp_path(&path);

        let json = serde_json::to_string_pretty(summary)?;
        let mut file = File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &path)?;
        Ok(path)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
