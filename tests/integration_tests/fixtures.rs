//! Test fixtures for integration tests
//!
//! Provides sample input lists and helpers for staging them on disk

use std::path::PathBuf;
use tempfile::TempDir;

use crate::common::write_file;

/// Keyword list with a duplicate row and the header spelled as exported
pub const KEYWORDS_CSV: &str = "Client(domain),Keyword
stake.com,online casino
stake.com,live poker
stake.com,online casino
";

/// Domain export: two iGaming domains (by category) and one off-topic
pub const DOMAINS_CSV: &str = "Domain,Domain Rating (DR),Traffic (Ah),Category
stake.com,80,\"1,200,000\",Casino
news.com,50,9000,News
badcasino.com,30,2000,Gambling
";

/// Keyword and domain files staged in a temp directory
pub struct StagedInputs {
    pub dir: TempDir,
    pub keywords: PathBuf,
    pub domains: PathBuf,
}

impl StagedInputs {
    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }
}

pub fn stage_inputs(keywords_csv: &str, domains_csv: &str) -> StagedInputs {
    let dir = TempDir::new().unwrap();
    let keywords = write_file(dir.path(), "keywords.csv", keywords_csv);
    let domains = write_file(dir.path(), "domains.csv", domains_csv);
    StagedInputs {
        dir,
        keywords,
        domains,
    }
}
