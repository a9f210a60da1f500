//! In-scope domain selection
//!
//! A domain is in scope when its name, or the text of one of the configured
//! category columns, contains any inclusion term (case-insensitive). Missing
//! or numeric category cells never match. Output keeps input order, and a
//! domain listed twice is kept once (first occurrence).

use std::collections::HashSet;
use tracing::debug;

use crate::models::DomainRecord;
use crate::utils::normalize_domain;

#[derive(Debug, Clone)]
pub struct DomainFilter {
    terms: Vec<String>,
    category_fields: Vec<String>,
}

impl DomainFilter {
    pub fn new<I, S>(terms: I, category_fields: Vec<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        Self {
            terms,
            category_fields,
        }
    }

    /// Whether a single record is in scope
    pub fn matches(&self, record: &DomainRecord) -> bool {
        if !record.is_eligible() {
            return false;
        }

        let name = record.domain.to_lowercase();
        if self.contains_term(&name) {
            return true;
        }

        self.category_fields.iter().any(|field| {
            record
                .metric(field)
                .and_then(|v| v.as_text())
                .is_some_and(|text| self.contains_term(&text.to_lowercase()))
        })
    }

    fn contains_term(&self, haystack: &str) -> bool {
        self.terms.iter().any(|term| haystack.contains(term.as_str()))
    }

    /// Select the in-scope subset, preserving input order
    pub fn apply(&self, records: &[DomainRecord]) -> Vec<DomainRecord> {
        let mut seen = HashSet::new();

        let selected: Vec<DomainRecord> = records
            .iter()
            .filter(|r| self.matches(r))
            .filter(|r| {
                let key = normalize_domain(&r.domain).unwrap_or_else(|| r.domain.to_lowercase());
                seen.insert(key)
            })
            .cloned()
            .collect();

        debug!(
            total = records.len(),
            selected = selected.len(),
            "Applied domain filter"
        );

        selected
    }
}
