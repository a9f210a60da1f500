//! Keyword matching against per-client target sets
//!
//! A ranked page becomes a [`MatchedOpportunity`] when its keyword equals one
//! of the client's target keywords and its position is at or inside the rank
//! threshold. Comparison is exact by default; case-insensitive comparison is
//! a configuration switch. Unmatched pages are dropped silently.

use std::collections::{HashMap, HashSet};

use crate::config::MatchConfig;
use crate::models::{KeywordRecord, MatchedOpportunity, RankedPage};
use crate::utils::normalize_domain;

/// Deduplicated target keywords of one client
#[derive(Debug, Clone, Default)]
pub struct ClientKeywords {
    client_domain: String,
    exact: HashSet<String>,
    folded: HashSet<String>,
}

impl ClientKeywords {
    fn new(client_domain: &str) -> Self {
        Self {
            client_domain: client_domain.to_string(),
            ..Default::default()
        }
    }

    fn insert(&mut self, keyword: &str) {
        self.exact.insert(keyword.to_string());
        self.folded.insert(keyword.to_lowercase());
    }

    pub fn client_domain(&self) -> &str {
        &self.client_domain
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    pub fn contains(&self, keyword: &str, case_insensitive: bool) -> bool {
        if case_insensitive {
            self.folded.contains(&keyword.to_lowercase())
        } else {
            self.exact.contains(keyword)
        }
    }
}

/// Keyword sets indexed by normalized client domain
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    clients: HashMap<String, ClientKeywords>,
}

impl KeywordIndex {
    /// Build the index; duplicate (client, keyword) pairs collapse
    pub fn from_records(records: &[KeywordRecord]) -> Self {
        let mut clients: HashMap<String, ClientKeywords> = HashMap::new();

        for record in records {
            let Some(client) = normalize_domain(&record.client_domain) else {
                continue;
            };
            let keyword = record.keyword.trim();
            if keyword.is_empty() {
                continue;
            }

            clients
                .entry(client.clone())
                .or_insert_with(|| ClientKeywords::new(&client))
                .insert(keyword);
        }

        Self { clients }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn keyword_count(&self) -> usize {
        self.clients.values().map(ClientKeywords::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn for_client(&self, client_domain: &str) -> Option<&ClientKeywords> {
        normalize_domain(client_domain).and_then(|c| self.clients.get(&c))
    }

    /// Keyword set applying to `domain`: its own when it is a client,
    /// otherwise the default client's
    pub fn resolve(&self, domain: &str, default_client: Option<&str>) -> Option<&ClientKeywords> {
        self.for_client(domain)
            .or_else(|| default_client.and_then(|c| self.for_client(c)))
    }
}

/// Joins ranked pages with a client's target keywords
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    rank_threshold: u32,
    case_insensitive: bool,
}

impl Default for KeywordMatcher {
    fn default() -> Self {
        Self::new(20, false)
    }
}

impl KeywordMatcher {
    pub fn new(rank_threshold: u32, case_insensitive: bool) -> Self {
        Self {
            rank_threshold,
            case_insensitive,
        }
    }

    pub fn from_config(config: &MatchConfig) -> Self {
        Self::new(config.rank_threshold, config.case_insensitive)
    }

    /// Position is inside the threshold (boundary inclusive)
    pub fn within_threshold(&self, position: u32) -> bool {
        position <= self.rank_threshold
    }

    /// Matched opportunities for one domain's pages, in page order
    pub fn match_pages(&self, pages: &[RankedPage], keywords: &ClientKeywords) -> Vec<MatchedOpportunity> {
        pages
            .iter()
            .filter(|page| self.within_threshold(page.position))
            .filter(|page| keywords.contains(&page.keyword, self.case_insensitive))
            .map(|page| MatchedOpportunity::from_page(page, keywords.client_domain()))
            .collect()
    }

    /// Keywords inside the threshold containing any vertical term
    /// (case-insensitive substring), in page order without repeats
    pub fn vertical_keywords(&self, pages: &[RankedPage], terms: &[String]) -> Vec<String> {
        let terms: Vec<String> = terms.iter().map(|t| t.to_lowercase()).collect();
        let mut seen = HashSet::new();

        pages
            .iter()
            .filter(|page| self.within_threshold(page.position))
            .filter(|page| {
                let keyword = page.keyword.to_lowercase();
                terms.iter().any(|t| !t.is_empty() && keyword.contains(t.as_str()))
            })
            .filter(|page| seen.insert(page.keyword.clone()))
            .map(|page| page.keyword.clone())
            .collect()
    }
}
