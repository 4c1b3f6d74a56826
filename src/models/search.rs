//! Search request and response models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::paper::{PaperResult, Provider};

/// Largest page a single provider is asked for
pub const MAX_LIMIT: usize = 100;

/// Default page size when the caller does not give one
pub const DEFAULT_LIMIT: usize = 10;

/// A search request was rejected before any provider was contacted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid search query: {0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Search query parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text keywords; empty browses the most recent records
    pub keywords: String,

    /// Providers to query; empty means every registered provider
    pub providers: BTreeSet<Provider>,

    /// Maximum number of results per provider
    pub limit: usize,

    /// Number of results to skip per provider
    pub offset: usize,

    /// Subject/category filter (arXiv category, OpenAlex concept, OSF subject)
    pub subjects: Option<String>,

    /// Only records published on or after this date
    pub published_since: Option<NaiveDate>,

    /// OSF-family preprint server id (e.g. "psyarxiv")
    pub osf_provider: Option<String>,

    /// Drop cross-provider duplicates from the aggregate
    pub dedup: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            keywords: String::new(),
            providers: BTreeSet::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
            subjects: None,
            published_since: None,
            osf_provider: None,
            dedup: false,
        }
    }
}

impl SearchQuery {
    /// Create a new search query
    pub fn new(keywords: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            ..Default::default()
        }
    }

    /// Restrict to one more provider
    pub fn provider(mut self, provider: Provider) -> Self {
        self.providers.insert(provider);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn subjects(mut self, subjects: impl Into<String>) -> Self {
        self.subjects = Some(subjects.into());
        self
    }

    pub fn published_since(mut self, date: NaiveDate) -> Self {
        self.published_since = Some(date);
        self
    }

    pub fn osf_provider(mut self, id: impl Into<String>) -> Self {
        self.osf_provider = Some(id.into());
        self
    }

    pub fn dedup(mut self, dedup: bool) -> Self {
        self.dedup = dedup;
        self
    }

    /// Check the query invariants (`0 < limit <= MAX_LIMIT`)
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.limit == 0 {
            return Err(ValidationError::new("limit must be greater than zero"));
        }
        if self.limit > MAX_LIMIT {
            return Err(ValidationError::new(format!(
                "limit must not exceed {}",
                MAX_LIMIT
            )));
        }
        if let Some(id) = &self.osf_provider {
            if id.trim().is_empty() {
                return Err(ValidationError::new("osf_provider must not be blank"));
            }
        }
        Ok(())
    }

    /// 1-based page number for page-oriented APIs, rounding the offset down
    pub fn page_number(&self) -> usize {
        self.offset / self.limit.max(1) + 1
    }
}

/// A provider that did not contribute to an aggregate result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: Provider,
    pub error: String,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider.id(), self.error)
    }
}

/// Aggregated result of a multi-provider search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Normalized papers, first-provider-first
    pub papers: Vec<PaperResult>,

    /// Providers that were queried, in dispatch order
    pub providers_searched: Vec<Provider>,

    /// Providers whose call failed
    pub failures: Vec<ProviderFailure>,

    /// Records dropped by the normalizer for lacking a title or identifier
    pub dropped_records: usize,
}

impl SearchOutcome {
    pub fn total_count(&self) -> usize {
        self.papers.len()
    }

    /// Whether every queried provider contributed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
