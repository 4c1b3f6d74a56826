//! arXiv provider client.
//!
//! Speaks the arXiv export API, which answers with an Atom feed.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use feed_rs::parser;
use std::sync::Arc;

use crate::models::{Provider, SearchQuery};
use crate::sources::{check_status, NativeRecord, Source, SourceCapabilities, SourceError};
use crate::utils::{sanitize_paper_id, sanitize_query, HttpClient};

/// Path of the query endpoint under the base URL
const QUERY_PATH: &str = "/api/query";

/// One `<link>` of an Atom entry
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArxivLink {
    pub href: String,
    pub rel: Option<String>,
    pub title: Option<String>,
    pub media_type: Option<String>,
}

/// An Atom `<entry>` from the arXiv export API
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArxivEntry {
    /// Entry id, e.g. `http://arxiv.org/abs/2407.06405v1`
    pub id: String,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub summary: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub links: Vec<ArxivLink>,
    pub categories: Vec<String>,
}

impl ArxivEntry {
    fn from_feed_entry(entry: feed_rs::model::Entry) -> Self {
        Self {
            id: entry.id,
            title: entry.title.map(|t| t.content),
            authors: entry.authors.into_iter().map(|a| a.name).collect(),
            summary: entry.summary.map(|s| s.content),
            published: entry.published,
            links: entry
                .links
                .into_iter()
                .map(|l| ArxivLink {
                    href: l.href,
                    rel: l.rel,
                    title: l.title,
                    media_type: l.media_type,
                })
                .collect(),
            categories: entry.categories.into_iter().map(|c| c.term).collect(),
        }
    }

    /// Error entries carry an id under `/api/errors`
    fn is_error(&self) -> bool {
        self.id.contains("/api/errors")
    }
}

/// arXiv provider client
///
/// Supports:
/// - Search by keywords, category and submission date
/// - Lookup by arXiv id
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: Arc<HttpClient>,
    base_url: String,
}

impl ArxivSource {
    /// Create with a shared HTTP client and base URL
    pub fn with_client(client: Arc<HttpClient>, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Parse an arXiv ID from various formats
    ///
    /// Handles formats like:
    /// - "2301.12345" and "2301.12345v1" (the version is kept)
    /// - "arxiv:2301.12345"
    /// - "https://arxiv.org/abs/2301.12345v1"
    /// - "cs.AI/0001001" (old style)
    pub fn parse_id(id: &str) -> Result<String, SourceError> {
        let id = id.trim();
        let lower = id.to_ascii_lowercase();

        let id = if let Some(pos) = lower.find("/abs/") {
            &id[pos + 5..]
        } else if lower.starts_with("arxiv:") {
            &id["arxiv:".len()..]
        } else {
            id
        };

        Ok(sanitize_paper_id(id)?)
    }

    /// Build the `search_query` expression for the arXiv API
    fn build_search_query(query: &SearchQuery, today: NaiveDate) -> String {
        let keywords = sanitize_query(&query.keywords, 200);
        let mut parts = vec![if keywords.is_empty() {
            "all:*".to_string()
        } else {
            format!("all:{}", keywords)
        }];

        if let Some(subjects) = query.subjects.as_deref() {
            let category = sanitize_query(subjects, 50);
            if !category.is_empty() {
                parts.push(format!("cat:{}", category));
            }
        }

        if let Some(since) = query.published_since {
            parts.push(format!(
                "submittedDate:[{}0000 TO {}2359]",
                since.format("%Y%m%d"),
                today.format("%Y%m%d")
            ));
        }

        parts.join(" AND ")
    }

    async fn get_feed(&self, url: &str) -> Result<Vec<ArxivEntry>, SourceError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/atom+xml")
            .send()
            .await?;
        let response = check_status(response, Provider::Arxiv, "Feed")?;

        let bytes = response.bytes().await?;
        let feed = parser::parse(bytes.as_ref())
            .map_err(|e| SourceError::Parse(format!("Failed to parse Atom feed: {}", e)))?;

        Ok(feed
            .entries
            .into_iter()
            .map(ArxivEntry::from_feed_entry)
            .collect())
    }
}

#[async_trait]
impl Source for ArxivSource {
    fn provider(&self) -> Provider {
        Provider::Arxiv
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::FETCH | SourceCapabilities::CONTENT
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<NativeRecord>, SourceError> {
        let search_query = Self::build_search_query(query, Utc::now().date_naive());

        let url = format!(
            "{}{}?search_query={}&start={}&max_results={}",
            self.base_url,
            QUERY_PATH,
            urlencoding::encode(&search_query),
            query.offset,
            query.limit
        );

        let entries = self.get_feed(&url).await?;
        if let Some(error) = entries.iter().find(|e| e.is_error()) {
            return Err(SourceError::Api(
                error.summary.clone().unwrap_or_else(|| error.id.clone()),
            ));
        }

        Ok(entries.into_iter().map(NativeRecord::Arxiv).collect())
    }

    async fn fetch(&self, id: &str) -> Result<NativeRecord, SourceError> {
        let paper_id = Self::parse_id(id)?;
        let url = format!(
            "{}{}?id_list={}",
            self.base_url,
            QUERY_PATH,
            urlencoding::encode(&paper_id)
        );

        self.get_feed(&url)
            .await?
            .into_iter()
            .find(|e| !e.is_error())
            .map(NativeRecord::Arxiv)
            .ok_or_else(|| SourceError::NotFound(format!("arXiv paper {}", paper_id)))
    }
}
