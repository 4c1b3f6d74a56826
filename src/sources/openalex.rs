//! OpenAlex provider client.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{Provider, SearchQuery};
use crate::sources::{
    check_status, decode_records, null_as_default, NativeRecord, Source, SourceCapabilities,
    SourceError,
};
use crate::utils::{collapse_whitespace, sanitize_paper_id, sanitize_query, HttpClient};

/// Prefix OpenAlex puts in front of every entity id
pub const OPENALEX_ID_PREFIX: &str = "https://openalex.org/";

/// OpenAlex provider client
///
/// Uses the OpenAlex REST API. Setting a `mailto` address routes requests
/// through the polite pool.
#[derive(Debug, Clone)]
pub struct OpenAlexSource {
    client: Arc<HttpClient>,
    base_url: String,
    mailto: Option<String>,
}

impl OpenAlexSource {
    /// Create with a shared HTTP client and base URL
    pub fn with_client(client: Arc<HttpClient>, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            mailto: None,
        }
    }

    /// Set the contact address (recommended for better rate limits)
    pub fn mailto(mut self, mailto: Option<String>) -> Self {
        self.mailto = mailto.filter(|m| !m.trim().is_empty());
        self
    }

    /// Strip the `https://openalex.org/` prefix and validate the rest
    pub fn parse_id(id: &str) -> Result<String, SourceError> {
        let id = id.trim();
        let id = id.strip_prefix(OPENALEX_ID_PREFIX).unwrap_or(id);
        Ok(sanitize_paper_id(id)?)
    }

    /// Build the comma-separated `filter` parameter value
    fn build_filter(query: &SearchQuery) -> Option<String> {
        let mut filters = Vec::new();

        let keywords = filter_value(&query.keywords, 500);
        if !keywords.is_empty() {
            filters.push(format!("default.search:{}", keywords));
        }

        if let Some(subjects) = query.subjects.as_deref() {
            let concept = filter_value(subjects, 200);
            if !concept.is_empty() {
                filters.push(format!("concepts.display_name.search:{}", concept));
            }
        }

        if let Some(since) = query.published_since {
            filters.push(format!("from_publication_date:{}", since.format("%Y-%m-%d")));
        }

        if filters.is_empty() {
            None
        } else {
            Some(filters.join(","))
        }
    }

    fn search_url(&self, query: &SearchQuery) -> String {
        let mut url = format!("{}/works?", self.base_url);

        if let Some(filter) = Self::build_filter(query) {
            url.push_str(&format!("filter={}&", urlencoding::encode(&filter)));
        }

        url.push_str(&format!(
            "per-page={}&page={}",
            query.limit,
            query.page_number()
        ));

        if let Some(ref mailto) = self.mailto {
            url.push_str(&format!("&mailto={}", urlencoding::encode(mailto)));
        }

        url
    }
}

/// Sanitize text for a filter value; commas would start a new filter
fn filter_value(text: &str, max_length: usize) -> String {
    collapse_whitespace(&sanitize_query(text, max_length).replace(',', " "))
}

#[async_trait]
impl Source for OpenAlexSource {
    fn provider(&self) -> Provider {
        Provider::OpenAlex
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::FETCH | SourceCapabilities::CONTENT
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<NativeRecord>, SourceError> {
        let url = self.search_url(query);

        let response = self.client.get(&url).send().await?;
        let response = check_status(response, Provider::OpenAlex, "Works")?;

        let data: WorksResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        Ok(decode_records(
            Provider::OpenAlex,
            data.results,
            NativeRecord::OpenAlex,
        ))
    }

    async fn fetch(&self, id: &str) -> Result<NativeRecord, SourceError> {
        let work_id = Self::parse_id(id)?;
        let mut url = format!("{}/works/{}", self.base_url, work_id);
        if let Some(ref mailto) = self.mailto {
            url.push_str(&format!("?mailto={}", urlencoding::encode(mailto)));
        }

        let response = self.client.get(&url).send().await?;
        let response = check_status(response, Provider::OpenAlex, &format!("Work {}", work_id))?;

        let work: OpenAlexWork = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        Ok(NativeRecord::OpenAlex(work))
    }
}

// ===== OpenAlex API Types =====

/// A work object from the OpenAlex `/works` endpoint
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OpenAlexWork {
    /// Full entity URL, e.g. `https://openalex.org/W2741809807`
    pub id: Option<String>,
    pub doi: Option<String>,
    pub title: Option<String>,
    pub display_name: Option<String>,
    pub publication_date: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub authorships: Vec<OAAuthorship>,
    /// Abstract as a word -> positions map
    pub abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    pub primary_location: Option<OALocation>,
    #[serde(deserialize_with = "null_as_default")]
    pub locations: Vec<OALocation>,
    #[serde(deserialize_with = "null_as_default")]
    pub concepts: Vec<OAConcept>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OAAuthorship {
    pub author: Option<OAAuthor>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OAAuthor {
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OALocation {
    pub landing_page_url: Option<String>,
    pub pdf_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OAConcept {
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorksResponse {
    results: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mockito::Matcher;

    const WORKS: &str = r#"{
        "meta": {"count": 2, "page": 1, "per_page": 5},
        "results": [
            {
                "id": "https://openalex.org/W2741809807",
                "doi": "https://doi.org/10.7717/peerj.4375",
                "title": "The state of OA",
                "display_name": "The state of OA",
                "publication_date": "2018-02-13",
                "authorships": [
                    {"author": {"display_name": "Heather Piwowar"}},
                    {"author": {"display_name": "Jason Priem"}}
                ],
                "abstract_inverted_index": {"Despite": [0], "growing": [1], "interest": [2]},
                "primary_location": {"landing_page_url": "https://doi.org/10.7717/peerj.4375", "pdf_url": null},
                "locations": [{"landing_page_url": "https://peerj.com/4375", "pdf_url": "https://peerj.com/4375.pdf"}],
                "concepts": [{"display_name": "Open access"}]
            },
            {
                "id": "https://openalex.org/W2",
                "title": null,
                "display_name": "Only a display name"
            }
        ]
    }"#;

    fn source(server: &mockito::ServerGuard) -> OpenAlexSource {
        OpenAlexSource::with_client(Arc::new(HttpClient::new().unwrap()), &server.url())
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(OpenAlexSource::parse_id("W2741809807").unwrap(), "W2741809807");
        assert_eq!(
            OpenAlexSource::parse_id("https://openalex.org/W2741809807").unwrap(),
            "W2741809807"
        );
        assert!(OpenAlexSource::parse_id(" ").is_err());
    }

    #[test]
    fn test_build_filter() {
        let query = SearchQuery::new("graph, neural networks")
            .subjects("Computer science")
            .published_since(NaiveDate::from_ymd_opt(2023, 5, 1).unwrap());

        assert_eq!(
            OpenAlexSource::build_filter(&query).unwrap(),
            "default.search:graph neural networks,concepts.display_name.search:Computer science,from_publication_date:2023-05-01"
        );
        assert!(OpenAlexSource::build_filter(&SearchQuery::new("")).is_none());
    }

    #[test]
    fn test_search_url_pages_and_mailto() {
        let source = OpenAlexSource::with_client(
            Arc::new(HttpClient::new().unwrap()),
            "https://api.openalex.org/",
        )
        .mailto(Some("me@example.org".to_string()));

        let url = source.search_url(&SearchQuery::new("").limit(20).offset(45));
        assert_eq!(
            url,
            "https://api.openalex.org/works?per-page=20&page=3&mailto=me%40example.org"
        );
    }

    #[tokio::test]
    async fn test_search_parses_works() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/works")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("filter".into(), "default.search:attention".into()),
                Matcher::UrlEncoded("per-page".into(), "5".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(WORKS)
            .create_async()
            .await;

        let records = source(&server)
            .search(&SearchQuery::new("attention").limit(5))
            .await
            .unwrap();
        mock.assert_async().await;

        assert_eq!(records.len(), 2);
        let NativeRecord::OpenAlex(work) = &records[0] else {
            panic!("expected an OpenAlex record");
        };
        assert_eq!(work.authorships.len(), 2);
        assert_eq!(work.locations[0].pdf_url.as_deref(), Some("https://peerj.com/4375.pdf"));

        let NativeRecord::OpenAlex(sparse) = &records[1] else {
            panic!("expected an OpenAlex record");
        };
        assert!(sparse.title.is_none());
        assert!(sparse.authorships.is_empty());
    }

    #[tokio::test]
    async fn test_odd_record_does_not_sink_the_page() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/works")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"results": [
                    {"id": "https://openalex.org/W1", "title": "Good work"},
                    {"id": "https://openalex.org/W2", "title": "Odd work", "concepts": null, "locations": null},
                    {"id": "https://openalex.org/W3", "title": {"unexpected": true}}
                ]}"#,
            )
            .create_async()
            .await;

        let records = source(&server)
            .search(&SearchQuery::new("work"))
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        let NativeRecord::OpenAlex(good) = &records[0] else {
            panic!("expected an OpenAlex record");
        };
        assert_eq!(good.title.as_deref(), Some("Good work"));
        let NativeRecord::OpenAlex(odd) = &records[1] else {
            panic!("null collections should decode as empty");
        };
        assert!(odd.concepts.is_empty() && odd.locations.is_empty());
        assert!(matches!(&records[2], NativeRecord::Unparsed { .. }));
    }

    #[tokio::test]
    async fn test_search_missing_results_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/works")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"error": "oops"}"#)
            .create_async()
            .await;

        let err = source(&server)
            .search(&SearchQuery::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/works/W404")
            .with_status(404)
            .create_async()
            .await;

        let err = source(&server).fetch("W404").await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_by_url_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/works/W2741809807")
            .with_status(200)
            .with_body(r#"{"id": "https://openalex.org/W2741809807", "title": "The state of OA"}"#)
            .create_async()
            .await;

        let record = source(&server)
            .fetch("https://openalex.org/W2741809807")
            .await
            .unwrap();
        let NativeRecord::OpenAlex(work) = record else {
            panic!("expected an OpenAlex record");
        };
        assert_eq!(work.title.as_deref(), Some("The state of OA"));
    }
}
