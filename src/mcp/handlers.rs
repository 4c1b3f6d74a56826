//! Tool handlers backed by the query router and the content fetcher.

use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use super::tools::{ToolError, ToolHandler};
use crate::content::ContentFetcher;
use crate::models::{Provider, SearchQuery};
use crate::router::QueryRouter;

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParams(format!("Missing '{}' parameter", key)))
}

fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// A non-negative integer argument; negative values are rejected, not clamped
fn optional_count(args: &Value, key: &str) -> Result<Option<usize>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            if let Some(n) = v.as_u64() {
                Ok(Some(usize::try_from(n).unwrap_or(usize::MAX)))
            } else if v.as_i64().is_some() {
                Err(ToolError::InvalidParams(format!("'{}' must not be negative", key)))
            } else {
                Err(ToolError::InvalidParams(format!("'{}' must be an integer", key)))
            }
        }
    }
}

fn parse_provider(name: &str) -> Result<Provider, ToolError> {
    Provider::from_str(name).map_err(ToolError::InvalidParams)
}

/// A top-level provider, or any other name taken as an OSF-hosted server
fn provider_or_osf(name: &str) -> Provider {
    Provider::from_str(name).unwrap_or(Provider::Osf)
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Failed(e.to_string()))
}

/// Handler for listing providers
#[derive(Debug)]
pub struct ListProvidersHandler {
    pub router: Arc<QueryRouter>,
}

#[async_trait::async_trait]
impl ToolHandler for ListProvidersHandler {
    async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
        let providers = self.router.list_providers().await;
        to_json(&providers)
    }
}

/// Handler for searching across providers
#[derive(Debug)]
pub struct SearchPapersHandler {
    pub router: Arc<QueryRouter>,
    pub default_limit: usize,
}

impl SearchPapersHandler {
    fn build_query(&self, args: &Value) -> Result<SearchQuery, ToolError> {
        let keywords = args.get("keywords").and_then(|v| v.as_str()).unwrap_or("");

        let mut query = SearchQuery::new(keywords)
            .limit(optional_count(args, "limit")?.unwrap_or(self.default_limit))
            .offset(optional_count(args, "offset")?.unwrap_or(0))
            .dedup(args.get("dedup").and_then(|v| v.as_bool()).unwrap_or(false));

        if let Some(list) = args.get("providers").and_then(|v| v.as_array()) {
            for item in list {
                let name = item.as_str().ok_or_else(|| {
                    ToolError::InvalidParams("'providers' must be an array of strings".to_string())
                })?;
                query = query.provider(parse_provider(name)?);
            }
        }

        if let Some(name) = optional_str(args, "provider") {
            query = match Provider::from_str(name) {
                Ok(provider) => query.provider(provider),
                Err(_) => query.osf_provider(name),
            };
        }

        if let Some(subjects) = optional_str(args, "subjects") {
            query = query.subjects(subjects);
        }

        if let Some(since) = optional_str(args, "published_since") {
            let date = NaiveDate::parse_from_str(since, "%Y-%m-%d").map_err(|_| {
                ToolError::InvalidParams(format!(
                    "'published_since' must be a YYYY-MM-DD date, got '{}'",
                    since
                ))
            })?;
            query = query.published_since(date);
        }

        Ok(query)
    }
}

#[async_trait::async_trait]
impl ToolHandler for SearchPapersHandler {
    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let query = self.build_query(&args)?;
        let outcome = self.router.search(&query).await?;

        let mut value = to_json(&outcome)?;
        value["total_count"] = outcome.total_count().into();
        Ok(value)
    }
}

/// Handler for fetching paper metadata with provider detection
#[derive(Debug)]
pub struct GetPaperMetadataHandler {
    pub router: Arc<QueryRouter>,
}

#[async_trait::async_trait]
impl ToolHandler for GetPaperMetadataHandler {
    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let paper_id = required_str(&args, "paper_id")?;
        let provider = optional_str(&args, "provider").map(provider_or_osf);

        let paper = self.router.fetch(paper_id, provider).await?;
        to_json(&paper)
    }
}

/// Handler for fetching a paper with its full text
#[derive(Debug)]
pub struct GetPaperHandler {
    pub router: Arc<QueryRouter>,
    pub content: Arc<ContentFetcher>,
}

#[async_trait::async_trait]
impl ToolHandler for GetPaperHandler {
    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let paper_id = required_str(&args, "paper_id")?;
        let provider = optional_str(&args, "provider").map(provider_or_osf);

        let content = self
            .content
            .fetch_paper(&self.router, paper_id, provider)
            .await?;
        to_json(&content)
    }
}

/// Handler for extracting text from a PDF URL
#[derive(Debug)]
pub struct GetPaperContentByUrlHandler {
    pub content: Arc<ContentFetcher>,
}

#[async_trait::async_trait]
impl ToolHandler for GetPaperContentByUrlHandler {
    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let url = required_str(&args, "url")?;
        let content = self.content.fetch_url(url).await?;
        to_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::sources::mock::{make_arxiv_entry, make_openalex_work, make_osf_preprint};
    use crate::sources::{MockSource, PreprintServer, SourceError, SourceRegistry};
    use serde_json::json;

    fn router(sources: Vec<Arc<MockSource>>) -> Arc<QueryRouter> {
        let mut registry = SourceRegistry::new();
        for source in sources {
            registry.register(source);
        }
        Arc::new(QueryRouter::new(Arc::new(registry)))
    }

    fn search_handler(router: Arc<QueryRouter>) -> SearchPapersHandler {
        SearchPapersHandler {
            router,
            default_limit: 10,
        }
    }

    #[test]
    fn test_build_query() {
        let handler = search_handler(router(vec![]));
        let query = handler
            .build_query(&json!({
                "keywords": "graph neural networks",
                "providers": ["arxiv", "OpenAlex"],
                "limit": 5,
                "offset": 10,
                "subjects": "cs.LG",
                "published_since": "2024-01-31",
                "dedup": true
            }))
            .unwrap();

        assert_eq!(query.keywords, "graph neural networks");
        assert_eq!(query.providers.len(), 2);
        assert!(query.providers.contains(&Provider::OpenAlex));
        assert_eq!(query.limit, 5);
        assert_eq!(query.offset, 10);
        assert_eq!(query.subjects.as_deref(), Some("cs.LG"));
        assert_eq!(query.published_since, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert!(query.dedup);
    }

    #[test]
    fn test_build_query_defaults() {
        let handler = search_handler(router(vec![]));
        let query = handler.build_query(&json!({})).unwrap();

        assert_eq!(query.keywords, "");
        assert!(query.providers.is_empty());
        assert_eq!(query.limit, 10);
        assert_eq!(query.offset, 0);
        assert!(!query.dedup);
    }

    #[test]
    fn test_provider_argument() {
        let handler = search_handler(router(vec![]));

        let query = handler.build_query(&json!({ "provider": "arxiv" })).unwrap();
        assert!(query.providers.contains(&Provider::Arxiv));
        assert!(query.osf_provider.is_none());

        let query = handler.build_query(&json!({ "provider": "psyarxiv" })).unwrap();
        assert!(query.providers.is_empty());
        assert_eq!(query.osf_provider.as_deref(), Some("psyarxiv"));
    }

    #[test]
    fn test_bad_arguments() {
        let handler = search_handler(router(vec![]));

        for args in [
            json!({ "limit": -1 }),
            json!({ "offset": -5 }),
            json!({ "limit": "ten" }),
            json!({ "providers": ["pubmed"] }),
            json!({ "providers": [1] }),
            json!({ "published_since": "last year" }),
        ] {
            assert!(
                matches!(handler.build_query(&args), Err(ToolError::InvalidParams(_))),
                "{args}"
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_osf_server_is_invalid_params() {
        let osf = Arc::new(
            MockSource::new(Provider::Osf)
                .with_records(vec![make_osf_preprint("abc12", "Kept")])
                .with_servers(vec![PreprintServer {
                    id: "psyarxiv".to_string(),
                    name: "PsyArXiv".to_string(),
                    description: None,
                }]),
        );
        let handler = search_handler(router(vec![osf]));

        let err = handler
            .execute(json!({ "keywords": "x", "provider": "nosucharxiv" }))
            .await
            .unwrap_err();
        assert!(
            matches!(&err, ToolError::InvalidParams(message) if message.contains("list_providers")),
            "{err:?}"
        );

        let value = handler
            .execute(json!({ "keywords": "x", "provider": "psyarxiv" }))
            .await
            .unwrap();
        assert_eq!(value["total_count"], 1);
    }

    #[tokio::test]
    async fn test_search_result_shape() {
        let arxiv = Arc::new(
            MockSource::new(Provider::Arxiv)
                .with_records(vec![make_arxiv_entry("2401.00001", "First")]),
        );
        let openalex = Arc::new(
            MockSource::new(Provider::OpenAlex)
                .with_error(SourceError::Unavailable("connection refused".to_string())),
        );

        let handler = search_handler(router(vec![arxiv, openalex]));
        let value = handler.execute(json!({ "keywords": "x" })).await.unwrap();

        assert_eq!(value["total_count"], 1);
        assert_eq!(value["papers"][0]["identifier"], "2401.00001");
        assert_eq!(value["providers_searched"], json!(["arxiv", "openalex"]));
        assert_eq!(value["failures"][0]["provider"], "openalex");
        assert_eq!(value["dropped_records"], 0);
    }

    #[tokio::test]
    async fn test_zero_limit_is_invalid_params() {
        let arxiv = Arc::new(MockSource::new(Provider::Arxiv));
        let handler = search_handler(router(vec![arxiv.clone()]));

        let err = handler
            .execute(json!({ "keywords": "", "limit": 0 }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
        assert_eq!(arxiv.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_all_failed_is_failure() {
        let arxiv = Arc::new(
            MockSource::new(Provider::Arxiv)
                .with_error(SourceError::Api("arXiv API returned status: 503".to_string())),
        );
        let handler = search_handler(router(vec![arxiv]));

        let err = handler.execute(json!({ "keywords": "x" })).await.unwrap_err();
        let ToolError::Failed(message) = err else {
            panic!("expected Failed");
        };
        assert!(message.contains("arxiv"));
        assert!(message.contains("503"));
    }

    #[tokio::test]
    async fn test_get_metadata() {
        let openalex = Arc::new(
            MockSource::new(Provider::OpenAlex)
                .with_fetch(Ok(make_openalex_work("W2741809807", "A work"))),
        );
        let handler = GetPaperMetadataHandler {
            router: router(vec![openalex]),
        };

        let value = handler
            .execute(json!({ "paper_id": "W2741809807" }))
            .await
            .unwrap();
        assert_eq!(value["identifier"], "W2741809807");
        assert_eq!(value["source_provider"], "openalex");

        let err = handler.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_content_by_url_rejects_local_hosts() {
        let content = Arc::new(ContentFetcher::from_config(&Config::default()).unwrap());
        let handler = GetPaperContentByUrlHandler { content };

        let err = handler
            .execute(json!({ "url": "http://localhost:8080/secret.pdf" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }
}
