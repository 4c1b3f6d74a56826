//! Query routing across provider clients.
//!
//! The router validates a [`SearchQuery`], fans it out to the selected
//! providers concurrently, normalizes what comes back and concatenates the
//! results in registration order. A provider that fails or misses the
//! request deadline is reported in [`SearchOutcome::failures`]; the call
//! only fails as a whole when every selected provider failed.

use futures_util::future::join_all;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{timeout, timeout_at, Instant};

use crate::config::Config;
use crate::models::{
    PaperResult, Provider, ProviderFailure, SearchOutcome, SearchQuery, ValidationError,
};
use crate::normalize::{normalize, NormalizeError};
use crate::sources::{Source, SourceCapabilities, SourceError, SourceRegistry};
use crate::utils::deduplicate_papers;

/// Errors returned by the router
#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Every selected provider failed; one cause per provider
    #[error("All providers failed: {}", join_failures(.0))]
    AllProvidersFailed(Vec<ProviderFailure>),

    /// A single-provider operation failed
    #[error("{provider}: {source}")]
    Source {
        provider: Provider,
        source: SourceError,
    },

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl RouterError {
    /// Whether the caller sent a bad request
    pub fn is_validation(&self) -> bool {
        matches!(self, RouterError::Validation(_))
    }
}

fn join_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Whether a listed provider is a top-level API or a server hosted on OSF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Standalone,
    Osf,
}

/// One entry of the provider listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub id: String,
    pub kind: ProviderKind,
    pub name: String,
    pub description: Option<String>,
    pub capabilities: Vec<&'static str>,
}

fn provider_description(provider: Provider) -> &'static str {
    match provider {
        Provider::Arxiv => {
            "arXiv is a free distribution service and an open-access archive for scholarly articles \
             in physics, mathematics, computer science, quantitative biology, quantitative finance, \
             statistics, electrical engineering and systems science, and economics."
        }
        Provider::OpenAlex => {
            "OpenAlex is a comprehensive index of scholarly works across all disciplines."
        }
        Provider::Osf => {
            "OSF Preprints aggregates preprints from the Open Science Framework and the \
             community preprint servers it hosts."
        }
    }
}

/// Dispatches queries to the registered provider clients
#[derive(Debug, Clone)]
pub struct QueryRouter {
    registry: Arc<SourceRegistry>,
    request_timeout: Duration,
}

impl QueryRouter {
    /// Create a router over a registry with the default request deadline
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self {
            registry,
            request_timeout: crate::config::SearchConfig::default().request_timeout(),
        }
    }

    /// Build the registry and router from configuration
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let registry = SourceRegistry::from_config(config)?;
        Ok(Self::new(Arc::new(registry)).with_timeout(config.search.request_timeout()))
    }

    /// Override the per-request deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Search the selected providers and aggregate their results
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome, RouterError> {
        query.validate()?;
        let sources = self.resolve(query)?;
        self.check_osf_server(query).await?;

        tracing::debug!(
            keywords = %query.keywords,
            providers = ?sources.iter().map(|s| s.provider()).collect::<Vec<_>>(),
            limit = query.limit,
            offset = query.offset,
            "dispatching search"
        );

        let deadline = Instant::now() + self.request_timeout;
        let calls = sources.iter().map(|source| async move {
            let result = match timeout_at(deadline, source.search(query)).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Unavailable("deadline elapsed".to_string())),
            };
            (source.provider(), result)
        });
        let results = join_all(calls).await;

        let mut outcome = SearchOutcome {
            papers: Vec::new(),
            providers_searched: sources.iter().map(|s| s.provider()).collect(),
            failures: Vec::new(),
            dropped_records: 0,
        };

        for (provider, result) in results {
            match result {
                Ok(records) => {
                    for record in &records {
                        match normalize(record) {
                            Ok(paper) => outcome.papers.push(paper),
                            Err(e) => {
                                tracing::warn!(provider = provider.id(), error = %e, "dropping record");
                                outcome.dropped_records += 1;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(provider = provider.id(), error = %e, "provider search failed");
                    outcome.failures.push(ProviderFailure {
                        provider,
                        error: e.to_string(),
                    });
                }
            }
        }

        if outcome.failures.len() == sources.len() {
            return Err(RouterError::AllProvidersFailed(outcome.failures));
        }

        if query.dedup {
            outcome.papers = deduplicate_papers(outcome.papers);
        }

        Ok(outcome)
    }

    /// Pick the sources for a query, in registration order
    fn resolve(&self, query: &SearchQuery) -> Result<Vec<Arc<dyn Source>>, ValidationError> {
        let mut requested: BTreeSet<Provider> = query.providers.clone();

        // A named OSF server only makes sense on OSF
        if query.osf_provider.is_some() {
            if requested.is_empty() {
                requested.insert(Provider::Osf);
            } else if !requested.contains(&Provider::Osf) {
                return Err(ValidationError::new(
                    "osf_provider requires the osf provider to be selected",
                ));
            }
        }

        if let Some(missing) = requested.iter().find(|p| !self.registry.has(**p)) {
            return Err(ValidationError::new(format!(
                "provider '{}' is not available",
                missing.id()
            )));
        }

        let sources: Vec<Arc<dyn Source>> = self
            .registry
            .all()
            .filter(|s| requested.is_empty() || requested.contains(&s.provider()))
            .cloned()
            .collect();

        if sources.is_empty() {
            return Err(ValidationError::new("no providers are registered"));
        }

        Ok(sources)
    }

    /// Reject an `osf_provider` that OSF does not list. If the listing
    /// itself fails the search goes ahead unchecked.
    async fn check_osf_server(&self, query: &SearchQuery) -> Result<(), ValidationError> {
        let Some(server) = query.osf_provider.as_deref().map(str::trim) else {
            return Ok(());
        };
        let Some(osf) = self.registry.get(Provider::Osf) else {
            return Ok(());
        };
        if !osf.capabilities().contains(SourceCapabilities::LIST_SERVERS) {
            return Ok(());
        }

        match timeout(self.request_timeout, osf.list_servers()).await {
            Ok(Ok(servers)) => {
                if servers.iter().any(|s| s.id.eq_ignore_ascii_case(server)) {
                    Ok(())
                } else {
                    Err(ValidationError::new(format!(
                        "OSF provider '{}' not found; use list_providers to see available providers",
                        server
                    )))
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(server, error = %e, "could not verify OSF provider");
                Ok(())
            }
            Err(_) => {
                tracing::warn!(server, "timed out verifying OSF provider");
                Ok(())
            }
        }
    }

    /// Fetch one paper by id, detecting the provider from the id when not given
    pub async fn fetch(
        &self,
        id: &str,
        provider: Option<Provider>,
    ) -> Result<PaperResult, RouterError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ValidationError::new("paper id must not be empty").into());
        }

        let provider = provider.unwrap_or_else(|| detect_provider(id));
        let source = self.registry.get(provider).ok_or_else(|| {
            ValidationError::new(format!("provider '{}' is not available", provider.id()))
        })?;

        tracing::debug!(id, provider = provider.id(), "fetching paper");

        let deadline = Instant::now() + self.request_timeout;
        let record = match timeout_at(deadline, source.fetch(id)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Unavailable("deadline elapsed".to_string())),
        }
        .map_err(|source| RouterError::Source { provider, source })?;

        Ok(normalize(&record)?)
    }

    /// List the registered providers plus the preprint servers they host
    pub async fn list_providers(&self) -> Vec<ProviderInfo> {
        let mut providers: Vec<ProviderInfo> = self
            .registry
            .all()
            .map(|source| ProviderInfo {
                id: source.provider().id().to_string(),
                kind: match source.provider() {
                    Provider::Osf => ProviderKind::Osf,
                    _ => ProviderKind::Standalone,
                },
                name: source.name().to_string(),
                description: Some(provider_description(source.provider()).to_string()),
                capabilities: source.capabilities().labels(),
            })
            .collect();

        let deadline = Instant::now() + self.request_timeout;
        let hosts = self
            .registry
            .with_capability(SourceCapabilities::LIST_SERVERS);
        let listings = join_all(hosts.iter().map(|source| async move {
            let result = match timeout_at(deadline, source.list_servers()).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Unavailable("deadline elapsed".to_string())),
            };
            (*source, result)
        }))
        .await;

        for (source, result) in listings {
            match result {
                Ok(servers) => {
                    let capabilities = (source.capabilities() - SourceCapabilities::LIST_SERVERS)
                        .labels();
                    for server in servers {
                        if providers.iter().any(|p| p.id == server.id) {
                            continue;
                        }
                        providers.push(ProviderInfo {
                            id: server.id,
                            kind: ProviderKind::Osf,
                            name: server.name,
                            description: server.description,
                            capabilities: capabilities.clone(),
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        provider = source.provider().id(),
                        error = %e,
                        "could not list preprint servers"
                    );
                }
            }
        }

        providers.sort_by_key(|p| p.id.to_lowercase());
        providers
    }
}

/// Guess the provider from the shape of a paper id.
///
/// `W` + digits is OpenAlex, new (`2407.06405v1`) and old
/// (`cs.AI/0001001`) arXiv ids are arXiv, anything else is an OSF guid.
pub fn detect_provider(id: &str) -> Provider {
    let id = id.trim();
    let lower = id.to_ascii_lowercase();

    if lower.starts_with("arxiv:") || lower.contains("arxiv.org/abs/") {
        return Provider::Arxiv;
    }
    if lower.starts_with(crate::sources::OPENALEX_ID_PREFIX) {
        return Provider::OpenAlex;
    }
    if OPENALEX_WORK_ID.is_match(id) {
        return Provider::OpenAlex;
    }
    if ARXIV_NEW_ID.is_match(id) || ARXIV_OLD_ID.is_match(id) {
        return Provider::Arxiv;
    }
    Provider::Osf
}

static OPENALEX_WORK_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[Ww]\d+$").expect("valid OpenAlex id pattern"));

// 2407.06405, 2407.06405v1
static ARXIV_NEW_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}\.\d{4,5}(v\d+)?$").expect("valid arXiv id pattern"));

// math/0211159, cs.AI/0001001v2
static ARXIV_OLD_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z\-]*(\.[A-Za-z\-]+)?/\d{7}(v\d+)?$").expect("valid arXiv id pattern")
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::{make_arxiv_entry, make_openalex_work, make_osf_preprint};
    use crate::sources::{MockSource, PreprintServer};

    fn router(sources: Vec<Arc<MockSource>>) -> QueryRouter {
        let mut registry = SourceRegistry::new();
        for source in sources {
            registry.register(source);
        }
        QueryRouter::new(Arc::new(registry))
    }

    fn ids(outcome: &SearchOutcome) -> Vec<&str> {
        outcome.papers.iter().map(|p| p.identifier()).collect()
    }

    #[tokio::test]
    async fn test_unset_providers_invokes_every_source_once() {
        let arxiv = Arc::new(
            MockSource::new(Provider::Arxiv).with_records(vec![make_arxiv_entry("2401.00001", "A")]),
        );
        let openalex = Arc::new(
            MockSource::new(Provider::OpenAlex).with_records(vec![make_openalex_work("W1", "B")]),
        );
        let osf =
            Arc::new(MockSource::new(Provider::Osf).with_records(vec![make_osf_preprint("abc12", "C")]));

        let router = router(vec![arxiv.clone(), openalex.clone(), osf.clone()]);
        let outcome = router.search(&SearchQuery::new("anything")).await.unwrap();

        assert_eq!(arxiv.search_calls(), 1);
        assert_eq!(openalex.search_calls(), 1);
        assert_eq!(osf.search_calls(), 1);
        assert_eq!(ids(&outcome), vec!["2401.00001", "W1", "abc12"]);
        assert_eq!(
            outcome.providers_searched,
            vec![Provider::Arxiv, Provider::OpenAlex, Provider::Osf]
        );
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn test_results_keep_registration_and_provider_order() {
        let osf = Arc::new(MockSource::new(Provider::Osf).with_records(vec![
            make_osf_preprint("z", "Z"),
            make_osf_preprint("a", "A"),
        ]));
        let arxiv = Arc::new(MockSource::new(Provider::Arxiv).with_records(vec![
            make_arxiv_entry("2401.00002", "Second"),
            make_arxiv_entry("2401.00001", "First"),
        ]));

        let router = router(vec![osf, arxiv]);
        let outcome = router.search(&SearchQuery::new("x")).await.unwrap();
        assert_eq!(ids(&outcome), vec!["z", "a", "2401.00002", "2401.00001"]);
    }

    #[tokio::test]
    async fn test_partial_failure() {
        let arxiv = Arc::new(
            MockSource::new(Provider::Arxiv)
                .with_error(SourceError::Api("arXiv API returned status: 500".to_string())),
        );
        let openalex = Arc::new(MockSource::new(Provider::OpenAlex).with_records(vec![
            make_openalex_work("W1", "One"),
            make_openalex_work("W2", "Two"),
        ]));

        let router = router(vec![arxiv, openalex]);
        let outcome = router.search(&SearchQuery::new("x")).await.unwrap();

        assert_eq!(ids(&outcome), vec!["W1", "W2"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].provider, Provider::Arxiv);
        assert!(outcome.failures[0].error.contains("500"));
        assert!(!outcome.is_complete());
    }

    #[tokio::test]
    async fn test_all_providers_failed() {
        let arxiv = Arc::new(
            MockSource::new(Provider::Arxiv).with_error(SourceError::Unavailable("down".to_string())),
        );
        let osf = Arc::new(
            MockSource::new(Provider::Osf).with_error(SourceError::Parse("bad json".to_string())),
        );

        let router = router(vec![arxiv, osf]);
        let err = router.search(&SearchQuery::new("x")).await.unwrap_err();

        let RouterError::AllProvidersFailed(failures) = err else {
            panic!("expected AllProvidersFailed, got {err:?}");
        };
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].provider, Provider::Arxiv);
        assert_eq!(failures[1].provider, Provider::Osf);
    }

    #[tokio::test]
    async fn test_slow_provider_misses_deadline() {
        let arxiv = Arc::new(MockSource::new(Provider::Arxiv).with_records(vec![
            make_arxiv_entry("2401.00001", "Graph networks one"),
            make_arxiv_entry("2401.00002", "Graph networks two"),
            make_arxiv_entry("2401.00003", "Graph networks three"),
        ]));
        let openalex = Arc::new(
            MockSource::new(Provider::OpenAlex)
                .with_records(vec![make_openalex_work("W1", "Too late")])
                .with_delay(Duration::from_secs(30)),
        );

        let router =
            router(vec![arxiv, openalex]).with_timeout(Duration::from_millis(200));
        let query = SearchQuery::new("graph neural networks")
            .provider(Provider::Arxiv)
            .provider(Provider::OpenAlex)
            .limit(5);

        let outcome = router.search(&query).await.unwrap();
        assert_eq!(outcome.total_count(), 3);
        assert!(outcome
            .papers
            .iter()
            .all(|p| p.source_provider() == Provider::Arxiv));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].provider, Provider::OpenAlex);
        assert!(outcome.failures[0].error.contains("deadline elapsed"));
    }

    #[tokio::test]
    async fn test_zero_limit_is_rejected_before_dispatch() {
        let arxiv = Arc::new(MockSource::new(Provider::Arxiv));
        let osf = Arc::new(MockSource::new(Provider::Osf));

        let router = router(vec![arxiv.clone(), osf.clone()]);
        let err = router
            .search(&SearchQuery::new("").limit(0))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(arxiv.search_calls(), 0);
        assert_eq!(osf.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_provider_is_rejected() {
        let arxiv = Arc::new(MockSource::new(Provider::Arxiv));
        let router = router(vec![arxiv.clone()]);

        let err = router
            .search(&SearchQuery::new("x").provider(Provider::Osf))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(arxiv.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_only_selected_providers_are_called() {
        let arxiv = Arc::new(MockSource::new(Provider::Arxiv));
        let openalex = Arc::new(MockSource::new(Provider::OpenAlex));

        let router = router(vec![arxiv.clone(), openalex.clone()]);
        router
            .search(&SearchQuery::new("x").provider(Provider::OpenAlex))
            .await
            .unwrap();

        assert_eq!(arxiv.search_calls(), 0);
        assert_eq!(openalex.search_calls(), 1);
    }

    #[tokio::test]
    async fn test_osf_server_restricts_to_osf() {
        let arxiv = Arc::new(MockSource::new(Provider::Arxiv));
        let osf = Arc::new(MockSource::new(Provider::Osf));

        let router = router(vec![arxiv.clone(), osf.clone()]);
        let outcome = router
            .search(&SearchQuery::new("x").osf_provider("psyarxiv"))
            .await
            .unwrap();

        assert_eq!(outcome.providers_searched, vec![Provider::Osf]);
        assert_eq!(arxiv.search_calls(), 0);

        let err = router
            .search(
                &SearchQuery::new("x")
                    .provider(Provider::Arxiv)
                    .osf_provider("psyarxiv"),
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_unknown_osf_server_is_rejected() {
        let osf = Arc::new(MockSource::new(Provider::Osf).with_servers(vec![PreprintServer {
            id: "psyarxiv".to_string(),
            name: "PsyArXiv".to_string(),
            description: None,
        }]));
        let router = router(vec![osf.clone()]);

        let err = router
            .search(&SearchQuery::new("x").osf_provider("nosucharxiv"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("'nosucharxiv' not found"));
        assert_eq!(osf.search_calls(), 0);

        router
            .search(&SearchQuery::new("x").osf_provider("PsyArXiv"))
            .await
            .unwrap();
        assert_eq!(osf.search_calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_records_are_dropped_and_counted() {
        let arxiv = Arc::new(MockSource::new(Provider::Arxiv).with_records(vec![
            make_arxiv_entry("2401.00001", "Fine"),
            make_arxiv_entry("2401.00002", "  "),
        ]));
        let openalex = Arc::new(MockSource::new(Provider::OpenAlex).with_records(vec![
            crate::sources::NativeRecord::OpenAlex(Default::default()),
        ]));

        let router = router(vec![arxiv, openalex]);
        let outcome = router.search(&SearchQuery::new("x")).await.unwrap();

        assert_eq!(ids(&outcome), vec!["2401.00001"]);
        assert_eq!(outcome.dropped_records, 2);
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn test_undecodable_records_count_as_dropped() {
        let osf = Arc::new(MockSource::new(Provider::Osf).with_records(vec![
            make_osf_preprint("abc12", "Kept"),
            crate::sources::NativeRecord::Unparsed {
                provider: Provider::Osf,
                reason: "invalid type: null, expected a string".to_string(),
            },
        ]));

        let outcome = router(vec![osf]).search(&SearchQuery::new("x")).await.unwrap();

        assert_eq!(ids(&outcome), vec!["abc12"]);
        assert_eq!(outcome.dropped_records, 1);
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn test_dedup_keeps_first_provider() {
        let arxiv = Arc::new(MockSource::new(Provider::Arxiv).with_records(vec![
            make_arxiv_entry("1706.03762", "Attention Is All You Need"),
        ]));
        let openalex = Arc::new(MockSource::new(Provider::OpenAlex).with_records(vec![
            make_openalex_work("W2", "Attention is all you need"),
            make_openalex_work("W3", "Something else entirely"),
        ]));

        let router = router(vec![arxiv, openalex]);

        let plain = router.search(&SearchQuery::new("attention")).await.unwrap();
        assert_eq!(plain.total_count(), 3);

        let deduped = router
            .search(&SearchQuery::new("attention").dedup(true))
            .await
            .unwrap();
        assert_eq!(ids(&deduped), vec!["1706.03762", "W3"]);
    }

    #[tokio::test]
    async fn test_fetch_detects_provider() {
        let arxiv = Arc::new(
            MockSource::new(Provider::Arxiv)
                .with_fetch(Ok(make_arxiv_entry("2407.06405v1", "GNN paper"))),
        );
        let openalex = Arc::new(MockSource::new(Provider::OpenAlex));

        let router = router(vec![arxiv.clone(), openalex.clone()]);
        let paper = router.fetch("2407.06405v1", None).await.unwrap();

        assert_eq!(paper.identifier(), "2407.06405v1");
        assert_eq!(arxiv.fetch_calls(), 1);
        assert_eq!(openalex.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_errors() {
        let openalex = Arc::new(MockSource::new(Provider::OpenAlex));
        let router = router(vec![openalex]);

        assert!(router.fetch("  ", None).await.unwrap_err().is_validation());
        // OSF guid, but OSF is not registered
        assert!(router.fetch("abc12", None).await.unwrap_err().is_validation());

        let err = router.fetch("W404", None).await.unwrap_err();
        assert!(matches!(
            err,
            RouterError::Source {
                provider: Provider::OpenAlex,
                source: SourceError::NotFound(_)
            }
        ));
    }

    #[test]
    fn test_detect_provider() {
        assert_eq!(detect_provider("W2741809807"), Provider::OpenAlex);
        assert_eq!(
            detect_provider("https://openalex.org/W2741809807"),
            Provider::OpenAlex
        );
        assert_eq!(detect_provider("2407.06405v1"), Provider::Arxiv);
        assert_eq!(detect_provider("2407.06405"), Provider::Arxiv);
        assert_eq!(detect_provider("0704.0001"), Provider::Arxiv);
        assert_eq!(detect_provider("cs.AI/0001001"), Provider::Arxiv);
        assert_eq!(detect_provider("math/0211159"), Provider::Arxiv);
        assert_eq!(detect_provider("arxiv:2407.06405"), Provider::Arxiv);
        assert_eq!(detect_provider("abc12"), Provider::Osf);
        assert_eq!(detect_provider("abc12_v1"), Provider::Osf);
    }

    #[test]
    fn test_id_patterns_are_anchored() {
        assert!(OPENALEX_WORK_ID.is_match("w42"));
        assert!(!OPENALEX_WORK_ID.is_match("W42x"));
        assert!(ARXIV_NEW_ID.is_match("2407.06405v12"));
        assert!(!ARXIV_NEW_ID.is_match("see 2407.06405"));
        assert!(ARXIV_OLD_ID.is_match("cond-mat/9901001v2"));
        assert!(!ARXIV_OLD_ID.is_match("cond-mat/990100"));
    }

    #[tokio::test]
    async fn test_list_providers() {
        let arxiv = Arc::new(MockSource::new(Provider::Arxiv));
        let openalex = Arc::new(MockSource::new(Provider::OpenAlex));
        let osf = Arc::new(MockSource::new(Provider::Osf).with_servers(vec![
            PreprintServer {
                id: "psyarxiv".to_string(),
                name: "PsyArXiv".to_string(),
                description: None,
            },
            PreprintServer {
                id: "AfricArXiv".to_string(),
                name: "AfricArXiv".to_string(),
                description: None,
            },
            PreprintServer {
                id: "osf".to_string(),
                name: "Open Science Framework".to_string(),
                description: None,
            },
        ]));

        let router = router(vec![arxiv, openalex, osf]);
        let providers = router.list_providers().await;
        let listed: Vec<&str> = providers.iter().map(|p| p.id.as_str()).collect();

        assert_eq!(listed, vec!["AfricArXiv", "arxiv", "openalex", "osf", "psyarxiv"]);

        let psyarxiv = providers.iter().find(|p| p.id == "psyarxiv").unwrap();
        assert_eq!(psyarxiv.kind, ProviderKind::Osf);
        let arxiv = providers.iter().find(|p| p.id == "arxiv").unwrap();
        assert_eq!(arxiv.kind, ProviderKind::Standalone);
        assert!(arxiv.capabilities.contains(&"search"));
    }

    #[tokio::test]
    async fn test_list_providers_survives_listing_failure() {
        #[derive(Debug)]
        struct BrokenListing;

        #[async_trait::async_trait]
        impl Source for BrokenListing {
            fn provider(&self) -> Provider {
                Provider::Osf
            }

            fn capabilities(&self) -> SourceCapabilities {
                SourceCapabilities::SEARCH | SourceCapabilities::LIST_SERVERS
            }

            async fn search(
                &self,
                _query: &SearchQuery,
            ) -> Result<Vec<crate::sources::NativeRecord>, SourceError> {
                Ok(Vec::new())
            }

            async fn list_servers(&self) -> Result<Vec<PreprintServer>, SourceError> {
                Err(SourceError::Unavailable("connection refused".to_string()))
            }
        }

        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(MockSource::new(Provider::Arxiv)));
        registry.register(Arc::new(BrokenListing));

        let router = QueryRouter::new(Arc::new(registry));
        let providers = router.list_providers().await;
        let listed: Vec<&str> = providers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(listed, vec!["arxiv", "osf"]);
    }
}
