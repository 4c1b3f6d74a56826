//! Mock source for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::models::{Provider, SearchQuery};
use crate::sources::{
    ArxivEntry, NativeRecord, OpenAlexWork, OsfPreprint, PreprintServer, Source,
    SourceCapabilities, SourceError,
};

/// A stub source that returns predefined responses and counts its calls.
#[derive(Debug)]
pub struct MockSource {
    provider: Provider,
    search_response: Result<Vec<NativeRecord>, SourceError>,
    fetch_response: Option<Result<NativeRecord, SourceError>>,
    servers: Option<Vec<PreprintServer>>,
    delay: Option<Duration>,
    search_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MockSource {
    /// Create a mock that answers every search with no records.
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            search_response: Ok(Vec::new()),
            fetch_response: None,
            servers: None,
            delay: None,
            search_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Answer searches with these records.
    pub fn with_records(mut self, records: Vec<NativeRecord>) -> Self {
        self.search_response = Ok(records);
        self
    }

    /// Fail every search with this error.
    pub fn with_error(mut self, error: SourceError) -> Self {
        self.search_response = Err(error);
        self
    }

    /// Answer fetches with this result.
    pub fn with_fetch(mut self, response: Result<NativeRecord, SourceError>) -> Self {
        self.fetch_response = Some(response);
        self
    }

    /// Advertise these preprint servers.
    pub fn with_servers(mut self, servers: Vec<PreprintServer>) -> Self {
        self.servers = Some(servers);
        self
    }

    /// Sleep before answering, to simulate a slow provider.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times `search` was called.
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Number of times `fetch` was called.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Source for MockSource {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn capabilities(&self) -> SourceCapabilities {
        let mut caps = SourceCapabilities::SEARCH;
        if self.fetch_response.is_some() {
            caps |= SourceCapabilities::FETCH;
        }
        if self.servers.is_some() {
            caps |= SourceCapabilities::LIST_SERVERS;
        }
        caps
    }

    async fn search(&self, _query: &SearchQuery) -> Result<Vec<NativeRecord>, SourceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.search_response.clone()
    }

    async fn fetch(&self, id: &str) -> Result<NativeRecord, SourceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        match &self.fetch_response {
            Some(response) => response.clone(),
            None => Err(SourceError::NotFound(id.to_string())),
        }
    }

    async fn list_servers(&self) -> Result<Vec<PreprintServer>, SourceError> {
        self.servers.clone().ok_or(SourceError::NotImplemented)
    }
}

/// Helper to create an arXiv record for testing.
pub fn make_arxiv_entry(id: &str, title: &str) -> NativeRecord {
    NativeRecord::Arxiv(ArxivEntry {
        id: format!("http://arxiv.org/abs/{}", id),
        title: Some(title.to_string()),
        authors: vec!["Test Author".to_string()],
        ..Default::default()
    })
}

/// Helper to create an OpenAlex record for testing.
pub fn make_openalex_work(id: &str, title: &str) -> NativeRecord {
    NativeRecord::OpenAlex(OpenAlexWork {
        id: Some(format!("https://openalex.org/{}", id)),
        title: Some(title.to_string()),
        ..Default::default()
    })
}

/// Helper to create an OSF record for testing.
pub fn make_osf_preprint(id: &str, title: &str) -> NativeRecord {
    let mut preprint = OsfPreprint {
        id: Some(id.to_string()),
        ..Default::default()
    };
    preprint.attributes.title = Some(title.to_string());
    NativeRecord::Osf(preprint)
}
