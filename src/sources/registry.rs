//! Registry for managing provider clients.

use std::sync::Arc;

use super::{ArxivSource, OpenAlexSource, OsfSource, Source, SourceError};
use crate::config::Config;
use crate::models::Provider;
use crate::utils::HttpClient;

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        const FETCH = 1 << 1;
        const LIST_SERVERS = 1 << 2;
        const CONTENT = 1 << 3;
    }
}

impl SourceCapabilities {
    /// Capability names, for display
    pub fn labels(&self) -> Vec<&'static str> {
        self.iter_names()
            .map(|(name, _)| match name {
                "SEARCH" => "search",
                "FETCH" => "fetch",
                "LIST_SERVERS" => "list_servers",
                _ => "content",
            })
            .collect()
    }
}

/// Registry of the available provider clients.
///
/// Sources are kept in registration order, which is also the order in which
/// aggregated results are concatenated.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every provider, pointed at the configured base URLs
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        crate::normalize::validate_mappings()
            .map_err(|e| SourceError::Other(format!("Invalid field mapping: {}", e)))?;

        let client = Arc::new(HttpClient::from_config(&config.http)?);
        let providers = &config.providers;

        let mut registry = Self::new();
        registry.register(Arc::new(ArxivSource::with_client(
            Arc::clone(&client),
            &providers.arxiv_url,
        )));
        registry.register(Arc::new(
            OpenAlexSource::with_client(Arc::clone(&client), &providers.openalex_url)
                .mailto(providers.openalex_mailto.clone()),
        ));
        registry.register(Arc::new(
            OsfSource::with_client(client, &providers.osf_url).trove_url(&providers.osf_trove_url),
        ));

        tracing::debug!(sources = ?registry.ids(), "source registry initialized");
        Ok(registry)
    }

    /// Register a source, replacing any source for the same provider in place
    pub fn register(&mut self, source: Arc<dyn Source>) {
        let provider = source.provider();
        match self.sources.iter_mut().find(|s| s.provider() == provider) {
            Some(slot) => *slot = source,
            None => self.sources.push(source),
        }
    }

    /// Get the source for a provider
    pub fn get(&self, provider: Provider) -> Option<&Arc<dyn Source>> {
        self.sources.iter().find(|s| s.provider() == provider)
    }

    /// Get all registered sources, in registration order
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.iter()
    }

    /// Get all registered providers, in registration order
    pub fn ids(&self) -> Vec<Provider> {
        self.sources.iter().map(|s| s.provider()).collect()
    }

    /// Get sources that support a specific capability
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn Source>> {
        self.all()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    /// Check if a provider is registered
    pub fn has(&self, provider: Provider) -> bool {
        self.get(provider).is_some()
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
