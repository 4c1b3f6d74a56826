//! Provider clients with a trait-based architecture.
//!
//! Each external bibliographic API is wrapped by a type implementing
//! [`Source`]. A client owns exactly one query dialect: it turns a
//! [`SearchQuery`] into the provider's URL parameters, performs one GET and
//! parses the body into provider-native records ([`NativeRecord`]).
//! Mapping those records to the canonical [`crate::models::PaperResult`] is
//! the job of [`crate::normalize`], not of the client.
//!
//! Clients are registered once at startup in a [`SourceRegistry`] built from
//! the configuration, so every base URL can be pointed at a mirror or a test
//! server:
//!
//! ```bash
//! export PAPERCLIP_PROVIDERS__ARXIV_URL="http://localhost:8080"
//! export PAPERCLIP_PROVIDERS__OSF_URL="https://api.test.osf.io"
//! ```
//!
//! Clients never retry. A failed call is reported to the router, which
//! treats it as a partial failure of the aggregate request.

mod arxiv;
pub mod mock;
mod openalex;
mod osf;
mod registry;

pub use arxiv::{ArxivEntry, ArxivLink, ArxivSource};
pub use mock::MockSource;
pub use openalex::{OpenAlexSource, OpenAlexWork, OPENALEX_ID_PREFIX};
pub use osf::{OsfPreprint, OsfSource, DEFAULT_TROVE_URL};
pub use registry::{SourceCapabilities, SourceRegistry};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{Provider, SearchQuery};

/// A record exactly as one provider returned it, before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum NativeRecord {
    Arxiv(ArxivEntry),
    OpenAlex(OpenAlexWork),
    Osf(OsfPreprint),
    /// A list element that did not decode; normalization drops it
    Unparsed { provider: Provider, reason: String },
}

impl NativeRecord {
    /// The provider this record came from
    pub fn provider(&self) -> Provider {
        match self {
            NativeRecord::Arxiv(_) => Provider::Arxiv,
            NativeRecord::OpenAlex(_) => Provider::OpenAlex,
            NativeRecord::Osf(_) => Provider::Osf,
            NativeRecord::Unparsed { provider, .. } => *provider,
        }
    }
}

/// Decode the elements of a JSON result array one at a time.
///
/// An element that does not fit `T` becomes [`NativeRecord::Unparsed`], so
/// the rest of the page survives.
pub(crate) fn decode_records<T: DeserializeOwned>(
    provider: Provider,
    items: Vec<serde_json::Value>,
    wrap: fn(T) -> NativeRecord,
) -> Vec<NativeRecord> {
    items
        .into_iter()
        .map(|item| match serde_json::from_value::<T>(item) {
            Ok(record) => wrap(record),
            Err(e) => NativeRecord::Unparsed {
                provider,
                reason: e.to_string(),
            },
        })
        .collect()
}

/// Deserialize `null` as the type's default (APIs send `null` for empty lists)
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A preprint server hosted under a provider (e.g. `psyarxiv` on OSF)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreprintServer {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// The Source trait defines the interface for all provider clients.
///
/// # Implementing a New Source
///
/// 1. Add a variant to [`Provider`] and to [`NativeRecord`]
/// 2. Create a struct that implements `Source` (at minimum `provider` and `search`)
/// 3. Implement [`crate::normalize::FieldMapping`] for its native record type
/// 4. Register it in [`SourceRegistry::from_config`]
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// The provider this client talks to
    fn provider(&self) -> Provider;

    /// Human-readable name of this source
    fn name(&self) -> &str {
        self.provider().name()
    }

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    /// Search for records matching the query, in provider order
    async fn search(&self, query: &SearchQuery) -> Result<Vec<NativeRecord>, SourceError>;

    /// Get one record by its provider-native id
    async fn fetch(&self, _id: &str) -> Result<NativeRecord, SourceError> {
        Err(SourceError::NotImplemented)
    }

    /// List the preprint servers this provider hosts
    async fn list_servers(&self) -> Result<Vec<PreprintServer>, SourceError> {
        Err(SourceError::NotImplemented)
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    /// The requested operation is not implemented for this source
    #[error("Operation not implemented for this source")]
    NotImplemented,

    /// Network failure or timeout; the provider could not be reached
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// The provider answered with a non-success status
    #[error("API error: {0}")]
    Api(String),

    /// The response body could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Paper not found
    #[error("Paper not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl SourceError {
    /// Whether the provider itself could not be reached
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SourceError::Unavailable(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            SourceError::Unavailable(err.to_string())
        } else if err.is_status() {
            SourceError::Api(err.to_string())
        } else if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<crate::utils::InputError> for SourceError {
    fn from(err: crate::utils::InputError) -> Self {
        SourceError::InvalidRequest(err.to_string())
    }
}

/// Fail with `Api` (or `NotFound` for 404) when the response is not a success
pub(crate) fn check_status(
    response: reqwest::Response,
    provider: Provider,
    what: &str,
) -> Result<reqwest::Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(SourceError::NotFound(format!(
            "{} not found in {}",
            what,
            provider.name()
        )));
    }

    Err(SourceError::Api(format!(
        "{} API returned status: {}",
        provider.name(),
        status
    )))
}
