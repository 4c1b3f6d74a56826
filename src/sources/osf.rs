//! OSF Preprints provider client.
//!
//! Uses the OSF JSON:API for searching preprints from the Open Science
//! Framework and the preprint servers it hosts (PsyArXiv, SocArXiv, ...).
//! API documentation: <https://developer.osf.io>
//!
//! OSF is free and requires no API key for public data.
//!
//! `/v2/preprints` only filters on provider, subjects and dates; it has no
//! text search. Keyword queries therefore go to the SHARE trove index
//! (`/trove/index-card-search`), whose cards are mapped onto [`OsfPreprint`].
//! Provider, subject and date filters are applied to trove results locally.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{Provider, SearchQuery};
use crate::sources::{
    check_status, decode_records, null_as_default, NativeRecord, PreprintServer, Source,
    SourceCapabilities, SourceError,
};
use crate::utils::{sanitize_paper_id, sanitize_query, HttpClient};

/// OSF caps `page[size]` at this value
const MAX_PAGE_SIZE: usize = 100;

/// Default SHARE host serving the trove search index
pub const DEFAULT_TROVE_URL: &str = "https://share.osf.io";

/// OSF Preprints provider client
#[derive(Debug, Clone)]
pub struct OsfSource {
    client: Arc<HttpClient>,
    base_url: String,
    trove_url: String,
}

impl OsfSource {
    /// Create with a shared HTTP client and base URL
    pub fn with_client(client: Arc<HttpClient>, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            trove_url: DEFAULT_TROVE_URL.to_string(),
        }
    }

    /// Point keyword searches at another trove host
    pub fn trove_url(mut self, url: &str) -> Self {
        self.trove_url = url.trim_end_matches('/').to_string();
        self
    }

    fn search_url(&self, query: &SearchQuery) -> String {
        let mut params: Vec<(&str, String)> = Vec::new();

        if let Some(provider) = query.osf_provider.as_deref() {
            params.push(("filter[provider]", sanitize_query(provider, 50)));
        }
        if let Some(subjects) = query.subjects.as_deref() {
            let subjects = sanitize_query(subjects, 100);
            if !subjects.is_empty() {
                params.push(("filter[subjects]", subjects));
            }
        }
        if let Some(since) = query.published_since {
            params.push((
                "filter[date_published][gte]",
                since.format("%Y-%m-%d").to_string(),
            ));
        }
        params.push(("page[size]", query.limit.min(MAX_PAGE_SIZE).to_string()));
        params.push(("page", query.page_number().to_string()));
        params.push(("embed", "contributors".to_string()));

        format!("{}/v2/preprints/?{}", self.base_url, encode_params(&params))
    }

    /// Trove has cursor paging only, so enough cards are requested to cover
    /// `offset + limit` and the offset is skipped locally
    fn trove_search_url(&self, query: &SearchQuery, keywords: &str) -> String {
        let size = (query.offset + query.limit).clamp(1, MAX_PAGE_SIZE);
        let params = [
            ("cardSearchFilter[resourceType]", "Preprint".to_string()),
            (
                "cardSearchText[*,creator.name,isContainedBy.creator.name]",
                keywords.to_string(),
            ),
            ("page[size]", size.to_string()),
            ("sort", "-relevance".to_string()),
        ];

        format!(
            "{}/trove/index-card-search?{}",
            self.trove_url,
            encode_params(&params)
        )
    }

    async fn search_trove(
        &self,
        query: &SearchQuery,
        keywords: &str,
    ) -> Result<Vec<NativeRecord>, SourceError> {
        let url = self.trove_search_url(query, keywords);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = check_status(response, Provider::Osf, "Trove search")?;

        let body: TroveResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse trove response: {}", e)))?;

        let records = body
            .data
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<TroveCard>(item) {
                Ok(card) => {
                    let on_server = query
                        .osf_provider
                        .as_deref()
                        .map_or(true, |server| card.published_by(server));
                    let preprint = card.into_preprint();
                    (on_server && within_filters(&preprint, query))
                        .then_some(NativeRecord::Osf(preprint))
                }
                Err(e) => Some(NativeRecord::Unparsed {
                    provider: Provider::Osf,
                    reason: e.to_string(),
                }),
            })
            .skip(query.offset)
            .take(query.limit)
            .collect();

        Ok(records)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        what: &str,
    ) -> Result<T, SourceError> {
        let response = self.client.get(url).send().await?;
        let response = check_status(response, Provider::Osf, what)?;

        response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse OSF response: {}", e)))
    }

    /// Follow `relationships.primary_file` to the file's download link
    async fn primary_file_download(&self, preprint: &OsfPreprint) -> Option<String> {
        let href = preprint
            .relationships
            .primary_file
            .as_ref()
            .and_then(|rel| rel.links.related.as_ref())
            .map(|related| related.href.clone())?;

        match self.get_json::<OsfFileResponse>(&href, "Primary file").await {
            Ok(file) => file.data.links.download,
            Err(e) => {
                tracing::warn!(
                    preprint = preprint.id.as_deref().unwrap_or_default(),
                    error = %e,
                    "could not resolve OSF primary file"
                );
                None
            }
        }
    }
}

#[async_trait]
impl Source for OsfSource {
    fn provider(&self) -> Provider {
        Provider::Osf
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::FETCH
            | SourceCapabilities::LIST_SERVERS
            | SourceCapabilities::CONTENT
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<NativeRecord>, SourceError> {
        let keywords = sanitize_query(&query.keywords, 200);
        if !keywords.is_empty() {
            return self.search_trove(query, &keywords).await;
        }

        let url = self.search_url(query);
        let response: OsfListResponse = self.get_json(&url, "Preprints").await?;

        Ok(decode_records(Provider::Osf, response.data, NativeRecord::Osf))
    }

    async fn fetch(&self, id: &str) -> Result<NativeRecord, SourceError> {
        let preprint_id = sanitize_paper_id(id)?;
        let url = format!(
            "{}/v2/preprints/{}/?embed=contributors",
            self.base_url, preprint_id
        );

        let response: OsfSingleResponse = self
            .get_json(&url, &format!("Preprint {}", preprint_id))
            .await?;

        let mut preprint = response.data;
        preprint.primary_file_download = self.primary_file_download(&preprint).await;

        Ok(NativeRecord::Osf(preprint))
    }

    async fn list_servers(&self) -> Result<Vec<PreprintServer>, SourceError> {
        let url = format!(
            "{}/v2/preprint_providers/?page[size]={}",
            self.base_url, MAX_PAGE_SIZE
        );
        let response: OsfProvidersResponse = self.get_json(&url, "Preprint providers").await?;

        Ok(response
            .data
            .into_iter()
            .map(|p| PreprintServer {
                name: p.attributes.name.unwrap_or_else(|| p.id.clone()),
                description: p.attributes.description.filter(|d| !d.trim().is_empty()),
                id: p.id,
            })
            .collect())
    }
}

fn encode_params(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Subject and date filters for results the API could not filter itself
fn within_filters(preprint: &OsfPreprint, query: &SearchQuery) -> bool {
    if let Some(since) = query.published_since {
        let date = preprint
            .attributes
            .date_published
            .as_deref()
            .or(preprint.attributes.date_created.as_deref())
            .and_then(date_prefix);
        if !date.is_some_and(|d| d >= since) {
            return false;
        }
    }

    if let Some(subjects) = query.subjects.as_deref() {
        let wanted = subjects.trim().to_lowercase();
        if !wanted.is_empty()
            && !preprint
                .subject_names()
                .iter()
                .any(|s| s.to_lowercase().contains(&wanted))
        {
            return false;
        }
    }

    true
}

fn date_prefix(value: &str) -> Option<NaiveDate> {
    value
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

// ===== OSF API Types =====

/// A preprint resource from the OSF `/v2/preprints` endpoint
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OsfPreprint {
    pub id: Option<String>,
    pub attributes: OsfAttributes,
    pub relationships: OsfRelationships,
    pub links: OsfLinks,
    pub embeds: OsfEmbeds,
    /// Download link of the primary file, resolved on single-record fetches
    #[serde(skip)]
    pub primary_file_download: Option<String>,
    /// Creator names from a trove card; JSON:API records use `embeds`
    #[serde(skip)]
    pub creators: Vec<String>,
}

impl OsfPreprint {
    /// Contributor names in listed order
    pub fn contributor_names(&self) -> Vec<String> {
        if self.embeds.contributors.is_none() {
            return self.creators.clone();
        }

        self.embeds
            .contributors
            .as_ref()
            .map(|c| {
                c.data
                    .iter()
                    .filter_map(|contributor| {
                        contributor
                            .embeds
                            .users
                            .as_ref()
                            .and_then(|u| u.data.as_ref())
                            .and_then(|user| user.attributes.full_name.clone())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Subject names, flattened from OSF's hierarchy
    pub fn subject_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for entry in &self.attributes.subjects {
            let path: &[OsfSubject] = match entry {
                OsfSubjectEntry::Path(path) => path,
                OsfSubjectEntry::Single(subject) => std::slice::from_ref(subject),
            };
            for subject in path {
                if let Some(text) = subject.text.as_ref() {
                    if !names.contains(text) {
                        names.push(text.clone());
                    }
                }
            }
        }
        names
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OsfAttributes {
    pub title: Option<String>,
    pub description: Option<String>,
    pub doi: Option<String>,
    pub date_published: Option<String>,
    pub date_created: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub subjects: Vec<OsfSubjectEntry>,
}

/// OSF returns subjects either as hierarchy paths or as single entries
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OsfSubjectEntry {
    Path(Vec<OsfSubject>),
    Single(OsfSubject),
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OsfSubject {
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OsfLinks {
    pub html: Option<String>,
    pub preprint_doi: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OsfRelationships {
    pub primary_file: Option<OsfRelationship>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OsfRelationship {
    pub links: OsfRelationshipLinks,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OsfRelationshipLinks {
    pub related: Option<OsfHref>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OsfHref {
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OsfEmbeds {
    pub contributors: Option<OsfContributors>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OsfContributors {
    #[serde(deserialize_with = "null_as_default")]
    pub data: Vec<OsfContributor>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OsfContributor {
    pub embeds: OsfContributorEmbeds,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OsfContributorEmbeds {
    pub users: Option<OsfUserEnvelope>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OsfUserEnvelope {
    pub data: Option<OsfUser>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OsfUser {
    pub attributes: OsfUserAttributes,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OsfUserAttributes {
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OsfListResponse {
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OsfSingleResponse {
    data: OsfPreprint,
}

#[derive(Debug, Deserialize)]
struct OsfFileResponse {
    data: OsfFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OsfFile {
    links: OsfFileLinks,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OsfFileLinks {
    download: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OsfProvidersResponse {
    data: Vec<OsfProvider>,
}

#[derive(Debug, Deserialize)]
struct OsfProvider {
    id: String,
    #[serde(default)]
    attributes: OsfProviderAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OsfProviderAttributes {
    name: Option<String>,
    description: Option<String>,
}

// ===== SHARE trove types =====

#[derive(Debug, Deserialize)]
struct TroveResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

/// One index card from `/trove/index-card-search`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TroveCard {
    /// Resource IRI, e.g. `https://osf.io/abc12`
    #[serde(rename = "@id")]
    id: Option<String>,
    title: Vec<TroveText>,
    description: Vec<TroveText>,
    #[serde(rename = "dateCreated")]
    date_created: Vec<TroveText>,
    #[serde(rename = "dateAccepted")]
    date_accepted: Vec<TroveText>,
    identifier: Vec<TroveText>,
    subject: Vec<TroveSubject>,
    publisher: Vec<TroveNode>,
    creator: Vec<TroveCreator>,
}

/// A literal, either bare or wrapped as `{"@value": ...}`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TroveText {
    Plain(String),
    Literal {
        #[serde(rename = "@value")]
        value: String,
    },
    Other(serde_json::Value),
}

impl TroveText {
    fn as_str(&self) -> Option<&str> {
        match self {
            TroveText::Plain(s) | TroveText::Literal { value: s } => Some(s.as_str()),
            TroveText::Other(_) => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TroveSubject {
    #[serde(rename = "prefLabel")]
    pref_label: Vec<TroveText>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TroveNode {
    #[serde(rename = "@id")]
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TroveCreator {
    name: Vec<TroveText>,
}

fn first_text(values: &[TroveText]) -> Option<String> {
    values.iter().find_map(TroveText::as_str).map(str::to_string)
}

fn last_segment(iri: &str) -> Option<&str> {
    iri.trim_end_matches('/').rsplit('/').next().filter(|s| !s.is_empty())
}

impl TroveCard {
    /// OSF guid, the last path segment of an `osf.io` IRI
    fn guid(&self) -> Option<String> {
        self.id
            .as_deref()
            .filter(|iri| iri.contains("osf.io/"))
            .and_then(last_segment)
            .map(str::to_string)
    }

    /// Whether a publisher IRI (`https://osf.io/preprints/psyarxiv`) names this server
    fn published_by(&self, server: &str) -> bool {
        self.publisher
            .iter()
            .filter_map(|p| p.id.as_deref().and_then(last_segment))
            .any(|id| id.eq_ignore_ascii_case(server))
    }

    fn doi(&self) -> Option<String> {
        self.identifier
            .iter()
            .filter_map(TroveText::as_str)
            .find(|v| v.contains("doi.org/") || v.starts_with("10."))
            .map(str::to_string)
    }

    fn into_preprint(self) -> OsfPreprint {
        let mut preprint = OsfPreprint {
            id: self.guid(),
            creators: self
                .creator
                .iter()
                .filter_map(|c| first_text(&c.name))
                .collect(),
            ..Default::default()
        };

        preprint.attributes = OsfAttributes {
            title: first_text(&self.title),
            description: first_text(&self.description),
            doi: self.doi(),
            date_published: first_text(&self.date_accepted),
            date_created: first_text(&self.date_created),
            subjects: self
                .subject
                .iter()
                .filter_map(|s| first_text(&s.pref_label))
                .map(|text| OsfSubjectEntry::Single(OsfSubject { text: Some(text) }))
                .collect(),
        };
        preprint.links.html = self.id;
        preprint
    }
}
