//! Canonical paper record returned to callers regardless of provider.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The external bibliographic API a record came from.
///
/// The set is closed: adding a provider means adding a variant here, a
/// client in [`crate::sources`] and a field mapping in [`crate::normalize`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Arxiv,
    Osf,
    OpenAlex,
}

impl Provider {
    /// All providers, in default registration order
    pub const ALL: [Provider; 3] = [Provider::Arxiv, Provider::OpenAlex, Provider::Osf];

    /// Returns the display name of the provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Arxiv => "arXiv",
            Provider::Osf => "OSF Preprints",
            Provider::OpenAlex => "OpenAlex",
        }
    }

    /// Returns the provider identifier used in tool arguments
    pub fn id(&self) -> &'static str {
        match self {
            Provider::Arxiv => "arxiv",
            Provider::Osf => "osf",
            Provider::OpenAlex => "openalex",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arxiv" => Ok(Provider::Arxiv),
            "osf" => Ok(Provider::Osf),
            "openalex" => Ok(Provider::OpenAlex),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// A paper from any provider, in canonical form.
///
/// Built by the normalizer (or [`PaperResultBuilder`]) and never mutated
/// afterwards; fields are exposed read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperResult {
    title: String,
    authors: Vec<String>,
    r#abstract: Option<String>,
    published: Option<NaiveDate>,
    source_provider: Provider,
    /// Provider-native identifier (arXiv id, OSF guid, OpenAlex work id)
    identifier: String,
    url: String,
    doi: Option<String>,
    pdf_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    subjects: Vec<String>,
}

impl PaperResult {
    /// Start building a record from its mandatory fields
    pub fn builder(
        identifier: impl Into<String>,
        title: impl Into<String>,
        source_provider: Provider,
    ) -> PaperResultBuilder {
        PaperResultBuilder::new(identifier, title, source_provider)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn authors(&self) -> &[String] {
        &self.authors
    }

    pub fn abstract_text(&self) -> Option<&str> {
        self.r#abstract.as_deref()
    }

    pub fn published(&self) -> Option<NaiveDate> {
        self.published
    }

    pub fn source_provider(&self) -> Provider {
        self.source_provider
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn doi(&self) -> Option<&str> {
        self.doi.as_deref()
    }

    pub fn pdf_url(&self) -> Option<&str> {
        self.pdf_url.as_deref()
    }

    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }
}

/// Builder for constructing [`PaperResult`] values
#[derive(Debug, Clone)]
pub struct PaperResultBuilder {
    paper: PaperResult,
}

impl PaperResultBuilder {
    /// Create a new builder with required fields
    pub fn new(
        identifier: impl Into<String>,
        title: impl Into<String>,
        source_provider: Provider,
    ) -> Self {
        Self {
            paper: PaperResult {
                title: title.into(),
                authors: Vec::new(),
                r#abstract: None,
                published: None,
                source_provider,
                identifier: identifier.into(),
                url: String::new(),
                doi: None,
                pdf_url: None,
                subjects: Vec::new(),
            },
        }
    }

    pub fn authors(mut self, authors: Vec<String>) -> Self {
        self.paper.authors = authors;
        self
    }

    /// Set abstract; blank text is stored as `None`
    pub fn abstract_text(mut self, abstract_text: Option<String>) -> Self {
        self.paper.r#abstract = abstract_text.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn published(mut self, date: Option<NaiveDate>) -> Self {
        self.paper.published = date;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.paper.url = url.into();
        self
    }

    pub fn doi(mut self, doi: Option<String>) -> Self {
        self.paper.doi = doi.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn pdf_url(mut self, url: Option<String>) -> Self {
        self.paper.pdf_url = url.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn subjects(mut self, subjects: Vec<String>) -> Self {
        self.paper.subjects = subjects;
        self
    }

    /// Build the record
    pub fn build(self) -> PaperResult {
        self.paper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_filters_blank_optionals() {
        let paper = PaperResult::builder("2301.12345v1", "Test Paper", Provider::Arxiv)
            .abstract_text(Some("   ".to_string()))
            .doi(Some(String::new()))
            .pdf_url(None)
            .build();

        assert_eq!(paper.identifier(), "2301.12345v1");
        assert_eq!(paper.title(), "Test Paper");
        assert!(paper.abstract_text().is_none());
        assert!(paper.doi().is_none());
        assert!(paper.pdf_url().is_none());
        assert!(paper.authors().is_empty());
    }

    #[test]
    fn test_provider_round_trip_names() {
        for provider in Provider::ALL {
            assert_eq!(provider.id().parse::<Provider>().unwrap(), provider);
        }
        assert!("pubmed".parse::<Provider>().is_err());
        assert_eq!(" ArXiv ".parse::<Provider>().unwrap(), Provider::Arxiv);
    }

    #[test]
    fn test_serialized_shape() {
        let paper = PaperResult::builder("abc12", "A preprint", Provider::Osf)
            .authors(vec!["Ada Lovelace".to_string()])
            .published(NaiveDate::from_ymd_opt(2024, 1, 2))
            .url("https://osf.io/abc12")
            .build();

        let json = serde_json::to_value(&paper).unwrap();
        assert_eq!(json["source_provider"], "osf");
        assert_eq!(json["published"], "2024-01-02");
        assert_eq!(json["abstract"], serde_json::Value::Null);
        assert_eq!(json["authors"][0], "Ada Lovelace");
        assert!(json.get("subjects").is_none());
    }
}
