//! Mapping of provider-native records to the canonical [`PaperResult`].
//!
//! Each native record type implements [`FieldMapping`], a table of field
//! accessors. [`normalize`] picks the mapping for a record's tag and then
//! runs one provider-independent body over it: trimming, blank filtering
//! and the mandatory-field check all happen in a single place.
//!
//! Missing optional fields (abstract, date, authors, links) never fail a
//! record. A record without a title or an identifier is malformed and is
//! rejected with [`NormalizeError::MalformedRecord`].

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use thiserror::Error;

use crate::models::{PaperResult, Provider};
use crate::sources::{ArxivEntry, ArxivLink, NativeRecord, OpenAlexWork, OsfPreprint};
use crate::utils::{collapse_whitespace, normalize_doi};

/// Errors raised while normalizing a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// A mandatory field is absent or blank
    #[error("Malformed {provider} record: missing {missing}")]
    MalformedRecord {
        provider: Provider,
        missing: &'static str,
    },

    /// The provider's record could not be decoded at all
    #[error("Undecodable {provider} record: {reason}")]
    Undecodable { provider: Provider, reason: String },

    /// A mapping produced a record tagged with the wrong provider
    #[error("Field mapping for {expected} produced a {actual} record")]
    MappingMismatch { expected: Provider, actual: Provider },
}

/// Field accessors for one provider-native record type.
///
/// Accessors return raw values; [`normalize`] does the cleanup.
pub trait FieldMapping {
    /// Provider whose records this mapping reads
    const PROVIDER: Provider;

    fn identifier(&self) -> Option<String>;
    fn title(&self) -> Option<String>;
    fn authors(&self) -> Vec<String>;
    fn abstract_text(&self) -> Option<String>;
    fn published(&self) -> Option<NaiveDate>;
    fn url(&self) -> Option<String>;
    fn doi(&self) -> Option<String>;
    fn pdf_url(&self) -> Option<String>;
    fn subjects(&self) -> Vec<String>;

    /// A documented example record, checked by [`validate_mappings`]
    fn sample() -> Self
    where
        Self: Sized;
}

/// Normalize one provider-native record
pub fn normalize(record: &NativeRecord) -> Result<PaperResult, NormalizeError> {
    match record {
        NativeRecord::Arxiv(entry) => apply(entry),
        NativeRecord::OpenAlex(work) => apply(work),
        NativeRecord::Osf(preprint) => apply(preprint),
        NativeRecord::Unparsed { provider, reason } => Err(NormalizeError::Undecodable {
            provider: *provider,
            reason: reason.clone(),
        }),
    }
}

fn apply<M: FieldMapping>(record: &M) -> Result<PaperResult, NormalizeError> {
    let identifier = non_blank(record.identifier().map(|id| id.trim().to_string())).ok_or(
        NormalizeError::MalformedRecord {
            provider: M::PROVIDER,
            missing: "identifier",
        },
    )?;

    let title = non_blank(record.title().map(|t| collapse_whitespace(&t))).ok_or(
        NormalizeError::MalformedRecord {
            provider: M::PROVIDER,
            missing: "title",
        },
    )?;

    let authors = record
        .authors()
        .iter()
        .map(|a| collapse_whitespace(a))
        .filter(|a| !a.is_empty())
        .collect();

    let subjects = record
        .subjects()
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    Ok(PaperResult::builder(identifier, title, M::PROVIDER)
        .authors(authors)
        .abstract_text(record.abstract_text().map(|a| collapse_whitespace(&a)))
        .published(record.published())
        .url(non_blank(record.url()).unwrap_or_default())
        .doi(record.doi().as_deref().and_then(normalize_doi))
        .pdf_url(record.pdf_url())
        .subjects(subjects)
        .build())
}

/// Check every mapping against its sample record
pub fn validate_mappings() -> Result<(), NormalizeError> {
    check_mapping::<ArxivEntry>(NativeRecord::Arxiv)?;
    check_mapping::<OpenAlexWork>(NativeRecord::OpenAlex)?;
    check_mapping::<OsfPreprint>(NativeRecord::Osf)?;
    Ok(())
}

fn check_mapping<M: FieldMapping>(wrap: fn(M) -> NativeRecord) -> Result<(), NormalizeError> {
    let record = wrap(M::sample());
    let paper = normalize(&record)?;
    if paper.source_provider() != M::PROVIDER || record.provider() != M::PROVIDER {
        return Err(NormalizeError::MappingMismatch {
            expected: M::PROVIDER,
            actual: paper.source_provider(),
        });
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse the `YYYY-MM-DD` prefix of a date or timestamp
fn parse_date_prefix(value: &str) -> Option<NaiveDate> {
    value
        .trim()
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

/// Rebuild abstract text from OpenAlex's word -> positions index
pub fn rebuild_abstract(index: &HashMap<String, Vec<usize>>) -> String {
    let mut positioned: Vec<(usize, &str)> = index
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |p| (*p, word.as_str())))
        .collect();
    positioned.sort_unstable_by_key(|(position, _)| *position);

    positioned
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ")
}

// ===== arXiv =====

impl FieldMapping for ArxivEntry {
    const PROVIDER: Provider = Provider::Arxiv;

    fn identifier(&self) -> Option<String> {
        self.id
            .split_once("/abs/")
            .map(|(_, id)| id.to_string())
    }

    fn title(&self) -> Option<String> {
        self.title.clone()
    }

    fn authors(&self) -> Vec<String> {
        self.authors.clone()
    }

    fn abstract_text(&self) -> Option<String> {
        self.summary.clone()
    }

    fn published(&self) -> Option<NaiveDate> {
        self.published.map(|d| d.date_naive())
    }

    fn url(&self) -> Option<String> {
        find_link(&self.links, |l| l.rel.as_deref() == Some("alternate"))
            .or_else(|| self.identifier().map(|id| format!("https://arxiv.org/abs/{}", id)))
    }

    fn doi(&self) -> Option<String> {
        find_link(&self.links, |l| l.title.as_deref() == Some("doi"))
    }

    fn pdf_url(&self) -> Option<String> {
        find_link(&self.links, |l| {
            l.media_type.as_deref() == Some("application/pdf") || l.title.as_deref() == Some("pdf")
        })
    }

    fn subjects(&self) -> Vec<String> {
        self.categories.clone()
    }

    fn sample() -> Self {
        ArxivEntry {
            id: "http://arxiv.org/abs/2407.06405v1".to_string(),
            title: Some("Sample arXiv entry".to_string()),
            authors: vec!["A. Author".to_string()],
            summary: Some("Abstract.".to_string()),
            published: DateTime::<Utc>::from_timestamp(1_720_396_800, 0),
            links: vec![ArxivLink {
                href: "http://arxiv.org/abs/2407.06405v1".to_string(),
                rel: Some("alternate".to_string()),
                title: None,
                media_type: Some("text/html".to_string()),
            }],
            categories: vec!["cs.LG".to_string()],
        }
    }
}

fn find_link(links: &[ArxivLink], pred: impl Fn(&ArxivLink) -> bool) -> Option<String> {
    links
        .iter()
        .find(|l| pred(l))
        .map(|l| l.href.clone())
        .filter(|href| !href.is_empty())
}

// ===== OpenAlex =====

impl FieldMapping for OpenAlexWork {
    const PROVIDER: Provider = Provider::OpenAlex;

    fn identifier(&self) -> Option<String> {
        self.id.as_deref().map(|id| {
            id.strip_prefix(crate::sources::OPENALEX_ID_PREFIX)
                .unwrap_or(id)
                .to_string()
        })
    }

    fn title(&self) -> Option<String> {
        non_blank(self.title.clone()).or_else(|| self.display_name.clone())
    }

    fn authors(&self) -> Vec<String> {
        self.authorships
            .iter()
            .filter_map(|a| a.author.as_ref()?.display_name.clone())
            .collect()
    }

    fn abstract_text(&self) -> Option<String> {
        self.abstract_inverted_index.as_ref().map(rebuild_abstract)
    }

    fn published(&self) -> Option<NaiveDate> {
        self.publication_date.as_deref().and_then(parse_date_prefix)
    }

    fn url(&self) -> Option<String> {
        self.primary_location
            .as_ref()
            .and_then(|l| non_blank(l.landing_page_url.clone()))
            .or_else(|| non_blank(self.doi.clone()))
            .or_else(|| self.id.clone())
    }

    fn doi(&self) -> Option<String> {
        self.doi.clone()
    }

    fn pdf_url(&self) -> Option<String> {
        self.primary_location
            .as_ref()
            .and_then(|l| non_blank(l.pdf_url.clone()))
            .or_else(|| {
                self.locations
                    .iter()
                    .find_map(|l| non_blank(l.pdf_url.clone()))
            })
    }

    fn subjects(&self) -> Vec<String> {
        self.concepts
            .iter()
            .filter_map(|c| c.display_name.clone())
            .collect()
    }

    fn sample() -> Self {
        OpenAlexWork {
            id: Some("https://openalex.org/W2741809807".to_string()),
            doi: Some("https://doi.org/10.7717/peerj.4375".to_string()),
            title: Some("Sample OpenAlex work".to_string()),
            publication_date: Some("2018-02-13".to_string()),
            abstract_inverted_index: Some(HashMap::from([
                ("Sample".to_string(), vec![0]),
                ("abstract".to_string(), vec![1]),
            ])),
            ..Default::default()
        }
    }
}

// ===== OSF =====

impl FieldMapping for OsfPreprint {
    const PROVIDER: Provider = Provider::Osf;

    fn identifier(&self) -> Option<String> {
        self.id.clone()
    }

    fn title(&self) -> Option<String> {
        self.attributes.title.clone()
    }

    fn authors(&self) -> Vec<String> {
        self.contributor_names()
    }

    fn abstract_text(&self) -> Option<String> {
        self.attributes.description.clone()
    }

    fn published(&self) -> Option<NaiveDate> {
        self.attributes
            .date_published
            .as_deref()
            .and_then(parse_date_prefix)
            .or_else(|| {
                self.attributes
                    .date_created
                    .as_deref()
                    .and_then(parse_date_prefix)
            })
    }

    fn url(&self) -> Option<String> {
        non_blank(self.links.html.clone())
            .or_else(|| self.identifier().map(|id| format!("https://osf.io/{}", id.trim())))
    }

    fn doi(&self) -> Option<String> {
        non_blank(self.attributes.doi.clone()).or_else(|| self.links.preprint_doi.clone())
    }

    fn pdf_url(&self) -> Option<String> {
        self.primary_file_download.clone()
    }

    fn subjects(&self) -> Vec<String> {
        self.subject_names()
    }

    fn sample() -> Self {
        let mut preprint = OsfPreprint {
            id: Some("abc12".to_string()),
            ..Default::default()
        };
        preprint.attributes.title = Some("Sample OSF preprint".to_string());
        preprint.attributes.date_published = Some("2021-03-02T18:25:41.386454".to_string());
        preprint
    }
}
