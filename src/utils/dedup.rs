//! Deduplication of papers across providers.

use std::collections::HashSet;
use strsim::jaro_winkler;

use crate::models::PaperResult;

/// Titles at least this similar (Jaro-Winkler) are treated as the same work
const TITLE_SIMILARITY_THRESHOLD: f64 = 0.95;

/// Remove later duplicates, keeping the first occurrence of each work.
///
/// Order of the surviving papers is unchanged. Papers from the same
/// provider are never considered duplicates of each other.
pub fn deduplicate_papers(papers: Vec<PaperResult>) -> Vec<PaperResult> {
    let mut kept: Vec<PaperResult> = Vec::with_capacity(papers.len());
    let mut seen_dois: HashSet<String> = HashSet::new();

    for paper in papers {
        let doi_key = paper.doi().map(|d| d.to_lowercase());

        let doi_seen = doi_key
            .as_ref()
            .is_some_and(|key| seen_dois.contains(key));

        if doi_seen || kept.iter().any(|k| are_duplicates(k, &paper)) {
            tracing::debug!(
                identifier = paper.identifier(),
                provider = paper.source_provider().id(),
                "dropping duplicate paper"
            );
            continue;
        }

        if let Some(key) = doi_key {
            seen_dois.insert(key);
        }
        kept.push(paper);
    }

    kept
}

/// Check if two papers from different providers are likely the same work
fn are_duplicates(a: &PaperResult, b: &PaperResult) -> bool {
    if a.source_provider() == b.source_provider() {
        return false;
    }

    let title_a = normalize_title(a.title());
    let title_b = normalize_title(b.title());

    if title_a.is_empty() || title_b.is_empty() {
        return false;
    }

    (title_a == title_b || jaro_winkler(&title_a, &title_b) >= TITLE_SIMILARITY_THRESHOLD)
        && authors_match(a, b)
}

/// At least one author in common; missing author lists count as a match
fn authors_match(a: &PaperResult, b: &PaperResult) -> bool {
    let authors_a: HashSet<String> = a.authors().iter().map(|s| s.trim().to_lowercase()).collect();
    let authors_b: HashSet<String> = b.authors().iter().map(|s| s.trim().to_lowercase()).collect();

    if authors_a.is_empty() || authors_b.is_empty() {
        return true;
    }

    !authors_a.is_disjoint(&authors_b)
}

/// Normalize a title for comparison
fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
