//! Input validation and sanitization for query text, paper IDs, URLs and DOIs.
//!
//! Provider query dialects each reserve some punctuation, so free text is
//! cleaned before it is embedded in a query string.

use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;

/// Input validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("Invalid paper ID: {0}")]
    InvalidPaperId(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL points to a local or private address")]
    DangerousUrl,
}

/// Clean free text for use inside a provider query.
///
/// Folds typographic quotes, collapses whitespace, caps the length at
/// `max_length` characters and strips characters the provider dialects
/// treat as syntax.
pub fn sanitize_query(text: &str, max_length: usize) -> String {
    if text.is_empty() {
        return String::new();
    }

    let folded: String = text
        .replace("&nbsp;", " ")
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{00A0}' => ' ',
            other => other,
        })
        .collect();

    let mut cleaned = collapse_whitespace(&folded);

    if cleaned.chars().count() > max_length {
        let keep = max_length.saturating_sub(3);
        cleaned = cleaned.chars().take(keep).collect::<String>() + "...";
    }

    let cleaned: String = cleaned
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '<' | '>' | '{' | '}' | '|' | '\\' | '^' | '`' | '[' | ']' | '?' | '!' | '#' | '%'
            )
        })
        .collect();

    let cleaned = cleaned.replace(':', " -").replace(';', ",");

    collapse_whitespace(&cleaned)
}

/// Collapse runs of whitespace into single spaces and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Validate a paper ID before it is placed into a request path.
///
/// IDs may contain alphanumerics, `.`, `-`, `_`, `:` and `/` (old-style
/// arXiv IDs such as `math.GT/0104020`).
pub fn sanitize_paper_id(id: &str) -> Result<String, InputError> {
    let id = id.trim();

    if id.is_empty() {
        return Err(InputError::InvalidPaperId("empty ID".to_string()));
    }

    if id.contains("..") {
        return Err(InputError::InvalidPaperId(format!(
            "path traversal detected: {}",
            id
        )));
    }

    if let Some(ch) = id
        .chars()
        .find(|c| !(c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '/')))
    {
        return Err(InputError::InvalidPaperId(format!(
            "contains disallowed character: {:?}",
            ch
        )));
    }

    Ok(id.to_string())
}

/// Validate a caller-supplied URL: http(s) only, no local or private hosts
pub fn validate_url(url: &str) -> Result<url::Url, InputError> {
    let url = url.trim();

    if url.is_empty() {
        return Err(InputError::InvalidUrl("empty URL".to_string()));
    }

    let parsed = url::Url::parse(url).map_err(|e| InputError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(InputError::InvalidUrl(format!("invalid scheme: {}", scheme)));
        }
    }

    let dangerous = match parsed.host() {
        Some(url::Host::Domain(host)) => {
            let host = host.trim_end_matches('.').to_ascii_lowercase();
            host == "localhost" || host.ends_with(".localhost")
        }
        Some(url::Host::Ipv4(ip)) => is_internal_ipv4(ip),
        Some(url::Host::Ipv6(ip)) => is_internal_ipv6(ip),
        None => return Err(InputError::InvalidUrl("missing host".to_string())),
    };

    if dangerous {
        return Err(InputError::DangerousUrl);
    }
    Ok(parsed)
}

fn is_internal_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_unspecified()
        || ip.is_link_local()
        || ip.is_broadcast()
        // 100.64.0.0/10 carrier-grade NAT
        || (a == 100 && (b & 0xc0) == 64)
}

fn is_internal_ipv6(ip: Ipv6Addr) -> bool {
    // ::ffff:a.b.c.d reaches the IPv4 host
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_internal_ipv4(v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
}

/// Reduce a DOI in any common notation to its bare `10.xxxx/...` form
pub fn normalize_doi(raw: &str) -> Option<String> {
    let doi = raw.trim();
    let lower = doi.to_lowercase();

    let prefix_len = [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
    ]
    .iter()
    .find(|p| lower.starts_with(*p))
    .map(|p| p.len())
    .unwrap_or(0);

    let doi = doi[prefix_len..].trim();
    if doi.starts_with("10.") && doi.contains('/') {
        Some(doi.to_string())
    } else {
        None
    }
}
