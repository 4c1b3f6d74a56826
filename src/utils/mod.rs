//! Utility modules supporting the paper services.
//!
//! - [`deduplicate_papers`]: Drop cross-provider duplicates by DOI and title similarity
//! - [`HttpClient`]: Shared outbound HTTP client
//! - [`extract_text_from_bytes`]: Extract text content from PDF documents
//! - [`sanitize_query`], [`sanitize_paper_id`], [`validate_url`]: Input checks
//!   applied before anything reaches a provider
//!
//! # Deduplication
//!
//! ```rust
//! use paperclip::utils::deduplicate_papers;
//! use paperclip::models::PaperResult;
//!
//! # fn example(papers: Vec<PaperResult>) {
//! let unique = deduplicate_papers(papers);
//! # }
//! ```

mod dedup;
mod http;
mod pdf;
mod validate;

pub use dedup::deduplicate_papers;
pub use http::HttpClient;
pub use pdf::{extract_text_from_bytes, looks_like_pdf, PdfExtractError};
pub use validate::{
    collapse_whitespace, normalize_doi, sanitize_paper_id, sanitize_query, validate_url,
    InputError,
};
