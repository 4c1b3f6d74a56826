//! # Paperclip
//!
//! A Model Context Protocol (MCP) server for searching and retrieving academic
//! preprints from arXiv, OpenAlex and OSF Preprints through one tool interface.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Canonical paper record and search query types
//! - [`sources`]: One client per provider API, behind the [`Source`] trait
//! - [`normalize`]: Per-provider field mappings into [`models::PaperResult`]
//! - [`router`]: Concurrent fan-out, partial-failure aggregation and id detection
//! - [`content`]: PDF download and text extraction
//! - [`mcp`]: MCP tools and server
//! - [`utils`]: HTTP client, input sanitization, deduplication, PDF helpers
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```no_run
//! use paperclip::config::Config;
//! use paperclip::models::{Provider, SearchQuery};
//! use paperclip::router::QueryRouter;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let router = QueryRouter::from_config(&Config::default())?;
//! let query = SearchQuery::new("graph neural networks")
//!     .provider(Provider::Arxiv)
//!     .limit(5);
//!
//! let outcome = router.search(&query).await?;
//! for paper in &outcome.papers {
//!     println!("{} ({})", paper.title(), paper.identifier());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod content;
pub mod mcp;
pub mod models;
pub mod normalize;
pub mod router;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use models::{PaperResult, Provider, SearchOutcome, SearchQuery};
pub use router::QueryRouter;
pub use sources::{Source, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
