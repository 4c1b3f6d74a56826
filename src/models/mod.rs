//! Core data models for papers and search operations.

mod paper;
mod search;

pub use paper::{PaperResult, PaperResultBuilder, Provider};
pub use search::{
    ProviderFailure, SearchOutcome, SearchQuery, ValidationError, DEFAULT_LIMIT, MAX_LIMIT,
};
