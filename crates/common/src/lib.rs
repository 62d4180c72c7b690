//! CiteForge Common Library
//!
//! Shared code for the CiteForge services including:
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability
//! - Citation data providers (Semantic Scholar)

pub mod config;
pub mod errors;
pub mod metrics;
pub mod provider;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, ErrorKind, Result};
pub use provider::{CitationLookup, CitationProvider, PaperRef, PaperSearch, SearchResults, SemanticScholarProvider};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default Semantic Scholar Graph API endpoint
pub const DEFAULT_SEMANTIC_SCHOLAR_URL: &str = "https://api.semanticscholar.org/graph/v1";

/// Smallest citation depth accepted by `analyze_citations`
pub const MIN_CITATION_DEPTH: u32 = 1;

/// Largest citation depth accepted by `analyze_citations`
pub const MAX_CITATION_DEPTH: u32 = 3;
