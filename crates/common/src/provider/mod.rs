//! Citation data provider abstraction
//!
//! A provider answers one question per paper: who cites it and what it cites.
//! Implementations:
//! - Semantic Scholar Graph API
//! - In-memory fakes in tests

mod semantic_scholar;

pub use semantic_scholar::SemanticScholarProvider;

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Reference to a paper as returned by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRef {
    /// Provider-qualified identifier, e.g. `arxiv:1706.03762`
    pub id: String,

    pub title: Option<String>,

    #[serde(default)]
    pub citation_count: u64,

    pub year: Option<i32>,
}

impl PaperRef {
    /// Create a reference with only an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            citation_count: 0,
            year: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_citation_count(mut self, count: u64) -> Self {
        self.citation_count = count;
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }
}

/// Result of one provider lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationLookup {
    /// The looked-up paper itself, carrying its canonical identifier
    pub paper: PaperRef,

    /// Papers citing the looked-up paper (inbound edges)
    pub citing: Vec<PaperRef>,

    /// Papers the looked-up paper cites (outbound edges)
    pub references: Vec<PaperRef>,
}

/// Trait for citation data sources
#[async_trait]
pub trait CitationProvider: Send + Sync {
    /// Fetch the citing and referenced papers of `paper_id`.
    ///
    /// Fails with `PaperNotFound` when the identifier is unknown and
    /// `ProviderUnavailable` on transport or upstream failures.
    async fn lookup_citations(&self, paper_id: &str) -> Result<CitationLookup>;

    /// Short provider name used in logs and metrics
    fn name(&self) -> &str;
}

/// Search results from a paper index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub total: Option<u64>,

    /// Raw paper records with the requested fields
    pub papers: Vec<serde_json::Value>,
}

/// Trait for keyword search over a paper index
#[async_trait]
pub trait PaperSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize, fields: &[String]) -> Result<SearchResults>;
}

/// Identifier namespaces understood by the providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdNamespace {
    ArXiv,
    Doi,
    SemanticScholar,
    /// No recognised prefix; passed through unchanged
    Raw,
}

/// Split a provider-qualified identifier into namespace and bare id.
///
/// Prefixes are matched case-insensitively: `arxiv:`, `doi:`, `s2:`.
pub fn parse_paper_id(paper_id: &str) -> (IdNamespace, &str) {
    let trimmed = paper_id.trim();
    if let Some((prefix, rest)) = trimmed.split_once(':') {
        let namespace = match prefix.to_ascii_lowercase().as_str() {
            "arxiv" => Some(IdNamespace::ArXiv),
            "doi" => Some(IdNamespace::Doi),
            "s2" => Some(IdNamespace::SemanticScholar),
            _ => None,
        };
        if let Some(namespace) = namespace {
            return (namespace, rest.trim());
        }
    }
    (IdNamespace::Raw, trimmed)
}
