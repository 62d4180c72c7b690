//! In-memory citation provider for tests and local runs

use async_trait::async_trait;
use citeforge_common::errors::{AppError, Result};
use citeforge_common::{CitationLookup, CitationProvider, PaperRef};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Failure a mock lookup should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    NotFound,
    Unavailable,
}

/// Mock provider backed by a fixed citation graph.
///
/// Relations keep insertion order so expansions are reproducible. Every
/// lookup is counted per identifier.
#[derive(Default)]
pub struct MockCitationProvider {
    papers: HashMap<String, PaperRef>,
    citing: HashMap<String, Vec<String>>,
    references: HashMap<String, Vec<String>>,
    canonical: HashMap<String, String>,
    failures: HashMap<String, MockFailure>,
    latency: Option<Duration>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockCitationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register paper metadata
    pub fn with_paper(mut self, paper: PaperRef) -> Self {
        self.papers.insert(paper.id.clone(), paper);
        self
    }

    /// `citing` cites `cited`
    pub fn with_citation(mut self, citing: &str, cited: &str) -> Self {
        self.ensure_known(citing);
        self.ensure_known(cited);
        self.references
            .entry(citing.to_string())
            .or_default()
            .push(cited.to_string());
        self.citing
            .entry(cited.to_string())
            .or_default()
            .push(citing.to_string());
        self
    }

    /// Answer lookups of `requested` with a paper whose id is `canonical`
    pub fn with_canonical_id(mut self, requested: &str, canonical: &str) -> Self {
        self.ensure_known(requested);
        self.canonical.insert(requested.to_string(), canonical.to_string());
        self
    }

    /// Make lookups of `id` fail
    pub fn with_failure(mut self, id: &str, failure: MockFailure) -> Self {
        self.failures.insert(id.to_string(), failure);
        self
    }

    /// Delay every lookup
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of lookups issued for `id`
    pub fn calls_for(&self, id: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of lookups issued in total
    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.values().sum())
            .unwrap_or(0)
    }

    fn ensure_known(&mut self, id: &str) {
        self.papers
            .entry(id.to_string())
            .or_insert_with(|| PaperRef::new(id));
    }

    fn paper(&self, id: &str) -> PaperRef {
        self.papers
            .get(id)
            .cloned()
            .unwrap_or_else(|| PaperRef::new(id))
    }

    fn related(&self, relation: &HashMap<String, Vec<String>>, id: &str) -> Vec<PaperRef> {
        relation
            .get(id)
            .map(|ids| ids.iter().map(|other| self.paper(other)).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CitationProvider for MockCitationProvider {
    async fn lookup_citations(&self, paper_id: &str) -> Result<CitationLookup> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(paper_id.to_string()).or_insert(0) += 1;
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.failures.get(paper_id) {
            Some(MockFailure::NotFound) => {
                return Err(AppError::PaperNotFound { id: paper_id.to_string() })
            }
            Some(MockFailure::Unavailable) => {
                return Err(AppError::ProviderUnavailable {
                    provider: self.name().to_string(),
                    message: "injected failure".to_string(),
                })
            }
            None => {}
        }

        if !self.papers.contains_key(paper_id) {
            return Err(AppError::PaperNotFound { id: paper_id.to_string() });
        }

        let mut paper = self.paper(paper_id);
        if let Some(canonical) = self.canonical.get(paper_id) {
            paper.id = canonical.clone();
        }

        Ok(CitationLookup {
            paper,
            citing: self.related(&self.citing, paper_id),
            references: self.related(&self.references, paper_id),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
