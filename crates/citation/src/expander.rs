//! Bounded breadth-first citation graph expansion
//!
//! Expansion proceeds one depth level at a time. All lookups of a level run
//! concurrently (bounded by `max_concurrent_lookups`) and are merged into the
//! graph in frontier order before the next level starts, so every node keeps
//! the depth of its first discovery and identical provider answers always
//! produce identical graphs.

use citeforge_common::errors::{AppError, Result};
use citeforge_common::{CitationLookup, CitationProvider, MAX_CITATION_DEPTH, MIN_CITATION_DEPTH};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::graph::{CitationGraph, PaperNode};

/// Expander tuning
#[derive(Debug, Clone)]
pub struct ExpanderConfig {
    /// Concurrent provider lookups within one depth level
    pub max_concurrent_lookups: usize,
}

impl Default for ExpanderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_lookups: 4,
        }
    }
}

/// Builds citation graphs from a provider
pub struct CitationGraphExpander {
    provider: Arc<dyn CitationProvider>,
    config: ExpanderConfig,
}

impl CitationGraphExpander {
    /// Create a new expander
    pub fn new(provider: Arc<dyn CitationProvider>, config: ExpanderConfig) -> Self {
        Self { provider, config }
    }

    /// Check expansion arguments, returning the trimmed root identifier
    pub fn validate(root_id: &str, max_depth: u32) -> Result<&str> {
        let root_id = root_id.trim();
        if root_id.is_empty() {
            return Err(AppError::invalid_field("paper_id", "paper_id must not be empty"));
        }
        if !(MIN_CITATION_DEPTH..=MAX_CITATION_DEPTH).contains(&max_depth) {
            return Err(AppError::invalid_field(
                "depth",
                format!(
                    "depth must be between {} and {}, got {}",
                    MIN_CITATION_DEPTH, MAX_CITATION_DEPTH, max_depth
                ),
            ));
        }
        Ok(root_id)
    }

    /// Expand the citation neighbourhood of `root_id` up to `max_depth` hops.
    ///
    /// A failed lookup on the root aborts the expansion; failed lookups on
    /// any other node turn that node into a leaf.
    pub async fn expand(&self, root_id: &str, max_depth: u32) -> Result<CitationGraph> {
        let root_id = Self::validate(root_id, max_depth)?;

        info!(
            root_id,
            max_depth,
            provider = self.provider.name(),
            "Expanding citation graph"
        );

        let root_lookup = self.provider.lookup_citations(root_id).await.map_err(|e| {
            warn!(root_id, error = %e, "Root lookup failed");
            e
        })?;

        let mut root = PaperNode::from_ref(&root_lookup.paper, 0);
        root.id = root_id.to_string();
        root.expanded = true;

        let mut graph = CitationGraph::new(root, max_depth);
        let mut frontier = merge_lookup(&mut graph, root_id, root_lookup, 0);

        for depth in 1..max_depth {
            if frontier.is_empty() {
                debug!(depth, "Frontier exhausted");
                break;
            }

            debug!(depth, frontier = frontier.len(), "Expanding level");

            // `buffered` yields in input order regardless of completion order
            let pending = frontier.into_iter().map(|id| {
                let provider = Arc::clone(&self.provider);
                async move {
                    let result = provider.lookup_citations(&id).await;
                    (id, result)
                }
            });
            let lookups: Vec<(String, Result<CitationLookup>)> = stream::iter(pending)
                .buffered(self.config.max_concurrent_lookups.max(1))
                .collect()
                .await;

            let mut next = Vec::new();
            for (id, result) in lookups {
                match result {
                    Ok(lookup) => {
                        if let Some(node) = graph.node_mut(&id) {
                            node.expanded = true;
                        }
                        next.extend(merge_lookup(&mut graph, &id, lookup, depth));
                    }
                    Err(e) => {
                        warn!(paper_id = %id, depth, error = %e, "Lookup failed, keeping node as leaf");
                        if let Some(node) = graph.node_mut(&id) {
                            node.lookup_failed = true;
                        }
                    }
                }
            }
            frontier = next;
        }

        info!(
            root_id,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            influential_citations = graph.influential_citations(),
            "Citation graph expanded"
        );

        Ok(graph)
    }

    /// Expand under an overall deadline.
    ///
    /// Outstanding lookups are dropped when the deadline passes and the call
    /// fails with `Timeout`; no partial graph is returned.
    pub async fn expand_with_deadline(
        &self,
        root_id: &str,
        max_depth: u32,
        deadline: Duration,
    ) -> Result<CitationGraph> {
        match tokio::time::timeout(deadline, self.expand(root_id, max_depth)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(root_id, timeout_ms = deadline.as_millis() as u64, "Citation expansion timed out");
                Err(AppError::Timeout {
                    timeout_ms: deadline.as_millis() as u64,
                })
            }
        }
    }
}

/// Merge one lookup of `node_id` (at `depth`) into the graph.
///
/// Returns the identifiers first discovered by this lookup, in provider order:
/// citing papers first, then references.
fn merge_lookup(
    graph: &mut CitationGraph,
    node_id: &str,
    lookup: CitationLookup,
    depth: u32,
) -> Vec<String> {
    let CitationLookup { paper, citing, references } = lookup;

    if paper.id != node_id && graph.add_alias(&paper.id, node_id) {
        debug!(node_id, alias = %paper.id, "Registered canonical identifier");
    }

    if let Some(node) = graph.node_mut(node_id) {
        if node.title.is_none() {
            node.title = paper.title;
        }
        if node.year.is_none() {
            node.year = paper.year;
        }
    }

    let mut discovered = Vec::new();
    let relations = citing
        .into_iter()
        .map(|p| (p, true))
        .chain(references.into_iter().map(|p| (p, false)));

    for (other, is_citing) in relations {
        if graph.resolve(&other.id) == graph.resolve(node_id) {
            continue;
        }

        if !graph.contains(&other.id) {
            graph.insert_node(PaperNode::from_ref(&other, depth + 1));
            discovered.push(other.id.clone());
        }

        if is_citing {
            graph.add_edge(&other.id, node_id);
        } else {
            graph.add_edge(node_id, &other.id);
        }
    }

    discovered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCitationProvider, MockFailure};
    use citeforge_common::{ErrorKind, PaperRef};
    use std::collections::HashSet;

    fn expander(provider: &Arc<MockCitationProvider>) -> CitationGraphExpander {
        CitationGraphExpander::new(provider.clone(), ExpanderConfig::default())
    }

    fn edge_set(graph: &CitationGraph) -> HashSet<(String, String)> {
        graph
            .edges()
            .iter()
            .map(|e| (e.citing_paper_id.clone(), e.cited_paper_id.clone()))
            .collect()
    }

    /// root -> a -> c, root -> b, d -> root, c -> d, a <-> b
    fn sample_provider() -> MockCitationProvider {
        MockCitationProvider::new()
            .with_paper(PaperRef::new("root").with_citation_count(1000))
            .with_paper(PaperRef::new("a").with_citation_count(10).with_title("A"))
            .with_paper(PaperRef::new("b").with_citation_count(20))
            .with_paper(PaperRef::new("c").with_citation_count(30))
            .with_paper(PaperRef::new("d").with_citation_count(40))
            .with_citation("root", "a")
            .with_citation("root", "b")
            .with_citation("d", "root")
            .with_citation("a", "c")
            .with_citation("c", "d")
            .with_citation("a", "b")
            .with_citation("b", "a")
    }

    #[tokio::test]
    async fn test_root_without_citations() {
        let provider = Arc::new(MockCitationProvider::new().with_paper(PaperRef::new("lonely")));
        let graph = expander(&provider).expand("lonely", 1).await.unwrap();

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.influential_citations(), 0);
        assert_eq!(provider.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_mutual_citations_deduplicated() {
        let provider = Arc::new(
            MockCitationProvider::new()
                .with_citation("root", "x")
                .with_citation("root", "y")
                .with_citation("x", "y")
                .with_citation("y", "x"),
        );
        let graph = expander(&provider).expand("root", 2).await.unwrap();

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 4);

        let expected: HashSet<(String, String)> = [("root", "x"), ("root", "y"), ("x", "y"), ("y", "x")]
            .into_iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        assert_eq!(edge_set(&graph), expected);
    }

    #[tokio::test]
    async fn test_depth_out_of_range() {
        let provider = Arc::new(sample_provider());
        let expander = expander(&provider);

        for depth in [0, 4] {
            let err = expander.expand("root", depth).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
        assert_eq!(provider.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_paper_id() {
        let provider = Arc::new(sample_provider());
        let err = expander(&provider).expand("   ", 1).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(provider.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_failing_child_becomes_leaf() {
        let provider = Arc::new(
            MockCitationProvider::new()
                .with_citation("root", "ok")
                .with_citation("root", "broken")
                .with_citation("ok", "deep")
                .with_citation("broken", "hidden")
                .with_failure("broken", MockFailure::Unavailable),
        );
        let graph = expander(&provider).expand("root", 2).await.unwrap();

        let broken = graph.node("broken").unwrap();
        assert!(broken.lookup_failed);
        assert!(!broken.expanded);
        assert!(graph.get_references("broken").is_empty());
        assert!(graph.node("hidden").is_none());

        assert_eq!(graph.node("deep").unwrap().depth, 2);
        assert_eq!(graph.node_count(), 4);
    }

    #[tokio::test]
    async fn test_unresolvable_child_becomes_leaf() {
        let provider = Arc::new(
            MockCitationProvider::new()
                .with_citation("root", "ok")
                .with_citation("root", "retracted")
                .with_citation("retracted", "hidden")
                .with_failure("retracted", MockFailure::NotFound),
        );
        let graph = expander(&provider).expand("root", 2).await.unwrap();

        let retracted = graph.node("retracted").unwrap();
        assert!(retracted.lookup_failed);
        assert!(!retracted.expanded);
        assert_eq!(retracted.depth, 1);
        assert!(graph.get_references("retracted").is_empty());
        assert!(graph.node("hidden").is_none());

        assert!(graph.node("ok").unwrap().expanded);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(provider.calls_for("retracted"), 1);
    }

    #[tokio::test]
    async fn test_root_failure_is_fatal() {
        let provider = Arc::new(
            MockCitationProvider::new()
                .with_citation("root", "a")
                .with_failure("root", MockFailure::Unavailable),
        );
        let err = expander(&provider).expand("root", 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);

        let missing = Arc::new(MockCitationProvider::new());
        let err = expander(&missing).expand("arxiv:0000.00000", 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PaperNotFound);
    }

    #[tokio::test]
    async fn test_depth_bound_and_minimum_depth() {
        for max_depth in 1..=3 {
            let provider = Arc::new(sample_provider());
            let graph = expander(&provider).expand("root", max_depth).await.unwrap();

            assert!(graph.nodes().iter().all(|n| n.depth <= max_depth));
            let roots: Vec<_> = graph.nodes_at_depth(0).map(|n| n.id.as_str()).collect();
            assert_eq!(roots, vec!["root"]);

            let ids: HashSet<_> = graph.nodes().iter().map(|n| n.id.as_str()).collect();
            assert_eq!(ids.len(), graph.node_count());
        }

        // d cites root directly, so it stays at depth 1 although c -> d is a longer path
        let provider = Arc::new(sample_provider());
        let graph = expander(&provider).expand("root", 3).await.unwrap();
        assert_eq!(graph.node("d").unwrap().depth, 1);
        assert_eq!(graph.node("c").unwrap().depth, 2);
        assert!(graph.edges().iter().any(|e| e.citing_paper_id == "c" && e.cited_paper_id == "d"));
    }

    #[tokio::test]
    async fn test_each_paper_looked_up_once() {
        let provider = Arc::new(sample_provider());
        let graph = expander(&provider).expand("root", 3).await.unwrap();

        for node in graph.nodes() {
            assert!(provider.calls_for(&node.id) <= 1, "{} looked up twice", node.id);
        }
        // Nodes at the depth bound are never expanded
        let expandable = graph.nodes().iter().filter(|n| n.depth < 3).count();
        assert_eq!(provider.total_calls(), expandable);
    }

    #[tokio::test]
    async fn test_influential_citations_sum() {
        let provider = Arc::new(sample_provider());

        let graph = expander(&provider).expand("root", 1).await.unwrap();
        // a, b and d are depth 1; the root's own count is excluded
        assert_eq!(graph.influential_citations(), 10 + 20 + 40);

        let graph = expander(&provider).expand("root", 2).await.unwrap();
        assert_eq!(graph.influential_citations(), 10 + 20 + 30 + 40);
    }

    #[tokio::test]
    async fn test_deterministic_order() {
        let provider = Arc::new(sample_provider().with_latency(Duration::from_millis(1)));
        let first = expander(&provider).expand("root", 3).await.unwrap();
        let second = expander(&provider).expand("root", 3).await.unwrap();

        assert_eq!(first.nodes(), second.nodes());
        assert_eq!(first.edges(), second.edges());

        // Citing papers are merged before references
        let order: Vec<_> = first.nodes_at_depth(1).map(|n| n.id.as_str()).collect();
        assert_eq!(order, vec!["d", "a", "b"]);
    }

    #[tokio::test]
    async fn test_canonical_alias_creates_no_duplicate() {
        let provider = Arc::new(
            MockCitationProvider::new()
                .with_canonical_id("arxiv:1706.03762", "s2:204e")
                .with_citation("arxiv:1706.03762", "arxiv:1810.04805")
                .with_citation("arxiv:1810.04805", "s2:204e"),
        );
        let graph = expander(&provider).expand("arxiv:1706.03762", 2).await.unwrap();

        assert_eq!(graph.node_count(), 2);
        assert!(graph.node("s2:204e").is_some());
        assert_eq!(graph.root_id(), "arxiv:1706.03762");
        assert_eq!(provider.calls_for("s2:204e"), 0);
        assert!(graph
            .edges()
            .iter()
            .any(|e| e.citing_paper_id == "arxiv:1810.04805" && e.cited_paper_id == "arxiv:1706.03762"));
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let provider = Arc::new(sample_provider().with_latency(Duration::from_millis(200)));
        let err = expander(&provider)
            .expand_with_deadline("root", 3, Duration::from_millis(50))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_concurrency_limit_of_zero_still_expands() {
        let provider = Arc::new(sample_provider());
        let expander = CitationGraphExpander::new(
            provider.clone(),
            ExpanderConfig {
                max_concurrent_lookups: 0,
            },
        );
        let graph = expander.expand("root", 2).await.unwrap();
        assert_eq!(graph.node_count(), 5);
    }
}
