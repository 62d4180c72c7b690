//! Citation graph representation
//!
//! Holds the nodes and edges produced by one expansion run

use serde::{Deserialize, Serialize, Serializer};
use std::collections::{HashMap, HashSet};

use citeforge_common::PaperRef;

/// Paper discovered during expansion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperNode {
    /// Provider-qualified identifier
    pub id: String,

    pub title: Option<String>,

    pub citation_count: u64,

    pub year: Option<i32>,

    /// Hops from the root along the shortest discovery path
    pub depth: u32,

    /// Provider was queried for this node's citations
    #[serde(default)]
    pub expanded: bool,

    /// Provider lookup failed; the node is kept as a leaf
    #[serde(default)]
    pub lookup_failed: bool,
}

impl PaperNode {
    /// Build a node from a provider reference
    pub fn from_ref(paper: &PaperRef, depth: u32) -> Self {
        Self {
            id: paper.id.clone(),
            title: paper.title.clone(),
            citation_count: paper.citation_count,
            year: paper.year,
            depth,
            expanded: false,
            lookup_failed: false,
        }
    }
}

/// Edge in the citation graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CitationEdge {
    /// Citing paper ID
    pub citing_paper_id: String,

    /// Cited paper ID
    pub cited_paper_id: String,
}

/// Citation graph produced by one expansion
#[derive(Debug, Clone)]
pub struct CitationGraph {
    root_id: String,

    depth_requested: u32,

    /// Nodes in discovery order; the root is always first
    nodes: Vec<PaperNode>,

    /// Identifier or alias -> position in `nodes`
    index: HashMap<String, usize>,

    /// Edges in observation order
    edges: Vec<CitationEdge>,

    edge_set: HashSet<(usize, usize)>,

    /// Adjacency list: node -> nodes it cites
    outgoing: HashMap<usize, Vec<usize>>,

    /// Reverse adjacency: node -> nodes citing it
    incoming: HashMap<usize, Vec<usize>>,
}

impl CitationGraph {
    /// Create a graph holding only the root.
    ///
    /// The root keeps the identifier it was requested with, whatever id the
    /// provider reports for it.
    pub fn new(root: PaperNode, depth_requested: u32) -> Self {
        let root = PaperNode { depth: 0, ..root };
        let root_id = root.id.clone();

        let mut index = HashMap::new();
        index.insert(root_id.clone(), 0);

        Self {
            root_id,
            depth_requested,
            nodes: vec![root],
            index,
            edges: Vec::new(),
            edge_set: HashSet::new(),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn depth_requested(&self) -> u32 {
        self.depth_requested
    }

    /// Check whether an identifier (or alias) is already in the graph
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Resolve an identifier or alias to the node's own identifier
    pub fn resolve(&self, id: &str) -> Option<&str> {
        self.index.get(id).map(|&i| self.nodes[i].id.as_str())
    }

    /// Register `alias` as another name of an existing node.
    ///
    /// Returns false if the node is unknown or the alias already names a node.
    pub fn add_alias(&mut self, alias: &str, id: &str) -> bool {
        if self.index.contains_key(alias) {
            return false;
        }
        match self.index.get(id).copied() {
            Some(position) => {
                self.index.insert(alias.to_string(), position);
                true
            }
            None => false,
        }
    }

    /// Insert a node at its discovery depth.
    ///
    /// First insertion wins: returns false and leaves the graph unchanged if
    /// the identifier is already present.
    pub fn insert_node(&mut self, node: PaperNode) -> bool {
        if self.index.contains_key(&node.id) {
            return false;
        }
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }

    /// Add an edge between two nodes already in the graph.
    ///
    /// Returns false for unknown endpoints, self-citations and duplicates.
    pub fn add_edge(&mut self, citing: &str, cited: &str) -> bool {
        let (Some(&from), Some(&to)) = (self.index.get(citing), self.index.get(cited)) else {
            return false;
        };
        if from == to || !self.edge_set.insert((from, to)) {
            return false;
        }

        self.edges.push(CitationEdge {
            citing_paper_id: self.nodes[from].id.clone(),
            cited_paper_id: self.nodes[to].id.clone(),
        });
        self.outgoing.entry(from).or_default().push(to);
        self.incoming.entry(to).or_default().push(from);
        true
    }

    /// Get a node by identifier or alias
    pub fn node(&self, id: &str) -> Option<&PaperNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut PaperNode> {
        match self.index.get(id) {
            Some(&i) => self.nodes.get_mut(i),
            None => None,
        }
    }

    /// All nodes in discovery order
    pub fn nodes(&self) -> &[PaperNode] {
        &self.nodes
    }

    /// All edges in observation order
    pub fn edges(&self) -> &[CitationEdge] {
        &self.edges
    }

    /// Nodes discovered at exactly `depth`
    pub fn nodes_at_depth(&self, depth: u32) -> impl Iterator<Item = &PaperNode> {
        self.nodes.iter().filter(move |n| n.depth == depth)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Get papers cited by this paper (within the graph)
    pub fn get_references(&self, id: &str) -> Vec<&str> {
        self.neighbors(&self.outgoing, id)
    }

    /// Get papers citing this paper (within the graph)
    pub fn get_citations(&self, id: &str) -> Vec<&str> {
        self.neighbors(&self.incoming, id)
    }

    fn neighbors(&self, adjacency: &HashMap<usize, Vec<usize>>, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .and_then(|i| adjacency.get(i))
            .map(|list| list.iter().map(|&n| self.nodes[n].id.as_str()).collect())
            .unwrap_or_default()
    }

    /// Citation-count mass of every non-root node
    pub fn influential_citations(&self) -> u64 {
        self.nodes
            .iter()
            .filter(|n| n.depth >= 1)
            .map(|n| n.citation_count)
            .sum()
    }
}

/// Wire shape of a graph returned to tool callers
#[derive(Serialize)]
struct GraphView<'a> {
    root_id: &'a str,
    depth_requested: u32,
    nodes: &'a [PaperNode],
    edges: &'a [CitationEdge],
    influential_citations: u64,
    total_nodes: usize,
    total_edges: usize,
}

impl Serialize for CitationGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        GraphView {
            root_id: &self.root_id,
            depth_requested: self.depth_requested,
            nodes: &self.nodes,
            edges: &self.edges,
            influential_citations: self.influential_citations(),
            total_nodes: self.node_count(),
            total_edges: self.edge_count(),
        }
        .serialize(serializer)
    }
}
