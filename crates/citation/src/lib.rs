//! CiteForge Citation Graph
//!
//! Bounded breadth-first expansion of a paper's citation neighbourhood:
//! - Graph model with first-discovery depths and deduplicated edges
//! - Level-by-level expansion with concurrent lookups per level
//! - Influence summary over the expanded neighbourhood

mod expander;
mod graph;
pub mod mock;

pub use expander::{CitationGraphExpander, ExpanderConfig};
pub use graph::{CitationEdge, CitationGraph, PaperNode};
