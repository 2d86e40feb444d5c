use crate::error::{GraphError, Result};
use crate::types::{Edge, EdgeType, Graph, Node};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

/// Adjacency view over a [`Graph`] for neighbourhood queries.
///
/// Edges whose endpoints are missing from the node list are not indexed.
pub struct GraphIndex<'g> {
    graph: &'g Graph,
    inner: DiGraph<&'g Node, &'g Edge>,
    by_id: HashMap<&'g str, NodeIndex>,
}

impl<'g> GraphIndex<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        let mut inner = DiGraph::with_capacity(graph.nodes.len(), graph.edges.len());
        let mut by_id = HashMap::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            let idx = inner.add_node(node);
            by_id.insert(node.id.as_str(), idx);
        }

        let mut dangling = 0usize;
        for edge in &graph.edges {
            let source = by_id.get(edge.source_node_id.as_str());
            let target = by_id.get(edge.target_node_id.as_str());
            match (source, target) {
                (Some(&s), Some(&t)) => {
                    inner.add_edge(s, t, edge);
                }
                _ => dangling += 1,
            }
        }
        if dangling > 0 {
            log::debug!("Skipped {dangling} edges with missing endpoints");
        }

        Self {
            graph,
            inner,
            by_id,
        }
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    fn index_of(&self, id: &str) -> Result<NodeIndex> {
        self.by_id
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    /// Edges of `edge_type` pointing at `id`
    pub fn incoming(&self, id: &str, edge_type: EdgeType) -> Result<Vec<&'g Edge>> {
        let idx = self.index_of(id)?;
        Ok(self
            .inner
            .edges_directed(idx, Direction::Incoming)
            .map(|e| *e.weight())
            .filter(|e| e.edge_type == edge_type)
            .collect())
    }

    pub fn has_incoming(&self, id: &str, edge_type: EdgeType) -> bool {
        self.incoming(id, edge_type)
            .map(|edges| !edges.is_empty())
            .unwrap_or(false)
    }

    /// Ids of nodes one edge away from `id`, in either direction
    pub fn neighbours(&self, id: &str) -> Result<BTreeSet<&'g str>> {
        let idx = self.index_of(id)?;
        Ok(self
            .inner
            .neighbors_undirected(idx)
            .filter_map(|n| self.inner.node_weight(n).copied())
            .map(|node| node.id.as_str())
            .collect())
    }
}
