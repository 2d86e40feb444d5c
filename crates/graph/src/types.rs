use crate::error::{GraphError, Result};
use riskmap_collector::{Confidence, TransitionSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "API")]
    Api,
    Entity,
    TestCase,
    State,
    Transition,
}

impl NodeType {
    /// Id prefix for nodes of this type
    pub fn prefix(self) -> &'static str {
        match self {
            NodeType::Api => "api",
            NodeType::Entity => "entity",
            NodeType::TestCase => "test",
            NodeType::State => "state",
            NodeType::Transition => "transition",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Api => "API",
            NodeType::Entity => "Entity",
            NodeType::TestCase => "TestCase",
            NodeType::State => "State",
            NodeType::Transition => "Transition",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of relationship between nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// TestCase → API (heuristic)
    CoveredBy,
    /// API → Entity
    ValidatedBy,
    /// State → State
    TransitionsTo,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::CoveredBy => "covered_by",
            EdgeType::ValidatedBy => "validated_by",
            EdgeType::TransitionsTo => "transitions_to",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Domain,
    Infrastructure,
    Qa,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    pub layer: Layer,
    /// Repository-relative path
    pub source_ref: String,
    #[serde(default)]
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub source_ref: String,
    pub evidence: String,
    #[serde(default)]
    pub confidence: Confidence,
}

impl Edge {
    pub fn edge_id(edge_type: EdgeType, source: &str, target: &str) -> String {
        format!("edge:{edge_type}:{source}->{target}")
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source_node_id == node_id || self.target_node_id == node_id
    }
}

/// Risk graph of one repository.
///
/// Node ids are unique; insertion order is kept for stable output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub declared_transitions: Vec<TransitionSpec>,
    #[serde(default)]
    pub handled_transitions: Vec<TransitionSpec>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node unless its id is already present. Returns whether it was added.
    pub fn push_node(&mut self, node: Node) -> bool {
        if self.contains_node(&node.id) {
            return false;
        }
        self.nodes.push(node);
        true
    }

    /// Add an edge unless an edge with the same id exists
    pub fn push_edge(&mut self, edge: Edge) -> bool {
        if self.edges.iter().any(|e| e.id == edge.id) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.node_type == node_type)
    }

    pub fn edges_of_type(&self, edge_type: EdgeType) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.edge_type == edge_type)
    }

    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    pub fn edge_ids(&self) -> HashSet<&str> {
        self.edges.iter().map(|e| e.id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reconstruct a graph from its serialized form
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        check_nodes_list(&value)?;
        Ok(serde_json::from_value(value)?)
    }
}

fn check_nodes_list(value: &serde_json::Value) -> Result<usize> {
    let object = value
        .as_object()
        .ok_or_else(|| GraphError::InvalidDocument("top level is not an object".to_string()))?;
    match object.get("nodes") {
        Some(serde_json::Value::Array(nodes)) => Ok(nodes.len()),
        Some(_) => Err(GraphError::InvalidDocument(
            "`nodes` is not a list".to_string(),
        )),
        None => Err(GraphError::InvalidDocument("missing `nodes`".to_string())),
    }
}

/// Shape check for a graph document: an object with a list-typed `nodes` field.
/// Returns the number of listed nodes.
pub fn validate_graph_document(text: &str) -> Result<usize> {
    if text.trim().is_empty() {
        return Err(GraphError::InvalidDocument("document is empty".to_string()));
    }
    let value: serde_json::Value = serde_json::from_str(text)?;
    check_nodes_list(&value)
}
