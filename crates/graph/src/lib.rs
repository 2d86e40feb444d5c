//! # Riskmap Graph
//!
//! Typed risk graph built from a collected artifact bundle.
//!
//! ## Architecture
//!
//! ```text
//! ArtifactBundle
//!     │
//!     ├──> Graph Builder
//!     │      ├─ Nodes: Entity, API, TestCase, State, Transition
//!     │      ├─ validated_by  (API → Entity, high)
//!     │      ├─ covered_by    (TestCase → API, token-subset heuristic, medium)
//!     │      └─ transitions_to (State → State, high)
//!     │
//!     ├──> Graph Index (petgraph)
//!     │      └─ incoming edges / one-hop neighbours
//!     │
//!     └──> Slice by changed files → impacted subgraph
//! ```

mod builder;
pub mod coverage;
mod error;
mod ids;
mod index;
mod slice;
mod types;

pub use builder::{build_graph, low_confidence_ratio};
pub use error::{GraphError, Result};
pub use ids::IdAllocator;
pub use index::GraphIndex;
pub use riskmap_collector::{Confidence, TransitionSpec};
pub use slice::slice_by_files;
pub use types::{validate_graph_document, Edge, EdgeType, Graph, Layer, Node, NodeType};
