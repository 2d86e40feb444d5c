use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Graph document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Parsed, but not shaped like a graph (e.g. `nodes` is not a list)
    #[error("Invalid graph document: {0}")]
    InvalidDocument(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),
}
