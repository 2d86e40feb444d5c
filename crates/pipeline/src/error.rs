use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failures that stop a run. Unsupported repositories, scope fallbacks and
/// enrichment failures are reported through [`crate::PipelineOutcome`] and notes.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Graph error: {0}")]
    Graph(#[from] riskmap_graph::GraphError),
}

/// Failures of the optional LLM enrichment collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrichError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Backend timed out after {0} seconds")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("LLM call failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}
