use thiserror::Error;

/// Result type for collector operations
pub type Result<T> = std::result::Result<T, CollectorError>;

/// Errors raised while preparing a collection run.
///
/// Per-file failures never surface here: unreadable or malformed files are
/// skipped by the scanner and the extractors.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Tree-sitter could not be configured for Python
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Source file is not valid UTF-8
    #[error("Source is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("{0}")]
    Other(String),
}

impl CollectorError {
    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }
}
