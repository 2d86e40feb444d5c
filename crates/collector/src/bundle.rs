use crate::types::TransitionSpec;
use serde::{Deserialize, Serialize};

/// Write endpoint registered on a router (`post`, `put`, `patch`, `delete`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointRef {
    pub file: String,
    pub name: String,
    pub method: String,
}

/// Binding between an endpoint function and a schema class it accepts or returns
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointModel {
    pub file: String,
    pub endpoint: String,
    pub model: String,
}

/// Schema class declaration (request/response model)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaRef {
    pub file: String,
    pub name: String,
}

/// Test function found in a test file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestCaseRef {
    pub file: String,
    pub name: String,
}

/// Everything a collector extracts from one repository.
///
/// Every path is repository-relative with `/` separators. Created fresh per run
/// and consumed by the graph builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub all_files: Vec<String>,
    pub python_files: Vec<String>,
    pub write_endpoints: Vec<EndpointRef>,
    pub endpoint_models: Vec<EndpointModel>,
    pub schema_models: Vec<SchemaRef>,
    pub declared_transitions: Vec<TransitionSpec>,
    pub handled_transitions: Vec<TransitionSpec>,
    pub test_files: Vec<String>,
    pub test_cases: Vec<TestCaseRef>,
}

impl ArtifactBundle {
    pub fn is_empty(&self) -> bool {
        self.write_endpoints.is_empty()
            && self.schema_models.is_empty()
            && self.declared_transitions.is_empty()
            && self.handled_transitions.is_empty()
            && self.test_cases.is_empty()
    }

    /// Whether `(file, endpoint)` is a recorded write endpoint
    pub fn has_endpoint(&self, file: &str, name: &str) -> bool {
        self.write_endpoints
            .iter()
            .any(|e| e.file == file && e.name == name)
    }
}
