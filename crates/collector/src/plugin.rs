use crate::bundle::ArtifactBundle;
use crate::fastapi::FastApiCollector;
use crate::signals::FastApiSignals;
use crate::types::{Confidence, PreflightResult, StackId};
use serde::Serialize;
use std::path::Path;

/// Plugin-specific data computed by `probe` and reused by `preflight`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeData {
    FastApi(FastApiSignals),
}

/// A plugin's claim that it recognises a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub stack_id: StackId,
    pub confidence: Confidence,
    pub reasons: Vec<String>,
    pub probe_data: ProbeData,
}

/// Winning stack for a repository, as recorded in reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackDetection {
    pub stack_id: StackId,
    pub confidence: Confidence,
    pub reasons: Vec<String>,
    #[serde(skip)]
    pub probe_data: Option<ProbeData>,
}

impl StackDetection {
    pub fn unknown() -> Self {
        Self {
            stack_id: StackId::Unknown,
            confidence: Confidence::Low,
            reasons: vec!["No supported stack signals were detected.".to_string()],
            probe_data: None,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.stack_id != StackId::Unknown
    }
}

impl From<ProbeResult> for StackDetection {
    fn from(probe: ProbeResult) -> Self {
        Self {
            stack_id: probe.stack_id,
            confidence: probe.confidence,
            reasons: probe.reasons,
            probe_data: Some(probe.probe_data),
        }
    }
}

/// Capabilities every stack collector provides
pub trait StackCollector {
    fn stack_id(&self) -> StackId;

    /// `None` when the repository shows no signals for this stack
    fn probe(&self, repo_root: &Path) -> Option<ProbeResult>;

    /// Whether collection is worth running; reuses `probe_data` when given
    fn preflight(&self, repo_root: &Path, probe_data: Option<&ProbeData>) -> PreflightResult;

    fn collect(&self, repo_root: &Path) -> ArtifactBundle;
}

/// Closed set of built-in collectors
#[derive(Debug, Clone)]
pub enum CollectorPlugin {
    FastApi(FastApiCollector),
}

impl StackCollector for CollectorPlugin {
    fn stack_id(&self) -> StackId {
        match self {
            CollectorPlugin::FastApi(plugin) => plugin.stack_id(),
        }
    }

    fn probe(&self, repo_root: &Path) -> Option<ProbeResult> {
        match self {
            CollectorPlugin::FastApi(plugin) => plugin.probe(repo_root),
        }
    }

    fn preflight(&self, repo_root: &Path, probe_data: Option<&ProbeData>) -> PreflightResult {
        match self {
            CollectorPlugin::FastApi(plugin) => plugin.preflight(repo_root, probe_data),
        }
    }

    fn collect(&self, repo_root: &Path) -> ArtifactBundle {
        match self {
            CollectorPlugin::FastApi(plugin) => plugin.collect(repo_root),
        }
    }
}
