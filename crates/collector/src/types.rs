use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence attached to detections, nodes, edges and findings.
///
/// Ordering follows the rank (`Low < Medium < High`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Numeric rank used when comparing stack probes (`low=1, medium=2, high=3`)
    pub fn rank(self) -> u8 {
        match self {
            Confidence::Low => 1,
            Confidence::Medium => 2,
            Confidence::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a supported repository stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StackId {
    #[serde(rename = "fastapi_pytest")]
    FastapiPytest,
    #[serde(rename = "unknown")]
    Unknown,
}

impl StackId {
    pub fn as_str(self) -> &'static str {
        match self {
            StackId::FastapiPytest => "fastapi_pytest",
            StackId::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PreflightStatus {
    Pass,
    Warn,
    Fail,
}

/// Outcome of a collector's pre-flight check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreflightResult {
    pub status: PreflightStatus,
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl PreflightResult {
    pub fn pass() -> Self {
        Self {
            status: PreflightStatus::Pass,
            reasons: Vec::new(),
        }
    }

    pub fn warn(reason: impl Into<String>) -> Self {
        Self {
            status: PreflightStatus::Warn,
            reasons: vec![reason.into()],
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            status: PreflightStatus::Fail,
            reasons: vec![reason.into()],
        }
    }

    pub fn is_fail(&self) -> bool {
        self.status == PreflightStatus::Fail
    }
}

/// A declared or handled edge of a state machine.
///
/// Kept as a flat tuple so declared and handled sets diff by `(source, target)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionSpec {
    /// Mapping variable name (declared) or enclosing function name (handled)
    pub machine: String,
    pub source: String,
    pub target: String,
    /// Repository-relative file path
    pub source_ref: String,
}

impl TransitionSpec {
    pub fn new(
        machine: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        source_ref: impl Into<String>,
    ) -> Self {
        Self {
            machine: machine.into(),
            source: source.into(),
            target: target.into(),
            source_ref: source_ref.into(),
        }
    }

    pub fn pair(&self) -> (&str, &str) {
        (&self.source, &self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_rank_matches_ordering() {
        assert!(Confidence::High.rank() > Confidence::Medium.rank());
        assert!(Confidence::Medium.rank() > Confidence::Low.rank());
        assert!(Confidence::High > Confidence::Low);
    }

    #[test]
    fn stack_id_serializes_to_snake_names() {
        let json = serde_json::to_string(&StackId::FastapiPytest).unwrap();
        assert_eq!(json, "\"fastapi_pytest\"");
        let back: StackId = serde_json::from_str("\"unknown\"").unwrap();
        assert_eq!(back, StackId::Unknown);
    }

    #[test]
    fn preflight_status_is_uppercase_on_the_wire() {
        let json = serde_json::to_value(PreflightResult::warn("no pytest")).unwrap();
        assert_eq!(json["status"], "WARN");
        assert_eq!(json["reasons"][0], "no pytest");
    }
}
