use riskmap_collector::Confidence;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Finding severity, ordered `Low < Medium < High < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!(
                "unknown severity '{other}' (expected critical, high, medium or low)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub rule_id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub confidence: Confidence,
    pub evidence: String,
    /// Repository-relative path
    pub source_ref: String,
    pub suppression_key: String,
    pub recommendation: String,
    #[serde(default)]
    pub generated_without_llm: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingsReport {
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub generated_without_llm: bool,
}

impl FindingsReport {
    pub fn new(findings: Vec<Finding>, generated_without_llm: bool) -> Self {
        Self {
            findings,
            generated_without_llm,
        }
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Findings per severity, most severe first
    pub fn severity_counts(&self) -> Vec<(Severity, usize)> {
        Severity::ALL
            .iter()
            .map(|&severity| {
                let count = self
                    .findings
                    .iter()
                    .filter(|f| f.severity == severity)
                    .count();
                (severity, count)
            })
            .collect()
    }

    pub fn any_at_least(&self, threshold: Severity) -> bool {
        self.findings.iter().any(|f| f.severity >= threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_by_impact() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Severity>(), Ok(Severity::High));
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn llm_payload_without_flag_deserializes() {
        let finding: Finding = serde_json::from_value(serde_json::json!({
            "id": "x",
            "rule_id": "r",
            "title": "t",
            "description": "d",
            "severity": "medium",
            "confidence": "low",
            "evidence": "e",
            "source_ref": "app.py",
            "suppression_key": "x",
            "recommendation": "fix",
        }))
        .unwrap();
        assert!(!finding.generated_without_llm);
        assert_eq!(finding.severity, Severity::Medium);
    }
}
