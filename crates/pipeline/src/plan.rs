use riskmap_rules::{FindingsReport, Severity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecommendation {
    pub id: String,
    pub title: String,
    pub priority: Severity,
    pub finding_id: String,
    pub source_ref: String,
    pub recommendation: String,
    #[serde(default)]
    pub generated_without_llm: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPlan {
    pub items: Vec<TestRecommendation>,
    #[serde(default)]
    pub generated_without_llm: bool,
}

/// One recommendation per finding, in finding order
pub fn deterministic_plan(findings: &FindingsReport) -> TestPlan {
    TestPlan {
        items: findings
            .findings
            .iter()
            .map(|finding| TestRecommendation {
                id: format!("test-plan:{}", finding.id),
                title: format!("Cover risk: {}", finding.rule_id),
                priority: finding.severity,
                finding_id: finding.id.clone(),
                source_ref: finding.source_ref.clone(),
                recommendation: finding.recommendation.clone(),
                generated_without_llm: true,
            })
            .collect(),
        generated_without_llm: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskmap_collector::Confidence;
    use riskmap_rules::Finding;

    #[test]
    fn plan_mirrors_findings() {
        let report = FindingsReport::new(
            vec![Finding {
                id: "critical_path_no_tests:api:create_order".into(),
                rule_id: "critical_path_no_tests".into(),
                title: "t".into(),
                description: "d".into(),
                severity: Severity::High,
                confidence: Confidence::Medium,
                evidence: "e".into(),
                source_ref: "app/api.py".into(),
                suppression_key: "critical_path_no_tests:api:create_order".into(),
                recommendation: "Add tests".into(),
                generated_without_llm: true,
            }],
            true,
        );
        let plan = deterministic_plan(&report);
        assert_eq!(plan.items.len(), 1);
        let item = &plan.items[0];
        assert_eq!(item.id, "test-plan:critical_path_no_tests:api:create_order");
        assert_eq!(item.title, "Cover risk: critical_path_no_tests");
        assert_eq!(item.priority, Severity::High);
        assert_eq!(item.recommendation, "Add tests");
        assert!(plan.generated_without_llm);
    }
}
