use crate::finding::{Finding, FindingsReport, Severity};
use riskmap_collector::Confidence;
use riskmap_graph::{EdgeType, Graph, GraphIndex, NodeType};
use std::collections::BTreeSet;

pub const CRITICAL_PATH_NO_TESTS: &str = "critical_path_no_tests";
pub const MISSING_TRANSITION_HANDLER: &str = "missing_transition_handler";

/// Run every rule over `graph`. Each rule orders its own findings; there is no
/// ordering across rules.
pub fn evaluate(graph: &Graph) -> Vec<Finding> {
    let mut findings = critical_path_no_tests(graph);
    findings.extend(missing_transition_handler(graph));
    log::info!("Rules produced {} findings", findings.len());
    findings
}

/// Deterministic findings report
pub fn run_rules(graph: &Graph) -> FindingsReport {
    FindingsReport::new(evaluate(graph), true)
}

fn critical_path_no_tests(graph: &Graph) -> Vec<Finding> {
    let index = GraphIndex::new(graph);
    graph
        .nodes_of_type(NodeType::Api)
        .filter(|api| !index.has_incoming(&api.id, EdgeType::CoveredBy))
        .map(|api| {
            let id = format!("{CRITICAL_PATH_NO_TESTS}:{}", api.id);
            Finding {
                suppression_key: id.clone(),
                id,
                rule_id: CRITICAL_PATH_NO_TESTS.to_string(),
                title: format!("Write endpoint '{}' has no matching tests", api.name),
                description: "Critical path endpoint appears uncovered by tests in current graph."
                    .to_string(),
                severity: Severity::High,
                confidence: Confidence::Medium,
                evidence: format!("No covered_by edge found for {}", api.id),
                source_ref: api.source_ref.clone(),
                recommendation: format!(
                    "Add API/service tests for endpoint '{}', including success and error paths.",
                    api.name
                ),
                generated_without_llm: false,
            }
        })
        .collect()
}

fn missing_transition_handler(graph: &Graph) -> Vec<Finding> {
    let declared: BTreeSet<(&str, &str)> =
        graph.declared_transitions.iter().map(|t| t.pair()).collect();
    let handled: BTreeSet<(&str, &str)> =
        graph.handled_transitions.iter().map(|t| t.pair()).collect();

    declared
        .difference(&handled)
        .map(|&(source, target)| {
            let source_ref = graph
                .declared_transitions
                .iter()
                .find(|t| t.pair() == (source, target))
                .map_or("unknown", |t| t.source_ref.as_str());
            let id = format!("{MISSING_TRANSITION_HANDLER}:{source}->{target}");
            Finding {
                suppression_key: id.clone(),
                id,
                rule_id: MISSING_TRANSITION_HANDLER.to_string(),
                title: format!("Declared transition '{source} -> {target}' has no handler"),
                description:
                    "A declared transition exists but no matching status-change handler was found."
                        .to_string(),
                severity: Severity::Medium,
                confidence: Confidence::Medium,
                evidence: format!(
                    "Declared transitions include {source}->{target}; handled transitions do not."
                ),
                source_ref: source_ref.to_string(),
                recommendation: format!(
                    "Implement handler logic for transition '{source} -> {target}' or remove stale declaration."
                ),
                generated_without_llm: false,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use riskmap_collector::{ArtifactBundle, EndpointRef, TestCaseRef, TransitionSpec};
    use riskmap_graph::build_graph;

    fn endpoint(name: &str) -> EndpointRef {
        EndpointRef {
            file: "app/api.py".into(),
            name: name.into(),
            method: "post".into(),
        }
    }

    fn transition(source: &str, target: &str) -> TransitionSpec {
        TransitionSpec::new("ORDER_TRANSITIONS", source, target, "app/api.py")
    }

    #[test]
    fn empty_graph_has_no_findings() {
        assert!(evaluate(&Graph::new()).is_empty());
    }

    #[test]
    fn uncovered_endpoint_is_high_severity() {
        let bundle = ArtifactBundle {
            write_endpoints: vec![endpoint("create_order")],
            ..Default::default()
        };
        let findings = evaluate(&build_graph(&bundle));
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.suppression_key, "critical_path_no_tests:api:create_order");
        assert_eq!(finding.evidence, "No covered_by edge found for api:create_order");
        assert_eq!(finding.source_ref, "app/api.py");
    }

    #[test]
    fn covered_endpoint_has_no_finding() {
        let bundle = ArtifactBundle {
            write_endpoints: vec![endpoint("create_order"), endpoint("pay_order")],
            test_cases: vec![TestCaseRef {
                file: "tests/test_api.py".into(),
                name: "test_create_order".into(),
            }],
            ..Default::default()
        };
        let ids: Vec<String> = evaluate(&build_graph(&bundle))
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec!["critical_path_no_tests:api:pay_order"]);
    }

    #[test]
    fn unhandled_declared_transition_is_reported() {
        let bundle = ArtifactBundle {
            declared_transitions: vec![transition("pending", "paid"), transition("pending", "cancelled")],
            handled_transitions: vec![TransitionSpec::new("pay", "pending", "paid", "app/api.py")],
            ..Default::default()
        };
        let findings = evaluate(&build_graph(&bundle));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].id, "missing_transition_handler:pending->cancelled");
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[test]
    fn missing_handlers_sorted_by_pair() {
        let bundle = ArtifactBundle {
            declared_transitions: vec![
                transition("shipped", "delivered"),
                transition("pending", "paid"),
                transition("pending", "cancelled"),
            ],
            ..Default::default()
        };
        let ids: Vec<String> = evaluate(&build_graph(&bundle))
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(
            ids,
            vec![
                "missing_transition_handler:pending->cancelled",
                "missing_transition_handler:pending->paid",
                "missing_transition_handler:shipped->delivered",
            ]
        );
    }

    #[test]
    fn handling_a_pair_removes_exactly_that_finding() {
        let mut bundle = ArtifactBundle {
            declared_transitions: vec![transition("a", "b"), transition("b", "c")],
            ..Default::default()
        };
        let before = evaluate(&build_graph(&bundle)).len();
        bundle
            .handled_transitions
            .push(TransitionSpec::new("handler", "a", "b", "app/other.py"));
        let after: Vec<String> = evaluate(&build_graph(&bundle))
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(before, 2);
        assert_eq!(after, vec!["missing_transition_handler:b->c"]);
    }

    #[test]
    fn both_rules_run_together() {
        let bundle = ArtifactBundle {
            write_endpoints: vec![endpoint("create_order")],
            declared_transitions: vec![transition("pending", "paid")],
            ..Default::default()
        };
        let report = run_rules(&build_graph(&bundle));
        assert!(report.generated_without_llm);
        let rules: BTreeSet<&str> = report.findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert_eq!(
            rules,
            BTreeSet::from([CRITICAL_PATH_NO_TESTS, MISSING_TRANSITION_HANDLER])
        );
    }
}
