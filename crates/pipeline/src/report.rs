use crate::context::DEFAULT_SUPPRESS_FILE;
use crate::run::PipelineResult;
use riskmap_rules::{Finding, Severity};
use std::fmt::Write as _;

const TOP_RISKS: usize = 5;

fn severity_rank(severity: Severity) -> usize {
    Severity::ALL
        .iter()
        .position(|&s| s == severity)
        .unwrap_or(Severity::ALL.len())
}

/// Most severe first, ties by rule id
fn top_risks(findings: &[Finding]) -> Vec<&Finding> {
    let mut sorted: Vec<&Finding> = findings.iter().collect();
    sorted.sort_by(|a, b| {
        severity_rank(a.severity)
            .cmp(&severity_rank(b.severity))
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });
    sorted.truncate(TOP_RISKS);
    sorted
}

fn finish(lines: Vec<String>) -> String {
    let mut text = lines.join("\n").trim().to_string();
    text.push('\n');
    text
}

pub fn render_report_md(result: &PipelineResult) -> String {
    let mut lines: Vec<String> = vec![
        "# Risk Analysis Report".into(),
        String::new(),
        "## Summary".into(),
        String::new(),
        "| Severity | Count |".into(),
        "|---|---:|".into(),
    ];
    for (severity, count) in result.findings.severity_counts() {
        lines.push(format!("| {severity} | {count} |"));
    }

    lines.push(String::new());
    lines.push("## Run Metadata".into());
    lines.push(String::new());
    lines.push(format!("- Stack: `{}`", result.stack.stack_id));
    lines.push(format!(
        "- Pre-flight status: `{}`",
        preflight_label(result)
    ));
    for reason in &result.preflight.reasons {
        lines.push(format!("- Pre-flight note: {reason}"));
    }
    lines.push(format!("- analysis_scope: `{}`", result.analysis_scope));
    lines.push(format!(
        "- Data Quality (low-confidence ratio): `{:.2}%`",
        result.data_quality_low_confidence_ratio * 100.0
    ));
    lines.push(format!(
        "- Graph Statistics: `{} nodes`, `{} edges`",
        result.graph.nodes.len(),
        result.graph.edges.len()
    ));
    if let Some(scoped) = &result.scoped_graph {
        lines.push(format!(
            "- Impacted subgraph: `{} nodes`, `{} edges`",
            scoped.nodes.len(),
            scoped.edges.len()
        ));
    }
    lines.push(format!("- Suppressed findings: `{}`", result.suppressed_count));
    for note in &result.notes {
        lines.push(format!("- Note: {note}"));
    }

    lines.push(String::new());
    lines.push("## Top Risks".into());
    lines.push(String::new());
    if result.findings.is_empty() {
        lines.push("No risks detected in current scope.".into());
    } else {
        for finding in top_risks(&result.findings.findings) {
            lines.push(format!("### {}", finding.title));
            lines.push(format!("- Severity: `{}`", finding.severity));
            lines.push(format!("- Confidence: `{}`", finding.confidence));
            lines.push(format!("- Source: `{}`", finding.source_ref));
            lines.push(format!("- Why: {}", finding.description));
            lines.push(format!("- Evidence: {}", finding.evidence));
            lines.push(format!("- Action: {}", finding.recommendation));
            lines.push(format!("- Suppress key: `{}`", finding.suppression_key));
            lines.push(format!("- To ignore, add to `{DEFAULT_SUPPRESS_FILE}`:"));
            lines.push(format!("  - `key: \"{}\"`", finding.suppression_key));
            lines.push(String::new());
        }
    }

    lines.push("## Findings".into());
    lines.push(String::new());
    for finding in &result.findings.findings {
        lines.push(format!(
            "- [{}] `{}` at `{}`: {}",
            finding.severity, finding.rule_id, finding.source_ref, finding.title
        ));
    }

    lines.push(String::new());
    lines.push("## Recommended Test Strategy".into());
    lines.push(String::new());
    if result.test_plan.items.is_empty() {
        lines.push("No additional test recommendations.".into());
    } else {
        for item in &result.test_plan.items {
            lines.push(format!(
                "- [{}] {} (source: `{}`)",
                item.priority, item.recommendation, item.source_ref
            ));
        }
    }

    finish(lines)
}

fn preflight_label(result: &PipelineResult) -> &'static str {
    match result.preflight.status {
        riskmap_collector::PreflightStatus::Pass => "PASS",
        riskmap_collector::PreflightStatus::Warn => "WARN",
        riskmap_collector::PreflightStatus::Fail => "FAIL",
    }
}

/// Compact summary for pull-request comments
pub fn render_pr_summary_md(result: &PipelineResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Risk Summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "- analysis_scope: `{}`", result.analysis_scope);
    let _ = writeln!(out, "- Changed files: {}", result.changed_files.len());
    let counts = result
        .findings
        .severity_counts()
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .map(|(severity, n)| format!("{n} {severity}"))
        .collect::<Vec<_>>();
    let _ = writeln!(
        out,
        "- Findings: {}{}",
        result.findings.len(),
        if counts.is_empty() {
            String::new()
        } else {
            format!(" ({})", counts.join(", "))
        }
    );
    if result.suppressed_count > 0 {
        let _ = writeln!(out, "- Suppressed: {}", result.suppressed_count);
    }
    let _ = writeln!(out);

    if result.findings.is_empty() {
        let _ = writeln!(out, "No risks detected in current scope.");
    } else {
        for finding in top_risks(&result.findings.findings) {
            let _ = writeln!(
                out,
                "- [{}] {} (`{}`)",
                finding.severity, finding.title, finding.source_ref
            );
        }
        if result.findings.len() > TOP_RISKS {
            let _ = writeln!(
                out,
                "- ... and {} more in report.md",
                result.findings.len() - TOP_RISKS
            );
        }
    }

    if !result.notes.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Notes:");
        for note in &result.notes {
            let _ = writeln!(out, "- {note}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::deterministic_plan;
    use crate::scope::AnalysisScope;
    use pretty_assertions::assert_eq;
    use riskmap_collector::{Confidence, PreflightResult, StackDetection};
    use riskmap_graph::Graph;
    use riskmap_rules::FindingsReport;

    fn finding(rule: &str, node: &str, severity: Severity) -> Finding {
        Finding {
            id: format!("{rule}:{node}"),
            rule_id: rule.into(),
            title: format!("{rule} on {node}"),
            description: "why".into(),
            severity,
            confidence: Confidence::Medium,
            evidence: "evidence".into(),
            source_ref: "app/api.py".into(),
            suppression_key: format!("{rule}:{node}"),
            recommendation: format!("Cover {node}"),
            generated_without_llm: true,
        }
    }

    fn result(findings: Vec<Finding>) -> PipelineResult {
        let findings = FindingsReport::new(findings, true);
        PipelineResult {
            stack: StackDetection::unknown(),
            preflight: PreflightResult::warn("pytest missing"),
            analysis_scope: AnalysisScope::Full,
            notes: vec!["LLM disabled by --no-llm.".into()],
            data_quality_low_confidence_ratio: 0.125,
            graph: Graph::default(),
            scoped_graph: None,
            findings_raw: findings.clone(),
            test_plan: deterministic_plan(&findings),
            findings,
            suppressed_count: 1,
            changed_files: Vec::new(),
        }
    }

    #[test]
    fn empty_report_uses_placeholders() {
        let md = render_report_md(&result(Vec::new()));
        assert!(md.starts_with("# Risk Analysis Report\n"));
        assert!(md.contains("| critical | 0 |"));
        assert!(md.contains("No risks detected in current scope."));
        assert!(md.contains("No additional test recommendations."));
        assert!(md.contains("- Pre-flight status: `WARN`"));
        assert!(md.contains("- Pre-flight note: pytest missing"));
        assert!(md.contains("`12.50%`"));
        assert!(md.contains("- Suppressed findings: `1`"));
        assert!(md.contains("- Note: LLM disabled by --no-llm."));
        assert!(md.ends_with("No additional test recommendations.\n"));
    }

    #[test]
    fn top_risks_sorted_by_severity_then_rule() {
        let md = render_report_md(&result(vec![
            finding("missing_transition_handler", "a", Severity::Medium),
            finding("critical_path_no_tests", "b", Severity::High),
            finding("alpha_rule", "c", Severity::Medium),
        ]));
        let order: Vec<&str> = md
            .lines()
            .filter_map(|l| l.strip_prefix("### "))
            .collect();
        assert_eq!(
            order,
            vec![
                "critical_path_no_tests on b",
                "alpha_rule on c",
                "missing_transition_handler on a"
            ]
        );
        assert!(md.contains("  - `key: \"critical_path_no_tests:b\"`"));
        assert!(md.contains("- [high] Cover b (source: `app/api.py`)"));
    }

    #[test]
    fn top_risks_capped_at_five() {
        let findings = (0..7)
            .map(|i| finding("critical_path_no_tests", &format!("n{i}"), Severity::High))
            .collect();
        let r = result(findings);
        let md = render_report_md(&r);
        assert_eq!(md.matches("### ").count(), 5);
        assert_eq!(md.matches("- [high] `critical_path_no_tests`").count(), 7);

        let summary = render_pr_summary_md(&r);
        assert!(summary.contains("- Findings: 7 (7 high)"));
        assert!(summary.contains("... and 2 more in report.md"));
    }
}
