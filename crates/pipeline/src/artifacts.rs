use crate::context::{Mode, RunContext};
use crate::error::Result;
use crate::report::{render_pr_summary_md, render_report_md};
use crate::run::PipelineResult;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const GRAPH_FILE: &str = "graph.json";
pub const IMPACTED_GRAPH_FILE: &str = "graph.impacted.json";
pub const FINDINGS_RAW_FILE: &str = "findings.raw.json";
pub const FINDINGS_FILE: &str = "findings.json";
pub const TEST_PLAN_FILE: &str = "test_plan.json";
pub const REPORT_FILE: &str = "report.md";
pub const PR_SUMMARY_FILE: &str = "pr_summary.md";

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes).await
}

/// Persist the run's artifacts under the output directory; returns the written paths
pub async fn write_artifacts(ctx: &RunContext, result: &PipelineResult) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(&ctx.output_dir).await?;
    let mut written = Vec::new();

    if ctx.output_format.includes_json() {
        let path = ctx.output_path(GRAPH_FILE);
        write_json(&path, &result.graph).await?;
        written.push(path);

        if let Some(scoped) = &result.scoped_graph {
            let path = ctx.output_path(IMPACTED_GRAPH_FILE);
            write_json(&path, scoped).await?;
            written.push(path);
        }

        for (name, value) in [
            (FINDINGS_RAW_FILE, &result.findings_raw),
            (FINDINGS_FILE, &result.findings),
        ] {
            let path = ctx.output_path(name);
            write_json(&path, value).await?;
            written.push(path);
        }

        let path = ctx.output_path(TEST_PLAN_FILE);
        write_json(&path, &result.test_plan).await?;
        written.push(path);
    }

    if ctx.output_format.includes_md() {
        let path = ctx.output_path(REPORT_FILE);
        write_atomic(&path, render_report_md(result).as_bytes()).await?;
        written.push(path);

        if ctx.mode == Mode::Pr {
            let path = ctx.output_path(PR_SUMMARY_FILE);
            write_atomic(&path, render_pr_summary_md(result).as_bytes()).await?;
            written.push(path);
        }
    }

    log::info!(
        "Wrote {} artifact(s) to {}",
        written.len(),
        ctx.output_dir.display()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OutputFormat;
    use crate::plan::TestPlan;
    use crate::scope::AnalysisScope;
    use riskmap_collector::{PreflightResult, StackDetection};
    use riskmap_graph::Graph;
    use riskmap_rules::FindingsReport;
    use tempfile::TempDir;

    fn empty_result() -> PipelineResult {
        PipelineResult {
            stack: StackDetection::unknown(),
            preflight: PreflightResult::pass(),
            analysis_scope: AnalysisScope::Full,
            notes: Vec::new(),
            data_quality_low_confidence_ratio: 0.0,
            graph: Graph::default(),
            scoped_graph: None,
            findings_raw: FindingsReport::default(),
            findings: FindingsReport::default(),
            test_plan: TestPlan::default(),
            suppressed_count: 0,
            changed_files: Vec::new(),
        }
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn format_selects_files() {
        let dir = TempDir::new().unwrap();
        let mut ctx = RunContext::new(dir.path());
        ctx.output_format = OutputFormat::Md;
        let written = write_artifacts(&ctx, &empty_result()).await.unwrap();
        assert_eq!(names(&written), vec!["report.md"]);

        ctx.output_format = OutputFormat::Json;
        ctx.mode = Mode::Pr;
        let written = write_artifacts(&ctx, &empty_result()).await.unwrap();
        assert_eq!(
            names(&written),
            vec!["graph.json", "findings.raw.json", "findings.json", "test_plan.json"]
        );
    }

    #[tokio::test]
    async fn pr_mode_adds_summary_and_impacted_graph() {
        let dir = TempDir::new().unwrap();
        let mut ctx = RunContext::new(dir.path());
        ctx.mode = Mode::Pr;
        let mut result = empty_result();
        result.analysis_scope = AnalysisScope::Impacted;
        result.scoped_graph = Some(Graph::default());

        let written = write_artifacts(&ctx, &result).await.unwrap();
        let names = names(&written);
        assert!(names.contains(&"graph.impacted.json".to_string()));
        assert!(names.contains(&"pr_summary.md".to_string()));
        assert!(!dir.path().join(".riskmap/graph.json.tmp").exists());

        let text = std::fs::read_to_string(dir.path().join(".riskmap/findings.json")).unwrap();
        let parsed: FindingsReport = serde_json::from_str(&text).unwrap();
        assert!(parsed.is_empty());
    }
}
