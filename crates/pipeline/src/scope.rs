use crate::context::{Mode, RunContext};
use riskmap_collector::normalize_path;
use riskmap_graph::{slice_by_files, validate_graph_document, Graph};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use tokio::time::{timeout, Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisScope {
    Impacted,
    Full,
    FullFallback,
}

impl AnalysisScope {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisScope::Impacted => "impacted",
            AnalysisScope::Full => "full",
            AnalysisScope::FullFallback => "full_fallback",
        }
    }
}

impl fmt::Display for AnalysisScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of scope reduction
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeDecision {
    pub scope: AnalysisScope,
    /// Impacted subgraph; `Some` only for [`AnalysisScope::Impacted`]
    pub scoped_graph: Option<Graph>,
    pub changed_files: Vec<String>,
    pub notes: Vec<String>,
}

impl ScopeDecision {
    fn full() -> Self {
        Self {
            scope: AnalysisScope::Full,
            scoped_graph: None,
            changed_files: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn fallback(note: String, changed_files: Vec<String>) -> Self {
        log::warn!("{note}");
        Self {
            scope: AnalysisScope::FullFallback,
            scoped_graph: None,
            changed_files,
            notes: vec![note],
        }
    }

    /// Graph the rules should see
    pub fn effective_graph<'a>(&'a self, full: &'a Graph) -> &'a Graph {
        self.scoped_graph.as_ref().unwrap_or(full)
    }
}

/// Why a baseline graph was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaselineProblem {
    NotProvided,
    Missing(String),
    Empty(String),
    Invalid { name: String, reason: String },
}

impl BaselineProblem {
    fn note(&self) -> String {
        match self {
            BaselineProblem::NotProvided => {
                "Baseline graph not provided; using full_fallback scan.".to_string()
            }
            BaselineProblem::Missing(name) => {
                format!("Baseline graph {name} not found; using full_fallback scan.")
            }
            BaselineProblem::Empty(name) => {
                format!("Baseline graph {name} is empty; using full_fallback scan.")
            }
            BaselineProblem::Invalid { name, reason } => format!(
                "Baseline graph {name} is invalid ({reason}); using full_fallback scan."
            ),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "baseline".to_string())
}

/// Existence, non-emptiness and `nodes`-list shape of the baseline graph
pub async fn check_baseline(path: Option<&Path>, limit: Duration) -> Result<usize, BaselineProblem> {
    let Some(path) = path else {
        return Err(BaselineProblem::NotProvided);
    };
    let name = display_name(path);
    let bytes = match timeout(limit, tokio::fs::read(path)).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(_)) => return Err(BaselineProblem::Missing(name)),
        Err(_) => {
            return Err(BaselineProblem::Invalid {
                name,
                reason: "read timed out".to_string(),
            })
        }
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(BaselineProblem::Empty(name));
    }
    let text = String::from_utf8_lossy(&bytes);
    validate_graph_document(&text).map_err(|e| BaselineProblem::Invalid {
        name,
        reason: e.to_string(),
    })
}

/// Ref expressions tried in order for the changed-file diff
pub fn diff_candidates(base: &str) -> Vec<String> {
    vec![
        base.to_string(),
        format!("origin/{base}"),
        format!("refs/remotes/origin/{base}"),
    ]
}

/// Paths changed between `base` and the working tree. `None` when no candidate
/// ref produced a successful diff within `limit`.
pub async fn git_changed_files(repo: &Path, base: &str, limit: Duration) -> Option<Vec<String>> {
    for candidate in diff_candidates(base) {
        let output = timeout(
            limit,
            tokio::process::Command::new("git")
                .arg("-C")
                .arg(repo)
                .arg("diff")
                .arg("--name-only")
                .arg("--relative")
                .arg(&candidate)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let output = match output {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                log::debug!("git diff against {candidate} failed to start: {e}");
                continue;
            }
            Err(_) => {
                log::debug!("git diff against {candidate} timed out");
                continue;
            }
        };
        if !output.status.success() {
            log::debug!("git diff against {candidate} exited with {}", output.status);
            continue;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        return Some(
            stdout
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(normalize_path)
                .collect(),
        );
    }
    None
}

/// Steps 2 and 3 of PR scoping once the baseline has been accepted
pub fn scope_from_changes(graph: &Graph, changed: Option<Vec<String>>, base: &str) -> ScopeDecision {
    let Some(changed) = changed else {
        return ScopeDecision::fallback(
            format!("Could not resolve changed files against base '{base}'; using full_fallback scan."),
            Vec::new(),
        );
    };
    let changed_set: BTreeSet<String> = changed.iter().map(|f| normalize_path(f)).collect();
    let changed_files: Vec<String> = changed_set.iter().cloned().collect();
    if changed_set.is_empty() {
        return ScopeDecision::fallback(
            format!("No changed files against base '{base}'; using full_fallback scan."),
            changed_files,
        );
    }

    match slice_by_files(graph, &changed_set) {
        Some(sliced) => {
            let note = format!(
                "Impacted scope: {} changed file(s), {} of {} graph nodes in scope.",
                changed_files.len(),
                sliced.nodes.len(),
                graph.nodes.len()
            );
            ScopeDecision {
                scope: AnalysisScope::Impacted,
                scoped_graph: Some(sliced),
                changed_files,
                notes: vec![note],
            }
        }
        None => ScopeDecision::fallback(
            "Changed files do not touch any graph node; using full_fallback scan.".to_string(),
            changed_files,
        ),
    }
}

/// Decide the analysis scope for a run
pub async fn reduce_scope(ctx: &RunContext, graph: &Graph) -> ScopeDecision {
    if ctx.mode != Mode::Pr {
        return ScopeDecision::full();
    }

    if let Err(problem) = check_baseline(ctx.baseline_graph.as_deref(), ctx.git_timeout).await {
        return ScopeDecision::fallback(problem.note(), Vec::new());
    }

    let base = ctx.base_ref();
    let changed = match &ctx.changed_files_override {
        Some(files) => Some(files.clone()),
        None => git_changed_files(&ctx.repo_path, base, ctx.git_timeout).await,
    };
    scope_from_changes(graph, changed, base)
}
