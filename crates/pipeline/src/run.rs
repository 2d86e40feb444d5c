use crate::artifacts::write_artifacts;
use crate::context::RunContext;
use crate::enrich::{
    backend_for, generate_findings, generate_test_plan, resolve_provider, LlmBackend, ProviderEnv,
    ProviderKind,
};
use crate::error::Result;
use crate::plan::TestPlan;
use crate::scope::{reduce_scope, AnalysisScope};
use riskmap_collector::{detect_stack, registry, PreflightResult, StackCollector, StackDetection};
use riskmap_graph::{build_graph, low_confidence_ratio, Graph};
use riskmap_rules::{apply_suppressions, load_suppressions, run_rules, FindingsReport};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

const TOTAL_STEPS: usize = 7;

/// Everything one completed run produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    pub stack: StackDetection,
    pub preflight: PreflightResult,
    pub analysis_scope: AnalysisScope,
    pub notes: Vec<String>,
    pub data_quality_low_confidence_ratio: f64,
    pub graph: Graph,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoped_graph: Option<Graph>,
    pub findings_raw: FindingsReport,
    pub findings: FindingsReport,
    pub test_plan: TestPlan,
    pub suppressed_count: usize,
    pub changed_files: Vec<String>,
}

/// Final disposition of a run
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Completed(Box<PipelineResult>),
    /// Unknown stack or failed pre-flight
    Unsupported { reasons: Vec<String> },
    /// An explicitly requested provider cannot be used
    ProviderUnavailable { notes: Vec<String> },
    /// A final finding reached the configured severity threshold
    ThresholdReached(Box<PipelineResult>),
}

impl PipelineOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineOutcome::Completed(_) => 0,
            PipelineOutcome::ProviderUnavailable { .. } => 1,
            PipelineOutcome::Unsupported { .. } => 2,
            PipelineOutcome::ThresholdReached(_) => 3,
        }
    }

    pub fn notes(&self) -> &[String] {
        match self {
            PipelineOutcome::Completed(result) | PipelineOutcome::ThresholdReached(result) => {
                &result.notes
            }
            PipelineOutcome::Unsupported { reasons } => reasons,
            PipelineOutcome::ProviderUnavailable { notes } => notes,
        }
    }

    pub fn result(&self) -> Option<&PipelineResult> {
        match self {
            PipelineOutcome::Completed(result) | PipelineOutcome::ThresholdReached(result) => {
                Some(result)
            }
            _ => None,
        }
    }
}

/// `[step/total] label ... done (N.Ns)` stage timer
struct Progress {
    step: usize,
    label: &'static str,
    started: Instant,
}

impl Progress {
    fn start(step: usize, label: &'static str) -> Self {
        log::info!("[{step}/{TOTAL_STEPS}] {label} ...");
        Self {
            step,
            label,
            started: Instant::now(),
        }
    }

    fn done(self) {
        log::info!(
            "[{}/{TOTAL_STEPS}] {} ... done ({:.1}s)",
            self.step,
            self.label,
            self.started.elapsed().as_secs_f64()
        );
    }
}

/// Sequences detection, collection, graph, scope, rules, enrichment and
/// suppression for one repository.
pub struct Pipeline {
    ctx: RunContext,
    provider_env: Option<ProviderEnv>,
    backend: Option<Arc<dyn LlmBackend>>,
}

impl Pipeline {
    pub fn new(ctx: RunContext) -> Self {
        Self {
            ctx,
            provider_env: None,
            backend: None,
        }
    }

    /// Use this environment instead of probing variables and PATH
    pub fn with_provider_env(mut self, env: ProviderEnv) -> Self {
        self.provider_env = Some(env);
        self
    }

    /// Use this backend whenever provider resolution selects an LLM
    pub fn with_backend(mut self, backend: Arc<dyn LlmBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub async fn run(&self) -> Result<PipelineOutcome> {
        let ctx = &self.ctx;
        let repo = ctx.repo_path();
        let mut notes = Vec::new();

        let progress = Progress::start(1, "Stack detection and pre-flight");
        let stack = detect_stack(repo);
        let Some(plugin) = registry().plugin_for_stack(stack.stack_id) else {
            progress.done();
            log::warn!("No collector matched {}", repo.display());
            return Ok(PipelineOutcome::Unsupported {
                reasons: stack.reasons,
            });
        };
        let preflight = plugin.preflight(repo, stack.probe_data.as_ref());
        progress.done();
        if preflight.is_fail() {
            return Ok(PipelineOutcome::Unsupported {
                reasons: preflight.reasons,
            });
        }
        notes.extend(preflight.reasons.iter().cloned());

        let progress = Progress::start(2, "Collecting artifacts");
        let bundle = plugin.collect(repo);
        progress.done();

        let progress = Progress::start(3, "Building graph");
        let graph = build_graph(&bundle);
        drop(bundle);
        progress.done();

        let progress = Progress::start(4, "Resolving analysis scope");
        let scope = reduce_scope(ctx, &graph).await;
        notes.extend(scope.notes.iter().cloned());
        progress.done();

        let progress = Progress::start(5, "Running rules");
        let findings_raw = run_rules(scope.effective_graph(&graph));
        progress.done();

        let env = match &self.provider_env {
            Some(env) => env.clone(),
            None => ProviderEnv::from_env(),
        };
        let resolution = resolve_provider(ctx.provider, ctx.no_llm, &env);
        notes.extend(resolution.notes.iter().cloned());
        if resolution.is_unavailable(ctx.provider, ctx.no_llm) {
            return Ok(PipelineOutcome::ProviderUnavailable { notes });
        }
        let backend = self.backend_for(resolution.provider, &env, &mut notes);
        let backend = backend.as_deref();

        let progress = Progress::start(6, "Risk agent");
        let enriched = generate_findings(&findings_raw, scope.effective_graph(&graph), backend).await;
        notes.extend(enriched.notes);
        let (suppressions, suppression_notes) =
            load_suppressions(ctx.effective_suppress_file().as_deref());
        notes.extend(suppression_notes);
        let (findings, suppressed_count) = apply_suppressions(&enriched.value, &suppressions);
        if suppressed_count > 0 {
            log::info!("Suppressed {suppressed_count} finding(s)");
        }
        progress.done();

        let progress = Progress::start(7, "QA strategy agent");
        let plan = generate_test_plan(&findings, backend).await;
        notes.extend(plan.notes);
        progress.done();

        let threshold_hit = ctx
            .fail_on_severity
            .is_some_and(|threshold| findings.any_at_least(threshold));

        let result = PipelineResult {
            stack,
            preflight,
            analysis_scope: scope.scope,
            notes,
            data_quality_low_confidence_ratio: low_confidence_ratio(&graph),
            graph,
            scoped_graph: scope.scoped_graph,
            findings_raw,
            findings,
            test_plan: plan.value,
            suppressed_count,
            changed_files: scope.changed_files,
        };
        write_artifacts(ctx, &result).await?;

        Ok(if threshold_hit {
            PipelineOutcome::ThresholdReached(Box::new(result))
        } else {
            PipelineOutcome::Completed(Box::new(result))
        })
    }

    fn backend_for(
        &self,
        kind: ProviderKind,
        env: &ProviderEnv,
        notes: &mut Vec<String>,
    ) -> Option<Arc<dyn LlmBackend>> {
        if kind == ProviderKind::None {
            return None;
        }
        if let Some(backend) = &self.backend {
            return Some(Arc::clone(backend));
        }
        match backend_for(kind, env) {
            Ok(backend) => backend,
            Err(e) => {
                log::warn!("Enrichment backend {kind} unavailable: {e}");
                notes.push(format!("Enrichment backend {kind} unavailable ({e}); using deterministic output."));
                None
            }
        }
    }
}
