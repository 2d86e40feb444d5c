use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use riskmap_pipeline::context::DEFAULT_OUTPUT_DIR;
use riskmap_pipeline::{
    ExplicitFlags, FileConfig, Mode, OutputFormat, Pipeline, PipelineOutcome, ProviderSelection,
    RunContext,
};
use riskmap_rules::Severity;
use serde_json::json;
use std::path::{Path, PathBuf};

const SAMPLE_REPO: &str = "demos/sample_fastapi";

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    Full,
    Pr,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FormatArg {
    Md,
    Json,
    Both,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ProviderArg {
    Auto,
    Api,
    Cli,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SeverityArg {
    Critical,
    High,
    Medium,
    Low,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Full => Mode::Full,
            ModeArg::Pr => Mode::Pr,
        }
    }
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Md => OutputFormat::Md,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Both => OutputFormat::Both,
        }
    }
}

impl From<ProviderArg> for ProviderSelection {
    fn from(provider: ProviderArg) -> Self {
        match provider {
            ProviderArg::Auto => ProviderSelection::Auto,
            ProviderArg::Api => ProviderSelection::Api,
            ProviderArg::Cli => ProviderSelection::Cli,
        }
    }
}

impl From<SeverityArg> for Severity {
    fn from(severity: SeverityArg) -> Self {
        match severity {
            SeverityArg::Critical => Severity::Critical,
            SeverityArg::High => Severity::High,
            SeverityArg::Medium => Severity::Medium,
            SeverityArg::Low => Severity::Low,
        }
    }
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Repository path (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Analysis mode
    #[arg(long, value_enum, default_value = "full")]
    mode: ModeArg,

    /// Base branch for pr mode [default: main]
    #[arg(long)]
    base: Option<String>,

    /// Baseline graph.json enabling impacted-scope analysis in pr mode
    #[arg(long)]
    baseline_graph: Option<PathBuf>,

    /// Changed file (repeatable); replaces the git diff in pr mode
    #[arg(long = "changed-file")]
    changed_files: Vec<String>,

    /// Output directory [default: .riskmap]
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Output artifact format
    #[arg(long, value_enum, default_value = "both")]
    format: FormatArg,

    /// Exit with code 3 if a finding at or above this severity remains
    #[arg(long, value_enum)]
    fail_on_severity: Option<SeverityArg>,

    /// Suppression file [default: <repo>/.airiskignore]
    #[arg(long)]
    suppress_file: Option<PathBuf>,

    /// LLM provider [default: auto]
    #[arg(long, value_enum)]
    provider: Option<ProviderArg>,

    /// Disable LLM stages
    #[arg(long)]
    no_llm: bool,

    /// Analyze the bundled sample repository
    #[arg(long)]
    sample: bool,

    /// Print a JSON summary on stdout
    #[arg(long)]
    pub json: bool,
}

fn resolve_sample_repo() -> Result<PathBuf> {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let cwd = std::env::current_dir().ok();
    manifest_dir
        .ancestors()
        .chain(cwd.iter().flat_map(|dir| dir.ancestors()))
        .map(|dir| dir.join(SAMPLE_REPO))
        .find(|candidate| candidate.is_dir())
        .context("Bundled sample repository not found")
}

fn absolute(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn build_context(args: &AnalyzeArgs) -> Result<RunContext> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let repo = if args.sample {
        resolve_sample_repo()?
    } else {
        absolute(&args.path, &cwd)
    };
    if !repo.is_dir() {
        bail!("Repository path {} is not a directory", repo.display());
    }
    let repo = repo
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", repo.display()))?;

    let mut ctx = RunContext::new(&repo);
    ctx.mode = args.mode.into();
    ctx.base = args.base.clone();
    ctx.output_dir = absolute(
        args.output_dir
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_OUTPUT_DIR)),
        &cwd,
    );
    ctx.output_format = args.format.into();
    ctx.no_llm = args.no_llm;
    if let Some(provider) = args.provider {
        ctx.provider = provider.into();
    }
    ctx.fail_on_severity = args.fail_on_severity.map(Severity::from);
    ctx.suppress_file = args.suppress_file.as_deref().map(|p| absolute(p, &cwd));
    ctx.baseline_graph = args.baseline_graph.as_deref().map(|p| absolute(p, &cwd));
    if !args.changed_files.is_empty() {
        ctx.changed_files_override = Some(args.changed_files.clone());
    }

    if let Some(config) = FileConfig::load(&repo)? {
        log::debug!("Applying {}", riskmap_pipeline::CONFIG_FILE_NAME);
        config.apply(
            &mut ctx,
            &ExplicitFlags {
                base: args.base.is_some(),
                output_dir: args.output_dir.is_some(),
                suppress_file: args.suppress_file.is_some(),
                fail_on_severity: args.fail_on_severity.is_some(),
                baseline_graph: args.baseline_graph.is_some(),
                provider: args.provider.is_some(),
            },
        );
    }
    Ok(ctx)
}

fn print_notes(notes: &[String], header: bool) {
    if notes.is_empty() {
        return;
    }
    if header {
        println!("Notes:");
    }
    for note in notes {
        println!("- {note}");
    }
}

fn print_text(outcome: &PipelineOutcome, output_dir: &Path) {
    match outcome {
        PipelineOutcome::ProviderUnavailable { notes } => {
            println!("Provider configuration error: selected provider is unavailable.");
            print_notes(notes, false);
        }
        PipelineOutcome::Unsupported { reasons } => {
            println!("Pre-flight FAIL: repository is unsupported (expected FastAPI patterns).");
            print_notes(reasons, false);
        }
        PipelineOutcome::ThresholdReached(result) => {
            println!("Analysis completed with fail-on-severity threshold reached.");
            println!("Artifacts written to: {}", output_dir.display());
            print_notes(&result.notes, true);
        }
        PipelineOutcome::Completed(result) => {
            println!(
                "Analysis completed. Artifacts written to: {}",
                output_dir.display()
            );
            print_notes(&result.notes, true);
        }
    }
}

fn print_json(outcome: &PipelineOutcome, output_dir: &Path) -> Result<()> {
    let status = match outcome {
        PipelineOutcome::Completed(_) => "completed",
        PipelineOutcome::Unsupported { .. } => "unsupported",
        PipelineOutcome::ProviderUnavailable { .. } => "provider_unavailable",
        PipelineOutcome::ThresholdReached(_) => "threshold_reached",
    };
    let mut summary = json!({
        "status": status,
        "exit_code": outcome.exit_code(),
        "notes": outcome.notes(),
    });
    if let Some(result) = outcome.result() {
        let counts: serde_json::Map<String, serde_json::Value> = result
            .findings
            .severity_counts()
            .into_iter()
            .map(|(severity, count)| (severity.to_string(), json!(count)))
            .collect();
        summary["output_dir"] = json!(output_dir.display().to_string());
        summary["analysis_scope"] = json!(result.analysis_scope);
        summary["findings"] = json!(result.findings.len());
        summary["severity_counts"] = serde_json::Value::Object(counts);
        summary["suppressed"] = json!(result.suppressed_count);
        summary["generated_without_llm"] = json!(result.findings.generated_without_llm);
        summary["finding_ids"] = json!(result
            .findings
            .findings
            .iter()
            .map(|f| f.id.as_str())
            .collect::<Vec<_>>());
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Run `analyze`; returns the process exit code
pub async fn run(args: AnalyzeArgs) -> Result<i32> {
    let ctx = build_context(&args)?;
    let output_dir = ctx.output_dir.clone();
    log::info!("Analyzing {}", ctx.repo_path.display());

    let outcome = Pipeline::new(ctx)
        .run()
        .await
        .context("Analysis failed")?;

    if args.json {
        print_json(&outcome, &output_dir)?;
    } else {
        print_text(&outcome, &output_dir);
    }
    Ok(outcome.exit_code())
}
