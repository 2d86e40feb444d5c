use riskmap_rules::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE: &str = "main";
pub const DEFAULT_OUTPUT_DIR: &str = ".riskmap";
pub const DEFAULT_SUPPRESS_FILE: &str = ".airiskignore";
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_millis(5_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Full,
    Pr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Md,
    Json,
    #[default]
    Both,
}

impl OutputFormat {
    pub fn includes_md(self) -> bool {
        matches!(self, OutputFormat::Md | OutputFormat::Both)
    }

    pub fn includes_json(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Both)
    }
}

/// Requested enrichment provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSelection {
    #[default]
    Auto,
    Api,
    Cli,
}

impl fmt::Display for ProviderSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderSelection::Auto => "auto",
            ProviderSelection::Api => "api",
            ProviderSelection::Cli => "cli",
        })
    }
}

/// Everything one analysis run needs to know
#[derive(Debug, Clone)]
pub struct RunContext {
    pub repo_path: PathBuf,
    pub mode: Mode,
    /// Base ref for PR mode
    pub base: Option<String>,
    pub output_dir: PathBuf,
    pub provider: ProviderSelection,
    pub no_llm: bool,
    pub output_format: OutputFormat,
    pub fail_on_severity: Option<Severity>,
    pub suppress_file: Option<PathBuf>,
    pub baseline_graph: Option<PathBuf>,
    /// Explicit changed-file set; skips the git diff when present
    pub changed_files_override: Option<Vec<String>>,
    pub git_timeout: Duration,
}

impl RunContext {
    /// Full-mode context with defaults, writing to `<repo>/.riskmap`
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        let repo_path = repo_path.into();
        let output_dir = repo_path.join(DEFAULT_OUTPUT_DIR);
        Self {
            repo_path,
            mode: Mode::Full,
            base: None,
            output_dir,
            provider: ProviderSelection::Auto,
            no_llm: false,
            output_format: OutputFormat::Both,
            fail_on_severity: None,
            suppress_file: None,
            baseline_graph: None,
            changed_files_override: None,
            git_timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    pub fn base_ref(&self) -> &str {
        self.base.as_deref().unwrap_or(DEFAULT_BASE)
    }

    /// Explicit suppression file, else `<repo>/.airiskignore` when it exists
    pub fn effective_suppress_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.suppress_file {
            return Some(path.clone());
        }
        let default = self.repo_path.join(DEFAULT_SUPPRESS_FILE);
        default.is_file().then_some(default)
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}
