use crate::context::{ProviderSelection, RunContext};
use crate::error::{PipelineError, Result};
use riskmap_rules::Severity;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "riskmap.toml";

/// Optional `riskmap.toml` at the repository root
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub base: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub suppress_file: Option<PathBuf>,
    pub fail_on_severity: Option<Severity>,
    pub baseline_graph: Option<PathBuf>,
    pub provider: Option<ProviderSelection>,
    pub git_timeout_ms: Option<u64>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| PipelineError::Config(format!("{CONFIG_FILE_NAME}: {e}")))
    }

    /// `None` when the repository has no config file
    pub fn load(repo_root: &Path) -> Result<Option<Self>> {
        let path = repo_root.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        Self::parse(&text).map(Some)
    }

    /// Fill context fields the command line left unset. Relative paths resolve
    /// against `repo_root`.
    pub fn apply(&self, ctx: &mut RunContext, explicit: &ExplicitFlags) {
        let repo_root = ctx.repo_path.clone();
        let resolve = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                repo_root.join(p)
            }
        };

        if !explicit.base {
            if let Some(base) = &self.base {
                ctx.base = Some(base.clone());
            }
        }
        if !explicit.output_dir {
            if let Some(dir) = &self.output_dir {
                ctx.output_dir = resolve(dir);
            }
        }
        if !explicit.suppress_file {
            if let Some(file) = &self.suppress_file {
                ctx.suppress_file = Some(resolve(file));
            }
        }
        if !explicit.fail_on_severity {
            if let Some(severity) = self.fail_on_severity {
                ctx.fail_on_severity = Some(severity);
            }
        }
        if !explicit.baseline_graph {
            if let Some(file) = &self.baseline_graph {
                ctx.baseline_graph = Some(resolve(file));
            }
        }
        if !explicit.provider {
            if let Some(provider) = self.provider {
                ctx.provider = provider;
            }
        }
        if let Some(ms) = self.git_timeout_ms {
            ctx.git_timeout = Duration::from_millis(ms);
        }
    }
}

/// Which context fields were set on the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplicitFlags {
    pub base: bool,
    pub output_dir: bool,
    pub suppress_file: bool,
    pub fail_on_severity: bool,
    pub baseline_graph: bool,
    pub provider: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_all_keys() {
        let config = FileConfig::parse(
            r#"
base = "develop"
output_dir = "out"
suppress_file = "ops/ignore"
fail_on_severity = "high"
baseline_graph = "baseline/graph.json"
provider = "api"
git_timeout_ms = 1500
"#,
        )
        .unwrap();
        assert_eq!(config.base.as_deref(), Some("develop"));
        assert_eq!(config.fail_on_severity, Some(Severity::High));
        assert_eq!(config.provider, Some(ProviderSelection::Api));
        assert_eq!(config.git_timeout_ms, Some(1500));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = FileConfig::parse("colour = \"blue\"\n").unwrap_err();
        assert!(err.to_string().contains("colour"), "{err}");
    }

    #[test]
    fn explicit_flags_win_over_file() {
        let config = FileConfig::parse("base = \"develop\"\noutput_dir = \"out\"\n").unwrap();
        let mut ctx = RunContext::new("/repo");
        ctx.base = Some("release".into());
        config.apply(
            &mut ctx,
            &ExplicitFlags {
                base: true,
                ..Default::default()
            },
        );
        assert_eq!(ctx.base.as_deref(), Some("release"));
        assert_eq!(ctx.output_dir, PathBuf::from("/repo/out"));
    }
}
