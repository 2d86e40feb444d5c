use crate::context::ProviderSelection;
use std::fmt;

pub const API_KEY_VARS: &[&str] = &["OPENAI_API_KEY", "ANTHROPIC_API_KEY", "LITELLM_API_KEY"];
pub const CLI_COMMAND_VAR: &str = "RISKMAP_CLI_COMMAND";
const FALLBACK_CLIS: &[(&str, &[&str])] = &[("codex", &["--prompt"]), ("claude", &["-p"])];

/// Backend actually used for enrichment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Api,
    Cli,
    None,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::Api => "api",
            ProviderKind::Cli => "cli",
            ProviderKind::None => "none",
        })
    }
}

/// What the environment offers for enrichment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderEnv {
    pub has_api_credentials: bool,
    /// Resolved CLI command line (program and leading arguments)
    pub cli_command: Option<Vec<String>>,
    /// Running under CI (`CI` or `GITHUB_ACTIONS` set)
    pub ci: bool,
}

impl ProviderEnv {
    pub fn from_env() -> Self {
        let set = |name: &str| std::env::var(name).is_ok_and(|v| !v.trim().is_empty());
        Self {
            has_api_credentials: API_KEY_VARS.iter().any(|k| set(k)),
            cli_command: detect_cli_command(),
            ci: set("CI") || set("GITHUB_ACTIONS"),
        }
    }

    /// No credentials, no CLI, not CI
    pub fn offline() -> Self {
        Self::default()
    }
}

/// `RISKMAP_CLI_COMMAND` when its program is on PATH, else `codex` or `claude`
fn detect_cli_command() -> Option<Vec<String>> {
    if let Ok(configured) = std::env::var(CLI_COMMAND_VAR) {
        let parts: Vec<String> = configured.split_whitespace().map(str::to_string).collect();
        let program = parts.first()?;
        return which::which(program).ok().map(|_| parts);
    }
    FALLBACK_CLIS.iter().find_map(|(program, args)| {
        which::which(program).ok().map(|_| {
            std::iter::once(program.to_string())
                .chain(args.iter().map(|a| a.to_string()))
                .collect()
        })
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResolution {
    pub provider: ProviderKind,
    pub generated_without_llm: bool,
    pub notes: Vec<String>,
}

impl ProviderResolution {
    fn selected(provider: ProviderKind, note: Option<&str>) -> Self {
        Self {
            provider,
            generated_without_llm: provider == ProviderKind::None,
            notes: note.map(str::to_string).into_iter().collect(),
        }
    }

    /// An explicit `api`/`cli` request that could not be honoured
    pub fn is_unavailable(&self, selection: ProviderSelection, no_llm: bool) -> bool {
        !no_llm
            && matches!(selection, ProviderSelection::Api | ProviderSelection::Cli)
            && self.provider == ProviderKind::None
    }
}

pub fn resolve_provider(
    selection: ProviderSelection,
    no_llm: bool,
    env: &ProviderEnv,
) -> ProviderResolution {
    if no_llm {
        return ProviderResolution::selected(ProviderKind::None, Some("LLM disabled by --no-llm."));
    }
    let has_cli = env.cli_command.is_some();

    match selection {
        ProviderSelection::Api if env.has_api_credentials => ProviderResolution::selected(ProviderKind::Api, None),
        ProviderSelection::Api => ProviderResolution::selected(
            ProviderKind::None,
            Some("API provider selected but API credentials are missing. Use --no-llm or configure API keys."),
        ),
        ProviderSelection::Cli if has_cli => ProviderResolution::selected(ProviderKind::Cli, None),
        ProviderSelection::Cli => ProviderResolution::selected(
            ProviderKind::None,
            Some("CLI provider selected but no supported AI CLI was found. Use --provider api or --no-llm."),
        ),
        ProviderSelection::Auto if env.ci => {
            if env.has_api_credentials {
                ProviderResolution::selected(ProviderKind::Api, Some("auto provider in CI: selected api."))
            } else {
                ProviderResolution::selected(
                    ProviderKind::None,
                    Some("auto provider in CI: API unavailable, falling back to no-llm."),
                )
            }
        }
        ProviderSelection::Auto => {
            if has_cli {
                ProviderResolution::selected(ProviderKind::Cli, Some("auto provider local: selected cli."))
            } else if env.has_api_credentials {
                ProviderResolution::selected(
                    ProviderKind::Api,
                    Some("auto provider local: CLI unavailable, selected api."),
                )
            } else {
                ProviderResolution::selected(
                    ProviderKind::None,
                    Some("auto provider local: no provider configured, falling back to no-llm."),
                )
            }
        }
    }
}
