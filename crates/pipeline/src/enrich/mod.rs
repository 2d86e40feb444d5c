//! Optional LLM enrichment of findings and test plans.
//!
//! The deterministic rules output is always available; a backend may replace
//! it with model-generated content, and any backend failure falls back to the
//! deterministic result with lowered confidence.

mod agents;
mod api;
mod cli;
mod provider;
mod runtime;

pub use agents::{generate_findings, generate_test_plan, Enriched};
pub use api::ApiBackend;
pub use cli::CliBackend;
pub use provider::{
    resolve_provider, ProviderEnv, ProviderKind, ProviderResolution, API_KEY_VARS, CLI_COMMAND_VAR,
};
pub use runtime::{call_llm_json, extract_json, DEFAULT_MAX_RETRIES};

use crate::error::EnrichError;
use async_trait::async_trait;
use std::sync::Arc;

/// Text-in, text-out model invocation
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, EnrichError>;

    fn name(&self) -> &str;
}

/// Backend for a resolved provider, configured from the environment
pub fn backend_for(kind: ProviderKind, env: &ProviderEnv) -> Result<Option<Arc<dyn LlmBackend>>, EnrichError> {
    match kind {
        ProviderKind::None => Ok(None),
        ProviderKind::Api => Ok(Some(Arc::new(ApiBackend::from_env()?))),
        ProviderKind::Cli => {
            let command = env
                .cli_command
                .clone()
                .ok_or_else(|| EnrichError::Unavailable("no AI CLI on PATH".to_string()))?;
            Ok(Some(Arc::new(CliBackend::from_env(command))))
        }
    }
}
