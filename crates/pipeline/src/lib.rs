//! Runs a complete riskmap analysis.
//!
//! ```text
//! RunContext (+ riskmap.toml)
//!     │
//!     ├─ detect_stack / preflight ──► Unsupported (exit 2)
//!     ├─ collect ─► build_graph
//!     ├─ reduce_scope ──────────────► full | impacted | full_fallback
//!     ├─ run_rules ─────────────────► findings_raw
//!     ├─ resolve_provider ──────────► ProviderUnavailable (exit 1)
//!     ├─ risk agent ─► suppressions ► findings
//!     ├─ QA agent ──────────────────► test_plan
//!     └─ write_artifacts ───────────► Completed (0) | ThresholdReached (3)
//! ```

pub mod artifacts;
pub mod config;
pub mod context;
pub mod enrich;
pub mod error;
pub mod plan;
pub mod report;
pub mod run;
pub mod scope;

pub use artifacts::write_artifacts;
pub use config::{ExplicitFlags, FileConfig, CONFIG_FILE_NAME};
pub use context::{Mode, OutputFormat, ProviderSelection, RunContext};
pub use enrich::{LlmBackend, ProviderEnv, ProviderKind};
pub use error::{EnrichError, PipelineError, Result};
pub use plan::{TestPlan, TestRecommendation};
pub use report::{render_pr_summary_md, render_report_md};
pub use run::{Pipeline, PipelineOutcome, PipelineResult};
pub use scope::{AnalysisScope, ScopeDecision};
