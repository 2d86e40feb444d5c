//! # Riskmap Rules
//!
//! Deterministic risk rules over a [`riskmap_graph::Graph`], plus the
//! ignore-list matcher applied to their findings.
//!
//! | Rule | Severity | Trigger |
//! |---|---|---|
//! | `critical_path_no_tests` | high | API node without an incoming `covered_by` edge |
//! | `missing_transition_handler` | medium | declared `(source, target)` pair never handled |

mod engine;
mod finding;
mod suppressions;

pub use engine::{evaluate, run_rules, CRITICAL_PATH_NO_TESTS, MISSING_TRANSITION_HANDLER};
pub use finding::{Finding, FindingsReport, Severity};
pub use suppressions::{apply_suppressions, load_suppressions, SuppressionSet};
