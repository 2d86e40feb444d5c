//! # Riskmap Collector
//!
//! Stack detection and structural artifact extraction for Python web services.
//!
//! ## Architecture
//!
//! ```text
//! Repository root
//!     │
//!     ├──> Plugin Registry (closed, ordered)
//!     │      └─ probe each plugin → best confidence wins
//!     │
//!     ├──> Preflight (PASS / WARN / FAIL)
//!     │
//!     └──> Collect
//!            ├─ File scan (ignore::WalkBuilder, excluded dirs pruned)
//!            ├─ Tree-sitter parse → typed Module
//!            ├─ Extract write endpoints, schemas, bindings
//!            ├─ Extract declared / handled transitions
//!            └─ Emit ArtifactBundle (repo-relative paths only)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use riskmap_collector::{detect_stack, registry, StackCollector};
//! use std::path::Path;
//!
//! let repo = Path::new("path/to/service");
//! let detection = detect_stack(repo);
//! if let Some(plugin) = registry().plugin_for_stack(detection.stack_id) {
//!     let bundle = plugin.collect(repo);
//!     println!("{} write endpoints", bundle.write_endpoints.len());
//! }
//! ```

mod bundle;
mod error;
mod fastapi;
mod plugin;
mod registry;
mod scanner;
mod signals;
pub mod syntax;
mod types;

pub use bundle::{ArtifactBundle, EndpointModel, EndpointRef, SchemaRef, TestCaseRef};
pub use error::{CollectorError, Result};
pub use fastapi::{is_test_file, route_method, FastApiCollector, ROUTE_METHODS, WRITE_METHODS};
pub use plugin::{CollectorPlugin, ProbeData, ProbeResult, StackCollector, StackDetection};
pub use registry::{
    default_plugin, detect_stack, list_registered_stacks, registry, select_best, PluginRegistry,
};
pub use scanner::{normalize_path, relative_path, FileScanner, SourceFile, EXCLUDED_DIRS};
pub use signals::{scan_fastapi_signals, FastApiSignals};
pub use types::{Confidence, PreflightResult, PreflightStatus, StackId, TransitionSpec};
