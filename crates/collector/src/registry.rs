use crate::fastapi::FastApiCollector;
use crate::plugin::{CollectorPlugin, ProbeResult, StackCollector, StackDetection};
use crate::types::StackId;
use once_cell::sync::Lazy;
use std::path::Path;

static REGISTRY: Lazy<PluginRegistry> = Lazy::new(PluginRegistry::builtin);

/// Ordered, immutable table of collector plugins.
///
/// Registration order breaks confidence ties during detection.
#[derive(Debug, Clone)]
pub struct PluginRegistry {
    plugins: Vec<CollectorPlugin>,
}

impl PluginRegistry {
    pub fn new(plugins: Vec<CollectorPlugin>) -> Self {
        Self { plugins }
    }

    pub fn builtin() -> Self {
        Self::new(vec![CollectorPlugin::FastApi(FastApiCollector)])
    }

    pub fn plugins(&self) -> &[CollectorPlugin] {
        &self.plugins
    }

    pub fn plugin_for_stack(&self, stack_id: StackId) -> Option<&CollectorPlugin> {
        self.plugins.iter().find(|p| p.stack_id() == stack_id)
    }

    pub fn stacks(&self) -> Vec<StackId> {
        self.plugins.iter().map(StackCollector::stack_id).collect()
    }

    /// Probe every plugin and keep the most confident claim
    pub fn detect(&self, repo_root: &Path) -> StackDetection {
        let probes = self.plugins.iter().filter_map(|plugin| {
            let probe = plugin.probe(repo_root);
            if let Some(probe) = &probe {
                log::debug!(
                    "Probe {} matched with {} confidence",
                    probe.stack_id,
                    probe.confidence
                );
            }
            probe
        });
        select_best(probes)
    }
}

/// Highest-confidence probe; only a strictly greater rank replaces the current best
pub fn select_best(probes: impl IntoIterator<Item = ProbeResult>) -> StackDetection {
    let mut best: Option<ProbeResult> = None;
    for probe in probes {
        let replace = match &best {
            Some(current) => probe.confidence.rank() > current.confidence.rank(),
            None => true,
        };
        if replace {
            best = Some(probe);
        }
    }
    best.map(StackDetection::from)
        .unwrap_or_else(StackDetection::unknown)
}

/// Process-wide built-in registry
pub fn registry() -> &'static PluginRegistry {
    &REGISTRY
}

pub fn detect_stack(repo_root: &Path) -> StackDetection {
    registry().detect(repo_root)
}

/// Plugin used when the caller skips detection
pub fn default_plugin() -> &'static CollectorPlugin {
    &registry().plugins()[0]
}

pub fn list_registered_stacks() -> Vec<StackId> {
    registry().stacks()
}
