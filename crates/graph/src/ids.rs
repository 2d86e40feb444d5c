use crate::types::NodeType;
use std::collections::{BTreeSet, HashMap};

/// Deterministic node id derivation.
///
/// Every `(type, local name, source file)` triple is observed first; ids are then
/// `{prefix}:{local}`, or `{prefix}:{source_ref}:{local}` when that base id is
/// produced by more than one file. The result depends on the set of observations
/// only, never on their order.
#[derive(Debug, Default)]
pub struct IdAllocator {
    sources: HashMap<String, BTreeSet<String>>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, node_type: NodeType, local: &str, source_ref: &str) {
        self.sources
            .entry(base_id(node_type, local))
            .or_default()
            .insert(source_ref.to_string());
    }

    pub fn id(&self, node_type: NodeType, local: &str, source_ref: &str) -> String {
        let base = base_id(node_type, local);
        let ambiguous = self.sources.get(&base).is_some_and(|files| files.len() > 1);
        if ambiguous {
            format!("{}:{source_ref}:{local}", node_type.prefix())
        } else {
            base
        }
    }
}

fn base_id(node_type: NodeType, local: &str) -> String {
    format!("{}:{local}", node_type.prefix())
}

/// Local part of a state node id
pub fn state_local(machine: &str, state: &str) -> String {
    format!("{machine}.{state}")
}

/// Local part of a transition node id
pub fn transition_local(machine: &str, source: &str, target: &str) -> String {
    format!("{machine}.{source}->{target}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_names_keep_short_ids() {
        let mut ids = IdAllocator::new();
        ids.observe(NodeType::Api, "create_order", "app/api.py");
        ids.observe(NodeType::Api, "create_order", "app/api.py");
        assert_eq!(
            ids.id(NodeType::Api, "create_order", "app/api.py"),
            "api:create_order"
        );
    }

    #[test]
    fn colliding_names_are_qualified_by_file() {
        let mut ids = IdAllocator::new();
        ids.observe(NodeType::Api, "create", "app/orders.py");
        ids.observe(NodeType::Api, "create", "app/users.py");
        ids.observe(NodeType::Entity, "create", "app/schemas.py");

        assert_eq!(
            ids.id(NodeType::Api, "create", "app/orders.py"),
            "api:app/orders.py:create"
        );
        assert_eq!(
            ids.id(NodeType::Api, "create", "app/users.py"),
            "api:app/users.py:create"
        );
        assert_eq!(ids.id(NodeType::Entity, "create", "app/schemas.py"), "entity:create");
    }

    #[test]
    fn observation_order_does_not_matter() {
        let mut forward = IdAllocator::new();
        forward.observe(NodeType::TestCase, "test_a", "tests/one.py");
        forward.observe(NodeType::TestCase, "test_a", "tests/two.py");

        let mut backward = IdAllocator::new();
        backward.observe(NodeType::TestCase, "test_a", "tests/two.py");
        backward.observe(NodeType::TestCase, "test_a", "tests/one.py");

        for file in ["tests/one.py", "tests/two.py"] {
            assert_eq!(
                forward.id(NodeType::TestCase, "test_a", file),
                backward.id(NodeType::TestCase, "test_a", file)
            );
        }
    }
}
