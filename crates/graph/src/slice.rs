use crate::index::GraphIndex;
use crate::types::Graph;
use riskmap_collector::normalize_path;
use std::collections::{BTreeSet, HashSet};

/// Subgraph within one hop of the nodes defined in `changed_files`.
///
/// Returns `None` when no node's `source_ref` is in the changed set. Edges are
/// kept only when both endpoints survive; transition lists are filtered by
/// their own `source_ref` without expansion.
pub fn slice_by_files(graph: &Graph, changed_files: &BTreeSet<String>) -> Option<Graph> {
    let changed: HashSet<String> = changed_files.iter().map(|f| normalize_path(f)).collect();
    let touched = |source_ref: &str| changed.contains(&normalize_path(source_ref));

    let seeds: Vec<&str> = graph
        .nodes
        .iter()
        .filter(|n| touched(&n.source_ref))
        .map(|n| n.id.as_str())
        .collect();
    if seeds.is_empty() {
        return None;
    }

    let index = GraphIndex::new(graph);
    let mut keep: HashSet<&str> = seeds.iter().copied().collect();
    for seed in &seeds {
        if let Ok(neighbours) = index.neighbours(seed) {
            keep.extend(neighbours);
        }
    }

    let sliced = Graph {
        nodes: graph
            .nodes
            .iter()
            .filter(|n| keep.contains(n.id.as_str()))
            .cloned()
            .collect(),
        edges: graph
            .edges
            .iter()
            .filter(|e| {
                keep.contains(e.source_node_id.as_str()) && keep.contains(e.target_node_id.as_str())
            })
            .cloned()
            .collect(),
        declared_transitions: graph
            .declared_transitions
            .iter()
            .filter(|t| touched(&t.source_ref))
            .cloned()
            .collect(),
        handled_transitions: graph
            .handled_transitions
            .iter()
            .filter(|t| touched(&t.source_ref))
            .cloned()
            .collect(),
    };

    log::debug!(
        "Sliced graph to {} of {} nodes from {} seeds",
        sliced.nodes.len(),
        graph.nodes.len(),
        seeds.len()
    );
    Some(sliced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_graph;
    use crate::types::NodeType;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use riskmap_collector::{ArtifactBundle, EndpointRef, SchemaRef, TestCaseRef, TransitionSpec};

    fn bundle() -> ArtifactBundle {
        ArtifactBundle {
            write_endpoints: vec![
                EndpointRef {
                    file: "app/orders.py".into(),
                    name: "create_order".into(),
                    method: "post".into(),
                },
                EndpointRef {
                    file: "app/users.py".into(),
                    name: "create_user".into(),
                    method: "post".into(),
                },
            ],
            schema_models: vec![SchemaRef {
                file: "app/schemas.py".into(),
                name: "UserIn".into(),
            }],
            test_cases: vec![
                TestCaseRef {
                    file: "tests/test_orders.py".into(),
                    name: "test_create_order".into(),
                },
                TestCaseRef {
                    file: "tests/test_users.py".into(),
                    name: "test_create_user".into(),
                },
            ],
            declared_transitions: vec![
                TransitionSpec::new("ORDER_TRANSITIONS", "pending", "paid", "app/orders.py"),
                TransitionSpec::new("USER_TRANSITIONS", "new", "active", "app/users.py"),
            ],
            handled_transitions: vec![TransitionSpec::new(
                "pay",
                "pending",
                "paid",
                "app/orders.py",
            )],
            ..Default::default()
        }
    }

    fn files(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn slice_expands_one_hop_from_changed_file() {
        let graph = build_graph(&bundle());
        let sliced = slice_by_files(&graph, &files(&["app/orders.py"])).expect("seeds");

        let ids: Vec<&str> = sliced.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "api:create_order",
                "test:test_create_order",
                "state:ORDER_TRANSITIONS.pending",
                "state:ORDER_TRANSITIONS.paid",
                "transition:ORDER_TRANSITIONS.pending->paid",
            ]
        );
        assert_eq!(sliced.declared_transitions.len(), 1);
        assert_eq!(sliced.handled_transitions.len(), 1);
        assert!(sliced
            .edges
            .iter()
            .all(|e| sliced.contains_node(&e.source_node_id) && sliced.contains_node(&e.target_node_id)));
    }

    #[test]
    fn changed_paths_are_normalized() {
        let graph = build_graph(&bundle());
        let sliced = slice_by_files(&graph, &files(&["./app\\users.py"])).expect("seeds");
        assert!(sliced.contains_node("api:create_user"));
        assert!(!sliced.contains_node("api:create_order"));
    }

    #[test]
    fn unrelated_changes_yield_no_slice() {
        let graph = build_graph(&bundle());
        assert!(slice_by_files(&graph, &files(&["README.md"])).is_none());
        assert!(slice_by_files(&graph, &BTreeSet::new()).is_none());
    }

    #[test]
    fn test_file_change_pulls_covered_endpoint() {
        let graph = build_graph(&bundle());
        let sliced = slice_by_files(&graph, &files(&["tests/test_users.py"])).expect("seeds");
        let apis: Vec<&str> = sliced
            .nodes_of_type(NodeType::Api)
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(apis, vec!["api:create_user"]);
        assert!(sliced.declared_transitions.is_empty());
    }

    proptest! {
        #[test]
        fn slice_is_conservative(picks in proptest::collection::vec(0usize..6, 0..6)) {
            let all = [
                "app/orders.py",
                "app/users.py",
                "app/schemas.py",
                "tests/test_orders.py",
                "tests/test_users.py",
                "docs/readme.md",
            ];
            let changed: BTreeSet<String> = picks.iter().map(|i| all[*i].to_string()).collect();
            let graph = build_graph(&bundle());
            if let Some(sliced) = slice_by_files(&graph, &changed) {
                let full = graph.node_ids();
                let kept = sliced.node_ids();
                prop_assert!(kept.is_subset(&full));
                for edge in &sliced.edges {
                    prop_assert!(kept.contains(edge.source_node_id.as_str()));
                    prop_assert!(kept.contains(edge.target_node_id.as_str()));
                }
            }
        }
    }
}
