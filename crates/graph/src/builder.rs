use crate::coverage::covers;
use crate::ids::{state_local, transition_local, IdAllocator};
use crate::types::{Edge, EdgeType, Graph, Layer, Node, NodeType};
use riskmap_collector::{ArtifactBundle, Confidence, SchemaRef};

/// Build the risk graph for a collected bundle.
///
/// Nodes are created as Entities, APIs, TestCases, then States and Transitions;
/// edges as `validated_by`, `covered_by`, then `transitions_to`.
pub fn build_graph(bundle: &ArtifactBundle) -> Graph {
    let ids = allocate_ids(bundle);
    let mut graph = Graph::new();

    for schema in &bundle.schema_models {
        graph.push_node(Node {
            id: ids.id(NodeType::Entity, &schema.name, &schema.file),
            node_type: NodeType::Entity,
            name: schema.name.clone(),
            layer: Layer::Domain,
            source_ref: schema.file.clone(),
            confidence: Confidence::High,
        });
    }

    for endpoint in &bundle.write_endpoints {
        graph.push_node(Node {
            id: ids.id(NodeType::Api, &endpoint.name, &endpoint.file),
            node_type: NodeType::Api,
            name: endpoint.name.clone(),
            layer: Layer::Infrastructure,
            source_ref: endpoint.file.clone(),
            confidence: Confidence::High,
        });
    }

    for test in &bundle.test_cases {
        graph.push_node(Node {
            id: ids.id(NodeType::TestCase, &test.name, &test.file),
            node_type: NodeType::TestCase,
            name: test.name.clone(),
            layer: Layer::Qa,
            source_ref: test.file.clone(),
            confidence: Confidence::High,
        });
    }

    for transition in &bundle.declared_transitions {
        for state in [&transition.source, &transition.target] {
            let local = state_local(&transition.machine, state);
            graph.push_node(Node {
                id: ids.id(NodeType::State, &local, &transition.source_ref),
                node_type: NodeType::State,
                name: local,
                layer: Layer::Domain,
                source_ref: transition.source_ref.clone(),
                confidence: Confidence::High,
            });
        }
    }
    for transition in &bundle.declared_transitions {
        let local = transition_local(&transition.machine, &transition.source, &transition.target);
        graph.push_node(Node {
            id: ids.id(NodeType::Transition, &local, &transition.source_ref),
            node_type: NodeType::Transition,
            name: local,
            layer: Layer::Domain,
            source_ref: transition.source_ref.clone(),
            confidence: Confidence::High,
        });
    }

    link_schemas(&mut graph, &ids, bundle);
    link_coverage(&mut graph);
    link_transitions(&mut graph, &ids, bundle);

    graph.declared_transitions = bundle.declared_transitions.clone();
    graph.handled_transitions = bundle.handled_transitions.clone();

    log::info!(
        "Built graph with {} nodes and {} edges",
        graph.nodes.len(),
        graph.edges.len()
    );
    graph
}

fn allocate_ids(bundle: &ArtifactBundle) -> IdAllocator {
    let mut ids = IdAllocator::new();
    for schema in &bundle.schema_models {
        ids.observe(NodeType::Entity, &schema.name, &schema.file);
    }
    for endpoint in &bundle.write_endpoints {
        ids.observe(NodeType::Api, &endpoint.name, &endpoint.file);
    }
    for test in &bundle.test_cases {
        ids.observe(NodeType::TestCase, &test.name, &test.file);
    }
    for t in &bundle.declared_transitions {
        ids.observe(NodeType::State, &state_local(&t.machine, &t.source), &t.source_ref);
        ids.observe(NodeType::State, &state_local(&t.machine, &t.target), &t.source_ref);
        ids.observe(
            NodeType::Transition,
            &transition_local(&t.machine, &t.source, &t.target),
            &t.source_ref,
        );
    }
    ids
}

/// Schema declaration a binding refers to: same file first, then the first
/// declaration by path order.
fn resolve_schema<'b>(bundle: &'b ArtifactBundle, file: &str, model: &str) -> Option<&'b SchemaRef> {
    let mut candidates = bundle.schema_models.iter().filter(|s| s.name == model);
    let first = candidates.clone().next();
    candidates.find(|s| s.file == file).or(first)
}

fn link_schemas(graph: &mut Graph, ids: &IdAllocator, bundle: &ArtifactBundle) {
    for binding in &bundle.endpoint_models {
        if !bundle.has_endpoint(&binding.file, &binding.endpoint) {
            continue;
        }
        let Some(schema) = resolve_schema(bundle, &binding.file, &binding.model) else {
            continue;
        };
        let api_id = ids.id(NodeType::Api, &binding.endpoint, &binding.file);
        let entity_id = ids.id(NodeType::Entity, &schema.name, &schema.file);
        graph.push_edge(Edge {
            id: Edge::edge_id(EdgeType::ValidatedBy, &api_id, &entity_id),
            source_node_id: api_id,
            target_node_id: entity_id,
            edge_type: EdgeType::ValidatedBy,
            source_ref: binding.file.clone(),
            evidence: format!("{} binds schema {}", binding.endpoint, binding.model),
            confidence: Confidence::High,
        });
    }
}

fn link_coverage(graph: &mut Graph) {
    let mut edges = Vec::new();
    for api in graph.nodes_of_type(NodeType::Api) {
        for test in graph.nodes_of_type(NodeType::TestCase) {
            if !covers(&api.name, &test.name) {
                continue;
            }
            edges.push(Edge {
                id: Edge::edge_id(EdgeType::CoveredBy, &test.id, &api.id),
                source_node_id: test.id.clone(),
                target_node_id: api.id.clone(),
                edge_type: EdgeType::CoveredBy,
                source_ref: test.source_ref.clone(),
                evidence: format!("name tokens of {} found in {}", api.name, test.name),
                confidence: Confidence::Medium,
            });
        }
    }
    for edge in edges {
        graph.push_edge(edge);
    }
}

fn link_transitions(graph: &mut Graph, ids: &IdAllocator, bundle: &ArtifactBundle) {
    for t in &bundle.declared_transitions {
        let from = ids.id(NodeType::State, &state_local(&t.machine, &t.source), &t.source_ref);
        let to = ids.id(NodeType::State, &state_local(&t.machine, &t.target), &t.source_ref);
        graph.push_edge(Edge {
            id: Edge::edge_id(EdgeType::TransitionsTo, &from, &to),
            source_node_id: from,
            target_node_id: to,
            edge_type: EdgeType::TransitionsTo,
            source_ref: t.source_ref.clone(),
            evidence: format!("{} declares {} -> {}", t.machine, t.source, t.target),
            confidence: Confidence::High,
        });
    }
}

/// Share of low-confidence nodes and edges; `0.0` for an empty graph
pub fn low_confidence_ratio(graph: &Graph) -> f64 {
    let total = graph.nodes.len() + graph.edges.len();
    if total == 0 {
        return 0.0;
    }
    let low = graph
        .nodes
        .iter()
        .filter(|n| n.confidence == Confidence::Low)
        .count()
        + graph
            .edges
            .iter()
            .filter(|e| e.confidence == Confidence::Low)
            .count();
    low as f64 / total as f64
}
