//! Tests for the relationship aggregator: tiered matching, placeholders,
//! deduplication, and determinism.
mod common;
use common::*;
use kizuna::prelude::*;
use serde_json::json;

fn cr_map_flow(id: &str, reference_name: &str) -> FlowRecord {
    flow(
        id,
        id,
        json!({ "connectionReferences": { reference_name: { "api": "x" } } }),
    )
}

#[test]
fn test_exact_match_scenario() {
    let graph = aggregate(
        vec![cr_map_flow("F1", "sharedpp")],
        vec![reference("CR1", "sharedpp", Some("C1"))],
        vec![connection("C1", "PP Connection")],
    );

    assert_eq!(graph.placeholder_count(), 0);
    assert_eq!(graph.nodes().len(), 3);
    assert_eq!(graph.edges().len(), 2);

    let flow_key = NodeKey::new(NodeKind::Flow, "F1");
    let cr_key = NodeKey::new(NodeKind::ConnectionReference, "CR1");
    let conn_key = NodeKey::new(NodeKind::Connection, "C1");
    assert!(
        graph
            .edges_from(&flow_key)
            .any(|e| e.to == cr_key && e.kind == EdgeKind::Standard)
    );
    assert!(
        graph
            .edges_from(&cr_key)
            .any(|e| e.to == conn_key && e.kind == EdgeKind::Standard)
    );
}

#[test]
fn test_unresolved_usage_creates_placeholder() {
    let graph = aggregate(
        vec![flow(
            "F2",
            "F2",
            json!({ "connectionReferenceId": "crAccounting" }),
        )],
        vec![reference("CR1", "sharedpp", None)],
        vec![],
    );

    assert_eq!(graph.placeholder_count(), 1);
    let placeholder_key = NodeKey::new(NodeKind::ConnectionReference, "crAccounting");
    let placeholder = graph.node(&placeholder_key).expect("placeholder node");
    assert!(placeholder.placeholder);

    let flow_key = NodeKey::new(NodeKind::Flow, "F2");
    assert!(
        graph
            .edges_from(&flow_key)
            .any(|e| e.to == placeholder_key && e.kind == EdgeKind::Placeholder)
    );
    assert!(
        graph
            .diagnostics()
            .iter()
            .any(|d| matches!(d, Diagnostic::UnresolvedUsage { raw_name, .. } if raw_name == "crAccounting"))
    );
    assert_eq!(graph.unresolved().len(), 1);
    assert_eq!(graph.unresolved()[0].confidence, MatchConfidence::Unmatched);
}

#[test]
fn test_normalized_match_scenario() {
    // Trailing space and underscore normalize away.
    let graph = aggregate(
        vec![flow(
            "F1",
            "F1",
            json!({ "connectionReferenceId": "Shared_PP " }),
        )],
        vec![reference("CR1", "sharedpp", None)],
        vec![],
    );

    assert_eq!(graph.placeholder_count(), 0);
    let flow_key = NodeKey::new(NodeKind::Flow, "F1");
    let cr_key = NodeKey::new(NodeKind::ConnectionReference, "CR1");
    assert!(
        graph
            .edges_from(&flow_key)
            .any(|e| e.to == cr_key && e.kind == EdgeKind::Standard)
    );
}

#[test]
fn test_id_match_takes_priority() {
    // The raw value is another record's logical name, but an id match is a
    // higher tier and must win.
    let graph = aggregate(
        vec![flow("F1", "F1", json!({ "connectionReferenceId": "CR2" }))],
        vec![
            reference("CR1", "CR2", None),
            reference("CR2", "accounting", None),
        ],
        vec![],
    );

    let flow_key = NodeKey::new(NodeKind::Flow, "F1");
    let targets: Vec<String> = graph
        .edges_from(&flow_key)
        .map(|e| e.to.source_id.clone())
        .collect();
    assert_eq!(targets, vec!["CR2".to_string()]);
}

#[test]
fn test_fuzzy_match_within_threshold() {
    let graph = aggregate(
        vec![flow(
            "F1",
            "F1",
            json!({ "connectionReferenceId": "sharedqp" }),
        )],
        vec![reference("CR1", "sharedpp", None)],
        vec![],
    );

    assert_eq!(graph.placeholder_count(), 0);
    assert_eq!(graph.edges().len(), 1);
}

#[test]
fn test_fuzzy_threshold_is_configurable() {
    let graph = Aggregator::builder(
        vec![flow(
            "F1",
            "F1",
            json!({ "connectionReferenceId": "sharedqp" }),
        )],
        vec![reference("CR1", "sharedpp", None)],
        vec![],
    )
    .with_fuzzy_distance(0)
    .build()
    .aggregate()
    .expect("aggregation should not fail");

    assert_eq!(graph.placeholder_count(), 1);
}

#[test]
fn test_ambiguous_match_is_never_guessed() {
    // Both records normalize to "sharedpp"; resolution must stop instead of
    // picking one.
    let graph = aggregate(
        vec![flow(
            "F1",
            "F1",
            json!({ "connectionReferenceId": "shared pp" }),
        )],
        vec![
            reference("CR1", "Shared_PP", None),
            reference("CR2", "shared.pp", None),
        ],
        vec![],
    );

    assert_eq!(graph.placeholder_count(), 0);
    assert_eq!(graph.edges().len(), 0);
    assert!(
        graph
            .diagnostics()
            .iter()
            .any(|d| matches!(d, Diagnostic::AmbiguousMatch { candidates, .. } if candidates.len() == 2))
    );
    assert_eq!(graph.unresolved().len(), 1);
}

#[test]
fn test_shared_reference_is_deduplicated() {
    let graph = aggregate(
        vec![cr_map_flow("F1", "sharedpp"), cr_map_flow("F2", "sharedpp")],
        vec![reference("CR1", "sharedpp", None)],
        vec![],
    );

    let cr_key = NodeKey::new(NodeKind::ConnectionReference, "CR1");
    let cr_nodes: Vec<_> = graph
        .nodes_of_kind(NodeKind::ConnectionReference)
        .collect();
    assert_eq!(cr_nodes.len(), 1);
    assert_eq!(graph.edges_to(&cr_key).count(), 2);
}

#[test]
fn test_placeholders_are_deduplicated_across_flows() {
    let graph = aggregate(
        vec![
            flow("F1", "F1", json!({ "connectionReferenceId": "crMissing" })),
            flow("F2", "F2", json!({ "connectionReferenceId": "crMissing" })),
        ],
        vec![],
        vec![],
    );

    assert_eq!(graph.placeholder_count(), 1);
    let placeholder_key = NodeKey::new(NodeKind::ConnectionReference, "crMissing");
    assert_eq!(graph.edges_to(&placeholder_key).count(), 2);
}

#[test]
fn test_placeholder_suppression_ignores_usage_order() {
    // "cr_shared_pp" resolves by id; "Cr Shared PP" does not resolve but
    // normalizes to the same name. No placeholder may appear beside the
    // standard edge, no matter which usage the definition lists first, and
    // the unresolvable usage is still reported either way.
    let resolved = json!({ "connectionReferenceId": "cr_shared_pp" });
    let unresolvable = json!({ "connectionReferenceId": "Cr Shared PP" });
    let orderings = [
        json!({ "a": resolved.clone(), "b": unresolvable.clone() }),
        json!({ "a": unresolvable, "b": resolved }),
    ];

    for definition in orderings {
        let graph = aggregate(
            vec![flow("F1", "F1", definition)],
            vec![reference("cr_shared_pp", "Accounting Reference", None)],
            vec![],
        );

        assert_eq!(graph.placeholder_count(), 0);
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.edges()[0].kind, EdgeKind::Standard);
        assert!(
            graph
                .diagnostics()
                .iter()
                .any(|d| matches!(d, Diagnostic::UnresolvedUsage { raw_name, .. } if raw_name == "Cr Shared PP"))
        );
        assert_eq!(graph.unresolved().len(), 1);
    }
}

#[test]
fn test_malformed_definition_degrades_to_diagnostic() {
    let graph = aggregate(
        vec![
            flow("F1", "F1", json!("not an object")),
            cr_map_flow("F2", "sharedpp"),
        ],
        vec![reference("CR1", "sharedpp", None)],
        vec![],
    );

    // The bad flow gets a node and a warning; the good flow still resolves.
    assert!(graph.contains(&NodeKey::new(NodeKind::Flow, "F1")));
    assert!(
        graph
            .diagnostics()
            .iter()
            .any(|d| matches!(d, Diagnostic::MalformedDefinition { flow_id } if flow_id == "F1"))
    );
    assert_eq!(graph.edges().len(), 1);
}

#[test]
fn test_inline_connection_detection() {
    let graph = aggregate(
        vec![flow(
            "F1",
            "F1",
            json!({
                "actions": {
                    "step": {
                        "connectorType": "shared_office365",
                        "connection": { "name": "OfficeConn" }
                    }
                }
            }),
        )],
        vec![],
        vec![connection("C9", "OfficeConn")],
    );

    assert_eq!(graph.placeholder_count(), 0);
    let inline_diagnostics: Vec<_> = graph
        .diagnostics()
        .iter()
        .filter(|d| matches!(d, Diagnostic::InlineConnection { .. }))
        .collect();
    assert_eq!(inline_diagnostics.len(), 1);

    let flow_key = NodeKey::new(NodeKind::Flow, "F1");
    let conn_key = NodeKey::new(NodeKind::Connection, "C9");
    assert!(
        graph
            .edges_from(&flow_key)
            .any(|e| e.to == conn_key && e.kind == EdgeKind::Inline)
    );
}

#[test]
fn test_unbound_reference_is_valid() {
    let graph = aggregate(
        vec![cr_map_flow("F1", "sharedpp")],
        vec![reference("CR1", "sharedpp", None)],
        vec![connection("C1", "unrelated")],
    );

    let cr_key = NodeKey::new(NodeKind::ConnectionReference, "CR1");
    assert_eq!(graph.edges_from(&cr_key).count(), 0);
    assert!(graph.diagnostics().is_empty());
}

#[test]
fn test_binding_to_unknown_connection_stays_unlinked() {
    let graph = aggregate(
        vec![cr_map_flow("F1", "sharedpp")],
        vec![reference("CR1", "sharedpp", Some("C404"))],
        vec![],
    );

    assert_eq!(graph.nodes_of_kind(NodeKind::Connection).count(), 0);
    assert_eq!(graph.edges().len(), 1);
}

#[test]
fn test_determinism_under_input_reordering() {
    let flows = vec![
        cr_map_flow("F1", "sharedpp"),
        cr_map_flow("F2", "shared_sql"),
        flow("F3", "F3", json!({ "connectionReferenceId": "crGhost" })),
    ];
    let references = vec![
        reference("CR1", "sharedpp", Some("C1")),
        reference("CR2", "shared_sql", None),
    ];
    let connections = vec![connection("C1", "PP"), connection("C2", "SQL")];

    let forward = aggregate(flows.clone(), references.clone(), connections.clone());
    let reversed = aggregate(
        flows.into_iter().rev().collect(),
        references.into_iter().rev().collect(),
        connections.into_iter().rev().collect(),
    );

    let node_set = |g: &RelationshipGraph| {
        let mut keys: Vec<String> = g.nodes().iter().map(|n| n.key().to_string()).collect();
        keys.sort();
        keys
    };
    let edge_set = |g: &RelationshipGraph| {
        let mut keys: Vec<String> = g
            .edges()
            .iter()
            .map(|e| format!("{}->{}:{:?}", e.from, e.to, e.kind))
            .collect();
        keys.sort();
        keys
    };

    assert_eq!(node_set(&forward), node_set(&reversed));
    assert_eq!(edge_set(&forward), edge_set(&reversed));
}

#[test]
fn test_repeated_runs_are_identical() {
    let aggregator = Aggregator::builder(
        vec![cr_map_flow("F1", "sharedpp"), cr_map_flow("F2", "sharedpp")],
        vec![reference("CR1", "sharedpp", Some("C1"))],
        vec![connection("C1", "PP")],
    )
    .with_parse_concurrency(2)
    .build();

    let first = aggregator.aggregate().expect("first run");
    let second = aggregator.aggregate().expect("second run");
    assert_eq!(first.nodes(), second.nodes());
    assert_eq!(first.edges(), second.edges());
}

#[test]
fn test_custom_tier_extends_the_chain() {
    struct AliasTier;
    impl MatchTier for AliasTier {
        fn tier_name(&self) -> &'static str {
            "alias"
        }
        fn confidence(&self) -> MatchConfidence {
            MatchConfidence::Fuzzy
        }
        fn resolve(
            &self,
            raw_name: &str,
            records: &[ConnectionReferenceRecord],
        ) -> TierOutcome {
            if raw_name == "legacy_alias" {
                records
                    .iter()
                    .position(|r| r.logical_name == "sharedpp")
                    .map(TierOutcome::Match)
                    .unwrap_or(TierOutcome::NoMatch)
            } else {
                TierOutcome::NoMatch
            }
        }
    }

    let graph = Aggregator::builder(
        vec![flow(
            "F1",
            "F1",
            json!({ "connectionReferenceId": "legacy_alias" }),
        )],
        vec![reference("CR1", "sharedpp", None)],
        vec![],
    )
    .with_tier(Box::new(AliasTier))
    .build()
    .aggregate()
    .expect("aggregation should not fail");

    assert_eq!(graph.placeholder_count(), 0);
    assert_eq!(graph.edges().len(), 1);
}
