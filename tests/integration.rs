//! End-to-end pipeline tests: records in, reconciled settings file out.
mod common;
use common::*;
use kizuna::prelude::*;
use serde_json::json;
use tempfile::tempdir;

fn dev_records() -> (Vec<FlowRecord>, Vec<ConnectionReferenceRecord>, Vec<ConnectionRecord>) {
    let flows = vec![
        flow(
            "F1",
            "Invoice sync",
            json!({
                "properties": {
                    "connectionReferences": {
                        "shared_dataverse_ref": { "api": { "name": "shared_commondataservice" } }
                    }
                }
            }),
        ),
        flow(
            "F2",
            "Mail digest",
            json!({
                "actions": {
                    "notify": { "connectionReferenceId": "shared_office365_ref" }
                }
            }),
        ),
        flow(
            "F3",
            "Legacy import",
            json!({ "trigger": { "connectionReferenceId": "cr_legacy_import" } }),
        ),
    ];
    let references = vec![
        reference("CR1", "shared_dataverse_ref", Some("C1")),
        reference("CR2", "shared_office365_ref", None),
    ];
    let connections = vec![connection("C1", "Dataverse prod")];
    (flows, references, connections)
}

#[test]
fn test_full_pipeline_first_run_then_rebind() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("deploymentsettings.json");

    // --- First run: nothing on disk yet ---
    let (flows, references, connections) = dev_records();
    let graph = aggregate(flows, references, connections);
    assert_eq!(graph.placeholder_count(), 1); // cr_legacy_import

    let generated = generate(&graph, &GeneratorOptions::default()).expect("generate");
    let reconciler = Reconciler::new(&path);
    let diff = reconciler.diff_against(&generated.settings).expect("diff");
    assert_eq!(diff.added.len(), 3);

    reconciler
        .apply(&diff, &generated.settings, &ApplyOptions::default())
        .expect("first apply");

    // Re-running immediately yields a clean diff.
    let diff = reconciler.diff_against(&generated.settings).expect("rediff");
    assert!(diff.is_empty());

    // --- Second run: the dataverse reference got rebound upstream ---
    let (flows, mut references, mut connections) = dev_records();
    references[0].connection_id = Some("C2".to_string());
    connections.push(connection("C2", "Dataverse prod v2"));

    let graph = aggregate(flows, references, connections);
    let generated = generate(&graph, &GeneratorOptions::default()).expect("generate");
    let diff = reconciler.diff_against(&generated.settings).expect("diff");
    assert_eq!(diff.changed.len(), 1);
    assert_eq!(diff.changed[0].key, "shared_dataverse_ref");
    assert_eq!(diff.changed[0].old.as_deref(), Some("C1"));
    assert_eq!(diff.changed[0].new.as_deref(), Some("C2"));

    let outcome = reconciler
        .apply(&diff, &generated.settings, &ApplyOptions::default())
        .expect("second apply");
    assert!(outcome.backup_path.is_some());

    let on_disk = DeploymentSettings::from_file(&path).expect("reload");
    assert_eq!(
        on_disk
            .entry("shared_dataverse_ref")
            .expect("entry")
            .value
            .connection_id,
        Some("C2".to_string())
    );
    // The unresolved reference is still tracked as a placeholder entry.
    assert!(on_disk.entry("cr_legacy_import").is_some());
}

#[test]
fn test_graph_reflects_all_three_tiers() {
    let (flows, references, connections) = dev_records();
    let graph = aggregate(flows, references, connections);

    assert_eq!(graph.nodes_of_kind(NodeKind::Flow).count(), 3);
    // Two real references plus one placeholder.
    assert_eq!(
        graph.nodes_of_kind(NodeKind::ConnectionReference).count(),
        3
    );
    assert_eq!(graph.nodes_of_kind(NodeKind::Connection).count(), 1);

    // Flow -> CR edges for all three flows, CR -> Connection for the bound one.
    assert_eq!(graph.edges().len(), 4);
}

#[test]
fn test_pipeline_survives_one_bad_flow() {
    let (mut flows, references, connections) = dev_records();
    flows.push(flow("F4", "Broken", json!(17)));

    let graph = aggregate(flows, references, connections);
    assert!(
        graph
            .diagnostics()
            .iter()
            .any(|d| matches!(d, Diagnostic::MalformedDefinition { flow_id } if flow_id == "F4"))
    );
    // Everything else still aggregated.
    assert_eq!(graph.nodes_of_kind(NodeKind::Flow).count(), 4);
    let generated = generate(&graph, &GeneratorOptions::default()).expect("generate");
    assert_eq!(generated.settings.connection_references.len(), 3);
}
