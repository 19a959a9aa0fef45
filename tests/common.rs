//! Common test utilities for building record fixtures.
use kizuna::prelude::*;
use serde_json::Value;

/// Creates a flow record with the given raw definition payload.
#[allow(dead_code)]
pub fn flow(id: &str, name: &str, definition: Value) -> FlowRecord {
    FlowRecord {
        id: id.to_string(),
        name: name.to_string(),
        solution_id: None,
        definition,
    }
}

/// Creates a connection reference record, optionally bound to a connection.
#[allow(dead_code)]
pub fn reference(id: &str, logical_name: &str, connection_id: Option<&str>) -> ConnectionReferenceRecord {
    ConnectionReferenceRecord {
        id: id.to_string(),
        logical_name: logical_name.to_string(),
        connector_id: None,
        connection_id: connection_id.map(str::to_string),
    }
}

/// Creates a connection record.
#[allow(dead_code)]
pub fn connection(id: &str, name: &str) -> ConnectionRecord {
    ConnectionRecord {
        id: id.to_string(),
        name: name.to_string(),
        connector_type: None,
        environment_id: None,
    }
}

/// Runs a default-configured aggregation over the given records.
#[allow(dead_code)]
pub fn aggregate(
    flows: Vec<FlowRecord>,
    references: Vec<ConnectionReferenceRecord>,
    connections: Vec<ConnectionRecord>,
) -> RelationshipGraph {
    Aggregator::builder(flows, references, connections)
        .build()
        .aggregate()
        .expect("aggregation should not fail")
}
