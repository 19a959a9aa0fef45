//! The three read-only record collections an aggregation run consumes.
//!
//! Fetching (authentication, paging, retry) belongs to an upstream
//! collaborator; this crate only requires the resulting plain data.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One Power Automate cloud flow as stored in the environment.
///
/// The `definition` payload is treated as an opaque tree and is never mutated.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FlowRecord {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "solutionId")]
    pub solution_id: Option<String>,
    pub definition: JsonValue,
}

/// An environment-level connection reference record.
///
/// This set is the authoritative answer to "does this connection reference
/// exist"; flows only ever hold loose references into it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConnectionReferenceRecord {
    pub id: String,
    /// The logical name a flow binds against, e.g. `shared_commondataservice_ref`.
    #[serde(alias = "logicalName")]
    pub logical_name: String,
    /// The logical connector name, e.g. `shared_commondataservice`.
    #[serde(default, alias = "connectorId")]
    pub connector_id: Option<String>,
    /// The currently bound connection, if any. Unbound is a valid state.
    #[serde(default, alias = "connectionId")]
    pub connection_id: Option<String>,
}

/// A runtime connection instance a connection reference may point to.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConnectionRecord {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "connectorType")]
    pub connector_type: Option<String>,
    #[serde(default, alias = "environmentId")]
    pub environment_id: Option<String>,
}
