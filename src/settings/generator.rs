//! Projection of a [`RelationshipGraph`] into a deployment settings skeleton.

use crate::error::{Diagnostic, SettingsError};
use crate::graph::{NodeKind, RelationshipGraph};
use crate::settings::document::{
    ConnectionReferenceBinding, ConnectionReferenceSetting, DeploymentSettings,
    EnvironmentVariableSetting,
};

/// Annotation carried by placeholder entries so downstream tooling can flag
/// them before a deploy.
pub const PLACEHOLDER_NOTE: &str =
    "needs creation before deploy: no matching connection reference exists in the environment";

/// An environment-variable definition supplied by the environment-variable
/// collaborator; this crate only projects it into the skeleton.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct EnvironmentVariableDefinition {
    #[serde(alias = "schemaName")]
    pub schema_name: String,
    #[serde(default, alias = "defaultValue")]
    pub default_value: Option<String>,
}

/// Options for [`generate`].
#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    /// When present, an `environmentVariables` section is emitted from these
    /// definitions; when absent, the section is omitted entirely.
    pub environment_variables: Option<Vec<EnvironmentVariableDefinition>>,
}

/// The generator's output: the skeleton plus warnings the caller should
/// surface (currently inline-connection flows, which have nothing to
/// externalize and are excluded from the skeleton).
#[derive(Debug, Clone)]
pub struct GeneratedSettings {
    pub settings: DeploymentSettings,
    pub warnings: Vec<Diagnostic>,
}

/// Projects the graph into a deployment settings document.
///
/// Entries are sorted by logical name, so generating twice from the same
/// graph yields byte-identical output.
pub fn generate(
    graph: &RelationshipGraph,
    options: &GeneratorOptions,
) -> Result<GeneratedSettings, SettingsError> {
    let mut entries: Vec<ConnectionReferenceSetting> = graph
        .nodes_of_kind(NodeKind::ConnectionReference)
        .map(|node| ConnectionReferenceSetting {
            key: node.display_name.clone(),
            value: ConnectionReferenceBinding {
                connection_reference_logical_name: node.display_name.clone(),
                connection_id: node.bound_connection_id.clone(),
                note: node.placeholder.then(|| PLACEHOLDER_NOTE.to_string()),
            },
        })
        .collect();
    entries.sort_by(|a, b| a.key.cmp(&b.key));

    let environment_variables = options.environment_variables.as_ref().map(|definitions| {
        let mut vars: Vec<EnvironmentVariableSetting> = definitions
            .iter()
            .map(|def| EnvironmentVariableSetting {
                key: def.schema_name.clone(),
                value: def.default_value.clone(),
            })
            .collect();
        vars.sort_by(|a, b| a.key.cmp(&b.key));
        vars
    });

    let settings = DeploymentSettings {
        connection_references: entries,
        environment_variables,
    };
    settings.validate()?;

    let warnings = graph
        .diagnostics()
        .iter()
        .filter(|d| matches!(d, Diagnostic::InlineConnection { .. }))
        .cloned()
        .collect();

    Ok(GeneratedSettings { settings, warnings })
}
