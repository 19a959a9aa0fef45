//! The on-disk deployment settings document.
//!
//! The JSON shape here is a contract shared with downstream ALM packaging
//! tools: a `connectionReferences` array of `{ key, value: {
//! connectionReferenceLogicalName, connectionId } }` entries plus an optional
//! `environmentVariables` array. Reading and writing must preserve exactly
//! this shape.

use crate::error::SettingsError;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// The portable configuration skeleton consumed by deployment pipelines.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct DeploymentSettings {
    #[serde(rename = "connectionReferences", default)]
    pub connection_references: Vec<ConnectionReferenceSetting>,
    #[serde(
        rename = "environmentVariables",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub environment_variables: Option<Vec<EnvironmentVariableSetting>>,
}

/// One connection-reference binding entry. Keys are unique per document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConnectionReferenceSetting {
    pub key: String,
    pub value: ConnectionReferenceBinding,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConnectionReferenceBinding {
    #[serde(rename = "connectionReferenceLogicalName")]
    pub connection_reference_logical_name: String,
    /// `null` until an environment-specific connection is bound in.
    #[serde(rename = "connectionId")]
    pub connection_id: Option<String>,
    /// Extra annotation for entries that need attention before deploying,
    /// e.g. placeholders. Omitted entirely for ordinary entries so the wire
    /// shape stays unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One environment-variable entry; the value is a placeholder until a target
/// environment fills it in.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EnvironmentVariableSetting {
    pub key: String,
    pub value: Option<String>,
}

impl DeploymentSettings {
    /// Checks the document invariants, currently key uniqueness in both
    /// sections.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if let Some(key) = self
            .connection_references
            .iter()
            .map(|e| e.key.as_str())
            .duplicates()
            .next()
        {
            return Err(SettingsError::DuplicateKey {
                key: key.to_string(),
            });
        }
        if let Some(vars) = &self.environment_variables {
            if let Some(key) = vars.iter().map(|e| e.key.as_str()).duplicates().next() {
                return Err(SettingsError::DuplicateKey {
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Looks up a connection-reference entry by key.
    pub fn entry(&self, key: &str) -> Option<&ConnectionReferenceSetting> {
        self.connection_references.iter().find(|e| e.key == key)
    }

    /// Reads and validates a settings file. An unreadable or invalid file is
    /// a hard error: diffing against a broken baseline is unsafe.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings: DeploymentSettings =
            serde_json::from_str(&content).map_err(|e| SettingsError::ParseFailure {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates and writes the document as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        self.validate()?;
        let mut json =
            serde_json::to_string_pretty(self).map_err(|e| SettingsError::ParseFailure {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        json.push('\n');
        fs::write(path, json).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}
