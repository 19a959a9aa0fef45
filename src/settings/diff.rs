//! Diffing an existing settings document against a freshly generated one.

use crate::error::SettingsError;
use crate::settings::document::{ConnectionReferenceSetting, DeploymentSettings};
use ahash::AHashMap;
use serde::Serialize;
use std::fmt;

/// One entry whose bound connection differs between the two documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangedEntry {
    pub key: String,
    pub old: Option<String>,
    pub new: Option<String>,
}

/// The reconciliation result; immutable once computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsDiff {
    /// Present only in the generated document.
    pub added: Vec<ConnectionReferenceSetting>,
    /// Present only in the existing document. Callers usually retain these:
    /// an entry no longer referenced in-repo may still be deployed on
    /// purpose.
    pub removed: Vec<ConnectionReferenceSetting>,
    /// Present in both, with a different `connectionId`.
    pub changed: Vec<ChangedEntry>,
    pub unchanged: usize,
}

impl SettingsDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

// Summary line used by CLI output and logs.
impl fmt::Display for SettingsDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} removed, {} changed, {} unchanged",
            self.added.len(),
            self.removed.len(),
            self.changed.len(),
            self.unchanged
        )
    }
}

/// Computes the diff between an existing document (absent on first run) and a
/// generated one.
///
/// Both documents are validated first; diffing with duplicate keys would be
/// ambiguous.
pub fn diff(
    existing: Option<&DeploymentSettings>,
    generated: &DeploymentSettings,
) -> Result<SettingsDiff, SettingsError> {
    generated.validate()?;

    let Some(existing) = existing else {
        return Ok(SettingsDiff {
            added: generated.connection_references.clone(),
            removed: Vec::new(),
            changed: Vec::new(),
            unchanged: 0,
        });
    };
    existing.validate()?;

    let existing_by_key: AHashMap<&str, &ConnectionReferenceSetting> = existing
        .connection_references
        .iter()
        .map(|e| (e.key.as_str(), e))
        .collect();
    let generated_keys: ahash::AHashSet<&str> = generated
        .connection_references
        .iter()
        .map(|e| e.key.as_str())
        .collect();

    let mut added = Vec::new();
    let mut changed = Vec::new();
    let mut unchanged = 0usize;

    for entry in &generated.connection_references {
        match existing_by_key.get(entry.key.as_str()) {
            None => added.push(entry.clone()),
            Some(old) if old.value.connection_id != entry.value.connection_id => {
                changed.push(ChangedEntry {
                    key: entry.key.clone(),
                    old: old.value.connection_id.clone(),
                    new: entry.value.connection_id.clone(),
                });
            }
            Some(_) => unchanged += 1,
        }
    }

    let removed = existing
        .connection_references
        .iter()
        .filter(|e| !generated_keys.contains(e.key.as_str()))
        .cloned()
        .collect();

    Ok(SettingsDiff {
        added,
        removed,
        changed,
        unchanged,
    })
}
