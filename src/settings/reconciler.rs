//! Safe merging of a generated settings document into the file on disk.
//!
//! The reconciler never applies unattended: callers compute a diff, show it,
//! obtain explicit confirmation, and only then call [`Reconciler::apply`].
//! Before the original file is touched a timestamped backup must exist and be
//! verified; a failed backup aborts the whole operation.

use crate::error::SettingsError;
use crate::settings::diff::{SettingsDiff, diff};
use crate::settings::document::{
    ConnectionReferenceSetting, DeploymentSettings, EnvironmentVariableSetting,
};
use ahash::AHashSet;
use chrono::Utc;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// The settings file is a single-writer resource; interleaved backup+write
// sequences from two callers would corrupt it.
static APPLY_LOCK: Mutex<()> = Mutex::new(());

// Two applies can land in the same millisecond; a counter suffix keeps their
// backup names apart before the name is declared taken.
const BACKUP_NAME_ATTEMPTS: u32 = 8;

/// Options for [`Reconciler::apply`].
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Delete entries present only in the existing file. Off by default:
    /// entries curated per target environment are retained.
    pub prune_removed: bool,
}

/// Confirmation returned by a successful apply.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// Where the pre-apply state of the file was backed up, when a file
    /// existed to back up.
    pub backup_path: Option<PathBuf>,
    pub added: usize,
    pub changed: usize,
    pub pruned: usize,
}

/// Reads, diffs, backs up, and rewrites one deployment settings file.
///
/// Performs no network I/O; the only filesystem it touches is the settings
/// path it was created with and the backup next to it.
pub struct Reconciler {
    path: PathBuf,
}

impl Reconciler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the existing document, or `None` when no file exists yet. An
    /// unparseable file is a hard error.
    pub fn load_existing(&self) -> Result<Option<DeploymentSettings>, SettingsError> {
        if !self.path.exists() {
            return Ok(None);
        }
        DeploymentSettings::from_file(&self.path).map(Some)
    }

    /// Diffs the generated document against whatever is on disk.
    pub fn diff_against(&self, generated: &DeploymentSettings) -> Result<SettingsDiff, SettingsError> {
        let existing = self.load_existing()?;
        diff(existing.as_ref(), generated)
    }

    /// Merges the generated document into the file, additively by default.
    ///
    /// Only call this after the caller has confirmed the diff. Added and
    /// changed entries are written; removed entries are retained unless
    /// `prune_removed` is set.
    pub fn apply(
        &self,
        diff: &SettingsDiff,
        generated: &DeploymentSettings,
        options: &ApplyOptions,
    ) -> Result<ApplyOutcome, SettingsError> {
        let _guard = APPLY_LOCK.lock().unwrap_or_else(|poisoned| {
            warn!("Apply lock was poisoned by a previous panic; continuing");
            poisoned.into_inner()
        });

        let existing = self.load_existing()?;
        let backup_path = match &existing {
            Some(_) => Some(self.write_backup()?),
            None => None,
        };

        let merged = merge(existing.as_ref(), diff, generated, options);
        merged.save(&self.path)?;

        debug!(
            "Applied settings to '{}' ({} added, {} changed)",
            self.path.display(),
            diff.added.len(),
            diff.changed.len()
        );
        Ok(ApplyOutcome {
            backup_path,
            added: diff.added.len(),
            changed: diff.changed.len(),
            pruned: if options.prune_removed {
                diff.removed.len()
            } else {
                0
            },
        })
    }

    /// Copies the current file to a timestamped sibling and verifies the
    /// copy. Never overwrites an earlier backup.
    fn write_backup(&self) -> Result<PathBuf, SettingsError> {
        let timestamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string();
        let backup = self.backup_path_for(&timestamp)?;

        fs::copy(&self.path, &backup).map_err(|e| SettingsError::BackupWriteFailure {
            path: backup.display().to_string(),
            message: e.to_string(),
        })?;

        let original_len = fs::metadata(&self.path).map(|m| m.len());
        let backup_len = fs::metadata(&backup).map(|m| m.len());
        match (original_len, backup_len) {
            (Ok(a), Ok(b)) if a == b => {
                debug!("Backup written to '{}'", backup.display());
                Ok(backup)
            }
            _ => Err(SettingsError::BackupWriteFailure {
                path: backup.display().to_string(),
                message: "backup verification failed".to_string(),
            }),
        }
    }

    /// Picks the backup destination for `timestamp`: the timestamped sibling
    /// itself, or the first free `-1`, `-2`, ... variant when it is taken.
    /// Every candidate being taken is a [`SettingsError::BackupCollision`].
    pub fn backup_path_for(&self, timestamp: &str) -> Result<PathBuf, SettingsError> {
        let first = self.backup_candidate(timestamp);
        if !first.exists() {
            return Ok(first);
        }
        for attempt in 1..BACKUP_NAME_ATTEMPTS {
            let candidate = self.backup_candidate(&format!("{timestamp}-{attempt}"));
            if !candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(SettingsError::BackupCollision {
            path: first.display().to_string(),
        })
    }

    /// `deploymentsettings.json` becomes `deploymentsettings.<label>.json`;
    /// extensionless paths get the label appended.
    fn backup_candidate(&self, label: &str) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match self.path.extension() {
            Some(ext) => format!("{}.{}.{}", stem, label, ext.to_string_lossy()),
            None => format!("{}.{}", stem, label),
        };
        self.path.with_file_name(name)
    }
}

/// Builds the merged document: existing entries in their original order,
/// updated values for changed keys, generated-only entries appended.
fn merge(
    existing: Option<&DeploymentSettings>,
    diff: &SettingsDiff,
    generated: &DeploymentSettings,
    options: &ApplyOptions,
) -> DeploymentSettings {
    let Some(existing) = existing else {
        return generated.clone();
    };

    let changed_keys: AHashSet<&str> = diff.changed.iter().map(|c| c.key.as_str()).collect();
    let removed_keys: AHashSet<&str> = diff.removed.iter().map(|e| e.key.as_str()).collect();

    let mut entries: Vec<ConnectionReferenceSetting> = Vec::new();
    for entry in &existing.connection_references {
        if options.prune_removed && removed_keys.contains(entry.key.as_str()) {
            continue;
        }
        if changed_keys.contains(entry.key.as_str()) {
            if let Some(new_entry) = generated.entry(&entry.key) {
                entries.push(new_entry.clone());
                continue;
            }
        }
        entries.push(entry.clone());
    }
    for entry in &diff.added {
        entries.push(entry.clone());
    }

    // Environment variables merge additively as well: existing values are
    // environment-specific curation and survive untouched, missing keys are
    // appended as placeholders.
    let environment_variables = merge_environment_variables(
        existing.environment_variables.as_deref(),
        generated.environment_variables.as_deref(),
    );

    DeploymentSettings {
        connection_references: entries,
        environment_variables,
    }
}

fn merge_environment_variables(
    existing: Option<&[EnvironmentVariableSetting]>,
    generated: Option<&[EnvironmentVariableSetting]>,
) -> Option<Vec<EnvironmentVariableSetting>> {
    match (existing, generated) {
        (None, None) => None,
        (Some(vars), None) => Some(vars.to_vec()),
        (None, Some(vars)) => Some(vars.to_vec()),
        (Some(old), Some(new)) => {
            let mut merged: Vec<EnvironmentVariableSetting> = old.to_vec();
            let known: AHashSet<&str> = old.iter().map(|e| e.key.as_str()).collect();
            merged.extend(
                new.iter()
                    .filter(|e| !known.contains(e.key.as_str()))
                    .cloned(),
            );
            Some(merged)
        }
    }
}
