use crate::tree::TreePath;
use thiserror::Error;

/// Warning-grade findings attached to a [`RelationshipGraph`](crate::graph::RelationshipGraph).
///
/// None of these abort an aggregation run: a single bad flow degrades into an
/// annotation so the rest of the environment stays visible.
#[derive(Error, Debug, Clone, PartialEq, serde::Serialize)]
pub enum Diagnostic {
    #[error(
        "Flow '{flow_id}' references '{raw_name}' at {path}, which matches no known connection reference"
    )]
    UnresolvedUsage {
        flow_id: String,
        raw_name: String,
        path: TreePath,
    },

    #[error(
        "Flow '{flow_id}' reference '{raw_name}' is ambiguous between {candidates:?}; left unmatched rather than guessed"
    )]
    AmbiguousMatch {
        flow_id: String,
        raw_name: String,
        candidates: Vec<String>,
    },

    #[error(
        "Flow '{flow_id}' has a definition that could not be interpreted; treated as having zero usages"
    )]
    MalformedDefinition { flow_id: String },

    #[error("Flow '{flow_id}' embeds connection details inline at {path}; nothing to externalize")]
    InlineConnection { flow_id: String, path: TreePath },
}

impl Diagnostic {
    /// The id of the flow this finding belongs to.
    pub fn flow_id(&self) -> &str {
        match self {
            Diagnostic::UnresolvedUsage { flow_id, .. }
            | Diagnostic::AmbiguousMatch { flow_id, .. }
            | Diagnostic::MalformedDefinition { flow_id }
            | Diagnostic::InlineConnection { flow_id, .. } => flow_id,
        }
    }
}

/// Errors that indicate a bug in graph construction, not bad input data.
#[derive(Error, Debug, Clone)]
pub enum GraphBuildError {
    #[error("Edge from '{from}' to '{to}' references a node that is not part of the graph")]
    DanglingEdge { from: String, to: String },
}

/// Errors raised while reading, generating, or reconciling a deployment
/// settings file.
///
/// Unlike [`Diagnostic`]s these are hard failures: the specific settings
/// operation aborts and the file on disk is left untouched.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings file '{path}' is not a valid deployment settings document: {message}")]
    ParseFailure { path: String, message: String },

    #[error("Could not write backup '{path}': {message}")]
    BackupWriteFailure { path: String, message: String },

    #[error("Backup path '{path}' and every fallback name already exist; refusing to overwrite")]
    BackupCollision { path: String },

    #[error("Duplicate settings key '{key}'; keys must be unique within one document")]
    DuplicateKey { key: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
