//! Prelude module for convenient imports
//!
//! Re-exports the most commonly used types so callers can bring the whole
//! pipeline into scope with a single `use kizuna::prelude::*;`.

// Aggregation
pub use crate::aggregator::{Aggregator, AggregatorBuilder, DEFAULT_FUZZY_DISTANCE};
pub use crate::aggregator::matching::{MatchTier, TierOutcome};

// Input records and caching
pub use crate::cache::{CachedRecords, RecordCache};
pub use crate::records::{ConnectionRecord, ConnectionReferenceRecord, FlowRecord};

// Parsing
pub use crate::parser::{ConnectionReferenceUsage, MatchConfidence, parse_definition};
pub use crate::tree::{IntoTree, OpaqueTree, TreePath};

// The graph
pub use crate::graph::{
    EdgeKind, NodeKey, NodeKind, RelationshipEdge, RelationshipGraph, RelationshipNode,
};

// Settings generation and reconciliation
pub use crate::settings::{
    ApplyOptions, ApplyOutcome, DeploymentSettings, GeneratedSettings, GeneratorOptions,
    Reconciler, SettingsDiff, diff, generate,
};

// Error types
pub use crate::error::{Diagnostic, GraphBuildError, SettingsError};
