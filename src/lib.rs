//! # Kizuna - Relationship Aggregation and Deployment Settings Engine
//!
//! **Kizuna** reconstructs the three-tier dependency graph behind a Power
//! Platform environment — Flow → Connection Reference → Connection — from
//! heterogeneous, loosely-structured flow definitions, and turns that graph
//! into a versionable deployment settings artifact that can be safely merged
//! into an existing one.
//!
//! ## Core Workflow
//!
//! The engine is format-agnostic and fetch-agnostic. An upstream collaborator
//! supplies the three record collections (flows, connection references,
//! connections) as plain data; legacy XML-derived definitions enter through
//! the [`IntoTree`](tree::IntoTree) adapter trait. The primary workflow is:
//!
//! 1.  **Aggregate**: build an [`Aggregator`](aggregator::Aggregator) from the
//!     record collections and run it. Each flow definition is parsed into
//!     candidate usages (in parallel), every usage is resolved through the
//!     ordered matching tiers, and the result is one immutable
//!     [`RelationshipGraph`](graph::RelationshipGraph) with orphan and
//!     placeholder detection baked in.
//! 2.  **Generate**: project the graph into a
//!     [`DeploymentSettings`](settings::DeploymentSettings) skeleton, sorted
//!     and reproducible so the file diffs cleanly between runs.
//! 3.  **Reconcile**: diff the generated skeleton against the settings file
//!     already on disk, show the [`SettingsDiff`](settings::SettingsDiff) to
//!     the caller, and apply the merge only after explicit confirmation, with
//!     a verified timestamped backup written first.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kizuna::prelude::*;
//! use serde_json::json;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Record collections normally come from the environment's Web API.
//!     let flows = vec![FlowRecord {
//!         id: "F1".to_string(),
//!         name: "Invoice sync".to_string(),
//!         solution_id: None,
//!         definition: json!({
//!             "connectionReferences": { "sharedpp": { "api": "shared_pp" } }
//!         }),
//!     }];
//!     let references = vec![ConnectionReferenceRecord {
//!         id: "CR1".to_string(),
//!         logical_name: "sharedpp".to_string(),
//!         connector_id: Some("shared_pp".to_string()),
//!         connection_id: Some("C1".to_string()),
//!     }];
//!     let connections = vec![ConnectionRecord {
//!         id: "C1".to_string(),
//!         name: "PP Connection".to_string(),
//!         connector_type: None,
//!         environment_id: None,
//!     }];
//!
//!     // 1. Aggregate the records into a relationship graph.
//!     let aggregator = Aggregator::builder(flows, references, connections)
//!         .with_fuzzy_distance(2)
//!         .build();
//!     let graph = aggregator.aggregate()?;
//!
//!     // 2. Project the graph into a deployment settings skeleton.
//!     let generated = generate(&graph, &GeneratorOptions::default())?;
//!
//!     // 3. Diff against the file on disk and apply after confirmation.
//!     let reconciler = Reconciler::new("deploymentsettings.json");
//!     let diff = reconciler.diff_against(&generated.settings)?;
//!     if !diff.is_empty() {
//!         println!("Pending changes: {}", diff);
//!         // ... ask the user ...
//!         let outcome = reconciler.apply(&diff, &generated.settings, &ApplyOptions::default())?;
//!         if let Some(backup) = outcome.backup_path {
//!             println!("Previous settings backed up to {}", backup.display());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod cache;
pub mod error;
pub mod graph;
pub mod parser;
pub mod prelude;
pub mod records;
pub mod settings;
pub mod tree;
