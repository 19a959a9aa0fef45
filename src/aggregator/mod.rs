//! Fan-in of parsed usages into one consistent [`RelationshipGraph`].
//!
//! Parsing is pure and independent per flow, so the fan-out runs on a bounded
//! rayon pool; all graph mutation happens in a single-threaded merge pass
//! afterwards, which keeps the build lock-free and the output deterministic.

use crate::cache::CachedRecords;
use crate::error::{Diagnostic, GraphBuildError};
use crate::graph::{EdgeKind, GraphBuilder, NodeKey, NodeKind, RelationshipGraph, RelationshipNode};
use crate::parser::{ConnectionReferenceUsage, MatchConfidence, parse_definition};
use crate::records::{ConnectionRecord, ConnectionReferenceRecord, FlowRecord};
use crate::tree::OpaqueTree;
use ahash::AHashSet;
use log::{debug, warn};
use rayon::prelude::*;

pub mod matching;

use matching::{MatchTier, TierOutcome, default_tiers, normalize_name};

/// Default edit-distance threshold for the fuzzy tier.
pub const DEFAULT_FUZZY_DISTANCE: usize = 2;

/// Configures and creates an [`Aggregator`].
pub struct AggregatorBuilder {
    flows: Vec<FlowRecord>,
    connection_references: Vec<ConnectionReferenceRecord>,
    connections: Vec<ConnectionRecord>,
    fuzzy_distance: usize,
    extra_tiers: Vec<Box<dyn MatchTier>>,
    parse_concurrency: Option<usize>,
}

impl AggregatorBuilder {
    pub fn new(
        flows: Vec<FlowRecord>,
        connection_references: Vec<ConnectionReferenceRecord>,
        connections: Vec<ConnectionRecord>,
    ) -> Self {
        Self {
            flows,
            connection_references,
            connections,
            fuzzy_distance: DEFAULT_FUZZY_DISTANCE,
            extra_tiers: Vec::new(),
            parse_concurrency: None,
        }
    }

    /// Overrides the fuzzy tier's edit-distance threshold.
    pub fn with_fuzzy_distance(mut self, distance: usize) -> Self {
        self.fuzzy_distance = distance;
        self
    }

    /// Appends a custom resolution tier after the standard chain, e.g. an
    /// alias table.
    pub fn with_tier(mut self, tier: Box<dyn MatchTier>) -> Self {
        self.extra_tiers.push(tier);
        self
    }

    /// Bounds the number of flows parsed concurrently. Unset means the global
    /// rayon pool decides.
    pub fn with_parse_concurrency(mut self, limit: usize) -> Self {
        self.parse_concurrency = Some(limit.max(1));
        self
    }

    pub fn build(self) -> Aggregator {
        let mut tiers = default_tiers(self.fuzzy_distance);
        tiers.extend(self.extra_tiers);
        Aggregator {
            flows: self.flows,
            connection_references: self.connection_references,
            connections: self.connections,
            tiers,
            parse_concurrency: self.parse_concurrency,
        }
    }
}

/// Combines candidate usages from every flow in scope with the authoritative
/// record sets, producing one [`RelationshipGraph`].
///
/// Performs no fetching and no I/O; it only consumes the plain record
/// collections it was built with.
pub struct Aggregator {
    flows: Vec<FlowRecord>,
    connection_references: Vec<ConnectionReferenceRecord>,
    connections: Vec<ConnectionRecord>,
    tiers: Vec<Box<dyn MatchTier>>,
    parse_concurrency: Option<usize>,
}

enum Resolution {
    Matched {
        record_index: usize,
        confidence: MatchConfidence,
    },
    Ambiguous(Vec<String>),
    NoMatch,
}

impl Aggregator {
    pub fn builder(
        flows: Vec<FlowRecord>,
        connection_references: Vec<ConnectionReferenceRecord>,
        connections: Vec<ConnectionRecord>,
    ) -> AggregatorBuilder {
        AggregatorBuilder::new(flows, connection_references, connections)
    }

    /// Creates a builder from a cached record set, cloning the records so the
    /// cache entry stays valid for later runs.
    pub fn from_cache(records: &CachedRecords) -> AggregatorBuilder {
        AggregatorBuilder::new(
            records.flows.clone(),
            records.connection_references.clone(),
            records.connections.clone(),
        )
    }

    /// Runs the full aggregation: parallel parse fan-out, then a serial merge
    /// into the graph.
    ///
    /// Per-flow problems degrade into [`Diagnostic`]s; the only error this
    /// returns is a graph-construction bug, which healthy inputs never hit.
    pub fn aggregate(&self) -> Result<RelationshipGraph, GraphBuildError> {
        let parse = || {
            self.flows
                .par_iter()
                .map(|flow| {
                    let tree = OpaqueTree::from(&flow.definition);
                    if tree.is_object() {
                        ParsedFlow {
                            malformed: false,
                            usages: parse_definition(&flow.id, &tree),
                        }
                    } else {
                        ParsedFlow {
                            malformed: true,
                            usages: Vec::new(),
                        }
                    }
                })
                .collect::<Vec<_>>()
        };

        let parsed = match self.parse_concurrency {
            Some(limit) => match rayon::ThreadPoolBuilder::new().num_threads(limit).build() {
                Ok(pool) => pool.install(parse),
                Err(e) => {
                    warn!("Could not build bounded parse pool ({}); using the global pool", e);
                    parse()
                }
            },
            None => parse(),
        };

        self.merge(parsed)
    }

    fn merge(&self, parsed: Vec<ParsedFlow>) -> Result<RelationshipGraph, GraphBuildError> {
        let mut builder = GraphBuilder::new();
        // Record indices of every connection reference that ended up in the
        // graph, in first-use order, for the CR→Connection linking pass.
        let mut used_references: Vec<usize> = Vec::new();
        let mut used_set: AHashSet<usize> = AHashSet::new();

        for (flow, parsed_flow) in self.flows.iter().zip(parsed) {
            let flow_key = builder.add_node(RelationshipNode {
                kind: NodeKind::Flow,
                source_id: flow.id.clone(),
                display_name: flow.name.clone(),
                placeholder: false,
                bound_connection_id: None,
            });

            if parsed_flow.malformed {
                warn!("Flow '{}' has an uninterpretable definition", flow.id);
                builder.add_diagnostic(Diagnostic::MalformedDefinition {
                    flow_id: flow.id.clone(),
                });
                continue;
            }

            // Resolve every usage up front so that placeholder suppression
            // does not depend on the order usages appear in the definition:
            // a placeholder must never sit next to a standard edge for the
            // same normalized name, wherever each occurs.
            let mut resolutions: Vec<(ConnectionReferenceUsage, Option<Resolution>)> =
                Vec::with_capacity(parsed_flow.usages.len());
            let mut resolved_names: AHashSet<String> = AHashSet::new();
            for usage in parsed_flow.usages {
                if usage.confidence == MatchConfidence::Inline {
                    resolutions.push((usage, None));
                    continue;
                }
                let resolution = self.resolve(&usage.raw_name);
                if let Resolution::Matched { record_index, .. } = &resolution {
                    let record = &self.connection_references[*record_index];
                    resolved_names.insert(normalize_name(&record.logical_name));
                    resolved_names.insert(normalize_name(&usage.raw_name));
                }
                resolutions.push((usage, Some(resolution)));
            }

            for (usage, resolution) in resolutions {
                let Some(resolution) = resolution else {
                    self.merge_inline(&mut builder, &flow_key, &usage)?;
                    continue;
                };

                match resolution {
                    Resolution::Matched {
                        record_index,
                        confidence,
                    } => {
                        let record = &self.connection_references[record_index];
                        debug!(
                            "Flow '{}': '{}' resolved to '{}' ({})",
                            flow.id, usage.raw_name, record.logical_name, confidence
                        );
                        let cr_key = builder.add_node(reference_node(record));
                        builder.add_edge(flow_key.clone(), cr_key, EdgeKind::Standard)?;
                        if used_set.insert(record_index) {
                            used_references.push(record_index);
                        }
                    }
                    Resolution::Ambiguous(candidates) => {
                        warn!(
                            "Flow '{}': '{}' is ambiguous between {:?}",
                            flow.id, usage.raw_name, candidates
                        );
                        builder.add_diagnostic(Diagnostic::AmbiguousMatch {
                            flow_id: flow.id.clone(),
                            raw_name: usage.raw_name.clone(),
                            candidates,
                        });
                        builder.add_unresolved(ConnectionReferenceUsage {
                            confidence: MatchConfidence::Unmatched,
                            ..usage
                        });
                    }
                    Resolution::NoMatch => {
                        // Skip the node when the same normalized name already
                        // resolved elsewhere in this flow, but the usage is
                        // still reported and kept in the unresolved list.
                        if !resolved_names.contains(&normalize_name(&usage.raw_name)) {
                            let placeholder_key = builder.add_node(RelationshipNode {
                                kind: NodeKind::ConnectionReference,
                                source_id: usage.raw_name.clone(),
                                display_name: usage.raw_name.clone(),
                                placeholder: true,
                                bound_connection_id: None,
                            });
                            builder.add_edge(
                                flow_key.clone(),
                                placeholder_key,
                                EdgeKind::Placeholder,
                            )?;
                        }
                        builder.add_diagnostic(Diagnostic::UnresolvedUsage {
                            flow_id: flow.id.clone(),
                            raw_name: usage.raw_name.clone(),
                            path: usage.path.clone(),
                        });
                        builder.add_unresolved(ConnectionReferenceUsage {
                            confidence: MatchConfidence::Unmatched,
                            ..usage
                        });
                    }
                }
            }
        }

        // Second tier of edges: each used reference links to its bound
        // connection, when that connection actually exists. Unbound is fine.
        for record_index in used_references {
            let record = &self.connection_references[record_index];
            let Some(connection_id) = &record.connection_id else {
                continue;
            };
            match self.connections.iter().find(|c| &c.id == connection_id) {
                Some(connection) => {
                    let cr_key =
                        NodeKey::new(NodeKind::ConnectionReference, record.id.clone());
                    let conn_key = builder.add_node(connection_node(connection));
                    builder.add_edge(cr_key, conn_key, EdgeKind::Standard)?;
                }
                None => debug!(
                    "Reference '{}' is bound to unknown connection '{}'",
                    record.logical_name, connection_id
                ),
            }
        }

        Ok(builder.finish())
    }

    fn merge_inline(
        &self,
        builder: &mut GraphBuilder,
        flow_key: &NodeKey,
        usage: &ConnectionReferenceUsage,
    ) -> Result<(), GraphBuildError> {
        builder.add_diagnostic(Diagnostic::InlineConnection {
            flow_id: usage.flow_id.clone(),
            path: usage.path.clone(),
        });

        // Best effort: if the inline payload names a known connection, the
        // graph still shows which one the flow talks to.
        let matched: Vec<&ConnectionRecord> = self
            .connections
            .iter()
            .filter(|c| c.id == usage.raw_name || c.name.eq_ignore_ascii_case(&usage.raw_name))
            .collect();
        if let [connection] = matched.as_slice() {
            let conn_key = builder.add_node(connection_node(connection));
            builder.add_edge(flow_key.clone(), conn_key, EdgeKind::Inline)?;
        }
        Ok(())
    }

    /// Runs the tier chain over one raw name. The first tier with a unique
    /// match wins; an in-tier tie ends resolution without guessing.
    fn resolve(&self, raw_name: &str) -> Resolution {
        for tier in &self.tiers {
            match tier.resolve(raw_name, &self.connection_references) {
                TierOutcome::Match(record_index) => {
                    return Resolution::Matched {
                        record_index,
                        confidence: tier.confidence(),
                    };
                }
                TierOutcome::Ambiguous(candidates) => return Resolution::Ambiguous(candidates),
                TierOutcome::NoMatch => {}
            }
        }
        Resolution::NoMatch
    }
}

struct ParsedFlow {
    malformed: bool,
    usages: Vec<ConnectionReferenceUsage>,
}

fn reference_node(record: &ConnectionReferenceRecord) -> RelationshipNode {
    RelationshipNode {
        kind: NodeKind::ConnectionReference,
        source_id: record.id.clone(),
        display_name: record.logical_name.clone(),
        placeholder: false,
        bound_connection_id: record.connection_id.clone(),
    }
}

fn connection_node(record: &ConnectionRecord) -> RelationshipNode {
    RelationshipNode {
        kind: NodeKind::Connection,
        source_id: record.id.clone(),
        display_name: record.name.clone(),
        placeholder: false,
        bound_connection_id: None,
    }
}
