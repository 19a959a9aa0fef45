//! Extraction of candidate connection-reference usages from one flow
//! definition.
//!
//! The parser is a pure function over an [`OpaqueTree`]: a single depth-first
//! pass that never fails. Anything it cannot interpret is simply
//! non-matching, so malformed subtrees yield zero usages instead of errors.

use crate::tree::{OpaqueTree, TreePath};
use serde::Serialize;
use std::fmt;

/// How confident the pipeline is that a usage maps to a real connection
/// reference.
///
/// The parser only ever emits `Exact`, `PatternMatched`, or `Inline`; the
/// aggregator upgrades `PatternMatched` to `Normalized`/`Fuzzy` (or demotes it
/// to `Unmatched`) once it has the authoritative record set to resolve
/// against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MatchConfidence {
    /// Entry of a `connectionReferences` map; the name is the map key itself.
    Exact,
    /// Discovered through a key-name pattern; not yet resolved.
    PatternMatched,
    /// Resolved after case/whitespace/punctuation normalization.
    Normalized,
    /// Resolved by edit-distance matching.
    Fuzzy,
    /// The flow embeds connection details directly, bypassing any reference.
    Inline,
    /// No resolution tier produced a match.
    Unmatched,
}

impl fmt::Display for MatchConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchConfidence::Exact => "exact",
            MatchConfidence::PatternMatched => "pattern-matched",
            MatchConfidence::Normalized => "normalized",
            MatchConfidence::Fuzzy => "fuzzy",
            MatchConfidence::Inline => "inline",
            MatchConfidence::Unmatched => "unmatched",
        };
        write!(f, "{}", label)
    }
}

/// One occurrence of a connection-reference-shaped reference inside a flow
/// definition.
///
/// Produced transiently by the parser and consumed by the aggregator; never
/// persisted. The `path` exists purely for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionReferenceUsage {
    pub flow_id: String,
    pub raw_name: String,
    pub path: TreePath,
    pub confidence: MatchConfidence,
}

// Key names that signal a connection reference when matched case-insensitively.
const CR_KEYS: [&str; 3] = ["connectionreferenceid", "connectorid", "referencedconnectionid"];
const CR_SUBSTRING: &str = "connectionreference";
const CR_MAP_KEY: &str = "connectionreferences";

// Keys used by the secondary heuristic for inline connection configuration.
const CONNECTOR_TYPE_KEYS: [&str; 3] = ["connectortype", "connectorname", "apiid"];

/// Returns whether a key name is connection-reference-shaped.
fn is_cr_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    CR_KEYS.contains(&lower.as_str()) || lower.contains(CR_SUBSTRING)
}

fn is_cr_map_key(key: &str) -> bool {
    key.eq_ignore_ascii_case(CR_MAP_KEY)
}

/// Walks one definition tree and returns every candidate usage found.
///
/// The traversal consumes the whole tree exactly once and is deterministic:
/// usages appear in source order.
pub fn parse_definition(flow_id: &str, tree: &OpaqueTree) -> Vec<ConnectionReferenceUsage> {
    let mut walker = DefinitionWalker {
        flow_id,
        path: TreePath::root(),
        usages: Vec::new(),
    };
    walker.visit(tree);
    walker.usages
}

struct DefinitionWalker<'a> {
    flow_id: &'a str,
    path: TreePath,
    usages: Vec<ConnectionReferenceUsage>,
}

impl DefinitionWalker<'_> {
    fn visit(&mut self, node: &OpaqueTree) {
        match node {
            OpaqueTree::Object(entries) => self.visit_object(entries),
            OpaqueTree::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.path.push_index(i);
                    self.visit(item);
                    self.path.pop();
                }
            }
            // Scalars carry no structure to inspect.
            _ => {}
        }
    }

    fn visit_object(&mut self, entries: &[(String, OpaqueTree)]) {
        let has_cr_shaped_key = entries
            .iter()
            .any(|(k, _)| is_cr_key(k) || is_cr_map_key(k));

        // Secondary heuristic: connector configuration embedded directly in
        // the flow, with no connection-reference indirection at all.
        if !has_cr_shaped_key {
            if let Some(raw_name) = self.inline_connection_name(entries) {
                self.emit(raw_name, MatchConfidence::Inline);
            }
        }

        for (key, value) in entries {
            if is_cr_map_key(key) {
                if let OpaqueTree::Object(map_entries) = value {
                    // Entries of a `connectionReferences` map are reported
                    // directly; the subtree is not re-scanned, which would
                    // double-count the same reference.
                    for (name, _) in map_entries {
                        self.path.push_key(key);
                        self.path.push_key(name);
                        self.emit(name.clone(), MatchConfidence::Exact);
                        self.path.pop();
                        self.path.pop();
                    }
                    continue;
                }
            }

            if is_cr_key(key) {
                if let Some(raw) = value.as_str() {
                    if !raw.is_empty() {
                        self.path.push_key(key);
                        self.emit(raw.to_string(), MatchConfidence::PatternMatched);
                        self.path.pop();
                        continue;
                    }
                }
            }

            self.path.push_key(key);
            self.visit(value);
            self.path.pop();
        }
    }

    /// Returns the best available name for an inline connection, if this
    /// object looks like one: a connector-type key plus an explicit
    /// connection payload.
    fn inline_connection_name(&self, entries: &[(String, OpaqueTree)]) -> Option<String> {
        let connector = entries.iter().find_map(|(k, v)| {
            let lower = k.to_ascii_lowercase();
            if CONNECTOR_TYPE_KEYS.contains(&lower.as_str()) {
                v.as_str()
            } else {
                None
            }
        })?;

        let connection = entries.iter().find_map(|(k, v)| {
            if k.eq_ignore_ascii_case("connection") && v.is_object() {
                Some(v)
            } else if k.eq_ignore_ascii_case("connectionname") {
                v.as_str().map(|_| v)
            } else {
                None
            }
        })?;

        // Prefer an explicit connection name/id over the connector type.
        let name = match connection {
            OpaqueTree::Object(_) => connection
                .get_ci("name")
                .and_then(OpaqueTree::as_str)
                .or_else(|| connection.get_ci("id").and_then(OpaqueTree::as_str))
                .unwrap_or(connector),
            other => other.as_str().unwrap_or(connector),
        };
        Some(name.to_string())
    }

    fn emit(&mut self, raw_name: String, confidence: MatchConfidence) {
        self.usages.push(ConnectionReferenceUsage {
            flow_id: self.flow_id.to_string(),
            raw_name,
            path: self.path.clone(),
            confidence,
        });
    }
}
