//! Ordered resolution tiers for mapping a raw usage name onto a known
//! connection-reference record.
//!
//! Each tier is a pure function tried in sequence; the first tier returning a
//! unique match wins. A tie inside a tier is reported as ambiguous and ends
//! resolution, because guessing between candidates would silently bind a flow
//! to the wrong connection reference.

use crate::parser::MatchConfidence;
use crate::records::ConnectionReferenceRecord;

/// The result of asking one tier to resolve a raw name.
pub enum TierOutcome {
    /// Index of the single matching record.
    Match(usize),
    NoMatch,
    /// Two or more records tied; their logical names, for diagnostics.
    Ambiguous(Vec<String>),
}

/// Defines the contract for one resolution tier.
pub trait MatchTier: Send + Sync {
    fn tier_name(&self) -> &'static str;

    /// The confidence recorded on a usage this tier resolves.
    fn confidence(&self) -> MatchConfidence;

    fn resolve(&self, raw_name: &str, records: &[ConnectionReferenceRecord]) -> TierOutcome;
}

/// Lowercases and strips whitespace and punctuation, leaving only
/// alphanumerics. `"Shared_PP "` and `"sharedpp"` normalize identically.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Collapses a list of candidate indices into a tier outcome.
fn outcome_from_candidates(
    candidates: Vec<usize>,
    records: &[ConnectionReferenceRecord],
) -> TierOutcome {
    match candidates.as_slice() {
        [] => TierOutcome::NoMatch,
        [single] => TierOutcome::Match(*single),
        _ => TierOutcome::Ambiguous(
            candidates
                .iter()
                .map(|&i| records[i].logical_name.clone())
                .collect(),
        ),
    }
}

/// Tier 1: the raw name is the record id itself.
pub struct IdTier;

impl MatchTier for IdTier {
    fn tier_name(&self) -> &'static str {
        "exact-id"
    }

    fn confidence(&self) -> MatchConfidence {
        MatchConfidence::Exact
    }

    fn resolve(&self, raw_name: &str, records: &[ConnectionReferenceRecord]) -> TierOutcome {
        let candidates: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.id == raw_name)
            .map(|(i, _)| i)
            .collect();
        outcome_from_candidates(candidates, records)
    }
}

/// Tier 2: case-insensitive logical-name equality.
pub struct NameTier;

impl MatchTier for NameTier {
    fn tier_name(&self) -> &'static str {
        "exact-name"
    }

    fn confidence(&self) -> MatchConfidence {
        MatchConfidence::Exact
    }

    fn resolve(&self, raw_name: &str, records: &[ConnectionReferenceRecord]) -> TierOutcome {
        let candidates: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.logical_name.eq_ignore_ascii_case(raw_name))
            .map(|(i, _)| i)
            .collect();
        outcome_from_candidates(candidates, records)
    }
}

/// Tier 3: equality after stripping whitespace and punctuation.
pub struct NormalizedTier;

impl MatchTier for NormalizedTier {
    fn tier_name(&self) -> &'static str {
        "normalized"
    }

    fn confidence(&self) -> MatchConfidence {
        MatchConfidence::Normalized
    }

    fn resolve(&self, raw_name: &str, records: &[ConnectionReferenceRecord]) -> TierOutcome {
        let needle = normalize_name(raw_name);
        if needle.is_empty() {
            return TierOutcome::NoMatch;
        }
        let candidates: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| normalize_name(&r.logical_name) == needle)
            .map(|(i, _)| i)
            .collect();
        outcome_from_candidates(candidates, records)
    }
}

/// Tier 4: edit distance over normalized names, bounded by a configurable
/// threshold. A tie at the best distance is ambiguous.
pub struct FuzzyTier {
    pub max_distance: usize,
}

impl MatchTier for FuzzyTier {
    fn tier_name(&self) -> &'static str {
        "fuzzy"
    }

    fn confidence(&self) -> MatchConfidence {
        MatchConfidence::Fuzzy
    }

    fn resolve(&self, raw_name: &str, records: &[ConnectionReferenceRecord]) -> TierOutcome {
        let needle = normalize_name(raw_name);
        if needle.is_empty() {
            return TierOutcome::NoMatch;
        }

        let mut best_distance = usize::MAX;
        let mut best: Vec<usize> = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let distance = levenshtein(&needle, &normalize_name(&record.logical_name));
            if distance > self.max_distance {
                continue;
            }
            if distance < best_distance {
                best_distance = distance;
                best = vec![i];
            } else if distance == best_distance {
                best.push(i);
            }
        }
        outcome_from_candidates(best, records)
    }
}

/// The standard tier chain, in resolution order.
pub fn default_tiers(fuzzy_distance: usize) -> Vec<Box<dyn MatchTier>> {
    vec![
        Box::new(IdTier),
        Box::new(NameTier),
        Box::new(NormalizedTier),
        Box::new(FuzzyTier {
            max_distance: fuzzy_distance,
        }),
    ]
}

/// Classic two-row Levenshtein distance.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
