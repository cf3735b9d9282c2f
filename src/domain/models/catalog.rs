//! Policy catalog index and the Phase-1 candidate set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One policy in the catalog. Owned by the catalog collaborator; the engine
/// references entries by name and never mutates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Unique name, primary key within the index.
    pub name: String,
    /// Catalog category (e.g. `pod-security`, `best-practices`).
    pub category: String,
    /// Free-text description.
    pub description: String,
    /// Storage location of the policy document inside the catalog.
    pub location: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether the catalog ships example tests for this policy.
    #[serde(default)]
    pub has_example_tests: bool,
}

/// Immutable name -> entry index, loaded once per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyIndex {
    entries: BTreeMap<String, CatalogEntry>,
}

impl PolicyIndex {
    pub fn new(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.name.clone(), e))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }
}

/// A catalog entry together with its Phase-1 relevance score.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub name: String,
    pub score: u32,
}

/// Ordered, distinct candidate names surviving Phase 1.
///
/// Invariants: every name exists in the source index, no duplicates, and the
/// length never exceeds the configured cap. The scored ordering is retained
/// so padding and emergency selection can reuse it.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    names: Vec<String>,
    scored: Vec<ScoredCandidate>,
}

impl CandidateSet {
    /// Build a candidate set from a score-ordered candidate list, truncating
    /// to `cap` and dropping duplicates while preserving order.
    pub fn from_scored(scored: Vec<ScoredCandidate>, cap: usize) -> Self {
        let mut seen = std::collections::BTreeSet::new();
        let names = scored
            .iter()
            .filter(|c| seen.insert(c.name.clone()))
            .take(cap)
            .map(|c| c.name.clone())
            .collect();
        Self { names, scored }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The full scored ordering Phase 1 produced, highest score first.
    /// A superset of `names()` when the cap truncated the tail.
    pub fn scored_order(&self) -> &[ScoredCandidate] {
        &self.scored
    }
}
