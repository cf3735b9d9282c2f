//! Emergency rule-based selection: the availability floor.
//!
//! Used when the backend chain is exhausted. Deterministic, zero backend
//! calls: top of the Phase-1 scored ordering, with entries matching
//! mandatory requirement topics boosted to the front.

use std::collections::BTreeSet;
use tracing::info;

use crate::domain::models::{CandidateSet, CatalogEntry, GovernanceRequirement, PolicyIndex};
use crate::services::candidate_filter::{fuzzy_contains, topic_terms};

/// Backend-free selector of last resort.
pub struct EmergencySelector;

impl EmergencySelector {
    /// Select exactly `min(target_count, |candidates|)` distinct entries.
    pub fn select(
        candidates: &CandidateSet,
        index: &PolicyIndex,
        requirements: &GovernanceRequirement,
        target_count: usize,
    ) -> Vec<CatalogEntry> {
        let mandatory = mandatory_terms(requirements);

        let mut boosted: Vec<&str> = Vec::new();
        let mut rest: Vec<&str> = Vec::new();

        for name in candidates.names() {
            let Some(entry) = index.get(name) else {
                continue;
            };
            if matches_any(entry, &mandatory) {
                boosted.push(name);
            } else {
                rest.push(name);
            }
        }

        // Boosted entries jump the score order entirely; ties break by name.
        boosted.sort_unstable();

        let selected: Vec<CatalogEntry> = boosted
            .into_iter()
            .chain(rest)
            .take(target_count)
            .filter_map(|name| index.get(name).cloned())
            .collect();

        info!(
            selected = selected.len(),
            target = target_count,
            "emergency selection complete"
        );
        selected
    }
}

/// Terms implied by mandatory requirements: registry enforcement, required
/// labels, and every affirmed requirement's topic words.
fn mandatory_terms(requirements: &GovernanceRequirement) -> BTreeSet<String> {
    let mut terms = BTreeSet::new();

    if requirements.registry_enforcement() {
        terms.insert("registry".to_string());
        terms.insert("image".to_string());
    }

    if !requirements.required_labels.is_empty() {
        terms.insert("label".to_string());
    }

    for id in requirements.affirmed_ids() {
        for topic in topic_terms(id) {
            terms.insert(topic.to_string());
        }
    }

    terms
}

fn matches_any(entry: &CatalogEntry, terms: &BTreeSet<String>) -> bool {
    let name = entry.name.to_lowercase();
    let tags: Vec<String> = entry.tags.iter().map(|t| t.to_lowercase()).collect();

    terms
        .iter()
        .any(|term| fuzzy_contains(&name, term) || tags.iter().any(|t| fuzzy_contains(t, term)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{RequirementAnswer, ScoredCandidate};
    use std::collections::BTreeMap;

    fn entry(name: &str, tags: &[&str]) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            category: "pod-security".to_string(),
            description: String::new(),
            location: format!("{name}.yaml"),
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            has_example_tests: false,
        }
    }

    fn fixtures() -> (PolicyIndex, CandidateSet) {
        let entries = vec![
            entry("alpha-policy", &["pods"]),
            entry("beta-policy", &["pods"]),
            entry("restrict-image-registries", &["images", "registry"]),
            entry("require-labels", &["labels"]),
            entry("gamma-policy", &["pods"]),
        ];
        let index = PolicyIndex::new(entries.clone());
        let scored = entries
            .iter()
            .enumerate()
            .map(|(i, e)| ScoredCandidate {
                name: e.name.clone(),
                score: (10 - i) as u32,
            })
            .collect();
        let candidates = CandidateSet::from_scored(scored, 10);
        (index, candidates)
    }

    #[test]
    fn test_exact_count_without_requirements() {
        let (index, candidates) = fixtures();
        let selected =
            EmergencySelector::select(&candidates, &index, &GovernanceRequirement::default(), 3);

        assert_eq!(selected.len(), 3);
        // Plain score order when nothing is mandatory.
        assert_eq!(selected[0].name, "alpha-policy");
        assert_eq!(selected[1].name, "beta-policy");
    }

    #[test]
    fn test_target_larger_than_candidates() {
        let (index, candidates) = fixtures();
        let selected =
            EmergencySelector::select(&candidates, &index, &GovernanceRequirement::default(), 50);
        assert_eq!(selected.len(), 5);

        let mut names: Vec<_> = selected.iter().map(|e| e.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 5, "entries must be distinct");
    }

    #[test]
    fn test_mandatory_requirements_boosted_to_front() {
        let (index, candidates) = fixtures();
        let requirements = GovernanceRequirement::new(
            vec![],
            vec!["registry.internal.example".to_string()],
            vec![],
            BTreeMap::from([("team".to_string(), "payments".to_string())]),
        );

        let selected = EmergencySelector::select(&candidates, &index, &requirements, 3);

        // Both matching entries precede everything else, name-ordered.
        assert_eq!(selected[0].name, "require-labels");
        assert_eq!(selected[1].name, "restrict-image-registries");
        assert_eq!(selected[2].name, "alpha-policy");
    }

    #[test]
    fn test_affirmed_topics_boost() {
        let (index, candidates) = fixtures();
        let requirements = GovernanceRequirement::new(
            vec![RequirementAnswer::affirmed("comp_labeling_standards")],
            vec![],
            vec![],
            BTreeMap::new(),
        );

        let selected = EmergencySelector::select(&candidates, &index, &requirements, 2);
        assert_eq!(selected[0].name, "require-labels");
    }
}
