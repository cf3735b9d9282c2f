//! Phase 1: narrow the full catalog to a token-bounded candidate set.
//!
//! Scoring is deterministic and cheap; the backend is consulted at most once
//! per run, and only to confirm borderline entries when the raw count still
//! exceeds the cap. Any backend failure degrades to plain truncation of the
//! scored ordering.

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::domain::models::{
    CandidateSet, CatalogEntry, ClusterProfile, EngineConfig, GovernanceRequirement, PolicyIndex,
    ScoredCandidate,
};
use crate::services::chain::ModelBackendChain;
use crate::services::parse;

/// Words carrying no selection signal when derived from requirement ids.
const TOPIC_STOPWORDS: &[&str] = &["required", "standards", "prevention"];

/// Phase-1 candidate filter.
pub struct CandidateFilter {
    cap: usize,
    confirm_enabled: bool,
    max_tokens: u32,
}

impl CandidateFilter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            cap: config.candidate_cap,
            confirm_enabled: config.phase_one_confirm,
            max_tokens: config.phase_one_max_tokens,
        }
    }

    /// Score every catalog entry and order by score descending, name
    /// ascending. Deterministic for identical inputs.
    pub fn rank(
        &self,
        index: &PolicyIndex,
        profile: &ClusterProfile,
        requirements: &GovernanceRequirement,
    ) -> Vec<ScoredCandidate> {
        let controller_terms = profile.controller_terms();
        let mut frameworks: Vec<String> = requirements
            .compliance_frameworks
            .iter()
            .chain(profile.compliance_frameworks.iter())
            .map(|f| f.to_lowercase())
            .collect();
        frameworks.sort();
        frameworks.dedup();

        let mut scored: Vec<ScoredCandidate> = index
            .iter()
            .map(|entry| ScoredCandidate {
                name: entry.name.clone(),
                score: score_entry(entry, &controller_terms, requirements, &frameworks),
            })
            .collect();

        scored.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        scored
    }

    /// Reduce the index to at most `cap` candidates.
    pub async fn filter(
        &self,
        chain: &ModelBackendChain,
        index: &PolicyIndex,
        profile: &ClusterProfile,
        requirements: &GovernanceRequirement,
    ) -> CandidateSet {
        let scored = self.rank(index, profile, requirements);
        info!(
            total = scored.len(),
            cap = self.cap,
            "phase 1 scored catalog"
        );

        if scored.len() > self.cap && self.confirm_enabled && !chain.is_empty() {
            match self
                .confirm_borderline(chain, &scored, index, profile, requirements)
                .await
            {
                Ok(reordered) => return CandidateSet::from_scored(reordered, self.cap),
                Err(err) => {
                    warn!(error = %err, "borderline confirmation failed, truncating by score");
                }
            }
        }

        CandidateSet::from_scored(scored, self.cap)
    }

    /// Ask the backend once whether the entries around the cap boundary
    /// should survive. Only reorders within the borderline window, so the
    /// subset and cap invariants cannot be violated.
    async fn confirm_borderline(
        &self,
        chain: &ModelBackendChain,
        scored: &[ScoredCandidate],
        index: &PolicyIndex,
        profile: &ClusterProfile,
        requirements: &GovernanceRequirement,
    ) -> Result<Vec<ScoredCandidate>, crate::domain::errors::SelectionError> {
        let border = (self.cap / 5).max(10);
        let start = self.cap.saturating_sub(border);
        let end = (self.cap + border).min(scored.len());
        let window = &scored[start..end];

        let prompt = borderline_prompt(window, index, profile, requirements);
        let completion = chain.complete(&prompt, self.max_tokens, None).await?;

        let window_names: BTreeSet<&str> = window.iter().map(|c| c.name.as_str()).collect();
        let confirmed: BTreeSet<String> = parse::name_list(&completion.text)
            .into_iter()
            .filter(|n| window_names.contains(n.as_str()))
            .collect();

        debug!(
            window = window.len(),
            confirmed = confirmed.len(),
            backend = %completion.backend_id,
            "borderline confirmation"
        );

        let mut reordered: Vec<ScoredCandidate> = scored[..start].to_vec();
        reordered.extend(window.iter().filter(|c| confirmed.contains(&c.name)).cloned());
        reordered.extend(window.iter().filter(|c| !confirmed.contains(&c.name)).cloned());
        reordered.extend_from_slice(&scored[end..]);
        Ok(reordered)
    }
}

/// Deterministic relevance score for one catalog entry.
fn score_entry(
    entry: &CatalogEntry,
    controller_terms: &[String],
    requirements: &GovernanceRequirement,
    frameworks: &[String],
) -> u32 {
    let name = entry.name.to_lowercase();
    let category = entry.category.to_lowercase();
    let tags: Vec<String> = entry.tags.iter().map(|t| t.to_lowercase()).collect();

    let matches = |term: &str| {
        fuzzy_contains(&name, term)
            || fuzzy_contains(&category, term)
            || tags.iter().any(|t| fuzzy_contains(t, term))
    };

    let mut score = 0;

    for term in controller_terms {
        if matches(term) {
            score += 3;
        }
    }

    for id in requirements.affirmed_ids() {
        if topic_terms(id).any(|topic| matches(topic)) {
            score += 2;
        }
    }

    for framework in frameworks {
        if matches(framework) {
            score += 2;
        }
    }

    if requirements.registry_enforcement() && (matches("registry") || matches("image")) {
        score += 3;
    }

    if !requirements.required_labels.is_empty() && matches("label") {
        score += 2;
    }

    if entry.has_example_tests {
        score += 1;
    }

    score
}

/// Topic words derived from a requirement id, e.g.
/// `img_registry_enforcement` -> `registry`, `enforcement`.
pub(crate) fn topic_terms(id: &str) -> impl Iterator<Item = &str> {
    id.split('_')
        .skip(1)
        .filter(|t| t.len() > 3 && !TOPIC_STOPWORDS.contains(t))
}

/// Substring match with a prefix-stem fallback so inflections still line up
/// (`labeling` matches a `labels` tag via the shared `label` stem).
pub(crate) fn fuzzy_contains(text: &str, term: &str) -> bool {
    if text.contains(term) {
        return true;
    }
    term.len() > 5
        && term
            .get(..5)
            .is_some_and(|stem| text.contains(stem))
}

fn borderline_prompt(
    window: &[ScoredCandidate],
    index: &PolicyIndex,
    profile: &ClusterProfile,
    requirements: &GovernanceRequirement,
) -> String {
    let summaries: Vec<String> = window
        .iter()
        .filter_map(|c| index.get(&c.name))
        .map(|entry| {
            let tags = entry.tags.iter().take(3).cloned().collect::<Vec<_>>().join(",");
            format!("{}|{}|{}", entry.name, entry.category, tags)
        })
        .collect();

    format!(
        "You are reviewing borderline governance policies for a cluster \
         (version {}, platform {}). Affirmed requirements: {:?}. Compliance \
         frameworks: {:?}.\n\nEach line is name|category|tags:\n{}\n\n\
         Return ONLY a JSON array with the names worth keeping.",
        profile.version,
        profile.platform.as_deref().unwrap_or("self-managed"),
        requirements.affirmed_ids(),
        requirements.compliance_frameworks,
        summaries.join("\n")
    )
}
