//! Phase 2: choose and rank the final policy set from the candidates.
//!
//! The backend sees candidate summaries only, never document bodies. Every
//! name it returns is checked against the candidate set; anything else is a
//! hallucination and is discarded but counted. A selection far below target
//! is padded deterministically from the Phase-1 scored ordering.

use tracing::{info, warn};

use crate::domain::errors::SelectionError;
use crate::domain::models::{
    CandidateSet, ClusterProfile, EngineConfig, GovernanceRequirement, PolicyIndex,
};
use crate::services::chain::ModelBackendChain;
use crate::services::parse;

/// Output of Phase 2, before catalog entries are materialised.
#[derive(Debug, Clone)]
pub struct SelectionDraft {
    /// Selected names in rank order, deduplicated, all within the candidate
    /// set.
    pub names: Vec<String>,
    /// Names the backend invented; absent from the candidate set.
    pub discarded: Vec<String>,
    /// How many names were padded in from the scored ordering.
    pub padded: usize,
    /// Backend that produced the selection.
    pub backend_id: String,
}

/// Phase-2 detailed selector.
pub struct DetailedSelector {
    target_count: usize,
    min_acceptable: usize,
    /// Upper size bound: target plus the configured tolerance slack.
    max_count: usize,
    max_tokens: u32,
}

impl DetailedSelector {
    pub fn new(config: &EngineConfig) -> Self {
        let slack = ((config.target_count as f64) * config.count_tolerance).floor() as usize;
        Self {
            target_count: config.target_count,
            min_acceptable: config.min_acceptable_count(),
            max_count: config.target_count + slack,
            max_tokens: config.phase_two_max_tokens,
        }
    }

    /// Run the detailed selection.
    ///
    /// # Errors
    /// Propagates `AllBackendsExhausted` untouched so the orchestrator can
    /// delegate to the emergency selector.
    pub async fn select(
        &self,
        chain: &ModelBackendChain,
        profile: &ClusterProfile,
        requirements: &GovernanceRequirement,
        candidates: &CandidateSet,
        index: &PolicyIndex,
    ) -> Result<SelectionDraft, SelectionError> {
        let prompt = self.selection_prompt(profile, requirements, candidates, index);
        let completion = chain.complete(&prompt, self.max_tokens, None).await?;

        let mut names = Vec::new();
        let mut discarded = Vec::new();
        for name in parse::name_list(&completion.text) {
            if names.contains(&name) {
                continue; // first-seen order wins
            }
            if candidates.contains(&name) {
                names.push(name);
            } else {
                warn!(name = %name, "discarding name not present in candidate set");
                discarded.push(name);
            }
        }

        let mut padded = 0;
        if names.len() < self.min_acceptable {
            warn!(
                selected = names.len(),
                minimum = self.min_acceptable,
                "selection below threshold, padding from scored candidates"
            );
            for candidate in candidates.scored_order() {
                if names.len() >= self.target_count {
                    break;
                }
                if candidates.contains(&candidate.name) && !names.contains(&candidate.name) {
                    names.push(candidate.name.clone());
                    padded += 1;
                }
            }
        }

        names.truncate(self.max_count);

        info!(
            selected = names.len(),
            discarded = discarded.len(),
            padded,
            backend = %completion.backend_id,
            "phase 2 selection complete"
        );

        Ok(SelectionDraft {
            names,
            discarded,
            padded,
            backend_id: completion.backend_id,
        })
    }

    fn selection_prompt(
        &self,
        profile: &ClusterProfile,
        requirements: &GovernanceRequirement,
        candidates: &CandidateSet,
        index: &PolicyIndex,
    ) -> String {
        let summaries: Vec<serde_json::Value> = candidates
            .names()
            .iter()
            .filter_map(|name| index.get(name))
            .map(|entry| {
                serde_json::json!({
                    "name": entry.name,
                    "category": entry.category,
                    "description": truncate(&entry.description, 300),
                    "tags": entry.tags,
                })
            })
            .collect();

        let controllers: Vec<String> = profile
            .controllers
            .iter()
            .map(|c| format!("{} ({})", c.name, c.kind.as_str()))
            .collect();

        format!(
            "You are a cluster governance consultant making the final policy \
             selection.\n\n\
             CLUSTER:\n- version: {}\n- platform: {}\n- nodes: {}\n\
             - controllers: {:?}\n- compliance frameworks: {:?}\n\n\
             REQUIREMENTS:\n- affirmed: {:?}\n- allowed registries: {:?}\n\
             - required labels: {:?}\n\n\
             CANDIDATE POLICIES ({} total):\n{}\n\n\
             Select exactly {} policies from the candidates that best cover \
             the requirements, avoiding overlapping functionality. Return \
             ONLY a JSON array of policy names, most important first.",
            profile.version,
            profile.platform.as_deref().unwrap_or("self-managed"),
            profile.node_count,
            controllers,
            profile.compliance_frameworks,
            requirements.affirmed_ids(),
            requirements.allowed_registries,
            requirements.required_labels,
            candidates.len(),
            serde_json::to_string(&summaries).unwrap_or_default(),
            self.target_count,
        )
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
