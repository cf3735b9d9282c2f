//! Assigns human-readable categories to the selected policies.
//!
//! One backend call for the whole set; anything the backend misses (or a
//! total backend failure) falls back to each entry's catalog category.
//! Documents are never touched here.

use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::domain::models::{ClusterProfile, EngineConfig, GovernanceRequirement, SelectionEntry};
use crate::services::chain::ModelBackendChain;
use crate::services::parse;

/// Backend-driven category assigner with a heuristic fallback.
pub struct CategoryAssigner {
    max_tokens: u32,
}

impl CategoryAssigner {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_tokens: config.phase_one_max_tokens,
        }
    }

    /// Assign a category to every entry. Infallible: on any backend or
    /// parsing failure every entry keeps its catalog category.
    ///
    /// Idempotent for a deterministic backend response: identical inputs
    /// yield identical assignments.
    pub async fn assign(
        &self,
        chain: &ModelBackendChain,
        entries: &mut [SelectionEntry],
        profile: &ClusterProfile,
        requirements: &GovernanceRequirement,
    ) {
        if entries.is_empty() {
            return;
        }

        let mapping = match chain
            .complete(&self.category_prompt(entries, profile, requirements), self.max_tokens, None)
            .await
        {
            Ok(completion) => parse::name_mapping(&completion.text)
                .map(|pairs| pairs.into_iter().collect::<BTreeMap<_, _>>())
                .unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "category assignment failed, using catalog categories");
                BTreeMap::new()
            }
        };

        let mut assigned_from_backend = 0;
        for entry in entries.iter_mut() {
            match mapping.get(entry.name()) {
                Some(category) => {
                    entry.category = Some(category.clone());
                    assigned_from_backend += 1;
                }
                None => {
                    entry.category = Some(entry.catalog.category.clone());
                }
            }
        }

        info!(
            total = entries.len(),
            from_backend = assigned_from_backend,
            "category assignment complete"
        );
    }

    fn category_prompt(
        &self,
        entries: &[SelectionEntry],
        profile: &ClusterProfile,
        requirements: &GovernanceRequirement,
    ) -> String {
        let summaries: Vec<serde_json::Value> = entries
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "name": entry.catalog.name,
                    "tags": entry.catalog.tags,
                    "description": entry.catalog.description.chars().take(200).collect::<String>(),
                })
            })
            .collect();

        format!(
            "Group these governance policies into 3-6 clear operational \
             categories for a cluster (version {}, compliance frameworks \
             {:?}, required labels {:?}).\n\nPolicies:\n{}\n\n\
             Return ONLY a JSON object mapping every policy name to its \
             category name.",
            profile.version,
            requirements.compliance_frameworks,
            requirements.required_labels,
            serde_json::to_string(&summaries).unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BackendDescriptor, CatalogEntry};
    use crate::domain::ports::{BackendError, CompletionBackend};
    use crate::infrastructure::backends::{MockBackend, RetryPolicy};
    use std::sync::Arc;

    fn selection_entry(name: &str) -> SelectionEntry {
        SelectionEntry::new(
            CatalogEntry {
                name: name.to_string(),
                category: "pod-security".to_string(),
                description: String::new(),
                location: format!("{name}.yaml"),
                tags: vec![],
                has_example_tests: false,
            },
            "kind: Policy".to_string(),
        )
    }

    fn chain_with(backend: Arc<MockBackend>) -> ModelBackendChain {
        ModelBackendChain::new(
            vec![(
                BackendDescriptor::new("primary", "model"),
                backend as Arc<dyn CompletionBackend>,
            )],
            RetryPolicy::new(0, 1, 10),
            5,
        )
    }

    fn assigner() -> CategoryAssigner {
        CategoryAssigner::new(&EngineConfig::default())
    }

    #[tokio::test]
    async fn test_backend_mapping_applied_with_fallback_for_missing() {
        let mut entries = vec![selection_entry("require-probes"), selection_entry("require-labels")];
        let backend = Arc::new(MockBackend::always(
            "primary",
            r#"{"require-probes": "Workload Reliability"}"#,
        ));
        let chain = chain_with(backend);

        assigner()
            .assign(
                &chain,
                &mut entries,
                &ClusterProfile::bare("1.31"),
                &GovernanceRequirement::default(),
            )
            .await;

        assert_eq!(entries[0].category.as_deref(), Some("Workload Reliability"));
        // Missing from the mapping: catalog category fallback.
        assert_eq!(entries[1].category.as_deref(), Some("pod-security"));
    }

    #[tokio::test]
    async fn test_backend_failure_falls_back_everywhere() {
        let mut entries = vec![selection_entry("require-probes")];
        let backend = Arc::new(MockBackend::failing("primary", BackendError::RateLimited));
        let chain = chain_with(backend);

        assigner()
            .assign(
                &chain,
                &mut entries,
                &ClusterProfile::bare("1.31"),
                &GovernanceRequirement::default(),
            )
            .await;

        assert_eq!(entries[0].category.as_deref(), Some("pod-security"));
    }

    #[tokio::test]
    async fn test_idempotent_for_identical_response() {
        let response = r#"{"require-probes": "Reliability", "require-labels": "Compliance"}"#;
        let mut first = vec![selection_entry("require-probes"), selection_entry("require-labels")];
        let mut second = first.clone();

        let chain_a = chain_with(Arc::new(MockBackend::always("primary", response)));
        let chain_b = chain_with(Arc::new(MockBackend::always("primary", response)));

        let profile = ClusterProfile::bare("1.31");
        let requirements = GovernanceRequirement::default();

        assigner().assign(&chain_a, &mut first, &profile, &requirements).await;
        assigner().assign(&chain_b, &mut second, &profile, &requirements).await;

        let categories_a: Vec<_> = first.iter().map(|e| e.category.clone()).collect();
        let categories_b: Vec<_> = second.iter().map(|e| e.category.clone()).collect();
        assert_eq!(categories_a, categories_b);
    }

    #[tokio::test]
    async fn test_documents_never_mutated() {
        let mut entries = vec![selection_entry("require-probes")];
        let original_document = entries[0].document.clone();
        let backend = Arc::new(MockBackend::always(
            "primary",
            r#"{"require-probes": "Reliability"}"#,
        ));
        let chain = chain_with(backend);

        assigner()
            .assign(
                &chain,
                &mut entries,
                &ClusterProfile::bare("1.31"),
                &GovernanceRequirement::default(),
            )
            .await;

        assert_eq!(entries[0].document, original_document);
    }
}
