//! Pipeline orchestrator: filter -> select -> categorize -> customize ->
//! validate.
//!
//! Stages run strictly sequentially; each consumes the previous stage's
//! output. Configuration problems fail before anything runs; every later
//! failure degrades to a narrower but still-correct result recorded in the
//! outcome manifest.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::errors::SelectionError;
use crate::domain::models::{
    ClusterProfile, EngineConfig, GovernanceRequirement, PolicyIndex, SelectionEntry,
    SelectionOutcome,
};
use crate::domain::ports::{CompletionBackend, DocumentStore, PolicyValidator};
use crate::infrastructure::backends::RetryPolicy;
use crate::infrastructure::config::ConfigLoader;
use crate::services::{
    CancelFlag, CandidateFilter, CategoryAssigner, DetailedSelector, EmergencySelector,
    ModelBackendChain, PolicyCustomizer, ValidationLoop,
};

/// Owns the configured pipeline for one or more runs. Runs share no mutable
/// state, so a single orchestrator can serve concurrent clusters.
pub struct SelectionOrchestrator {
    config: EngineConfig,
    chain: ModelBackendChain,
    validator: Arc<dyn PolicyValidator>,
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for SelectionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SelectionOrchestrator {
    /// Wire the pipeline. `backends` must line up one-to-one, in order,
    /// with the descriptors in `config.backends`.
    ///
    /// # Errors
    /// `SelectionError::Configuration` for an invalid config or a
    /// descriptor/implementation mismatch.
    pub fn new(
        config: EngineConfig,
        backends: Vec<Arc<dyn CompletionBackend>>,
        validator: Arc<dyn PolicyValidator>,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, SelectionError> {
        ConfigLoader::validate(&config)
            .map_err(|e| SelectionError::Configuration(e.to_string()))?;

        if backends.len() != config.backends.len() {
            return Err(SelectionError::Configuration(format!(
                "backend chain mismatch: {} descriptors but {} implementations",
                config.backends.len(),
                backends.len()
            )));
        }

        let retry = RetryPolicy::new(
            config.max_retry_attempts,
            config.initial_backoff_ms,
            config.max_backoff_ms,
        );
        let links = config.backends.iter().cloned().zip(backends).collect();
        let chain = ModelBackendChain::new(links, retry, config.request_timeout_secs);

        Ok(Self {
            config,
            chain,
            validator,
            store,
        })
    }

    /// Run the full pipeline for one cluster.
    pub async fn run(
        &self,
        profile: &ClusterProfile,
        requirements: &GovernanceRequirement,
        index: &PolicyIndex,
        cancel: &CancelFlag,
    ) -> Result<SelectionOutcome, SelectionError> {
        if index.is_empty() {
            return Err(SelectionError::Configuration(
                "policy catalog is empty".to_string(),
            ));
        }

        info!(
            catalog = index.len(),
            target = self.config.target_count,
            "starting policy selection"
        );

        // Phase 1: narrow the catalog.
        let filter = CandidateFilter::new(&self.config);
        let candidates = filter.filter(&self.chain, index, profile, requirements).await;
        self.checkpoint(cancel)?;

        // Phase 2: detailed selection, or the emergency floor.
        let selector = DetailedSelector::new(&self.config);
        let (names, discarded, backend_used, emergency) = match selector
            .select(&self.chain, profile, requirements, &candidates, index)
            .await
        {
            Ok(draft) => (draft.names, draft.discarded, Some(draft.backend_id), false),
            Err(err) if err.is_backend_exhausted() && self.config.emergency_enabled => {
                warn!(error = %err, "backend chain exhausted, using emergency selection");
                let selected = EmergencySelector::select(
                    &candidates,
                    index,
                    requirements,
                    self.config.target_count,
                );
                let names = selected.into_iter().map(|e| e.name).collect();
                (names, Vec::new(), None, true)
            }
            Err(err) => return Err(err),
        };
        self.checkpoint(cancel)?;

        // Materialise entries; unreadable documents are reported, not fatal.
        let mut entries: Vec<SelectionEntry> = Vec::with_capacity(names.len());
        let mut malformed = Vec::new();
        for name in &names {
            self.checkpoint(cancel)?;
            let Some(catalog_entry) = index.get(name) else {
                continue;
            };
            match self.store.load(catalog_entry).await {
                Ok(document) => {
                    entries.push(SelectionEntry::new(catalog_entry.clone(), document));
                }
                Err(err) => {
                    warn!(policy = %name, error = %err, "could not load document, excluding");
                    malformed.push(name.clone());
                }
            }
        }

        // Categories: backend-driven, catalog category on fallback.
        let assigner = CategoryAssigner::new(&self.config);
        assigner
            .assign(&self.chain, &mut entries, profile, requirements)
            .await;
        self.checkpoint(cancel)?;

        // Customization: deterministic rewriting per entry.
        let customizer = PolicyCustomizer::new();
        let mut customized = Vec::with_capacity(entries.len());
        for mut entry in entries {
            self.checkpoint(cancel)?;
            match customizer.customize(entry.name(), &entry.document, requirements) {
                Ok(result) => {
                    entry.document = result.document;
                    entry.customizations = result.applied;
                    customized.push(entry);
                }
                Err(err) => {
                    warn!(error = %err, "excluding entry with malformed document");
                    malformed.push(entry.name().to_string());
                }
            }
        }
        self.checkpoint(cancel)?;

        // Validation and bounded repair.
        let validation = ValidationLoop::new(&self.config);
        let (entries, report) = validation
            .run(&self.chain, self.validator.as_ref(), customized, cancel)
            .await;

        info!(
            selected = entries.len(),
            emergency,
            discarded = discarded.len(),
            malformed = malformed.len(),
            success_rate = report.success_rate(),
            "policy selection complete"
        );

        Ok(SelectionOutcome {
            entries,
            emergency,
            backend_used,
            discarded,
            malformed,
            report,
            generated_at: Utc::now(),
        })
    }

    fn checkpoint(&self, cancel: &CancelFlag) -> Result<(), SelectionError> {
        if cancel.is_cancelled() {
            Err(SelectionError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BackendDescriptor, CatalogEntry, ValidationStatus};
    use crate::domain::ports::{BackendError, Verdict};
    use crate::infrastructure::backends::MockBackend;
    use crate::infrastructure::InMemoryDocumentStore;
    use async_trait::async_trait;

    const POLICY_DOC: &str = "apiVersion: kyverno.io/v1\nkind: ClusterPolicy\nmetadata:\n  name: placeholder\nspec:\n  rules: []\n";

    struct PassingValidator;

    #[async_trait]
    impl PolicyValidator for PassingValidator {
        async fn validate(&self, _name: &str, _document: &str) -> anyhow::Result<Verdict> {
            Ok(Verdict::pass())
        }
    }

    fn entry(name: &str) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            category: "pod-security".to_string(),
            description: format!("description for {name}"),
            location: format!("{name}.yaml"),
            tags: vec!["pods".to_string()],
            has_example_tests: false,
        }
    }

    fn fixtures(count: usize) -> (PolicyIndex, Arc<InMemoryDocumentStore>) {
        let names: Vec<String> = (0..count).map(|i| format!("policy-{i:03}")).collect();
        let index = PolicyIndex::new(names.iter().map(|n| entry(n)));
        let mut store = InMemoryDocumentStore::new();
        for name in &names {
            store.insert(name, POLICY_DOC);
        }
        (index, Arc::new(store))
    }

    fn config(target: usize) -> EngineConfig {
        EngineConfig {
            target_count: target,
            backends: vec![BackendDescriptor::new("primary", "model")],
            initial_backoff_ms: 1,
            max_backoff_ms: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_config_rejected_before_running() {
        let err = SelectionOrchestrator::new(
            EngineConfig::default(), // empty backend chain
            vec![],
            Arc::new(PassingValidator),
            Arc::new(InMemoryDocumentStore::new()),
        )
        .unwrap_err();
        assert!(matches!(err, SelectionError::Configuration(_)));
    }

    #[test]
    fn test_backend_count_mismatch_rejected() {
        let err = SelectionOrchestrator::new(
            config(5),
            vec![], // one descriptor, zero implementations
            Arc::new(PassingValidator),
            Arc::new(InMemoryDocumentStore::new()),
        )
        .unwrap_err();
        assert!(matches!(err, SelectionError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_empty_catalog_is_fatal() {
        let backend = Arc::new(MockBackend::always("primary", "[]"));
        let orchestrator = SelectionOrchestrator::new(
            config(5),
            vec![backend],
            Arc::new(PassingValidator),
            Arc::new(InMemoryDocumentStore::new()),
        )
        .unwrap();

        let err = orchestrator
            .run(
                &ClusterProfile::bare("1.31"),
                &GovernanceRequirement::default(),
                &PolicyIndex::default(),
                &CancelFlag::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SelectionError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_happy_path_assembles_outcome() {
        let (index, store) = fixtures(12);
        let backend = Arc::new(MockBackend::new("primary"));
        // First chain call: Phase-2 selection. Second: category assignment.
        backend.push_reply(crate::infrastructure::backends::MockReply::text(
            r#"["policy-000", "policy-001", "policy-002", "policy-003"]"#,
        ));
        backend.push_reply(crate::infrastructure::backends::MockReply::text(
            r#"{"policy-000": "Workload Security"}"#,
        ));

        let orchestrator = SelectionOrchestrator::new(
            config(4),
            vec![backend.clone()],
            Arc::new(PassingValidator),
            store,
        )
        .unwrap();

        let outcome = orchestrator
            .run(
                &ClusterProfile::bare("1.31"),
                &GovernanceRequirement::default(),
                &index,
                &CancelFlag::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.entries.len(), 4);
        assert!(!outcome.emergency);
        assert_eq!(outcome.backend_used.as_deref(), Some("primary"));
        assert!(outcome.discarded.is_empty());
        assert!(outcome.malformed.is_empty());
        assert_eq!(
            outcome.entries[0].category.as_deref(),
            Some("Workload Security")
        );
        // Missing from the mapping -> catalog category.
        assert_eq!(outcome.entries[1].category.as_deref(), Some("pod-security"));
        assert!(outcome
            .entries
            .iter()
            .all(|e| e.status == ValidationStatus::Passed));
        assert!((outcome.report.success_rate() - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_emergency_path_on_total_backend_failure() {
        let (index, store) = fixtures(12);
        let backend = Arc::new(MockBackend::failing(
            "primary",
            BackendError::Unavailable("503".to_string()),
        ));

        let orchestrator = SelectionOrchestrator::new(
            config(4),
            vec![backend],
            Arc::new(PassingValidator),
            store,
        )
        .unwrap();

        let outcome = orchestrator
            .run(
                &ClusterProfile::bare("1.31"),
                &GovernanceRequirement::default(),
                &index,
                &CancelFlag::new(),
            )
            .await
            .unwrap();

        assert!(outcome.emergency);
        assert_eq!(outcome.entries.len(), 4);
        assert!(outcome.backend_used.is_none());
        assert_eq!(outcome.report.repair_attempts(), 0);
    }

    #[tokio::test]
    async fn test_emergency_disabled_surfaces_exhaustion() {
        let (index, store) = fixtures(12);
        let backend = Arc::new(MockBackend::failing(
            "primary",
            BackendError::Unavailable("503".to_string()),
        ));

        let orchestrator = SelectionOrchestrator::new(
            EngineConfig {
                emergency_enabled: false,
                ..config(4)
            },
            vec![backend],
            Arc::new(PassingValidator),
            store,
        )
        .unwrap();

        let err = orchestrator
            .run(
                &ClusterProfile::bare("1.31"),
                &GovernanceRequirement::default(),
                &index,
                &CancelFlag::new(),
            )
            .await
            .unwrap_err();
        assert!(err.is_backend_exhausted());
    }

    #[tokio::test]
    async fn test_cancellation_between_stages() {
        let (index, store) = fixtures(12);
        let backend = Arc::new(MockBackend::always("primary", "[]"));
        let orchestrator = SelectionOrchestrator::new(
            config(4),
            vec![backend],
            Arc::new(PassingValidator),
            store,
        )
        .unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = orchestrator
            .run(
                &ClusterProfile::bare("1.31"),
                &GovernanceRequirement::default(),
                &index,
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SelectionError::Cancelled));
    }

    #[tokio::test]
    async fn test_unreadable_document_reported_not_fatal() {
        let names: Vec<String> = (0..6).map(|i| format!("policy-{i:03}")).collect();
        let index = PolicyIndex::new(names.iter().map(|n| entry(n)));
        let mut store = InMemoryDocumentStore::new();
        for name in names.iter().skip(1) {
            store.insert(name, POLICY_DOC);
        }
        // policy-000 has no stored document.

        let backend = Arc::new(MockBackend::new("primary"));
        backend.push_reply(crate::infrastructure::backends::MockReply::text(
            r#"["policy-000", "policy-001", "policy-002", "policy-003"]"#,
        ));

        let orchestrator = SelectionOrchestrator::new(
            config(4),
            vec![backend],
            Arc::new(PassingValidator),
            Arc::new(store),
        )
        .unwrap();

        let outcome = orchestrator
            .run(
                &ClusterProfile::bare("1.31"),
                &GovernanceRequirement::default(),
                &index,
                &CancelFlag::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.entries.len(), 3);
        assert_eq!(outcome.malformed, vec!["policy-000"]);
    }
}
