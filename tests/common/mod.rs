//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use warden::domain::models::{BackendDescriptor, CatalogEntry, EngineConfig, PolicyIndex};
use warden::domain::ports::{PolicyValidator, Verdict};
use warden::infrastructure::InMemoryDocumentStore;

pub const POLICY_DOC: &str = "apiVersion: kyverno.io/v1\nkind: ClusterPolicy\nmetadata:\n  name: placeholder\nspec:\n  validationFailureAction: Audit\n  rules:\n    - name: check\n      match:\n        resources:\n          kinds:\n            - Pod\n";

pub fn catalog_entry(name: &str, category: &str, tags: &[&str]) -> CatalogEntry {
    CatalogEntry {
        name: name.to_string(),
        category: category.to_string(),
        description: format!("description for {name}"),
        location: format!("{category}/{name}/{name}.yaml"),
        tags: tags.iter().map(|t| (*t).to_string()).collect(),
        has_example_tests: false,
    }
}

/// Index of `count` generic policies plus a preloaded document store.
pub fn fixtures(count: usize) -> (PolicyIndex, Arc<InMemoryDocumentStore>) {
    let names: Vec<String> = (0..count).map(|i| format!("policy-{i:03}")).collect();
    let index = PolicyIndex::new(names.iter().map(|n| {
        catalog_entry(
            n,
            if n.len() % 2 == 0 { "pod-security" } else { "best-practices" },
            &["pods"],
        )
    }));
    let mut store = InMemoryDocumentStore::new();
    for name in &names {
        store.insert(name, POLICY_DOC);
    }
    (index, Arc::new(store))
}

pub fn engine_config(target: usize) -> EngineConfig {
    EngineConfig {
        target_count: target,
        backends: vec![BackendDescriptor::new("primary", "large-v1")],
        initial_backoff_ms: 1,
        max_backoff_ms: 10,
        ..Default::default()
    }
}

/// Validator that passes everything.
pub struct PassingValidator;

#[async_trait]
impl PolicyValidator for PassingValidator {
    async fn validate(&self, _name: &str, _document: &str) -> anyhow::Result<Verdict> {
        Ok(Verdict::pass())
    }
}

/// Validator that fails named policies on every call, passing the rest.
pub struct SelectiveValidator {
    failing: Mutex<HashMap<String, String>>,
    calls: AtomicU32,
}

impl Default for SelectiveValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectiveValidator {
    pub fn new() -> Self {
        Self {
            failing: Mutex::new(HashMap::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn fail(&self, name: &str, message: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(name.to_string(), message.to_string());
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyValidator for SelectiveValidator {
    async fn validate(&self, name: &str, _document: &str) -> anyhow::Result<Verdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failing.lock().unwrap().get(name) {
            Some(message) => Ok(Verdict::fail(message.clone())),
            None => Ok(Verdict::pass()),
        }
    }
}
