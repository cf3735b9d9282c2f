//! Governance requirements collected by the questionnaire collaborator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An answer to a single governance requirement question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementAnswer {
    /// Requirement identifier (e.g. `img_registry_enforcement`).
    pub id: String,
    /// Whether the requirement was affirmed.
    pub affirmed: bool,
    /// Optional free-form detail captured alongside the answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RequirementAnswer {
    pub fn affirmed(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            affirmed: true,
            detail: None,
        }
    }

    pub fn denied(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            affirmed: false,
            detail: None,
        }
    }
}

/// Immutable governance requirements for a single run.
///
/// Registries keep their declared order; duplicates are removed at
/// construction so downstream registry rewriting sees each registry once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernanceRequirement {
    #[serde(default)]
    pub answers: Vec<RequirementAnswer>,

    /// Allowed image registries, ordered, unique.
    #[serde(default)]
    pub allowed_registries: Vec<String>,

    /// Declared compliance frameworks.
    #[serde(default)]
    pub compliance_frameworks: Vec<String>,

    /// Labels every governed resource must carry.
    #[serde(default)]
    pub required_labels: BTreeMap<String, String>,
}

impl GovernanceRequirement {
    /// Construct requirements, deduplicating registries while preserving the
    /// first-seen order.
    pub fn new(
        answers: Vec<RequirementAnswer>,
        allowed_registries: Vec<String>,
        compliance_frameworks: Vec<String>,
        required_labels: BTreeMap<String, String>,
    ) -> Self {
        let mut seen = std::collections::BTreeSet::new();
        let allowed_registries = allowed_registries
            .into_iter()
            .filter(|r| seen.insert(r.clone()))
            .collect();
        Self {
            answers,
            allowed_registries,
            compliance_frameworks,
            required_labels,
        }
    }

    /// Whether a requirement id was answered affirmatively.
    pub fn is_affirmed(&self, id: &str) -> bool {
        self.answers.iter().any(|a| a.id == id && a.affirmed)
    }

    /// Ids of all affirmed requirements, in answer order.
    pub fn affirmed_ids(&self) -> Vec<&str> {
        self.answers
            .iter()
            .filter(|a| a.affirmed)
            .map(|a| a.id.as_str())
            .collect()
    }

    /// Whether registry enforcement applies to this run.
    pub fn registry_enforcement(&self) -> bool {
        !self.allowed_registries.is_empty() || self.is_affirmed("img_registry_enforcement")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registries_deduplicated_in_order() {
        let req = GovernanceRequirement::new(
            vec![],
            vec![
                "registry.internal.example".to_string(),
                "quay.internal.example".to_string(),
                "registry.internal.example".to_string(),
            ],
            vec![],
            BTreeMap::new(),
        );
        assert_eq!(
            req.allowed_registries,
            vec!["registry.internal.example", "quay.internal.example"]
        );
    }

    #[test]
    fn test_affirmed_lookup() {
        let req = GovernanceRequirement::new(
            vec![
                RequirementAnswer::affirmed("res_limits_required"),
                RequirementAnswer::denied("net_policies_required"),
            ],
            vec![],
            vec![],
            BTreeMap::new(),
        );
        assert!(req.is_affirmed("res_limits_required"));
        assert!(!req.is_affirmed("net_policies_required"));
        assert!(!req.is_affirmed("unknown"));
        assert_eq!(req.affirmed_ids(), vec!["res_limits_required"]);
    }

    #[test]
    fn test_registry_enforcement_from_answers_or_registries() {
        let mut req = GovernanceRequirement::default();
        assert!(!req.registry_enforcement());

        req.allowed_registries.push("registry.internal.example".to_string());
        assert!(req.registry_enforcement());

        let req = GovernanceRequirement::new(
            vec![RequirementAnswer::affirmed("img_registry_enforcement")],
            vec![],
            vec![],
            BTreeMap::new(),
        );
        assert!(req.registry_enforcement());
    }
}
