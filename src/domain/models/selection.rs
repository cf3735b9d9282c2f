//! Selection entries, the assembled result, and the validation report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::catalog::CatalogEntry;

/// Validation state of a selected policy document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Unvalidated,
    Passed,
    Failed,
    /// Failed at least once, then passed after an AI repair round.
    Repaired,
}

/// One selected policy, progressively enriched by the pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionEntry {
    /// The catalog entry this selection refers to.
    pub catalog: CatalogEntry,

    /// Assigned human-readable category; `None` until the category
    /// assigner runs.
    pub category: Option<String>,

    /// The (customized) policy document text.
    pub document: String,

    /// Audit labels for every customization applied.
    pub customizations: BTreeSet<String>,

    pub status: ValidationStatus,
}

impl SelectionEntry {
    pub fn new(catalog: CatalogEntry, document: String) -> Self {
        Self {
            catalog,
            category: None,
            document,
            customizations: BTreeSet::new(),
            status: ValidationStatus::Unvalidated,
        }
    }

    pub fn name(&self) -> &str {
        &self.catalog.name
    }

    /// The category to present: the assigned one, or the catalog category
    /// as fallback.
    pub fn display_category(&self) -> &str {
        self.category.as_deref().unwrap_or(&self.catalog.category)
    }
}

/// Final pipeline output: the ordered selection plus the degradation
/// manifest, so partial failure is observable rather than hidden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionOutcome {
    /// Selected entries, in selection order. No duplicate names.
    pub entries: Vec<SelectionEntry>,

    /// True when the entries came from the emergency rule-based selector.
    pub emergency: bool,

    /// Backend id that produced the Phase-2 selection, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_used: Option<String>,

    /// Names the backend returned that were not in the candidate universe.
    pub discarded: Vec<String>,

    /// Names excluded because their documents could not be parsed.
    pub malformed: Vec<String>,

    pub report: ValidationReport,

    pub generated_at: DateTime<Utc>,
}

impl SelectionOutcome {
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(SelectionEntry::name).collect()
    }
}

/// Per-entry verdict from the final validation round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Backend repair calls spent on this entry.
    pub repair_attempts: u32,
}

/// Aggregate validation report over the final round's outcomes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub outcomes: Vec<ValidationOutcome>,
}

impl ValidationReport {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    /// Passed / total over the final round. 1.0 for an empty report so an
    /// empty selection does not read as a validation failure.
    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 1.0;
        }
        self.passed() as f64 / self.outcomes.len() as f64
    }

    /// Total backend repair calls across all entries.
    pub fn repair_attempts(&self) -> u32 {
        self.outcomes.iter().map(|o| o.repair_attempts).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_entry(name: &str) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            category: "best-practices".to_string(),
            description: String::new(),
            location: format!("{name}.yaml"),
            tags: vec![],
            has_example_tests: false,
        }
    }

    #[test]
    fn test_display_category_falls_back_to_catalog() {
        let mut entry = SelectionEntry::new(catalog_entry("require-probes"), String::new());
        assert_eq!(entry.display_category(), "best-practices");

        entry.category = Some("Workload Reliability".to_string());
        assert_eq!(entry.display_category(), "Workload Reliability");
    }

    #[test]
    fn test_success_rate() {
        let report = ValidationReport {
            outcomes: vec![
                ValidationOutcome {
                    name: "a".to_string(),
                    passed: true,
                    message: None,
                    repair_attempts: 0,
                },
                ValidationOutcome {
                    name: "b".to_string(),
                    passed: false,
                    message: Some("rule mismatch".to_string()),
                    repair_attempts: 2,
                },
            ],
        };
        assert_eq!(report.passed(), 1);
        assert_eq!(report.failed(), 1);
        assert!((report.success_rate() - 0.5).abs() < f64::EPSILON);
        assert_eq!(report.repair_attempts(), 2);
    }

    #[test]
    fn test_empty_report_success_rate_is_one() {
        let report = ValidationReport::default();
        assert!((report.success_rate() - 1.0).abs() < f64::EPSILON);
    }
}
