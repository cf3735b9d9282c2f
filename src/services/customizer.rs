//! Deterministic, backend-free policy document rewriting.
//!
//! Four passes per document: registry restriction, required-label injection,
//! compliance annotations, and parameter strengthening. Rule names and
//! match/exclude blocks are never touched. Every applied change appends an
//! audit label; re-applying the customizer to its own output is a no-op.

use serde_yaml::{Mapping, Value};
use std::collections::BTreeSet;
use tracing::debug;

use crate::domain::errors::SelectionError;
use crate::domain::models::GovernanceRequirement;

/// Requirement id that demands enforce-mode admission instead of audit.
const STRICT_ENFORCEMENT_ID: &str = "strict_enforcement";

/// Public registry hostnames rewritten to the first allowed registry when
/// they appear inside document scalars.
const KNOWN_REGISTRIES: &[&str] = &[
    "registry.k8s.io",
    "registry-1.docker.io",
    "docker.io",
    "gcr.io",
    "ghcr.io",
    "quay.io",
];

/// Result of customizing one document.
#[derive(Debug, Clone)]
pub struct CustomizedDocument {
    pub document: String,
    /// Audit labels for the changes that were applied.
    pub applied: BTreeSet<String>,
}

/// Deterministic policy customizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyCustomizer;

impl PolicyCustomizer {
    pub fn new() -> Self {
        Self
    }

    /// Rewrite one policy document per the governance requirements.
    ///
    /// # Errors
    /// `SelectionError::MalformedDocument` when the source cannot be parsed
    /// as a YAML mapping.
    pub fn customize(
        &self,
        name: &str,
        document: &str,
        requirements: &GovernanceRequirement,
    ) -> Result<CustomizedDocument, SelectionError> {
        let mut root: Value =
            serde_yaml::from_str(document).map_err(|e| SelectionError::MalformedDocument {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        let Some(map) = root.as_mapping_mut() else {
            return Err(SelectionError::MalformedDocument {
                name: name.to_string(),
                reason: "document root is not a mapping".to_string(),
            });
        };

        let mut applied = BTreeSet::new();

        if !requirements.allowed_registries.is_empty() {
            rewrite_image_references(map, &requirements.allowed_registries, &mut applied);
            rewrite_image_patterns(map, &requirements.allowed_registries, &mut applied);
            replace_known_registries(map, &requirements.allowed_registries, &mut applied);
        }

        if !requirements.required_labels.is_empty() {
            inject_labels(map, requirements, &mut applied);
        }

        for framework in &requirements.compliance_frameworks {
            annotate_compliance(map, framework, &mut applied);
        }

        strengthen_parameters(map, requirements, &mut applied);

        let document =
            serde_yaml::to_string(&root).map_err(|e| SelectionError::MalformedDocument {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        debug!(policy = %name, changes = applied.len(), "customization complete");
        Ok(CustomizedDocument { document, applied })
    }
}

/// `spec.rules[].verifyImages[].imageReferences` -> one `<registry>/*`
/// reference per allowed registry.
fn rewrite_image_references(
    root: &mut Mapping,
    registries: &[String],
    applied: &mut BTreeSet<String>,
) {
    for rule in rules_mut(root) {
        let Some(verify_images) = rule.get_mut("verifyImages").and_then(Value::as_sequence_mut)
        else {
            continue;
        };
        for verify_rule in verify_images.iter_mut().filter_map(Value::as_mapping_mut) {
            if let Some(references) = verify_rule.get_mut("imageReferences") {
                let replacement: Vec<Value> = registries
                    .iter()
                    .map(|r| Value::String(format!("{r}/*")))
                    .collect();
                if *references != Value::Sequence(replacement.clone()) {
                    *references = Value::Sequence(replacement);
                    applied.insert("registry:image-references".to_string());
                }
            }
        }
    }
}

/// Image patterns inside `validate.pattern` / `validate.anyPattern` ->
/// alternation over the allowed registries.
fn rewrite_image_patterns(
    root: &mut Mapping,
    registries: &[String],
    applied: &mut BTreeSet<String>,
) {
    let alternation = registries
        .iter()
        .map(|r| format!("{r}/*"))
        .collect::<Vec<_>>()
        .join(" | ");

    for rule in rules_mut(root) {
        let Some(validate) = rule.get_mut("validate").and_then(Value::as_mapping_mut) else {
            continue;
        };

        if let Some(pattern) = validate.get_mut("pattern").and_then(Value::as_mapping_mut) {
            restrict_pattern_images(pattern, &alternation, applied);
        }

        if let Some(any_pattern) = validate.get_mut("anyPattern").and_then(Value::as_sequence_mut) {
            for pattern in any_pattern.iter_mut().filter_map(Value::as_mapping_mut) {
                restrict_pattern_images(pattern, &alternation, applied);
            }
        }
    }
}

fn restrict_pattern_images(pattern: &mut Mapping, alternation: &str, applied: &mut BTreeSet<String>) {
    let Some(spec) = pattern.get_mut("spec").and_then(Value::as_mapping_mut) else {
        return;
    };
    for kind in ["containers", "initContainers", "ephemeralContainers"] {
        let Some(containers) = spec.get_mut(kind).and_then(Value::as_sequence_mut) else {
            continue;
        };
        for container in containers.iter_mut().filter_map(Value::as_mapping_mut) {
            if let Some(image) = container.get_mut("image") {
                if image.as_str() != Some(alternation) {
                    *image = Value::String(alternation.to_string());
                    applied.insert("registry:image-pattern".to_string());
                }
            }
        }
    }
}

/// Hardcoded public registry hostnames anywhere in the document -> the first
/// allowed registry. Scalars that already reference an allowed registry are
/// left alone, so re-application converges.
fn replace_known_registries(
    map: &mut Mapping,
    registries: &[String],
    applied: &mut BTreeSet<String>,
) {
    for (_, value) in map.iter_mut() {
        replace_in_value(value, registries, applied);
    }
}

fn replace_in_value(value: &mut Value, registries: &[String], applied: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            if registries.iter().any(|r| s.contains(r.as_str())) {
                return;
            }
            for known in KNOWN_REGISTRIES {
                if s.contains(known) {
                    *s = s.replace(known, registries[0].as_str());
                    applied.insert("registry:rewrite".to_string());
                }
            }
        }
        Value::Sequence(seq) => {
            for item in seq {
                replace_in_value(item, registries, applied);
            }
        }
        Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                replace_in_value(item, registries, applied);
            }
        }
        _ => {}
    }
}

/// Merge required labels into `metadata.labels` and into generated resource
/// templates. The requirement's value wins on conflict; the overwrite is
/// recorded.
fn inject_labels(
    root: &mut Mapping,
    requirements: &GovernanceRequirement,
    applied: &mut BTreeSet<String>,
) {
    {
        let metadata = ensure_mapping(root, "metadata");
        let labels = ensure_mapping(metadata, "labels");
        merge_labels(labels, requirements, "label", applied);
    }

    for rule in rules_mut(root) {
        let Some(generate) = rule.get_mut("generate").and_then(Value::as_mapping_mut) else {
            continue;
        };
        let Some(data) = generate.get_mut("data").and_then(Value::as_mapping_mut) else {
            continue;
        };
        let metadata = ensure_mapping(data, "metadata");
        let labels = ensure_mapping(metadata, "labels");
        merge_labels(labels, requirements, "label:generated", applied);
    }
}

fn merge_labels(
    labels: &mut Mapping,
    requirements: &GovernanceRequirement,
    prefix: &str,
    applied: &mut BTreeSet<String>,
) {
    for (key, value) in &requirements.required_labels {
        match labels.get(key.as_str()).and_then(Value::as_str) {
            Some(existing) if existing == value => {}
            Some(_) => {
                labels.insert(
                    Value::String(key.clone()),
                    Value::String(value.clone()),
                );
                applied.insert(format!("{prefix}:override:{key}"));
            }
            None => {
                labels.insert(
                    Value::String(key.clone()),
                    Value::String(value.clone()),
                );
                applied.insert(format!("{prefix}:add:{key}"));
            }
        }
    }
}

/// One compliance annotation per declared framework.
fn annotate_compliance(root: &mut Mapping, framework: &str, applied: &mut BTreeSet<String>) {
    let key = format!(
        "policies.kyverno.io/{}-compliance",
        framework.to_lowercase()
    );
    let metadata = ensure_mapping(root, "metadata");
    let annotations = ensure_mapping(metadata, "annotations");
    if annotations.get(key.as_str()).is_none() {
        annotations.insert(Value::String(key), Value::String("true".to_string()));
        applied.insert(format!("annotation:{}", framework.to_lowercase()));
    }
}

/// Raise lax parameters to their required strictness. Never loosens: an
/// already-enforcing document passes through untouched.
fn strengthen_parameters(
    root: &mut Mapping,
    requirements: &GovernanceRequirement,
    applied: &mut BTreeSet<String>,
) {
    if !requirements.is_affirmed(STRICT_ENFORCEMENT_ID) {
        return;
    }

    {
        let spec = ensure_mapping(root, "spec");
        if strengthen_action(spec, "validationFailureAction") {
            applied.insert("parameter:validation-failure-action".to_string());
        }
    }

    for rule in rules_mut(root) {
        let Some(validate) = rule.get_mut("validate").and_then(Value::as_mapping_mut) else {
            continue;
        };
        if validate.get("failureAction").is_some() && strengthen_action(validate, "failureAction") {
            applied.insert("parameter:failure-action".to_string());
        }
    }
}

/// Set an action field to `Enforce` unless it already enforces. Returns
/// whether a change was made.
fn strengthen_action(map: &mut Mapping, field: &str) -> bool {
    let enforcing = map
        .get(field)
        .and_then(Value::as_str)
        .is_some_and(|v| v.eq_ignore_ascii_case("enforce"));
    if enforcing {
        return false;
    }
    map.insert(
        Value::String(field.to_string()),
        Value::String("Enforce".to_string()),
    );
    true
}

/// `spec.rules` as an iterator of mutable rule mappings.
fn rules_mut(root: &mut Mapping) -> impl Iterator<Item = &mut Mapping> {
    root.get_mut("spec")
        .and_then(Value::as_mapping_mut)
        .and_then(|spec| spec.get_mut("rules"))
        .and_then(Value::as_sequence_mut)
        .into_iter()
        .flatten()
        .filter_map(Value::as_mapping_mut)
}

fn ensure_mapping<'a>(parent: &'a mut Mapping, key: &str) -> &'a mut Mapping {
    let slot = parent
        .entry(Value::String(key.to_string()))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if !slot.is_mapping() {
        *slot = Value::Mapping(Mapping::new());
    }
    match slot {
        Value::Mapping(map) => map,
        _ => unreachable!("slot was just set to a mapping"),
    }
}
