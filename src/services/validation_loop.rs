//! Bounded validation/repair loop over the external validator.
//!
//! Per entry: validate, and on failure ask the backend to repair the
//! document for at most `max_repair_rounds`, revalidating after each
//! suggestion. Entries that still fail stay in the result marked `Failed`;
//! dropping them would misrepresent coverage. Per-entry work runs across a
//! bounded worker pool; the output preserves input order regardless of
//! completion order.

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::domain::models::{
    EngineConfig, SelectionEntry, ValidationOutcome, ValidationReport, ValidationStatus,
};
use crate::domain::ports::PolicyValidator;
use crate::services::cancel::CancelFlag;
use crate::services::chain::ModelBackendChain;
use crate::services::parse;

/// Validation loop over the external pass/fail oracle.
pub struct ValidationLoop {
    max_repair_rounds: u32,
    ai_repair_enabled: bool,
    worker_count: usize,
    max_tokens: u32,
}

impl ValidationLoop {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_repair_rounds: config.max_repair_rounds,
            ai_repair_enabled: config.ai_repair_enabled,
            worker_count: config.worker_count.max(1),
            max_tokens: config.phase_two_max_tokens,
        }
    }

    /// Validate (and possibly repair) every entry.
    ///
    /// Cancellation is checked before each entry and between repair rounds;
    /// entries skipped by cancellation keep their `Unvalidated` status and
    /// produce no report outcome.
    pub async fn run(
        &self,
        chain: &ModelBackendChain,
        validator: &dyn PolicyValidator,
        entries: Vec<SelectionEntry>,
        cancel: &CancelFlag,
    ) -> (Vec<SelectionEntry>, ValidationReport) {
        let total = entries.len();
        let mut results: Vec<(usize, SelectionEntry, Option<ValidationOutcome>)> =
            stream::iter(entries.into_iter().enumerate())
                .map(|(position, entry)| {
                    let cancel = cancel.clone();
                    async move {
                        if cancel.is_cancelled() {
                            return (position, entry, None);
                        }
                        let (entry, outcome) =
                            self.process_entry(chain, validator, entry, &cancel).await;
                        (position, entry, Some(outcome))
                    }
                })
                .buffer_unordered(self.worker_count)
                .collect()
                .await;

        // Completion order is arbitrary; restore selection order.
        results.sort_by_key(|(position, _, _)| *position);

        let mut entries = Vec::with_capacity(total);
        let mut outcomes = Vec::with_capacity(total);
        for (_, entry, outcome) in results {
            entries.push(entry);
            if let Some(outcome) = outcome {
                outcomes.push(outcome);
            }
        }

        let report = ValidationReport { outcomes };
        info!(
            total,
            passed = report.passed(),
            failed = report.failed(),
            repair_attempts = report.repair_attempts(),
            "validation loop complete"
        );
        (entries, report)
    }

    async fn process_entry(
        &self,
        chain: &ModelBackendChain,
        validator: &dyn PolicyValidator,
        mut entry: SelectionEntry,
        cancel: &CancelFlag,
    ) -> (SelectionEntry, ValidationOutcome) {
        let name = entry.name().to_string();

        let (mut passed, mut message) = run_validator(validator, &name, &entry.document).await;
        let mut attempts = 0u32;
        let mut repaired = false;

        if !passed && self.ai_repair_enabled {
            for round in 0..self.max_repair_rounds {
                if cancel.is_cancelled() {
                    break;
                }

                let prompt = repair_prompt(&name, &entry.document, &message);
                match chain.complete(&prompt, self.max_tokens, None).await {
                    Ok(completion) => {
                        attempts += 1;
                        let suggestion = parse::document_body(&completion.text);
                        if suggestion.trim().is_empty()
                            || serde_yaml::from_str::<serde_yaml::Value>(&suggestion).is_err()
                        {
                            warn!(
                                policy = %name,
                                round,
                                "repair suggestion is not valid YAML, keeping document"
                            );
                            continue;
                        }

                        entry.document = suggestion;
                        let (ok, msg) = run_validator(validator, &name, &entry.document).await;
                        if ok {
                            passed = true;
                            repaired = true;
                            message = String::new();
                            break;
                        }
                        message = msg;
                    }
                    Err(err) => {
                        // Chain exhausted: no further repairs are possible.
                        warn!(policy = %name, error = %err, "repair call failed");
                        break;
                    }
                }
            }
        }

        entry.status = if repaired {
            ValidationStatus::Repaired
        } else if passed {
            ValidationStatus::Passed
        } else {
            ValidationStatus::Failed
        };

        let outcome = ValidationOutcome {
            name,
            passed,
            message: if message.is_empty() {
                None
            } else {
                Some(message)
            },
            repair_attempts: attempts,
        };
        (entry, outcome)
    }
}

async fn run_validator(
    validator: &dyn PolicyValidator,
    name: &str,
    document: &str,
) -> (bool, String) {
    match validator.validate(name, document).await {
        Ok(verdict) => (verdict.passed, verdict.message),
        Err(err) => (false, format!("validator error: {err}")),
    }
}

fn repair_prompt(name: &str, document: &str, error: &str) -> String {
    format!(
        "The policy '{name}' failed validation.\n\nVALIDATOR OUTPUT:\n{error}\n\n\
         CURRENT DOCUMENT:\n{document}\n\n\
         Fix the document so it passes validation while keeping its intent. \
         Return ONLY the corrected YAML document."
    )
}
