//! External policy validator port.
//!
//! The validator is an external oracle: document in, pass/fail plus message
//! out. The engine never mutates it and treats identical inputs as yielding
//! identical verdicts.

use anyhow::Result;
use async_trait::async_trait;

/// Verdict for one validated document.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub passed: bool,
    /// Validator output; populated on failure, often empty on success.
    pub message: String,
}

impl Verdict {
    pub fn pass() -> Self {
        Self {
            passed: true,
            message: String::new(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }
}

/// Port trait for the external policy-test runner.
#[async_trait]
pub trait PolicyValidator: Send + Sync {
    /// Validate a single policy document.
    ///
    /// An `Err` means the validator itself could not run; the validation
    /// loop records it as a failure with the error text as message.
    async fn validate(&self, name: &str, document: &str) -> Result<Verdict>;
}
