//! What to do when an upgrade scriptlet fails on one unit

use anyhow::{Context, Result};
use dialoguer::Confirm;

pub trait ContinuePolicy {
    /// `true` skips `unit` for the rest of the run and carries on with the others
    fn should_continue(&self, unit: &str, error: &anyhow::Error) -> Result<bool>;
}

/// Silent mode: every failure aborts the run
#[derive(Debug, Default)]
pub struct AlwaysAbort;

impl ContinuePolicy for AlwaysAbort {
    fn should_continue(&self, _unit: &str, _error: &anyhow::Error) -> Result<bool> {
        Ok(false)
    }
}

/// Interactive mode: ask the operator
#[derive(Debug, Default)]
pub struct PromptOperator;

impl ContinuePolicy for PromptOperator {
    fn should_continue(&self, unit: &str, _error: &anyhow::Error) -> Result<bool> {
        Confirm::new()
            .with_prompt(format!("Skip {unit} and continue upgrading the rest?"))
            .default(false)
            .interact()
            .context("Failed to read confirmation")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_abort() {
        let err = anyhow::anyhow!("boom");
        assert!(!AlwaysAbort.should_continue("pki-tomcat/ca", &err).unwrap());
    }
}
