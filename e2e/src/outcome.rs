use std::{borrow::Cow, time::Duration};
use thiserror::Error;

/// How a scenario ended on one browser.
#[derive(Debug)]
pub enum Outcome {
    Pass,
    Fail(anyhow::Error),
    /// The scenario opted out for the current environment.
    Skipped(Cow<'static, str>),
}

impl Outcome {
    pub fn skipped(reason: impl Into<Cow<'static, str>>) -> Self {
        Outcome::Skipped(reason.into())
    }

    pub fn from_result(result: anyhow::Result<Outcome>) -> Self {
        result.unwrap_or_else(Outcome::Fail)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Fail(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }

    /// Report tag. Timeouts are told apart from wrong values.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Pass => "OK",
            Outcome::Skipped(_) => "SKIPPED",
            Outcome::Fail(err) => match err.downcast_ref::<Failure>() {
                Some(Failure::Timeout { .. }) => "TIMEOUT",
                _ => "FAILED",
            },
        }
    }
}

/// A step that did not produce the expected state.
#[derive(Debug, Error)]
pub enum Failure {
    #[error("step {step} ({action}): expected {expected}, got {actual}")]
    Assertion {
        step: usize,
        action: String,
        expected: String,
        actual: String,
    },
    #[error("step {step} ({action}): timed out after {waited:?}")]
    Timeout {
        step: usize,
        action: String,
        waited: Duration,
    },
}

impl Failure {
    pub fn step(&self) -> usize {
        match self {
            Failure::Assertion { step, .. } | Failure::Timeout { step, .. } => *step,
        }
    }
}
