//! Scenario error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("scenario {scenario} failed to build: {message}")]
    Build { scenario: String, message: String },

    #[error("step {step}: unknown binding ${binding}")]
    UnknownBinding { step: String, binding: String },

    #[error("step {step}: {message}")]
    AssertionFailed { step: String, message: String },
}

impl ScenarioError {
    pub fn build(scenario: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Build {
            scenario: scenario.into(),
            message: message.into(),
        }
    }

    pub fn unknown_binding(step: impl Into<String>, binding: impl Into<String>) -> Self {
        Self::UnknownBinding {
            step: step.into(),
            binding: binding.into(),
        }
    }

    pub fn assertion_failed(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            step: step.into(),
            message: message.into(),
        }
    }
}

pub type ScenarioResult<T> = Result<T, ScenarioError>;
