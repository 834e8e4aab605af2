use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::ValidationResult;

pub type Result<T> = std::result::Result<T, ForgeError>;

/// Error categories surfaced to callers. Callers branch on `code()`, never on messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    GenerationService,
    WorkflowStructure,
    Timeout,
    SelectionFailure,
    Internal,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::GenerationService => "generation_service",
            ErrorKind::WorkflowStructure => "workflow_structure",
            ErrorKind::Timeout => "timeout",
            ErrorKind::SelectionFailure => "selection_failure",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("generation service failed: {0}")]
    Generation(String),
    #[error("workflow failed validation with {} error(s)", .0.errors.len())]
    Validation(Box<ValidationResult>),
    #[error("{scope} exceeded its time budget of {budget_ms}ms")]
    Timeout { scope: String, budget_ms: u64 },
    #[error("no agent matches the request: {0}")]
    Selection(String),
    #[error("run cancelled")]
    Cancelled,
    #[error("artifact `{0}` not found")]
    ArtifactNotFound(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ForgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ForgeError::Generation(_) => ErrorKind::GenerationService,
            ForgeError::Validation(_) => ErrorKind::WorkflowStructure,
            ForgeError::Timeout { .. } => ErrorKind::Timeout,
            ForgeError::Selection(_) => ErrorKind::SelectionFailure,
            ForgeError::Cancelled
            | ForgeError::ArtifactNotFound(_)
            | ForgeError::Store(_)
            | ForgeError::Config(_)
            | ForgeError::Serialization(_)
            | ForgeError::Other(_) => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    pub fn timeout(scope: impl Into<String>, budget: std::time::Duration) -> Self {
        ForgeError::Timeout {
            scope: scope.into(),
            budget_ms: budget.as_millis() as u64,
        }
    }

    /// Structured payload attached to a `RUN_ERROR`, if any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ForgeError::Validation(result) => serde_json::to_value(&result.errors).ok(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ForgeError {
    fn from(error: serde_json::Error) -> Self {
        ForgeError::Serialization(error.to_string())
    }
}
