use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::runtime::RunContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Generator,
    Validator,
    Orchestrator,
}

/// What an agent accepts: explicit operations and trigger words.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub kind: AgentKind,
    #[serde(default)]
    pub operations: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl AgentDescriptor {
    pub fn new(name: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            operations: Vec::new(),
            keywords: Vec::new(),
        }
    }

    pub fn with_operations<I, S>(mut self, operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.operations = operations.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords
            .into_iter()
            .map(|keyword| keyword.into().to_lowercase())
            .collect();
        self
    }

    pub fn handles_operation(&self, operation: &str) -> bool {
        self.operations
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(operation))
    }

    /// `word` must already be lowercase.
    pub fn matches_keyword(&self, word: &str) -> bool {
        self.keywords.iter().any(|keyword| keyword == word)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

/// A unit that turns one run request into events.
///
/// Implementations emit step, message, state and tool-call events through
/// the context. The dispatcher owns `RUN_STARTED` and the terminal event: the
/// returned value becomes `RUN_FINISHED.result`, an error becomes `RUN_ERROR`.
#[async_trait]
pub trait Agent: Send + Sync {
    fn descriptor(&self) -> &AgentDescriptor;

    async fn execute(&self, ctx: &mut RunContext) -> Result<Value>;

    async fn health_check(&self) -> bool {
        true
    }
}
