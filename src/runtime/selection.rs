use crate::agent::{AgentEntry, AgentStatus};
use crate::error::{ForgeError, Result};
use crate::protocol::RunRequest;

/// Picks the agent for a run.
///
/// Priority: an explicit `operation` hint, then keywords found in the last user
/// message, then the registry's default agent. Unhealthy agents never match.
/// Within one tier the earliest registered agent wins.
pub fn select_agent(
    request: &RunRequest,
    entries: &[AgentEntry],
    default_agent: Option<&str>,
) -> Result<AgentEntry> {
    let available = || {
        entries
            .iter()
            .filter(|entry| entry.status != AgentStatus::Unhealthy)
    };

    if let Some(operation) = request.operation() {
        return available()
            .find(|entry| entry.descriptor.handles_operation(operation))
            .cloned()
            .ok_or_else(|| {
                ForgeError::Selection(format!("no available agent handles operation `{operation}`"))
            });
    }

    if let Some(message) = request.last_user_message() {
        let words = tokenize(message);
        if let Some(entry) = available().find(|entry| {
            words
                .iter()
                .any(|word| entry.descriptor.matches_keyword(word))
        }) {
            return Ok(entry.clone());
        }
    }

    default_agent
        .and_then(|name| available().find(|entry| entry.descriptor.name == name))
        .cloned()
        .ok_or_else(|| {
            ForgeError::Selection("no keyword matched and no default agent is available".into())
        })
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}
