use serde_json::Value;

use crate::error::{ForgeError, Result};
use crate::llm::LlmRequest;
use crate::protocol::RunRequest;
use crate::validation::NodePolicy;
use crate::workflow::WorkflowArtifact;

const SYSTEM_TEMPLATE: &str = "You are a workflow architect. Reply with a single JSON document \
describing the workflow: {\"name\", \"nodes\": [{\"name\", \"type\", \"parameters\", \
\"position\": [x, y]}], \"connections\": {source: {\"main\": [[{\"node\", \"type\": \"main\", \
\"index\"}]]}}}. Node names must be unique and every connection must reference existing nodes.";

const TRIGGER_HINT_PREFIX: &str = "Start the workflow with a trigger node such as: ";
const PRIOR_PREFIX: &str = "Current workflow:\n";
const CHANGE_PREFIX: &str = "Requested change:\n";

/// Builds the generation request for a run.
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn system_prompt(policy: &NodePolicy) -> String {
        let mut prompt = SYSTEM_TEMPLATE.to_string();
        if !policy.trigger_types.is_empty() {
            prompt.push('\n');
            prompt.push_str(TRIGGER_HINT_PREFIX);
            prompt.push_str(&policy.trigger_types.join(", "));
        }
        prompt
    }

    /// User prompt: the prior artifact (when modifying) followed by the ask.
    pub fn user_prompt(request: &RunRequest, prior: Option<&WorkflowArtifact>) -> Result<String> {
        let ask = request
            .last_user_message()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ForgeError::Generation("the request carries no user message".into()))?;

        match prior {
            Some(artifact) => {
                let current: Value = artifact.to_value()?;
                Ok(format!(
                    "{PRIOR_PREFIX}{}\n\n{CHANGE_PREFIX}{ask}",
                    serde_json::to_string_pretty(&current)?
                ))
            }
            None => Ok(ask.to_string()),
        }
    }

    pub fn request(
        request: &RunRequest,
        prior: Option<&WorkflowArtifact>,
        policy: &NodePolicy,
    ) -> Result<LlmRequest> {
        Ok(LlmRequest::new(Self::user_prompt(request, prior)?).with_system(Self::system_prompt(policy)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RunMessage;
    use crate::workflow::WorkflowNode;

    #[test]
    fn modification_prompt_embeds_prior_artifact() {
        let prior = WorkflowArtifact::new("demo")
            .with_node(WorkflowNode::new("Start", "n8n-nodes-base.manualTrigger"));
        let request = RunRequest::new().with_message(RunMessage::user("add an email step"));
        let prompt = PromptBuilder::user_prompt(&request, Some(&prior)).unwrap();
        assert!(prompt.starts_with(PRIOR_PREFIX));
        assert!(prompt.contains("\"Start\""));
        assert!(prompt.ends_with("add an email step"));
    }

    #[test]
    fn missing_user_message_is_a_generation_error() {
        let err = PromptBuilder::user_prompt(&RunRequest::new(), None).unwrap_err();
        assert_eq!(err.code(), "generation_service");
    }

    #[test]
    fn system_prompt_lists_trigger_types() {
        let prompt = PromptBuilder::system_prompt(&NodePolicy::default());
        assert!(prompt.contains("n8n-nodes-base.webhook"));
    }
}
