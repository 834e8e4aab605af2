use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agent::{Agent, AgentDescriptor, AgentKind};
use crate::error::Result;
use crate::protocol::{RunRequest, WORKFLOW_HINT};
use crate::runtime::RunContext;
use crate::workflow::extract_json;

use super::VALIDATE_STEP;

pub const VALIDATOR_NAME: &str = "validator";

/// Runs the validation chain against a caller-supplied document.
pub struct ValidatorAgent {
    descriptor: AgentDescriptor,
}

impl Default for ValidatorAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidatorAgent {
    pub fn new() -> Self {
        Self {
            descriptor: AgentDescriptor::new(VALIDATOR_NAME, AgentKind::Validator)
                .with_operations(["validate"])
                .with_keywords(["validate", "check", "verify", "lint"]),
        }
    }
}

/// The `workflow` context hint (object or JSON text), then the prior state's
/// `workflow`, then JSON embedded in the last user message. `Null` when none.
fn supplied_document(request: &RunRequest) -> Value {
    match request.context.get(WORKFLOW_HINT) {
        Some(Value::String(raw)) => {
            return serde_json::from_str(&extract_json(raw)).unwrap_or(Value::String(raw.clone()))
        }
        Some(value) => return value.clone(),
        None => {}
    }
    if let Some(prior) = request.prior(WORKFLOW_HINT) {
        return prior.clone();
    }
    request
        .last_user_message()
        .and_then(|text| serde_json::from_str(&extract_json(text)).ok())
        .unwrap_or(Value::Null)
}

#[async_trait]
impl Agent for ValidatorAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<Value> {
        ctx.start_step(VALIDATE_STEP).await?;
        let document = supplied_document(ctx.request());
        let result = serde_json::to_value(ctx.services().chain.validate(&document))?;
        ctx.replace_state("validation", result.clone()).await?;
        ctx.finish_step().await?;
        Ok(json!({ "validation": result }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RunMessage;

    #[test]
    fn context_hint_wins_over_message() {
        let request = RunRequest::new()
            .with_context(WORKFLOW_HINT, json!({"name": "hinted", "nodes": []}))
            .with_message(RunMessage::user(r#"{"name": "typed", "nodes": []}"#));
        assert_eq!(supplied_document(&request)["name"], "hinted");
    }

    #[test]
    fn string_hint_is_parsed() {
        let request =
            RunRequest::new().with_context(WORKFLOW_HINT, r#"```json {"name": "raw"} ```"#);
        assert_eq!(supplied_document(&request)["name"], "raw");
    }

    #[test]
    fn nothing_supplied_yields_null() {
        let request = RunRequest::new().with_message(RunMessage::user("check it please"));
        assert_eq!(supplied_document(&request), Value::Null);
    }
}
