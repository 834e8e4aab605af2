use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::agent::{Agent, AgentDescriptor, AgentKind};
use crate::error::{ForgeError, Result};
use crate::protocol::MessageRole;
use crate::runtime::RunContext;
use crate::validation::ValidationResult;
use crate::workflow::{extract_json, WorkflowArtifact};

use super::prompt::PromptBuilder;
use super::{GENERATE_STEP, VALIDATE_STEP};

pub const GENERATOR_NAME: &str = "generator";

/// A generated document that passed the validation chain.
#[derive(Clone, Debug)]
pub struct GenerationOutcome {
    pub document: Value,
    pub validation: ValidationResult,
}

/// Asks the generation service for a workflow and validates the answer.
pub struct GeneratorAgent {
    descriptor: AgentDescriptor,
}

impl Default for GeneratorAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneratorAgent {
    pub fn new() -> Self {
        Self {
            descriptor: AgentDescriptor::new(GENERATOR_NAME, AgentKind::Generator)
                .with_operations(["generate", "create"])
                .with_keywords(["generate", "create", "build", "make"]),
        }
    }

    /// Steps `generate` then `validate`. With `prior`, the model is asked to
    /// revise that artifact instead of starting fresh.
    #[instrument(skip_all, fields(run_id = %ctx.run_id(), revising = prior.is_some()))]
    pub async fn generate(
        &self,
        ctx: &mut RunContext,
        prior: Option<&WorkflowArtifact>,
    ) -> Result<GenerationOutcome> {
        ctx.start_step(GENERATE_STEP).await?;
        let request = PromptBuilder::request(ctx.request(), prior, &ctx.config().validation.policy)?;
        let llm = ctx.services().llm.clone();
        let budget = ctx.config().generation_timeout();
        let response = ctx
            .within_step(async move {
                match tokio::time::timeout(budget, llm.complete(request)).await {
                    Ok(Ok(response)) => Ok(response),
                    Ok(Err(err @ ForgeError::Generation(_))) => Err(err),
                    Ok(Err(err)) => Err(ForgeError::Generation(err.to_string())),
                    Err(_) => Err(ForgeError::Generation(format!(
                        "no response within {}ms",
                        budget.as_millis()
                    ))),
                }
            })
            .await?;
        ctx.emit_text(MessageRole::Assistant, &response.content).await?;

        let document: Value = serde_json::from_str(&extract_json(&response.content)).map_err(|e| {
            ForgeError::Generation(format!("response is not a JSON workflow: {e}"))
        })?;
        debug!(bytes = response.content.len(), "generation parsed");
        ctx.replace_state("workflow", document.clone()).await?;
        ctx.finish_step().await?;

        ctx.start_step(VALIDATE_STEP).await?;
        ctx.emit_tool_call(
            "validate_workflow",
            &json!({ "stages": ctx.services().chain.stage_names() }),
        )
        .await?;
        let validation = ctx.services().chain.validate(&document);
        ctx.replace_state("validation", serde_json::to_value(&validation)?)
            .await?;
        ctx.finish_step().await?;

        if !validation.is_valid {
            return Err(ForgeError::Validation(Box::new(validation)));
        }
        Ok(GenerationOutcome {
            document,
            validation,
        })
    }
}

#[async_trait]
impl Agent for GeneratorAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<Value> {
        let outcome = self.generate(ctx, None).await?;
        Ok(json!({
            "workflow": outcome.document,
            "validation": serde_json::to_value(&outcome.validation)?,
        }))
    }
}
