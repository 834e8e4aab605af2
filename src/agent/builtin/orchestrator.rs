use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::agent::{Agent, AgentDescriptor, AgentKind};
use crate::error::{ForgeError, Result};
use crate::protocol::{ARTIFACT_ID_HINT, WORKFLOW_HINT};
use crate::runtime::RunContext;
use crate::store::ArtifactStore;
use crate::workflow::WorkflowArtifact;

use super::generator::GeneratorAgent;
use super::GENERATE_STEP;

pub const ORCHESTRATOR_NAME: &str = "orchestrator";

const LOAD_STEP: &str = "load";
const RECORD_STEP: &str = "record";
const SAVE_STEP: &str = "save";

/// Modifies an existing workflow: load, regenerate through the generator,
/// record the iteration, save.
pub struct OrchestratorAgent {
    descriptor: AgentDescriptor,
    generator: GeneratorAgent,
}

impl Default for OrchestratorAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorAgent {
    pub fn new() -> Self {
        Self {
            descriptor: AgentDescriptor::new(ORCHESTRATOR_NAME, AgentKind::Orchestrator)
                .with_operations(["modify", "iterate"])
                .with_keywords(["modify", "update", "change", "edit", "iterate"]),
            generator: GeneratorAgent::new(),
        }
    }

    async fn load_prior(&self, ctx: &RunContext, artifact_id: Option<&str>) -> Result<WorkflowArtifact> {
        if let Some(document) = ctx.request().prior(WORKFLOW_HINT) {
            let check = ctx.services().chain.validate(document);
            if !check.is_valid {
                return Err(ForgeError::Validation(Box::new(check)));
            }
            return WorkflowArtifact::from_value(document.clone());
        }

        let id = artifact_id.ok_or_else(|| {
            ForgeError::ArtifactNotFound("no prior workflow and no artifact_id hint".to_string())
        })?;
        let store = self.store(ctx)?;
        ctx.within_step(async move { store.load(id).await }).await
    }

    fn store(&self, ctx: &RunContext) -> Result<Arc<dyn ArtifactStore>> {
        ctx.services()
            .store
            .clone()
            .ok_or_else(|| ForgeError::Store("no artifact store configured".to_string()))
    }
}

#[async_trait]
impl Agent for OrchestratorAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<Value> {
        let artifact_id = ctx.request().hint(ARTIFACT_ID_HINT).map(str::to_string);

        ctx.start_step(LOAD_STEP).await?;
        let prior = self.load_prior(ctx, artifact_id.as_deref()).await?;
        ctx.finish_step().await?;

        let previous = ctx.set_origin(Some(GENERATE_STEP.to_string()));
        let generated = self.generator.generate(ctx, Some(&prior)).await;
        ctx.set_origin(previous);
        let outcome = generated?;
        let next = WorkflowArtifact::from_value(outcome.document.clone())?;

        ctx.start_step(RECORD_STEP).await?;
        let key = artifact_id.unwrap_or_else(|| prior.name.clone());
        let description = ctx.request().last_user_message().unwrap_or_default().to_string();
        let tracker = Arc::clone(&ctx.services().tracker);
        let record = tracker.record(&key, &prior, &next, description).await?;
        let record = serde_json::to_value(&record)?;
        ctx.replace_state("iteration", record.clone()).await?;
        ctx.finish_step().await?;

        if let Ok(store) = self.store(ctx) {
            ctx.start_step(SAVE_STEP).await?;
            ctx.within_step(store.save(&key, &next)).await?;
            ctx.finish_step().await?;
        }
        info!(artifact_id = %key, "workflow iteration complete");

        Ok(json!({
            "workflow": outcome.document,
            "iteration": record,
            "validation": serde_json::to_value(&outcome.validation)?,
        }))
    }
}
