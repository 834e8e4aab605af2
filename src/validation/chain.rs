use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::workflow::WorkflowArtifact;

use super::policy::{NodePolicy, ValidationConfig, ValidationMode};
use super::result::{Severity, ValidationResult, ValidationSummary};
use super::stages::{ConnectionStage, NodeStage, StageOutput, StructuralStage, ValidationStage};

struct StageEntry {
    stage: Box<dyn ValidationStage>,
    mode: ValidationMode,
}

/// Ordered, stateless pipeline of validation stages.
///
/// `validate` takes `&self` and keeps no state between calls, so one chain can
/// be shared across concurrent runs.
pub struct ValidationChain {
    stages: Vec<StageEntry>,
    policy: NodePolicy,
}

impl ValidationChain {
    /// Structure, node, and connection stages, all in the configured mode.
    pub fn new(config: &ValidationConfig) -> Self {
        let mode = config.mode();
        Self::builder()
            .policy(config.policy.clone())
            .stage(StructuralStage::default(), mode)
            .stage(NodeStage, mode)
            .stage(ConnectionStage, mode)
            .build()
    }

    pub fn builder() -> ValidationChainBuilder {
        ValidationChainBuilder::default()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|entry| entry.stage.name()).collect()
    }

    pub fn validate(&self, document: &Value) -> ValidationResult {
        let mut findings = Vec::new();
        let mut summary = ValidationSummary::default();

        for entry in &self.stages {
            let mut output = StageOutput::default();
            entry.stage.check(document, &self.policy, &mut output);
            summary.stages_run.push(entry.stage.name().to_string());
            if let Some(count) = output.nodes_checked {
                summary.nodes_checked = count;
            }
            if let Some(count) = output.connections_checked {
                summary.connections_checked = count;
            }

            let before = findings.len();
            findings.extend(output.findings.into_iter().map(|f| f.resolve(entry.mode)));
            let stage_failed = findings[before..]
                .iter()
                .any(|finding| finding.severity == Severity::Error);

            debug!(
                stage = entry.stage.name(),
                findings = findings.len() - before,
                failed = stage_failed,
                "validation stage finished"
            );

            if stage_failed && entry.stage.is_fatal() {
                break;
            }
        }

        ValidationResult::assemble(findings, summary)
    }

    pub fn validate_artifact(&self, artifact: &WorkflowArtifact) -> Result<ValidationResult> {
        Ok(self.validate(&artifact.to_value()?))
    }
}

impl Default for ValidationChain {
    fn default() -> Self {
        Self::new(&ValidationConfig::default())
    }
}

#[derive(Default)]
pub struct ValidationChainBuilder {
    stages: Vec<StageEntry>,
    policy: NodePolicy,
}

impl ValidationChainBuilder {
    pub fn policy(mut self, policy: NodePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn stage<S>(mut self, stage: S, mode: ValidationMode) -> Self
    where
        S: ValidationStage + 'static,
    {
        self.stages.push(StageEntry {
            stage: Box::new(stage),
            mode,
        });
        self
    }

    pub fn build(self) -> ValidationChain {
        ValidationChain {
            stages: self.stages,
            policy: self.policy,
        }
    }
}
