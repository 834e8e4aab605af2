use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ForgeError, Result};

use super::agent::{Agent, AgentDescriptor, AgentStatus};
use super::builtin::{GeneratorAgent, OrchestratorAgent, ValidatorAgent, GENERATOR_NAME};

#[derive(Clone)]
pub struct AgentEntry {
    pub agent: Arc<dyn Agent>,
    pub descriptor: AgentDescriptor,
    pub status: AgentStatus,
}

/// Process-wide table of agents in declaration order.
///
/// Readers take a snapshot (`Arc<Vec<_>>`); writers build a new vector and
/// swap it in, so a reader never sees a half-applied health check.
pub struct AgentRegistry {
    entries: RwLock<Arc<Vec<AgentEntry>>>,
    default_agent: RwLock<Option<String>>,
    monitor: Mutex<Option<CancellationToken>>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
            default_agent: RwLock::new(None),
            monitor: Mutex::new(None),
        }
    }

    /// Generator, Validator and Orchestrator, with the generator as default.
    pub fn standard() -> Self {
        let registry = Self::new();
        let builtins: [Arc<dyn Agent>; 3] = [
            Arc::new(GeneratorAgent::new()),
            Arc::new(ValidatorAgent::new()),
            Arc::new(OrchestratorAgent::new()),
        ];
        for agent in builtins {
            // Names are distinct constants.
            let _ = registry.register(agent);
        }
        registry.set_default(GENERATOR_NAME);
        registry
    }

    pub fn register(&self, agent: Arc<dyn Agent>) -> Result<()> {
        let descriptor = agent.descriptor().clone();
        let mut guard = self.entries.write();
        if guard.iter().any(|entry| entry.descriptor.name == descriptor.name) {
            return Err(ForgeError::Config(format!(
                "agent `{}` is already registered",
                descriptor.name
            )));
        }
        let mut next = Vec::clone(&guard);
        debug!(agent = %descriptor.name, "agent registered");
        next.push(AgentEntry {
            agent,
            descriptor,
            status: AgentStatus::Unknown,
        });
        *guard = Arc::new(next);
        Ok(())
    }

    pub fn set_default(&self, name: &str) {
        *self.default_agent.write() = Some(name.to_string());
    }

    pub fn default_agent(&self) -> Option<String> {
        self.default_agent.read().clone()
    }

    pub fn snapshot(&self) -> Arc<Vec<AgentEntry>> {
        Arc::clone(&self.entries.read())
    }

    pub fn descriptors(&self) -> Vec<AgentDescriptor> {
        self.snapshot()
            .iter()
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    pub fn status(&self, name: &str) -> Option<AgentStatus> {
        self.snapshot()
            .iter()
            .find(|entry| entry.descriptor.name == name)
            .map(|entry| entry.status)
    }

    pub fn set_status(&self, name: &str, status: AgentStatus) {
        self.apply_statuses(&[(name.to_string(), status)]);
    }

    /// Probes every agent and publishes the new statuses in one swap.
    pub async fn health_check(&self) -> Vec<(String, AgentStatus)> {
        let entries = self.snapshot();
        let mut statuses = Vec::with_capacity(entries.len());
        for entry in entries.iter() {
            let status = if entry.agent.health_check().await {
                AgentStatus::Healthy
            } else {
                AgentStatus::Unhealthy
            };
            if status != entry.status {
                info!(agent = %entry.descriptor.name, ?status, "agent status changed");
            }
            statuses.push((entry.descriptor.name.clone(), status));
        }
        self.apply_statuses(&statuses);
        statuses
    }

    fn apply_statuses(&self, statuses: &[(String, AgentStatus)]) {
        let mut guard = self.entries.write();
        let next: Vec<AgentEntry> = guard
            .iter()
            .map(|entry| {
                let status = statuses
                    .iter()
                    .find(|(name, _)| *name == entry.descriptor.name)
                    .map_or(entry.status, |(_, status)| *status);
                AgentEntry {
                    status,
                    ..entry.clone()
                }
            })
            .collect();
        *guard = Arc::new(next);
    }

    /// Runs `health_check` every `interval` until `parent` or [`shutdown`](Self::shutdown)
    /// cancels it. A previously spawned monitor is stopped.
    pub fn spawn_health_monitor(
        self: &Arc<Self>,
        interval: Duration,
        parent: &CancellationToken,
    ) -> JoinHandle<()> {
        let token = parent.child_token();
        if let Some(previous) = self.monitor.lock().replace(token.clone()) {
            previous.cancel();
        }
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let statuses = registry.health_check().await;
                        let unhealthy = statuses
                            .iter()
                            .filter(|(_, status)| *status == AgentStatus::Unhealthy)
                            .count();
                        if unhealthy > 0 {
                            warn!(unhealthy, "health check found unhealthy agents");
                        }
                    }
                }
            }
            debug!("health monitor stopped");
        })
    }

    /// Stops the health monitor, if any.
    pub fn shutdown(&self) {
        if let Some(token) = self.monitor.lock().take() {
            token.cancel();
        }
    }
}

impl Drop for AgentRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;

    use crate::agent::AgentKind;
    use crate::runtime::RunContext;

    struct Flaky {
        descriptor: AgentDescriptor,
    }

    #[async_trait]
    impl Agent for Flaky {
        fn descriptor(&self) -> &AgentDescriptor {
            &self.descriptor
        }

        async fn execute(&self, _ctx: &mut RunContext) -> Result<Value> {
            Ok(Value::Null)
        }

        async fn health_check(&self) -> bool {
            false
        }
    }

    #[test]
    fn standard_registry_keeps_declaration_order() {
        let registry = AgentRegistry::standard();
        let names: Vec<String> = registry.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["generator", "validator", "orchestrator"]);
        assert_eq!(registry.default_agent().as_deref(), Some("generator"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let registry = AgentRegistry::standard();
        assert!(registry.register(Arc::new(GeneratorAgent::new())).is_err());
    }

    #[tokio::test]
    async fn health_check_swaps_statuses() {
        let registry = AgentRegistry::standard();
        let before = registry.snapshot();
        registry
            .register(Arc::new(Flaky {
                descriptor: AgentDescriptor::new("flaky", AgentKind::Validator),
            }))
            .unwrap();

        registry.health_check().await;
        assert_eq!(registry.status("generator"), Some(AgentStatus::Healthy));
        assert_eq!(registry.status("flaky"), Some(AgentStatus::Unhealthy));
        // Earlier snapshots are untouched.
        assert!(before.iter().all(|entry| entry.status == AgentStatus::Unknown));
    }
}
