use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::{sleep, timeout, Duration};
use tokio_util::sync::CancellationToken;

use flowforge::{
    Agent, AgentDescriptor, AgentKind, AgentRegistry, AgentStatus, Dispatcher, ForgeConfig,
    LocalEchoClient, RunContext, RunRequest, RuntimeServices,
};

/// Health is toggled from the test.
struct Switchable {
    descriptor: AgentDescriptor,
    healthy: Arc<AtomicBool>,
}

#[async_trait]
impl Agent for Switchable {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: &mut RunContext) -> flowforge::Result<Value> {
        ctx.start_step("noop").await?;
        ctx.finish_step().await?;
        Ok(Value::Null)
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

fn switchable(healthy: Arc<AtomicBool>) -> Arc<Switchable> {
    Arc::new(Switchable {
        descriptor: AgentDescriptor::new("switchable", AgentKind::Validator)
            .with_operations(["probe"]),
        healthy,
    })
}

#[tokio::test]
async fn monitor_marks_agents_and_stops_on_shutdown() -> anyhow::Result<()> {
    let healthy = Arc::new(AtomicBool::new(true));
    let registry = Arc::new(AgentRegistry::standard());
    registry.register(switchable(healthy.clone()))?;

    let root = CancellationToken::new();
    let monitor = registry.spawn_health_monitor(Duration::from_millis(10), &root);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(registry.status("switchable"), Some(AgentStatus::Healthy));

    healthy.store(false, Ordering::SeqCst);
    sleep(Duration::from_millis(50)).await;
    assert_eq!(registry.status("switchable"), Some(AgentStatus::Unhealthy));
    assert_eq!(registry.status("generator"), Some(AgentStatus::Healthy));

    registry.shutdown();
    timeout(Duration::from_secs(1), monitor).await??;
    Ok(())
}

#[tokio::test]
async fn parent_token_stops_the_monitor() -> anyhow::Result<()> {
    let registry = Arc::new(AgentRegistry::standard());
    let root = CancellationToken::new();
    let monitor = registry.spawn_health_monitor(Duration::from_millis(10), &root);
    root.cancel();
    timeout(Duration::from_secs(1), monitor).await??;
    Ok(())
}

#[tokio::test]
async fn unhealthy_agent_is_not_selected() -> anyhow::Result<()> {
    let healthy = Arc::new(AtomicBool::new(false));
    let registry = Arc::new(AgentRegistry::new());
    registry.register(switchable(healthy.clone()))?;
    let dispatcher = Dispatcher::new(
        registry.clone(),
        RuntimeServices::new(Arc::new(LocalEchoClient), ForgeConfig::default()),
    );
    let request = || RunRequest::new().with_context("operation", "probe");

    registry.health_check().await;
    let events = dispatcher.run(request()).collect_all().await;
    assert_eq!(events.last().and_then(|e| e.error_code()), Some("selection_failure"));

    healthy.store(true, Ordering::SeqCst);
    registry.health_check().await;
    let events = dispatcher.run(request()).collect_all().await;
    assert_eq!(events.last().map(|e| e.name()), Some("RUN_FINISHED"));
    Ok(())
}
