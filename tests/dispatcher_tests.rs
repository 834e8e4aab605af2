use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::time::{sleep, timeout, Duration};

use flowforge::{
    Agent, AgentDescriptor, AgentKind, AgentRegistry, Dispatcher, Event, EventKind, ForgeConfig,
    ForgeError, LlmClient, LlmRequest, LlmResponse, LocalEchoClient, RunContext, RunMessage,
    RunRequest, RuntimeServices, StaticClient,
};

const VALID_WORKFLOW: &str = r#"Here you go:
```json
{
  "name": "fetch-on-demand",
  "nodes": [
    {"name": "Start", "type": "n8n-nodes-base.manualTrigger", "position": [0, 0], "parameters": {}},
    {"name": "Fetch", "type": "n8n-nodes-base.httpRequest", "position": [220, 0], "parameters": {"url": "https://example.com"}}
  ],
  "connections": {
    "Start": {"main": [[{"node": "Fetch", "type": "main", "index": 0}]]}
  }
}
```"#;

struct SlowClient {
    delay: Duration,
}

#[async_trait]
impl LlmClient for SlowClient {
    async fn complete(&self, _request: LlmRequest) -> flowforge::Result<LlmResponse> {
        sleep(self.delay).await;
        Ok(LlmResponse::text(VALID_WORKFLOW))
    }
}

struct UnavailableClient;

#[async_trait]
impl LlmClient for UnavailableClient {
    async fn complete(&self, _request: LlmRequest) -> flowforge::Result<LlmResponse> {
        Err(ForgeError::Generation("service unavailable (503)".into()))
    }
}

/// Opens a step, then sleeps without checking for cancellation.
struct SleepyAgent {
    descriptor: AgentDescriptor,
    nap: Duration,
    woke: Arc<AtomicBool>,
}

impl SleepyAgent {
    fn new(nap: Duration, woke: Arc<AtomicBool>) -> Self {
        Self {
            descriptor: AgentDescriptor::new("sleepy", AgentKind::Generator)
                .with_keywords(["nap"]),
            nap,
            woke,
        }
    }
}

#[async_trait]
impl Agent for SleepyAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: &mut RunContext) -> flowforge::Result<Value> {
        ctx.start_step("nap").await?;
        sleep(self.nap).await;
        self.woke.store(true, Ordering::SeqCst);
        ctx.finish_step().await?;
        Ok(Value::Null)
    }
}

struct PanickingAgent {
    descriptor: AgentDescriptor,
}

#[async_trait]
impl Agent for PanickingAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _ctx: &mut RunContext) -> flowforge::Result<Value> {
        panic!("bookkeeping bug");
    }
}

fn names(events: &[Event]) -> Vec<&'static str> {
    events.iter().map(Event::name).collect()
}

fn single_agent_dispatcher(agent: Arc<dyn Agent>, config: ForgeConfig) -> Dispatcher {
    let registry = AgentRegistry::new();
    let name = agent.descriptor().name.clone();
    registry.register(agent).unwrap();
    registry.set_default(&name);
    Dispatcher::new(
        Arc::new(registry),
        RuntimeServices::new(Arc::new(LocalEchoClient), config),
    )
}

fn assert_well_formed(events: &[Event]) {
    assert!(!events.is_empty());
    assert_eq!(events[0].name(), "RUN_STARTED");
    assert_eq!(events.iter().filter(|e| e.name() == "RUN_STARTED").count(), 1);
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert!(events.last().unwrap().is_terminal());
    assert!(events.windows(2).all(|pair| pair[0].timestamp < pair[1].timestamp));
    assert!(events.iter().all(|e| e.run_id == events[0].run_id));
}

#[tokio::test]
async fn validate_operation_without_artifact_emits_snapshot() -> anyhow::Result<()> {
    let dispatcher = Dispatcher::with_defaults(Arc::new(LocalEchoClient), ForgeConfig::default());
    let request = RunRequest::new().with_context("operation", "validate");
    let events = dispatcher.run(request).collect_all().await;

    assert_eq!(
        names(&events),
        vec!["RUN_STARTED", "STEP_STARTED", "STATE_SNAPSHOT", "STEP_FINISHED", "RUN_FINISHED"]
    );
    match &events[0].kind {
        EventKind::RunStarted { agent, .. } => assert_eq!(agent.as_deref(), Some("validator")),
        other => panic!("unexpected first event {other:?}"),
    }
    match &events[2].kind {
        EventKind::StateSnapshot { snapshot } => {
            assert_eq!(snapshot["validation"]["is_valid"], json!(false));
            assert_eq!(
                snapshot["validation"]["errors"][0]["code"],
                json!("structure.not_object")
            );
        }
        other => panic!("expected a snapshot, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn generation_timeout_is_a_generation_service_error() -> anyhow::Result<()> {
    let config = ForgeConfig {
        generation_timeout_ms: 50,
        ..ForgeConfig::default()
    };
    let dispatcher = Dispatcher::with_defaults(
        Arc::new(SlowClient {
            delay: Duration::from_secs(5),
        }),
        config,
    );
    let request = RunRequest::new().with_message(RunMessage::user("generate a fetch workflow"));
    let events = dispatcher.run(request).collect_all().await;

    assert_eq!(names(&events), vec!["RUN_STARTED", "STEP_STARTED", "RUN_ERROR"]);
    assert_eq!(events[2].error_code(), Some("generation_service"));
    Ok(())
}

#[tokio::test]
async fn unavailable_service_is_caught_locally() -> anyhow::Result<()> {
    let dispatcher = Dispatcher::with_defaults(Arc::new(UnavailableClient), ForgeConfig::default());
    let request = RunRequest::new().with_message(RunMessage::user("create something"));
    let events = dispatcher.run(request).collect_all().await;

    assert_well_formed(&events);
    assert_eq!(events.last().unwrap().error_code(), Some("generation_service"));
    assert!(!names(&events).contains(&"STEP_FINISHED"));
    Ok(())
}

#[tokio::test]
async fn step_budget_exceeded_is_a_timeout() -> anyhow::Result<()> {
    let config = ForgeConfig {
        step_timeout_ms: 50,
        generation_timeout_ms: 10_000,
        ..ForgeConfig::default()
    };
    let dispatcher = Dispatcher::with_defaults(
        Arc::new(SlowClient {
            delay: Duration::from_secs(5),
        }),
        config,
    );
    let request = RunRequest::new().with_message(RunMessage::user("build it"));
    let events = dispatcher.run(request).collect_all().await;

    assert_eq!(names(&events), vec!["RUN_STARTED", "STEP_STARTED", "RUN_ERROR"]);
    assert_eq!(events[2].error_code(), Some("timeout"));
    Ok(())
}

#[tokio::test]
async fn unparsable_response_is_a_generation_service_error() -> anyhow::Result<()> {
    // The echo client answers with prose, not JSON.
    let dispatcher = Dispatcher::with_defaults(Arc::new(LocalEchoClient), ForgeConfig::default());
    let request = RunRequest::new().with_message(RunMessage::user("make a workflow"));
    let events = dispatcher.run(request).collect_all().await;

    assert_well_formed(&events);
    assert_eq!(events.last().unwrap().error_code(), Some("generation_service"));
    assert!(names(&events).contains(&"TEXT_MESSAGE_CONTENT"));
    Ok(())
}

#[tokio::test]
async fn generator_streams_steps_and_finishes_with_workflow() -> anyhow::Result<()> {
    let dispatcher =
        Dispatcher::with_defaults(Arc::new(StaticClient::new(VALID_WORKFLOW)), ForgeConfig::default());
    let request = RunRequest::new()
        .with_thread("thread-7")
        .with_message(RunMessage::user("generate a workflow that fetches a page"));
    let events = dispatcher.run(request).collect_all().await;

    assert_well_formed(&events);
    assert_eq!(
        names(&events),
        vec![
            "RUN_STARTED",
            "STEP_STARTED",
            "TEXT_MESSAGE_START",
            "TEXT_MESSAGE_CONTENT",
            "TEXT_MESSAGE_END",
            "STATE_SNAPSHOT",
            "STEP_FINISHED",
            "STEP_STARTED",
            "TOOL_CALL_START",
            "TOOL_CALL_ARGS",
            "TOOL_CALL_END",
            "STATE_DELTA",
            "STEP_FINISHED",
            "RUN_FINISHED",
        ]
    );
    match &events.last().unwrap().kind {
        EventKind::RunFinished { result: Some(result) } => {
            assert_eq!(result["workflow"]["name"], json!("fetch-on-demand"));
            assert_eq!(result["validation"]["is_valid"], json!(true));
        }
        other => panic!("expected RUN_FINISHED with a result, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn invalid_generation_reports_validation_errors() -> anyhow::Result<()> {
    let broken = json!({
        "name": "broken",
        "nodes": [{"name": "Start", "type": "n8n-nodes-base.manualTrigger"}],
        "connections": {"Start": {"main": [[{"node": "Ghost", "type": "main", "index": 0}]]}}
    });
    let dispatcher = Dispatcher::with_defaults(
        Arc::new(StaticClient::new(broken.to_string())),
        ForgeConfig::default(),
    );
    let request = RunRequest::new().with_message(RunMessage::user("generate"));
    let events = dispatcher.run(request).collect_all().await;

    assert_well_formed(&events);
    match &events.last().unwrap().kind {
        EventKind::RunError { code, details, .. } => {
            assert_eq!(code, "workflow_structure");
            let details = details.as_ref().expect("validation errors attached");
            assert_eq!(details[0]["code"], json!("connection.unknown_target"));
        }
        other => panic!("expected RUN_ERROR, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn unmatched_request_fails_selection_without_steps() -> anyhow::Result<()> {
    let dispatcher = Dispatcher::with_defaults(Arc::new(LocalEchoClient), ForgeConfig::default());
    let request = RunRequest::new().with_context("operation", "deploy");
    let events = dispatcher.run(request).collect_all().await;

    assert_eq!(names(&events), vec!["RUN_STARTED", "RUN_ERROR"]);
    assert_eq!(events[1].error_code(), Some("selection_failure"));
    Ok(())
}

#[tokio::test]
async fn run_timeout_aborts_a_stuck_agent() -> anyhow::Result<()> {
    let woke = Arc::new(AtomicBool::new(false));
    let config = ForgeConfig {
        run_timeout_ms: 100,
        cancel_grace_ms: 20,
        ..ForgeConfig::default()
    };
    let dispatcher = single_agent_dispatcher(
        Arc::new(SleepyAgent::new(Duration::from_secs(10), woke.clone())),
        config,
    );
    let events = timeout(Duration::from_secs(5), dispatcher.run(RunRequest::new()).collect_all())
        .await?;

    assert_eq!(names(&events), vec!["RUN_STARTED", "STEP_STARTED", "RUN_ERROR"]);
    assert_eq!(events[2].error_code(), Some("timeout"));
    assert!(!woke.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test]
async fn cancellation_stops_delivery() -> anyhow::Result<()> {
    let woke = Arc::new(AtomicBool::new(false));
    let config = ForgeConfig {
        cancel_grace_ms: 20,
        ..ForgeConfig::default()
    };
    let dispatcher = single_agent_dispatcher(
        Arc::new(SleepyAgent::new(Duration::from_millis(300), woke.clone())),
        config,
    );
    let mut handle = dispatcher.run(RunRequest::new());

    assert_eq!(handle.next().await.map(|e| e.name()), Some("RUN_STARTED"));
    assert_eq!(handle.next().await.map(|e| e.name()), Some("STEP_STARTED"));
    handle.cancel();
    assert!(handle.is_cancelled());
    assert!(handle.next().await.is_none());

    sleep(Duration::from_millis(500)).await;
    assert!(!woke.load(Ordering::SeqCst), "agent should have been aborted");
    Ok(())
}

#[tokio::test]
async fn agent_panic_becomes_internal_error() -> anyhow::Result<()> {
    let dispatcher = single_agent_dispatcher(
        Arc::new(PanickingAgent {
            descriptor: AgentDescriptor::new("fragile", AgentKind::Validator),
        }),
        ForgeConfig::default(),
    );
    let events = dispatcher.run(RunRequest::new()).collect_all().await;

    assert_eq!(names(&events), vec!["RUN_STARTED", "RUN_ERROR"]);
    assert_eq!(events[1].error_code(), Some("internal"));
    Ok(())
}

#[tokio::test]
async fn concurrent_runs_keep_their_own_order() -> anyhow::Result<()> {
    let dispatcher = Arc::new(Dispatcher::with_defaults(
        Arc::new(StaticClient::new(VALID_WORKFLOW)),
        ForgeConfig::default(),
    ));
    let mut tasks = Vec::new();
    for i in 0..8 {
        let dispatcher = Arc::clone(&dispatcher);
        tasks.push(tokio::spawn(async move {
            let request = if i % 2 == 0 {
                RunRequest::new().with_message(RunMessage::user("generate"))
            } else {
                RunRequest::new().with_context("operation", "validate")
            };
            dispatcher.run(request).collect_all().await
        }));
    }
    for task in tasks {
        let events = task.await?;
        assert_well_formed(&events);
    }
    Ok(())
}

#[tokio::test]
async fn events_round_trip_as_json_lines() -> anyhow::Result<()> {
    let dispatcher = Dispatcher::with_defaults(Arc::new(LocalEchoClient), ForgeConfig::default());
    let events = dispatcher
        .run(RunRequest::new().with_context("operation", "validate"))
        .collect_all()
        .await;
    for event in &events {
        let line = event.to_json_line()?;
        let wire: Value = serde_json::from_str(&line)?;
        assert_eq!(wire["type"], json!(event.name()));
        assert!(wire["timestamp"].is_u64());
        assert_eq!(&Event::from_json(&line)?, event);
    }
    Ok(())
}

#[tokio::test]
async fn zero_channel_capacity_from_code_still_runs() -> anyhow::Result<()> {
    let config = ForgeConfig {
        channel_capacity: 0,
        ..ForgeConfig::default()
    };
    let dispatcher = Dispatcher::with_defaults(Arc::new(LocalEchoClient), config);
    let request = RunRequest::new().with_context("operation", "validate");
    let events = timeout(Duration::from_secs(5), dispatcher.run(request).collect_all()).await?;
    assert_eq!(events.last().map(Event::name), Some("RUN_FINISHED"));
    Ok(())
}
