use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::agent::{AgentEntry, AgentRegistry};
use crate::config::ForgeConfig;
use crate::error::{ForgeError, Result};
use crate::llm::DynLlmClient;
use crate::protocol::{Event, EventKind, RunRequest};

use super::context::{EventEmitter, RunContext, RuntimeServices};
use super::selection::select_agent;

/// Entry point for runs and for the validation and iteration queries.
pub struct Dispatcher {
    registry: Arc<AgentRegistry>,
    services: Arc<RuntimeServices>,
}

impl Dispatcher {
    pub fn new(registry: Arc<AgentRegistry>, services: RuntimeServices) -> Self {
        Self {
            registry,
            services: Arc::new(services),
        }
    }

    /// Standard agents over the given generation client.
    pub fn with_defaults(llm: DynLlmClient, config: ForgeConfig) -> Self {
        Self::new(
            Arc::new(AgentRegistry::standard()),
            RuntimeServices::new(llm, config),
        )
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn services(&self) -> &Arc<RuntimeServices> {
        &self.services
    }

    /// Starts a run and returns its event stream.
    ///
    /// Must be called from within a Tokio runtime. The agent is chosen before
    /// anything is emitted.
    pub fn run(&self, request: RunRequest) -> RunHandle {
        let (sender, receiver) = mpsc::channel(self.services.config.channel_capacity.max(1));
        let token = CancellationToken::new();
        let emitter = EventEmitter::new(&request.run_id, sender, token.clone());

        let entries = self.registry.snapshot();
        let default_agent = self.registry.default_agent();
        let selection = select_agent(&request, &entries, default_agent.as_deref());

        let run_id = request.run_id.clone();
        let span = info_span!("run", run_id = %run_id);
        tokio::spawn(
            drive_run(request, selection, Arc::clone(&self.services), emitter, token.clone())
                .instrument(span),
        );

        RunHandle {
            run_id,
            receiver,
            token,
        }
    }

    /// Periodic agent health checks at the configured interval.
    pub fn spawn_health_monitor(&self, shutdown: &CancellationToken) -> JoinHandle<()> {
        self.registry
            .spawn_health_monitor(self.services.config.health_check_interval(), shutdown)
    }

    /// Validation query: the result as a JSON object.
    pub fn validate(&self, document: &Value) -> Result<Value> {
        Ok(serde_json::to_value(self.services.chain.validate(document))?)
    }

    /// Iteration query: the artifact's history as a JSON array.
    pub async fn history(&self, artifact_id: &str) -> Result<Value> {
        self.services.tracker.history_json(artifact_id).await
    }
}

enum Outcome {
    Joined(std::result::Result<Result<Value>, JoinError>),
    Cancelled,
    TimedOut,
}

async fn drive_run(
    request: RunRequest,
    selection: Result<AgentEntry>,
    services: Arc<RuntimeServices>,
    emitter: EventEmitter,
    token: CancellationToken,
) {
    let started = EventKind::RunStarted {
        thread_id: request.thread_id.clone(),
        agent: selection.as_ref().ok().map(|entry| entry.descriptor.name.clone()),
    };
    if emitter.emit(None, started).await.is_err() {
        return;
    }

    let entry = match selection {
        Ok(entry) => entry,
        Err(err) => {
            warn!(error = %err, "agent selection failed");
            let _ = emitter.emit(None, EventKind::run_error(&err)).await;
            return;
        }
    };
    let agent_name = entry.descriptor.name.clone();
    info!(agent = %agent_name, "run started");

    let agent_token = token.child_token();
    let mut ctx = RunContext::new(
        Arc::new(request),
        Arc::clone(&services),
        emitter.gated(agent_token.clone()),
    );
    let agent = Arc::clone(&entry.agent);
    let mut task: JoinHandle<Result<Value>> =
        tokio::spawn(async move { agent.execute(&mut ctx).await }.in_current_span());

    let config = &services.config;
    let deadline = tokio::time::sleep(config.run_timeout());
    tokio::pin!(deadline);

    let outcome = tokio::select! {
        biased;
        joined = &mut task => Outcome::Joined(joined),
        _ = token.cancelled() => Outcome::Cancelled,
        _ = &mut deadline => Outcome::TimedOut,
    };

    let terminal = match outcome {
        Outcome::Joined(Ok(Ok(result))) => EventKind::RunFinished {
            result: Some(result).filter(|value| !value.is_null()),
        },
        Outcome::Joined(Ok(Err(err))) => {
            if token.is_cancelled() {
                debug!("agent stopped after cancellation");
                return;
            }
            warn!(agent = %agent_name, code = err.code(), error = %err, "run failed");
            EventKind::run_error(&err)
        }
        Outcome::Joined(Err(join_error)) => {
            error!(agent = %agent_name, error = %join_error, "agent task aborted");
            let err = ForgeError::Other(anyhow::anyhow!(
                "agent `{agent_name}` terminated unexpectedly: {join_error}"
            ));
            EventKind::run_error(&err)
        }
        Outcome::Cancelled => {
            info!("run cancelled by caller");
            wind_down(&mut task, config.cancel_grace()).await;
            return;
        }
        Outcome::TimedOut => {
            warn!(agent = %agent_name, budget_ms = config.run_timeout_ms, "run timed out");
            agent_token.cancel();
            wind_down(&mut task, config.cancel_grace()).await;
            EventKind::run_error(&ForgeError::timeout("run", config.run_timeout()))
        }
    };

    let _ = emitter.emit(None, terminal).await;
}

/// Gives a cancelled agent `grace` to return, then aborts it.
async fn wind_down(task: &mut JoinHandle<Result<Value>>, grace: Duration) {
    if tokio::time::timeout(grace, &mut *task).await.is_err() {
        debug!("agent ignored cancellation, aborting");
        task.abort();
        let _ = task.await;
    }
}

/// Live event stream of one run.
///
/// Dropping the handle cancels the run.
pub struct RunHandle {
    run_id: String,
    receiver: mpsc::Receiver<Event>,
    token: CancellationToken,
}

impl RunHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Stops the run; the stream ends immediately and nothing further is delivered.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drains the stream to its end.
    pub async fn collect_all(mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }
}

impl Stream for RunHandle {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        if self.token.is_cancelled() {
            return Poll::Ready(None);
        }
        self.receiver.poll_recv(cx)
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
