use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ForgeConfig;
use crate::error::{ForgeError, Result};
use crate::iteration::IterationTracker;
use crate::llm::DynLlmClient;
use crate::protocol::{generate_id, Event, EventKind, MessageRole, RunRequest};
use crate::state::{StateManager, StateUpdate};
use crate::store::ArtifactStore;
use crate::validation::ValidationChain;

/// Collaborators shared by every run.
pub struct RuntimeServices {
    pub llm: DynLlmClient,
    pub chain: Arc<ValidationChain>,
    pub tracker: Arc<IterationTracker>,
    pub store: Option<Arc<dyn ArtifactStore>>,
    pub config: Arc<ForgeConfig>,
}

impl RuntimeServices {
    pub fn new(llm: DynLlmClient, config: ForgeConfig) -> Self {
        Self {
            llm,
            chain: Arc::new(ValidationChain::new(&config.validation)),
            tracker: Arc::new(IterationTracker::new()),
            store: None,
            config: Arc::new(config),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<IterationTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_chain(mut self, chain: ValidationChain) -> Self {
        self.chain = Arc::new(chain);
        self
    }
}

/// Writes events of one run into its bounded channel.
///
/// Every clone shares the run's logical clock. An emitter stops delivering as
/// soon as its gate token is cancelled; a closed channel cancels the whole run.
#[derive(Clone)]
pub struct EventEmitter {
    run_id: Arc<str>,
    sender: mpsc::Sender<Event>,
    clock: Arc<AtomicU64>,
    gate: CancellationToken,
    run_token: CancellationToken,
}

impl EventEmitter {
    pub fn new(run_id: &str, sender: mpsc::Sender<Event>, run_token: CancellationToken) -> Self {
        Self {
            run_id: Arc::from(run_id),
            sender,
            clock: Arc::new(AtomicU64::new(0)),
            gate: run_token.clone(),
            run_token,
        }
    }

    /// Same channel and clock, gated by another token.
    pub fn gated(&self, gate: CancellationToken) -> Self {
        Self {
            gate,
            ..self.clone()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.gate.is_cancelled()
    }

    pub async fn emit(&self, origin: Option<String>, kind: EventKind) -> Result<()> {
        if self.gate.is_cancelled() {
            return Err(ForgeError::Cancelled);
        }
        let event = Event {
            run_id: self.run_id.to_string(),
            timestamp: self.clock.fetch_add(1, Ordering::SeqCst) + 1,
            origin,
            kind,
        };
        tokio::select! {
            biased;
            _ = self.gate.cancelled() => Err(ForgeError::Cancelled),
            sent = self.sender.send(event) => sent.map_err(|_| {
                self.run_token.cancel();
                ForgeError::Cancelled
            }),
        }
    }
}

/// Everything an agent sees while executing one run.
pub struct RunContext {
    request: Arc<RunRequest>,
    services: Arc<RuntimeServices>,
    emitter: EventEmitter,
    state: StateManager,
    origin: Option<String>,
    steps: Vec<(String, Instant)>,
}

impl RunContext {
    pub fn new(request: Arc<RunRequest>, services: Arc<RuntimeServices>, emitter: EventEmitter) -> Self {
        let state = StateManager::seeded(request.prior_state.clone());
        Self {
            request,
            services,
            emitter,
            state,
            origin: None,
            steps: Vec::new(),
        }
    }

    pub fn request(&self) -> &RunRequest {
        &self.request
    }

    pub fn run_id(&self) -> &str {
        &self.request.run_id
    }

    pub fn services(&self) -> &RuntimeServices {
        &self.services
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.services.config
    }

    pub fn state(&self) -> &Value {
        self.state.current()
    }

    /// Cooperative cancellation point; call between steps.
    pub fn checkpoint(&self) -> Result<()> {
        if self.emitter.is_cancelled() {
            Err(ForgeError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Tags subsequent events with `origin`; returns the previous tag.
    pub fn set_origin(&mut self, origin: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.origin, origin)
    }

    pub async fn emit(&self, kind: EventKind) -> Result<()> {
        if kind.is_lifecycle() {
            return Err(ForgeError::Other(anyhow::anyhow!(
                "agents may not emit {} events",
                kind.name()
            )));
        }
        self.emitter.emit(self.origin.clone(), kind).await
    }

    pub async fn start_step(&mut self, name: &str) -> Result<()> {
        self.checkpoint()?;
        debug!(run_id = %self.request.run_id, step = name, origin = ?self.origin, "step started");
        self.emit(EventKind::StepStarted {
            step_name: name.to_string(),
        })
        .await?;
        self.steps.push((name.to_string(), Instant::now()));
        Ok(())
    }

    pub async fn finish_step(&mut self) -> Result<()> {
        let (name, _) = self
            .steps
            .pop()
            .ok_or_else(|| ForgeError::Other(anyhow::anyhow!("finish_step without an open step")))?;
        self.emit(EventKind::StepFinished { step_name: name }).await
    }

    /// Runs `work` inside the remaining budget of the innermost open step.
    pub async fn within_step<F, T>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let budget = self.config().step_timeout();
        let Some((name, started)) = self.steps.last() else {
            return work.await;
        };
        let remaining = budget.saturating_sub(started.elapsed());
        match tokio::time::timeout(remaining, work).await {
            Ok(result) => result,
            Err(_) => Err(ForgeError::timeout(format!("step `{name}`"), budget)),
        }
    }

    /// Merges `partial` into run state and emits a snapshot or delta.
    pub async fn update_state(&mut self, partial: Value) -> Result<()> {
        let update = self.state.update(partial);
        self.emit_state(update).await
    }

    /// Replaces the top-level state `key` wholesale instead of merging into it.
    pub async fn replace_state(&mut self, key: &str, value: Value) -> Result<()> {
        let update = self.state.replace(key, value);
        self.emit_state(update).await
    }

    async fn emit_state(&self, update: StateUpdate) -> Result<()> {
        let kind = match update {
            StateUpdate::Snapshot(snapshot) => EventKind::StateSnapshot { snapshot },
            StateUpdate::Delta(delta) if delta.is_empty() => return Ok(()),
            StateUpdate::Delta(delta) => EventKind::StateDelta { delta },
        };
        self.emit(kind).await
    }

    pub fn force_snapshot(&mut self) {
        self.state.force_snapshot();
    }

    /// Emits a complete text message and returns its id.
    pub async fn emit_text(&self, role: MessageRole, text: &str) -> Result<String> {
        let message_id = generate_id("msg");
        self.emit(EventKind::TextMessageStart {
            message_id: message_id.clone(),
            role,
        })
        .await?;
        if !text.is_empty() {
            self.emit(EventKind::TextMessageContent {
                message_id: message_id.clone(),
                delta: text.to_string(),
            })
            .await?;
        }
        self.emit(EventKind::TextMessageEnd {
            message_id: message_id.clone(),
        })
        .await?;
        Ok(message_id)
    }

    /// Announces an internal tool invocation with its arguments.
    pub async fn emit_tool_call(&self, tool: &str, args: &Value) -> Result<String> {
        let tool_call_id = generate_id("tool");
        self.emit(EventKind::ToolCallStart {
            tool_call_id: tool_call_id.clone(),
            tool_call_name: tool.to_string(),
        })
        .await?;
        self.emit(EventKind::ToolCallArgs {
            tool_call_id: tool_call_id.clone(),
            delta: serde_json::to_string(args)?,
        })
        .await?;
        self.emit(EventKind::ToolCallEnd {
            tool_call_id: tool_call_id.clone(),
        })
        .await?;
        Ok(tool_call_id)
    }
}
