pub mod agent;
pub mod config;
pub mod error;
pub mod iteration;
pub mod llm;
pub mod protocol;
pub mod runtime;
pub mod state;
pub mod store;
pub mod utils;
pub mod validation;
pub mod workflow;

pub use agent::{
    Agent, AgentDescriptor, AgentEntry, AgentKind, AgentRegistry, AgentStatus, GeneratorAgent,
    OrchestratorAgent, ValidatorAgent,
};
pub use config::{EnvConfig, ForgeConfig};
pub use error::{ErrorKind, ForgeError, Result};
pub use iteration::{compute_changes, ChangesSummary, IterationRecord, IterationTracker};
#[cfg(feature = "openai-client")]
pub use llm::OpenAiClient;
pub use llm::{DynLlmClient, LlmClient, LlmRequest, LlmResponse, LocalEchoClient, StaticClient};
pub use protocol::{Event, EventKind, MessageRole, RunMessage, RunRequest};
pub use runtime::{Dispatcher, RunContext, RunHandle, RuntimeServices};
pub use state::{apply_delta, PatchOp, StateManager, StateUpdate};
#[cfg(feature = "redis-store")]
pub use store::redis::RedisArtifactStore;
pub use store::ArtifactStore;
#[cfg(feature = "memory-store")]
pub use store::MemoryArtifactStore;
pub use utils::logging;
pub use validation::{
    NodePolicy, ValidationChain, ValidationConfig, ValidationError, ValidationMode,
    ValidationResult,
};
pub use workflow::{extract_json, WorkflowArtifact, WorkflowNode};
