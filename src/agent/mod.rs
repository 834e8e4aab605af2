pub mod agent;
pub mod builtin;
pub mod registry;

pub use agent::{Agent, AgentDescriptor, AgentKind, AgentStatus};
pub use builtin::{GeneratorAgent, OrchestratorAgent, ValidatorAgent};
pub use registry::{AgentEntry, AgentRegistry};
