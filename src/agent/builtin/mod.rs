mod generator;
mod orchestrator;
mod prompt;
mod validator;

pub use generator::{GenerationOutcome, GeneratorAgent, GENERATOR_NAME};
pub use orchestrator::{OrchestratorAgent, ORCHESTRATOR_NAME};
pub use prompt::PromptBuilder;
pub use validator::{ValidatorAgent, VALIDATOR_NAME};

pub(crate) const GENERATE_STEP: &str = "generate";
pub(crate) const VALIDATE_STEP: &str = "validate";
