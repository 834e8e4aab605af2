mod client;
mod echo;
#[cfg(feature = "openai-client")]
mod openai;
mod types;

pub use client::{DynLlmClient, LlmClient};
pub use echo::{LocalEchoClient, StaticClient};
#[cfg(feature = "openai-client")]
pub use openai::OpenAiClient;
pub use types::{LlmRequest, LlmResponse};
