use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const OPERATION_HINT: &str = "operation";
pub const ARTIFACT_ID_HINT: &str = "artifact_id";
pub const WORKFLOW_HINT: &str = "workflow";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    System,
    Assistant,
    Tool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RunMessage {
    pub role: MessageRole,
    pub content: String,
}

impl RunMessage {
    pub fn user<T: Into<String>>(content: T) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn system<T: Into<String>>(content: T) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn assistant<T: Into<String>>(content: T) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Inbound run submission. Treated as immutable once handed to the dispatcher.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(default = "new_run_id")]
    pub run_id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<RunMessage>,
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
    #[serde(default)]
    pub prior_state: Option<Value>,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl RunRequest {
    pub fn new() -> Self {
        Self {
            run_id: new_run_id(),
            thread_id: None,
            messages: Vec::new(),
            context: BTreeMap::new(),
            prior_state: None,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_message(mut self, message: RunMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_prior_state(mut self, state: Value) -> Self {
        self.prior_state = Some(state);
        self
    }

    /// String-valued context hint.
    pub fn hint(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(Value::as_str)
    }

    pub fn operation(&self) -> Option<&str> {
        self.hint(OPERATION_HINT).map(str::trim).filter(|op| !op.is_empty())
    }

    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == MessageRole::User)
            .map(|message| message.content.as_str())
    }

    /// Field of the prior state snapshot, if one was supplied.
    pub fn prior(&self, key: &str) -> Option<&Value> {
        self.prior_state.as_ref().and_then(|state| state.get(key))
    }
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Process-unique identifier with a readable prefix.
pub fn generate_id(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{millis}-{seq}")
}

fn new_run_id() -> String {
    generate_id("run")
}
