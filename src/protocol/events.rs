use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ForgeError, Result};
use crate::state::PatchOp;

use super::request::MessageRole;

/// One frame on a run's event stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "runId")]
    pub run_id: String,
    /// Logical clock, strictly increasing within a run.
    pub timestamp: u64,
    /// Step of an orchestrating agent that republished this event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    #[serde(rename = "RUN_STARTED")]
    RunStarted {
        #[serde(rename = "threadId", default, skip_serializing_if = "Option::is_none")]
        thread_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
    },
    #[serde(rename = "RUN_FINISHED")]
    RunFinished {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
    #[serde(rename = "RUN_ERROR")]
    RunError {
        message: String,
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    #[serde(rename = "TEXT_MESSAGE_START")]
    TextMessageStart {
        #[serde(rename = "messageId")]
        message_id: String,
        role: MessageRole,
    },
    #[serde(rename = "TEXT_MESSAGE_CONTENT")]
    TextMessageContent {
        #[serde(rename = "messageId")]
        message_id: String,
        delta: String,
    },
    #[serde(rename = "TEXT_MESSAGE_END")]
    TextMessageEnd {
        #[serde(rename = "messageId")]
        message_id: String,
    },
    #[serde(rename = "STEP_STARTED")]
    StepStarted {
        #[serde(rename = "stepName")]
        step_name: String,
    },
    #[serde(rename = "STEP_FINISHED")]
    StepFinished {
        #[serde(rename = "stepName")]
        step_name: String,
    },
    #[serde(rename = "STATE_SNAPSHOT")]
    StateSnapshot { snapshot: Value },
    #[serde(rename = "STATE_DELTA")]
    StateDelta { delta: Vec<PatchOp> },
    #[serde(rename = "TOOL_CALL_START")]
    ToolCallStart {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolCallName")]
        tool_call_name: String,
    },
    #[serde(rename = "TOOL_CALL_ARGS")]
    ToolCallArgs {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        delta: String,
    },
    #[serde(rename = "TOOL_CALL_END")]
    ToolCallEnd {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
    },
}

impl EventKind {
    pub fn run_error(error: &ForgeError) -> Self {
        EventKind::RunError {
            message: error.to_string(),
            code: error.code().to_string(),
            details: error.details(),
        }
    }

    /// Wire name of the variant.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::RunStarted { .. } => "RUN_STARTED",
            EventKind::RunFinished { .. } => "RUN_FINISHED",
            EventKind::RunError { .. } => "RUN_ERROR",
            EventKind::TextMessageStart { .. } => "TEXT_MESSAGE_START",
            EventKind::TextMessageContent { .. } => "TEXT_MESSAGE_CONTENT",
            EventKind::TextMessageEnd { .. } => "TEXT_MESSAGE_END",
            EventKind::StepStarted { .. } => "STEP_STARTED",
            EventKind::StepFinished { .. } => "STEP_FINISHED",
            EventKind::StateSnapshot { .. } => "STATE_SNAPSHOT",
            EventKind::StateDelta { .. } => "STATE_DELTA",
            EventKind::ToolCallStart { .. } => "TOOL_CALL_START",
            EventKind::ToolCallArgs { .. } => "TOOL_CALL_ARGS",
            EventKind::ToolCallEnd { .. } => "TOOL_CALL_END",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::RunFinished { .. } | EventKind::RunError { .. })
    }

    /// Run lifecycle events are owned by the dispatcher, never by agents.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, EventKind::RunStarted { .. }) || self.is_terminal()
    }
}

impl Event {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    pub fn error_code(&self) -> Option<&str> {
        match &self.kind {
            EventKind::RunError { code, .. } => Some(code),
            _ => None,
        }
    }

    /// One JSON object, no trailing newline.
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_error_wire_shape() {
        let event = Event {
            run_id: "run-1".into(),
            timestamp: 3,
            origin: None,
            kind: EventKind::run_error(&ForgeError::Selection("nothing".into())),
        };
        let wire: Value = serde_json::from_str(&event.to_json_line().unwrap()).unwrap();
        assert_eq!(
            wire,
            json!({
                "type": "RUN_ERROR",
                "runId": "run-1",
                "timestamp": 3,
                "message": "no agent matches the request: nothing",
                "code": "selection_failure"
            })
        );
    }

    #[test]
    fn tagged_event_parses_back() {
        let raw = r#"{"type":"STEP_STARTED","runId":"r","timestamp":2,"origin":"generate","stepName":"validate"}"#;
        let event = Event::from_json(raw).unwrap();
        assert_eq!(event.origin.as_deref(), Some("generate"));
        assert_eq!(
            event.kind,
            EventKind::StepStarted { step_name: "validate".into() }
        );
        assert_eq!(event.name(), "STEP_STARTED");
        assert!(!event.is_terminal());
    }
}
