mod events;
mod request;

pub use events::{Event, EventKind};
pub use request::{
    generate_id, MessageRole, RunMessage, RunRequest, ARTIFACT_ID_HINT, OPERATION_HINT,
    WORKFLOW_HINT,
};
