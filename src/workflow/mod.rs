mod extract;
mod model;

pub use extract::extract_json;
pub use model::{ConnectionMap, ConnectionTarget, Edge, WorkflowArtifact, WorkflowNode};
