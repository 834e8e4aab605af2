mod chain;
mod policy;
mod result;
mod schema;
mod stages;

pub use chain::{ValidationChain, ValidationChainBuilder};
pub use policy::{NodePolicy, ValidationConfig, ValidationMode};
pub use result::{
    Finding, FindingCategory, Severity, ValidationError, ValidationResult, ValidationSummary,
};
pub use schema::{Schema, SchemaKind, SchemaViolation};
pub use stages::{ConnectionStage, NodeStage, StageOutput, StructuralStage, ValidationStage};
