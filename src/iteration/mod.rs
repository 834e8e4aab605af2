mod diff;
mod tracker;

pub use diff::{compute_changes, ChangesSummary};
pub use tracker::{IterationRecord, IterationTracker};
