// Per-run state snapshots and deltas

mod manager;
mod patch;

pub use manager::{StateManager, StateUpdate};
pub use patch::{apply as apply_delta, diff as diff_state, merge as merge_state, PatchOp};
