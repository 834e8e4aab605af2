//! Run execution: agent selection, the event channel and the per-run context.

mod context;
mod dispatcher;
mod selection;

pub use context::{EventEmitter, RunContext, RuntimeServices};
pub use dispatcher::{Dispatcher, RunHandle};
pub use selection::select_agent;
