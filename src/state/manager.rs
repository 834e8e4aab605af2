use serde_json::{Map, Value};

use super::patch::{diff, merge, PatchOp};

/// Result of a state update, ready to be emitted as an event.
#[derive(Clone, Debug, PartialEq)]
pub enum StateUpdate {
    Snapshot(Value),
    Delta(Vec<PatchOp>),
}

/// Holds the latest state snapshot of one run.
///
/// Owned by the run; dropped with it when the run terminates.
#[derive(Debug)]
pub struct StateManager {
    current: Value,
    emitted_snapshot: bool,
    snapshot_requested: bool,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::seeded(None)
    }
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a prior snapshot supplied with the request.
    pub fn seeded(prior: Option<Value>) -> Self {
        let current = match prior {
            Some(Value::Object(object)) => Value::Object(object),
            _ => Value::Object(Map::new()),
        };
        Self {
            current,
            emitted_snapshot: false,
            snapshot_requested: false,
        }
    }

    pub fn current(&self) -> &Value {
        &self.current
    }

    /// The next update is emitted as a full snapshot.
    pub fn force_snapshot(&mut self) {
        self.snapshot_requested = true;
    }

    /// Merges `partial` into the current snapshot.
    ///
    /// Returns a snapshot on the first update of the run or when one was
    /// requested, otherwise the delta (possibly empty).
    pub fn update(&mut self, partial: Value) -> StateUpdate {
        let mut next = self.current.clone();
        merge(&mut next, &partial);
        self.commit(next)
    }

    /// Sets `key` to exactly `value`, dropping whatever was there before.
    pub fn replace(&mut self, key: &str, value: Value) -> StateUpdate {
        let mut next = self.current.clone();
        if let Value::Object(object) = &mut next {
            object.insert(key.to_string(), value);
        }
        self.commit(next)
    }

    fn commit(&mut self, next: Value) -> StateUpdate {
        let update = if !self.emitted_snapshot || self.snapshot_requested {
            self.emitted_snapshot = true;
            self.snapshot_requested = false;
            StateUpdate::Snapshot(next.clone())
        } else {
            StateUpdate::Delta(diff(&self.current, &next))
        };
        self.current = next;
        update
    }
}
