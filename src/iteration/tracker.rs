use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::workflow::WorkflowArtifact;

use super::diff::{compute_changes, ChangesSummary};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub id: String,
    pub artifact_id: String,
    /// 1-based position in the artifact's history.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub prior_hash: String,
    pub next_hash: String,
    pub changes: ChangesSummary,
}

type History = Arc<Mutex<Vec<IterationRecord>>>;

/// Append-only iteration histories, one per artifact id.
///
/// `record` calls for the same id are serialized by that id's lock; different
/// ids only contend on the short map lookup.
#[derive(Default)]
pub struct IterationTracker {
    histories: parking_lot::Mutex<HashMap<String, History>>,
}

impl IterationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn history_for(&self, artifact_id: &str) -> History {
        let mut histories = self.histories.lock();
        Arc::clone(histories.entry(artifact_id.to_string()).or_default())
    }

    #[instrument(skip_all, fields(artifact_id = %artifact_id))]
    pub async fn record(
        &self,
        artifact_id: &str,
        prior: &WorkflowArtifact,
        next: &WorkflowArtifact,
        description: impl Into<String>,
    ) -> Result<IterationRecord> {
        let changes = compute_changes(prior, next);
        let prior_hash = prior.content_hash()?;
        let next_hash = next.content_hash()?;

        let history = self.history_for(artifact_id);
        let mut entries = history.lock().await;
        let sequence = entries.len() as u64 + 1;
        let record = IterationRecord {
            id: format!("iter-{artifact_id}-{sequence}"),
            artifact_id: artifact_id.to_string(),
            sequence,
            timestamp: Utc::now(),
            description: description.into(),
            prior_hash,
            next_hash,
            changes,
        };
        entries.push(record.clone());
        debug!(sequence, "iteration recorded");
        Ok(record)
    }

    /// Records for `artifact_id` in chronological order; empty if none.
    pub async fn history(&self, artifact_id: &str) -> Vec<IterationRecord> {
        let history = {
            let histories = self.histories.lock();
            histories.get(artifact_id).cloned()
        };
        match history {
            Some(history) => history.lock().await.clone(),
            None => Vec::new(),
        }
    }

    pub async fn history_json(&self, artifact_id: &str) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.history(artifact_id).await)?)
    }

    pub fn artifact_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.histories.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}
