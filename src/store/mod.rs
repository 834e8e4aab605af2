#[cfg(feature = "memory-store")]
use std::collections::BTreeMap;

use async_trait::async_trait;
#[cfg(feature = "memory-store")]
use parking_lot::RwLock;

use crate::error::{ForgeError, Result};
use crate::workflow::WorkflowArtifact;

const ARTIFACT_PREFIX: &str = "artifact";

fn key_with_prefix(name: &str) -> String {
    format!("{ARTIFACT_PREFIX}:{name}")
}

/// Named-artifact persistence capability.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn load(&self, name: &str) -> Result<WorkflowArtifact>;
    async fn save(&self, name: &str, artifact: &WorkflowArtifact) -> Result<()>;
    async fn list(&self) -> Result<Vec<String>>;
}

/// In-process store, keyed the same way as the redis backend.
#[cfg(feature = "memory-store")]
#[derive(Default)]
pub struct MemoryArtifactStore {
    inner: RwLock<BTreeMap<String, String>>,
}

#[cfg(feature = "memory-store")]
impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "memory-store")]
#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn load(&self, name: &str) -> Result<WorkflowArtifact> {
        let raw = self
            .inner
            .read()
            .get(&key_with_prefix(name))
            .cloned()
            .ok_or_else(|| ForgeError::ArtifactNotFound(name.to_string()))?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn save(&self, name: &str, artifact: &WorkflowArtifact) -> Result<()> {
        let raw = serde_json::to_string(artifact)?;
        self.inner.write().insert(key_with_prefix(name), raw);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let prefix = format!("{ARTIFACT_PREFIX}:");
        Ok(self
            .inner
            .read()
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }
}

#[cfg(feature = "redis-store")]
pub mod redis {
    use super::*;
    use ::redis::AsyncCommands;

    pub struct RedisArtifactStore {
        client: ::redis::Client,
    }

    impl RedisArtifactStore {
        pub fn new(client: ::redis::Client) -> Self {
            Self { client }
        }

        async fn connection(&self) -> Result<::redis::aio::MultiplexedConnection> {
            self.client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| ForgeError::Store(e.to_string()))
        }
    }

    #[async_trait]
    impl ArtifactStore for RedisArtifactStore {
        async fn load(&self, name: &str) -> Result<WorkflowArtifact> {
            let mut conn = self.connection().await?;
            let raw: Option<String> = conn
                .get(key_with_prefix(name))
                .await
                .map_err(|e| ForgeError::Store(e.to_string()))?;
            let raw = raw.ok_or_else(|| ForgeError::ArtifactNotFound(name.to_string()))?;
            Ok(serde_json::from_str(&raw)?)
        }

        async fn save(&self, name: &str, artifact: &WorkflowArtifact) -> Result<()> {
            let raw = serde_json::to_string(artifact)?;
            let mut conn = self.connection().await?;
            conn.set::<_, _, ()>(key_with_prefix(name), raw)
                .await
                .map_err(|e| ForgeError::Store(e.to_string()))?;
            Ok(())
        }

        async fn list(&self) -> Result<Vec<String>> {
            let mut conn = self.connection().await?;
            let keys: Vec<String> = conn
                .keys(format!("{ARTIFACT_PREFIX}:*"))
                .await
                .map_err(|e| ForgeError::Store(e.to_string()))?;
            let prefix = format!("{ARTIFACT_PREFIX}:");
            let mut names: Vec<String> = keys
                .into_iter()
                .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
                .collect();
            names.sort();
            Ok(names)
        }
    }
}
