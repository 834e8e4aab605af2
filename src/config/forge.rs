use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};
use crate::validation::ValidationConfig;

use super::env::EnvConfig;

/// Runtime limits and validation policy.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ForgeConfig {
    #[serde(default = "default_run_timeout_ms")]
    pub run_timeout_ms: u64,
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,
    /// Budget for a single generation call, reported as `generation_service`.
    #[serde(default = "default_generation_timeout_ms")]
    pub generation_timeout_ms: u64,
    /// How long a cancelled agent may keep running before it is aborted.
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
    #[serde(default)]
    pub validation: ValidationConfig,
}

fn default_run_timeout_ms() -> u64 {
    120_000
}

fn default_step_timeout_ms() -> u64 {
    60_000
}

fn default_generation_timeout_ms() -> u64 {
    45_000
}

fn default_cancel_grace_ms() -> u64 {
    500
}

fn default_channel_capacity() -> usize {
    64
}

fn default_health_check_interval_ms() -> u64 {
    30_000
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            run_timeout_ms: default_run_timeout_ms(),
            step_timeout_ms: default_step_timeout_ms(),
            generation_timeout_ms: default_generation_timeout_ms(),
            cancel_grace_ms: default_cancel_grace_ms(),
            channel_capacity: default_channel_capacity(),
            health_check_interval_ms: default_health_check_interval_ms(),
            validation: ValidationConfig::default(),
        }
    }
}

impl ForgeConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ForgeError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Applies `FLOWFORGE_*` overrides on top of the current values.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(value) = EnvConfig::parsed("RUN_TIMEOUT_MS")? {
            self.run_timeout_ms = value;
        }
        if let Some(value) = EnvConfig::parsed("STEP_TIMEOUT_MS")? {
            self.step_timeout_ms = value;
        }
        if let Some(value) = EnvConfig::parsed("GENERATION_TIMEOUT_MS")? {
            self.generation_timeout_ms = value;
        }
        if let Some(value) = EnvConfig::parsed("CANCEL_GRACE_MS")? {
            self.cancel_grace_ms = value;
        }
        if let Some(value) = EnvConfig::parsed("CHANNEL_CAPACITY")? {
            self.channel_capacity = value;
        }
        if let Some(value) = EnvConfig::parsed("HEALTH_CHECK_INTERVAL_MS")? {
            self.health_check_interval_ms = value;
        }
        if let Some(value) = EnvConfig::parsed("STRICT_VALIDATION")? {
            self.validation.strict = value;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let budgets = [
            ("run_timeout_ms", self.run_timeout_ms),
            ("step_timeout_ms", self.step_timeout_ms),
            ("generation_timeout_ms", self.generation_timeout_ms),
            ("health_check_interval_ms", self.health_check_interval_ms),
        ];
        for (name, value) in budgets {
            if value == 0 {
                return Err(ForgeError::Config(format!("{name} must be greater than zero")));
            }
        }
        if self.channel_capacity == 0 {
            return Err(ForgeError::Config("channel_capacity must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }
}
