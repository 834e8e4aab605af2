use std::env;
use std::str::FromStr;

use crate::error::{ForgeError, Result};

pub const ENV_PREFIX: &str = "FLOWFORGE_";

/// Environment variable access for configuration overrides.
pub struct EnvConfig;

impl EnvConfig {
    pub fn get_env(key: &str) -> Result<String> {
        env::var(key).map_err(|_| ForgeError::Config(format!("environment variable `{key}` is not set")))
    }

    pub fn get_env_optional(key: &str) -> Option<String> {
        env::var(key).ok().filter(|value| !value.trim().is_empty())
    }

    /// Reads `FLOWFORGE_<name>` and parses it. Unset yields `Ok(None)`.
    pub fn parsed<T: FromStr>(name: &str) -> Result<Option<T>> {
        let key = format!("{ENV_PREFIX}{name}");
        match Self::get_env_optional(&key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| ForgeError::Config(format!("`{key}` has unparsable value `{raw}`"))),
            None => Ok(None),
        }
    }

    pub fn is_debug_mode() -> bool {
        env::var("FLOWFORGE_DEBUG").is_ok()
    }
}
