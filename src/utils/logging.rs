use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::EnvConfig;

const DEFAULT_FILTER: &str = "flowforge=info,warn";
const DEBUG_FILTER: &str = "flowforge=debug,info";

/// Tracing subscriber setup.
pub struct LoggingConfig;

impl LoggingConfig {
    /// Installs the global subscriber.
    ///
    /// `RUST_LOG` takes precedence; otherwise `FLOWFORGE_DEBUG` selects the
    /// verbose filter and adds file, line and thread ids to every record.
    /// Calling it twice is harmless.
    ///
    /// ```no_run
    /// use flowforge::utils::LoggingConfig;
    ///
    /// LoggingConfig::init();
    /// tracing::info!("ready");
    /// ```
    pub fn init() {
        let is_debug = Self::is_debug();

        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if is_debug { DEBUG_FILTER } else { DEFAULT_FILTER })
        });

        let fmt_layer = fmt::layer()
            .with_target(is_debug)
            .with_file(is_debug)
            .with_line_number(is_debug)
            .with_thread_ids(is_debug);

        let installed = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .is_ok();

        if installed && is_debug {
            tracing::debug!("debug logging enabled");
        }
    }

    pub fn init_with_filter(filter: &str) {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::new(filter))
            .with(fmt::layer())
            .try_init();
    }

    pub fn is_debug() -> bool {
        EnvConfig::is_debug_mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn debug_flag_follows_environment() {
        env::remove_var("FLOWFORGE_DEBUG");
        assert!(!LoggingConfig::is_debug());

        env::set_var("FLOWFORGE_DEBUG", "1");
        assert!(LoggingConfig::is_debug());

        env::remove_var("FLOWFORGE_DEBUG");
    }

    #[test]
    fn repeated_init_does_not_panic() {
        LoggingConfig::init_with_filter("flowforge=trace");
        LoggingConfig::init();
    }
}
