//! Logger setup and operation timing.

use std::fmt::Display;
use std::time::{Duration, Instant};

use env_logger::Env;

use crate::state::settings::LoggingConfig;

/// Install `env_logger` with the configured level as the default filter.
///
/// `RUST_LOG` still wins when set. Calling this more than once is harmless.
pub fn init(config: &LoggingConfig) {
    let result = env_logger::Builder::from_env(Env::default().default_filter_or(config.filter()))
        .format_timestamp_millis()
        .try_init();
    if result.is_err() {
        log::debug!("Logger already initialized");
    }
}

/// Logs how long a named operation took.
pub struct OperationTimer {
    name: String,
    started: Instant,
}

impl OperationTimer {
    pub fn start(name: impl Into<String>) -> Self {
        let name = name.into();
        log::debug!("Starting operation '{name}'");
        Self { name, started: Instant::now() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn finish<T, E: Display>(self, result: &Result<T, E>) -> Duration {
        let elapsed = self.elapsed();
        match result {
            Ok(_) => log::info!(
                "Operation '{}' completed in {:.3}s",
                self.name,
                elapsed.as_secs_f64()
            ),
            Err(err) => log::error!(
                "Operation '{}' failed after {:.3}s: {err}",
                self.name,
                elapsed.as_secs_f64()
            ),
        }
        elapsed
    }
}
