use anyhow::Result;
use std::env;

/// Drives the `tracing-subscriber` `EnvFilter`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self> {
        Ok(LoggingConfig {
            level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn is_debug(&self) -> bool {
        self.level.to_lowercase().contains("debug")
    }

    pub fn is_trace(&self) -> bool {
        self.level.to_lowercase().contains("trace")
    }
}
