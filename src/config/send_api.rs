use anyhow::Result;
use std::env;
use std::time::Duration;

/// Tunables for the circuit-breaking HTTP send client.
#[derive(Debug, Clone)]
pub struct SendApiConfig {
    pub url: String,
    pub send_timeout: Duration,
    pub circuit_error_threshold: f64,
    pub circuit_reset: Duration,
    pub circuit_window: Duration,
    pub circuit_min_samples: u32,
    pub client_retry_attempts: u32,
}

impl SendApiConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("SEND_API_URL").unwrap_or_else(|_| "http://127.0.0.1:9090/send".to_string()),
            send_timeout: Duration::from_millis(env_u64("SEND_TIMEOUT_MS", 10_000)),
            circuit_error_threshold: env::var("CIRCUIT_ERROR_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.5),
            circuit_reset: Duration::from_millis(env_u64("CIRCUIT_RESET_MS", 30_000)),
            circuit_window: Duration::from_secs(10),
            circuit_min_samples: 10,
            client_retry_attempts: 3,
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
