use anyhow::Result;
use std::env;
use std::time::Duration;

/// Tunables shared by the three scheduler phases and the worker's retry ceiling.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    /// How far into the future the per-minute scheduler enqueues.
    pub enqueue_window: Duration,
    /// Per-message retry ceiling.
    pub max_retries: u32,
    /// Broker prefetch per consumer.
    pub prefetch: u16,
    /// Recovery grace period before a SCHEDULED row counts as missed.
    pub precalc_grace: Duration,
    /// Recovery grace period before a QUEUED/SENDING/RETRYING row counts as stuck.
    pub stuck_timeout: Duration,
    /// Cadence of the recovery scheduler.
    pub recovery_interval: Duration,
    /// Rows older than this are marked FAILED(too-late) instead of recovered.
    pub recovery_too_late: Duration,
}

impl SchedulingConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            enqueue_window: Duration::from_millis(env_u64("ENQUEUE_WINDOW_MS", 3_600_000)),
            max_retries: env_u64("MAX_RETRIES", 3) as u32,
            prefetch: env_u64("PREFETCH", 5) as u16,
            precalc_grace: Duration::from_secs(env_u64("PRECALC_GRACE_MINUTES", 10) * 60),
            stuck_timeout: Duration::from_millis(env_u64("STUCK_TIMEOUT_MS", 900_000)),
            recovery_interval: Duration::from_millis(env_u64("RECOVERY_INTERVAL_MS", 600_000)),
            recovery_too_late: Duration::from_secs(env_u64("RECOVERY_TOO_LATE_HOURS", 48) * 3600),
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
