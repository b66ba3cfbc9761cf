use thiserror::Error;

use crate::app::broker::BrokerError;
use crate::app::engine::EngineError;

/// Scheduler-facing error taxonomy. Database and pool errors are always transient from the
/// scheduler's perspective — the next cadence tick retries the whole scan.
#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("invalid timezone: {0}")]
    InvalidZone(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
}

impl From<EngineError> for SchedulingError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidZone(zone) => SchedulingError::InvalidZone(zone),
        }
    }
}
