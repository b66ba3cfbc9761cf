pub mod backoff;
pub mod circuit;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::app::send_client::circuit::CircuitBreaker;
use crate::config::send_api::SendApiConfig;

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub provider_message_id: String,
}

/// Error surface of the external send API. `is_transient` drives the worker's retry
/// classification: `{Network, Timeout, Status(5xx|429), CircuitOpen}` are transient;
/// `Status(4xx other)` is permanent; everything else defaults transient.
#[derive(Debug, Error, Clone)]
pub enum SendError {
    #[error("network error calling send API: {0}")]
    Network(String),
    #[error("send API call timed out")]
    Timeout,
    #[error("send API returned status {code}: {body}")]
    Status { code: u16, body: String },
    #[error("circuit breaker is open")]
    CircuitOpen,
}

impl SendError {
    pub fn is_transient(&self) -> bool {
        match self {
            SendError::Network(_) | SendError::Timeout | SendError::CircuitOpen => true,
            SendError::Status { code, .. } => *code == 429 || *code >= 500 || *code < 400,
        }
    }
}

#[async_trait]
pub trait SendClient: Send + Sync {
    async fn send(&self, email: &str, message: &str) -> Result<SendOutcome, SendError>;
}

#[derive(Serialize)]
struct SendRequest<'a> {
    email: &'a str,
    message: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    success: bool,
    #[serde(rename = "messageId")]
    message_id: String,
}

/// HTTP-backed [`SendClient`] wrapping the configured send API with a circuit breaker and an
/// internal exponential-backoff retry loop. Broker-level retry stacks on top of this for
/// persistent failures across process restarts; the two layers are deliberately not collapsed
/// into one.
pub struct HttpSendClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
    retry_attempts: u32,
    circuit: CircuitBreaker,
}

impl HttpSendClient {
    pub fn new(config: &SendApiConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.send_timeout)
            .build()
            .expect("reqwest client with static config always builds");

        Self {
            http,
            url: config.url.clone(),
            timeout: config.send_timeout,
            retry_attempts: config.client_retry_attempts,
            circuit: CircuitBreaker::new(
                config.circuit_error_threshold,
                config.circuit_reset,
                config.circuit_window,
                config.circuit_min_samples,
            ),
        }
    }

    async fn attempt(&self, email: &str, message: &str) -> Result<SendOutcome, SendError> {
        let response = self
            .http
            .post(&self.url)
            .json(&SendRequest { email, message })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SendError::Timeout
                } else {
                    SendError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SendError::Status { code: status.as_u16(), body });
        }

        let body: SendResponse = response
            .json()
            .await
            .map_err(|e| SendError::Network(format!("malformed response body: {e}")))?;

        if !body.success {
            return Err(SendError::Status { code: status.as_u16(), body: "success=false".to_string() });
        }

        Ok(SendOutcome { provider_message_id: body.message_id })
    }
}

#[async_trait]
impl SendClient for HttpSendClient {
    async fn send(&self, email: &str, message: &str) -> Result<SendOutcome, SendError> {
        if !self.circuit.allow() {
            return Err(SendError::CircuitOpen);
        }

        let mut last_err = SendError::Timeout;
        for attempt in 0..self.retry_attempts {
            match self.attempt(email, message).await {
                Ok(outcome) => {
                    self.circuit.record_success();
                    return Ok(outcome);
                }
                Err(err) => {
                    self.circuit.record_failure();
                    if !err.is_transient() {
                        return Err(err);
                    }
                    debug!(attempt, error = %err, "send attempt failed, retrying");
                    last_err = err;
                    if attempt + 1 < self.retry_attempts {
                        tokio::time::sleep(backoff::delay_for_attempt(attempt, Duration::from_secs(1))).await;
                    }
                }
            }
        }

        warn!(url = %self.url, timeout = ?self.timeout, "send client exhausted internal retry budget");
        Err(last_err)
    }
}
