//! Error types for Study Sentinel

use thiserror::Error;

/// Errors surfaced by the monitor, its configuration and the session driver
#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Session {0} has ended")]
    SessionEnded(String),
}

/// Failure to capture or deliver escalation evidence.
///
/// Never alters monitor state; the dispatcher logs and counts it.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Failed to capture evidence: {0}")]
    Capture(#[from] std::io::Error),

    #[error("Webhook rejected delivery with status {status}")]
    Http { status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No webhook URL configured")]
    MissingWebhook,
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => DeliveryError::Http {
                status: status.as_u16(),
            },
            None => DeliveryError::Transport(e.to_string()),
        }
    }
}
