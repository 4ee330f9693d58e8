//! Escalation evidence and delivery
//!
//! When the monitor reports `escalated_now`, the session hands an [`Evidence`]
//! record to an [`EscalationDispatcher`], which delivers it to an
//! [`EscalationSink`] off the frame loop. Delivery failures are logged and
//! counted; they never feed back into monitor state.

mod dispatcher;
mod snapshot;
mod webhook;

pub use dispatcher::{DispatchStats, EscalationDispatcher};
pub use snapshot::SnapshotStore;
pub use webhook::{CaptureAndNotify, DiscordWebhook, Notifier};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::DeliveryError;

/// Everything a sink needs to report one escalation
#[derive(Debug, Clone, Serialize)]
pub struct Evidence {
    pub session_id: String,
    /// 1-based index of the escalation within the session
    pub run_index: u32,
    pub captured_at: DateTime<Utc>,
    pub message: String,
    /// Encoded frame, when the signal source kept one
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
}

/// Captures evidence and notifies someone about it
pub trait EscalationSink: Send + 'static {
    fn capture_and_notify(&self, evidence: &Evidence) -> Result<(), DeliveryError>;
}

impl<T: EscalationSink + Sync> EscalationSink for std::sync::Arc<T> {
    fn capture_and_notify(&self, evidence: &Evidence) -> Result<(), DeliveryError> {
        (**self).capture_and_notify(evidence)
    }
}

impl EscalationSink for Box<dyn EscalationSink> {
    fn capture_and_notify(&self, evidence: &Evidence) -> Result<(), DeliveryError> {
        (**self).capture_and_notify(evidence)
    }
}

/// Sink that only records the escalation in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EscalationSink for LogSink {
    fn capture_and_notify(&self, evidence: &Evidence) -> Result<(), DeliveryError> {
        info!(
            session_id = %evidence.session_id,
            run_index = evidence.run_index,
            has_image = evidence.image.is_some(),
            "escalation: {}",
            evidence.message
        );
        Ok(())
    }
}
