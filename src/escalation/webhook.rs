//! Webhook notification and the capture-then-notify sink

use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use super::{EscalationSink, Evidence, SnapshotStore};
use crate::error::DeliveryError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers a text message with an optional file attachment
pub trait Notifier: Send + 'static {
    fn notify(&self, message: &str, attachment: Option<&Path>) -> Result<(), DeliveryError>;
}

/// Discord-compatible webhook (`content` field plus optional `file` part)
#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    url: String,
    http_client: reqwest::blocking::Client,
}

impl DiscordWebhook {
    pub fn new(url: impl Into<String>) -> Result<Self, DeliveryError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(DeliveryError::MissingWebhook);
        }

        let http_client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { url, http_client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn is_accepted(status: u16) -> bool {
    matches!(status, 200 | 204)
}

impl Notifier for DiscordWebhook {
    fn notify(&self, message: &str, attachment: Option<&Path>) -> Result<(), DeliveryError> {
        let mut form = reqwest::blocking::multipart::Form::new().text("content", message.to_string());
        if let Some(path) = attachment.filter(|p| p.exists()) {
            form = form.file("file", path)?;
        }

        let response = self.http_client.post(&self.url).multipart(form).send()?;
        let status = response.status().as_u16();

        if is_accepted(status) {
            info!(status, "webhook notification delivered");
            Ok(())
        } else {
            warn!(status, "webhook rejected notification");
            Err(DeliveryError::Http { status })
        }
    }
}

/// Saves the evidence frame, then notifies with the saved file attached
pub struct CaptureAndNotify<N: Notifier> {
    store: SnapshotStore,
    notifier: N,
}

impl<N: Notifier> CaptureAndNotify<N> {
    pub fn new(store: SnapshotStore, notifier: N) -> Self {
        Self { store, notifier }
    }
}

impl<N: Notifier> EscalationSink for CaptureAndNotify<N> {
    fn capture_and_notify(&self, evidence: &Evidence) -> Result<(), DeliveryError> {
        let photo = self.store.capture(evidence)?;
        self.notifier.notify(&evidence.message, photo.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        sent: Arc<Mutex<Vec<(String, Option<PathBuf>)>>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, message: &str, attachment: Option<&Path>) -> Result<(), DeliveryError> {
            self.sent
                .lock()
                .unwrap()
                .push((message.to_string(), attachment.map(Path::to_path_buf)));
            Ok(())
        }
    }

    fn evidence(image: Option<Vec<u8>>) -> Evidence {
        Evidence {
            session_id: "sess-9".to_string(),
            run_index: 1,
            captured_at: Utc::now(),
            message: "The user has been distracted.".to_string(),
            image,
        }
    }

    #[test]
    fn test_accepted_statuses() {
        assert!(is_accepted(200));
        assert!(is_accepted(204));
        assert!(!is_accepted(201));
        assert!(!is_accepted(429));
    }

    #[test]
    fn test_empty_webhook_url_rejected() {
        assert!(matches!(
            DiscordWebhook::new("  "),
            Err(DeliveryError::MissingWebhook)
        ));
    }

    #[test]
    fn test_capture_then_notify_attaches_photo() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = RecordingNotifier::default();
        let sink = CaptureAndNotify::new(SnapshotStore::new(dir.path()), notifier.clone());

        sink.capture_and_notify(&evidence(Some(vec![7, 7, 7]))).unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "The user has been distracted.");
        let attached = sent[0].1.as_ref().unwrap();
        assert!(attached.starts_with(dir.path()));
        assert_eq!(std::fs::read(attached).unwrap(), vec![7, 7, 7]);
    }

    #[test]
    fn test_notify_without_image_sends_text_only() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = RecordingNotifier::default();
        let sink = CaptureAndNotify::new(SnapshotStore::new(dir.path()), notifier.clone());

        sink.capture_and_notify(&evidence(None)).unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent[0].1, None);
    }
}
