//! Evidence snapshots on disk

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{EscalationSink, Evidence};
use crate::config::DEFAULT_EVIDENCE_DIR;
use crate::error::DeliveryError;

/// Writes evidence frames into a folder as `distraction_capture_<unix>_<run>.jpg`
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    folder: PathBuf,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(DEFAULT_EVIDENCE_DIR)
    }
}

impl SnapshotStore {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn file_name(evidence: &Evidence) -> String {
        format!(
            "distraction_capture_{}_{}.jpg",
            evidence.captured_at.timestamp(),
            evidence.run_index
        )
    }

    /// Save the evidence image; `Ok(None)` when the frame carried no image
    pub fn capture(&self, evidence: &Evidence) -> io::Result<Option<PathBuf>> {
        let Some(image) = evidence.image.as_deref() else {
            return Ok(None);
        };

        fs::create_dir_all(&self.folder)?;
        let path = self.folder.join(Self::file_name(evidence));
        fs::write(&path, image)?;
        info!(path = %path.display(), "evidence image saved");
        Ok(Some(path))
    }
}

impl EscalationSink for SnapshotStore {
    fn capture_and_notify(&self, evidence: &Evidence) -> Result<(), DeliveryError> {
        self.capture(evidence)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn evidence(image: Option<Vec<u8>>) -> Evidence {
        Evidence {
            session_id: "sess-1".to_string(),
            run_index: 2,
            captured_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            message: "distracted".to_string(),
            image,
        }
    }

    #[test]
    fn test_capture_writes_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("photos"));

        let path = store.capture(&evidence(Some(vec![0xFF, 0xD8, 0xFF]))).unwrap().unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "distraction_capture_1709285400_2.jpg"
        );
        assert_eq!(fs::read(&path).unwrap(), vec![0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_capture_without_image_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("photos"));

        assert!(store.capture(&evidence(None)).unwrap().is_none());
        assert!(!dir.path().join("photos").exists());
    }

    #[test]
    fn test_unwritable_folder_is_capture_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let store = SnapshotStore::new(blocker.join("photos"));

        let result = store.capture_and_notify(&evidence(Some(vec![1])));
        assert!(matches!(result, Err(DeliveryError::Capture(_))));
    }
}
