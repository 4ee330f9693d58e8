//! study.frame.v1 record definition

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::SentinelError;
use crate::signal::FrameDetections;
use crate::types::Timestamp;

/// Current schema version
pub const SCHEMA_VERSION: &str = "study.frame.v1";

/// Frame height assumed when a record omits it
pub const DEFAULT_IMAGE_HEIGHT: u32 = 480;

fn default_image_height() -> u32 {
    DEFAULT_IMAGE_HEIGHT
}

/// One evaluated video frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub schema_version: String,
    /// Optional caller-side frame identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<String>,
    /// Seconds since the start of the session (monotonic)
    pub t: f64,
    #[serde(default = "default_image_height")]
    pub image_height: u32,
    /// Pre-computed studying signal; wins over `detections` when both are present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub studying: Option<bool>,
    /// Detector output for the heuristic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detections: Option<FrameDetections>,
    /// Encoded frame on disk, attached to escalation evidence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
}

impl FrameRecord {
    /// Record carrying an already computed signal
    pub fn classified(t: f64, studying: bool) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            frame_id: None,
            t,
            image_height: DEFAULT_IMAGE_HEIGHT,
            studying: Some(studying),
            detections: None,
            image_path: None,
        }
    }

    /// Record carrying raw detector output
    pub fn detected(t: f64, detections: FrameDetections) -> Self {
        Self {
            studying: None,
            detections: Some(detections),
            ..Self::classified(t, false)
        }
    }

    pub fn timestamp(&self) -> Result<Timestamp, SentinelError> {
        Timestamp::try_from_secs_f64(self.t)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        if !self.t.is_finite() || self.t < 0.0 {
            return Err(ValidationError::InvalidTime(self.t));
        }

        if self.image_height == 0 {
            return Err(ValidationError::ZeroImageHeight);
        }

        match (&self.studying, &self.detections) {
            (None, None) => Err(ValidationError::MissingSignal),
            (_, Some(detections)) => match detections.face {
                Some(face) if !face.is_normalized() => Err(ValidationError::LandmarkOutOfRange),
                _ => Ok(()),
            },
            (Some(_), None) => Ok(()),
        }
    }
}

/// Validation errors for frame records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Frame time must be a non-negative number of seconds, got {0}")]
    InvalidTime(f64),

    #[error("image_height must be greater than zero")]
    ZeroImageHeight,

    #[error("Record has neither `studying` nor `detections`")]
    MissingSignal,

    #[error("Face landmarks must be normalized to 0..1")]
    LandmarkOutOfRange,

    #[error("Frame time went backwards: {previous}s then {current}s")]
    NonMonotonic { previous: f64, current: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::FaceLandmarks;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_minimal_record() {
        let record: FrameRecord = serde_json::from_str(
            r#"{"schema_version": "study.frame.v1", "t": 1.5, "studying": true}"#,
        )
        .unwrap();

        assert_eq!(record, FrameRecord::classified(1.5, true));
        assert_eq!(record.image_height, 480);
        assert!(record.validate().is_ok());
        assert_eq!(record.timestamp().unwrap(), Timestamp::from_millis(1_500));
    }

    #[test]
    fn test_parse_detection_record() {
        let record: FrameRecord = serde_json::from_str(
            r#"{
                "schema_version": "study.frame.v1",
                "t": 3,
                "image_height": 720,
                "detections": {
                    "labels": ["person", "book"],
                    "face": {"forehead_y": 0.2, "nose_y": 0.5, "chin_y": 0.6}
                }
            }"#,
        )
        .unwrap();

        let detections = record.detections.as_ref().unwrap();
        assert_eq!(detections.labels, vec!["person", "book"]);
        assert_eq!(detections.face.unwrap().nose_y, 0.5);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut record = FrameRecord::classified(1.0, false);
        record.schema_version = "study.frame.v0".to_string();
        assert!(matches!(
            record.validate(),
            Err(ValidationError::InvalidSchemaVersion { .. })
        ));

        let record = FrameRecord::classified(-0.5, false);
        assert_eq!(record.validate(), Err(ValidationError::InvalidTime(-0.5)));

        let mut record = FrameRecord::classified(1.0, false);
        record.studying = None;
        assert_eq!(record.validate(), Err(ValidationError::MissingSignal));

        let mut record = FrameRecord::classified(1.0, false);
        record.image_height = 0;
        assert_eq!(record.validate(), Err(ValidationError::ZeroImageHeight));

        let record = FrameRecord::detected(
            1.0,
            FrameDetections {
                labels: vec!["person".to_string()],
                face: Some(FaceLandmarks {
                    forehead_y: 0.1,
                    nose_y: 1.4,
                    chin_y: 0.9,
                }),
                image: None,
            },
        );
        assert_eq!(record.validate(), Err(ValidationError::LandmarkOutOfRange));
    }
}
