//! Core types for Study Sentinel
//!
//! This module defines the values that flow between the frame loop, the
//! distraction monitor and any presentation layer polling the session:
//! monotonic timestamps, per-frame observations and the focus status snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::{Duration, Instant};

use crate::error::SentinelError;

/// Monotonic point in time, measured as an offset from the start of a session.
///
/// Serialized as fractional seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(Duration);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(Duration::ZERO);

    pub const fn from_secs(secs: u64) -> Self {
        Timestamp(Duration::from_secs(secs))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Timestamp(Duration::from_millis(millis))
    }

    /// Build a timestamp from fractional seconds, rejecting negative or non-finite values
    pub fn try_from_secs_f64(secs: f64) -> Result<Self, SentinelError> {
        Duration::try_from_secs_f64(secs)
            .map(Timestamp)
            .map_err(|e| SentinelError::InvalidTimestamp(format!("{}: {}", secs, e)))
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }

    /// Time elapsed since `earlier`, clamped to zero if the clock went backwards
    pub fn saturating_since(&self, earlier: Timestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_secs_f64())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Timestamp::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Monotonic clock anchored at the start of a session
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: Instant,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::start()
    }
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> Timestamp {
        Timestamp(self.origin.elapsed())
    }
}

/// Result of feeding one frame's studying signal to the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Signal for the current frame
    pub studying: bool,
    /// Whole seconds left before escalation; `None` while studying
    pub countdown_seconds: Option<u64>,
    /// True on exactly one frame per distraction run: fire escalation now
    pub escalated_now: bool,
}

impl Observation {
    pub(crate) fn focused() -> Self {
        Self {
            studying: true,
            countdown_seconds: None,
            escalated_now: false,
        }
    }
}

/// Read-only view of the monitor's fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorState {
    /// Result of the latest signal evaluation
    pub studying: bool,
    /// Start of the current distraction run
    pub not_studying_since: Option<Timestamp>,
    /// Continuous distraction that triggers escalation
    #[serde(with = "duration_secs")]
    pub threshold: Duration,
    /// Escalation already fired for the current run
    pub escalated: bool,
}

/// Coarse focus label for status displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusLabel {
    /// No frame has been evaluated yet
    Analyzing,
    Focused,
    Distracted,
}

/// Snapshot served to status pollers while a session runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusStatus {
    pub session_id: String,
    pub label: FocusLabel,
    pub studying: bool,
    pub countdown_seconds: Option<u64>,
    pub escalated: bool,
    pub escalation_count: u32,
    pub frames_observed: u64,
    pub deliveries_failed: u64,
    pub session_ended: bool,
    pub updated_at: DateTime<Utc>,
}

impl FocusStatus {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            label: FocusLabel::Analyzing,
            studying: false,
            countdown_seconds: None,
            escalated: false,
            escalation_count: 0,
            frames_observed: 0,
            deliveries_failed: 0,
            session_ended: false,
            updated_at: Utc::now(),
        }
    }
}

pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturating_since_clamps_regression() {
        let later = Timestamp::from_secs(5);
        let earlier = Timestamp::from_secs(3);
        assert_eq!(later.saturating_since(earlier), Duration::from_secs(2));
        assert_eq!(earlier.saturating_since(later), Duration::ZERO);
    }

    #[test]
    fn test_timestamp_rejects_negative_and_nan() {
        assert!(Timestamp::try_from_secs_f64(-1.0).is_err());
        assert!(Timestamp::try_from_secs_f64(f64::NAN).is_err());
        assert_eq!(
            Timestamp::try_from_secs_f64(9.5).unwrap(),
            Timestamp::from_millis(9_500)
        );
    }

    #[test]
    fn test_timestamp_serializes_as_seconds() {
        let json = serde_json::to_string(&Timestamp::from_millis(2_500)).unwrap();
        assert_eq!(json, "2.5");

        let parsed: Timestamp = serde_json::from_str("4.25").unwrap();
        assert_eq!(parsed, Timestamp::from_millis(4_250));

        assert!(serde_json::from_str::<Timestamp>("-3").is_err());
    }

    #[test]
    fn test_focus_status_starts_analyzing() {
        let status = FocusStatus::new("sess-1");
        assert_eq!(status.label, FocusLabel::Analyzing);
        assert_eq!(status.frames_observed, 0);
        assert!(!status.escalated);
    }
}
