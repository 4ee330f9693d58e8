//! Parsing and validation of frame record streams, and the signal source that replays them

use std::fs;
use tracing::warn;

use crate::error::SentinelError;
use crate::schema::frame_record::*;
use crate::signal::{HeuristicAnalyzer, SignalSource, Snapshot};

/// Adapter for reading study.frame.v1 input
pub struct FrameRecordAdapter;

impl FrameRecordAdapter {
    /// Parse a JSON string containing an array of FrameRecords
    pub fn parse_array(json: &str) -> Result<Vec<FrameRecord>, SentinelError> {
        let records: Vec<FrameRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (newline-delimited JSON) containing FrameRecords
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<FrameRecord>, SentinelError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<FrameRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(SentinelError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Flag records whose time falls behind the latest time seen before them.
    ///
    /// Records with an unusable time are skipped; `FrameRecord::validate` reports those.
    pub fn check_monotonic(records: &[FrameRecord]) -> Vec<(usize, ValidationError)> {
        let mut flagged = Vec::new();
        let mut latest: Option<f64> = None;

        for (idx, record) in records.iter().enumerate() {
            if !record.t.is_finite() || record.t < 0.0 {
                continue;
            }
            if let Some(previous) = latest.filter(|prev| record.t < *prev) {
                flagged.push((
                    idx,
                    ValidationError::NonMonotonic {
                        previous,
                        current: record.t,
                    },
                ));
            }
            latest = Some(latest.map_or(record.t, |prev| prev.max(record.t)));
        }

        flagged
    }

    /// Validate a batch of records, including that frame times never go backwards
    pub fn validate_records(records: &[FrameRecord]) -> Vec<ValidationResult> {
        let mut regressions = Self::check_monotonic(records).into_iter().peekable();
        let mut results = Vec::new();

        for (idx, record) in records.iter().enumerate() {
            let regression = regressions.next_if(|(i, _)| *i == idx).map(|(_, e)| e);
            let error = record.validate().err().or(regression);

            if error.is_some() {
                results.push(ValidationResult {
                    index: idx,
                    frame_id: record.frame_id.clone(),
                    result: error,
                });
            }
        }

        results
    }
}

/// Result of record validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub frame_id: Option<String>,
    pub result: Option<ValidationError>,
}

impl Snapshot for FrameRecord {
    fn snapshot(&self) -> Option<Vec<u8>> {
        let path = self.image_path.as_ref()?;
        match fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(path = %path.display(), "evidence image unavailable: {}", e);
                None
            }
        }
    }
}

/// Signal source over frame records: explicit `studying` wins, otherwise the
/// heuristic classifies `detections`, otherwise the frame counts as not studying
#[derive(Debug, Clone, Default)]
pub struct RecordSignal {
    analyzer: HeuristicAnalyzer,
}

impl RecordSignal {
    pub fn new(analyzer: HeuristicAnalyzer) -> Self {
        Self { analyzer }
    }
}

impl SignalSource for RecordSignal {
    type Frame = FrameRecord;

    fn analyze(&self, frame: &FrameRecord, image_height: u32) -> bool {
        if let Some(studying) = frame.studying {
            return studying;
        }
        frame
            .detections
            .as_ref()
            .map(|d| self.analyzer.analyze(d, image_height))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::FrameDetections;

    fn sample_ndjson() -> &'static str {
        r#"{"schema_version": "study.frame.v1", "frame_id": "f1", "t": 0.0, "studying": true}

{"schema_version": "study.frame.v1", "frame_id": "f2", "t": 0.5, "detections": {"labels": ["person", "cell phone"]}}
{"schema_version": "study.frame.v1", "frame_id": "f3", "t": 1.0, "detections": {"labels": ["person", "laptop"]}}
"#
    }

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let records = FrameRecordAdapter::parse_ndjson(sample_ndjson()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].frame_id.as_deref(), Some("f3"));
    }

    #[test]
    fn test_parse_ndjson_reports_line_number() {
        let input = "{\"schema_version\": \"study.frame.v1\", \"t\": 0, \"studying\": true}\nnot json\n";
        match FrameRecordAdapter::parse_ndjson(input) {
            Err(SentinelError::ParseError(msg)) => assert!(msg.contains("line 2"), "{}", msg),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_array() {
        let records = FrameRecordAdapter::parse_array(
            r#"[{"schema_version": "study.frame.v1", "t": 0, "studying": false}]"#,
        )
        .unwrap();
        assert_eq!(records, vec![FrameRecord::classified(0.0, false)]);
    }

    #[test]
    fn test_validate_flags_time_regression() {
        let records = vec![
            FrameRecord::classified(5.0, false),
            FrameRecord::classified(3.0, false),
            FrameRecord::classified(6.0, false),
        ];
        let results = FrameRecordAdapter::validate_records(&records);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].index, 1);
        assert!(matches!(
            results[0].result,
            Some(ValidationError::NonMonotonic { .. })
        ));
    }

    #[test]
    fn test_check_monotonic_compares_against_latest_time() {
        let records = vec![
            FrameRecord::classified(0.0, false),
            FrameRecord::classified(2.0, false),
            FrameRecord::classified(1.0, false),
            FrameRecord::classified(f64::NAN, false),
            FrameRecord::classified(1.5, false),
            FrameRecord::classified(3.0, false),
        ];
        let flagged = FrameRecordAdapter::check_monotonic(&records);
        assert_eq!(
            flagged,
            vec![
                (
                    2,
                    ValidationError::NonMonotonic {
                        previous: 2.0,
                        current: 1.0
                    }
                ),
                (
                    4,
                    ValidationError::NonMonotonic {
                        previous: 2.0,
                        current: 1.5
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_validate_prefers_record_error_over_regression() {
        let records = vec![
            FrameRecord::classified(4.0, false),
            FrameRecord {
                image_height: 0,
                ..FrameRecord::classified(2.0, true)
            },
        ];
        let results = FrameRecordAdapter::validate_records(&records);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].result, Some(ValidationError::ZeroImageHeight));
    }

    #[test]
    fn test_record_signal_resolution() {
        let signal = RecordSignal::default();
        let records = FrameRecordAdapter::parse_ndjson(sample_ndjson()).unwrap();
        let verdicts: Vec<bool> = records
            .iter()
            .map(|r| signal.analyze(r, r.image_height))
            .collect();
        assert_eq!(verdicts, vec![true, false, true]);

        let mut explicit = FrameRecord::detected(
            2.0,
            FrameDetections {
                labels: vec!["person".to_string(), "laptop".to_string()],
                face: None,
                image: None,
            },
        );
        explicit.studying = Some(false);
        assert!(!signal.analyze(&explicit, 480));
    }

    #[test]
    fn test_snapshot_reads_image_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.jpg");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let mut record = FrameRecord::classified(0.0, false);
        assert_eq!(record.snapshot(), None);

        record.image_path = Some(path);
        assert_eq!(record.snapshot(), Some(vec![1, 2, 3]));

        record.image_path = Some(dir.path().join("missing.jpg"));
        assert_eq!(record.snapshot(), None);
    }
}
