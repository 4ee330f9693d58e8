//! Studying signal adapters
//!
//! The monitor only ever sees a boolean. This module defines the boundary that
//! produces it, plus the object/head-pose heuristic used with detector output.
//! Adapters map "no reliable signal" (no person, empty frame) to `false`
//! instead of failing.

use serde::{Deserialize, Serialize};

use crate::config::AnalyzerConfig;
use crate::error::SentinelError;

/// Encoded image bytes that can be attached to an escalation
pub trait Snapshot {
    fn snapshot(&self) -> Option<Vec<u8>>;
}

/// Classifies a single frame as studying or not
pub trait SignalSource {
    type Frame: Snapshot;

    fn analyze(&self, frame: &Self::Frame, image_height: u32) -> bool;
}

/// Normalized (0..1) vertical positions of the face-mesh landmarks used for head pose
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    /// Landmark 10
    pub forehead_y: f64,
    /// Landmark 1
    pub nose_y: f64,
    /// Landmark 152
    pub chin_y: f64,
}

impl FaceLandmarks {
    pub fn is_normalized(&self) -> bool {
        [self.forehead_y, self.nose_y, self.chin_y]
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
    }

    /// Head tilted down: forehead-to-nose span dominates nose-to-chin span
    pub fn is_looking_down(&self, image_height: u32, ratio: f64) -> bool {
        let h = f64::from(image_height);
        let upper = (self.nose_y - self.forehead_y) * h;
        let lower = (self.chin_y - self.nose_y) * h;
        upper > lower * ratio
    }
}

/// Detector output for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    /// Object class labels present in the frame
    #[serde(default)]
    pub labels: Vec<String>,
    /// First detected face, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face: Option<FaceLandmarks>,
    /// Encoded frame image, kept for evidence
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
}

impl FrameDetections {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

impl Snapshot for FrameDetections {
    fn snapshot(&self) -> Option<Vec<u8>> {
        self.image.clone()
    }
}

/// Object-presence and head-pose heuristic over detector output
#[derive(Debug, Clone, Default)]
pub struct HeuristicAnalyzer {
    config: AnalyzerConfig,
}

impl HeuristicAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self, SentinelError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }
}

impl SignalSource for HeuristicAnalyzer {
    type Frame = FrameDetections;

    fn analyze(&self, frame: &FrameDetections, image_height: u32) -> bool {
        let person = frame.has_label(&self.config.person_label);
        let has_focus = self.config.focus_labels.iter().any(|l| frame.has_label(l));
        let has_distractor = self
            .config
            .distractor_labels
            .iter()
            .any(|l| frame.has_label(l));
        let looking_down = frame
            .face
            .map(|face| face.is_looking_down(image_height, self.config.looking_down_ratio))
            .unwrap_or(false);

        person && (has_focus || !looking_down) && !has_distractor
    }
}

/// Frame whose studying signal was already computed upstream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedFrame {
    pub studying: bool,
    pub image: Option<Vec<u8>>,
}

impl Snapshot for ClassifiedFrame {
    fn snapshot(&self) -> Option<Vec<u8>> {
        self.image.clone()
    }
}

/// Pass-through source for pre-classified frames
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSignal;

impl SignalSource for StaticSignal {
    type Frame = ClassifiedFrame;

    fn analyze(&self, frame: &ClassifiedFrame, _image_height: u32) -> bool {
        frame.studying
    }
}
