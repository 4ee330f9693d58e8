//! Configuration for the monitor, the studying heuristic and escalation delivery

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SentinelError;
use crate::session::EscalationPolicy;

/// Default continuous distraction (seconds) before escalation
pub const DEFAULT_THRESHOLD_SECS: f64 = 10.0;

/// Default upper/lower face ratio above which the head counts as looking down
pub const DEFAULT_LOOKING_DOWN_RATIO: f64 = 1.6;

/// Default folder for captured evidence
pub const DEFAULT_EVIDENCE_DIR: &str = "photos";

/// Default notification text sent with evidence
pub const DEFAULT_ESCALATION_MESSAGE: &str = "The user has been distracted. See attached image.";

/// Environment variable that overrides the configured webhook URL
pub const WEBHOOK_ENV_VAR: &str = "SENTINEL_DISCORD_WEBHOOK";

/// Distraction monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Continuous "not studying" time that triggers escalation (seconds)
    pub threshold_secs: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold_secs: DEFAULT_THRESHOLD_SECS,
        }
    }
}

impl MonitorConfig {
    pub fn with_threshold_secs(threshold_secs: f64) -> Self {
        Self { threshold_secs }
    }

    /// Validated threshold; zero, negative and non-finite values are rejected
    pub fn threshold(&self) -> Result<Duration, SentinelError> {
        if !self.threshold_secs.is_finite() || self.threshold_secs <= 0.0 {
            return Err(SentinelError::InvalidConfig(format!(
                "threshold_secs must be a positive number of seconds, got {}",
                self.threshold_secs
            )));
        }
        Duration::try_from_secs_f64(self.threshold_secs)
            .map_err(|e| SentinelError::InvalidConfig(format!("threshold_secs: {}", e)))
    }
}

/// Studying heuristic configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Upper-face span must exceed lower-face span by this factor to count as looking down
    pub looking_down_ratio: f64,
    /// Labels that count as study material
    pub focus_labels: Vec<String>,
    /// Labels that always mean distraction
    pub distractor_labels: Vec<String>,
    /// Label that marks a person in frame
    pub person_label: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            looking_down_ratio: DEFAULT_LOOKING_DOWN_RATIO,
            focus_labels: vec!["laptop".to_string(), "book".to_string()],
            distractor_labels: vec!["cell phone".to_string()],
            person_label: "person".to_string(),
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<(), SentinelError> {
        if !self.looking_down_ratio.is_finite() || self.looking_down_ratio <= 0.0 {
            return Err(SentinelError::InvalidConfig(format!(
                "looking_down_ratio must be positive, got {}",
                self.looking_down_ratio
            )));
        }
        if self.person_label.trim().is_empty() {
            return Err(SentinelError::InvalidConfig(
                "person_label must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub monitor: MonitorConfig,
    pub analyzer: AnalyzerConfig,
    /// Folder where evidence snapshots are written
    pub evidence_dir: PathBuf,
    /// Discord-compatible webhook receiving escalations
    pub webhook_url: Option<String>,
    pub escalation_policy: EscalationPolicy,
    /// Text sent alongside the evidence
    pub message: String,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            analyzer: AnalyzerConfig::default(),
            evidence_dir: PathBuf::from(DEFAULT_EVIDENCE_DIR),
            webhook_url: None,
            escalation_policy: EscalationPolicy::default(),
            message: DEFAULT_ESCALATION_MESSAGE.to_string(),
        }
    }
}

impl SentinelConfig {
    /// Load a JSON config file, apply the environment override and validate
    pub fn load(path: &Path) -> Result<Self, SentinelError> {
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_json(&content)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, SentinelError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Take the webhook URL from the environment when set and non-empty
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(WEBHOOK_ENV_VAR) {
            self.apply_webhook_override(Some(url));
        }
    }

    pub(crate) fn apply_webhook_override(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.webhook_url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<(), SentinelError> {
        self.monitor.threshold()?;
        self.analyzer.validate()?;
        if let Some(url) = &self.webhook_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(SentinelError::InvalidConfig(format!(
                    "webhook_url must be an http(s) URL, got {}",
                    url
                )));
            }
        }
        Ok(())
    }
}
