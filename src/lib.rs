//! Study Sentinel - webcam study-session distraction monitor
//!
//! Sentinel turns a per-frame "studying" signal into a countdown and a
//! one-shot escalation: signal source → distraction monitor → escalation
//! dispatch (evidence capture + notification).
//!
//! ## Modules
//!
//! - **Monitor**: the distraction state machine, one instance per session
//! - **Signal**: boundary producing the studying boolean (object/head-pose heuristic)
//! - **Escalation**: evidence capture, webhook delivery and fire-and-forget dispatch
//! - **Session**: frame loop owner with a pollable focus status

pub mod config;
pub mod error;
pub mod escalation;
pub mod monitor;
pub mod schema;
pub mod session;
pub mod signal;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{AnalyzerConfig, MonitorConfig, SentinelConfig};
pub use error::{DeliveryError, SentinelError};
pub use escalation::{EscalationDispatcher, EscalationSink, Evidence};
pub use monitor::DistractionMonitor;
pub use session::{EscalationPolicy, SessionSummary, StatusHandle, StudySession};
pub use signal::{HeuristicAnalyzer, SignalSource};
pub use types::{FocusStatus, MonitorState, Observation, Timestamp};

// Schema exports
pub use schema::{FrameRecord, FrameRecordAdapter, SCHEMA_VERSION};

/// Sentinel version embedded in reports
pub const SENTINEL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "study-sentinel";
