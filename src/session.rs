//! Study session: the frame loop's owner
//!
//! A session ties one signal source to one distraction monitor, dispatches
//! escalation evidence off the hot path, and publishes a [`FocusStatus`]
//! snapshot that other threads can poll.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{MonitorConfig, SentinelConfig, DEFAULT_ESCALATION_MESSAGE};
use crate::error::SentinelError;
use crate::escalation::{DispatchStats, EscalationDispatcher, Evidence};
use crate::monitor::DistractionMonitor;
use crate::signal::{SignalSource, Snapshot};
use crate::types::{duration_secs, FocusLabel, FocusStatus, Observation, SessionClock, Timestamp};

/// What the session does after an escalation fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationPolicy {
    /// Keep monitoring; the next distraction run can escalate again
    #[default]
    ContinueMonitoring,
    /// Stop accepting frames once evidence is dispatched
    EndSession,
}

/// Cloneable read handle on a session's latest status
#[derive(Debug, Clone)]
pub struct StatusHandle {
    inner: Arc<Mutex<FocusStatus>>,
}

impl StatusHandle {
    fn new(status: FocusStatus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(status)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FocusStatus> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the current status, taken under the lock
    pub fn snapshot(&self) -> FocusStatus {
        self.lock().clone()
    }
}

/// End-of-session report
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub frames_observed: u64,
    pub distraction_runs: u32,
    pub escalations: u32,
    #[serde(with = "duration_secs")]
    pub longest_run: Duration,
    #[serde(with = "duration_secs")]
    pub total_distracted: Duration,
    pub ended_by_escalation: bool,
    pub dispatch: DispatchStats,
}

#[derive(Debug, Default)]
struct RunStats {
    frames_observed: u64,
    distraction_runs: u32,
    escalations: u32,
    longest_run: Duration,
    total_distracted: Duration,
    last_seen: Option<Timestamp>,
}

/// One monitored study session
pub struct StudySession<S: SignalSource> {
    id: String,
    started_at: DateTime<Utc>,
    clock: SessionClock,
    monitor: DistractionMonitor,
    source: S,
    dispatcher: EscalationDispatcher,
    policy: EscalationPolicy,
    message: String,
    status: StatusHandle,
    stats: RunStats,
    ended_by_escalation: bool,
}

impl<S: SignalSource> StudySession<S> {
    pub fn new(
        source: S,
        monitor_config: &MonitorConfig,
        dispatcher: EscalationDispatcher,
    ) -> Result<Self, SentinelError> {
        let monitor = DistractionMonitor::new(monitor_config)?;
        let id = Uuid::new_v4().to_string();
        let started_at = Utc::now();

        info!(
            session_id = %id,
            threshold_secs = monitor.threshold().as_secs_f64(),
            "study session started"
        );

        Ok(Self {
            status: StatusHandle::new(FocusStatus::new(id.clone())),
            id,
            started_at,
            clock: SessionClock::start(),
            monitor,
            source,
            dispatcher,
            policy: EscalationPolicy::default(),
            message: DEFAULT_ESCALATION_MESSAGE.to_string(),
            stats: RunStats::default(),
            ended_by_escalation: false,
        })
    }

    /// Build a session from a loaded config file
    pub fn from_config(
        source: S,
        config: &SentinelConfig,
        dispatcher: EscalationDispatcher,
    ) -> Result<Self, SentinelError> {
        Ok(Self::new(source, &config.monitor, dispatcher)?
            .with_policy(config.escalation_policy)
            .with_message(config.message.clone()))
    }

    pub fn with_policy(mut self, policy: EscalationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn policy(&self) -> EscalationPolicy {
        self.policy
    }

    pub fn monitor(&self) -> &DistractionMonitor {
        &self.monitor
    }

    pub fn is_ended(&self) -> bool {
        self.ended_by_escalation
    }

    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Classify a frame on the session clock and feed it to the monitor
    pub fn process_frame_now(
        &mut self,
        frame: &S::Frame,
        image_height: u32,
    ) -> Result<Observation, SentinelError> {
        let now = self.clock.now();
        self.process_frame(frame, image_height, now)
    }

    /// Classify a frame taken at `now` and feed it to the monitor.
    ///
    /// Dispatches evidence exactly once per distraction run; fails only when
    /// the session already ended under [`EscalationPolicy::EndSession`].
    pub fn process_frame(
        &mut self,
        frame: &S::Frame,
        image_height: u32,
        now: Timestamp,
    ) -> Result<Observation, SentinelError> {
        if self.ended_by_escalation {
            return Err(SentinelError::SessionEnded(self.id.clone()));
        }

        let studying = self.source.analyze(frame, image_height);
        let observation = self.observe(studying, now);

        if observation.escalated_now {
            self.stats.escalations += 1;
            let evidence = Evidence {
                session_id: self.id.clone(),
                run_index: self.stats.escalations,
                captured_at: Utc::now(),
                message: self.message.clone(),
                image: frame.snapshot(),
            };
            self.dispatcher.dispatch(evidence);

            if self.policy == EscalationPolicy::EndSession {
                info!(session_id = %self.id, "ending session after escalation");
                self.ended_by_escalation = true;
            }
        }

        self.publish(&observation);
        Ok(observation)
    }

    fn observe(&mut self, studying: bool, now: Timestamp) -> Observation {
        let was_distracted = self.monitor.is_distracted();
        let run_before = self.monitor.distracted_for(now);

        if let (true, Some(prev)) = (was_distracted, self.stats.last_seen) {
            self.stats.total_distracted += now.saturating_since(prev);
        }

        let observation = self.monitor.observe(studying, now);

        self.stats.frames_observed += 1;
        self.stats.last_seen = Some(self.stats.last_seen.map_or(now, |last| last.max(now)));

        if !was_distracted && !studying {
            self.stats.distraction_runs += 1;
        }
        let run = if studying {
            run_before
        } else {
            self.monitor.distracted_for(now)
        };
        if let Some(run) = run {
            self.stats.longest_run = self.stats.longest_run.max(run);
        }

        debug!(
            session_id = %self.id,
            studying,
            countdown = ?observation.countdown_seconds,
            "frame observed"
        );
        observation
    }

    fn publish(&self, observation: &Observation) {
        let failed = self.dispatcher.stats().failed;
        let mut status = self.status.lock();
        status.label = if observation.studying {
            FocusLabel::Focused
        } else {
            FocusLabel::Distracted
        };
        status.studying = observation.studying;
        status.countdown_seconds = observation.countdown_seconds;
        status.escalated = self.monitor.state().escalated;
        status.escalation_count = self.stats.escalations;
        status.frames_observed = self.stats.frames_observed;
        status.deliveries_failed = failed;
        status.session_ended = self.ended_by_escalation;
        status.updated_at = Utc::now();
    }

    /// Stop the session, wait for queued evidence and report
    pub fn finish(self) -> SessionSummary {
        let dispatch = self.dispatcher.shutdown();
        let summary = SessionSummary {
            session_id: self.id,
            started_at: self.started_at,
            ended_at: Utc::now(),
            frames_observed: self.stats.frames_observed,
            distraction_runs: self.stats.distraction_runs,
            escalations: self.stats.escalations,
            longest_run: self.stats.longest_run,
            total_distracted: self.stats.total_distracted,
            ended_by_escalation: self.ended_by_escalation,
            dispatch,
        };
        {
            let mut status = self.status.lock();
            status.session_ended = true;
            status.deliveries_failed = dispatch.failed;
            status.updated_at = summary.ended_at;
        }
        info!(
            session_id = %summary.session_id,
            frames = summary.frames_observed,
            escalations = summary.escalations,
            "study session finished"
        );
        summary
    }
}
