//! Distraction state monitor
//!
//! Consumes one boolean "studying" signal per frame, tracks how long the user
//! has continuously not been studying, and reports a one-shot escalation the
//! first time that duration reaches the configured threshold.
//!
//! Two logical states: `Focused` and `Distracted { since, escalated }`. A true
//! signal always returns to `Focused`, which re-arms escalation for the next run.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::SentinelError;
use crate::types::{MonitorState, Observation, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Focused,
    Distracted { since: Timestamp, escalated: bool },
}

/// Per-session distraction timer. Owned by the frame loop driving it.
#[derive(Debug, Clone)]
pub struct DistractionMonitor {
    threshold: Duration,
    phase: Phase,
    last_seen: Option<Timestamp>,
}

impl DistractionMonitor {
    pub fn new(config: &MonitorConfig) -> Result<Self, SentinelError> {
        Self::with_threshold(config.threshold()?)
    }

    pub fn with_threshold(threshold: Duration) -> Result<Self, SentinelError> {
        if threshold.is_zero() {
            return Err(SentinelError::InvalidConfig(
                "threshold must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            threshold,
            phase: Phase::Focused,
            last_seen: None,
        })
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn is_distracted(&self) -> bool {
        matches!(self.phase, Phase::Distracted { .. })
    }

    pub fn state(&self) -> MonitorState {
        match self.phase {
            Phase::Focused => MonitorState {
                studying: true,
                not_studying_since: None,
                threshold: self.threshold,
                escalated: false,
            },
            Phase::Distracted { since, escalated } => MonitorState {
                studying: false,
                not_studying_since: Some(since),
                threshold: self.threshold,
                escalated,
            },
        }
    }

    /// Elapsed time of the current distraction run at `now`, if any
    pub fn distracted_for(&self, now: Timestamp) -> Option<Duration> {
        match self.phase {
            Phase::Focused => None,
            Phase::Distracted { since, .. } => Some(self.clamped(now).saturating_since(since)),
        }
    }

    /// `now`, held at the latest time already observed
    fn clamped(&self, now: Timestamp) -> Timestamp {
        self.last_seen.map_or(now, |last| last.max(now))
    }

    /// Feed one frame's signal. Never fails; a clock that runs backwards is
    /// held at the latest observed time, so elapsed time never shrinks.
    pub fn observe(&mut self, studying: bool, now: Timestamp) -> Observation {
        if let Some(last) = self.last_seen {
            if now < last {
                warn!(
                    now_secs = now.as_secs_f64(),
                    last_secs = last.as_secs_f64(),
                    "clock regression in distraction monitor, holding at last observed time"
                );
            }
        }
        let now = self.clamped(now);
        self.last_seen = Some(now);

        if studying {
            if let Phase::Distracted { since, escalated } = self.phase {
                debug!(
                    run_secs = now.saturating_since(since).as_secs_f64(),
                    escalated, "distraction run ended"
                );
            }
            self.phase = Phase::Focused;
            return Observation::focused();
        }

        let (since, escalated) = match self.phase {
            Phase::Focused => {
                debug!(since_secs = now.as_secs_f64(), "distraction run started");
                (now, false)
            }
            Phase::Distracted { since, escalated } => (since, escalated),
        };

        let elapsed = now.saturating_since(since);

        if elapsed >= self.threshold && !escalated {
            info!(
                elapsed_secs = elapsed.as_secs_f64(),
                threshold_secs = self.threshold.as_secs_f64(),
                "distraction threshold reached, escalating"
            );
            self.phase = Phase::Distracted {
                since,
                escalated: true,
            };
            return Observation {
                studying: false,
                countdown_seconds: Some(0),
                escalated_now: true,
            };
        }

        self.phase = Phase::Distracted { since, escalated };
        Observation {
            studying: false,
            countdown_seconds: Some(self.threshold.saturating_sub(elapsed).as_secs()),
            escalated_now: false,
        }
    }

    /// Drop any distraction run in progress
    pub fn reset(&mut self) {
        self.phase = Phase::Focused;
        self.last_seen = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn monitor(secs: u64) -> DistractionMonitor {
        DistractionMonitor::with_threshold(Duration::from_secs(secs)).unwrap()
    }

    fn ms(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn test_starts_focused() {
        let m = monitor(10);
        assert_eq!(
            m.state(),
            MonitorState {
                studying: true,
                not_studying_since: None,
                threshold: Duration::from_secs(10),
                escalated: false,
            }
        );
        assert!(!m.is_distracted());
    }

    #[test]
    fn test_countdown_and_single_trigger_every_two_seconds() {
        let mut m = monitor(10);
        let mut countdowns = Vec::new();
        let mut fired_at = Vec::new();

        for t in (0..=12).step_by(2) {
            let obs = m.observe(false, Timestamp::from_secs(t));
            countdowns.push(obs.countdown_seconds.unwrap());
            if obs.escalated_now {
                fired_at.push(t);
            }
        }

        assert_eq!(countdowns, vec![10, 8, 6, 4, 2, 0, 0]);
        assert_eq!(fired_at, vec![10]);
        assert!(m.state().escalated);
    }

    #[test]
    fn test_fires_on_first_frame_past_threshold() {
        let mut m = monitor(10);
        assert!(!m.observe(false, ms(0)).escalated_now);
        assert!(!m.observe(false, ms(9_900)).escalated_now);
        let obs = m.observe(false, ms(10_300));
        assert!(obs.escalated_now);
        assert_eq!(obs.countdown_seconds, Some(0));
    }

    #[test]
    fn test_no_second_escalation_within_run() {
        let mut m = monitor(3);
        let fired = (0..200)
            .map(|i| m.observe(false, ms(i * 250)))
            .filter(|obs| obs.escalated_now)
            .count();
        assert_eq!(fired, 1);
        assert!(m.state().escalated);
    }

    #[test]
    fn test_countdown_never_increases_within_run() {
        let mut m = monitor(10);
        let mut previous = u64::MAX;
        for i in 0..60 {
            let countdown = m.observe(false, ms(i * 333)).countdown_seconds.unwrap();
            assert!(countdown <= previous);
            previous = countdown;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn test_studying_resets_run() {
        let mut m = monitor(10);
        for t in 0..=8 {
            m.observe(false, Timestamp::from_secs(t));
        }
        assert_eq!(m.state().not_studying_since, Some(Timestamp::ZERO));

        let obs = m.observe(true, Timestamp::from_secs(9));
        assert_eq!(obs, Observation::focused());
        assert_eq!(m.state().not_studying_since, None);

        let obs = m.observe(false, ms(9_100));
        assert_eq!(obs.countdown_seconds, Some(10));
        assert!(!obs.escalated_now);
        assert_eq!(m.state().not_studying_since, Some(ms(9_100)));
    }

    #[test]
    fn test_reset_rearms_escalation() {
        let mut m = monitor(2);
        m.observe(false, Timestamp::from_secs(0));
        assert!(m.observe(false, Timestamp::from_secs(2)).escalated_now);
        assert!(!m.observe(false, Timestamp::from_secs(3)).escalated_now);

        m.observe(true, Timestamp::from_secs(4));
        assert!(!m.state().escalated);

        m.observe(false, Timestamp::from_secs(5));
        assert!(!m.observe(false, Timestamp::from_secs(6)).escalated_now);
        assert!(m.observe(false, Timestamp::from_secs(7)).escalated_now);
    }

    #[test]
    fn test_clock_regression_is_clamped() {
        let mut m = monitor(10);
        let first = m.observe(false, Timestamp::from_secs(5));
        assert_eq!(first.countdown_seconds, Some(10));

        let obs = m.observe(false, Timestamp::from_secs(3));
        assert_eq!(obs.countdown_seconds, Some(10));
        assert!(!obs.escalated_now);
        assert_eq!(m.distracted_for(Timestamp::from_secs(3)), Some(Duration::ZERO));
        assert_eq!(m.state().not_studying_since, Some(Timestamp::from_secs(5)));
    }

    #[test]
    fn test_regression_mid_run_does_not_rewind_countdown() {
        let mut m = monitor(10);
        let mut countdowns = Vec::new();
        let mut fired_at = Vec::new();

        for t in [0, 5, 3, 10, 11] {
            let obs = m.observe(false, Timestamp::from_secs(t));
            countdowns.push(obs.countdown_seconds.unwrap());
            if obs.escalated_now {
                fired_at.push(t);
            }
        }

        assert_eq!(countdowns, vec![10, 5, 5, 0, 0]);
        assert_eq!(fired_at, vec![10]);
        assert!(countdowns.windows(2).all(|pair| pair[1] <= pair[0]));
    }

    #[test]
    fn test_run_started_on_regressed_frame_uses_latest_time() {
        let mut m = monitor(10);
        m.observe(true, Timestamp::from_secs(8));
        let obs = m.observe(false, Timestamp::from_secs(6));
        assert_eq!(obs.countdown_seconds, Some(10));
        assert_eq!(m.state().not_studying_since, Some(Timestamp::from_secs(8)));
        assert!(!m.observe(false, Timestamp::from_secs(17)).escalated_now);
        assert!(m.observe(false, Timestamp::from_secs(18)).escalated_now);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        assert!(matches!(
            DistractionMonitor::with_threshold(Duration::ZERO),
            Err(SentinelError::InvalidConfig(_))
        ));
        assert!(DistractionMonitor::new(&MonitorConfig::with_threshold_secs(-2.0)).is_err());
    }

    #[test]
    fn test_fractional_threshold_countdown_floors() {
        let mut m = DistractionMonitor::new(&MonitorConfig::with_threshold_secs(2.5)).unwrap();
        assert_eq!(m.observe(false, ms(0)).countdown_seconds, Some(2));
        assert_eq!(m.observe(false, ms(1_000)).countdown_seconds, Some(1));
        assert_eq!(m.observe(false, ms(2_000)).countdown_seconds, Some(0));
        assert!(!m.observe(false, ms(2_400)).escalated_now);
        assert!(m.observe(false, ms(2_500)).escalated_now);
    }

    #[test]
    fn test_independent_monitors() {
        let mut a = monitor(5);
        let mut b = monitor(5);
        a.observe(false, Timestamp::from_secs(0));
        b.observe(true, Timestamp::from_secs(0));
        assert!(a.observe(false, Timestamp::from_secs(5)).escalated_now);
        assert!(!b.state().escalated);
        assert!(!b.is_distracted());
    }
}
