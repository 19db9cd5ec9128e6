//! Server health state machine.
//!
//! # States
//! - Up: server receives traffic
//! - Down: server excluded from selection until its recovery deadline
//!
//! # State Transitions
//! ```text
//! Up → Down: max_fails failures inside one failure window
//! Down → Up: a single reported success
//! ```
//!
//! # Timers
//! One timer is armed at a time and its purpose is part of its type:
//! - `WindowExpiry`: failures after this instant start a fresh window
//! - `RecoveryDeadline`: a down server may be probed again from this instant
//!
//! A failure landing exactly on `WindowExpiry` still counts toward the
//! current window; only `now > expiry` opens a new one. A down server becomes
//! selectable at `now >= deadline`.

use std::time::{Duration, Instant};

/// Upper bound used when `now + fail_timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Failure threshold and timeout of a single server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Failures needed to mark the server down. Zero disables tracking.
    pub max_fails: u32,
    /// Length of the failure window and of the down period.
    pub fail_timeout: Duration,
}

impl HealthPolicy {
    pub fn new(max_fails: u32, fail_timeout: Duration) -> Self {
        Self {
            max_fails,
            fail_timeout,
        }
    }

    /// Whether failures are counted at all.
    pub fn is_tracking(&self) -> bool {
        self.max_fails > 0
    }

    fn deadline(&self, now: Instant) -> Instant {
        now.checked_add(self.fail_timeout)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now)
    }
}

/// The single timer armed for a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthTimer {
    /// No failures recorded.
    #[default]
    Idle,
    /// Failures after this instant open a new window.
    WindowExpiry(Instant),
    /// The server is down; it may be probed from this instant.
    RecoveryDeadline(Instant),
}

/// Result of feeding an outcome into the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    Up,
    Down,
}

/// Mutable health fields of one server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerHealth {
    fail_counter: u32,
    timer: HealthTimer,
}

impl ServerHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_counter(&self) -> u32 {
        self.fail_counter
    }

    pub fn timer(&self) -> HealthTimer {
        self.timer
    }

    pub fn is_down(&self) -> bool {
        matches!(self.timer, HealthTimer::RecoveryDeadline(_))
    }

    /// Whether the selector may hand this server out at `now`.
    pub fn is_selectable(&self, now: Instant) -> bool {
        match self.timer {
            HealthTimer::RecoveryDeadline(deadline) => now >= deadline,
            _ => true,
        }
    }

    /// A request against the server succeeded.
    ///
    /// Always clears accumulated failures.
    pub fn record_success(&mut self, policy: &HealthPolicy) -> Transition {
        if !policy.is_tracking() {
            return Transition::None;
        }

        let was_down = self.is_down();
        self.fail_counter = 0;
        self.timer = HealthTimer::Idle;

        if was_down {
            Transition::Up
        } else {
            Transition::None
        }
    }

    /// A request against the server failed at `now`.
    pub fn record_failure(&mut self, now: Instant, policy: &HealthPolicy) -> Transition {
        if !policy.is_tracking() || self.is_down() || self.fail_counter >= policy.max_fails {
            return Transition::None;
        }

        self.fail_counter += 1;

        if self.fail_counter == 1 {
            self.timer = HealthTimer::WindowExpiry(policy.deadline(now));
        } else if let HealthTimer::WindowExpiry(expiry) = self.timer {
            if now > expiry {
                // Previous window went stale before reaching the threshold.
                self.fail_counter = 1;
                self.timer = HealthTimer::WindowExpiry(policy.deadline(now));
            }
        }

        if self.fail_counter == policy.max_fails {
            self.timer = HealthTimer::RecoveryDeadline(policy.deadline(now));
            return Transition::Down;
        }

        Transition::None
    }

    /// A down server past its deadline was handed out as a probe.
    ///
    /// Re-arms the deadline so at most one probe per `fail_timeout` goes out.
    /// The server stays down until a success is recorded.
    pub fn begin_probe(&mut self, now: Instant, policy: &HealthPolicy) {
        if let HealthTimer::RecoveryDeadline(deadline) = self.timer {
            if now >= deadline {
                self.timer = HealthTimer::RecoveryDeadline(policy.deadline(now));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_millis(100);

    #[test]
    fn test_failures_within_window_mark_down() {
        let policy = HealthPolicy::new(3, T);
        let mut health = ServerHealth::new();
        let start = Instant::now();

        assert_eq!(health.record_failure(start, &policy), Transition::None);
        assert_eq!(health.record_failure(start + Duration::from_millis(30), &policy), Transition::None);
        assert_eq!(health.record_failure(start + Duration::from_millis(60), &policy), Transition::Down);

        assert!(health.is_down());
        assert_eq!(health.fail_counter(), 3);
        assert_eq!(
            health.timer(),
            HealthTimer::RecoveryDeadline(start + Duration::from_millis(160))
        );
    }

    #[test]
    fn test_spread_failures_never_reach_down() {
        let policy = HealthPolicy::new(3, T);
        let mut health = ServerHealth::new();
        let mut now = Instant::now();

        for _ in 0..10 {
            assert_eq!(health.record_failure(now, &policy), Transition::None);
            assert_eq!(health.fail_counter(), 1);
            now += T + Duration::from_millis(1);
        }
        assert!(!health.is_down());
    }

    #[test]
    fn test_stale_window_restarts_deadline() {
        let policy = HealthPolicy::new(3, T);
        let mut health = ServerHealth::new();
        let start = Instant::now();

        health.record_failure(start, &policy);
        let late = start + Duration::from_millis(150);
        health.record_failure(late, &policy);

        assert_eq!(health.fail_counter(), 1);
        assert_eq!(health.timer(), HealthTimer::WindowExpiry(late + T));

        // Within the restarted window the count accumulates again.
        health.record_failure(late + Duration::from_millis(50), &policy);
        assert_eq!(
            health.record_failure(late + Duration::from_millis(90), &policy),
            Transition::Down
        );
    }

    #[test]
    fn test_failure_exactly_at_window_expiry_counts() {
        let policy = HealthPolicy::new(2, T);
        let mut health = ServerHealth::new();
        let start = Instant::now();

        health.record_failure(start, &policy);
        assert_eq!(health.record_failure(start + T, &policy), Transition::Down);
    }

    #[test]
    fn test_failure_just_after_window_expiry_restarts() {
        let policy = HealthPolicy::new(2, T);
        let mut health = ServerHealth::new();
        let start = Instant::now();

        health.record_failure(start, &policy);
        let after = start + T + Duration::from_nanos(1);
        assert_eq!(health.record_failure(after, &policy), Transition::None);
        assert_eq!(health.fail_counter(), 1);
    }

    #[test]
    fn test_success_resets_counter_and_recovers() {
        let policy = HealthPolicy::new(2, T);
        let mut health = ServerHealth::new();
        let now = Instant::now();

        health.record_failure(now, &policy);
        assert_eq!(health.record_success(&policy), Transition::None);
        assert_eq!(health.fail_counter(), 0);
        assert_eq!(health.timer(), HealthTimer::Idle);

        health.record_failure(now, &policy);
        health.record_failure(now, &policy);
        assert!(health.is_down());

        assert_eq!(health.record_success(&policy), Transition::Up);
        assert!(!health.is_down());
        assert_eq!(health.fail_counter(), 0);
        assert!(health.is_selectable(now));
    }

    #[test]
    fn test_failures_while_down_are_ignored() {
        let policy = HealthPolicy::new(1, T);
        let mut health = ServerHealth::new();
        let now = Instant::now();

        assert_eq!(health.record_failure(now, &policy), Transition::Down);
        let before = health.clone();
        assert_eq!(health.record_failure(now + Duration::from_secs(5), &policy), Transition::None);
        assert_eq!(health, before);
    }

    #[test]
    fn test_recovery_deadline_boundary() {
        let policy = HealthPolicy::new(1, T);
        let mut health = ServerHealth::new();
        let now = Instant::now();

        health.record_failure(now, &policy);
        assert!(!health.is_selectable(now));
        assert!(!health.is_selectable(now + T - Duration::from_nanos(1)));
        assert!(health.is_selectable(now + T));
    }

    #[test]
    fn test_probe_rearms_deadline() {
        let policy = HealthPolicy::new(1, T);
        let mut health = ServerHealth::new();
        let now = Instant::now();

        health.record_failure(now, &policy);
        let probe_at = now + T;
        health.begin_probe(probe_at, &policy);

        assert!(health.is_down());
        assert!(!health.is_selectable(probe_at));
        assert!(health.is_selectable(probe_at + T));
    }

    #[test]
    fn test_tracking_disabled() {
        let policy = HealthPolicy::new(0, T);
        let mut health = ServerHealth::new();
        let now = Instant::now();

        for _ in 0..100 {
            assert_eq!(health.record_failure(now, &policy), Transition::None);
        }
        assert_eq!(health.fail_counter(), 0);
        assert!(!health.is_down());
        assert_eq!(health.record_success(&policy), Transition::None);
    }
}
