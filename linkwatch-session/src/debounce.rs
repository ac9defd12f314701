//! Quiet-period timer for batching local changes.

use std::time::Duration;

use tokio::time::Instant;

/// Base quiet period before a batch is sent.
pub const BASE_DEBOUNCE: Duration = Duration::from_millis(300);

/// How long a file must stop changing before its event is trusted.
#[cfg(target_os = "macos")]
pub const STABILITY_THRESHOLD: Duration = Duration::from_millis(100);
#[cfg(not(target_os = "macos"))]
pub const STABILITY_THRESHOLD: Duration = Duration::from_millis(200);

pub fn default_quiet_period() -> Duration {
    BASE_DEBOUNCE + STABILITY_THRESHOLD
}

/// Timer state: nothing pending, or a flush due at a deadline.
///
/// Every new change re-arms the deadline, so a flush happens only after
/// `quiet` has passed with no further change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Debounce {
    #[default]
    Idle,
    Pending(Instant),
}

impl Debounce {
    pub fn arm(&mut self, now: Instant, quiet: Duration) {
        *self = Debounce::Pending(now + quiet);
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self {
            Debounce::Idle => None,
            Debounce::Pending(deadline) => Some(*deadline),
        }
    }

    /// `true` exactly once per armed period, when `now` has reached the deadline.
    pub fn fire(&mut self, now: Instant) -> bool {
        match *self {
            Debounce::Pending(deadline) if now >= deadline => {
                *self = Debounce::Idle;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const QUIET: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn rapid_changes_collapse_to_one_fire() {
        let mut debounce = Debounce::default();
        let mut fires = 0usize;

        for _ in 0..5 {
            debounce.arm(Instant::now(), QUIET);
            if debounce.fire(Instant::now()) {
                fires += 1;
            }
            advance(Duration::from_millis(10)).await;
        }
        assert_eq!(fires, 0, "nothing fires while changes keep arriving");

        advance(Duration::from_millis(150)).await;
        assert!(debounce.fire(Instant::now()));
        assert!(!debounce.fire(Instant::now()), "fires once per period");
        assert_eq!(debounce, Debounce::Idle);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn rearm_pushes_the_deadline_back() {
        let mut debounce = Debounce::default();
        debounce.arm(Instant::now(), QUIET);
        let first = debounce.deadline().expect("armed");

        advance(Duration::from_millis(60)).await;
        debounce.arm(Instant::now(), QUIET);
        let second = debounce.deadline().expect("armed");
        assert_eq!(second - first, Duration::from_millis(60));

        advance(Duration::from_millis(60)).await;
        assert!(!debounce.fire(Instant::now()));
    }

    #[test]
    fn default_quiet_period_includes_stability_threshold() {
        assert!(default_quiet_period() > BASE_DEBOUNCE);
    }
}
