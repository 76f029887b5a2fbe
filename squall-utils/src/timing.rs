// Helpers to handle budgeting subsystems based on time
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub fn get_current_time() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Error getting system time")
}

/// The current time in milliseconds, truncated to 32 bits - this is
/// the timestamp format frame callbacks are fired with.
#[allow(dead_code)]
pub fn get_current_millis() -> u32 {
    get_current_time().as_millis() as u32
}

/// Manages subsystem timings
///
/// The motivation for this is frame pacing: the event loop wants to
/// wake up roughly once a frame even with no fds ready, so it can
/// retry scheduling. This isn't a timing subsystem of its own, just a
/// helper for tracking a repeating deadline.
pub struct TimingManager {
    tm_period: Duration,
    tm_start: Duration,
}

impl TimingManager {
    pub fn new(period_ms: u32) -> TimingManager {
        TimingManager {
            tm_period: Duration::from_millis(period_ms as u64),
            tm_start: get_current_time(),
        }
    }

    pub fn reset(&mut self) {
        self.tm_start = get_current_time();
    }

    pub fn is_overdue(&self) -> bool {
        get_current_time() - self.tm_start >= self.tm_period
    }

    /// Number of ms remaining in this period. 0 means overdue and the
    /// caller should reset it.
    pub fn time_remaining(&self) -> usize {
        if self.is_overdue() {
            return 0;
        }
        let elapsed = get_current_time() - self.tm_start;
        (self.tm_period - elapsed).as_millis() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_timer_is_not_overdue() {
        let tm = TimingManager::new(1000);
        assert!(!tm.is_overdue());
        assert!(tm.time_remaining() > 0);
    }
}
