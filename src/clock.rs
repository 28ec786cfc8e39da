//! Display-refresh frame clock.
//!
//! The detection loop waits on a clock tick before each iteration instead of
//! sleeping a fixed delay after its work. When an iteration overruns, the
//! ticks it missed are dropped and the loop resumes on the next future tick.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

/// Blocking source of frame ticks.
pub trait FrameClock: Send {
    /// Block until the next tick.
    fn wait_for_frame(&mut self);
}

/// Fixed-rate clock aligned to a refresh period.
#[derive(Debug)]
pub struct RefreshClock {
    period: Duration,
    next_tick: Option<Instant>,
    missed: u64,
}

impl RefreshClock {
    pub fn new(refresh_hz: u32) -> Result<Self> {
        if refresh_hz == 0 {
            return Err(anyhow!("refresh rate must be greater than zero"));
        }
        Ok(Self {
            period: Duration::from_secs(1) / refresh_hz,
            next_tick: None,
            missed: 0,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks skipped because the caller came back after their deadline.
    pub fn missed_ticks(&self) -> u64 {
        self.missed
    }

    fn advance(&mut self, now: Instant) -> Instant {
        let Some(mut deadline) = self.next_tick else {
            // First tick fires one period after the first wait.
            let deadline = now + self.period;
            self.next_tick = Some(deadline + self.period);
            return deadline;
        };
        if deadline <= now {
            let behind = now.duration_since(deadline);
            let skipped = (behind.as_nanos() / self.period.as_nanos().max(1)) as u64 + 1;
            self.missed += skipped;
            deadline += self.period * skipped as u32;
        }
        self.next_tick = Some(deadline + self.period);
        deadline
    }
}

impl FrameClock for RefreshClock {
    fn wait_for_frame(&mut self) {
        let now = Instant::now();
        let deadline = self.advance(now);
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_is_rejected() {
        assert!(RefreshClock::new(0).is_err());
    }

    #[test]
    fn period_follows_rate() {
        let clock = RefreshClock::new(50).unwrap();
        assert_eq!(clock.period(), Duration::from_millis(20));
    }

    #[test]
    fn ticks_are_spaced_by_period() {
        let mut clock = RefreshClock::new(100).unwrap();
        let start = Instant::now();
        let first = clock.advance(start);
        let second = clock.advance(start);
        assert_eq!(first, start + Duration::from_millis(10));
        assert_eq!(second - first, Duration::from_millis(10));
        assert_eq!(clock.missed_ticks(), 0);
    }

    #[test]
    fn overrun_skips_missed_ticks() {
        let mut clock = RefreshClock::new(100).unwrap();
        let start = Instant::now();
        let first = clock.advance(start);
        // Back at +45: the ticks at +20, +30 and +40 are dropped.
        let late = first + Duration::from_millis(35);
        let next = clock.advance(late);
        assert_eq!(next, start + Duration::from_millis(50));
        assert!(next > late);
        assert_eq!(clock.missed_ticks(), 3);
    }

    #[test]
    fn wait_for_frame_blocks_for_about_one_period() {
        let mut clock = RefreshClock::new(200).unwrap();
        let start = Instant::now();
        clock.wait_for_frame();
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
