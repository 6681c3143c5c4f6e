//! Frame timing
//!
//! The pacer must emit one datagram every 20ms. Deadlines are computed from a
//! fixed start instant (`start + n * interval`) so per-frame jitter never
//! accumulates into drift.

use std::time::Duration;
use tokio::time::Instant;

/// Duration of one Opus frame
pub const FRAME_DURATION: Duration = Duration::from_millis(20);

/// Latest deadline offset used when a tick count leaves `Instant`'s range
const MAX_OFFSET: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Deadline generator anchored at a fixed start instant
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    interval: Duration,
    ticks: u64,
}

impl FrameClock {
    /// Start a clock now
    pub fn start(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    pub fn starting_at(start: Instant, interval: Duration) -> Self {
        FrameClock {
            start,
            interval,
            ticks: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of completed ticks
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Deadline of tick `n`
    ///
    /// Offsets past the range of `Instant` are clamped to `MAX_OFFSET`.
    pub fn deadline(&self, n: u64) -> Instant {
        let nanos = self.interval.as_nanos().saturating_mul(u128::from(n));
        let offset = Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));
        self.start
            .checked_add(offset)
            .unwrap_or_else(|| self.start + MAX_OFFSET)
    }

    /// Deadline of the next tick
    pub fn next_deadline(&self) -> Instant {
        self.deadline(self.ticks + 1)
    }

    /// Time since the clock started
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Advance one tick and sleep until its deadline
    ///
    /// Returns immediately when the deadline has already passed.
    pub async fn tick(&mut self) {
        self.ticks += 1;
        let deadline = self.deadline(self.ticks);

        if let Some(lag) = Instant::now().checked_duration_since(deadline) {
            if lag > self.interval {
                tracing::trace!(lag_ms = lag.as_millis() as u64, "frame deadline missed");
            }
        }
        tokio::time::sleep_until(deadline).await;
    }
}

/// Audio covered by `frames` 20ms frames, saturating at `Duration::MAX`
pub fn frames_duration(frames: u64) -> Duration {
    frames
        .checked_mul(FRAME_DURATION.as_millis() as u64)
        .map(Duration::from_millis)
        .unwrap_or(Duration::MAX)
}

/// Format a playback position as `MM:SS`
pub fn format_position(position: Duration) -> String {
    let secs = position.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_position() {
        assert_eq!(format_position(Duration::ZERO), "00:00");
        assert_eq!(format_position(Duration::from_millis(59_980)), "00:59");
        assert_eq!(format_position(Duration::from_secs(61)), "01:01");
        assert_eq!(format_position(Duration::from_secs(3600 + 5)), "60:05");
    }

    #[test]
    fn test_frames_duration() {
        assert_eq!(frames_duration(0), Duration::ZERO);
        assert_eq!(frames_duration(50), Duration::from_secs(1));

        let past_u32 = u64::from(u32::MAX) + 1;
        assert_eq!(frames_duration(past_u32), Duration::from_millis(past_u32 * 20));
        assert_eq!(frames_duration(u64::MAX), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadlines_anchor_to_start() {
        let start = Instant::now();
        let clock = FrameClock::starting_at(start, FRAME_DURATION);

        assert_eq!(clock.deadline(0), start);
        assert_eq!(clock.deadline(50), start + Duration::from_secs(1));
        assert_eq!(clock.next_deadline(), start + FRAME_DURATION);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadlines_advance_past_u32_ticks() {
        let start = Instant::now();
        let clock = FrameClock::starting_at(start, FRAME_DURATION);

        let last_u32 = u64::from(u32::MAX);
        assert!(clock.deadline(last_u32 + 1) > clock.deadline(last_u32));
        assert_eq!(
            clock.deadline(last_u32 + 1) - clock.deadline(last_u32),
            FRAME_DURATION
        );
        assert_eq!(
            clock.deadline(last_u32 + 1) - start,
            Duration::from_millis((last_u32 + 1) * 20)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_absorbs_jitter() {
        let start = Instant::now();
        let mut clock = FrameClock::start(FRAME_DURATION);

        for i in 0..10u64 {
            tokio::time::sleep(Duration::from_millis(i % 16)).await;
            clock.tick().await;
        }

        assert_eq!(clock.ticks(), 10);
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_after_missed_deadline() {
        let start = Instant::now();
        let mut clock = FrameClock::start(FRAME_DURATION);

        tokio::time::sleep(Duration::from_millis(50)).await;
        clock.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(50));

        // Catches up on the fixed grid
        clock.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(50));
        clock.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(60));
    }
}
