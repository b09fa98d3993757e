//! Frame timing

use std::time::{Duration, Instant};

/// Upper bound on a single frame's delta, so a stall does not fling the camera
const MAX_DELTA: Duration = Duration::from_millis(250);

/// Frame clock
#[derive(Debug)]
pub struct Time {
    start: Instant,
    last_frame: Instant,
    delta: Duration,
    frame: u64,
}

impl Time {
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            delta: Duration::ZERO,
            frame: 0,
        }
    }

    /// Advance to a new frame
    pub fn update(&mut self) {
        self.advance(Instant::now());
    }

    fn advance(&mut self, now: Instant) {
        self.delta = now.saturating_duration_since(self.last_frame).min(MAX_DELTA);
        self.last_frame = now;
        self.frame += 1;
    }

    #[must_use]
    pub fn delta(&self) -> Duration {
        self.delta
    }

    #[must_use]
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Time since the clock was created
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.last_frame.saturating_duration_since(self.start)
    }

    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_measures_delta() {
        let mut time = Time::new();
        let start = time.last_frame;

        time.advance(start + Duration::from_millis(16));

        assert_eq!(time.delta(), Duration::from_millis(16));
        assert_eq!(time.frame(), 1);
        assert_eq!(time.elapsed(), Duration::from_millis(16));
    }

    #[test]
    fn test_long_stall_is_clamped() {
        let mut time = Time::new();
        let start = time.last_frame;

        time.advance(start + Duration::from_secs(3));

        assert_eq!(time.delta(), MAX_DELTA);
    }
}
