//! Frame statistics

use std::collections::VecDeque;
use std::time::Duration;

const DEFAULT_WINDOW: usize = 120;

/// Rolling frame-time statistics
#[derive(Debug)]
pub struct FrameStats {
    frame_times: VecDeque<Duration>,
    window: usize,
    total_frames: u64,
    since_report: Duration,
}

impl FrameStats {
    #[must_use]
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Keep the last `window` frames
    #[must_use]
    pub fn with_window(window: usize) -> Self {
        let window = window.max(1);
        Self {
            frame_times: VecDeque::with_capacity(window),
            window,
            total_frames: 0,
            since_report: Duration::ZERO,
        }
    }

    pub fn record_frame(&mut self, delta: Duration) {
        self.total_frames += 1;
        self.since_report += delta;
        if self.frame_times.len() == self.window {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(delta);
    }

    /// Frames per second over the window, zero until time has passed
    #[must_use]
    pub fn fps(&self) -> f32 {
        let total: Duration = self.frame_times.iter().sum();
        if total.is_zero() {
            0.0
        } else {
            self.frame_times.len() as f32 / total.as_secs_f32()
        }
    }

    #[must_use]
    pub fn avg_frame_time_ms(&self) -> f32 {
        if self.frame_times.is_empty() {
            return 0.0;
        }
        let total: Duration = self.frame_times.iter().sum();
        total.as_secs_f32() * 1000.0 / self.frame_times.len() as f32
    }

    #[must_use]
    pub fn max_frame_time_ms(&self) -> f32 {
        self.frame_times
            .iter()
            .max()
            .map_or(0.0, |d| d.as_secs_f32() * 1000.0)
    }

    #[must_use]
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// A summary line once every `interval` of recorded frame time
    pub fn take_report(&mut self, interval: Duration) -> Option<String> {
        if self.since_report < interval {
            return None;
        }
        self.since_report = Duration::ZERO;
        Some(format!(
            "FPS: {:.1} | Frame: {:.2}ms (max: {:.2}ms)",
            self.fps(),
            self.avg_frame_time_ms(),
            self.max_frame_time_ms()
        ))
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}
