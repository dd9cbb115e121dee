//! Frame timing utilities

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Number of recent frames kept for the rolling average
const HISTORY_LEN: usize = 120;

/// How the frame loop produces its delta time
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FrameStep {
    /// Every frame advances by the same number of seconds
    Fixed { seconds: f64 },
    /// Delta is the real time elapsed since the previous tick
    WallClock,
}

impl Default for FrameStep {
    fn default() -> Self {
        FrameStep::Fixed { seconds: 1.0 / 60.0 }
    }
}

/// Produces per-frame delta times and keeps simple frame statistics
pub struct FrameClock {
    step: FrameStep,
    last_frame: Instant,
    delta: f64,
    elapsed: f64,
    frame_count: u64,
    history: VecDeque<f64>,
}

impl FrameClock {
    /// Create a new clock. The first `tick` measures from this call.
    pub fn new(step: FrameStep) -> Self {
        Self {
            step,
            last_frame: Instant::now(),
            delta: 0.0,
            elapsed: 0.0,
            frame_count: 0,
            history: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    /// Call once per frame. Returns the delta in seconds.
    pub fn tick(&mut self) -> f64 {
        let now = Instant::now();
        self.delta = match self.step {
            FrameStep::Fixed { seconds } => seconds.max(0.0),
            FrameStep::WallClock => (now - self.last_frame).as_secs_f64(),
        };
        self.last_frame = now;
        self.elapsed += self.delta;
        self.frame_count += 1;

        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(self.delta);

        self.delta
    }

    /// Delta of the most recent tick in seconds
    pub fn delta_secs(&self) -> f64 {
        self.delta
    }

    /// Delta of the most recent tick as Duration
    pub fn delta(&self) -> Duration {
        Duration::from_secs_f64(self.delta)
    }

    /// Sum of all deltas so far
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed
    }

    /// Get total frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average frame time over the recent history, 0 before the first tick
    pub fn average_frame_time(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().sum::<f64>() / self.history.len() as f64
    }

    /// Frames per second derived from the average frame time
    pub fn fps(&self) -> f64 {
        let avg = self.average_frame_time();
        if avg > 0.0 { 1.0 / avg } else { 0.0 }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(FrameStep::default())
    }
}
