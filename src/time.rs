//! Frame timing driven by host timestamps.
//!
//! The host passes a timestamp with every frame callback (the browser's
//! `requestAnimationFrame` time, or the elapsed time of a native event loop).
//! [`FrameTimer`] turns those into per-frame deltas and an FPS estimate.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use shimmer::time::FrameTimer;
//!
//! let mut timer = FrameTimer::new(Duration::ZERO);
//! let delta = timer.tick(Duration::from_millis(16));
//!
//! println!("Delta: {:.4}s", delta);
//! println!("Frame: {}", timer.frame());
//! ```

use std::time::Duration;

/// Per-frame timing state.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    /// Timestamp the timer was created at.
    start: Duration,
    /// Timestamp of the previous frame.
    previous: Duration,
    /// Time since last frame in seconds.
    delta_secs: f32,
    /// Total frames ticked.
    frame_count: u64,
    /// Calculated FPS (updated periodically).
    fps: f32,
    /// Frame count at last FPS update.
    fps_frame_count: u64,
    /// Timestamp of last FPS calculation.
    fps_update_time: Duration,
    /// How often to update the FPS calculation.
    fps_update_interval: Duration,
}

impl FrameTimer {
    /// Create a timer whose previous-frame timestamp is `now`.
    pub fn new(now: Duration) -> Self {
        Self {
            start: now,
            previous: now,
            delta_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
        }
    }

    /// Advance to `now` and return the seconds elapsed since the previous frame.
    ///
    /// A timestamp earlier than the previous one yields a delta of 0.
    pub fn tick(&mut self, now: Duration) -> f32 {
        self.delta_secs = now.saturating_sub(self.previous).as_secs_f32();
        self.previous = self.previous.max(now);
        self.frame_count += 1;

        let fps_elapsed = self.previous.saturating_sub(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = self.previous;
            log::debug!("{:.1} fps over {} frames", self.fps, frames_since);
        }

        self.delta_secs
    }

    /// Seconds between the last two frames.
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    /// Seconds since the timer was created.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.previous.saturating_sub(self.start).as_secs_f32()
    }

    /// Total frames ticked.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Frames per second, refreshed every 500 ms.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Timestamp of the most recent frame.
    #[inline]
    pub fn previous(&self) -> Duration {
        self.previous
    }
}
