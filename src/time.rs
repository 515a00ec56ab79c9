//! Frame timing.
//!
//! The cycle scheduler needs two readings per frame: wall-clock time since
//! the run started (to decide whether a steering cycle has used up its
//! budget) and the frame delta (to scale motion). [`FrameClock`] is that
//! capability. [`Time`] implements it against `std::time::Instant`;
//! [`ManualClock`] is driven by hand.
//!
//! # Example
//!
//! ```ignore
//! use steerflock::time::Time;
//!
//! let mut time = Time::new();
//! time.set_fixed_delta(Some(1.0 / 60.0));
//!
//! loop {
//!     time.update();
//!     flock.update(&time)?;
//! }
//! ```

use std::time::{Duration, Instant};

/// Source of wall-clock and frame-delta readings.
pub trait FrameClock {
    /// Real time elapsed since the clock started. Unaffected by a fixed
    /// delta.
    fn now(&self) -> Duration;

    /// Simulation time covered by the current frame, in seconds.
    fn delta(&self) -> f32;
}

/// Real-time frame clock.
#[derive(Debug)]
pub struct Time {
    start: Instant,
    last_frame: Instant,
    delta_secs: f32,
    frame_count: u64,
    /// Replaces the measured frame time when set.
    fixed_delta: Option<f32>,
}

impl Time {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            delta_secs: 0.0,
            frame_count: 0,
            fixed_delta: None,
        }
    }

    /// Advance to a new frame. Call once per frame, before updating the flock.
    ///
    /// Returns the new delta.
    pub fn update(&mut self) -> f32 {
        let now = Instant::now();
        let raw_delta = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.frame_count += 1;

        self.delta_secs = self.fixed_delta.unwrap_or(raw_delta);
        self.delta_secs
    }

    /// Total frames since start.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Use a constant delta instead of measured frame time. `None` restores
    /// measured timing.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta;
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock for Time {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn delta(&self) -> f32 {
        self.delta_secs
    }
}

/// Clock whose readings are set explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ManualClock {
    pub now: Duration,
    pub delta: f32,
}

impl ManualClock {
    pub fn new(delta: f32) -> Self {
        Self {
            now: Duration::ZERO,
            delta,
        }
    }

    /// Move wall-clock time forward by `by`.
    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }
}

impl FrameClock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn delta(&self) -> f32 {
        self.delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_time_new() {
        let time = Time::new();
        assert_eq!(time.frame(), 0);
        assert_eq!(time.delta(), 0.0);
    }

    #[test]
    fn test_time_update() {
        let mut time = Time::new();
        thread::sleep(Duration::from_millis(10));
        let delta = time.update();

        assert!(delta > 0.0);
        assert!(time.now() >= Duration::from_millis(10));
        assert_eq!(time.frame(), 1);
    }

    #[test]
    fn test_fixed_delta_ignores_frame_time() {
        let mut time = Time::new();
        time.set_fixed_delta(Some(1.0 / 60.0));
        thread::sleep(Duration::from_millis(20));

        assert!((time.update() - 1.0 / 60.0).abs() < 1e-6);
        assert!(time.now() >= Duration::from_millis(20));

        time.set_fixed_delta(None);
        thread::sleep(Duration::from_millis(5));
        assert!(time.update() >= 0.005);
    }

    #[test]
    fn test_manual_clock() {
        let mut clock = ManualClock::new(0.25);
        clock.advance(Duration::from_millis(300));
        clock.advance(Duration::from_millis(300));
        assert_eq!(clock.now(), Duration::from_millis(600));
        assert_eq!(clock.delta(), 0.25);
    }
}
