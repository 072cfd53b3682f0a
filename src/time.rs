//! Monotonic time sources.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Seconds since an arbitrary fixed origin. Never decreases.
pub trait Clock {
    fn now(&self) -> f32;
}

/// Wall clock starting at zero when created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f32 {
        self.origin.elapsed().as_secs_f32()
    }
}

/// Hand-driven clock. Clones share the same reading, so a test can keep
/// one and advance the copy held by the scene.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    seconds: Rc<Cell<f32>>,
}

impl ManualClock {
    pub fn new(start: f32) -> Self {
        Self {
            seconds: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, seconds: f32) {
        self.seconds.set(seconds);
    }

    pub fn advance(&self, seconds: f32) {
        self.seconds.set(self.seconds.get() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f32 {
        self.seconds.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shares_reading() {
        let clock = ManualClock::new(1.0);
        let shared = clock.clone();
        clock.advance(0.5);
        assert_eq!(shared.now(), 1.5);
        shared.set(10.0);
        assert_eq!(clock.now(), 10.0);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(a >= 0.0);
    }
}
