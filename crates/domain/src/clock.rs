//! Injectable wall-clock and randomness sources.
//!
//! Every time-dependent decision in the monitor funnels through a
//! [`Clock`], and every jittered-interval computation funnels through a
//! [`Rng`], so tests can drive both deterministically instead of
//! sleeping or seeding the real `rand` thread-local.

use chrono::{DateTime, Utc};

/// A source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that always returns a fixed instant, advanced manually by
/// tests.
#[derive(Debug, Clone)]
pub struct FrozenClock {
    now: std::sync::Arc<parking_lot::RwLock<DateTime<Utc>>>,
}

impl FrozenClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Arc::new(parking_lot::RwLock::new(at)),
        }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.now.write();
        *guard += delta;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.write() = at;
    }
}

impl Clock for FrozenClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// A source of uniform randomness in `[low, high)`.
///
/// Abstracted so the jitter formula in the scheduler is reproducible in
/// tests.
pub trait Rng: Send + Sync {
    fn uniform(&self, low: f64, high: f64) -> f64;
}

/// The real `rand`-backed RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRng;

impl Rng for ThreadRng {
    fn uniform(&self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        rand::Rng::gen_range(&mut rand::thread_rng(), low..high)
    }
}

/// A deterministic RNG that always returns a fixed value (clamped into
/// range), for tests that need to pin down the jitter term.
#[derive(Debug, Clone, Copy)]
pub struct FixedRng(pub f64);

impl Rng for FixedRng {
    fn uniform(&self, low: f64, high: f64) -> f64 {
        self.0.clamp(low.min(high), high.max(low))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frozen_clock_advances() {
        let start = "2024-01-01T00:00:00Z".parse().unwrap();
        let clock = FrozenClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(chrono::Duration::minutes(20));
        assert_eq!(clock.now(), start + chrono::Duration::minutes(20));
    }

    #[test]
    fn fixed_rng_clamps_into_range() {
        let rng = FixedRng(100.0);
        assert_eq!(rng.uniform(-5.0, 5.0), 5.0);
        let rng = FixedRng(-100.0);
        assert_eq!(rng.uniform(-5.0, 5.0), -5.0);
    }

    #[test]
    fn thread_rng_stays_in_bounds() {
        let rng = ThreadRng;
        for _ in 0..100 {
            let v = rng.uniform(-3.0, 3.0);
            assert!((-3.0..3.0).contains(&v));
        }
    }
}
