#![forbid(unsafe_code)]

//! Time sources for frame-driven code.
//!
//! Production code reads `web_time::Instant::now()`. Tests use a [`LabClock`]
//! whose time only moves when [`LabClock::advance`] is called, so animation
//! progress is fully reproducible.
//!
//! # Example
//!
//! ```
//! use lumen_core::clock::LabClock;
//! use web_time::Duration;
//!
//! let clock = LabClock::new();
//! let observer = clock.clone();
//! let t0 = observer.now();
//! clock.advance(Duration::from_millis(16));
//! assert_eq!(observer.now() - t0, Duration::from_millis(16));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use web_time::{Duration, Instant};

/// A manually-advanceable clock.
///
/// All clones share the same offset, so every holder sees the same time.
#[derive(Debug, Clone)]
pub struct LabClock {
    epoch: Instant,
    offset_us: Arc<AtomicU64>,
}

impl LabClock {
    /// Create a new lab clock starting at `Instant::now()`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset_us: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Advance the clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        let us = delta.as_micros().min(u64::MAX as u128) as u64;
        self.offset_us.fetch_add(us, Ordering::Release);
    }

    /// Current lab time.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.epoch + self.elapsed()
    }

    /// The instant this clock started at.
    #[must_use]
    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    /// Total time advanced since creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.offset_us.load(Ordering::Acquire))
    }

    /// Instant `offset` after the epoch, without moving the clock.
    #[cfg(any(test, feature = "test-helpers"))]
    #[must_use]
    pub fn at(&self, offset: Duration) -> Instant {
        self.epoch + offset
    }
}

impl Default for LabClock {
    fn default() -> Self {
        Self::new()
    }
}
