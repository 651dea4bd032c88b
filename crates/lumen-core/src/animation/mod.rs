#![forbid(unsafe_code)]

//! Easing curves and timed animation state.
//!
//! - [`CubicBezier`]: CSS-style cubic-bezier easing solved numerically.
//! - [`BezierAnimation`]: a single eased `from -> to` interpolation.
//! - [`Track`] / [`Timeline`]: a batch of named tracks whose start can depend
//!   on another track in the same batch. The batch is validated as a DAG when
//!   the timeline is built.
//!
//! # Invariants
//!
//! 1. Every easing maps `0.0 -> 0.0` and `1.0 -> 1.0` exactly.
//! 2. A running track's delivered progress never decreases within one
//!    playback, and its final delivery is exactly `1.0`.
//! 3. A pending track never has its frame callback invoked.

pub mod bezier;
pub mod bezier_animation;
pub mod error;
pub mod timeline;
pub mod track;

pub use bezier::{
    CubicBezier, EASE, EASE_IN, EASE_IN_OUT, EASE_OUT, EASE_OUT_BACK, LINEAR, SampledEasing,
};
pub use bezier_animation::{BezierAnimation, interpolate_color};
pub use error::{BezierError, TimelineError};
pub use timeline::{AdvanceReport, Timeline};
pub use track::{StartCondition, Track, TrackId, TrackState};

/// Maps normalized time `t` in `[0, 1]` to normalized progress.
///
/// Implementations must return exactly `0.0` at `t = 0` and `1.0` at `t = 1`.
/// Values in between may leave `[0, 1]` (overshoot curves).
pub trait Easing {
    /// Evaluate the curve at `t`.
    fn ease(&self, t: f64) -> f64;
}

/// Identity easing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Linear;

impl Easing for Linear {
    #[inline]
    fn ease(&self, t: f64) -> f64 {
        t.clamp(0.0, 1.0)
    }
}

impl<F: Fn(f64) -> f64> Easing for F {
    #[inline]
    fn ease(&self, t: f64) -> f64 {
        self(t)
    }
}
