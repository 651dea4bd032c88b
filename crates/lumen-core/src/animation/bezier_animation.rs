#![forbid(unsafe_code)]

//! A single eased interpolation between two scalars.
//!
//! `BezierAnimation` is the building block for values that animate toward a
//! target which can change mid-flight: [`BezierAnimation::retarget`] decides
//! whether the in-flight animation can be kept or a new one must start from
//! the currently displayed value.

use web_time::{Duration, Instant};

use super::bezier::CubicBezier;
use super::Easing;

/// Eased `from -> to` interpolation over `duration`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BezierAnimation {
    pub from: f64,
    pub to: f64,
    /// Latched by the first [`value_at`](Self::value_at) when `None`.
    pub started_at: Option<Instant>,
    pub duration: Duration,
    pub ease: CubicBezier,
}

impl BezierAnimation {
    /// An animation that starts on its first sample.
    #[must_use]
    pub fn new(from: f64, to: f64, duration: Duration, ease: CubicBezier) -> Self {
        Self {
            from,
            to,
            started_at: None,
            duration,
            ease,
        }
    }

    /// Builder: start at a fixed instant.
    #[must_use]
    pub fn starting_at(mut self, at: Instant) -> Self {
        self.started_at = Some(at);
        self
    }

    /// Linear progress at `now`, in `[0, 1]`. An unstarted animation is at 0.
    #[must_use]
    pub fn progress_at(&self, now: Instant) -> f64 {
        let Some(started_at) = self.started_at else {
            return 0.0;
        };
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(started_at);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    /// Value at `now`, latching the start instant on first use.
    ///
    /// Returns `to` exactly once the duration has elapsed.
    pub fn value_at(&mut self, now: Instant) -> f64 {
        self.started_at.get_or_insert(now);
        let t = self.progress_at(now);
        if t >= 1.0 {
            return self.to;
        }
        self.from + (self.to - self.from) * self.ease.ease(t)
    }

    /// Whether the animation has run its full duration by `now`.
    ///
    /// An unstarted animation is complete only if its duration is zero.
    #[must_use]
    pub fn is_complete_at(&self, now: Instant) -> bool {
        match self.started_at {
            Some(_) => self.progress_at(now) >= 1.0,
            None => self.duration.is_zero(),
        }
    }

    /// Reconcile an animation with a (possibly new) target.
    ///
    /// - `old` still running toward `target`: keep it unchanged.
    /// - `current == target`: nothing to animate, `None`.
    /// - Otherwise: a new animation from `current` started at `now`.
    #[must_use]
    pub fn retarget(
        now: Instant,
        current: f64,
        target: f64,
        old: Option<Self>,
        duration: Duration,
        ease: CubicBezier,
    ) -> Option<Self> {
        if let Some(old) = old {
            if old.to == target && !old.is_complete_at(now) {
                return Some(old);
            }
        }
        if current == target {
            return None;
        }
        Some(Self::new(current, target, duration, ease).starting_at(now))
    }
}

/// Channel-wise linear interpolation, e.g. between two RGBA colors.
///
/// `t` is not clamped, so overshoot easings carry through.
#[must_use]
pub fn interpolate_color<const N: usize>(from: [f64; N], to: [f64; N], t: f64) -> [f64; N] {
    std::array::from_fn(|i| from[i] + (to[i] - from[i]) * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{EASE, LINEAR};

    const MS_100: Duration = Duration::from_millis(100);

    #[test]
    fn first_sample_latches_start() {
        let mut anim = BezierAnimation::new(0.0, 10.0, MS_100, LINEAR);
        let t0 = Instant::now();
        assert_eq!(anim.value_at(t0 + Duration::from_secs(5)), 0.0);
        assert_eq!(anim.started_at, Some(t0 + Duration::from_secs(5)));
    }

    #[test]
    fn linear_midpoint() {
        let t0 = Instant::now();
        let mut anim = BezierAnimation::new(0.0, 10.0, MS_100, LINEAR).starting_at(t0);
        assert!((anim.value_at(t0 + Duration::from_millis(50)) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn exact_target_when_complete() {
        let t0 = Instant::now();
        let mut anim = BezierAnimation::new(0.1, 0.7, MS_100, EASE).starting_at(t0);
        assert_eq!(anim.value_at(t0 + MS_100), 0.7);
        assert_eq!(anim.value_at(t0 + Duration::from_secs(3)), 0.7);
        assert!(anim.is_complete_at(t0 + MS_100));
    }

    #[test]
    fn zero_duration_is_immediately_complete() {
        let mut anim = BezierAnimation::new(1.0, 2.0, Duration::ZERO, EASE);
        assert!(anim.is_complete_at(Instant::now()));
        assert_eq!(anim.value_at(Instant::now()), 2.0);
    }

    #[test]
    fn unstarted_is_not_complete() {
        let anim = BezierAnimation::new(0.0, 1.0, MS_100, EASE);
        assert!(!anim.is_complete_at(Instant::now()));
        assert_eq!(anim.progress_at(Instant::now()), 0.0);
    }

    #[test]
    fn retarget_keeps_in_flight_animation_to_same_target() {
        let t0 = Instant::now();
        let old = BezierAnimation::new(0.0, 1.0, MS_100, EASE).starting_at(t0);
        let now = t0 + Duration::from_millis(40);
        let kept = BezierAnimation::retarget(now, 0.3, 1.0, Some(old), MS_100, EASE);
        assert_eq!(kept, Some(old));
    }

    #[test]
    fn retarget_restarts_from_current_on_new_target() {
        let t0 = Instant::now();
        let old = BezierAnimation::new(0.0, 1.0, MS_100, EASE).starting_at(t0);
        let now = t0 + Duration::from_millis(40);
        let fresh = BezierAnimation::retarget(now, 0.3, 0.0, Some(old), MS_100, LINEAR).unwrap();
        assert_eq!(fresh.from, 0.3);
        assert_eq!(fresh.to, 0.0);
        assert_eq!(fresh.started_at, Some(now));
    }

    #[test]
    fn retarget_none_when_already_there() {
        let now = Instant::now();
        assert_eq!(BezierAnimation::retarget(now, 1.0, 1.0, None, MS_100, EASE), None);

        let done = BezierAnimation::new(0.0, 1.0, MS_100, EASE).starting_at(now);
        let later = now + Duration::from_secs(1);
        assert_eq!(BezierAnimation::retarget(later, 1.0, 1.0, Some(done), MS_100, EASE), None);
    }

    #[test]
    fn interpolate_color_channels() {
        let black = [0.0, 0.0, 0.0, 1.0];
        let white = [1.0, 1.0, 1.0, 0.0];
        assert_eq!(interpolate_color(black, white, 0.0), black);
        assert_eq!(interpolate_color(black, white, 1.0), white);
        assert_eq!(interpolate_color(black, white, 0.5), [0.5, 0.5, 0.5, 0.5]);
    }
}
