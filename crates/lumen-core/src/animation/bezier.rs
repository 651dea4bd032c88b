#![forbid(unsafe_code)]

//! Cubic-bezier easing curves.
//!
//! A curve is defined by four control points. The common CSS form fixes the
//! endpoints at `(0, 0)` and `(1, 1)` and takes the two inner points as
//! `(x1, y1, x2, y2)`.
//!
//! Evaluating `y` at a given `x` requires inverting `x(t)`. We use Newton
//! iteration from a linear guess and fall back to bisection when the
//! derivative flattens out, which converges for every curve whose inner
//! control points lie inside the endpoint x-range (the only curves
//! [`CubicBezier::try_new`] and [`CubicBezier::from_points`] accept).
//!
//! # Invariants
//!
//! 1. `y_at(x0) == y0` and `y_at(x3) == y3` exactly.
//! 2. `y` is never clamped: overshoot curves such as [`EASE_OUT_BACK`] leave
//!    `[0, 1]` between the endpoints.
//! 3. When `y1` and `y2` lie within `[y0, y3]`, `y_at` is monotonically
//!    non-decreasing in `x`.

use super::Easing;
use super::error::BezierError;

/// Newton iterations before falling back to bisection.
const NEWTON_ITERATIONS: usize = 8;
/// Bisection iterations; 2^-64 is far below f64 resolution on `[0, 1]`.
const BISECTION_ITERATIONS: usize = 64;
/// Acceptable `|x(t) - x|` error.
const SOLVE_EPSILON: f64 = 1e-9;
/// Below this slope Newton steps are unreliable.
const MIN_SLOPE: f64 = 1e-6;

/// `(x, y)` control point.
pub type Point = (f64, f64);

/// A cubic-bezier easing curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    points: [Point; 4],
}

/// `cubic-bezier(0, 0, 1, 1)`.
pub const LINEAR: CubicBezier = CubicBezier::new(0.0, 0.0, 1.0, 1.0);
/// `cubic-bezier(0.25, 0.1, 0.25, 1)`.
pub const EASE: CubicBezier = CubicBezier::new(0.25, 0.1, 0.25, 1.0);
/// `cubic-bezier(0.42, 0, 1, 1)`.
pub const EASE_IN: CubicBezier = CubicBezier::new(0.42, 0.0, 1.0, 1.0);
/// `cubic-bezier(0, 0, 0.58, 1)`.
pub const EASE_OUT: CubicBezier = CubicBezier::new(0.0, 0.0, 0.58, 1.0);
/// `cubic-bezier(0.42, 0, 0.58, 1)`.
pub const EASE_IN_OUT: CubicBezier = CubicBezier::new(0.42, 0.0, 0.58, 1.0);
/// `cubic-bezier(0.34, 1.56, 0.64, 1)`: overshoots past 1 before settling.
pub const EASE_OUT_BACK: CubicBezier = CubicBezier::new(0.34, 1.56, 0.64, 1.0);

impl CubicBezier {
    /// Curve from `(0, 0)` through `(x1, y1)`, `(x2, y2)` to `(1, 1)`.
    ///
    /// Unchecked so it can build constants; prefer [`CubicBezier::try_new`]
    /// for values that come from data.
    #[must_use]
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            points: [(0.0, 0.0), (x1, y1), (x2, y2), (1.0, 1.0)],
        }
    }

    /// Checked form of [`CubicBezier::new`]: `x1` and `x2` must lie in
    /// `[0, 1]` and every coordinate must be finite.
    pub fn try_new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self, BezierError> {
        Self::from_points([(0.0, 0.0), (x1, y1), (x2, y2), (1.0, 1.0)])
    }

    /// Curve through four arbitrary control points.
    ///
    /// Requires finite coordinates, `x0 < x3`, and both inner x coordinates
    /// within `[x0, x3]` so that `x(t)` is monotonic.
    pub fn from_points(points: [Point; 4]) -> Result<Self, BezierError> {
        if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(BezierError::NonFinite);
        }
        let (x0, _) = points[0];
        let (x3, _) = points[3];
        if x0 >= x3 {
            return Err(BezierError::EmptyDomain { start: x0, end: x3 });
        }
        for (x, _) in &points[1..3] {
            if *x < x0 || *x > x3 {
                return Err(BezierError::ControlOutOfRange {
                    x: *x,
                    start: x0,
                    end: x3,
                });
            }
        }
        Ok(Self { points })
    }

    /// The four control points.
    #[inline]
    #[must_use]
    pub fn points(&self) -> [Point; 4] {
        self.points
    }

    /// Point on the curve at parameter `t`.
    #[must_use]
    pub fn point_at(&self, t: f64) -> Point {
        let [p0, p1, p2, p3] = self.points;
        (
            component(p0.0, p1.0, p2.0, p3.0, t),
            component(p0.1, p1.1, p2.1, p3.1, t),
        )
    }

    /// Solve for `y` given `x`. `x` outside the curve's domain is clamped.
    #[must_use]
    pub fn y_at(&self, x: f64) -> f64 {
        let [p0, _, _, p3] = self.points;
        if x.is_nan() || x <= p0.0 {
            return p0.1;
        }
        if x >= p3.0 {
            return p3.1;
        }
        let t = self.solve_t(x);
        let [p0, p1, p2, p3] = self.points;
        component(p0.1, p1.1, p2.1, p3.1, t)
    }

    /// Parameter `t` such that `x(t) == x`, for `x` strictly inside the domain.
    fn solve_t(&self, x: f64) -> f64 {
        let [p0, p1, p2, p3] = self.points;
        let (x0, x1, x2, x3) = (p0.0, p1.0, p2.0, p3.0);

        let mut t = (x - x0) / (x3 - x0);
        for _ in 0..NEWTON_ITERATIONS {
            let err = component(x0, x1, x2, x3, t) - x;
            if err.abs() < SOLVE_EPSILON {
                return t;
            }
            let slope = derivative(x0, x1, x2, x3, t);
            if slope.abs() < MIN_SLOPE {
                break;
            }
            t -= err / slope;
            if !(0.0..=1.0).contains(&t) {
                break;
            }
        }

        let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
        t = 0.5;
        for _ in 0..BISECTION_ITERATIONS {
            let bx = component(x0, x1, x2, x3, t);
            if (bx - x).abs() < SOLVE_EPSILON {
                break;
            }
            if bx < x {
                lo = t;
            } else {
                hi = t;
            }
            t = lo + (hi - lo) / 2.0;
        }
        t
    }

    /// Precompute `samples` evenly spaced values for table lookup.
    ///
    /// Useful when the same curve is evaluated many times per frame.
    /// `samples` below 2 is raised to 2.
    #[must_use]
    pub fn sample(&self, samples: usize) -> SampledEasing {
        let samples = samples.max(2);
        let [p0, _, _, p3] = self.points;
        let span = p3.0 - p0.0;
        let last = (samples - 1) as f64;
        let values = (0..samples)
            .map(|i| self.y_at(p0.0 + span * (i as f64 / last)))
            .collect();
        SampledEasing { values }
    }
}

impl Default for CubicBezier {
    fn default() -> Self {
        EASE
    }
}

impl Easing for CubicBezier {
    #[inline]
    fn ease(&self, t: f64) -> f64 {
        self.y_at(t)
    }
}

/// A curve flattened into an evenly spaced lookup table.
///
/// Evaluation interpolates linearly between neighbouring samples; the first
/// and last samples are the curve's exact endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledEasing {
    values: Vec<f64>,
}

impl SampledEasing {
    /// Number of samples in the table.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false; tables hold at least two samples.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Easing for SampledEasing {
    fn ease(&self, t: f64) -> f64 {
        let last = self.values.len() - 1;
        if t.is_nan() || t <= 0.0 {
            return self.values[0];
        }
        if t >= 1.0 {
            return self.values[last];
        }
        let pos = t * last as f64;
        let idx = (pos.floor() as usize).min(last - 1);
        let frac = pos - idx as f64;
        let (a, b) = (self.values[idx], self.values[idx + 1]);
        a + (b - a) * frac
    }
}

#[inline]
fn component(a: f64, b: f64, c: f64, d: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    mt * mt * mt * a + 3.0 * mt * mt * t * b + 3.0 * mt * t * t * c + t * t * t * d
}

#[inline]
fn derivative(a: f64, b: f64, c: f64, d: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * (b - a) + 6.0 * mt * t * (c - b) + 3.0 * t * t * (d - c)
}
