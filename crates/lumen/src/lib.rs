#![forbid(unsafe_code)]

//! Lumen public facade crate.
//!
//! Re-exports the easing/timeline core and, with the default `runtime`
//! feature, the reactive cells and animation engine.
//!
//! ```
//! use lumen::prelude::*;
//!
//! let x = Observable::new(0);
//! let y = map(&x, |v| v * 2, MapOptions::default());
//! x.set(5);
//! assert_eq!(y.get(), 10);
//! ```

pub mod prelude {
    pub use lumen_core as core;
    pub use lumen_core::animation::{
        CubicBezier, EASE, EASE_IN, EASE_IN_OUT, EASE_OUT, EASE_OUT_BACK, Easing, LINEAR,
        StartCondition, Timeline, TimelineError, Track, TrackId, TrackState,
    };

    #[cfg(feature = "runtime")]
    pub use lumen_runtime as runtime;
    #[cfg(feature = "runtime")]
    pub use lumen_runtime::{
        AnimatedValue, AnimationEngine, BezierAnimator, CombineOptions, Derived, EngineConfig,
        FrameSource, ManualFrameSource, MapOptions, Observable, Subscription, WaitError, WaitFor,
        combine, combine2, map, wait_for, wait_for_next,
    };
}
