#![forbid(unsafe_code)]

//! Reactive cells and frame-driven animation for Lumen.
//!
//! - [`reactive`]: [`Observable`] cells, [`Derived`] cells built with
//!   [`map`] / [`combine`], and one-shot [`wait_for`] handles.
//! - [`frame`]: the display-frame interface the animation layer is driven by.
//! - [`animation`]: the [`AnimationEngine`] that plays batches of tracks, and
//!   [`AnimatedValue`] for values that glide toward a target.
//!
//! Everything here is single-threaded: handles are `Rc`-based and `!Send`.

pub mod animation;
pub mod frame;
pub mod reactive;

pub use animation::{AnimatedValue, AnimationEngine, BatchId, BezierAnimator, EngineConfig};
pub use frame::{FrameCallback, FrameRequestId, FrameSource, ManualFrameSource};
pub use reactive::{
    Callback, Callbacks, CombineOptions, Derived, MapOptions, Observable, PanicPolicy, ReadCell,
    Source, Subscription, WaitError, WaitFor, combine, combine2, map, wait_for, wait_for_next,
};
