#![forbid(unsafe_code)]

//! Scheduled animation on top of [`lumen_core::animation`].
//!
//! - [`AnimationEngine`]: plays validated batches of tracks, one at a time,
//!   from a [`FrameSource`](crate::frame::FrameSource).
//! - [`AnimatedValue`]: a target/rendered cell pair whose numeric fields are
//!   eased by [`BezierAnimator`]s.

pub mod animated;
pub mod engine;

pub use animated::{AnimatedValue, BezierAnimator, DEFAULT_ANIMATION_DURATION};
pub use engine::{AnimationEngine, BatchId, EngineConfig};
