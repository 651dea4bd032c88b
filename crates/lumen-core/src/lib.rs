#![forbid(unsafe_code)]

//! Core: easing curves, bezier animations, the track timeline state machine,
//! and a deterministic clock for tests.
//!
//! Nothing in this crate schedules work or shares state; the reactive cells
//! and the frame-driven engine live in `lumen-runtime`.

pub mod animation;
pub mod clock;
pub(crate) mod logging;
