#![forbid(unsafe_code)]

//! Logging shim.
//!
//! With the `tracing` feature the `tracing` macros are re-exported as-is.
//! Without it, macros with the same call syntax expand to nothing so call
//! sites never need their own `cfg` gates.

#[cfg(feature = "tracing")]
#[allow(unused_imports)]
pub(crate) use tracing::{debug, trace, warn};

#[cfg(not(feature = "tracing"))]
macro_rules! noop_log {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_imports)]
pub(crate) use {noop_log as debug, noop_log as trace, noop_log as warn};
