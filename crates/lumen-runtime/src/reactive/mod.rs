#![forbid(unsafe_code)]

//! Reactive data bindings.
//!
//! This module provides change-notification primitives:
//!
//! - [`Callbacks`]: an ordered, identity de-duplicated subscriber list with
//!   snapshot semantics.
//! - [`Observable`]: a shared, version-tracked value that notifies its
//!   subscribers synchronously on every write.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`Derived`]: a read-only cell kept up to date from one or more sources by
//!   [`map`] or [`combine`].
//! - [`WaitFor`]: a one-shot handle resolved when a cell satisfies a predicate.
//!
//! # Architecture
//!
//! Cells are `Rc` handles over `RefCell` state. No borrow of a cell's value or
//! subscriber list is held while a subscriber runs, so subscribers may read or
//! write any cell, including the one notifying them.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order, synchronously, before
//!    the triggering `set` returns.
//! 2. A subscriber added during a notification pass is not invoked in that
//!    pass; one removed before it is reached is not invoked at all.
//! 3. `version` increments exactly once per stored write.
//! 4. A panicking subscriber does not stop the rest of the pass.
//! 5. Notification across cells is depth-first.
//!
//! # Failure Modes
//!
//! - **Subscriber panics**: caught and logged at `error` level; the pass
//!   continues.
//! - **Derivation panics**: the derived value is left at its last good state
//!   and the panic is re-raised to the caller of the triggering `set` once
//!   the pass is finished.
//! - **Cyclic cells** (A's subscriber sets B, B's subscriber sets A): in debug
//!   builds the pass panics once [`MAX_NOTIFY_DEPTH`] nested passes are
//!   active. Release builds recurse until the stack is exhausted.

pub mod callbacks;
pub mod derived;
pub mod observable;
pub mod wait;

pub use callbacks::{Callback, Callbacks, MAX_NOTIFY_DEPTH, PanicPolicy, Subscription};
pub use derived::{CombineOptions, Derived, EqFn, MapOptions, combine, combine2, map};
pub use observable::{Observable, ReadCell, Source, WeakObservable};
pub use wait::{WaitError, WaitFor, wait_for, wait_for_next};
