#![forbid(unsafe_code)]

//! One-shot waits on cell values.
//!
//! Waiting never blocks: [`wait_for`] registers a subscriber that resolves a
//! [`WaitFor`] handle the first time the predicate holds, then unsubscribes
//! itself. The handle can be polled with [`WaitFor::try_take`] or awaited as
//! a [`Future`] on a single-threaded executor.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

use thiserror::Error;

use super::callbacks::{PanicPolicy, Subscription};
use super::observable::ReadCell;

/// Why a wait ended without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("wait was canceled")]
    Canceled,

    #[error("cell was dropped before the condition held")]
    SourceDropped,

    #[error("value was already taken from this wait")]
    Consumed,
}

enum Outcome<T> {
    Pending,
    Ready(T),
    Failed(WaitError),
    Taken,
}

struct WaitState<T> {
    outcome: Outcome<T>,
    subscription: Option<Subscription>,
    waker: Option<Waker>,
}

impl<T> WaitState<T> {
    fn pending() -> Self {
        Self {
            outcome: Outcome::Pending,
            subscription: None,
            waker: None,
        }
    }
}

/// Settles a wait from inside the source's subscriber list.
///
/// Dropped together with the subscriber, so a source that goes away before
/// resolving fails the wait with [`WaitError::SourceDropped`].
struct Resolver<T> {
    state: Weak<RefCell<WaitState<T>>>,
}

impl<T> Resolver<T> {
    fn settle(&self, outcome: Outcome<T>) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let (subscription, waker) = {
            let mut state = state.borrow_mut();
            if !matches!(state.outcome, Outcome::Pending) {
                return;
            }
            state.outcome = outcome;
            (state.subscription.take(), state.waker.take())
        };
        drop(subscription);
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        self.settle(Outcome::Failed(WaitError::SourceDropped));
    }
}

/// Handle to a pending one-shot wait.
///
/// Dropping the handle cancels the wait.
pub struct WaitFor<T> {
    state: Rc<RefCell<WaitState<T>>>,
}

impl<T> fmt::Debug for WaitFor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.state.borrow().outcome {
            Outcome::Pending => "pending",
            Outcome::Ready(_) => "ready",
            Outcome::Failed(_) => "failed",
            Outcome::Taken => "taken",
        };
        f.debug_struct("WaitFor").field("status", &status).finish()
    }
}

impl<T> WaitFor<T> {
    fn resolved(value: T) -> Self {
        let mut state = WaitState::pending();
        state.outcome = Outcome::Ready(value);
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Whether the wait is still unresolved.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.state.borrow().outcome, Outcome::Pending)
    }

    /// Take the outcome if the wait has settled.
    ///
    /// Returns `None` while pending. A value can be taken once; afterwards
    /// this returns `Some(Err(WaitError::Consumed))`.
    pub fn try_take(&self) -> Option<Result<T, WaitError>> {
        let mut state = self.state.borrow_mut();
        match std::mem::replace(&mut state.outcome, Outcome::Taken) {
            Outcome::Pending => {
                state.outcome = Outcome::Pending;
                None
            }
            Outcome::Ready(value) => Some(Ok(value)),
            Outcome::Failed(err) => {
                state.outcome = Outcome::Failed(err);
                Some(Err(err))
            }
            Outcome::Taken => Some(Err(WaitError::Consumed)),
        }
    }

    /// Stop waiting. Idempotent; a settled wait is left as is.
    pub fn cancel(&self) {
        let (subscription, waker) = {
            let mut state = self.state.borrow_mut();
            if !matches!(state.outcome, Outcome::Pending) {
                return;
            }
            state.outcome = Outcome::Failed(WaitError::Canceled);
            (state.subscription.take(), state.waker.take())
        };
        drop(subscription);
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> Drop for WaitFor<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<T> Future for WaitFor<T> {
    type Output = Result<T, WaitError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(outcome) = self.try_take() {
            return Poll::Ready(outcome);
        }
        self.state.borrow_mut().waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

fn subscribe_once<C, P>(cell: &C, predicate: P) -> WaitFor<C::Value>
where
    C: ReadCell,
    P: Fn(&C::Value) -> bool + 'static,
{
    let state = Rc::new(RefCell::new(WaitState::pending()));
    let resolver = Resolver {
        state: Rc::downgrade(&state),
    };
    let subscription = cell.watch_value(
        Box::new(move |value: &C::Value| {
            if predicate(value) {
                resolver.settle(Outcome::Ready(value.clone()));
            }
        }),
        PanicPolicy::Isolate,
    );
    state.borrow_mut().subscription = Some(subscription);
    WaitFor { state }
}

/// Resolve once `predicate` holds for the cell's value.
///
/// Resolves immediately if it already holds.
pub fn wait_for<C, P>(cell: &C, predicate: P) -> WaitFor<C::Value>
where
    C: ReadCell,
    P: Fn(&C::Value) -> bool + 'static,
{
    let current = cell.snapshot();
    if predicate(&current) {
        return WaitFor::resolved(current);
    }
    subscribe_once(cell, predicate)
}

/// Resolve with the value of the cell's next notification.
pub fn wait_for_next<C: ReadCell>(cell: &C) -> WaitFor<C::Value> {
    subscribe_once(cell, |_| true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Observable;

    fn poll_once<F: Future + Unpin>(fut: &mut F) -> Poll<F::Output> {
        let mut cx = Context::from_waker(Waker::noop());
        Pin::new(fut).poll(&mut cx)
    }

    #[test]
    fn resolves_immediately_when_condition_holds() {
        let cell = Observable::new(5);
        let wait = wait_for(&cell, |v| *v > 3);
        assert!(!wait.is_pending());
        assert_eq!(cell.subscriber_count(), 0);
        assert_eq!(wait.try_take(), Some(Ok(5)));
    }

    #[test]
    fn resolves_on_first_satisfying_value_and_unsubscribes() {
        let cell = Observable::new(0);
        let wait = wait_for(&cell, |v| *v >= 10);
        assert!(wait.is_pending());
        assert_eq!(cell.subscriber_count(), 1);

        cell.set(4);
        assert!(wait.is_pending());
        cell.set(12);
        assert_eq!(cell.subscriber_count(), 0);
        cell.set(20);
        assert_eq!(wait.try_take(), Some(Ok(12)));
        assert_eq!(wait.try_take(), Some(Err(WaitError::Consumed)));
    }

    #[test]
    fn wait_for_next_ignores_current_value() {
        let cell = Observable::new("idle");
        let wait = wait_for_next(&cell);
        assert_eq!(wait.try_take(), None);
        cell.set("busy");
        assert_eq!(wait.try_take(), Some(Ok("busy")));
    }

    #[test]
    fn cancel_is_idempotent_and_unsubscribes() {
        let cell = Observable::new(0);
        let wait = wait_for(&cell, |v| *v == 1);
        wait.cancel();
        wait.cancel();
        assert_eq!(cell.subscriber_count(), 0);
        cell.set(1);
        assert_eq!(wait.try_take(), Some(Err(WaitError::Canceled)));
    }

    #[test]
    fn cancel_after_resolution_keeps_value() {
        let cell = Observable::new(0);
        let wait = wait_for_next(&cell);
        cell.set(3);
        wait.cancel();
        assert_eq!(wait.try_take(), Some(Ok(3)));
    }

    #[test]
    fn dropping_handle_unsubscribes() {
        let cell = Observable::new(0);
        let wait = wait_for(&cell, |v| *v == 1);
        drop(wait);
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn dropped_source_fails_the_wait() {
        let cell = Observable::new(0);
        let wait = wait_for(&cell, |v| *v == 1);
        drop(cell);
        assert_eq!(wait.try_take(), Some(Err(WaitError::SourceDropped)));
    }

    #[test]
    fn works_as_future() {
        let cell = Observable::new(0);
        let mut wait = wait_for(&cell, |v| *v % 2 == 1);
        assert!(poll_once(&mut wait).is_pending());
        cell.set(7);
        assert_eq!(poll_once(&mut wait), Poll::Ready(Ok(7)));
    }

    #[test]
    fn waits_on_derived_cells() {
        let x = Observable::new(1);
        let y = crate::reactive::map(&x, |v| v * 3, crate::reactive::MapOptions::default());
        let wait = wait_for(&y, |v| *v > 10);
        x.set(4);
        assert_eq!(wait.try_take(), Some(Ok(12)));
    }
}
