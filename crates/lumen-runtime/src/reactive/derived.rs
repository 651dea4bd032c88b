#![forbid(unsafe_code)]

//! Derived cells that stay up to date from their sources.
//!
//! # Design
//!
//! A [`Derived<U>`] wraps an internal [`Observable<U>`] plus the
//! subscriptions that feed it. Recomputation is eager: every source
//! notification runs the derivation synchronously, inside the source's
//! notification pass, so a derived value is never stale once `set` returns.
//!
//! - [`map`]: one source, with independent input and output short-circuits.
//! - [`combine`]: any number of sources of any type; the function reads
//!   whatever it needs.
//! - [`combine2`]: typed two-source convenience over [`combine`].
//!
//! # Invariants
//!
//! 1. After every recomputation, the value equals `f` applied to the sources
//!    as they were read during that recomputation.
//! 2. `map` recomputes exactly once per source notification not skipped by
//!    its input equality, and notifies exactly once per recomputation not
//!    skipped by its output equality.
//! 3. `combine` recomputes once per individual source notification.
//!
//! # Failure Modes
//!
//! - **Derivation panics**: the previous value and previous input are kept,
//!   the source's remaining subscribers still run, and the panic reaches the
//!   caller of the triggering `set`.
//! - **Derived dropped**: all clones gone means the subscriptions are dropped
//!   and the sources stop driving it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::callbacks::{Callback, PanicPolicy, Subscription};
use super::observable::{Observable, ReadCell, Source};

/// A shared equality predicate.
pub type EqFn<T> = Rc<dyn Fn(&T, &T) -> bool>;

fn partial_eq<T: PartialEq + 'static>() -> EqFn<T> {
    Rc::new(|a: &T, b: &T| a == b)
}

/// Short-circuit options for [`map`].
pub struct MapOptions<T, U> {
    input_eq: Option<EqFn<T>>,
    output_eq: Option<EqFn<U>>,
}

impl<T: PartialEq + 'static, U: PartialEq + 'static> Default for MapOptions<T, U> {
    /// Both short-circuits compare with `PartialEq`.
    fn default() -> Self {
        Self {
            input_eq: Some(partial_eq()),
            output_eq: Some(partial_eq()),
        }
    }
}

impl<T, U> MapOptions<T, U> {
    /// Recompute and notify on every source notification.
    #[must_use]
    pub fn always() -> Self {
        Self {
            input_eq: None,
            output_eq: None,
        }
    }

    /// Skip recomputation when `eq(previous_input, new_input)` holds.
    #[must_use]
    pub fn input_eq(mut self, eq: impl Fn(&T, &T) -> bool + 'static) -> Self {
        self.input_eq = Some(Rc::new(eq));
        self
    }

    /// Skip notification when `eq(previous_output, new_output)` holds.
    #[must_use]
    pub fn output_eq(mut self, eq: impl Fn(&U, &U) -> bool + 'static) -> Self {
        self.output_eq = Some(Rc::new(eq));
        self
    }

    #[must_use]
    pub fn without_input_eq(mut self) -> Self {
        self.input_eq = None;
        self
    }

    #[must_use]
    pub fn without_output_eq(mut self) -> Self {
        self.output_eq = None;
        self
    }
}

impl<T, U> fmt::Debug for MapOptions<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapOptions")
            .field("input_eq", &self.input_eq.is_some())
            .field("output_eq", &self.output_eq.is_some())
            .finish()
    }
}

/// Short-circuit options for [`combine`].
pub struct CombineOptions<U> {
    output_eq: Option<EqFn<U>>,
}

impl<U: PartialEq + 'static> Default for CombineOptions<U> {
    fn default() -> Self {
        Self {
            output_eq: Some(partial_eq()),
        }
    }
}

impl<U> CombineOptions<U> {
    /// Notify after every recomputation.
    #[must_use]
    pub fn always() -> Self {
        Self { output_eq: None }
    }

    #[must_use]
    pub fn output_eq(mut self, eq: impl Fn(&U, &U) -> bool + 'static) -> Self {
        self.output_eq = Some(Rc::new(eq));
        self
    }
}

impl<U> fmt::Debug for CombineOptions<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombineOptions")
            .field("output_eq", &self.output_eq.is_some())
            .finish()
    }
}

/// A read-only cell computed from other cells.
///
/// Cloning a `Derived` creates a new handle to the **same** derivation; the
/// derivation stays attached to its sources until the last clone is dropped.
pub struct Derived<U> {
    output: Observable<U>,
    _subscriptions: Rc<Vec<Subscription>>,
}

impl<U> Clone for Derived<U> {
    fn clone(&self) -> Self {
        Self {
            output: self.output.clone(),
            _subscriptions: Rc::clone(&self._subscriptions),
        }
    }
}

impl<U: fmt::Debug> fmt::Debug for Derived<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("output", &self.output)
            .field("sources", &self._subscriptions.len())
            .finish()
    }
}

impl<U: Clone + 'static> Derived<U> {
    #[must_use]
    pub fn get(&self) -> U {
        self.output.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&U) -> R) -> R {
        self.output.with(f)
    }

    /// Number of notifying recomputations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.output.version()
    }

    pub fn subscribe(&self, callback: &Callback<U>) -> bool {
        self.output.subscribe(callback)
    }

    pub fn unsubscribe(&self, callback: &Callback<U>) -> bool {
        self.output.unsubscribe(callback)
    }

    pub fn subscribe_fn(&self, f: impl Fn(&U) + 'static) -> Subscription {
        self.output.subscribe_fn(f)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.output.subscriber_count()
    }
}

impl<U: Clone + 'static> ReadCell for Derived<U> {
    type Value = U;

    fn snapshot(&self) -> U {
        self.get()
    }

    fn watch_value(&self, f: Box<dyn Fn(&U)>, policy: PanicPolicy) -> Subscription {
        self.output.subscribe_with_policy(f, policy)
    }

    fn reader(&self) -> Box<dyn Fn() -> Option<U>> {
        self.output.reader()
    }
}

/// Store `value` into `output`, honoring an optional output equality.
fn publish<U: Clone + 'static>(output: &Observable<U>, value: U, output_eq: Option<&EqFn<U>>) {
    match output_eq {
        Some(eq) => {
            output.set_with(value, |a, b| eq(a, b));
        }
        None => output.set(value),
    }
}

/// Derive a cell from one source.
///
/// # Example
///
/// ```
/// use lumen_runtime::reactive::{MapOptions, Observable, map};
///
/// let x = Observable::new(0);
/// let y = map(&x, |v| v * 2, MapOptions::default());
/// x.set(5);
/// assert_eq!(y.get(), 10);
/// ```
pub fn map<S, U>(
    source: &S,
    f: impl Fn(&S::Value) -> U + 'static,
    options: MapOptions<S::Value, U>,
) -> Derived<U>
where
    S: ReadCell,
    U: Clone + 'static,
{
    let initial = source.snapshot();
    let output = Observable::new(f(&initial));
    let last_input = RefCell::new(initial);
    let MapOptions {
        input_eq,
        output_eq,
    } = options;

    let target = output.downgrade();
    let read = source.reader();
    // The payload can be stale when a subscriber earlier in the same pass
    // wrote the source again, so the current value is read instead.
    let subscription = source.watch_value(
        Box::new(move |_: &S::Value| {
            let (Some(output), Some(input)) = (target.upgrade(), read()) else {
                return;
            };
            if let Some(eq) = &input_eq {
                if eq(&*last_input.borrow(), &input) {
                    return;
                }
            }
            let value = f(&input);
            last_input.replace(input);
            publish(&output, value, output_eq.as_ref());
        }),
        PanicPolicy::Propagate,
    );

    Derived {
        output,
        _subscriptions: Rc::new(vec![subscription]),
    }
}

/// Derive a cell from any number of sources.
///
/// `f` reads whatever cells it needs (typically by capturing clones of the
/// sources) and is re-run once per notification from any source.
pub fn combine<U: Clone + 'static>(
    sources: &[&dyn Source],
    f: impl Fn() -> U + 'static,
    options: CombineOptions<U>,
) -> Derived<U> {
    let initial = f();
    combine_with(sources, initial, move || Some(f()), options.output_eq)
}

/// Shared body of [`combine`] and [`combine2`]; `f` returning `None` skips
/// the recomputation.
fn combine_with<U: Clone + 'static>(
    sources: &[&dyn Source],
    initial: U,
    f: impl Fn() -> Option<U> + 'static,
    output_eq: Option<EqFn<U>>,
) -> Derived<U> {
    let output = Observable::new(initial);
    let f = Rc::new(f);

    let subscriptions = sources
        .iter()
        .map(|source| {
            let f = Rc::clone(&f);
            let output_eq = output_eq.clone();
            let target = output.downgrade();
            source.watch(
                Box::new(move || {
                    let (Some(output), Some(value)) = (target.upgrade(), f()) else {
                        return;
                    };
                    publish(&output, value, output_eq.as_ref());
                }),
                PanicPolicy::Propagate,
            )
        })
        .collect();

    Derived {
        output,
        _subscriptions: Rc::new(subscriptions),
    }
}

/// Derive a cell from two typed sources.
///
/// Neither source is kept alive by the derivation.
pub fn combine2<A, B, U>(a: &A, b: &B, f: impl Fn(&A::Value, &B::Value) -> U + 'static) -> Derived<U>
where
    A: ReadCell + 'static,
    B: ReadCell + 'static,
    U: Clone + PartialEq + 'static,
{
    let initial = f(&a.snapshot(), &b.snapshot());
    let (read_a, read_b) = (a.reader(), b.reader());
    combine_with(
        &[a as &dyn Source, b as &dyn Source],
        initial,
        move || Some(f(&read_a()?, &read_b()?)),
        CombineOptions::default().output_eq,
    )
}
