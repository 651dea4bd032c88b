#![forbid(unsafe_code)]

//! Observable cells: a value plus the subscribers interested in it.
//!
//! # Design
//!
//! [`Observable<T>`] is a cloneable handle to shared state holding the value,
//! a write counter and a [`Callbacks<T>`] list. Writes store the value,
//! release every borrow, then notify with a snapshot of the new value, so
//! subscribers are free to read or write this cell (or any other) re-entrantly.
//!
//! # Invariants
//!
//! 1. `get()` immediately after `set(v)` returns `v` (unless a subscriber
//!    wrote again during the pass; last write wins).
//! 2. `version()` increments exactly once per stored write.
//! 3. A write skipped by its equality function changes nothing and notifies
//!    nobody.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::callbacks::{Callback, Callbacks, PanicPolicy, Subscription};

struct Shared<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    callbacks: Callbacks<T>,
}

/// A shared, version-tracked value with change notification.
///
/// Cloning an `Observable` creates a new handle to the **same** cell.
pub struct Observable<T> {
    shared: Rc<Shared<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Observable");
        match self.shared.value.try_borrow() {
            Ok(value) => s.field("value", &*value),
            Err(_) => s.field("value", &"<borrowed>"),
        };
        s.field("version", &self.shared.version.get())
            .field("subscribers", &self.shared.callbacks.len())
            .finish()
    }
}

impl<T: Default + Clone + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + 'static> Observable<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            shared: Rc::new(Shared {
                value: RefCell::new(value),
                version: Cell::new(0),
                callbacks: Callbacks::new(),
            }),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.shared.value.borrow().clone()
    }

    /// Borrow the current value.
    ///
    /// # Panics
    ///
    /// Panics if `f` writes to this same cell.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.shared.value.borrow())
    }

    /// Store `value` and notify every subscriber.
    pub fn set(&self, value: T) {
        self.store(value);
        self.notify_all();
    }

    /// Store `value` unless `eq(current, value)` holds.
    ///
    /// Returns whether the value was stored (and subscribers notified).
    pub fn set_with(&self, value: T, eq: impl FnOnce(&T, &T) -> bool) -> bool {
        if eq(&*self.shared.value.borrow(), &value) {
            return false;
        }
        self.set(value);
        true
    }

    /// Mutate in place, then notify.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.shared.value.borrow_mut());
        self.shared.version.set(self.shared.version.get() + 1);
        self.notify_all();
    }

    /// Invoke every subscriber with the current value without writing.
    pub fn notify_all(&self) {
        let snapshot = self.get();
        self.shared.callbacks.call(&snapshot);
    }

    /// Register a shared callback. Returns `false` if already registered.
    pub fn subscribe(&self, callback: &Callback<T>) -> bool {
        self.shared.callbacks.add(callback)
    }

    /// Unregister a callback. Unknown callbacks are ignored.
    pub fn unsubscribe(&self, callback: &Callback<T>) -> bool {
        self.shared.callbacks.remove(callback)
    }

    /// Register a closure for as long as the returned guard lives.
    pub fn subscribe_fn(&self, f: impl Fn(&T) + 'static) -> Subscription {
        self.shared.callbacks.subscribe(f)
    }

    /// Like [`subscribe_fn`](Self::subscribe_fn), choosing how panics are
    /// handled.
    pub fn subscribe_with_policy(
        &self,
        f: impl Fn(&T) + 'static,
        policy: PanicPolicy,
    ) -> Subscription {
        self.shared.callbacks.subscribe_with_policy(f, policy)
    }

    /// Number of stored writes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.shared.version.get()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.callbacks.len()
    }

    /// Whether both handles refer to the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// A handle that does not keep the cell alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakObservable<T> {
        WeakObservable {
            shared: Rc::downgrade(&self.shared),
        }
    }

    fn store(&self, value: T) {
        let old = self.shared.value.replace(value);
        self.shared.version.set(self.shared.version.get() + 1);
        // The previous value may own cell handles; drop it with no borrow held.
        drop(old);
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Store `value` only if it differs from the current value.
    pub fn set_if_changed(&self, value: T) -> bool {
        self.set_with(value, |a, b| a == b)
    }
}

/// Non-owning handle to an [`Observable`].
pub struct WeakObservable<T> {
    shared: Weak<Shared<T>>,
}

impl<T> Clone for WeakObservable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for WeakObservable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObservable")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

impl<T> WeakObservable<T> {
    #[must_use]
    pub fn upgrade(&self) -> Option<Observable<T>> {
        self.shared.upgrade().map(|shared| Observable { shared })
    }
}

// ---------------------------------------------------------------------------
// Read-side traits
// ---------------------------------------------------------------------------

/// Read access shared by [`Observable`] and
/// [`Derived`](super::derived::Derived) cells.
pub trait ReadCell {
    type Value: Clone + 'static;

    /// Clone of the current value.
    fn snapshot(&self) -> Self::Value;

    /// Subscribe to value changes.
    fn watch_value(&self, f: Box<dyn Fn(&Self::Value)>, policy: PanicPolicy) -> Subscription;

    /// Reads the current value without keeping the cell alive.
    ///
    /// The reader returns `None` once the cell is gone. Subscribers capture
    /// this instead of a handle, which would form an `Rc` cycle with the
    /// cell's own subscriber list.
    fn reader(&self) -> Box<dyn Fn() -> Option<Self::Value>>;
}

impl<T: Clone + 'static> ReadCell for Observable<T> {
    type Value = T;

    fn snapshot(&self) -> T {
        self.get()
    }

    fn watch_value(&self, f: Box<dyn Fn(&T)>, policy: PanicPolicy) -> Subscription {
        self.subscribe_with_policy(f, policy)
    }

    fn reader(&self) -> Box<dyn Fn() -> Option<T>> {
        let weak = self.downgrade();
        Box::new(move || weak.upgrade().map(|cell| cell.get()))
    }
}

/// Type-erased change notifications, for combining cells of different types.
pub trait Source {
    fn watch(&self, on_change: Box<dyn Fn()>, policy: PanicPolicy) -> Subscription;
}

impl<C: ReadCell> Source for C {
    fn watch(&self, on_change: Box<dyn Fn()>, policy: PanicPolicy) -> Subscription {
        self.watch_value(Box::new(move |_| on_change()), policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_after_set() {
        let cell = Observable::new(1);
        cell.set(5);
        assert_eq!(cell.get(), 5);
        assert_eq!(cell.version(), 1);
    }

    #[test]
    fn plain_set_always_notifies() {
        let cell = Observable::new(3);
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let _sub = cell.subscribe_fn(move |_| c.set(c.get() + 1));

        cell.set(3);
        cell.set(3);
        assert_eq!(count.get(), 2);
        assert_eq!(cell.version(), 2);
    }

    #[test]
    fn set_with_equal_is_noop() {
        let cell = Observable::new(String::from("a"));
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let _sub = cell.subscribe_fn(move |_| c.set(c.get() + 1));

        let case_insensitive = |a: &String, b: &String| a.eq_ignore_ascii_case(b);
        assert!(!cell.set_with("A".into(), case_insensitive));
        assert_eq!(cell.get(), "a");
        assert_eq!(cell.version(), 0);
        assert_eq!(count.get(), 0);

        assert!(cell.set_with("b".into(), case_insensitive));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn set_if_changed_uses_partial_eq() {
        let cell = Observable::new(1);
        assert!(!cell.set_if_changed(1));
        assert!(cell.set_if_changed(2));
        assert_eq!(cell.version(), 1);
    }

    #[test]
    fn debug_reports_value_and_subscribers() {
        let cell = Observable::new("on");
        let _sub = cell.subscribe_fn(|_| {});
        assert_eq!(
            format!("{cell:?}"),
            "Observable { value: \"on\", version: 0, subscribers: 1 }"
        );
    }

    #[test]
    fn reader_does_not_keep_cell_alive() {
        let cell = Observable::new(7);
        let read = cell.reader();
        assert_eq!(read(), Some(7));
        cell.set(8);
        assert_eq!(read(), Some(8));
        drop(cell);
        assert_eq!(read(), None);
    }

    #[test]
    fn update_in_place() {
        let cell = Observable::new(vec![1, 2]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = cell.subscribe_fn(move |v: &Vec<i32>| s.borrow_mut().push(v.len()));
        cell.update(|v| v.push(3));
        assert_eq!(cell.get(), vec![1, 2, 3]);
        assert_eq!(*seen.borrow(), vec![3]);
        assert_eq!(cell.version(), 1);
    }

    #[test]
    fn subscribe_then_unsubscribe_before_set_means_no_calls() {
        let cell = Observable::new(0);
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let cb = Callback::new(move |_: &i32| c.set(c.get() + 1));
        assert!(cell.subscribe(&cb));
        assert!(cell.unsubscribe(&cb));
        cell.set(1);
        assert_eq!(count.get(), 0);
        assert!(!cell.unsubscribe(&cb));
    }

    #[test]
    fn subscriber_can_write_same_cell() {
        let cell = Observable::new(0);
        let handle = cell.clone();
        let _clamp = cell.subscribe_fn(move |v: &i32| {
            if *v > 10 {
                handle.set(10);
            }
        });
        cell.set(50);
        assert_eq!(cell.get(), 10);
        assert_eq!(cell.version(), 2);
    }

    #[test]
    fn notify_all_without_write() {
        let cell = Observable::new(9);
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        let _sub = cell.subscribe_fn(move |v| s.set(*v));
        cell.notify_all();
        assert_eq!(seen.get(), 9);
        assert_eq!(cell.version(), 0);
    }

    #[test]
    fn depth_first_across_cells() {
        let a = Observable::new(0);
        let b = Observable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let (b2, l1) = (b.clone(), Rc::clone(&log));
        let _a1 = a.subscribe_fn(move |v| {
            l1.borrow_mut().push("a1");
            b2.set(*v);
        });
        let l2 = Rc::clone(&log);
        let _a2 = a.subscribe_fn(move |_| l2.borrow_mut().push("a2"));
        let l3 = Rc::clone(&log);
        let _b1 = b.subscribe_fn(move |_| l3.borrow_mut().push("b1"));

        a.set(1);
        assert_eq!(*log.borrow(), vec!["a1", "b1", "a2"]);
    }

    #[test]
    fn clones_share_state() {
        let a = Observable::new(1);
        let b = a.clone();
        b.set(2);
        assert_eq!(a.get(), 2);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Observable::new(2)));
    }

    #[test]
    fn weak_handle_does_not_keep_alive() {
        let cell = Observable::new(1);
        let weak = cell.downgrade();
        assert!(weak.upgrade().is_some());
        drop(cell);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn source_trait_erases_type() {
        let cell = Observable::new(1.5_f64);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sources: Vec<&dyn Source> = vec![&cell];
        let _sub = sources[0].watch(Box::new(move || h.set(h.get() + 1)), PanicPolicy::Isolate);
        cell.set(2.5);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn debug_shows_value_and_version() {
        let cell = Observable::new(42);
        cell.set(43);
        let dbg = format!("{cell:?}");
        assert!(dbg.contains("43"));
        assert!(dbg.contains("version: 1"));
    }
}
