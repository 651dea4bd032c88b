#![forbid(unsafe_code)]

//! Ordered subscriber lists with snapshot notification.
//!
//! [`Callbacks<E>`] is the building block every cell notifies through. A
//! notification pass copies the subscriber list first, then invokes each
//! entry that is still registered when it is reached, with no borrow held.
//!
//! # Invariants
//!
//! 1. Insertion order is notification order.
//! 2. The same [`Callback`] (same allocation) is registered at most once.
//! 3. Entries added during a pass are skipped by that pass.
//! 4. Entries removed during a pass are skipped if not yet reached.
//! 5. Registry entries are dropped only after the registry borrow is
//!    released, so a callback's captured state may touch the registry in its
//!    own `Drop`.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use tracing::error;

/// Nested notification passes allowed before a debug build panics.
pub const MAX_NOTIFY_DEPTH: usize = 256;

thread_local! {
    static NOTIFY_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Tracks nesting of notification passes on this thread.
struct DepthGuard;

impl DepthGuard {
    fn enter() -> Self {
        let depth = NOTIFY_DEPTH.with(Cell::get);
        if cfg!(debug_assertions) && depth >= MAX_NOTIFY_DEPTH {
            panic!(
                "notification depth exceeded {MAX_NOTIFY_DEPTH}: cells are probably \
                 setting each other in a cycle"
            );
        }
        NOTIFY_DEPTH.with(|d| d.set(depth + 1));
        Self
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        NOTIFY_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// What a notification pass does when a subscriber panics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PanicPolicy {
    /// Log the panic and continue. Used for ordinary subscribers.
    #[default]
    Isolate,
    /// Finish the pass, then re-raise the first such panic to the caller.
    /// Used by derivations so mapping failures reach whoever called `set`.
    Propagate,
}

/// A shared subscriber function. Identity is the allocation, not the code.
pub struct Callback<E>(Rc<dyn Fn(&E)>);

impl<E> Callback<E> {
    pub fn new(f: impl Fn(&E) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Whether both handles point at the same function allocation.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }

    #[inline]
    pub fn call(&self, payload: &E) {
        (self.0)(payload);
    }
}

impl<E> Clone for Callback<E> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<E> fmt::Debug for Callback<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback")
            .field(&Rc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

struct Entry<E> {
    id: u64,
    callback: Callback<E>,
    policy: PanicPolicy,
}

struct Registry<E> {
    entries: Vec<Entry<E>>,
    next_id: u64,
}

impl<E> Registry<E> {
    fn push(&mut self, callback: Callback<E>, policy: PanicPolicy) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            callback,
            policy,
        });
        id
    }

    fn take(&mut self, id: u64) -> Option<Entry<E>> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }
}

/// An ordered, de-duplicated list of subscribers for payloads of type `E`.
///
/// Cloning yields another handle to the same list.
pub struct Callbacks<E> {
    registry: Rc<RefCell<Registry<E>>>,
}

impl<E> Clone for Callbacks<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<E> Default for Callbacks<E> {
    fn default() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                entries: Vec::new(),
                next_id: 0,
            })),
        }
    }
}

impl<E> fmt::Debug for Callbacks<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("len", &self.len())
            .finish()
    }
}

impl<E> Callbacks<E> {
    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.borrow().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: 'static> Callbacks<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`. Returns `false` if it is already registered.
    pub fn add(&self, callback: &Callback<E>) -> bool {
        let mut registry = self.registry.borrow_mut();
        if registry.entries.iter().any(|e| e.callback.ptr_eq(callback)) {
            return false;
        }
        registry.push(callback.clone(), PanicPolicy::Isolate);
        true
    }

    /// Unregister `callback`. Returns `false` if it was not registered.
    pub fn remove(&self, callback: &Callback<E>) -> bool {
        let removed = {
            let mut registry = self.registry.borrow_mut();
            let id = registry
                .entries
                .iter()
                .find(|e| e.callback.ptr_eq(callback))
                .map(|e| e.id);
            id.and_then(|id| registry.take(id))
        };
        removed.is_some()
    }

    /// Whether `callback` is registered.
    #[must_use]
    pub fn contains(&self, callback: &Callback<E>) -> bool {
        self.registry
            .borrow()
            .entries
            .iter()
            .any(|e| e.callback.ptr_eq(callback))
    }

    /// Register a closure for as long as the returned guard lives.
    pub fn subscribe(&self, f: impl Fn(&E) + 'static) -> Subscription {
        self.subscribe_with_policy(f, PanicPolicy::Isolate)
    }

    /// Like [`subscribe`](Self::subscribe), choosing how panics are handled.
    pub fn subscribe_with_policy(
        &self,
        f: impl Fn(&E) + 'static,
        policy: PanicPolicy,
    ) -> Subscription {
        let id = self.registry.borrow_mut().push(Callback::new(f), policy);
        let registry = Rc::downgrade(&self.registry);
        Subscription::new(move || remove_by_id(&registry, id))
    }

    /// Invoke every subscriber registered at the start of the pass.
    ///
    /// # Panics
    ///
    /// Re-raises the first panic from a [`PanicPolicy::Propagate`]
    /// subscriber after the pass completes. In debug builds, panics when
    /// more than [`MAX_NOTIFY_DEPTH`] passes are nested.
    pub fn call(&self, payload: &E) {
        let _depth = DepthGuard::enter();
        let snapshot: Vec<(u64, Callback<E>, PanicPolicy)> = self
            .registry
            .borrow()
            .entries
            .iter()
            .map(|e| (e.id, e.callback.clone(), e.policy))
            .collect();

        let mut propagated: Option<Box<dyn Any + Send>> = None;
        for (id, callback, policy) in snapshot {
            if !self.is_registered(id) {
                continue;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback.call(payload)));
            if let Err(payload) = outcome {
                match policy {
                    PanicPolicy::Isolate => {
                        error!(
                            target: "lumen_runtime::reactive",
                            subscriber_id = id,
                            panic = %panic_message(payload.as_ref()),
                            "subscriber panicked during notification"
                        );
                    }
                    PanicPolicy::Propagate => {
                        propagated.get_or_insert(payload);
                    }
                }
            }
        }

        if let Some(payload) = propagated {
            panic::resume_unwind(payload);
        }
    }

    fn is_registered(&self, id: u64) -> bool {
        self.registry.borrow().entries.iter().any(|e| e.id == id)
    }
}

fn remove_by_id<E>(registry: &Weak<RefCell<Registry<E>>>, id: u64) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let removed = registry.borrow_mut().take(id);
    drop(removed);
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_owned()
    }
}

/// RAII guard for a registered subscriber.
///
/// Dropping the guard unsubscribes. Use [`detach`](Self::detach) to keep the
/// subscriber registered for the lifetime of the source instead.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    remover: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(remover: impl FnOnce() + 'static) -> Self {
        Self {
            remover: Some(Box::new(remover)),
        }
    }

    /// Unsubscribe now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Leave the subscriber registered; it is dropped with its source.
    pub fn detach(mut self) {
        self.remover = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(remove) = self.remover.take() {
            remove();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remover.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn counter() -> (Rc<Cell<u32>>, Callback<i32>) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        (count, Callback::new(move |_: &i32| c.set(c.get() + 1)))
    }

    #[test]
    fn add_is_identity_deduplicated() {
        let callbacks = Callbacks::new();
        let (count, cb) = counter();
        assert!(callbacks.add(&cb));
        assert!(!callbacks.add(&cb.clone()));
        assert_eq!(callbacks.len(), 1);

        callbacks.call(&1);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn distinct_allocations_of_same_code_are_distinct() {
        let callbacks = Callbacks::new();
        let (_, a) = counter();
        let (_, b) = counter();
        assert!(callbacks.add(&a));
        assert!(callbacks.add(&b));
        assert_eq!(callbacks.len(), 2);
    }

    #[test]
    fn remove_non_member_is_noop() {
        let callbacks = Callbacks::<i32>::new();
        let (_, cb) = counter();
        assert!(!callbacks.remove(&cb));
        assert!(callbacks.add(&cb));
        assert!(callbacks.remove(&cb));
        assert!(!callbacks.contains(&cb));
    }

    #[test]
    fn registration_order_is_call_order() {
        let callbacks = Callbacks::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let subs: Vec<_> = (0..4)
            .map(|i| {
                let log = Rc::clone(&log);
                callbacks.subscribe(move |v: &i32| log.borrow_mut().push((i, *v)))
            })
            .collect();
        callbacks.call(&7);
        assert_eq!(*log.borrow(), vec![(0, 7), (1, 7), (2, 7), (3, 7)]);
        drop(subs);
        assert!(callbacks.is_empty());
    }

    #[test]
    fn added_during_pass_waits_for_next_pass() {
        let callbacks = Callbacks::new();
        let (late_count, late) = counter();
        let cbs = callbacks.clone();
        let late_clone = late.clone();
        let _sub = callbacks.subscribe(move |_: &i32| {
            cbs.add(&late_clone);
        });

        callbacks.call(&1);
        assert_eq!(late_count.get(), 0);
        callbacks.call(&2);
        assert_eq!(late_count.get(), 1);
    }

    #[test]
    fn removed_during_pass_is_skipped() {
        let callbacks = Callbacks::new();
        let (victim_count, victim) = counter();
        let cbs = callbacks.clone();
        let victim_clone = victim.clone();
        let _remover = callbacks.subscribe(move |_: &i32| {
            cbs.remove(&victim_clone);
        });
        callbacks.add(&victim);

        callbacks.call(&1);
        assert_eq!(victim_count.get(), 0);
    }

    #[test]
    fn subscription_drop_unsubscribes() {
        let callbacks = Callbacks::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let sub = callbacks.subscribe(move |_: &i32| c.set(c.get() + 1));
        callbacks.call(&1);
        sub.unsubscribe();
        callbacks.call(&2);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn detached_subscription_stays() {
        let callbacks = Callbacks::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        callbacks
            .subscribe(move |_: &i32| c.set(c.get() + 1))
            .detach();
        callbacks.call(&1);
        callbacks.call(&2);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn subscription_outliving_registry_is_harmless() {
        let callbacks = Callbacks::<i32>::new();
        let sub = callbacks.subscribe(|_| {});
        drop(callbacks);
        drop(sub);
    }

    #[test]
    #[traced_test]
    fn isolated_panic_is_logged_and_pass_continues() {
        let callbacks = Callbacks::new();
        let _bad = callbacks.subscribe(|_: &i32| panic!("subscriber exploded"));
        let (count, cb) = counter();
        callbacks.add(&cb);

        callbacks.call(&1);
        assert_eq!(count.get(), 1);
        assert!(logs_contain("subscriber panicked during notification"));
        assert!(logs_contain("subscriber exploded"));
    }

    #[test]
    fn propagated_panic_resumes_after_pass() {
        let callbacks = Callbacks::new();
        let _bad =
            callbacks.subscribe_with_policy(|_: &i32| panic!("derive failed"), PanicPolicy::Propagate);
        let (count, cb) = counter();
        callbacks.add(&cb);

        let result = panic::catch_unwind(AssertUnwindSafe(|| callbacks.call(&1)));
        let payload = result.unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "derive failed");
        assert_eq!(count.get(), 1, "later subscribers still ran");
    }

    #[test]
    fn depth_counter_resets_after_panic() {
        let callbacks = Callbacks::new();
        let _bad =
            callbacks.subscribe_with_policy(|_: &i32| panic!("boom"), PanicPolicy::Propagate);
        let _ = panic::catch_unwind(AssertUnwindSafe(|| callbacks.call(&1)));
        assert_eq!(NOTIFY_DEPTH.with(Cell::get), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    fn runaway_recursion_is_cut_off_in_debug() {
        let callbacks = Callbacks::new();
        let cbs = callbacks.clone();
        let calls = Rc::new(Cell::new(0usize));
        let c = Rc::clone(&calls);
        let _sub = callbacks.subscribe_with_policy(
            move |v: &i32| {
                c.set(c.get() + 1);
                cbs.call(v);
            },
            PanicPolicy::Propagate,
        );

        let result = panic::catch_unwind(AssertUnwindSafe(|| callbacks.call(&1)));
        let payload = result.unwrap_err();
        assert!(panic_message(payload.as_ref()).contains("notification depth exceeded"));
        assert_eq!(calls.get(), MAX_NOTIFY_DEPTH);
        assert_eq!(NOTIFY_DEPTH.with(Cell::get), 0);
    }

    #[test]
    fn debug_and_len_work_for_any_payload() {
        fn describe<E>(callbacks: &Callbacks<E>) -> String {
            format!("{callbacks:?} empty={}", callbacks.is_empty())
        }
        let callbacks: Callbacks<i32> = Callbacks::new();
        let _sub = callbacks.subscribe(|_| {});
        assert_eq!(describe(&callbacks), "Callbacks { len: 1 } empty=false");
    }

    #[test]
    fn panic_message_variants() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "<non-string panic payload>");
    }
}
