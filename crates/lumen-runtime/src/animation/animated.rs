#![forbid(unsafe_code)]

//! Values that glide toward a target.
//!
//! An [`AnimatedValue<T>`] keeps two cells: `target`, written by the caller,
//! and `rendered`, which follows the target over time. Each
//! [`BezierAnimator`] owns one numeric field of `T` (via a getter/setter
//! pair) and eases it from the currently rendered value to the target's
//! value whenever the target changes. Fields no animator covers follow the
//! target immediately.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use lumen_core::animation::{BezierAnimation, CubicBezier, EASE};
use web_time::{Duration, Instant};

use crate::frame::{FrameRequestId, FrameSource};
use crate::reactive::{Observable, Subscription};

/// Default duration for a [`BezierAnimator`].
pub const DEFAULT_ANIMATION_DURATION: Duration = Duration::from_millis(350);

/// Animates one numeric field of `T`.
pub struct BezierAnimator<T> {
    ease: CubicBezier,
    duration: Duration,
    get: Rc<dyn Fn(&T) -> f64>,
    set: Rc<dyn Fn(&mut T, f64)>,
}

impl<T> Clone for BezierAnimator<T> {
    fn clone(&self) -> Self {
        Self {
            ease: self.ease,
            duration: self.duration,
            get: Rc::clone(&self.get),
            set: Rc::clone(&self.set),
        }
    }
}

impl<T> fmt::Debug for BezierAnimator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BezierAnimator")
            .field("ease", &self.ease)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

impl<T> BezierAnimator<T> {
    /// Animate the field read by `get` and written by `set`.
    pub fn new(get: impl Fn(&T) -> f64 + 'static, set: impl Fn(&mut T, f64) + 'static) -> Self {
        Self {
            ease: EASE,
            duration: DEFAULT_ANIMATION_DURATION,
            get: Rc::new(get),
            set: Rc::new(set),
        }
    }

    #[must_use]
    pub fn ease(mut self, ease: CubicBezier) -> Self {
        self.ease = ease;
        self
    }

    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

struct Playback {
    animations: Vec<Option<BezierAnimation>>,
    request: Option<FrameRequestId>,
}

struct AnimatedInner<T> {
    target: Observable<T>,
    rendered: Observable<T>,
    animating: Observable<bool>,
    animators: Vec<BezierAnimator<T>>,
    frames: Rc<dyn FrameSource>,
    playback: RefCell<Playback>,
    /// Set while `snap_to` writes the target, so the write is not animated.
    snapping: Cell<bool>,
    target_subscription: RefCell<Option<Subscription>>,
}

/// Clears `snapping` even if a target subscriber panics.
struct SnapGuard<'a>(&'a Cell<bool>);

impl<'a> SnapGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for SnapGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<T> Drop for AnimatedInner<T> {
    fn drop(&mut self) {
        if let Some(request) = self.playback.get_mut().request.take() {
            self.frames.cancel_frame(request);
        }
    }
}

/// A value whose rendered form eases toward its target.
///
/// Cloning yields another handle to the same value.
pub struct AnimatedValue<T> {
    inner: Rc<AnimatedInner<T>>,
}

impl<T> Clone for AnimatedValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for AnimatedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimatedValue")
            .field("target", &self.inner.target)
            .field("rendered", &self.inner.rendered)
            .field("animators", &self.inner.animators.len())
            .finish()
    }
}

impl<T: Clone + 'static> AnimatedValue<T> {
    /// Start at `initial`, rendered as-is.
    pub fn new(
        initial: T,
        animators: Vec<BezierAnimator<T>>,
        frames: Rc<dyn FrameSource>,
    ) -> Self {
        let count = animators.len();
        let inner = Rc::new(AnimatedInner {
            target: Observable::new(initial.clone()),
            rendered: Observable::new(initial),
            animating: Observable::new(false),
            animators,
            frames,
            playback: RefCell::new(Playback {
                animations: vec![None; count],
                request: None,
            }),
            snapping: Cell::new(false),
            target_subscription: RefCell::new(None),
        });

        let weak = Rc::downgrade(&inner);
        let subscription = inner.target.subscribe_fn(move |target: &T| {
            if let Some(inner) = weak.upgrade() {
                retarget(&inner, target);
            }
        });
        inner.target_subscription.replace(Some(subscription));

        Self { inner }
    }

    /// The cell callers write to.
    #[must_use]
    pub fn target(&self) -> Observable<T> {
        self.inner.target.clone()
    }

    /// The cell that follows the target frame by frame.
    #[must_use]
    pub fn rendered(&self) -> Observable<T> {
        self.inner.rendered.clone()
    }

    /// `true` while any field is still moving.
    #[must_use]
    pub fn animating(&self) -> Observable<bool> {
        self.inner.animating.clone()
    }

    /// Shorthand for `target().set(value)`.
    pub fn set_target(&self, value: T) {
        self.inner.target.set(value);
    }

    /// Jump straight to `value`, discarding any animation in flight.
    pub fn snap_to(&self, value: T) {
        let request = {
            let mut playback = self.inner.playback.borrow_mut();
            playback.animations.iter_mut().for_each(|a| *a = None);
            playback.request.take()
        };
        if let Some(request) = request {
            self.inner.frames.cancel_frame(request);
        }
        {
            let _snapping = SnapGuard::enter(&self.inner.snapping);
            self.inner.target.set(value.clone());
        }
        self.inner.rendered.set(value);
        self.inner.animating.set_if_changed(false);
    }
}

fn retarget<T: Clone + 'static>(inner: &Rc<AnimatedInner<T>>, target: &T) {
    if inner.snapping.get() {
        return;
    }
    let now = inner.frames.now();
    let rendered = inner.rendered.get();
    let any_running = {
        let mut playback = inner.playback.borrow_mut();
        for (slot, animator) in playback.animations.iter_mut().zip(&inner.animators) {
            *slot = BezierAnimation::retarget(
                now,
                (animator.get)(&rendered),
                (animator.get)(target),
                slot.take(),
                animator.duration,
                animator.ease,
            );
        }
        playback.animations.iter().any(Option::is_some)
    };

    if any_running {
        inner.animating.set_if_changed(true);
        schedule(inner);
    } else {
        inner.rendered.set(target.clone());
        inner.animating.set_if_changed(false);
    }
}

fn schedule<T: Clone + 'static>(inner: &Rc<AnimatedInner<T>>) {
    if inner.playback.borrow().request.is_some() {
        return;
    }
    let weak: Weak<AnimatedInner<T>> = Rc::downgrade(inner);
    let request = inner.frames.request_frame(Box::new(move |now| {
        if let Some(inner) = weak.upgrade() {
            on_frame(&inner, now);
        }
    }));
    inner.playback.borrow_mut().request = Some(request);
}

fn on_frame<T: Clone + 'static>(inner: &Rc<AnimatedInner<T>>, now: Instant) {
    let mut value = inner.target.get();
    let done = {
        let mut playback = inner.playback.borrow_mut();
        playback.request = None;
        let mut done = true;
        for (slot, animator) in playback.animations.iter_mut().zip(&inner.animators) {
            if let Some(animation) = slot {
                (animator.set)(&mut value, animation.value_at(now));
                if animation.is_complete_at(now) {
                    *slot = None;
                } else {
                    done = false;
                }
            }
        }
        done
    };

    inner.rendered.set(value);
    if done {
        inner.animating.set_if_changed(false);
    } else {
        schedule(inner);
    }
}
