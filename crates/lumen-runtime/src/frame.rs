#![forbid(unsafe_code)]

//! Display-frame scheduling.
//!
//! The animation layer's only dependency on the host is a way to run a
//! callback on the next display frame and to cancel that request. Hosts
//! implement [`FrameSource`] over their own vsync or timer primitive;
//! [`ManualFrameSource`] is a deterministic implementation for tests and
//! headless use, driven by a [`LabClock`].

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;

use lumen_core::clock::LabClock;
use web_time::{Duration, Instant};

/// Work to run on a display frame, given the frame timestamp.
pub type FrameCallback = Box<dyn FnOnce(Instant)>;

/// Handle for cancelling a frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRequestId(u64);

impl FrameRequestId {
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Per-display-frame callback registration.
///
/// Each request fires at most once, on a later frame than the one it was
/// requested from.
pub trait FrameSource {
    /// Run `callback` on the next frame.
    fn request_frame(&self, callback: FrameCallback) -> FrameRequestId;

    /// Drop a request that has not fired yet. Unknown ids are ignored.
    fn cancel_frame(&self, id: FrameRequestId);

    /// Current time on this source's clock.
    fn now(&self) -> Instant;
}

/// A frame source that fires only when told to.
///
/// `advance(dt)` moves the clock and then fires every request that was
/// pending when it was called. Requests made while firing wait for the next
/// `advance`.
pub struct ManualFrameSource {
    clock: LabClock,
    pending: RefCell<Vec<(FrameRequestId, FrameCallback)>>,
    firing: RefCell<VecDeque<(FrameRequestId, FrameCallback)>>,
    next_id: Cell<u64>,
    frames: Cell<u64>,
}

impl fmt::Debug for ManualFrameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualFrameSource")
            .field("elapsed", &self.clock.elapsed())
            .field("pending", &self.pending_count())
            .field("frames", &self.frames.get())
            .finish()
    }
}

impl Default for ManualFrameSource {
    fn default() -> Self {
        Self::new(LabClock::new())
    }
}

impl ManualFrameSource {
    #[must_use]
    pub fn new(clock: LabClock) -> Self {
        Self {
            clock,
            pending: RefCell::new(Vec::new()),
            firing: RefCell::new(VecDeque::new()),
            next_id: Cell::new(0),
            frames: Cell::new(0),
        }
    }

    #[must_use]
    pub fn clock(&self) -> &LabClock {
        &self.clock
    }

    /// Requests waiting for the next frame.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Frames fired so far.
    #[must_use]
    pub fn frames_fired(&self) -> u64 {
        self.frames.get()
    }

    /// Move the clock forward by `dt`, then fire a frame.
    ///
    /// Returns the number of callbacks run.
    pub fn advance(&self, dt: Duration) -> usize {
        self.clock.advance(dt);
        self.fire()
    }

    /// Fire a frame at the current clock time.
    pub fn fire(&self) -> usize {
        let now = self.clock.now();
        {
            let mut pending = self.pending.borrow_mut();
            self.firing.borrow_mut().extend(pending.drain(..));
        }
        self.frames.set(self.frames.get() + 1);

        let mut ran = 0;
        loop {
            let next = self.firing.borrow_mut().pop_front();
            let Some((_, callback)) = next else {
                break;
            };
            callback(now);
            ran += 1;
        }
        ran
    }

    /// Advance by `dt` until nothing is pending or `max_frames` have fired.
    ///
    /// Returns the number of frames fired.
    pub fn run_until_idle(&self, dt: Duration, max_frames: usize) -> usize {
        let mut fired = 0;
        while fired < max_frames && self.pending_count() > 0 {
            self.advance(dt);
            fired += 1;
        }
        fired
    }
}

impl FrameSource for ManualFrameSource {
    fn request_frame(&self, callback: FrameCallback) -> FrameRequestId {
        let id = FrameRequestId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.pending.borrow_mut().push((id, callback));
        id
    }

    fn cancel_frame(&self, id: FrameRequestId) {
        let removed = {
            let mut pending = self.pending.borrow_mut();
            pending
                .iter()
                .position(|(i, _)| *i == id)
                .map(|index| pending.remove(index))
        };
        let removed = removed.or_else(|| {
            let mut firing = self.firing.borrow_mut();
            firing
                .iter()
                .position(|(i, _)| *i == id)
                .and_then(|index| firing.remove(index))
        });
        // Captured state may request or cancel frames when dropped.
        drop(removed);
    }

    fn now(&self) -> Instant {
        self.clock.now()
    }
}
