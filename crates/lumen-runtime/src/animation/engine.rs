#![forbid(unsafe_code)]

//! Frame-driven playback of track batches.
//!
//! [`AnimationEngine`] plays one [`Timeline`] batch at a time. `play`
//! validates the batch synchronously, pre-empts whatever was playing and
//! requests a frame; every frame advances the timeline and requests the next
//! one until all tracks are complete.
//!
//! # Invariants
//!
//! 1. At most one batch is active. A pre-empted batch's tracks never receive
//!    another frame, even when pre-emption happens from inside one of its
//!    own frame callbacks.
//! 2. `playing()` is `true` from `play` until the batch completes or is
//!    stopped.
//! 3. A rejected batch leaves the active batch untouched.
//! 4. No engine borrow is held while track callbacks run, so callbacks may
//!    call `play` or `stop` on the same engine.
//! 5. A track callback that panics aborts its batch: the panic is logged and
//!    `playing()` goes back to `false`.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use lumen_core::animation::{Timeline, TimelineError, Track, TrackState};
use tracing::{debug, error, trace, warn};
use web_time::Instant;

use crate::frame::{FrameRequestId, FrameSource};
use crate::reactive::Observable;
use crate::reactive::callbacks::panic_message;

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Name recorded on every log event from this engine.
    pub label: String,
    /// Emit a `trace` event for every frame.
    pub trace_frames: bool,
    /// Abort a batch after this many consecutive frames whose timestamp did
    /// not move forward.
    pub stall_frame_limit: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            label: "animation".to_owned(),
            trace_frames: false,
            stall_frame_limit: None,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_trace_frames(mut self, enabled: bool) -> Self {
        self.trace_frames = enabled;
        self
    }

    #[must_use]
    pub fn with_stall_frame_limit(mut self, limit: Option<u32>) -> Self {
        self.stall_frame_limit = limit;
        self
    }
}

/// Identifies one call to [`AnimationEngine::play`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(u64);

impl BatchId {
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch#{}", self.0)
    }
}

struct ActiveBatch {
    id: BatchId,
    /// `None` while a frame is advancing it.
    timeline: Option<Timeline>,
    request: Option<FrameRequestId>,
    last_frame_at: Option<Instant>,
    stalled_frames: u32,
    /// Set once the batch is replaced or stopped; read mid-advance.
    discarded: Rc<Cell<bool>>,
}

impl ActiveBatch {
    fn discard(self) -> Option<FrameRequestId> {
        self.discarded.set(true);
        self.request
    }
}

struct EngineInner {
    config: EngineConfig,
    frames: Rc<dyn FrameSource>,
    active: Option<ActiveBatch>,
    next_batch: u64,
    playing: Observable<bool>,
}

/// What a frame decided once the timeline had advanced.
enum FrameOutcome {
    Continue,
    Complete,
    Stalled(u32),
    Superseded,
}

/// Plays batches of tracks on a [`FrameSource`].
///
/// Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct AnimationEngine {
    inner: Rc<RefCell<EngineInner>>,
}

impl fmt::Debug for AnimationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("AnimationEngine")
            .field("label", &inner.config.label)
            .field("active", &inner.active.as_ref().map(|a| a.id))
            .field("playing", &inner.playing.get())
            .finish()
    }
}

impl AnimationEngine {
    #[must_use]
    pub fn new(frames: Rc<dyn FrameSource>, config: EngineConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(EngineInner {
                config,
                frames,
                active: None,
                next_batch: 0,
                playing: Observable::new(false),
            })),
        }
    }

    /// Validate `tracks` and start playing them from the next frame.
    ///
    /// Any batch already playing is discarded first. Start conditions may
    /// only name tracks in this batch; a name from an earlier batch is an
    /// [`TimelineError::UnknownDependency`].
    pub fn play(&self, tracks: Vec<Track>) -> Result<BatchId, TimelineError> {
        let count = tracks.len();
        let timeline = match Timeline::new(tracks) {
            Ok(timeline) => timeline,
            Err(err) => {
                warn!(
                    engine = %self.inner.borrow().config.label,
                    error = %err,
                    "rejected animation batch"
                );
                return Err(err);
            }
        };

        let (id, previous, frames, playing) = {
            let mut inner = self.inner.borrow_mut();
            let id = BatchId(inner.next_batch);
            inner.next_batch += 1;
            let previous = inner.active.replace(ActiveBatch {
                id,
                timeline: Some(timeline),
                request: None,
                last_frame_at: None,
                stalled_frames: 0,
                discarded: Rc::new(Cell::new(false)),
            });
            if let Some(previous) = &previous {
                debug!(
                    engine = %inner.config.label,
                    previous_batch = %previous.id,
                    batch = %id,
                    "pre-empting animation batch"
                );
            }
            debug!(engine = %inner.config.label, batch = %id, tracks = count, "playing animation batch");
            (id, previous, Rc::clone(&inner.frames), inner.playing.clone())
        };

        if let Some(request) = previous.and_then(ActiveBatch::discard) {
            frames.cancel_frame(request);
        }

        playing.set_if_changed(true);
        self.request_frame(id);
        Ok(id)
    }

    /// Discard the active batch. Returns whether one was playing.
    pub fn stop(&self) -> bool {
        let (previous, frames, playing) = {
            let mut inner = self.inner.borrow_mut();
            let previous = inner.active.take();
            if let Some(previous) = &previous {
                debug!(engine = %inner.config.label, batch = %previous.id, "stopped animation batch");
            }
            (previous, Rc::clone(&inner.frames), inner.playing.clone())
        };
        let Some(previous) = previous else {
            return false;
        };
        if let Some(request) = previous.discard() {
            frames.cancel_frame(request);
        }
        playing.set_if_changed(false);
        true
    }

    /// `true` while a batch is playing.
    #[must_use]
    pub fn playing(&self) -> Observable<bool> {
        self.inner.borrow().playing.clone()
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.inner.borrow().playing.get()
    }

    #[must_use]
    pub fn active_batch(&self) -> Option<BatchId> {
        self.inner.borrow().active.as_ref().map(|a| a.id)
    }

    /// State of a track in the active batch.
    ///
    /// `None` for unknown tracks, and while the batch's frame is running.
    #[must_use]
    pub fn track_state(&self, id: &str) -> Option<TrackState> {
        let inner = self.inner.borrow();
        inner.active.as_ref()?.timeline.as_ref()?.state(id)
    }

    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.inner.borrow().config.clone()
    }

    fn request_frame(&self, id: BatchId) {
        let frames = Rc::clone(&self.inner.borrow().frames);
        let engine: Weak<RefCell<EngineInner>> = Rc::downgrade(&self.inner);
        let request = frames.request_frame(Box::new(move |now| {
            if let Some(inner) = engine.upgrade() {
                AnimationEngine { inner }.on_frame(id, now);
            }
        }));

        let accepted = match self.inner.borrow_mut().active.as_mut() {
            Some(active) if active.id == id => {
                active.request = Some(request);
                true
            }
            _ => false,
        };
        if !accepted {
            frames.cancel_frame(request);
        }
    }

    fn on_frame(&self, id: BatchId, now: Instant) {
        let taken = {
            let mut inner = self.inner.borrow_mut();
            match inner.active.as_mut() {
                Some(active) if active.id == id => {
                    active.request = None;
                    active
                        .timeline
                        .take()
                        .map(|timeline| (timeline, Rc::clone(&active.discarded)))
                }
                _ => None,
            }
        };
        let Some((mut timeline, discarded)) = taken else {
            return;
        };

        // Track callbacks run here and may re-enter the engine.
        let advanced = panic::catch_unwind(AssertUnwindSafe(|| {
            timeline.advance_until(now, || discarded.get())
        }));
        let report = match advanced {
            Ok(report) => report,
            Err(payload) => {
                drop(timeline);
                self.abort_after_panic(id, payload.as_ref());
                return;
            }
        };

        let (outcome, label, trace_frames, playing) = {
            let mut inner = self.inner.borrow_mut();
            let label = inner.config.label.clone();
            let trace_frames = inner.config.trace_frames;
            let stall_limit = inner.config.stall_frame_limit;
            let playing = inner.playing.clone();

            let outcome = match inner.active.as_mut() {
                Some(active) if active.id == id => {
                    if active.last_frame_at.is_some_and(|last| now <= last) {
                        active.stalled_frames += 1;
                    } else {
                        active.stalled_frames = 0;
                    }
                    active.last_frame_at = Some(now);

                    if timeline.is_complete() {
                        FrameOutcome::Complete
                    } else if stall_limit.is_some_and(|limit| active.stalled_frames >= limit) {
                        FrameOutcome::Stalled(active.stalled_frames)
                    } else {
                        active.timeline = Some(timeline);
                        FrameOutcome::Continue
                    }
                }
                _ => FrameOutcome::Superseded,
            };
            if matches!(outcome, FrameOutcome::Complete | FrameOutcome::Stalled(_)) {
                inner.active = None;
            }
            (outcome, label, trace_frames, playing)
        };

        if trace_frames {
            trace!(
                engine = %label,
                batch = %id,
                delivered = report.delivered,
                started = report.started,
                completed = report.completed,
                "animation frame"
            );
        }

        match outcome {
            FrameOutcome::Continue => self.request_frame(id),
            FrameOutcome::Complete => {
                debug!(engine = %label, batch = %id, "animation batch complete");
                playing.set_if_changed(false);
            }
            FrameOutcome::Stalled(frames) => {
                warn!(
                    engine = %label,
                    batch = %id,
                    stalled_frames = frames,
                    "aborting animation batch: frame time is not advancing"
                );
                playing.set_if_changed(false);
            }
            FrameOutcome::Superseded => {}
        }
    }

    /// Drop batch `id` after one of its track callbacks panicked.
    fn abort_after_panic(&self, id: BatchId, payload: &(dyn Any + Send)) {
        let (aborted, label, playing) = {
            let mut inner = self.inner.borrow_mut();
            // A callback may have replaced the batch before panicking.
            let aborted = inner.active.as_ref().is_some_and(|a| a.id == id);
            if aborted {
                inner.active = None;
            }
            (aborted, inner.config.label.clone(), inner.playing.clone())
        };
        error!(
            engine = %label,
            batch = %id,
            panic = %panic_message(payload),
            "track callback panicked; aborting animation batch"
        );
        if aborted {
            playing.set_if_changed(false);
        }
    }
}
