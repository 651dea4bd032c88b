#![forbid(unsafe_code)]

//! A single named, timed, eased animation sequence.
//!
//! Tracks are plain descriptions: an id, a duration, an easing curve, a
//! start condition and a frame callback. They only run once submitted to a
//! [`Timeline`](super::Timeline).
//!
//! # Usage
//!
//! ```
//! use lumen_core::animation::{EASE_OUT, Track};
//! use web_time::Duration;
//!
//! let fade = Track::new("fade", Duration::from_millis(300))
//!     .easing(EASE_OUT)
//!     .on_frame(|p| println!("opacity {p}"));
//! let slide = Track::new("slide", Duration::from_millis(200))
//!     .after("fade", Duration::from_millis(50));
//! assert_eq!(slide.dependency().map(|id| id.as_str()), Some("fade"));
//! # let _ = fade;
//! ```

use std::borrow::Borrow;
use std::fmt;
use web_time::Duration;

use super::{Easing, Linear};

/// Identifier of a track, unique within one batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(String);

impl TrackId {
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for TrackId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// When a track leaves `Pending`.
#[derive(Debug, Clone, PartialEq)]
pub enum StartCondition {
    /// On the first frame of the batch.
    Immediate,
    /// `delay` after `track` completes.
    AfterComplete { track: TrackId, delay: Duration },
    /// Once `track` has run for `progress` (in `[0, 1]`) of its duration.
    ///
    /// The point is measured in linear time, not eased output, so it is
    /// well defined for overshoot curves.
    AtProgress { track: TrackId, progress: f64 },
}

impl StartCondition {
    /// The track this condition waits on, if any.
    #[must_use]
    pub fn dependency(&self) -> Option<&TrackId> {
        match self {
            Self::Immediate => None,
            Self::AfterComplete { track, .. } | Self::AtProgress { track, .. } => Some(track),
        }
    }
}

/// Lifecycle of a track within one playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackState {
    Pending,
    Running,
    Complete,
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Complete => "complete",
        })
    }
}

/// A named animation sequence.
pub struct Track {
    id: TrackId,
    duration: Duration,
    easing: Box<dyn Easing>,
    start: StartCondition,
    on_frame: Box<dyn FnMut(f64)>,
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.id)
            .field("duration", &self.duration)
            .field("start", &self.start)
            .finish_non_exhaustive()
    }
}

impl Track {
    /// A linear, immediately-starting track with no frame callback.
    #[must_use]
    pub fn new(id: impl Into<TrackId>, duration: Duration) -> Self {
        Self {
            id: id.into(),
            duration,
            easing: Box::new(Linear),
            start: StartCondition::Immediate,
            on_frame: Box::new(|_| {}),
        }
    }

    /// Set the easing curve (builder pattern).
    #[must_use]
    pub fn easing(mut self, easing: impl Easing + 'static) -> Self {
        self.easing = Box::new(easing);
        self
    }

    /// Set the start condition (builder pattern).
    #[must_use]
    pub fn start(mut self, start: StartCondition) -> Self {
        self.start = start;
        self
    }

    /// Start `delay` after `track` completes.
    #[must_use]
    pub fn after(self, track: impl Into<TrackId>, delay: Duration) -> Self {
        self.start(StartCondition::AfterComplete {
            track: track.into(),
            delay,
        })
    }

    /// Start once `track` has run for `progress` of its duration.
    #[must_use]
    pub fn at_progress(self, track: impl Into<TrackId>, progress: f64) -> Self {
        self.start(StartCondition::AtProgress {
            track: track.into(),
            progress,
        })
    }

    /// Set the per-frame callback, invoked with eased progress.
    #[must_use]
    pub fn on_frame(mut self, on_frame: impl FnMut(f64) + 'static) -> Self {
        self.on_frame = Box::new(on_frame);
        self
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &TrackId {
        &self.id
    }

    #[inline]
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[inline]
    #[must_use]
    pub fn start_condition(&self) -> &StartCondition {
        &self.start
    }

    /// The track this one waits on, if any.
    #[inline]
    #[must_use]
    pub fn dependency(&self) -> Option<&TrackId> {
        self.start.dependency()
    }

    #[inline]
    pub(crate) fn eased(&self, raw: f64) -> f64 {
        self.easing.ease(raw)
    }

    #[inline]
    pub(crate) fn deliver(&mut self, progress: f64) {
        (self.on_frame)(progress);
    }
}
