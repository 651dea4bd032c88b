#![forbid(unsafe_code)]

//! Timeline: one validated batch of tracks advanced frame by frame.
//!
//! A [`Timeline`] owns a batch of [`Track`]s, checks up front that every
//! start condition can be satisfied, and then advances all tracks from
//! timestamps supplied by the caller (normally a display-frame callback).
//!
//! # Usage
//!
//! ```
//! use lumen_core::animation::{Timeline, Track, TrackState};
//! use web_time::{Duration, Instant};
//!
//! let mut timeline = Timeline::new(vec![
//!     Track::new("fade_in", Duration::from_millis(300)),
//!     Track::new("slide", Duration::from_millis(200)).after("fade_in", Duration::ZERO),
//! ])
//! .unwrap();
//!
//! let t0 = Instant::now();
//! timeline.advance(t0);
//! timeline.advance(t0 + Duration::from_millis(300));
//! assert_eq!(timeline.state("fade_in"), Some(TrackState::Complete));
//! assert_eq!(timeline.state("slide"), Some(TrackState::Running));
//! ```
//!
//! # Invariants
//!
//! 1. Track ids are unique within a timeline.
//! 2. Every dependency names a track in the same timeline, and the
//!    dependency graph is acyclic.
//! 3. Tracks are stored and advanced in topological order, so within one
//!    `advance` a dependency's final frame is delivered before any frame of
//!    a track waiting on it.
//! 4. A track's start instant is the exact instant its condition became true
//!    (not the frame that noticed it), so chained tracks do not drift.
//! 5. An empty timeline is immediately complete.
//!
//! # Failure Modes
//!
//! - Duplicate ids, unknown dependencies, cycles and out-of-range progress
//!   points are rejected by [`Timeline::new`] with a [`TimelineError`].
//! - Timestamps that go backwards never move a track's progress backwards.

use std::collections::{HashMap, VecDeque};
use web_time::{Duration, Instant};

use super::error::TimelineError;
use super::track::{StartCondition, Track, TrackId, TrackState};
use crate::logging::trace;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A track plus its playback state.
struct Slot {
    track: Track,
    /// Index of the dependency within `Timeline::slots`.
    dependency: Option<usize>,
    state: TrackState,
    started_at: Option<Instant>,
    /// Last linear progress, used to keep progress non-decreasing.
    raw: f64,
    /// Last eased progress delivered to the frame callback.
    delivered: Option<f64>,
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("id", self.track.id())
            .field("state", &self.state)
            .field("raw", &self.raw)
            .finish()
    }
}

/// What happened during one [`Timeline::advance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvanceReport {
    /// Frame callbacks invoked.
    pub delivered: usize,
    /// Tracks that moved from `Pending` to `Running`.
    pub started: usize,
    /// Tracks that moved from `Running` to `Complete`.
    pub completed: usize,
}

impl AdvanceReport {
    /// Whether any track changed state.
    #[inline]
    #[must_use]
    pub fn transitioned(&self) -> bool {
        self.started > 0 || self.completed > 0
    }
}

/// A validated batch of tracks.
pub struct Timeline {
    slots: Vec<Slot>,
    /// Instant of the first `advance`; `Immediate` tracks start here.
    origin: Option<Instant>,
}

impl std::fmt::Debug for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timeline")
            .field("count", &self.slots.len())
            .field("progress", &self.overall_progress())
            .field("complete", &self.is_complete())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl Timeline {
    /// Validate a batch and order it topologically.
    pub fn new(tracks: Vec<Track>) -> Result<Self, TimelineError> {
        let mut index: HashMap<TrackId, usize> = HashMap::with_capacity(tracks.len());
        for (i, track) in tracks.iter().enumerate() {
            if let StartCondition::AtProgress { progress, .. } = track.start_condition() {
                if !(0.0..=1.0).contains(progress) {
                    return Err(TimelineError::InvalidProgressPoint {
                        track: track.id().clone(),
                        progress: *progress,
                    });
                }
            }
            if index.insert(track.id().clone(), i).is_some() {
                return Err(TimelineError::DuplicateTrackId {
                    id: track.id().clone(),
                });
            }
        }

        let mut dependency = Vec::with_capacity(tracks.len());
        for track in &tracks {
            let resolved = match track.dependency() {
                None => None,
                Some(dep) => match index.get(dep) {
                    Some(&i) => Some(i),
                    None => {
                        return Err(TimelineError::UnknownDependency {
                            track: track.id().clone(),
                            depends_on: dep.clone(),
                        });
                    }
                },
            };
            dependency.push(resolved);
        }

        let order = topological_order(&dependency).map_err(|cycle| {
            TimelineError::CyclicDependency {
                cycle: cycle.into_iter().map(|i| tracks[i].id().clone()).collect(),
            }
        })?;

        let mut position = vec![0; tracks.len()];
        for (new, &old) in order.iter().enumerate() {
            position[old] = new;
        }

        let mut pending: Vec<Option<Track>> = tracks.into_iter().map(Some).collect();
        let slots = order
            .iter()
            .filter_map(|&old| {
                pending[old].take().map(|track| Slot {
                    track,
                    dependency: dependency[old].map(|dep| position[dep]),
                    state: TrackState::Pending,
                    started_at: None,
                    raw: 0.0,
                    delivered: None,
                })
            })
            .collect();

        Ok(Self {
            slots,
            origin: None,
        })
    }
}

/// Kahn's algorithm over a graph where each node has at most one incoming
/// edge (its dependency). Ties keep submission order.
///
/// On failure returns one cycle, in dependency order.
fn topological_order(dependency: &[Option<usize>]) -> Result<Vec<usize>, Vec<usize>> {
    let n = dependency.len();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut queue = VecDeque::new();
    for (node, dep) in dependency.iter().enumerate() {
        match dep {
            Some(dep) => dependents[*dep].push(node),
            None => queue.push_back(node),
        }
    }

    let mut order = Vec::with_capacity(n);
    let mut placed = vec![false; n];
    while let Some(node) = queue.pop_front() {
        placed[node] = true;
        order.push(node);
        queue.extend(dependents[node].iter().copied());
    }

    if order.len() == n {
        return Ok(order);
    }

    // Every unplaced node has an unplaced dependency, so following
    // dependencies from any of them must revisit a node.
    let Some(mut node) = placed.iter().position(|p| !p) else {
        return Ok(order);
    };
    let mut seen_at = vec![None; n];
    let mut path = Vec::new();
    loop {
        if let Some(at) = seen_at[node] {
            let mut cycle: Vec<usize> = path[at..].to_vec();
            cycle.reverse();
            return Err(cycle);
        }
        seen_at[node] = Some(path.len());
        path.push(node);
        match dependency[node] {
            Some(dep) => node = dep,
            None => return Err(path),
        }
    }
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

impl Timeline {
    /// Advance every track to `now`, invoking frame callbacks.
    pub fn advance(&mut self, now: Instant) -> AdvanceReport {
        self.advance_until(now, || false)
    }

    /// Like [`advance`](Self::advance), but stops before the next track once
    /// `cancelled` returns `true`.
    ///
    /// `cancelled` is checked before each track, so a frame callback that
    /// discards the batch prevents every later track from being touched in
    /// the same tick.
    pub fn advance_until(&mut self, now: Instant, cancelled: impl Fn() -> bool) -> AdvanceReport {
        let origin = *self.origin.get_or_insert(now);
        let mut report = AdvanceReport::default();

        for i in 0..self.slots.len() {
            if cancelled() {
                break;
            }
            if self.slots[i].state == TrackState::Pending {
                match self.start_instant(i, origin) {
                    Some(at) if at <= now => {
                        let slot = &mut self.slots[i];
                        slot.state = TrackState::Running;
                        slot.started_at = Some(at);
                        report.started += 1;
                        trace!(track = %slot.track.id(), from = "pending", to = "running", "track transition");
                    }
                    _ => continue,
                }
            }

            let slot = &mut self.slots[i];
            if slot.state != TrackState::Running {
                continue;
            }
            let started_at = slot.started_at.unwrap_or(now);
            let elapsed = now.saturating_duration_since(started_at);
            let duration = slot.track.duration();

            if duration.is_zero() || elapsed >= duration {
                slot.raw = 1.0;
                slot.delivered = Some(1.0);
                slot.track.deliver(1.0);
                slot.state = TrackState::Complete;
                report.delivered += 1;
                report.completed += 1;
                trace!(track = %slot.track.id(), from = "running", to = "complete", "track transition");
            } else {
                let raw = (elapsed.as_secs_f64() / duration.as_secs_f64())
                    .clamp(0.0, 1.0)
                    .max(slot.raw);
                slot.raw = raw;
                let progress = slot.track.eased(raw);
                slot.delivered = Some(progress);
                slot.track.deliver(progress);
                report.delivered += 1;
            }
        }

        report
    }

    /// The instant track `i` may start, if its condition is resolvable yet.
    ///
    /// A start instant past the end of the clock's range never arrives.
    fn start_instant(&self, i: usize, origin: Instant) -> Option<Instant> {
        let slot = &self.slots[i];
        match slot.track.start_condition() {
            StartCondition::Immediate => Some(origin),
            StartCondition::AfterComplete { delay, .. } => {
                let dep = &self.slots[slot.dependency?];
                if dep.state != TrackState::Complete {
                    return None;
                }
                dep.started_at?
                    .checked_add(dep.track.duration())?
                    .checked_add(*delay)
            }
            StartCondition::AtProgress { progress, .. } => {
                let dep = &self.slots[slot.dependency?];
                if *progress >= 1.0 && dep.state != TrackState::Complete {
                    return None;
                }
                let offset =
                    Duration::try_from_secs_f64(dep.track.duration().as_secs_f64() * progress)
                        .ok()?;
                dep.started_at?.checked_add(offset)
            }
        }
    }

    /// Return every track to `Pending` so the batch can be replayed.
    pub fn reset(&mut self) {
        self.origin = None;
        for slot in &mut self.slots {
            slot.state = TrackState::Pending;
            slot.started_at = None;
            slot.raw = 0.0;
            slot.delivered = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl Timeline {
    /// Number of tracks.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether every track is `Complete`.
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|s| s.state == TrackState::Complete)
    }

    /// State of the named track.
    #[must_use]
    pub fn state(&self, id: &str) -> Option<TrackState> {
        self.slot(id).map(|s| s.state)
    }

    /// Last eased progress delivered to the named track, if any.
    #[must_use]
    pub fn progress(&self, id: &str) -> Option<f64> {
        self.slot(id).and_then(|s| s.delivered)
    }

    /// Mean linear progress across all tracks (0.0 for an empty timeline).
    #[must_use]
    pub fn overall_progress(&self) -> f64 {
        if self.slots.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.slots.iter().map(|s| s.raw).sum();
        sum / self.slots.len() as f64
    }

    /// `(id, state)` pairs in topological order.
    pub fn iter(&self) -> impl Iterator<Item = (&TrackId, TrackState)> {
        self.slots.iter().map(|s| (s.track.id(), s.state))
    }

    /// Track ids in topological order.
    pub fn ids(&self) -> impl Iterator<Item = &TrackId> {
        self.slots.iter().map(|s| s.track.id())
    }

    fn slot(&self, id: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.track.id().as_str() == id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
