#![forbid(unsafe_code)]

//! Configuration errors for curves and timelines.
//!
//! These are programming errors in how a batch or curve was described. They
//! are reported synchronously when the value is built, never discovered later
//! as an animation that silently fails to progress.

use thiserror::Error;

use super::track::TrackId;

/// A track batch that cannot be scheduled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    #[error("duplicate track id in batch: {id}")]
    DuplicateTrackId { id: TrackId },

    #[error("track {track} starts relative to {depends_on}, which is not in this batch")]
    UnknownDependency { track: TrackId, depends_on: TrackId },

    #[error("start conditions form a cycle: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<TrackId> },

    #[error("track {track} waits for progress {progress}, which is outside [0, 1]")]
    InvalidProgressPoint { track: TrackId, progress: f64 },
}

impl TimelineError {
    /// The track the error was detected on.
    #[must_use]
    pub fn track(&self) -> Option<&TrackId> {
        match self {
            Self::DuplicateTrackId { id } => Some(id),
            Self::UnknownDependency { track, .. } | Self::InvalidProgressPoint { track, .. } => {
                Some(track)
            }
            Self::CyclicDependency { cycle } => cycle.first(),
        }
    }
}

/// A cubic-bezier definition that cannot be solved as an easing curve.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BezierError {
    #[error("control point coordinates must be finite")]
    NonFinite,

    #[error("curve domain is empty: x runs from {start} to {end}")]
    EmptyDomain { start: f64, end: f64 },

    #[error("control x {x} lies outside the curve domain [{start}, {end}]")]
    ControlOutOfRange { x: f64, start: f64, end: f64 },
}

fn format_cycle(cycle: &[TrackId]) -> String {
    let mut out = String::new();
    for id in cycle {
        out.push_str(id.as_str());
        out.push_str(" -> ");
    }
    if let Some(first) = cycle.first() {
        out.push_str(first.as_str());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_closes_the_loop() {
        let err = TimelineError::CyclicDependency {
            cycle: vec![TrackId::from("a"), TrackId::from("b")],
        };
        assert_eq!(err.to_string(), "start conditions form a cycle: a -> b -> a");
        assert_eq!(err.track().map(TrackId::as_str), Some("a"));
    }

    #[test]
    fn unknown_dependency_message() {
        let err = TimelineError::UnknownDependency {
            track: TrackId::from("fade"),
            depends_on: TrackId::from("slide"),
        };
        assert!(err.to_string().contains("fade starts relative to slide"));
    }
}
