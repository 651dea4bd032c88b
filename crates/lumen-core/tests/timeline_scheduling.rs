//! Scenario tests for timeline scheduling driven by a deterministic clock.

use std::cell::RefCell;
use std::rc::Rc;

use lumen_core::animation::{EASE, Timeline, TimelineError, Track, TrackState};
use lumen_core::clock::LabClock;
use web_time::Duration;

const FRAME: Duration = Duration::from_micros(16_667);

type Log = Rc<RefCell<Vec<(String, f64)>>>;

fn logged(id: &str, ms: u64, log: &Log) -> Track {
    let log = Rc::clone(log);
    let name = id.to_owned();
    Track::new(id, Duration::from_millis(ms))
        .on_frame(move |p| log.borrow_mut().push((name.clone(), p)))
}

/// Advance at 60 Hz until the timeline completes, returning the frame count.
fn run_to_completion(timeline: &mut Timeline, clock: &LabClock, max_frames: u32) -> u32 {
    let mut frames = 0;
    while !timeline.is_complete() && frames < max_frames {
        timeline.advance(clock.now());
        clock.advance(FRAME);
        frames += 1;
    }
    frames
}

#[test]
fn staggered_fan_out() {
    let log = Log::default();
    let mut timeline = Timeline::new(vec![
        logged("header", 200, &log).easing(EASE),
        logged("body", 200, &log).at_progress("header", 0.5),
        logged("footer", 200, &log).at_progress("header", 0.5),
        logged("cta", 100, &log).after("body", Duration::from_millis(50)),
    ])
    .unwrap();
    let clock = LabClock::new();

    let frames = run_to_completion(&mut timeline, &clock, 1_000);
    assert!(timeline.is_complete());
    // header 200ms, body starts at 100, ends 300; cta starts 350, ends 450.
    assert!((27..=29).contains(&frames), "took {frames} frames");

    let log = log.borrow();
    for id in ["header", "body", "footer", "cta"] {
        let last = log.iter().rev().find(|(i, _)| i == id).map(|(_, p)| *p);
        assert_eq!(last, Some(1.0), "{id} did not finish at 1.0");
    }
    let body_first = log.iter().position(|(i, _)| i == "body").unwrap();
    let footer_first = log.iter().position(|(i, _)| i == "footer").unwrap();
    // Both start on the same frame, in submission order.
    assert_eq!(footer_first, body_first + 1);
}

#[test]
fn dependent_never_starts_before_dependency_finishes() {
    let log = Log::default();
    let mut timeline = Timeline::new(vec![
        logged("second", 120, &log).after("first", Duration::ZERO),
        logged("first", 120, &log),
    ])
    .unwrap();
    let clock = LabClock::new();
    run_to_completion(&mut timeline, &clock, 1_000);

    let log = log.borrow();
    let first_done = log.iter().position(|(i, p)| i == "first" && *p == 1.0).unwrap();
    assert!(log[..first_done].iter().all(|(i, _)| i == "first"));
}

#[test]
fn long_frame_gap_keeps_chain_on_schedule() {
    let log = Log::default();
    let mut timeline = Timeline::new(vec![
        logged("a", 100, &log),
        logged("b", 100, &log).after("a", Duration::ZERO),
    ])
    .unwrap();
    let clock = LabClock::new();
    timeline.advance(clock.now());

    // One stalled frame spanning a's end and half of b.
    clock.advance(Duration::from_millis(150));
    timeline.advance(clock.now());
    assert_eq!(timeline.state("a"), Some(TrackState::Complete));
    let b = timeline.progress("b").unwrap();
    assert!((b - 0.5).abs() < 1e-9, "b progress {b}");
}

#[test]
fn validation_errors_name_the_offender() {
    let err = Timeline::new(vec![
        Track::new("a", Duration::ZERO),
        Track::new("b", Duration::ZERO).after("missing", Duration::ZERO),
    ])
    .unwrap_err();
    assert_eq!(err.track().map(|id| id.as_str()), Some("b"));
    assert_eq!(
        err.to_string(),
        TimelineError::UnknownDependency {
            track: "b".into(),
            depends_on: "missing".into(),
        }
        .to_string()
    );
}
