#![no_main]

use arbitrary::Arbitrary;
use lumen_core::animation::{Timeline, Track, TrackState};
use libfuzzer_sys::fuzz_target;
use web_time::{Duration, Instant};

#[derive(Arbitrary, Debug)]
enum Start {
    Immediate,
    After { track: u8, delay_ms: u16 },
    AtProgress { track: u8, progress: f64 },
}

#[derive(Arbitrary, Debug)]
struct TrackInput {
    id: u8,
    duration_ms: u16,
    start: Start,
}

#[derive(Arbitrary, Debug)]
struct BatchInput {
    tracks: Vec<TrackInput>,
    steps_ms: Vec<u16>,
}

fn name(id: u8) -> String {
    format!("t{}", id % 16)
}

fuzz_target!(|input: BatchInput| {
    let tracks: Vec<Track> = input
        .tracks
        .iter()
        .take(32)
        .map(|t| {
            let track = Track::new(name(t.id), Duration::from_millis(u64::from(t.duration_ms)));
            match t.start {
                Start::Immediate => track,
                Start::After { track: dep, delay_ms } => {
                    track.after(name(dep), Duration::from_millis(u64::from(delay_ms)))
                }
                Start::AtProgress { track: dep, progress } => track.at_progress(name(dep), progress),
            }
        })
        .collect();

    let Ok(mut timeline) = Timeline::new(tracks) else {
        return;
    };

    let mut now = Instant::now();
    let mut last = vec![0.0; timeline.len()];
    for step in input.steps_ms.iter().take(256) {
        now += Duration::from_millis(u64::from(*step));
        timeline.advance(now);
        for (slot, id) in timeline.ids().enumerate() {
            let Some(p) = timeline.progress(id.as_str()) else {
                continue;
            };
            assert!((0.0..=1.0).contains(&p), "{id:?} progress {p}");
            assert!(p >= last[slot], "{id:?} progress went backwards");
            last[slot] = p;
        }
    }

    // Every track eventually completes once enough time passes.
    now += Duration::from_secs(60 * 60 * 24);
    for _ in 0..=timeline.len() {
        timeline.advance(now);
    }
    assert!(timeline.iter().all(|(_, state)| state == TrackState::Complete));
    assert!(timeline.is_complete());
});
