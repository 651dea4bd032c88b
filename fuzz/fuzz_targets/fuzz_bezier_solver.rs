#![no_main]

use arbitrary::Arbitrary;
use lumen_core::animation::CubicBezier;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct CurveInput {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    xs: Vec<f64>,
    samples: u8,
}

fuzz_target!(|input: CurveInput| {
    let Ok(curve) = CubicBezier::try_new(input.x1, input.y1, input.x2, input.y2) else {
        return;
    };

    assert_eq!(curve.y_at(0.0), 0.0);
    assert_eq!(curve.y_at(1.0), 1.0);

    for &x in input.xs.iter().take(64) {
        let y = curve.y_at(x);
        if x.is_finite() {
            assert!(y.is_finite(), "y_at({x}) = {y} for {curve:?}");
        }
    }

    let table = curve.sample(usize::from(input.samples));
    let _ = table.len();
});
