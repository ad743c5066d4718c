//! Crossfade curve and gain benchmark
//!
//! Measures the equal-power gain computation across a 10-second fade
//! window (441,000 frames at 44.1 kHz) and the effective-gain derivation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tonearm::playback::{effective_gain, equal_power_gains, ReplayGain};

fn bench_equal_power_curve(c: &mut Criterion) {
    let frame_count = 441_000usize;

    c.bench_function("equal_power_10s_fade", |b| {
        b.iter(|| {
            let mut acc = 0.0f32;
            for i in 0..frame_count {
                let t = i as f32 / frame_count as f32;
                let (fade_out, fade_in) = equal_power_gains(t);
                acc += fade_out + fade_in;
            }
            black_box(acc);
        });
    });
}

fn bench_effective_gain(c: &mut Criterion) {
    let replay_gain = ReplayGain::new(-6.5, 0.92);

    c.bench_function("effective_gain", |b| {
        b.iter(|| {
            let mut acc = 0.0f32;
            for i in 0..10_000 {
                let volume = (i % 100) as f32 / 100.0;
                acc += effective_gain(black_box(volume), black_box(&replay_gain));
            }
            black_box(acc);
        });
    });
}

criterion_group!(benches, bench_equal_power_curve, bench_effective_gain);
criterion_main!(benches);
