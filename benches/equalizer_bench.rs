//! Equalizer cascade throughput benchmark
//!
//! The 10-band cascade must stay far above realtime: one second of
//! 44.1 kHz stereo is 88,200 samples through up to ten biquads.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tonearm::dsp::{Equalizer, EQ_BANDS};

fn one_second_chunk() -> Vec<f32> {
    (0..88_200)
        .map(|i| ((i as f32) * 0.013).sin() * 0.5)
        .collect()
}

fn bench_equalizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("equalizer");

    for active_bands in [1usize, 5, 10] {
        group.bench_function(BenchmarkId::new("process_1s", active_bands), |b| {
            let mut eq = Equalizer::new(44100);
            eq.set_enabled(true);
            let mut gains = [0.0f32; EQ_BANDS];
            for gain in gains.iter_mut().take(active_bands) {
                *gain = 6.0;
            }
            eq.set_gains(&gains);

            let template = one_second_chunk();
            let mut samples = template.clone();

            b.iter(|| {
                samples.copy_from_slice(&template);
                eq.process(black_box(&mut samples));
            });
        });
    }

    group.bench_function("flat_passthrough_1s", |b| {
        let mut eq = Equalizer::new(44100);
        eq.set_enabled(true);

        let template = one_second_chunk();
        let mut samples = template.clone();

        b.iter(|| {
            samples.copy_from_slice(&template);
            eq.process(black_box(&mut samples));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_equalizer);
criterion_main!(benches);
