use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use localizer_core::pipeline::{Pipeline, PipelineConfig};
use localizer_core::types::{Measurement, MeasurementBatch, PosCov, PosVec};
use localizer_core::ClaimPolicy;
use nalgebra::Vector3;

fn make_batch(n: usize, t: f64) -> MeasurementBatch {
    let cov = PosCov::from_diagonal(&Vector3::new(0.1, 0.1, 0.2));
    let measurements = (0..n)
        .map(|i| {
            let angle = i as f64 * std::f64::consts::TAU / n as f64;
            let r = 20.0_f64;
            Measurement::new(PosVec::new(r * angle.cos(), r * angle.sin(), 5.0), cov, t)
        })
        .collect();
    MeasurementBatch::new(t, measurements)
}

fn seeded(n: usize, policy: ClaimPolicy) -> Pipeline {
    let mut pipeline = Pipeline::new(PipelineConfig {
        claim_policy: policy,
        collect_debug: false,
        ..PipelineConfig::default()
    })
    .expect("default config is valid");
    // Warm up with one batch to create tracks
    pipeline.process_measurements(&make_batch(n, 0.0));
    pipeline
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("measurement_cycle");

    for n in [4, 16, 64, 256] {
        for policy in [ClaimPolicy::Shared, ClaimPolicy::Exclusive] {
            group.bench_function(format!("{n}_tracks_{policy:?}"), |b| {
                let batch = make_batch(n, 0.05);
                b.iter_batched(
                    || seeded(n, policy),
                    |mut pipeline| black_box(pipeline.process_measurements(&batch)),
                    BatchSize::SmallInput,
                );
            });
        }
    }
    group.finish();

    let mut group = c.benchmark_group("predict_all");
    for n in [16, 256] {
        group.bench_function(format!("{n}_tracks"), |b| {
            let mut pipeline = seeded(n, ClaimPolicy::Shared);
            b.iter(|| black_box(pipeline.predict_all(0.001)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
