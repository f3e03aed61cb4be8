use std::f64::consts::FRAC_PI_2;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use kickmc::{
    Ensemble, KickLikelihood, KickParams, RunConfig, StandardKick, StretchMove, WalkerSpread,
};

fn engine() -> KickLikelihood<StandardKick> {
    let resolved = RunConfig::default().resolve().unwrap();
    KickLikelihood::new(resolved.observables, resolved.limits, StandardKick)
}

fn criterion_benchmark(c: &mut Criterion) {
    let engine = engine();

    let plausible = KickParams {
        porb_pre: 5.6,
        m1_pre: 25.0,
        m2: 40.6,
        w: 5.0,
        theta: FRAC_PI_2,
        phi: 3.0,
    };
    c.bench_function("evaluate plausible candidate", |b| {
        b.iter(|| engine.evaluate(black_box(&plausible)))
    });

    // Rejected before the orbital transform runs.
    let impossible = KickParams {
        m1_pre: 10.0,
        ..plausible
    };
    c.bench_function("evaluate early rejection", |b| {
        b.iter(|| engine.evaluate(black_box(&impossible)))
    });

    let spread = WalkerSpread::new(vec![
        (-0.05, 0.05),
        (-0.5, 0.5),
        (-0.5, 0.5),
        (-4.9, 5.0),
        (-0.3, 0.3),
        (-0.3, 0.3),
    ])
    .unwrap();
    let guess = vec![5.6, 25.0, 40.6, 5.0, FRAC_PI_2, 3.0];
    let mut rng = SmallRng::seed_from_u64(3);
    let ensemble = Ensemble::init(&engine, &guess, &spread, 64, &mut rng).unwrap();
    let proposal = StretchMove::default();

    c.bench_function("ensemble step, 64 walkers", |b| {
        b.iter_batched(
            || (ensemble.clone(), SmallRng::seed_from_u64(42)),
            |(mut ensemble, mut rng)| ensemble.step(&engine, &proposal, &mut rng),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
