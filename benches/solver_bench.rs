//! Benchmarks the polynomial solver's closed-form and Sturm paths across
//! degrees, the two code paths spec §4.1 calls out as numerically distinct.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tracer_core::solver::solve;

fn bench_quadratic(c: &mut Criterion) {
    let coeffs = [1.0, 0.0, -4.0];
    c.bench_function("solve/quadratic", |b| {
        b.iter(|| solve(2, black_box(&coeffs), 1e-4, false))
    });
}

fn bench_quartic(c: &mut Criterion) {
    let coeffs = [1.0, -2.0, -13.0, 14.0, 24.0];
    c.bench_function("solve/quartic_closed_form", |b| {
        b.iter(|| solve(4, black_box(&coeffs), 1e-4, false))
    });
}

fn bench_quartic_sturm(c: &mut Criterion) {
    let coeffs = [1.0, -2.0, -13.0, 14.0, 24.0];
    c.bench_function("solve/quartic_forced_sturm", |b| {
        b.iter(|| solve(4, black_box(&coeffs), 1e-4, true))
    });
}

fn bench_degree_eight_sturm(c: &mut Criterion) {
    // An order-8 polynomial with four real roots, forcing the Sturm path
    // (closed-form solving stops at degree 4).
    let coeffs = [1.0, 0.0, -20.0, 0.0, 104.0, 0.0, -160.0, 0.0, 64.0];
    c.bench_function("solve/degree_8_sturm", |b| {
        b.iter(|| solve(8, black_box(&coeffs), 1e-4, true))
    });
}

criterion_group!(benches, bench_quadratic, bench_quartic, bench_quartic_sturm, bench_degree_eight_sturm);
criterion_main!(benches);
