//! Benchmarks SAH BSP construction and traversal, the two phases spec
//! §4.4 calls out separately (build cost vs. traversal cost).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tracer_core::bsp::{BspOptions, BspTree};
use tracer_core::math::{BoundingBox, Ray, Vec3};
use tracer_core::ThreadState;

fn grid_bounds(n: usize) -> Vec<BoundingBox> {
    let side = (n as f64).cbrt().ceil() as usize;
    let mut bounds = Vec::with_capacity(n);
    'outer: for x in 0..side {
        for y in 0..side {
            for z in 0..side {
                if bounds.len() >= n {
                    break 'outer;
                }
                let center = Vec3::new(x as f64 * 3.0, y as f64 * 3.0, z as f64 * 3.0);
                bounds.push(BoundingBox::from_corners(center - Vec3::splat(0.5), center + Vec3::splat(0.5)));
            }
        }
    }
    bounds
}

fn bench_build_small(c: &mut Criterion) {
    let bounds = grid_bounds(100);
    c.bench_function("bsp/build_100", |b| {
        b.iter(|| BspTree::build(black_box(&bounds), BspOptions::default()))
    });
}

fn bench_build_large(c: &mut Criterion) {
    let bounds = grid_bounds(2000);
    c.bench_function("bsp/build_2000", |b| {
        b.iter(|| BspTree::build(black_box(&bounds), BspOptions::default()))
    });
}

fn bench_traverse(c: &mut Criterion) {
    let bounds = grid_bounds(2000);
    let tree = BspTree::build(&bounds, BspOptions::default());
    let mut thread = ThreadState::new(bounds.len());
    let ray = Ray::new(Vec3::new(-10.0, 5.0, 5.0), Vec3::new(1.0, 0.0, 0.0));
    c.bench_function("bsp/traverse_2000", |b| {
        b.iter(|| {
            let mut count = 0u32;
            tree.traverse(black_box(&ray), 1e6, &mut thread, |_id| {
                count += 1;
                false
            });
            count
        })
    });
}

criterion_group!(benches, bench_build_small, bench_build_large, bench_traverse);
criterion_main!(benches);
