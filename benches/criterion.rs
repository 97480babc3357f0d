use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use gemm_opt::{
    device::memory::Operands,
    kernel::{self, TileConfig},
    problem::Problem,
};
use rand::{distributions::Standard, rngs::StdRng, Rng, SeedableRng};

fn kernels(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(12345u64);
    let mut group = c.benchmark_group("kernels");
    for size in [32, 64, 128, 256] {
        let problem = Problem::new(size, size, size);
        let a: Vec<f32> = (&mut rng).sample_iter(Standard).take(size * size).collect();
        let b: Vec<f32> = (&mut rng).sample_iter(Standard).take(size * size).collect();
        let mut out = vec![0.0f32; size * size];
        group.bench_with_input(BenchmarkId::new("reference", size), &size, |bench, _| {
            bench.iter(|| {
                kernel::reference(
                    problem,
                    1.0,
                    0.0,
                    Operands {
                        a: black_box(&a),
                        b: black_box(&b),
                        c: &mut out,
                    },
                );
            })
        });
        let config = TileConfig::select(problem, 256);
        group.bench_with_input(BenchmarkId::new("tiled", size), &size, |bench, _| {
            bench.iter(|| {
                kernel::tiled(
                    problem,
                    config,
                    1.0,
                    0.0,
                    Operands {
                        a: black_box(&a),
                        b: black_box(&b),
                        c: &mut out,
                    },
                );
            })
        });
    }
    group.finish();
}

criterion_group!(bench_kernels, kernels);
criterion_main!(bench_kernels);
