use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use mattrans::distributed::ROOT;
use mattrans::{
    Communicator, DistributedKernel, KernelConfig, LocalGroup, Matrix, SharedKernel,
    SymmetryKernel,
};

fn bench_shared(c: &mut Criterion) {
    let mut group = c.benchmark_group("transpose");
    let cfg = KernelConfig::new(4, 32);

    for n in [256, 512, 1024] {
        let m = Matrix::random_parallel(n, 42);
        for kernel in SharedKernel::ALL {
            group.bench_with_input(BenchmarkId::new(kernel.name(), n), &m, |b, m| {
                b.iter(|| kernel.transpose(black_box(m), &cfg))
            });
        }
    }
    group.finish();
}

fn bench_symmetry(c: &mut Criterion) {
    let mut group = c.benchmark_group("is_symmetric");
    let cfg = KernelConfig::new(4, 32);

    for n in [256, 1024] {
        let m = Matrix::random_symmetric(n, 42);
        for kernel in SymmetryKernel::ALL {
            group.bench_with_input(BenchmarkId::new(kernel.name(), n), &m, |b, m| {
                b.iter(|| kernel.is_symmetric(black_box(m), &cfg))
            });
        }
    }
    group.finish();
}

// Includes spawning the rank threads; only comparable across strategies.
fn bench_distributed(c: &mut Criterion) {
    let mut group = c.benchmark_group("distributed");
    group.sample_size(20);
    let cfg = KernelConfig::default();
    let n = 512;
    let m = Matrix::random_parallel(n, 42);

    for kernel in DistributedKernel::ALL {
        group.bench_function(BenchmarkId::new(kernel.name(), 4), |b| {
            b.iter(|| {
                LocalGroup::run(4, |comm| {
                    let input = (comm.rank() == ROOT).then_some(&m);
                    kernel.transpose(comm, input, n, &cfg).map(|t| t.elapsed)
                })
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_shared, bench_symmetry, bench_distributed);
criterion_main!(benches);
