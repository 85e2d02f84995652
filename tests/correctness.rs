use mattrans::distributed::{self, ROOT};
use mattrans::threaded::is_symmetric_mt;
use mattrans::{
    Communicator, DistributedKernel, Error, KernelConfig, LocalGroup, Matrix, SharedKernel,
    SymmetryKernel, compute_grid, compute_partition, is_symmetric, sequential, transpose,
    transpose_parallel,
};

fn assert_matrices_equal(expected: &Matrix, actual: &Matrix, name: &str) {
    assert_eq!(expected.dim(), actual.dim(), "{}: dimension mismatch", name);
    let n = expected.dim();
    for i in 0..n {
        for j in 0..n {
            assert!(
                expected[(i, j)] == actual[(i, j)],
                "{}: mismatch at ({}, {}): expected {}, got {}",
                name,
                i,
                j,
                expected[(i, j)],
                actual[(i, j)]
            );
        }
    }
}

/// Run a distributed kernel on `ranks` in-process ranks; rank 0's result.
fn run_distributed(kernel: DistributedKernel, m: &Matrix, ranks: usize) -> Option<Matrix> {
    let n = m.dim();
    let mut out = LocalGroup::run(ranks, |c| {
        let input = (c.rank() == ROOT).then_some(m);
        kernel
            .transpose(c, input, n, &KernelConfig::default())
            .unwrap()
            .value
    })
    .unwrap();
    out.swap_remove(ROOT)
}

// ============================================================
// Small matrix tests (edge case handling)
// ============================================================

#[test]
fn test_2x2_transpose() {
    let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    let t = transpose(&m).unwrap();
    assert_eq!(t.as_slice(), &[1.0, 3.0, 2.0, 4.0]);
}

#[test]
fn test_1x1_and_empty() {
    let one = Matrix::from_vec(1, vec![7.5]).unwrap();
    assert!(is_symmetric(&one));
    assert_eq!(transpose(&one).unwrap(), one);

    let empty = Matrix::zeros(0).unwrap();
    assert!(is_symmetric(&empty));
    assert_eq!(transpose(&empty).unwrap().dim(), 0);
}

#[test]
fn test_small_odd_sizes() {
    let cfg = KernelConfig::new(3, 4);
    for n in [3, 5, 7, 11, 13, 17] {
        let m = Matrix::random(n, n as u64);
        let expected = sequential::transpose(&m).unwrap();
        for kernel in SharedKernel::ALL {
            if kernel.requires_power_of_two() {
                continue;
            }
            let t = kernel.transpose(&m, &cfg).unwrap().value;
            assert_matrices_equal(&expected, &t, &format!("{kernel} n={n}"));
        }
    }
}

// ============================================================
// Involution: transpose(transpose(M)) == M
// ============================================================

#[test]
fn test_involution_shared() {
    let m = Matrix::random(64, 11);
    let cfg = KernelConfig::new(4, 8);
    for kernel in SharedKernel::ALL {
        let once = kernel.transpose(&m, &cfg).unwrap().value;
        let twice = kernel.transpose(&once, &cfg).unwrap().value;
        assert_matrices_equal(&m, &twice, kernel.name());
    }
}

#[test]
fn test_involution_distributed() {
    let m = Matrix::random(16, 12);
    for kernel in DistributedKernel::ALL {
        let once = run_distributed(kernel, &m, 4).unwrap();
        let twice = run_distributed(kernel, &once, 4).unwrap();
        assert_matrices_equal(&m, &twice, kernel.name());
    }
}

// ============================================================
// Cross-strategy equivalence
// ============================================================

#[test]
fn test_shared_kernels_match_sequential() {
    for n in [16, 64, 256] {
        let m = Matrix::random_parallel(n, 2024);
        let expected = sequential::transpose(&m).unwrap();
        for (threads, block) in [(1, 4), (4, 16), (8, 32)] {
            let cfg = KernelConfig::new(threads, block);
            for kernel in SharedKernel::ALL {
                let t = kernel.transpose(&m, &cfg).unwrap().value;
                assert_matrices_equal(
                    &expected,
                    &t,
                    &format!("{kernel} n={n} threads={threads} block={block}"),
                );
            }
        }
    }
}

#[test]
fn test_distributed_kernels_match_sequential() {
    for n in [16, 64, 256] {
        let m = Matrix::random(n, 7);
        let expected = sequential::transpose(&m).unwrap();
        for kernel in DistributedKernel::ALL {
            for ranks in [1, 4, 16] {
                let t = run_distributed(kernel, &m, ranks).unwrap();
                assert_matrices_equal(&expected, &t, &format!("{kernel} n={n} ranks={ranks}"));
            }
        }
    }
}

#[test]
fn test_block_larger_than_matrix() {
    let m = Matrix::random(8, 3);
    let expected = sequential::transpose(&m).unwrap();
    let cfg = KernelConfig::new(4, 64);
    for kernel in SharedKernel::ALL {
        let t = kernel.transpose(&m, &cfg).unwrap().value;
        assert_matrices_equal(&expected, &t, kernel.name());
    }
}

#[test]
fn test_parallel_matches_single_threaded() {
    let m = Matrix::random(300, 9);
    let single = transpose(&m).unwrap();
    let parallel = transpose_parallel(&m, &KernelConfig::new(4, 32)).unwrap();
    assert_matrices_equal(&single, &parallel, "transpose_parallel");
}

#[test]
fn test_inputs_left_untouched() {
    let m = Matrix::random(32, 1);
    let copy = m.clone();
    for kernel in SharedKernel::ALL {
        kernel.transpose(&m, &KernelConfig::default()).unwrap();
    }
    assert_eq!(m, copy);
}

// ============================================================
// Symmetry
// ============================================================

#[test]
fn test_symmetry_matches_transpose_equality() {
    for (n, seed) in [(16, 1), (33, 2), (64, 3)] {
        for m in [Matrix::random(n, seed), Matrix::random_symmetric(n, seed)] {
            let want = m == sequential::transpose(&m).unwrap();
            for kernel in SymmetryKernel::ALL {
                let got = kernel.is_symmetric(&m, &KernelConfig::new(4, 1)).unwrap().value;
                assert_eq!(got, want, "{kernel} n={n}");
            }
        }
    }
}

#[test]
fn test_swapped_pair_detected_everywhere() {
    let n = 16;
    let mut m = Matrix::random_symmetric(n, 5);
    m[(3, 11)] += 1.0;

    for kernel in SymmetryKernel::ALL {
        assert!(!kernel.is_symmetric(&m, &KernelConfig::default()).unwrap().value);
    }
    for ranks in [1, 2, 4] {
        let verdicts = LocalGroup::run(ranks, |c| {
            let input = (c.rank() == ROOT).then_some(&m);
            distributed::is_symmetric(c, input, n, &KernelConfig::default())
                .unwrap()
                .value
        })
        .unwrap();
        assert!(verdicts.iter().all(|&v| !v), "ranks={ranks}");
    }
}

#[test]
fn test_early_exit_on_first_row() {
    let mut m = Matrix::random_symmetric(128, 6);
    m[(0, 1)] = -1.0;
    let res = is_symmetric_mt(&m, &KernelConfig::new(4, 1)).unwrap();
    assert!(!res.value);
}

#[test]
fn test_distributed_symmetric_identity() {
    let m = Matrix::from_fn(8, |i, j| if i == j { 1.0 } else { 0.0 });
    let verdicts = LocalGroup::run(4, |c| {
        distributed::is_symmetric(c, Some(&m), 8, &KernelConfig::default())
            .unwrap()
            .value
    })
    .unwrap();
    assert_eq!(verdicts, vec![true; 4]);
}

#[test]
fn test_nan_diagonal_verdicts_agree() {
    let mut m = Matrix::random_symmetric(8, 1);
    m[(3, 3)] = f32::NAN;

    assert!(is_symmetric(&m));
    for kernel in SymmetryKernel::ALL {
        assert!(kernel.is_symmetric(&m, &KernelConfig::default()).unwrap().value, "{kernel}");
    }
    for ranks in [1, 2, 4] {
        let verdicts = LocalGroup::run(ranks, |c| {
            let input = (c.rank() == ROOT).then_some(&m);
            distributed::is_symmetric(c, input, 8, &KernelConfig::default())
                .unwrap()
                .value
        })
        .unwrap();
        assert!(verdicts.iter().all(|&v| v), "ranks={ranks}");
    }
}

// ============================================================
// Decomposition
// ============================================================

#[test]
fn test_partition_and_grid_cases() {
    assert!(!compute_partition(10, 3).valid);
    let p = compute_partition(16, 4);
    assert!(p.valid);
    assert_eq!(p.rows_per_worker, 4);

    let g = compute_grid(9);
    assert!(g.valid);
    assert_eq!(g.dim, 3);
    assert!(!compute_grid(8).valid);
}

#[test]
fn test_unsupported_shapes_rejected_by_every_rank() {
    let cases = [
        (DistributedKernel::RowBlock, 3, 10),
        (DistributedKernel::AllToAll, 4, 10),
        (DistributedKernel::NonBlocking, 3, 10),
        (DistributedKernel::Grid, 2, 10),
        (DistributedKernel::Grid, 9, 10),
        // square grid with n % dim == 0, but n % size != 0
        (DistributedKernel::Grid, 4, 6),
    ];
    for (kernel, ranks, n) in cases {
        let m = Matrix::random(n, 0);
        let out = LocalGroup::run(ranks, |c| {
            kernel
                .transpose(c, Some(&m), n, &KernelConfig::default())
                .is_err()
        })
        .unwrap();
        assert!(out.iter().all(|&e| e), "{kernel} ranks={ranks} n={n}");
    }
}

#[test]
fn test_recursive_rejects_non_power_of_two() {
    let m = Matrix::random(24, 0);
    for kernel in [SharedKernel::SequentialRecursive, SharedKernel::CacheOblivious] {
        assert!(matches!(
            kernel.transpose(&m, &KernelConfig::default()),
            Err(Error::NotPowerOfTwo { n: 24 })
        ));
    }
}

#[test]
fn test_invalid_config_rejected() {
    let m = Matrix::random(8, 0);
    assert!(matches!(
        SharedKernel::Blocked.transpose(&m, &KernelConfig::new(0, 4)),
        Err(Error::InvalidThreadCount)
    ));
    assert!(matches!(
        SharedKernel::Tasks.transpose(&m, &KernelConfig::new(2, 0)),
        Err(Error::InvalidBlockSize)
    ));
}
