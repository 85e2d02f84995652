//! Property-based tests for the transpose and symmetry kernels.

use mattrans::distributed::ROOT;
use mattrans::{
    Communicator, DistributedKernel, KernelConfig, LocalGroup, Matrix, SharedKernel,
    SymmetryKernel, compute_grid, compute_partition, sequential,
};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────────

/// Any square matrix up to 24×24 with small integer-valued entries.
fn arb_matrix() -> impl Strategy<Value = Matrix> {
    (0usize..=24).prop_flat_map(|n| {
        prop::collection::vec(-50i16..50, n * n).prop_map(move |v| {
            let data = v.into_iter().map(f32::from).collect();
            Matrix::from_vec(n, data).unwrap()
        })
    })
}

/// A symmetric matrix built by mirroring the upper triangle.
fn arb_symmetric() -> impl Strategy<Value = Matrix> {
    arb_matrix().prop_map(|m| {
        let n = m.dim();
        Matrix::from_fn(n, |i, j| if i <= j { m[(i, j)] } else { m[(j, i)] })
    })
}

fn arb_config() -> impl Strategy<Value = KernelConfig> {
    (1usize..=6, 1usize..=9).prop_map(|(t, b)| KernelConfig::new(t, b))
}

/// `n` and a rank count that divides it.
fn arb_divisible() -> impl Strategy<Value = (usize, usize)> {
    (1usize..=4, 1usize..=6).prop_map(|(ranks, rows)| (ranks * rows, ranks))
}

// ── Property tests ───────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Transposing twice gives the input back.
    #[test]
    fn transpose_is_an_involution(m in arb_matrix()) {
        let t = sequential::transpose(&m).unwrap();
        prop_assert_eq!(sequential::transpose(&t).unwrap(), m);
    }

    /// Every shared-memory kernel agrees with the sequential transpose.
    #[test]
    fn shared_kernels_match_oracle(m in arb_matrix(), cfg in arb_config()) {
        let expected = sequential::transpose(&m).unwrap();
        for kernel in SharedKernel::ALL {
            if kernel.requires_power_of_two() && !m.dim().is_power_of_two() {
                continue;
            }
            let t = kernel.transpose(&m, &cfg).unwrap().value;
            prop_assert_eq!(&t, &expected, "{}", kernel);
        }
    }

    /// `is_symmetric(M)` is exactly `M == transpose(M)`.
    #[test]
    fn symmetry_is_transpose_equality(m in arb_matrix(), t in 1usize..=6) {
        let want = m == sequential::transpose(&m).unwrap();
        for kernel in SymmetryKernel::ALL {
            let got = kernel.is_symmetric(&m, &KernelConfig::new(t, 1)).unwrap().value;
            prop_assert_eq!(got, want, "{}", kernel);
        }
    }

    /// Mirrored matrices are always symmetric.
    #[test]
    fn mirrored_matrices_are_symmetric(m in arb_symmetric()) {
        prop_assert!(sequential::is_symmetric(&m));
        prop_assert_eq!(sequential::transpose(&m).unwrap(), m);
    }

    /// Row-based distributed kernels are exact whenever the rows divide.
    #[test]
    fn row_kernels_match_oracle((n, ranks) in arb_divisible(), seed in any::<u64>()) {
        let m = Matrix::random(n, seed);
        let expected = sequential::transpose(&m).unwrap();
        for kernel in [
            DistributedKernel::RowBlock,
            DistributedKernel::AllToAll,
            DistributedKernel::NonBlocking,
        ] {
            let out = LocalGroup::run(ranks, |c| {
                let input = (c.rank() == ROOT).then_some(&m);
                kernel.transpose(c, input, n, &KernelConfig::default()).unwrap().value
            })
            .unwrap();
            prop_assert_eq!(out[ROOT].as_ref(), Some(&expected), "{}", kernel);
        }
    }

    /// A partition is valid exactly when the workers divide `n`.
    #[test]
    fn partition_validity(n in 0usize..200, workers in 1usize..20) {
        let p = compute_partition(n, workers);
        prop_assert_eq!(p.valid, n % workers == 0);
        if p.valid {
            prop_assert_eq!(p.rows_per_worker * workers, n);
        }
    }

    /// A grid is valid exactly for perfect squares.
    #[test]
    fn grid_validity(dim in 1usize..40, extra in 0usize..3) {
        let size = dim * dim + extra;
        let g = compute_grid(size);
        prop_assert_eq!(g.valid, extra == 0);
        if g.valid {
            prop_assert_eq!(g.dim, dim);
        }
    }
}
