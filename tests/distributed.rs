use std::sync::Mutex;

use mattrans::distributed::{
    self, BlockLayout, CartGrid, ROOT, local_contribution, scatter_rows, transpose_row_block,
};
use mattrans::{Communicator, Error, KernelConfig, LocalGroup, Matrix, compute_partition};

// ============================================================
// End-to-end: n = 8, 2 ranks, row-block
// ============================================================

#[test]
fn test_row_block_two_ranks_end_to_end() {
    let n = 8;
    let m = Matrix::from_fn(n, |i, j| (i * n + j) as f32);
    let expected = Matrix::from_fn(n, |i, j| (j * n + i) as f32);
    let contributions = Mutex::new(vec![Vec::new(); 2]);

    let out = LocalGroup::run(2, |c| {
        let rank = c.rank();
        let part = compute_partition(n, c.size()).check().unwrap();
        let rows = part.rows_per_worker;

        // the rows this rank actually received, and what it sends to the gather
        let local = scatter_rows(c, (rank == ROOT).then_some(m.as_slice()), &part);
        let mut local_t = vec![0.0; rows * n];
        local_contribution(&local, &mut local_t, rows, n);
        contributions.lock().unwrap()[rank] = local_t;

        let input = (rank == ROOT).then_some(&m);
        transpose_row_block(c, input, n, &KernelConfig::default())
            .unwrap()
            .value
    })
    .unwrap();

    assert_eq!(out[0].as_ref(), Some(&expected));
    assert!(out[1].is_none());

    // rank 1's contribution is columns [4, 8) of the transpose, column-major
    let contributions = contributions.into_inner().unwrap();
    for col in 0..n {
        for r in 0..4 {
            assert_eq!(contributions[1][col * 4 + r], expected[(col, 4 + r)]);
        }
    }
}

#[test]
fn test_elapsed_reported_by_every_rank() {
    let m = Matrix::random(32, 3);
    let out = LocalGroup::run(4, |c| {
        let input = (c.rank() == ROOT).then_some(&m);
        transpose_row_block(c, input, 32, &KernelConfig::default())
            .unwrap()
            .elapsed
    })
    .unwrap();
    assert_eq!(out.len(), 4);
}

// ============================================================
// Grid addressing
// ============================================================

#[test]
fn test_transposed_grid_moves_blocks_across_diagonal() {
    // Every block holds its owner's rank; after a scatter by one grid and a
    // gather by the transposed one, block (i, j) carries the rank that owned (j, i).
    let n = 6;
    let dim = 3;
    let block = 2;
    let cart = CartGrid::new(dim);
    let scatter = BlockLayout { grid: cart, n, block };
    let gather = BlockLayout {
        grid: cart.transposed(),
        n,
        block,
    };

    let m = Matrix::from_fn(n, |i, j| cart.rank_of((i / block, j / block)) as f32);
    let mut packed = vec![0.0; n * n];
    scatter.pack(m.as_slice(), &mut packed);
    for (rank, chunk) in packed.chunks(block * block).enumerate() {
        assert!(chunk.iter().all(|&v| v == rank as f32));
    }

    let mut out = vec![0.0; n * n];
    gather.unpack(&packed, &mut out);
    let out = Matrix::from_vec(n, out).unwrap();
    for i in 0..n {
        for j in 0..n {
            assert_eq!(out[(i, j)], cart.rank_of((j / block, i / block)) as f32);
        }
    }
}

// ============================================================
// Failure propagation
// ============================================================

#[test]
fn test_missing_input_aborts_group() {
    let err = LocalGroup::run(4, |c| {
        let _ = distributed::transpose_grid(c, None, 8, &KernelConfig::default());
    })
    .unwrap_err();
    assert!(matches!(err, Error::Aborted { rank: 0, code: distributed::ABORT_INPUT }));
}

#[test]
fn test_wrong_dimension_aborts_group() {
    let m = Matrix::random(4, 0);
    let err = LocalGroup::run(2, |c| {
        let _ = distributed::transpose_alltoall(c, Some(&m), 8, &KernelConfig::default());
    })
    .unwrap_err();
    assert!(matches!(err, Error::Aborted { rank: 0, code: 3 }));
}

#[test]
fn test_empty_group_rejected() {
    assert!(matches!(LocalGroup::run(0, |_| ()), Err(Error::EmptyGroup)));
}
