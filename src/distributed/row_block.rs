//! Row-block scatter / local transpose / gather.

use std::time::Instant;

use tracing::{debug, info};

use crate::config::{KernelConfig, Timed};
use crate::decomp::{Partition, compute_partition};
use crate::distributed::{Communicator, OrAbort, ROOT, alloc_or_abort, coordinator_input};
use crate::error::Result;
use crate::matrix::Matrix;
use crate::matrix::transpose::transpose;

/// Column-major form of a rank's row block.
///
/// `out[col * rows + r] = local[r * n + col]`: the block's `n` columns,
/// each `rows` long. Column `col` of rank `p`'s block is the slice
/// `t[col][p * rows .. (p + 1) * rows]` of the transposed matrix.
pub fn local_contribution(local: &[f32], out: &mut [f32], rows: usize, n: usize) {
    transpose(local, out, rows, n);
}

/// Hand every rank its `rows_per_worker` contiguous rows of the input.
///
/// `input` is only read on the coordinator. The returned block is what
/// this rank feeds to [`local_contribution`].
pub fn scatter_rows<C: Communicator + ?Sized>(
    comm: &C,
    input: Option<&[f32]>,
    part: &Partition,
) -> Vec<f32> {
    let mut local = alloc_or_abort(comm, part.block_len());
    comm.scatter(ROOT, input, &mut local).or_abort(comm);
    local
}

/// `src[i][j] == t[i][j]` below the diagonal, where `t` is the
/// reassembled transpose of `src`.
///
/// The diagonal is never compared, so a NaN there doesn't break symmetry.
fn lower_triangle_matches(src: &[f32], t: &[f32], n: usize) -> bool {
    (0..n).all(|i| (0..i).all(|j| src[i * n + j] == t[i * n + j]))
}

/// Rebuild the row-major transpose from gathered contributions.
///
/// `gathered` holds every rank's [`local_contribution`] back to back in
/// rank order.
pub fn reassemble(gathered: &[f32], out: &mut [f32], rows: usize, n: usize) {
    if rows == 0 {
        return;
    }
    for (p, chunk) in gathered.chunks(rows * n).enumerate() {
        for col in 0..n {
            let dst = col * n + p * rows;
            out[dst..dst + rows].copy_from_slice(&chunk[col * rows..(col + 1) * rows]);
        }
    }
}

/// Distributed transpose, result on the coordinator only.
///
/// The coordinator scatters `n / size` rows to every rank; each rank
/// turns its rows into its column-major contribution; the coordinator
/// gathers the contributions and reassembles the transpose. The timed
/// window opens at a barrier after the scatter and closes once the
/// coordinator holds the result.
///
/// Returns `Some(matrix)` on rank 0 and `None` on the other ranks.
/// `matrix` is only read on rank 0.
pub fn transpose_row_block<C: Communicator + ?Sized>(
    comm: &C,
    matrix: Option<&Matrix>,
    n: usize,
    cfg: &KernelConfig,
) -> Result<Timed<Option<Matrix>>> {
    let rank = comm.rank();
    let part = compute_partition(n, comm.size()).check()?;
    let rows = part.rows_per_worker;
    let input = coordinator_input(comm, matrix, n);

    if cfg.verbosity >= 2 {
        debug!(rank, n, rows, "row-block transpose: scattering");
    }

    let mut local_t = alloc_or_abort(comm, part.block_len());
    let mut gathered = (rank == ROOT).then(|| alloc_or_abort(comm, n * n));
    let mut out = (rank == ROOT).then(|| alloc_or_abort(comm, n * n));

    let local = scatter_rows(comm, input, &part);
    comm.barrier().or_abort(comm);
    let start = Instant::now();

    local_contribution(&local, &mut local_t, rows, n);
    comm.gather(ROOT, &local_t, gathered.as_deref_mut())
        .or_abort(comm);
    if let (Some(g), Some(o)) = (&gathered, &mut out) {
        reassemble(g, o, rows, n);
    }

    let elapsed = start.elapsed();
    if cfg.verbosity >= 2 {
        debug!(rank, ?elapsed, "row-block transpose: done");
    }
    if cfg.verbosity >= 1 && rank == ROOT {
        info!(n, size = comm.size(), ?elapsed, "row-block transpose");
    }

    let result = out.map(|o| Matrix::from_vec(n, o)).transpose()?;
    Ok(Timed::new(result, elapsed))
}

/// Distributed symmetry check.
///
/// Same scatter / transpose / gather as [`transpose_row_block`]; the
/// coordinator then compares the reassembled transpose with the input
/// below the diagonal (exact equality, like
/// [`sequential::is_symmetric`](crate::sequential::is_symmetric)) and
/// broadcasts the verdict, so every rank returns the same answer.
pub fn is_symmetric<C: Communicator + ?Sized>(
    comm: &C,
    matrix: Option<&Matrix>,
    n: usize,
    cfg: &KernelConfig,
) -> Result<Timed<bool>> {
    let rank = comm.rank();
    let part = compute_partition(n, comm.size()).check()?;
    let rows = part.rows_per_worker;
    let input = coordinator_input(comm, matrix, n);

    if cfg.verbosity >= 2 {
        debug!(rank, n, rows, "row-block symmetry: scattering");
    }

    let mut local_t = alloc_or_abort(comm, part.block_len());
    let mut gathered = (rank == ROOT).then(|| alloc_or_abort(comm, n * n));
    let mut out = (rank == ROOT).then(|| alloc_or_abort(comm, n * n));

    let local = scatter_rows(comm, input, &part);
    comm.barrier().or_abort(comm);
    let start = Instant::now();

    local_contribution(&local, &mut local_t, rows, n);
    comm.gather(ROOT, &local_t, gathered.as_deref_mut())
        .or_abort(comm);

    let mut symmetric = true;
    if let (Some(src), Some(g), Some(o)) = (input, &gathered, &mut out) {
        reassemble(g, o, rows, n);
        symmetric = lower_triangle_matches(src, o, n);
    }
    let symmetric = comm.broadcast_flag(ROOT, symmetric).or_abort(comm);

    let elapsed = start.elapsed();
    if cfg.verbosity >= 2 {
        debug!(rank, symmetric, ?elapsed, "row-block symmetry: done");
    }
    Ok(Timed::new(symmetric, elapsed))
}
