//! Broadcast + all-to-all transpose.

use std::time::Instant;

use tracing::{debug, info};

use crate::config::{KernelConfig, Timed};
use crate::decomp::compute_partition;
use crate::distributed::{Communicator, OrAbort, ROOT, alloc_or_abort, coordinator_input};
use crate::error::Result;
use crate::matrix::Matrix;

/// Distributed transpose with the result on every rank.
///
/// The full matrix is broadcast, so every rank holds a copy. Rank `r`
/// cuts its row block into `size` square blocks and transposes each one
/// into its send buffer; a single all-to-all then hands rank `r` every
/// block of column band `r`, already transposed, which is exactly row
/// band `r` of the result. One all-gather of those row bands gives every
/// rank the whole transpose.
///
/// Costs a full broadcast up front, but no rank sits at the centre of
/// the output: nobody waits on the coordinator to reassemble.
pub fn transpose_alltoall<C: Communicator + ?Sized>(
    comm: &C,
    matrix: Option<&Matrix>,
    n: usize,
    cfg: &KernelConfig,
) -> Result<Timed<Matrix>> {
    let rank = comm.rank();
    let size = comm.size();
    let part = compute_partition(n, size).check()?;
    let rows = part.rows_per_worker;
    let input = coordinator_input(comm, matrix, n);

    let mut full = match input {
        Some(src) => src.to_vec(),
        None => alloc_or_abort(comm, n * n),
    };
    comm.broadcast(ROOT, &mut full).or_abort(comm);
    if cfg.verbosity >= 2 {
        debug!(rank, n, rows, "all-to-all transpose: matrix broadcast");
    }

    let mut send = alloc_or_abort(comm, part.block_len());
    let mut recv = alloc_or_abort(comm, part.block_len());
    let mut band = alloc_or_abort(comm, part.block_len());
    let mut out = alloc_or_abort(comm, n * n);
    pack_blocks(&full, &mut send, rank, rows, n);

    comm.barrier().or_abort(comm);
    let start = Instant::now();

    comm.all_to_all(&send, &mut recv).or_abort(comm);
    unpack_band(&recv, &mut band, rows, n);
    comm.all_gather(&band, &mut out).or_abort(comm);

    let elapsed = start.elapsed();
    if cfg.verbosity >= 1 && rank == ROOT {
        info!(n, size, ?elapsed, "all-to-all transpose");
    }
    Ok(Timed::new(Matrix::from_vec(n, out)?, elapsed))
}

/// Block `(rank, p)` of the input, transposed, goes to chunk `p` of `send`.
fn pack_blocks(full: &[f32], send: &mut [f32], rank: usize, rows: usize, n: usize) {
    let bb = rows * rows;
    for (p, chunk) in send.chunks_mut(bb.max(1)).enumerate() {
        for i in 0..rows {
            let src = &full[(rank * rows + i) * n + p * rows..][..rows];
            for (j, &v) in src.iter().enumerate() {
                chunk[j * rows + i] = v;
            }
        }
    }
}

/// Chunk `p` of `recv` is block `(rank, p)` of the transpose; lay the
/// chunks side by side into this rank's `rows × n` row band.
fn unpack_band(recv: &[f32], band: &mut [f32], rows: usize, n: usize) {
    let bb = rows * rows;
    for (p, chunk) in recv.chunks(bb.max(1)).enumerate() {
        for j in 0..rows {
            band[j * n + p * rows..][..rows].copy_from_slice(&chunk[j * rows..(j + 1) * rows]);
        }
    }
}
