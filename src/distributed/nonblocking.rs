//! Row-block transpose on non-blocking collectives.

use std::time::Instant;

use tracing::{debug, info};

use crate::config::{KernelConfig, Timed};
use crate::decomp::compute_partition;
use crate::distributed::row_block::{local_contribution, reassemble};
use crate::distributed::{Communicator, OrAbort, ROOT, alloc_or_abort, coordinator_input};
use crate::error::Result;
use crate::matrix::Matrix;

/// Distributed transpose that overlaps communication with setup work.
///
/// Same decomposition as [`transpose_row_block`], but the scatter is only
/// posted, and the rank allocates its contribution and gather buffers
/// while it is in flight. It waits on the scatter right before the local
/// transpose needs the rows. The gather side is an all-gather, so every
/// rank ends up with the result; while it is in flight the rank releases
/// its input rows and allocates the output matrix.
///
/// A pending [`Request`] borrows the buffers it was posted with, so the
/// compiler rejects any read of `local` before the scatter's wait, or any
/// reuse of `local_t` before the gather's.
///
/// [`transpose_row_block`]: super::transpose_row_block
/// [`Request`]: super::Request
pub fn transpose_nonblocking<C: Communicator + ?Sized>(
    comm: &C,
    matrix: Option<&Matrix>,
    n: usize,
    cfg: &KernelConfig,
) -> Result<Timed<Matrix>> {
    let rank = comm.rank();
    let part = compute_partition(n, comm.size()).check()?;
    let rows = part.rows_per_worker;
    let input = coordinator_input(comm, matrix, n);

    let mut local = alloc_or_abort(comm, part.block_len());
    let scatter = comm.iscatter(ROOT, input, &mut local).or_abort(comm);
    if cfg.verbosity >= 2 {
        debug!(rank, n, rows, "non-blocking transpose: scatter posted");
    }

    let mut local_t = alloc_or_abort(comm, part.block_len());
    let mut gathered = alloc_or_abort(comm, n * n);

    scatter.wait().or_abort(comm);
    comm.barrier().or_abort(comm);
    let start = Instant::now();

    local_contribution(&local, &mut local_t, rows, n);
    let gather = comm.iall_gather(&local_t, &mut gathered).or_abort(comm);
    drop(local);
    let mut out = alloc_or_abort(comm, n * n);
    gather.wait().or_abort(comm);
    reassemble(&gathered, &mut out, rows, n);

    let elapsed = start.elapsed();
    if cfg.verbosity >= 1 && rank == ROOT {
        info!(n, size = comm.size(), ?elapsed, "non-blocking transpose");
    }
    Ok(Timed::new(Matrix::from_vec(n, out)?, elapsed))
}
