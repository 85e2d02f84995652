//! Message-passing (distributed-memory) kernels.
//!
//! Ranks only talk through collectives on a [`Communicator`]: scatter,
//! gather, all-gather, broadcast, all-to-all and barrier, plus
//! non-blocking scatter and all-gather. There is no point-to-point
//! traffic.
//!
//! Available implementations:
//! - `row_block`: scatter rows, transpose locally, gather on the coordinator
//!   (also the distributed symmetry check)
//! - `alltoall`: broadcast, one all-to-all exchange, result on every rank
//! - `grid`: 2-D Cartesian blocks, block transpose done by gather addressing
//! - `nonblocking`: row-block with non-blocking collectives, result on every rank
//!
//! Transports: [`LocalGroup`] runs ranks as threads of one process. With
//! the `mpi` feature, `mpi::topology::SimpleCommunicator` implements
//! [`Communicator`] too, for ranks started by `mpirun`.
//!
//! Failure policy: a decomposition that doesn't fit is reported as an
//! [`Error`](crate::Error) on every rank before any allocation or
//! communication. Anything that goes wrong once communication has
//! started (a failed collective, a failed allocation) aborts the whole
//! group, since the other ranks can't be brought back in step locally.

pub mod alltoall;
pub mod grid;
pub mod local;
#[cfg(feature = "mpi")]
pub mod mpi_comm;
pub mod nonblocking;
pub mod row_block;

pub use alltoall::transpose_alltoall;
pub use grid::{BlockLayout, CartGrid, Subarray, transpose_grid};
pub use local::{LocalComm, LocalGroup};
pub use nonblocking::transpose_nonblocking;
pub use row_block::{
    is_symmetric, local_contribution, reassemble, scatter_rows, transpose_row_block,
};

use thiserror::Error;
use tracing::error;

use crate::error::{Error, try_zeroed};
use crate::matrix::Matrix;

/// Rank that owns the input and, for some strategies, the only copy of the result.
pub const ROOT: usize = 0;

/// Abort code for an allocation failure after communication started.
pub const ABORT_ALLOCATION: i32 = 2;
/// Abort code for a coordinator called without a usable input matrix.
pub const ABORT_INPUT: i32 = 3;

/// Which collective a rank entered. Every rank of a group must enter the
/// same sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collective {
    Barrier,
    Broadcast,
    Scatter,
    Gather,
    AllGather,
    AllToAll,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommError {
    #[error("group aborted by rank {rank} with code {code}")]
    Aborted { rank: usize, code: i32 },

    #[error("root {root} is outside a group of {size}")]
    InvalidRoot { root: usize, size: usize },

    #[error("buffer holds {actual} elements, collective needs {expected}")]
    BufferLength { expected: usize, actual: usize },

    #[error("rank {rank} is the root of a {op:?} but passed no buffer")]
    MissingBuffer { rank: usize, op: Collective },

    #[error("collective mismatch: ranks disagree ({first:?} vs {other:?})")]
    Mismatch { first: Collective, other: Collective },
}

impl CommError {
    /// Exit code carried by the abort this error triggers.
    pub fn code(&self) -> i32 {
        match self {
            CommError::Aborted { code, .. } => *code,
            CommError::InvalidRoot { .. } => 10,
            CommError::BufferLength { .. } => 11,
            CommError::MissingBuffer { .. } => 12,
            CommError::Mismatch { .. } => 13,
        }
    }
}

pub type CommResult<T> = std::result::Result<T, CommError>;

/// A non-blocking collective in flight.
///
/// Holds the borrows of the buffers it was posted with, so neither the
/// send nor the receive buffer can be touched until [`Request::wait`]
/// has returned.
#[must_use = "a posted collective has to be waited on"]
pub struct Request<'a> {
    complete: Box<dyn FnOnce() -> CommResult<()> + 'a>,
}

impl<'a> Request<'a> {
    pub fn new(complete: impl FnOnce() -> CommResult<()> + 'a) -> Self {
        Self {
            complete: Box::new(complete),
        }
    }

    /// Block until the collective completes and the receive buffer is filled.
    pub fn wait(self) -> CommResult<()> {
        (self.complete)()
    }
}

/// A group of cooperating ranks and the collectives they can run.
///
/// Every rank has to call the same collectives in the same order. A call
/// returns once this rank's part of the step is done.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn barrier(&self) -> CommResult<()>;

    /// Copy `buf` from `root` into `buf` on every other rank.
    fn broadcast(&self, root: usize, buf: &mut [f32]) -> CommResult<()>;

    /// Split `send` (root only, `size * recv.len()` elements) into equal
    /// chunks; rank `r` receives chunk `r`.
    fn scatter(&self, root: usize, send: Option<&[f32]>, recv: &mut [f32]) -> CommResult<()>;

    /// Concatenate every rank's `send` in rank order into `recv` on `root`.
    fn gather(&self, root: usize, send: &[f32], recv: Option<&mut [f32]>) -> CommResult<()>;

    /// Like [`gather`](Communicator::gather), but every rank receives.
    fn all_gather(&self, send: &[f32], recv: &mut [f32]) -> CommResult<()>;

    /// Chunk `p` of this rank's `send` lands in chunk `rank` of rank `p`'s `recv`.
    fn all_to_all(&self, send: &[f32], recv: &mut [f32]) -> CommResult<()>;

    fn iscatter<'a>(
        &'a self,
        root: usize,
        send: Option<&'a [f32]>,
        recv: &'a mut [f32],
    ) -> CommResult<Request<'a>>;

    fn iall_gather<'a>(&'a self, send: &'a [f32], recv: &'a mut [f32]) -> CommResult<Request<'a>>;

    /// Tear down the whole group. Never returns.
    fn abort(&self, code: i32) -> !;

    fn broadcast_flag(&self, root: usize, flag: bool) -> CommResult<bool> {
        let mut buf = [if flag { 1.0 } else { 0.0 }];
        self.broadcast(root, &mut buf)?;
        Ok(buf[0] != 0.0)
    }
}

/// Turn a failed collective into a group abort.
pub(crate) trait OrAbort<T> {
    fn or_abort<C: Communicator + ?Sized>(self, comm: &C) -> T;
}

impl<T> OrAbort<T> for CommResult<T> {
    fn or_abort<C: Communicator + ?Sized>(self, comm: &C) -> T {
        match self {
            Ok(v) => v,
            Err(err) => {
                error!(rank = comm.rank(), %err, "collective failed, aborting group");
                comm.abort(err.code())
            }
        }
    }
}

/// Allocate once communication is underway; failure takes the group down.
pub(crate) fn alloc_or_abort<C: Communicator + ?Sized>(comm: &C, elements: usize) -> Vec<f32> {
    match try_zeroed(elements) {
        Ok(buf) => buf,
        Err(err) => {
            error!(rank = comm.rank(), %err, "allocation failed, aborting group");
            comm.abort(ABORT_ALLOCATION)
        }
    }
}

/// The coordinator's flat input. Other ranks get `None`.
///
/// A coordinator without a matching matrix can't tell the other ranks,
/// which are already on their way into the first collective, so it aborts.
pub(crate) fn coordinator_input<'m, C: Communicator + ?Sized>(
    comm: &C,
    matrix: Option<&'m Matrix>,
    n: usize,
) -> Option<&'m [f32]> {
    if comm.rank() != ROOT {
        return None;
    }
    let err = match matrix {
        Some(m) if m.dim() == n => return Some(m.as_slice()),
        Some(m) => Error::DimensionMismatch {
            expected: n * n,
            actual: m.as_slice().len(),
        },
        None => Error::MissingInput { rank: comm.rank() },
    };
    error!(rank = comm.rank(), %err, "bad coordinator input, aborting group");
    comm.abort(ABORT_INPUT)
}
