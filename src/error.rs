//! Error types shared by every kernel tier.

use thiserror::Error;

use crate::distributed::CommError;

/// Everything a kernel can report back to its caller.
///
/// Decomposition errors are recoverable: they are returned before any
/// allocation or communication, on every rank alike. Communication
/// failures never reach the caller of a distributed kernel; the rank that
/// sees one aborts the group instead.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to allocate {elements} f32 elements")]
    Allocation { elements: usize },

    #[error("matrix dimension {n} is not divisible by {workers} workers")]
    Decomposition { n: usize, workers: usize },

    #[error("process count {size} is not a perfect square")]
    GridNotSquare { size: usize },

    #[error("matrix dimension {n} is not divisible by grid dimension {dim}")]
    GridIndivisible { n: usize, dim: usize },

    #[error("matrix dimension {n} is not a power of two")]
    NotPowerOfTwo { n: usize },

    #[error("block size must be at least 1")]
    InvalidBlockSize,

    #[error("thread count must be at least 1")]
    InvalidThreadCount,

    #[error("a process group needs at least one rank")]
    EmptyGroup,

    #[error("expected {expected} elements, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("rank {rank} is the coordinator but was given no input matrix")]
    MissingInput { rank: usize },

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Communication(#[from] CommError),

    #[error("rank {rank} aborted the group with code {code}")]
    Aborted { rank: usize, code: i32 },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Allocate a zeroed buffer, reporting failure instead of aborting the process.
pub(crate) fn try_zeroed(elements: usize) -> Result<Vec<f32>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(elements)
        .map_err(|_| Error::Allocation { elements })?;
    buf.resize(elements, 0.0);
    Ok(buf)
}
