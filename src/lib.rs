//! Matrix symmetry check and transpose, three ways.
//!
//! The same two operations, written for three kinds of parallelism:
//! a plain sequential loop, a shared-memory thread pool, and a group of
//! message-passing ranks. It's mostly about what each tier costs: cache
//! misses on the column-wise reads, scheduling overhead in the pool, and
//! the data movement between ranks.
//!
//! ## Usage
//!
//! ```
//! use mattrans::{transpose, Matrix};
//!
//! let m = Matrix::random(64, 42);
//! let t = transpose(&m).unwrap();
//! assert_eq!(t[(3, 5)], m[(5, 3)]);
//! ```
//!
//! For large matrices, use the multi-threaded version:
//!
//! ```
//! use mattrans::{transpose_parallel, KernelConfig, Matrix};
//!
//! let m = Matrix::random(512, 42);
//! let t = transpose_parallel(&m, &KernelConfig::new(4, 32)).unwrap();
//! assert_eq!(t[(3, 5)], m[(5, 3)]);
//! ```
//!
//! Distributed kernels run on any [`Communicator`]. [`LocalGroup`] runs a
//! group in-process, one thread per rank:
//!
//! ```
//! use mattrans::{DistributedKernel, KernelConfig, LocalGroup, Matrix};
//!
//! let m = Matrix::random(16, 1);
//! let results = LocalGroup::run(4, |comm| {
//!     DistributedKernel::RowBlock
//!         .transpose(comm, Some(&m), 16, &KernelConfig::default())
//!         .map(|t| t.value)
//! })
//! .unwrap();
//! assert!(results[0].as_ref().unwrap().is_some());
//! ```
//!
//! ## What's inside
//!
//! - Sequential reference, tiled and cache-oblivious transposes
//! - Rayon kernels: row-parallel, dynamic tiles, static bands, tasks, recursive quarters
//! - Symmetry check with cooperative early exit
//! - Row-block, all-to-all, 2-D grid and non-blocking distributed transposes

pub mod config;
pub mod decomp;
pub mod distributed;
pub mod error;
pub mod kernel;
pub mod matrix;
pub mod threaded;

pub use config::{KernelConfig, Timed};
pub use decomp::{Grid, Partition, compute_grid, compute_partition};
pub use distributed::{Communicator, LocalComm, LocalGroup};
pub use error::{Error, Result};
pub use kernel::{DistributedKernel, SharedKernel, SymmetryKernel};
pub use matrix::Matrix;
pub use matrix::sequential;

/// Transpose into a new matrix, single-threaded.
///
/// Falls back to the plain loop for small matrices, where tiling buys
/// nothing.
pub fn transpose(m: &Matrix) -> Result<Matrix> {
    if m.dim() < 64 {
        return sequential::transpose(m);
    }
    sequential::transpose_blocked(m, 32)
}

/// Same as [`transpose`] but uses `cfg.threads` workers.
///
/// Small matrices stay on the calling thread: spinning up a pool costs
/// more than the copy.
pub fn transpose_parallel(m: &Matrix, cfg: &KernelConfig) -> Result<Matrix> {
    cfg.validate()?;
    if m.dim() < 128 || cfg.threads == 1 {
        return sequential::transpose_blocked(m, cfg.block_size);
    }
    Ok(threaded::transpose_blocked_mt(m, cfg)?.into_inner())
}

/// `true` when `m` equals its transpose, bit for bit.
pub fn is_symmetric(m: &Matrix) -> bool {
    sequential::is_symmetric(m)
}
