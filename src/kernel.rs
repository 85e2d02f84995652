//! Tagged dispatch over every strategy.
//!
//! The benchmark runner and the cross-strategy tests iterate over
//! `ALL` and call through one signature per tier.

use std::fmt;

use crate::config::{KernelConfig, Timed};
use crate::distributed::{self, Communicator};
use crate::error::Result;
use crate::matrix::{Matrix, sequential};
use crate::threaded;

/// A transpose strategy that runs inside one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SharedKernel {
    Sequential,
    SequentialBlocked,
    SequentialRecursive,
    Naive,
    Blocked,
    TileStatic,
    Tasks,
    CacheOblivious,
}

impl SharedKernel {
    pub const ALL: [SharedKernel; 8] = [
        SharedKernel::Sequential,
        SharedKernel::SequentialBlocked,
        SharedKernel::SequentialRecursive,
        SharedKernel::Naive,
        SharedKernel::Blocked,
        SharedKernel::TileStatic,
        SharedKernel::Tasks,
        SharedKernel::CacheOblivious,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SharedKernel::Sequential => "sequential",
            SharedKernel::SequentialBlocked => "seq-blocked",
            SharedKernel::SequentialRecursive => "seq-recursive",
            SharedKernel::Naive => "naive-mt",
            SharedKernel::Blocked => "blocked-mt",
            SharedKernel::TileStatic => "tiled-mt",
            SharedKernel::Tasks => "tasks-mt",
            SharedKernel::CacheOblivious => "oblivious-mt",
        }
    }

    /// Whether `cfg.threads` matters.
    pub fn is_threaded(self) -> bool {
        !matches!(
            self,
            SharedKernel::Sequential
                | SharedKernel::SequentialBlocked
                | SharedKernel::SequentialRecursive
        )
    }

    /// Whether `cfg.block_size` matters.
    pub fn uses_block_size(self) -> bool {
        !matches!(self, SharedKernel::Sequential | SharedKernel::Naive)
    }

    /// The recursive kernels only accept power-of-two dimensions.
    pub fn requires_power_of_two(self) -> bool {
        matches!(
            self,
            SharedKernel::SequentialRecursive | SharedKernel::CacheOblivious
        )
    }

    pub fn transpose(self, m: &Matrix, cfg: &KernelConfig) -> Result<Timed<Matrix>> {
        match self {
            SharedKernel::Sequential => sequential::transpose_timed(m),
            SharedKernel::SequentialBlocked => {
                sequential::transpose_blocked_timed(m, cfg.block_size)
            }
            SharedKernel::SequentialRecursive => {
                sequential::transpose_recursive_timed(m, cfg.block_size)
            }
            SharedKernel::Naive => threaded::transpose_naive_mt(m, cfg),
            SharedKernel::Blocked => threaded::transpose_blocked_mt(m, cfg),
            SharedKernel::TileStatic => threaded::transpose_tiled_mt(m, cfg),
            SharedKernel::Tasks => threaded::transpose_tasks_mt(m, cfg),
            SharedKernel::CacheOblivious => threaded::transpose_oblivious_mt(m, cfg),
        }
    }
}

impl fmt::Display for SharedKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A symmetry check that runs inside one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymmetryKernel {
    Sequential,
    Cooperative,
}

impl SymmetryKernel {
    pub const ALL: [SymmetryKernel; 2] = [SymmetryKernel::Sequential, SymmetryKernel::Cooperative];

    pub fn name(self) -> &'static str {
        match self {
            SymmetryKernel::Sequential => "sym-sequential",
            SymmetryKernel::Cooperative => "sym-cooperative",
        }
    }

    pub fn is_symmetric(self, m: &Matrix, cfg: &KernelConfig) -> Result<Timed<bool>> {
        match self {
            SymmetryKernel::Sequential => Ok(sequential::is_symmetric_timed(m)),
            SymmetryKernel::Cooperative => threaded::is_symmetric_mt(m, cfg),
        }
    }
}

impl fmt::Display for SymmetryKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A transpose strategy spread over the ranks of a [`Communicator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistributedKernel {
    RowBlock,
    AllToAll,
    Grid,
    NonBlocking,
}

impl DistributedKernel {
    pub const ALL: [DistributedKernel; 4] = [
        DistributedKernel::RowBlock,
        DistributedKernel::AllToAll,
        DistributedKernel::Grid,
        DistributedKernel::NonBlocking,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DistributedKernel::RowBlock => "row-block",
            DistributedKernel::AllToAll => "all-to-all",
            DistributedKernel::Grid => "grid-2d",
            DistributedKernel::NonBlocking => "non-blocking",
        }
    }

    /// `true` when every rank gets the result, `false` when only rank 0 does.
    pub fn result_on_every_rank(self) -> bool {
        matches!(
            self,
            DistributedKernel::AllToAll | DistributedKernel::NonBlocking
        )
    }

    /// Run on one rank. Every rank of `comm` has to make the same call;
    /// `matrix` is only read on rank 0.
    pub fn transpose<C: Communicator + ?Sized>(
        self,
        comm: &C,
        matrix: Option<&Matrix>,
        n: usize,
        cfg: &KernelConfig,
    ) -> Result<Timed<Option<Matrix>>> {
        match self {
            DistributedKernel::RowBlock => distributed::transpose_row_block(comm, matrix, n, cfg),
            DistributedKernel::AllToAll => {
                Ok(distributed::transpose_alltoall(comm, matrix, n, cfg)?.map(Some))
            }
            DistributedKernel::Grid => distributed::transpose_grid(comm, matrix, n, cfg),
            DistributedKernel::NonBlocking => {
                Ok(distributed::transpose_nonblocking(comm, matrix, n, cfg)?.map(Some))
            }
        }
    }
}

impl fmt::Display for DistributedKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::{LocalGroup, ROOT};
    use crate::error::Error;

    #[test]
    fn test_shared_kernels_agree() {
        let m = Matrix::random(32, 5);
        let expected = sequential::transpose(&m).unwrap();
        let cfg = KernelConfig::new(3, 4);
        for k in SharedKernel::ALL {
            assert_eq!(k.transpose(&m, &cfg).unwrap().value, expected, "{k}");
        }
    }

    #[test]
    fn test_recursive_kernels_reject_odd_dims() {
        let m = Matrix::random(12, 5);
        let cfg = KernelConfig::new(2, 4);
        for k in SharedKernel::ALL {
            let res = k.transpose(&m, &cfg);
            if k.requires_power_of_two() {
                assert!(matches!(res, Err(Error::NotPowerOfTwo { n: 12 })), "{k}");
            } else {
                assert!(res.is_ok(), "{k}");
            }
        }
    }

    #[test]
    fn test_symmetry_kernels() {
        let m = Matrix::random_symmetric(16, 2);
        for k in SymmetryKernel::ALL {
            assert!(k.is_symmetric(&m, &KernelConfig::default()).unwrap().value);
        }
    }

    #[test]
    fn test_distributed_result_placement() {
        let n = 8;
        let m = Matrix::random(n, 9);
        let expected = sequential::transpose(&m).unwrap();
        for k in DistributedKernel::ALL {
            let out = LocalGroup::run(4, |c| {
                let input = (c.rank() == ROOT).then_some(&m);
                k.transpose(c, input, n, &KernelConfig::default())
                    .unwrap()
                    .value
            })
            .unwrap();
            assert_eq!(out[0].as_ref(), Some(&expected), "{k}");
            for t in &out[1..] {
                assert_eq!(t.is_some(), k.result_on_every_rank(), "{k}");
            }
        }
    }
}
