//! Row and grid partitioning.
//!
//! Pure arithmetic: no allocation, no communication. Every rank of a
//! distributed kernel evaluates these on values it already shares with
//! the others (`n` and the group size), so all ranks reach the same
//! verdict without exchanging a message.

use std::ops::Range;

use crate::error::{Error, Result};

/// Contiguous row split of an n×n matrix across `workers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub n: usize,
    pub workers: usize,
    pub rows_per_worker: usize,
    pub valid: bool,
}

pub fn compute_partition(n: usize, workers: usize) -> Partition {
    let valid = workers > 0 && n % workers == 0;
    Partition {
        n,
        workers,
        rows_per_worker: if valid { n / workers } else { 0 },
        valid,
    }
}

impl Partition {
    pub fn check(self) -> Result<Self> {
        if self.valid {
            Ok(self)
        } else {
            Err(Error::Decomposition {
                n: self.n,
                workers: self.workers,
            })
        }
    }

    /// Rows owned by `worker`: `[worker * rows, (worker + 1) * rows)`.
    pub fn range(&self, worker: usize) -> Range<usize> {
        let start = worker * self.rows_per_worker;
        start..start + self.rows_per_worker
    }

    /// Elements in one worker's row block.
    pub fn block_len(&self) -> usize {
        self.rows_per_worker * self.n
    }
}

/// Square process grid for the 2-D decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub size: usize,
    pub dim: usize,
    pub valid: bool,
}

pub fn compute_grid(size: usize) -> Grid {
    let dim = isqrt(size);
    Grid {
        size,
        dim,
        valid: size > 0 && dim * dim == size,
    }
}

impl Grid {
    pub fn check(self) -> Result<Self> {
        if self.valid {
            Ok(self)
        } else {
            Err(Error::GridNotSquare { size: self.size })
        }
    }

    /// Edge of the square block each rank owns for an n×n matrix.
    pub fn block_for(&self, n: usize) -> Result<usize> {
        let grid = self.check()?;
        if n % grid.dim != 0 {
            return Err(Error::GridIndivisible { n, dim: grid.dim });
        }
        Ok(n / grid.dim)
    }
}

fn isqrt(x: usize) -> usize {
    let mut r = (x as f64).sqrt() as usize;
    while r * r > x {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= x {
        r += 1;
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_invalid() {
        let p = compute_partition(10, 3);
        assert!(!p.valid);
        assert!(matches!(
            p.check(),
            Err(Error::Decomposition { n: 10, workers: 3 })
        ));
        assert!(!compute_partition(8, 0).valid);
    }

    #[test]
    fn test_partition_valid() {
        let p = compute_partition(16, 4);
        assert!(p.valid);
        assert_eq!(p.rows_per_worker, 4);
        assert_eq!(p.range(2), 8..12);
        assert_eq!(p.block_len(), 64);
    }

    #[test]
    fn test_partition_covers_all_rows_once() {
        let p = compute_partition(24, 6);
        let mut seen = vec![0; 24];
        for w in 0..p.workers {
            for r in p.range(w) {
                seen[r] += 1;
            }
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_grid() {
        let g = compute_grid(9);
        assert!(g.valid);
        assert_eq!(g.dim, 3);
        assert!(!compute_grid(8).valid);
        assert!(compute_grid(1).valid);
        assert!(!compute_grid(0).valid);
        assert!(matches!(
            compute_grid(8).check(),
            Err(Error::GridNotSquare { size: 8 })
        ));
    }

    #[test]
    fn test_grid_block() {
        assert_eq!(compute_grid(4).block_for(8).unwrap(), 4);
        assert!(matches!(
            compute_grid(9).block_for(8),
            Err(Error::GridIndivisible { n: 8, dim: 3 })
        ));
    }
}
