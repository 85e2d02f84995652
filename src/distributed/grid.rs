//! 2-D Cartesian-grid transpose.
//!
//! Ranks form a `dim × dim` grid and each one owns a single
//! `block × block` submatrix. Transposing the matrix is two independent
//! transposes: the elements inside every block, done locally, and the
//! blocks themselves, which never get touched locally. Block `(i, j)`
//! has to end up at `(j, i)`, and that happens purely through
//! addressing: blocks are scattered by the coordinates of one grid and
//! gathered by the coordinates of a second grid with rows and columns
//! swapped. The same trick carries over to PUMMA-style dense linear
//! algebra.

use std::time::Instant;

use tracing::{debug, info};

use crate::config::{KernelConfig, Timed};
use crate::decomp::{compute_grid, compute_partition};
use crate::distributed::{Communicator, OrAbort, ROOT, alloc_or_abort, coordinator_input};
use crate::error::Result;
use crate::matrix::Matrix;

/// Row-major process grid: rank `r` sits at `(r / dim, r % dim)`, or at
/// `(r % dim, r / dim)` in the transposed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartGrid {
    dim: usize,
    transposed: bool,
}

impl CartGrid {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            transposed: false,
        }
    }

    /// Same ranks, row and column coordinates swapped.
    pub fn transposed(self) -> Self {
        Self {
            transposed: !self.transposed,
            ..self
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn coords(&self, rank: usize) -> (usize, usize) {
        let (row, col) = (rank / self.dim, rank % self.dim);
        if self.transposed { (col, row) } else { (row, col) }
    }

    pub fn rank_of(&self, (row, col): (usize, usize)) -> usize {
        if self.transposed {
            col * self.dim + row
        } else {
            row * self.dim + col
        }
    }
}

/// A strided `block × block` window of an n×n row-major buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subarray {
    pub n: usize,
    pub block: usize,
    /// Block coordinates; the window starts at element `(row * block, col * block)`.
    pub origin: (usize, usize),
}

impl Subarray {
    fn offset(&self, r: usize) -> usize {
        let (row, col) = self.origin;
        (row * self.block + r) * self.n + col * self.block
    }

    /// Copy the window out into `packed`, row-major.
    pub fn pack(&self, src: &[f32], packed: &mut [f32]) {
        for r in 0..self.block {
            let at = self.offset(r);
            packed[r * self.block..(r + 1) * self.block].copy_from_slice(&src[at..at + self.block]);
        }
    }

    /// Copy a row-major `packed` block into the window.
    pub fn unpack(&self, packed: &[f32], dst: &mut [f32]) {
        for r in 0..self.block {
            let at = self.offset(r);
            dst[at..at + self.block].copy_from_slice(&packed[r * self.block..(r + 1) * self.block]);
        }
    }
}

/// Where every rank's block lives in the full matrix, per some grid.
///
/// Plays the part of a subarray datatype with per-rank displacements:
/// it lets one scatter or gather move strided regions, rank by rank.
#[derive(Debug, Clone, Copy)]
pub struct BlockLayout {
    pub grid: CartGrid,
    pub n: usize,
    pub block: usize,
}

impl BlockLayout {
    pub fn subarray(&self, rank: usize) -> Subarray {
        Subarray {
            n: self.n,
            block: self.block,
            origin: self.grid.coords(rank),
        }
    }

    /// Lay out every rank's block contiguously, in rank order.
    pub fn pack(&self, src: &[f32], packed: &mut [f32]) {
        let bb = self.block * self.block;
        for (rank, out) in packed.chunks_mut(bb.max(1)).enumerate() {
            self.subarray(rank).pack(src, out);
        }
    }

    pub fn unpack(&self, packed: &[f32], dst: &mut [f32]) {
        let bb = self.block * self.block;
        for (rank, chunk) in packed.chunks(bb.max(1)).enumerate() {
            self.subarray(rank).unpack(chunk, dst);
        }
    }
}

/// Distributed transpose over a square process grid.
///
/// `n` must be divisible by `size`, `size` must be a perfect square and
/// `n` divisible by its root; otherwise every rank returns the same error
/// before communicating.
/// Returns `Some(matrix)` on rank 0, `None` elsewhere.
pub fn transpose_grid<C: Communicator + ?Sized>(
    comm: &C,
    matrix: Option<&Matrix>,
    n: usize,
    cfg: &KernelConfig,
) -> Result<Timed<Option<Matrix>>> {
    let rank = comm.rank();
    compute_partition(n, comm.size()).check()?;
    let grid = compute_grid(comm.size()).check()?;
    let block = grid.block_for(n)?;
    let input = coordinator_input(comm, matrix, n);

    let cart = CartGrid::new(grid.dim);
    let scatter_layout = BlockLayout { grid: cart, n, block };
    let gather_layout = BlockLayout {
        grid: cart.transposed(),
        n,
        block,
    };

    let packed = input.map(|src| {
        let mut packed = alloc_or_abort(comm, n * n);
        scatter_layout.pack(src, &mut packed);
        packed
    });
    let mut local = Matrix::from_vec(block, alloc_or_abort(comm, block * block))?;
    let mut gathered = (rank == ROOT).then(|| alloc_or_abort(comm, n * n));
    let mut out = (rank == ROOT).then(|| alloc_or_abort(comm, n * n));

    comm.scatter(ROOT, packed.as_deref(), local.as_mut_slice())
        .or_abort(comm);
    if cfg.verbosity >= 2 {
        debug!(rank, coords = ?cart.coords(rank), block, "grid transpose: block received");
    }
    comm.barrier().or_abort(comm);
    let start = Instant::now();

    local.transpose_in_place();
    comm.gather(ROOT, local.as_slice(), gathered.as_deref_mut())
        .or_abort(comm);
    if let (Some(g), Some(o)) = (&gathered, &mut out) {
        gather_layout.unpack(g, o);
    }

    let elapsed = start.elapsed();
    if cfg.verbosity >= 1 && rank == ROOT {
        info!(n, dim = grid.dim, ?elapsed, "grid transpose");
    }
    let result = out.map(|o| Matrix::from_vec(n, o)).transpose()?;
    Ok(Timed::new(result, elapsed))
}
