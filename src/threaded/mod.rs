//! Multi-threaded (shared-memory) kernels.
//!
//! Every kernel here builds a rayon pool from its [`KernelConfig`] and runs
//! one fork-join region inside it. Results are bit-identical to the
//! sequential oracle.
//!
//! Available implementations:
//! - `naive_mt`: row-parallel copy, result rows allocated in their own parallel phase
//! - `blocked_mt`: square tiles, dynamically scheduled (work stealing)
//! - `tiled_mt`: square tiles, statically assigned bands per worker
//! - `tasks_mt`: one task per tile, spawned by a single producer
//! - `oblivious_mt`: recursive quartering, four parallel tasks per level
//! - `symmetric_mt`: symmetry check with cooperative early exit
//!
//! [`KernelConfig`]: crate::config::KernelConfig

pub mod blocked_mt;
pub mod naive_mt;
pub mod oblivious_mt;
pub mod symmetric_mt;
pub mod tasks_mt;
pub mod tiled_mt;

pub use blocked_mt::transpose_blocked_mt;
pub use naive_mt::transpose_naive_mt;
pub use oblivious_mt::transpose_oblivious_mt;
pub use symmetric_mt::{MismatchFlag, ScanState, is_symmetric_mt};
pub use tasks_mt::transpose_tasks_mt;
pub use tiled_mt::transpose_tiled_mt;

use std::ops::Range;

/// Raw output pointer handed to several workers at once.
///
/// # Safety
/// Whoever writes through it must own the target cells exclusively: the
/// tile and quadrant kernels hand every worker a region of the output no
/// other worker touches, and the buffer outlives the fork-join region.
#[derive(Clone, Copy)]
pub(crate) struct SendPtr(*mut f32);

unsafe impl Send for SendPtr {}
unsafe impl Sync for SendPtr {}

impl SendPtr {
    pub(crate) fn new(buf: &mut [f32]) -> Self {
        Self(buf.as_mut_ptr())
    }

    /// Write `dst[r][c] = src[c][r]` for the given ranges of an n×n matrix.
    ///
    /// # Safety
    /// The cells `(rows × cols)` must be in bounds and written by this
    /// worker only.
    #[inline]
    pub(crate) unsafe fn write_tile(
        self,
        src: &[f32],
        n: usize,
        rows: Range<usize>,
        cols: Range<usize>,
    ) {
        for r in rows {
            for c in cols.clone() {
                unsafe { *self.0.add(r * n + c) = src[c * n + r] };
            }
        }
    }
}

/// Tile origins `(row, col)` of an n×n matrix cut into `block`-sized tiles,
/// row-major over tiles.
pub(crate) fn tile_origins(n: usize, block: usize) -> Vec<(usize, usize)> {
    let mut tiles = Vec::new();
    for i in (0..n).step_by(block) {
        for j in (0..n).step_by(block) {
            tiles.push((i, j));
        }
    }
    tiles
}

/// Clipped row and column ranges of the tile starting at `(i, j)`.
#[inline]
pub(crate) fn tile_ranges(
    i: usize,
    j: usize,
    n: usize,
    block: usize,
) -> (Range<usize>, Range<usize>) {
    (i..(i + block).min(n), j..(j + block).min(n))
}
