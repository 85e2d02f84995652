//! Task-per-tile transpose.

use crate::config::{KernelConfig, Timed, timed};
use crate::error::Result;
use crate::matrix::Matrix;
use crate::threaded::{SendPtr, tile_ranges};

/// Multi-threaded transpose where a single producer spawns one task per tile.
///
/// The producer walks the tile grid and fires off a task for each tile
/// with no ordering between them. There is no per-task join: the end of
/// the scope is the one barrier, and the result is complete only after it.
pub fn transpose_tasks_mt(m: &Matrix, cfg: &KernelConfig) -> Result<Timed<Matrix>> {
    let pool = cfg.thread_pool()?;
    let n = m.dim();
    let block = cfg.block_size;
    let src = m.as_slice();
    let mut out = Matrix::zeros(n)?;
    let dst = SendPtr::new(out.as_mut_slice());

    let t = pool.install(|| {
        timed(|| {
            rayon::scope(|s| {
                for i in (0..n).step_by(block) {
                    for j in (0..n).step_by(block) {
                        s.spawn(move |_| {
                            let (rows, cols) = tile_ranges(i, j, n, block);
                            // SAFETY: one task per tile, tiles are disjoint.
                            unsafe { dst.write_tile(src, n, rows, cols) };
                        });
                    }
                }
            });
        })
    });

    Ok(Timed::new(out, t.elapsed))
}
