//! Tiled transpose with dynamic tile scheduling.

use rayon::prelude::*;

use crate::config::{KernelConfig, Timed, timed};
use crate::error::Result;
use crate::matrix::Matrix;
use crate::threaded::{SendPtr, tile_origins, tile_ranges};

/// Multi-threaded transpose over `block_size × block_size` tiles.
///
/// The whole tile grid is one flat iteration space and every tile is its
/// own stealable unit, so idle workers pick up tiles as they free up.
/// Tiles at the right and bottom edges are clipped to `n`.
pub fn transpose_blocked_mt(m: &Matrix, cfg: &KernelConfig) -> Result<Timed<Matrix>> {
    let pool = cfg.thread_pool()?;
    let n = m.dim();
    let block = cfg.block_size;
    let src = m.as_slice();
    let tiles = tile_origins(n, block);
    let mut out = Matrix::zeros(n)?;
    let dst = SendPtr::new(out.as_mut_slice());

    let t = pool.install(|| {
        timed(|| {
            tiles.par_iter().with_max_len(1).for_each(|&(i, j)| {
                let (rows, cols) = tile_ranges(i, j, n, block);
                // SAFETY: tiles partition the output, each one is visited once.
                unsafe { dst.write_tile(src, n, rows, cols) };
            });
        })
    });

    Ok(Timed::new(out, t.elapsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::sequential::transpose;

    #[test]
    fn test_blocked_mt_correctness() {
        for n in [1, 7, 16, 33, 128] {
            let m = Matrix::random(n, n as u64);
            let expected = transpose(&m).unwrap();
            for block in [1, 4, 16, 200] {
                let got = transpose_blocked_mt(&m, &KernelConfig::new(4, block))
                    .unwrap()
                    .value;
                assert_eq!(got, expected, "n={n} block={block}");
            }
        }
    }
}
