//! Tiled transpose with a static, precomputed schedule.

use crate::config::{KernelConfig, Timed, timed};
use crate::error::Result;
use crate::matrix::Matrix;

/// Multi-threaded transpose with tiles assigned up front.
///
/// Rows of tiles are dealt out in contiguous bands, one band per worker,
/// before any work starts. Nothing is stolen or rebalanced: when tiles
/// cost the same, this skips the scheduling overhead of
/// [`transpose_blocked_mt`](super::transpose_blocked_mt). Each band is a
/// contiguous slice of output rows, so workers get a plain `&mut` slice.
pub fn transpose_tiled_mt(m: &Matrix, cfg: &KernelConfig) -> Result<Timed<Matrix>> {
    let pool = cfg.thread_pool()?;
    let n = m.dim();
    let block = cfg.block_size;
    let src = m.as_slice();
    let mut out = Matrix::zeros(n)?;

    let band_rows = band_rows(n, block, cfg.threads);
    let dst = out.as_mut_slice();

    let t = pool.install(|| {
        timed(|| {
            if band_rows == 0 {
                return;
            }
            rayon::scope(|s| {
                for (w, band) in dst.chunks_mut(band_rows * n).enumerate() {
                    s.spawn(move |_| {
                        let first = w * band_rows;
                        let last = (first + band_rows).min(n);
                        transpose_band(src, band, n, block, first, last);
                    });
                }
            });
        })
    });

    Ok(Timed::new(out, t.elapsed))
}

/// Output rows per worker: whole tile rows, spread as evenly as possible.
fn band_rows(n: usize, block: usize, workers: usize) -> usize {
    let tile_rows = n.div_ceil(block);
    tile_rows.div_ceil(workers.max(1)) * block
}

/// Fill output rows `[first, last)`; `band` starts at row `first`.
fn transpose_band(
    src: &[f32],
    band: &mut [f32],
    n: usize,
    block: usize,
    first: usize,
    last: usize,
) {
    for i in (first..last).step_by(block) {
        let i_end = (i + block).min(last);
        for j in (0..n).step_by(block) {
            let j_end = (j + block).min(n);
            for r in i..i_end {
                let out = &mut band[(r - first) * n..(r - first + 1) * n];
                for c in j..j_end {
                    out[c] = src[c * n + r];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::sequential::transpose;

    #[test]
    fn test_tiled_mt_correctness() {
        for n in [1, 9, 32, 65] {
            let m = Matrix::random(n, 42);
            let expected = transpose(&m).unwrap();
            for (threads, block) in [(1, 4), (3, 4), (4, 8), (8, 1), (2, 100)] {
                let got = transpose_tiled_mt(&m, &KernelConfig::new(threads, block))
                    .unwrap()
                    .value;
                assert_eq!(got, expected, "n={n} threads={threads} block={block}");
            }
        }
    }

    #[test]
    fn test_band_rows_static_split() {
        // 16 rows, 4-row tiles, 2 workers: two bands of 8 rows
        assert_eq!(band_rows(16, 4, 2), 8);
        // more workers than tile rows: one tile row each
        assert_eq!(band_rows(16, 4, 8), 4);
        assert_eq!(band_rows(10, 4, 2), 8);
    }
}
