//! Cache-oblivious recursive transpose.

use crate::config::{KernelConfig, Timed, timed};
use crate::error::Result;
use crate::matrix::Matrix;
use crate::matrix::sequential::check_recursive;
use crate::threaded::SendPtr;

/// Multi-threaded recursive transpose.
///
/// Quarters the `size × size` problem on both matrices at once until
/// `size <= block_size`, then copies element by element. The four
/// quadrants of every level run as parallel tasks and are all joined
/// before the level returns. Halving only works out evenly from a power
/// of two, so any other `n` gets [`Error::NotPowerOfTwo`].
///
/// [`Error::NotPowerOfTwo`]: crate::error::Error::NotPowerOfTwo
pub fn transpose_oblivious_mt(m: &Matrix, cfg: &KernelConfig) -> Result<Timed<Matrix>> {
    let n = m.dim();
    check_recursive(n, cfg.block_size)?;
    let pool = cfg.thread_pool()?;
    let src = m.as_slice();
    let mut out = Matrix::zeros(n)?;
    let dst = SendPtr::new(out.as_mut_slice());

    let t = pool.install(|| {
        timed(|| {
            let q = Quadrant { row: 0, col: 0, size: n };
            q.transpose(src, dst, n, cfg.block_size);
        })
    });

    Ok(Timed::new(out, t.elapsed))
}

#[derive(Clone, Copy)]
struct Quadrant {
    row: usize,
    col: usize,
    size: usize,
}

impl Quadrant {
    fn transpose(self, src: &[f32], dst: SendPtr, n: usize, block: usize) {
        if self.size <= block {
            // SAFETY: a quadrant maps to a region of dst no sibling shares.
            unsafe {
                dst.write_tile(
                    src,
                    n,
                    self.col..self.col + self.size,
                    self.row..self.row + self.size,
                )
            };
            return;
        }
        let [a, b, c, d] = self.split();
        rayon::join(
            || rayon::join(|| a.transpose(src, dst, n, block), || b.transpose(src, dst, n, block)),
            || rayon::join(|| c.transpose(src, dst, n, block), || d.transpose(src, dst, n, block)),
        );
    }

    fn split(self) -> [Quadrant; 4] {
        let half = self.size / 2;
        let q = |row, col| Quadrant { row, col, size: half };
        [
            q(self.row, self.col),
            q(self.row, self.col + half),
            q(self.row + half, self.col),
            q(self.row + half, self.col + half),
        ]
    }
}
