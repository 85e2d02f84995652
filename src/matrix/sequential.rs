//! Single-threaded kernels.
//!
//! [`is_symmetric`] and [`transpose`] are the correctness oracle for every
//! other kernel in the crate and the timing floor they are compared
//! against. The blocked and recursive variants stay on one thread and
//! only change the access pattern, leaving the rest to the compiler's
//! auto-vectoriser.

use crate::config::{Timed, timed};
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::matrix::transpose::transpose_tile;

/// Scan the strict lower triangle row by row; stop at the first mismatch.
///
/// Comparison is exact `f32` equality.
pub fn is_symmetric(m: &Matrix) -> bool {
    let n = m.dim();
    let data = m.as_slice();
    for i in 0..n {
        for j in 0..i {
            if data[i * n + j] != data[j * n + i] {
                return false;
            }
        }
    }
    true
}

/// `t[i][j] = m[j][i]` into a fresh buffer.
pub fn transpose(m: &Matrix) -> Result<Matrix> {
    let n = m.dim();
    let mut out = Matrix::zeros(n)?;
    transpose_rows(m.as_slice(), out.as_mut_slice(), n);
    Ok(out)
}

/// Tiled single-threaded transpose. Tiles at the edge are clipped to `n`.
pub fn transpose_blocked(m: &Matrix, block_size: usize) -> Result<Matrix> {
    if block_size == 0 {
        return Err(Error::InvalidBlockSize);
    }
    let n = m.dim();
    let mut out = Matrix::zeros(n)?;
    blocked_into(m.as_slice(), out.as_mut_slice(), n, block_size);
    Ok(out)
}

/// Single-threaded cache-oblivious transpose. `n` must be a power of two.
pub fn transpose_recursive(m: &Matrix, block_size: usize) -> Result<Matrix> {
    let n = m.dim();
    check_recursive(n, block_size)?;
    let mut out = Matrix::zeros(n)?;
    recursive_into(m.as_slice(), out.as_mut_slice(), n, 0, 0, n, block_size);
    Ok(out)
}

pub fn is_symmetric_timed(m: &Matrix) -> Timed<bool> {
    timed(|| is_symmetric(m))
}

pub fn transpose_timed(m: &Matrix) -> Result<Timed<Matrix>> {
    let n = m.dim();
    let mut out = Matrix::zeros(n)?;
    let t = timed(|| transpose_rows(m.as_slice(), out.as_mut_slice(), n));
    Ok(t.map(|()| out))
}

pub fn transpose_blocked_timed(m: &Matrix, block_size: usize) -> Result<Timed<Matrix>> {
    if block_size == 0 {
        return Err(Error::InvalidBlockSize);
    }
    let n = m.dim();
    let mut out = Matrix::zeros(n)?;
    let t = timed(|| blocked_into(m.as_slice(), out.as_mut_slice(), n, block_size));
    Ok(t.map(|()| out))
}

pub fn transpose_recursive_timed(m: &Matrix, block_size: usize) -> Result<Timed<Matrix>> {
    let n = m.dim();
    check_recursive(n, block_size)?;
    let mut out = Matrix::zeros(n)?;
    let t = timed(|| recursive_into(m.as_slice(), out.as_mut_slice(), n, 0, 0, n, block_size));
    Ok(t.map(|()| out))
}

/// The recursive kernels only split evenly; anything else is rejected up front.
pub(crate) fn check_recursive(n: usize, block_size: usize) -> Result<()> {
    if block_size == 0 {
        return Err(Error::InvalidBlockSize);
    }
    if !n.is_power_of_two() {
        return Err(Error::NotPowerOfTwo { n });
    }
    Ok(())
}

fn transpose_rows(src: &[f32], dst: &mut [f32], n: usize) {
    for i in 0..n {
        for j in 0..n {
            dst[i * n + j] = src[j * n + i];
        }
    }
}

fn blocked_into(src: &[f32], dst: &mut [f32], n: usize, block_size: usize) {
    for i in (0..n).step_by(block_size) {
        for j in (0..n).step_by(block_size) {
            transpose_tile(
                src,
                dst,
                n,
                i..(i + block_size).min(n),
                j..(j + block_size).min(n),
            );
        }
    }
}

fn recursive_into(
    src: &[f32],
    dst: &mut [f32],
    n: usize,
    row: usize,
    col: usize,
    size: usize,
    block_size: usize,
) {
    if size <= block_size {
        for i in row..row + size {
            for j in col..col + size {
                dst[j * n + i] = src[i * n + j];
            }
        }
        return;
    }
    let half = size / 2;
    recursive_into(src, dst, n, row, col, half, block_size);
    recursive_into(src, dst, n, row, col + half, half, block_size);
    recursive_into(src, dst, n, row + half, col, half, block_size);
    recursive_into(src, dst, n, row + half, col + half, half, block_size);
}
