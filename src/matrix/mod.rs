//! Square matrix storage and the sequential reference kernels.
//!
//! [`Matrix`] keeps the elements row-major in one flat buffer, so a row
//! is a contiguous slice and the whole matrix can be handed to a
//! collective without flattening first.

pub mod sequential;
pub mod transpose;

use std::ops::{Index, IndexMut};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::error::{Error, Result, try_zeroed};

/// An n×n matrix of `f32`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    n: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// A zero matrix. Fails instead of aborting when the buffer can't be allocated.
    pub fn zeros(n: usize) -> Result<Self> {
        Ok(Self {
            n,
            data: try_zeroed(n * n)?,
        })
    }

    /// Wrap a flat row-major buffer of exactly `n * n` elements.
    pub fn from_vec(n: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != n * n {
            return Err(Error::DimensionMismatch {
                expected: n * n,
                actual: data.len(),
            });
        }
        Ok(Self { n, data })
    }

    /// Build from per-row vectors. Every row must be `rows.len()` long.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let n = rows.len();
        let mut data = Vec::with_capacity(n * n);
        for row in rows {
            if row.len() != n {
                return Err(Error::DimensionMismatch {
                    expected: n,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self { n, data })
    }

    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                data.push(f(i, j));
            }
        }
        Self { n, data }
    }

    /// Random values in `[0, 10000)` with three decimals.
    ///
    /// Every row draws from its own generator seeded with `seed + row`, so
    /// the result doesn't depend on how rows are split across threads and
    /// matches [`Matrix::random_parallel`] for the same seed.
    pub fn random(n: usize, seed: u64) -> Self {
        let mut data = vec![0.0; n * n];
        for (i, row) in data.chunks_mut(n.max(1)).enumerate() {
            fill_row(row, seed, i);
        }
        Self { n, data }
    }

    /// Same values as [`Matrix::random`], rows generated on the current rayon pool.
    pub fn random_parallel(n: usize, seed: u64) -> Self {
        let mut data = vec![0.0; n * n];
        data.par_chunks_mut(n.max(1))
            .enumerate()
            .for_each(|(i, row)| fill_row(row, seed, i));
        Self { n, data }
    }

    /// Random symmetric matrix: the upper triangle is mirrored into the lower.
    pub fn random_symmetric(n: usize, seed: u64) -> Self {
        let mut m = Self::random(n, seed);
        for i in 0..n {
            for j in 0..i {
                m.data[i * n + j] = m.data[j * n + i];
            }
        }
        m
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// Contiguous rows `[start, start + count)` as one flat slice.
    pub fn row_block(&self, start: usize, count: usize) -> &[f32] {
        &self.data[start * self.n..(start + count) * self.n]
    }

    /// Transpose by swapping across the diagonal. This one mutates `self`;
    /// every other transpose in the crate leaves its input untouched.
    pub fn transpose_in_place(&mut self) {
        transpose::transpose_square_in_place(&mut self.data, self.n);
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f32;

    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &f32 {
        &self.data[i * self.n + j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    #[inline]
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f32 {
        &mut self.data[i * self.n + j]
    }
}

fn fill_row(row: &mut [f32], seed: u64, i: usize) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(i as u64));
    for x in row.iter_mut() {
        *x = rng.random_range(0..10_000_000u32) as f32 / 1000.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_checks_length() {
        assert!(Matrix::from_vec(3, vec![0.0; 9]).is_ok());
        assert!(matches!(
            Matrix::from_vec(3, vec![0.0; 8]),
            Err(Error::DimensionMismatch {
                expected: 9,
                actual: 8
            })
        ));
    }

    #[test]
    fn test_from_rows() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m[(1, 0)], 3.0);
        assert_eq!(m.row(0), &[1.0, 2.0]);
        assert!(Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
    }

    #[test]
    fn test_random_parallel_matches_sequential() {
        let a = Matrix::random(37, 7);
        let b = Matrix::random_parallel(37, 7);
        assert_eq!(a, b);
        assert!(a.as_slice().iter().all(|&x| (0.0..10_000.0).contains(&x)));
    }

    #[test]
    fn test_random_symmetric() {
        let m = Matrix::random_symmetric(20, 3);
        for i in 0..20 {
            for j in 0..20 {
                assert_eq!(m[(i, j)], m[(j, i)]);
            }
        }
    }

    #[test]
    fn test_transpose_in_place() {
        let mut m = Matrix::from_fn(5, |i, j| (i * 5 + j) as f32);
        m.transpose_in_place();
        assert_eq!(m, Matrix::from_fn(5, |i, j| (j * 5 + i) as f32));
    }

    #[test]
    fn test_row_block() {
        let m = Matrix::from_fn(4, |i, j| (i * 4 + j) as f32);
        assert_eq!(m.row_block(2, 1), &[8.0, 9.0, 10.0, 11.0]);
        assert_eq!(m.row_block(0, 4), m.as_slice());
    }
}
