//! Slice-level transpose primitives shared by all tiers.

/// Transpose a matrix: dst = src^T
///
/// Converts from row-major (rows × cols) to row-major (cols × rows).
/// After transpose, what was column j of src becomes row j of dst.
///
/// The distributed kernels call this on a block of `rows` full-width rows
/// to get their column-major contribution.
///
/// # Arguments
///
/// * `src` - Source matrix (rows × cols), row-major
/// * `dst` - Destination matrix (cols × rows), row-major
/// * `rows` - Number of rows in src
/// * `cols` - Number of columns in src
///
/// # Example
///
/// ```
/// use mattrans::matrix::transpose::transpose;
///
/// let src = vec![1.0, 2.0, 3.0,   // 2×3 matrix
///                4.0, 5.0, 6.0];
/// let mut dst = vec![0.0; 6];      // will be 3×2
///
/// transpose(&src, &mut dst, 2, 3);
///
/// assert_eq!(dst, vec![1.0, 4.0,   // 3×2 matrix
///                      2.0, 5.0,
///                      3.0, 6.0]);
/// ```
pub fn transpose(src: &[f32], dst: &mut [f32], rows: usize, cols: usize) {
    debug_assert_eq!(src.len(), rows * cols);
    debug_assert_eq!(dst.len(), rows * cols);
    for i in 0..rows {
        for j in 0..cols {
            dst[j * rows + i] = src[i * cols + j];
        }
    }
}

/// Transpose one tile of an n×n matrix into the mirrored tile of `dst`.
///
/// Writes `dst[r][c] = src[c][r]` for `r` in `rows`, `c` in `cols`. Ranges
/// are already clipped to `n` by the caller.
#[inline]
pub fn transpose_tile(
    src: &[f32],
    dst: &mut [f32],
    n: usize,
    rows: std::ops::Range<usize>,
    cols: std::ops::Range<usize>,
) {
    for r in rows {
        let out = &mut dst[r * n..(r + 1) * n];
        for c in cols.clone() {
            out[c] = src[c * n + r];
        }
    }
}

/// In-place transpose of a square n×n buffer by swapping across the diagonal.
pub fn transpose_square_in_place(data: &mut [f32], n: usize) {
    debug_assert_eq!(data.len(), n * n);
    for i in 0..n {
        for j in (i + 1)..n {
            data.swap(i * n + j, j * n + i);
        }
    }
}
