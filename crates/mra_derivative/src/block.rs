//! Coefficient blocks and the tensor primitives used on them.
//!
//! A block holds the `k^D` scaling coefficients of one tree node, indexed
//! `[i_0, ..., i_{D-1}]` with `i_a` the polynomial order along axis `a`.

use std::sync::Arc;

use ndarray::linalg::general_mat_vec_mul;
use ndarray::{Array1, Array2, ArrayD, ArrayViewD, Axis, IxDyn, Zip};

/// Dense `[k; D]` coefficient block.
pub type Block = ArrayD<f64>;

/// Shared, immutable coefficient block.
pub type Coeffs = Arc<Block>;

/// All-zero block of order `k` in `ndim` dimensions.
#[inline]
pub fn zeros(k: usize, ndim: usize) -> Block {
  ArrayD::zeros(IxDyn(&vec![k; ndim]))
}

/// Apply `mat` to every lane of `block` along `axis`.
///
/// `out[.., i, ..] = sum_j mat[i, j] * block[.., j, ..]`. The output length
/// along `axis` is `mat.nrows()`.
pub fn contract_axis(block: &ArrayViewD<'_, f64>, mat: &Array2<f64>, axis: usize) -> Block {
  let mut shape = block.shape().to_vec();
  shape[axis] = mat.nrows();
  let mut out = ArrayD::zeros(IxDyn(&shape));
  contract_axis_into(block, mat, axis, &mut out);
  out
}

/// Accumulating form of [`contract_axis`]: `out += mat (x)_axis block`.
pub fn contract_axis_into(
  block: &ArrayViewD<'_, f64>,
  mat: &Array2<f64>,
  axis: usize,
  out: &mut Block,
) {
  Zip::from(out.lanes_mut(Axis(axis)))
    .and(block.lanes(Axis(axis)))
    .for_each(|mut dst, src| general_mat_vec_mul(1.0, mat, &src, 1.0, &mut dst));
}

/// Outer product of a boundary vector with the zeroth slice of `g` along
/// `axis`: `out[.., i, ..] = bv[i] * g[.., 0, ..]`.
pub fn boundary_outer(bv: &Array1<f64>, g: &ArrayViewD<'_, f64>, axis: usize) -> Block {
  let slice = g.index_axis(Axis(axis), 0);
  let mut shape = g.shape().to_vec();
  shape[axis] = bv.len();
  let mut out = ArrayD::zeros(IxDyn(&shape));
  for (i, &weight) in bv.iter().enumerate() {
    out
      .index_axis_mut(Axis(axis), i)
      .zip_mut_with(&slice, |dst, &src| *dst = weight * src);
  }
  out
}

/// Frobenius norm.
#[inline]
pub fn norm(block: &ArrayViewD<'_, f64>) -> f64 {
  block.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Largest elementwise difference between two blocks of the same shape.
pub fn max_abs_diff(a: &ArrayViewD<'_, f64>, b: &ArrayViewD<'_, f64>) -> f64 {
  Zip::from(a)
    .and(b)
    .fold(0.0f64, |acc, &x, &y| acc.max((x - y).abs()))
}

#[cfg(test)]
#[path = "block_test.rs"]
mod block_test;
