//! Legendre scaling functions, Gauss-Legendre quadrature and the two-scale
//! relations between a node and its descendants.
//!
//! The scaling functions on `[0, 1]` are the normalized shifted Legendre
//! polynomials
//!
//! ```text
//! phi_i(x) = sqrt(2i + 1) * P_i(2x - 1),   i = 0..k
//! ```
//!
//! and the coefficient of node `(n, l)` is `s = <f, 2^{nD/2} phi(2^n x - l)>`,
//! so every level carries an orthonormal basis.

use std::f64::consts::PI;

use ndarray::{Array2, ArrayD, ArrayViewD, IxDyn};

use crate::block::{contract_axis, Block};
use crate::key::Key;

/// Extra quadrature points used for projection on top of the `k` needed for
/// exact transfers.
const PROJECTION_EXTRA_POINTS: usize = 2;

/// Gauss-Legendre rule with `n` points on `[0, 1]`, points ascending.
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
  let mut points = Vec::with_capacity(n);
  let mut weights = Vec::with_capacity(n);
  for i in 1..=n {
    // Newton iteration on P_n from the Chebyshev-like initial guess.
    let mut x = (PI * (i as f64 - 0.25) / (n as f64 + 0.5)).cos();
    for _ in 0..100 {
      let (p, dp) = legendre_with_derivative(n, x);
      let dx = p / dp;
      x -= dx;
      if dx.abs() < 1e-15 {
        break;
      }
    }
    let (_, dp) = legendre_with_derivative(n, x);
    points.push(0.5 * (1.0 - x));
    weights.push(1.0 / ((1.0 - x * x) * dp * dp));
  }
  (points, weights)
}

/// `(P_n(x), P_n'(x))` by the three-term recurrence, `n >= 1`.
fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
  let (mut p0, mut p1) = (1.0, x);
  for j in 2..=n {
    let j = j as f64;
    (p0, p1) = (p1, ((2.0 * j - 1.0) * x * p1 - (j - 1.0) * p0) / j);
  }
  (p1, n as f64 * (x * p1 - p0) / (x * x - 1.0))
}

/// Evaluate `phi_0(x) .. phi_{k-1}(x)` into `out` (`k = out.len()`).
pub fn scaling_functions(x: f64, out: &mut [f64]) {
  let t = 2.0 * x - 1.0;
  let (mut p0, mut p1) = (1.0, t);
  for (i, value) in out.iter_mut().enumerate() {
    let p = match i {
      0 => 1.0,
      1 => t,
      _ => {
        let j = i as f64;
        let next = ((2.0 * j - 1.0) * t * p1 - (j - 1.0) * p0) / j;
        (p0, p1) = (p1, next);
        next
      }
    };
    *value = ((2 * i + 1) as f64).sqrt() * p;
  }
}

/// Quadrature and two-scale transfer matrices for one wavelet order.
///
/// Immutable once built; shared by every tree of the same order.
#[derive(Debug)]
pub struct TwoScale {
  k: usize,
  /// Projection rule on `[0, 1]`.
  points: Vec<f64>,
  /// `phi_i(x_q) * w_q`, shape `(k, npt)`.
  weighted_phi: Array2<f64>,
  /// Parent-to-child transfer for the lower (0) and upper (1) half.
  ///
  /// `child[j] = sum_i transfer[c][j, i] * parent[i]`.
  transfer: [Array2<f64>; 2],
  /// Transposes of `transfer`, for restriction.
  restrict: [Array2<f64>; 2],
}

impl TwoScale {
  pub fn new(k: usize) -> Self {
    let (points, weights) = gauss_legendre(k + PROJECTION_EXTRA_POINTS);
    let npt = points.len();

    let mut phi = vec![0.0; k];
    let mut weighted_phi = Array2::zeros((k, npt));
    for (q, (&x, &w)) in points.iter().zip(&weights).enumerate() {
      scaling_functions(x, &mut phi);
      for i in 0..k {
        weighted_phi[[i, q]] = phi[i] * w;
      }
    }

    let transfer = [0usize, 1].map(|half| Self::transfer_matrix(k, &points, &weights, half));
    let restrict = [transfer[0].t().to_owned(), transfer[1].t().to_owned()];

    Self {
      k,
      points,
      weighted_phi,
      transfer,
      restrict,
    }
  }

  /// `T[j, i] = 2^{-1/2} int_0^1 phi_j(y) phi_i((y + half) / 2) dy`.
  fn transfer_matrix(k: usize, points: &[f64], weights: &[f64], half: usize) -> Array2<f64> {
    let mut fine = vec![0.0; k];
    let mut coarse = vec![0.0; k];
    let mut t = Array2::zeros((k, k));
    for (&y, &w) in points.iter().zip(weights) {
      scaling_functions(y, &mut fine);
      scaling_functions((y + half as f64) * 0.5, &mut coarse);
      for j in 0..k {
        for i in 0..k {
          t[[j, i]] += w * fine[j] * coarse[i];
        }
      }
    }
    t * std::f64::consts::FRAC_1_SQRT_2
  }

  #[inline]
  pub fn k(&self) -> usize {
    self.k
  }

  /// Interpolate the coefficients of `from` onto its descendant `to`.
  ///
  /// Exact for the polynomial space: the result represents the same function
  /// restricted to the smaller box. Returns `None` when `from` is not an
  /// ancestor of (or equal to) `to`.
  pub fn refine<const D: usize>(
    &self,
    block: &ArrayViewD<'_, f64>,
    from: &Key<D>,
    to: &Key<D>,
  ) -> Option<Block> {
    if !from.is_ancestor_of(to) {
      return None;
    }
    let mut current = block.to_owned();
    for level in from.level() + 1..=to.level() {
      let step = to.ancestor_at(level)?;
      for (axis, &l) in step.translation().iter().enumerate() {
        current = contract_axis(&current.view(), &self.transfer[(l & 1) as usize], axis);
      }
    }
    Some(current)
  }

  /// Parent coefficients from the blocks of all `2^D` children, indexed by
  /// [`Key::child_index`].
  pub fn restrict(&self, children: &[Block]) -> Block {
    let ndim = children.first().map_or(0, |child| child.ndim());
    let mut parent = ArrayD::zeros(IxDyn(&vec![self.k; ndim]));
    for (index, child) in children.iter().enumerate() {
      let mut part = child.clone();
      for axis in 0..ndim {
        let half = (index >> axis) & 1;
        part = contract_axis(&part.view(), &self.restrict[half], axis);
      }
      parent += &part;
    }
    parent
  }

  /// Project `f` (given in simulation coordinates) onto the box of `key`.
  pub fn project<const D: usize, F>(&self, key: &Key<D>, f: &F) -> Block
  where
    F: Fn([f64; D]) -> f64 + ?Sized,
  {
    let npt = self.points.len();
    let scale = (-(key.level() as f64)).exp2();
    let translation = key.translation();

    let values = ArrayD::from_shape_fn(IxDyn(&[npt; D]), |index| {
      let mut x = [0.0; D];
      for (axis, x) in x.iter_mut().enumerate() {
        *x = (self.points[index[axis]] + translation[axis] as f64) * scale;
      }
      f(x)
    });

    let mut block = values;
    for axis in 0..D {
      block = contract_axis(&block.view(), &self.weighted_phi, axis);
    }
    block * scale.powf(0.5 * D as f64)
  }

  /// Evaluate the function represented by `block` on `key` at the
  /// simulation-space point `x` (assumed inside the box).
  pub fn eval<const D: usize>(&self, block: &ArrayViewD<'_, f64>, key: &Key<D>, x: [f64; D]) -> f64 {
    let two_n = (key.level() as f64).exp2();
    let mut phi = vec![0.0; self.k];
    let mut reduced = block.to_owned();
    for axis in 0..D {
      let local = x[axis] * two_n - key.translation()[axis] as f64;
      scaling_functions(local, &mut phi);
      let row = Array2::from_shape_fn((1, self.k), |(_, i)| phi[i]);
      reduced = contract_axis(&reduced.view(), &row, axis);
    }
    reduced.sum() * two_n.powf(0.5 * D as f64)
  }
}

#[cfg(test)]
#[path = "legendre_test.rs"]
mod legendre_test;
