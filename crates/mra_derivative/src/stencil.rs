//! Differencing stencils of the first-derivative operator.
//!
//! For order `k` the derivative of a node's block along the operator axis is
//!
//! ```text
//! interior:  d = 2^n / w * (rp . left + r0 . center + rm . right)
//! left edge: d = 2^n / w * (left_r0 . center + left_rm . right)   + boundary
//! right edge d = 2^n / w * (right_rp . left + right_r0 . center)  + boundary
//! ```
//!
//! where `.` contracts the matrix along the axis and `w` is the cell width.
//! The edge matrices depend on the boundary code of that side; `bv_left` and
//! `bv_right` project the boundary-value function into the inhomogeneous
//! Dirichlet and Neumann contributions.

use ndarray::{Array1, Array2};

use crate::bc::BcCode;

/// `K(i, j)`: 2 when `i > j` and `i - j` is odd.
#[inline]
fn coupling(i: usize, j: usize) -> f64 {
  if i > j && (i - j) % 2 == 1 {
    2.0
  } else {
    0.0
  }
}

/// `sum_l sqrt(2l+1) K(l, j) sqrt((2l+1)(2j+1))`, the edge-value term of
/// both Neumann closures.
fn neumann_edge_sum(k: usize, j: usize) -> f64 {
  (0..k)
    .map(|l| {
      let sl = ((2 * l + 1) as f64).sqrt();
      sl * coupling(l, j) * (((2 * l + 1) * (2 * j + 1)) as f64).sqrt()
    })
    .sum()
}

/// Immutable stencil set for one wavelet order and one pair of edge codes.
#[derive(Clone, Debug, PartialEq)]
pub struct Stencil {
  pub k: usize,
  /// Weight of the right neighbor.
  pub rm: Array2<f64>,
  pub r0: Array2<f64>,
  /// Weight of the left neighbor.
  pub rp: Array2<f64>,
  pub left_rm: Array2<f64>,
  pub left_r0: Array2<f64>,
  pub right_r0: Array2<f64>,
  pub right_rp: Array2<f64>,
  pub bv_left: Array1<f64>,
  pub bv_right: Array1<f64>,
}

impl Stencil {
  /// Build every matrix for order `k` with the given edge codes.
  ///
  /// Periodic edges leave their edge matrices at zero; they are never used.
  pub fn new(k: usize, left: BcCode, right: BcCode) -> Self {
    let kf = k as f64;
    let kphase = if k % 2 == 0 { 1.0 } else { -1.0 };
    let mut s = Self {
      k,
      rm: Array2::zeros((k, k)),
      r0: Array2::zeros((k, k)),
      rp: Array2::zeros((k, k)),
      left_rm: Array2::zeros((k, k)),
      left_r0: Array2::zeros((k, k)),
      right_r0: Array2::zeros((k, k)),
      right_rp: Array2::zeros((k, k)),
      bv_left: Array1::zeros(k),
      bv_right: Array1::zeros(k),
    };

    let mut iphase = 1.0;
    for i in 0..k {
      let si = ((2 * i + 1) as f64).sqrt();
      let mut jphase = 1.0;
      for j in 0..k {
        let gamma = (((2 * i + 1) * (2 * j + 1)) as f64).sqrt();
        let kij = coupling(i, j);
        let ij = [i, j];

        s.r0[ij] = 0.5 * (1.0 - iphase * jphase - 2.0 * kij) * gamma;
        s.rm[ij] = 0.5 * jphase * gamma;
        s.rp[ij] = -0.5 * iphase * gamma;

        match left {
          BcCode::ZeroNeumann | BcCode::Neumann => {
            let edge = 0.5 * (1.0 + iphase * kphase / kf);
            let phi_left = -jphase * neumann_edge_sum(k, j);
            s.left_rm[ij] = jphase * gamma * edge;
            s.left_r0[ij] = (edge - kij) * gamma + iphase * si * phi_left / (kf * kf);
          }
          BcCode::Zero | BcCode::Dirichlet => {
            s.left_rm[ij] = s.rm[ij];
            s.left_r0[ij] = (0.5 - kij) * gamma;
          }
          BcCode::Free => {
            s.left_rm[ij] = s.rm[ij];
            s.left_r0[ij] = (0.5 - iphase * jphase - kij) * gamma;
          }
          BcCode::Periodic => {}
        }

        match right {
          BcCode::ZeroNeumann | BcCode::Neumann => {
            let phi_right = neumann_edge_sum(k, j);
            s.right_rp[ij] = -0.5 * (iphase + kphase / kf) * gamma;
            s.right_r0[ij] =
              -(0.5 * jphase * (iphase + kphase / kf) + kij) * gamma + si * phi_right / (kf * kf);
          }
          BcCode::Zero | BcCode::Dirichlet => {
            s.right_rp[ij] = s.rp[ij];
            s.right_r0[ij] = -(0.5 * iphase * jphase + kij) * gamma;
          }
          BcCode::Free => {
            s.right_rp[ij] = s.rp[ij];
            s.right_r0[ij] = (1.0 - 0.5 * iphase * jphase - kij) * gamma;
          }
          BcCode::Periodic => {}
        }

        jphase = -jphase;
      }
      iphase = -iphase;
    }

    // Boundary vectors carry the opposite phase convention: -1 at i = 0.
    let mut iphase = 1.0;
    for i in 0..k {
      iphase = -iphase;
      let si = ((2 * i + 1) as f64).sqrt();
      s.bv_left[i] = match left {
        BcCode::Dirichlet => iphase * si,
        BcCode::Neumann => -iphase * si / (kf * kf),
        _ => 0.0,
      };
      s.bv_right[i] = match right {
        BcCode::Dirichlet => si,
        BcCode::Neumann => si / (kf * kf),
        _ => 0.0,
      };
    }

    s
  }
}

#[cfg(test)]
#[path = "stencil_test.rs"]
mod stencil_test;
