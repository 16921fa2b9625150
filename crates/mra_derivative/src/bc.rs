//! Boundary conditions for tree operators.
//!
//! A `D x 2` grid of codes, one per axis and side. Validation guarantees that
//! every code is known and that periodicity is paired per axis, so downstream
//! code can match on [`BcCode`] exhaustively.

use std::fmt;

use ndarray::{Array2, ArrayView2, ArrayViewD, Ix2};

use crate::error::{DiffError, Result};

/// Boundary condition code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BcCode {
  /// Homogeneous Dirichlet (f = 0).
  Zero = 0,
  /// Wraps around; both sides of the axis must be periodic.
  Periodic = 1,
  /// No condition imposed.
  Free = 2,
  /// Inhomogeneous Dirichlet (f = g).
  Dirichlet = 3,
  /// Homogeneous Neumann (f' = 0).
  ZeroNeumann = 4,
  /// Inhomogeneous Neumann (f' = g).
  Neumann = 5,
}

impl BcCode {
  pub const ALL: [BcCode; 6] = [
    BcCode::Zero,
    BcCode::Periodic,
    BcCode::Free,
    BcCode::Dirichlet,
    BcCode::ZeroNeumann,
    BcCode::Neumann,
  ];

  /// Integer code.
  #[inline]
  pub fn code(self) -> i32 {
    self as i32
  }

  /// Human readable name.
  pub fn as_str(self) -> &'static str {
    match self {
      BcCode::Zero => "zero",
      BcCode::Periodic => "periodic",
      BcCode::Free => "free",
      BcCode::Dirichlet => "Dirichlet",
      BcCode::ZeroNeumann => "Neumann",
      BcCode::Neumann => "dunno",
    }
  }

  #[inline]
  pub fn is_periodic(self) -> bool {
    self == BcCode::Periodic
  }

  /// True for codes whose boundary contribution comes from a user supplied
  /// boundary-value function.
  #[inline]
  pub fn needs_boundary_function(self) -> bool {
    matches!(self, BcCode::Dirichlet | BcCode::Neumann)
  }
}

impl TryFrom<i32> for BcCode {
  type Error = DiffError;

  fn try_from(code: i32) -> Result<Self> {
    BcCode::ALL
      .get(usize::try_from(code).map_err(|_| DiffError::InvalidBoundaryCode { code })?)
      .copied()
      .ok_or(DiffError::InvalidBoundaryCode { code })
  }
}

impl fmt::Display for BcCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Side of an axis.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Side {
  Left = 0,
  Right = 1,
}

impl Side {
  #[inline]
  pub fn index(self) -> usize {
    self as usize
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Side::Left => "left",
      Side::Right => "right",
    }
  }
}

/// Validated boundary conditions for a `D`-dimensional cell.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BoundaryConds<const D: usize> {
  codes: [[BcCode; 2]; D],
}

impl<const D: usize> BoundaryConds<D> {
  /// Same code on every side (always paired).
  pub fn uniform(code: BcCode) -> Self {
    Self {
      codes: [[code; 2]; D],
    }
  }

  /// Periodic on every axis.
  pub fn periodic() -> Self {
    Self::uniform(BcCode::Periodic)
  }

  /// No condition on any side.
  pub fn free() -> Self {
    Self::uniform(BcCode::Free)
  }

  /// Build from typed codes, checking periodic pairing.
  pub fn from_codes(codes: [[BcCode; 2]; D]) -> Result<Self> {
    for (axis, [left, right]) in codes.iter().enumerate() {
      if left.is_periodic() != right.is_periodic() {
        return Err(DiffError::UnpairedPeriodic { axis });
      }
    }
    Ok(Self { codes })
  }

  /// Build from an integer `D x 2` matrix.
  pub fn from_array(bc: ArrayView2<'_, i32>) -> Result<Self> {
    if bc.dim() != (D, 2) {
      return Err(DiffError::InvalidBoundaryShape {
        ndim: D,
        shape: bc.shape().to_vec(),
      });
    }
    let mut codes = [[BcCode::Periodic; 2]; D];
    for (axis, row) in codes.iter_mut().enumerate() {
      for (side, code) in row.iter_mut().enumerate() {
        *code = BcCode::try_from(bc[[axis, side]])?;
      }
    }
    Self::from_codes(codes)
  }

  /// Build from an integer matrix of unknown rank.
  pub fn from_dyn(bc: ArrayViewD<'_, i32>) -> Result<Self> {
    let shape = bc.shape().to_vec();
    let bc = bc
      .into_dimensionality::<Ix2>()
      .map_err(|_| DiffError::InvalidBoundaryShape { ndim: D, shape })?;
    Self::from_array(bc)
  }

  /// True when `bc` is `D x 2`, every code is known and periodicity is
  /// paired per axis.
  pub fn is_valid_bc(bc: ArrayView2<'_, i32>) -> bool {
    Self::from_array(bc).is_ok()
  }

  /// Code for one axis and side.
  #[inline]
  pub fn get(&self, axis: usize, side: Side) -> BcCode {
    self.codes[axis][side.index()]
  }

  /// Both codes of one axis.
  #[inline]
  pub fn axis(&self, axis: usize) -> [BcCode; 2] {
    self.codes[axis]
  }

  /// Replace one code, rejecting the change if it breaks periodic pairing.
  pub fn set(&mut self, axis: usize, side: Side, code: BcCode) -> Result<()> {
    if axis >= D {
      return Err(DiffError::InvalidAxis { axis, ndim: D });
    }
    let mut codes = self.codes;
    codes[axis][side.index()] = code;
    *self = Self::from_codes(codes)?;
    Ok(())
  }

  /// Integer matrix form.
  pub fn to_array(&self) -> Array2<i32> {
    Array2::from_shape_fn((D, 2), |(axis, side)| self.codes[axis][side].code())
  }
}

impl<const D: usize> Default for BoundaryConds<D> {
  fn default() -> Self {
    Self::periodic()
  }
}

impl<const D: usize> fmt::Display for BoundaryConds<D> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("BoundaryConditions(")?;
    for (axis, [left, right]) in self.codes.iter().enumerate() {
      if axis > 0 {
        f.write_str(", ")?;
      }
      write!(f, "{left}:{right}")?;
    }
    f.write_str(")")
  }
}

#[cfg(test)]
#[path = "bc_test.rs"]
mod bc_test;
