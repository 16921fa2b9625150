//! Neighbor resolution along one axis with boundary handling.
//!
//! Stepping out of the cell either wraps (periodic) or yields no neighbor
//! (every other code); the traversal treats a missing neighbor as the domain
//! edge.

use crate::bc::{BcCode, BoundaryConds};
use crate::error::{DiffError, Result};
use crate::key::{Key, Level, Translation};

/// Map a translation that may have left `0..2^level` back into the cell.
///
/// Returns `Ok(None)` when the translation crosses a non-periodic edge.
pub fn enforce_bc(
  axis: usize,
  [left, right]: [BcCode; 2],
  level: Level,
  l: Translation,
) -> Result<Option<Translation>> {
  let two2n: Translation = 1 << level;
  let edge = if l < 0 {
    left
  } else if l >= two2n {
    right
  } else {
    return Ok(Some(l));
  };

  match edge {
    BcCode::Periodic => {
      if left != right {
        return Err(DiffError::UnpairedPeriodic { axis });
      }
      Ok(Some(l.rem_euclid(two2n)))
    }
    BcCode::Zero
    | BcCode::Free
    | BcCode::Dirichlet
    | BcCode::ZeroNeumann
    | BcCode::Neumann => Ok(None),
  }
}

/// Neighbor lookup for a fixed axis and set of boundary conditions.
#[derive(Clone, Copy, Debug)]
pub struct NeighborResolver<const D: usize> {
  bc: BoundaryConds<D>,
  axis: usize,
}

impl<const D: usize> NeighborResolver<D> {
  pub fn new(bc: BoundaryConds<D>, axis: usize) -> Result<Self> {
    if axis >= D {
      return Err(DiffError::InvalidAxis { axis, ndim: D });
    }
    Ok(Self { bc, axis })
  }

  #[inline]
  pub fn axis(&self) -> usize {
    self.axis
  }

  #[inline]
  pub fn bc(&self) -> &BoundaryConds<D> {
    &self.bc
  }

  /// Key `step` boxes away along the resolver's axis, or None past a
  /// non-periodic edge.
  pub fn neighbor(&self, key: &Key<D>, step: Translation) -> Result<Option<Key<D>>> {
    let shifted = key.shifted(self.axis, step);
    let wrapped = enforce_bc(
      self.axis,
      self.bc.axis(self.axis),
      key.level(),
      shifted.translation()[self.axis],
    )?;
    Ok(wrapped.map(|l| {
      let mut translation = *key.translation();
      translation[self.axis] = l;
      Key::new(key.level(), translation)
    }))
  }
}

#[cfg(test)]
#[path = "neighbor_test.rs"]
mod neighbor_test;
