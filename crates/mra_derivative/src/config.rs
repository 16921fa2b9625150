//! Configuration for function trees, worlds and traversals.

use crate::error::{DiffError, Result};
use crate::key::{Level, MAX_LEVEL};

/// Number of functions differentiated between intermediate fences by the
/// vector form of `apply`.
pub const DEFAULT_VECTOR_CHUNK: usize = 8;

/// Function defaults: wavelet order, simulation cell and refinement limits.
///
/// Coefficients live in simulation coordinates `[0, 1]^D`; `cell` maps them
/// to user coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct MraConfig<const D: usize> {
  /// Number of scaling functions per axis (polynomial degree + 1).
  pub k: usize,

  /// User-space bounds `[lo, hi]` per axis.
  pub cell: [[f64; 2]; D],

  /// Projection refines uniformly down to this level.
  pub initial_level: Level,

  /// Projection never refines past this level.
  pub max_level: Level,

  /// Truncation threshold for adaptive projection.
  pub thresh: f64,
}

impl<const D: usize> Default for MraConfig<D> {
  fn default() -> Self {
    Self {
      k: 6,
      cell: [[0.0, 1.0]; D],
      initial_level: 2,
      max_level: 8,
      thresh: 1e-6,
    }
  }
}

impl<const D: usize> MraConfig<D> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_k(mut self, k: usize) -> Self {
    self.k = k;
    self
  }

  pub fn with_cell(mut self, cell: [[f64; 2]; D]) -> Self {
    self.cell = cell;
    self
  }

  /// Same `[lo, hi]` on every axis.
  pub fn with_uniform_cell(mut self, lo: f64, hi: f64) -> Self {
    self.cell = [[lo, hi]; D];
    self
  }

  pub fn with_initial_level(mut self, level: Level) -> Self {
    self.initial_level = level;
    self
  }

  pub fn with_max_level(mut self, level: Level) -> Self {
    self.max_level = level;
    self
  }

  pub fn with_thresh(mut self, thresh: f64) -> Self {
    self.thresh = thresh;
    self
  }

  pub fn validate(&self) -> Result<()> {
    if self.k == 0 {
      return Err(DiffError::InvalidOrder { k: self.k });
    }
    for (axis, [lo, hi]) in self.cell.iter().enumerate() {
      if !(lo.is_finite() && hi.is_finite() && lo < hi) {
        return Err(DiffError::InvalidCell { axis });
      }
    }
    if self.initial_level > self.max_level || self.max_level > MAX_LEVEL {
      return Err(DiffError::InvalidLevels {
        initial: self.initial_level,
        max: self.max_level,
        limit: MAX_LEVEL,
      });
    }
    Ok(())
  }

  /// Cell width along `axis` in user units.
  #[inline]
  pub fn cell_width(&self, axis: usize) -> f64 {
    self.cell[axis][1] - self.cell[axis][0]
  }

  /// Reciprocal cell width: converts a simulation-space derivative into a
  /// user-space one.
  #[inline]
  pub fn rcell_width(&self, axis: usize) -> f64 {
    1.0 / self.cell_width(axis)
  }

  /// Map a user-space point into `[0, 1]^D`.
  pub fn to_simulation(&self, point: [f64; D]) -> Result<[f64; D]> {
    let mut sim = [0.0; D];
    for (axis, x) in sim.iter_mut().enumerate() {
      *x = (point[axis] - self.cell[axis][0]) / self.cell_width(axis);
      if !(0.0..=1.0).contains(x) {
        return Err(DiffError::OutsideDomain);
      }
    }
    Ok(sim)
  }

  /// Map a simulation-space point back to user space.
  #[inline]
  pub fn to_user(&self, sim: [f64; D]) -> [f64; D] {
    let mut point = sim;
    for (axis, x) in point.iter_mut().enumerate() {
      *x = self.cell[axis][0] + *x * self.cell_width(axis);
    }
    point
  }
}

/// Worker layout of a [`World`](crate::world::World).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldConfig {
  /// Number of worker ranks; tree nodes are distributed across them.
  pub ranks: usize,

  /// Threads backing each rank's pool.
  pub threads_per_rank: usize,

  /// Functions per intermediate fence in vector applies.
  pub vector_chunk: usize,
}

impl Default for WorldConfig {
  fn default() -> Self {
    Self {
      ranks: 1,
      threads_per_rank: 2,
      vector_chunk: DEFAULT_VECTOR_CHUNK,
    }
  }
}

impl WorldConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_ranks(mut self, ranks: usize) -> Self {
    self.ranks = ranks;
    self
  }

  pub fn with_threads_per_rank(mut self, threads: usize) -> Self {
    self.threads_per_rank = threads;
    self
  }

  pub fn with_vector_chunk(mut self, chunk: usize) -> Self {
    self.vector_chunk = chunk;
    self
  }

  pub fn validate(&self) -> Result<()> {
    if self.ranks == 0 {
      return Err(DiffError::InvalidWorld("at least one rank is required".into()));
    }
    if self.threads_per_rank == 0 {
      return Err(DiffError::InvalidWorld("ranks need at least one thread".into()));
    }
    if self.vector_chunk == 0 {
      return Err(DiffError::InvalidWorld("vector chunk must be positive".into()));
    }
    Ok(())
  }
}

/// Per-operator traversal switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraversalOptions {
  /// Reject flanks resolved more than one level coarser than the site.
  pub check_balance: bool,
}

impl TraversalOptions {
  pub fn with_check_balance(mut self, check: bool) -> Self {
    self.check_balance = check;
    self
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
