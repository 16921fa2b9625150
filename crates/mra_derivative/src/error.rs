//! Error taxonomy for operator construction and tree traversal.
//!
//! Every fault is fatal for the computation that raised it. Faults raised
//! inside asynchronous tasks are recorded on the owning [`World`] and surface
//! from the next [`World::fence`].
//!
//! [`World`]: crate::world::World
//! [`World::fence`]: crate::world::World::fence

use thiserror::Error;

use crate::key::NodeAddr;

/// Errors raised by boundary validation, operator construction and traversal.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DiffError {
  // Configuration faults
  /// Boundary matrix is not `D x 2`.
  #[error("boundary condition matrix must be {ndim}x2, got shape {shape:?}")]
  InvalidBoundaryShape { ndim: usize, shape: Vec<usize> },

  /// Boundary code outside `0..=5`.
  #[error("invalid boundary condition code {code}")]
  InvalidBoundaryCode { code: i32 },

  /// Only one side of an axis is periodic.
  #[error("axis {axis}: periodic boundary must be set on both sides")]
  UnpairedPeriodic { axis: usize },

  #[error("axis {axis} out of range for a {ndim}-dimensional function")]
  InvalidAxis { axis: usize, ndim: usize },

  #[error("wavelet order must be positive, got {k}")]
  InvalidOrder { k: usize },

  #[error("simulation cell along axis {axis} must be finite with lo < hi")]
  InvalidCell { axis: usize },

  #[error("initial level {initial} exceeds max level {max} (limit {limit})")]
  InvalidLevels { initial: u32, max: u32, limit: u32 },

  #[error("invalid world configuration: {0}")]
  InvalidWorld(String),

  // Usage faults
  #[error("wavelet order mismatch: operator uses {expected}, function has {found}")]
  OrderMismatch { expected: usize, found: usize },

  #[error("function belongs to a different world")]
  WorldMismatch,

  /// Boundary-value function projected on a different simulation cell.
  #[error("{side} boundary-value function is defined on a different cell")]
  CellMismatch { side: &'static str },

  /// Inhomogeneous boundary code evaluated without a boundary-value function.
  #[error("{side} boundary is inhomogeneous but no boundary-value function was supplied")]
  MissingBoundaryFunction { side: &'static str },

  // Precondition faults
  #[error("cannot differentiate a compressed function without fencing")]
  CompressedWithoutFence,

  // Internal consistency / resource faults
  #[error("no node covers {key}: source tree is incomplete")]
  MissingNode { key: NodeAddr },

  #[error("node {key} is inconsistent with its representation")]
  InconsistentNode { key: NodeAddr },

  /// Resolved flank is more than one level coarser than the site.
  #[error("tree is not 2:1 balanced at {key}: flank is {levels} levels coarser")]
  Unbalanced { key: NodeAddr, levels: u32 },

  #[error("point lies outside the simulation cell")]
  OutsideDomain,

  #[error("task on rank {rank} panicked")]
  TaskPanicked { rank: usize },
}

/// Crate-wide result alias.
pub type Result<T, E = DiffError> = std::result::Result<T, E>;
