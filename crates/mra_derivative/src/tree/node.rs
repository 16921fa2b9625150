//! Node payloads stored in tree shards and the flank blocks handed to the
//! traversal.

use crate::block::Coeffs;
use crate::key::Key;

/// One entry of a function tree.
///
/// Reconstructed trees carry coefficients on leaves only; compressed trees
/// additionally carry restricted coefficients on internal nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
  coeffs: Option<Coeffs>,
  has_children: bool,
}

impl Node {
  /// Leaf holding `coeffs`.
  pub fn leaf(coeffs: Coeffs) -> Self {
    Self {
      coeffs: Some(coeffs),
      has_children: false,
    }
  }

  /// Internal node without coefficients.
  pub fn internal() -> Self {
    Self {
      coeffs: None,
      has_children: true,
    }
  }

  /// Internal node carrying the restriction of its children.
  pub fn internal_with(coeffs: Coeffs) -> Self {
    Self {
      coeffs: Some(coeffs),
      has_children: true,
    }
  }

  #[inline]
  pub fn coeffs(&self) -> Option<&Coeffs> {
    self.coeffs.as_ref()
  }

  #[inline]
  pub fn has_children(&self) -> bool {
    self.has_children
  }

  #[inline]
  pub fn is_leaf(&self) -> bool {
    !self.has_children
  }
}

/// Result of resolving one flank of a differencing site.
#[derive(Clone, Debug, PartialEq)]
pub enum NeighborBlock<const D: usize> {
  /// Leaf at `key`, which is the requested neighbor or one of its ancestors.
  Leaf { key: Key<D>, coeffs: Coeffs },
  /// The requested neighbor exists but is refined further.
  Internal { key: Key<D> },
  /// No neighbor: the step crossed a non-periodic edge. Acts as zero.
  Outside,
}

impl<const D: usize> NeighborBlock<D> {
  #[inline]
  pub fn is_internal(&self) -> bool {
    matches!(self, NeighborBlock::Internal { .. })
  }

  #[inline]
  pub fn is_outside(&self) -> bool {
    matches!(self, NeighborBlock::Outside)
  }
}

/// Outcome of probing a single shard for a key.
#[derive(Clone, Debug, PartialEq)]
pub enum LocalLookup<const D: usize> {
  Found(NeighborBlock<D>),
  Absent,
}
