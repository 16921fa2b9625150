//! Key - immutable value type addressing a node of the 2^D-tree.
//!
//! Keys are identified by their level and per-axis translation at that level.
//! Level 0 = the whole simulation cell, each level down halves every axis.
//!
//! ```text
//! box(n, l) = [l_0 / 2^n, (l_0 + 1) / 2^n) x ... x [l_{D-1} / 2^n, (l_{D-1} + 1) / 2^n)
//! ```
//!
//! As with an implicit octree, no explicit parent/child links are stored:
//! relationships are computed on demand via coordinate math.

use std::fmt;

use smallvec::SmallVec;

/// Refinement level (0 = coarsest).
pub type Level = u32;

/// Per-axis translation at a given level, valid range `0..2^level`.
pub type Translation = i64;

/// Finest level a key may address.
pub const MAX_LEVEL: Level = 30;

/// Tree address - immutable value type.
///
/// Translations are at the key's own level, not the finest level.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct Key<const D: usize> {
  level: Level,
  translation: [Translation; D],
}

impl<const D: usize> Key<D> {
  /// Number of children of every internal node.
  pub const NUM_CHILDREN: usize = 1 << D;

  /// Create a key at the given level and translation.
  pub fn new(level: Level, translation: [Translation; D]) -> Self {
    Self { level, translation }
  }

  /// The key covering the whole simulation cell.
  pub fn root() -> Self {
    Self {
      level: 0,
      translation: [0; D],
    }
  }

  #[inline]
  pub fn level(&self) -> Level {
    self.level
  }

  #[inline]
  pub fn translation(&self) -> &[Translation; D] {
    &self.translation
  }

  /// Number of boxes along each axis at this key's level.
  #[inline]
  pub fn boxes_per_axis(&self) -> Translation {
    1 << self.level
  }

  /// Every in-domain key at `level`, axis 0 varying fastest.
  pub fn level_keys(level: Level) -> impl Iterator<Item = Self> {
    let n: Translation = 1 << level;
    let count = (0..D).fold(1usize, |acc, _| acc * n as usize);
    (0..count).map(move |mut index| {
      let mut translation = [0; D];
      for l in translation.iter_mut() {
        *l = (index % n as usize) as Translation;
        index /= n as usize;
      }
      Self { level, translation }
    })
  }

  /// True when every translation lies inside `0..2^level`.
  pub fn is_in_domain(&self) -> bool {
    let n = self.boxes_per_axis();
    self.translation.iter().all(|&l| (0..n).contains(&l))
  }

  /// Get child key (finer: level + 1).
  ///
  /// Child index: bit `a` selects the lower (0) or upper (1) half along
  /// axis `a`.
  pub fn child(&self, index: usize) -> Self {
    let mut translation = self.translation;
    for (axis, l) in translation.iter_mut().enumerate() {
      *l = 2 * *l + ((index >> axis) & 1) as Translation;
    }
    Self {
      level: self.level + 1,
      translation,
    }
  }

  /// Iterate over all 2^D children.
  pub fn children(&self) -> impl Iterator<Item = Self> + '_ {
    (0..Self::NUM_CHILDREN).map(move |index| self.child(index))
  }

  /// Get parent key (coarser: level - 1).
  ///
  /// Returns None at the root.
  pub fn parent(&self) -> Option<Self> {
    if self.level == 0 {
      return None;
    }
    let mut translation = self.translation;
    for l in translation.iter_mut() {
      *l = l.div_euclid(2);
    }
    Some(Self {
      level: self.level - 1,
      translation,
    })
  }

  /// Index of this key among its parent's children.
  pub fn child_index(&self) -> usize {
    self
      .translation
      .iter()
      .enumerate()
      .fold(0, |acc, (axis, &l)| acc | (((l & 1) as usize) << axis))
  }

  /// Ancestor at a coarser (or equal) level.
  pub fn ancestor_at(&self, level: Level) -> Option<Self> {
    if level > self.level {
      return None;
    }
    let shift = self.level - level;
    let mut translation = self.translation;
    for l in translation.iter_mut() {
      *l >>= shift;
    }
    Some(Self { level, translation })
  }

  /// True when `self` is `other` or one of its ancestors.
  pub fn is_ancestor_of(&self, other: &Self) -> bool {
    other.ancestor_at(self.level) == Some(*self)
  }

  /// Key shifted by `step` along `axis`, without any boundary handling.
  pub fn shifted(&self, axis: usize, step: Translation) -> Self {
    let mut translation = self.translation;
    translation[axis] += step;
    Self {
      level: self.level,
      translation,
    }
  }
}

impl<const D: usize> fmt::Display for Key<D> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({}, {:?})", self.level, self.translation)
  }
}

/// Dimension-erased key, carried by errors.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeAddr {
  pub level: Level,
  pub translation: SmallVec<[Translation; 4]>,
}

impl<const D: usize> From<Key<D>> for NodeAddr {
  fn from(key: Key<D>) -> Self {
    Self {
      level: key.level,
      translation: key.translation.iter().copied().collect(),
    }
  }
}

impl<const D: usize> From<&Key<D>> for NodeAddr {
  fn from(key: &Key<D>) -> Self {
    Self::from(*key)
  }
}

impl fmt::Display for NodeAddr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({}, {:?})", self.level, self.translation.as_slice())
  }
}

#[cfg(test)]
#[path = "key_test.rs"]
mod key_test;
