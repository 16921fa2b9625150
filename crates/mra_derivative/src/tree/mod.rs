//! Distributed coefficient tree of a multiresolution function.
//!
//! The tree is stored as one shard per world rank; each shard maps keys to
//! [`Node`]s. As with an implicit octree there are no parent/child links:
//! structure is recovered from keys by coordinate math.
//!
//! ```text
//!            (0,[0])                 internal
//!           /       \
//!      (1,[0])      (1,[1])          internal | leaf
//!      /    \
//!  (2,[0]) (2,[1])                   leaf     | leaf
//! ```
//!
//! # Module Structure
//!
//! - [`node`]: `Node`, `NeighborBlock`, `LocalLookup`
//! - [`project`]: construction by projecting a closure

pub mod node;
pub mod project;

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHasher};

use crate::block::{Block, Coeffs};
use crate::config::MraConfig;
use crate::error::{DiffError, Result};
use crate::key::Key;
use crate::legendre::TwoScale;
use crate::world::{Rank, World, WorldId};

pub use node::{LocalLookup, NeighborBlock, Node};

type Shard<const D: usize> = RwLock<FxHashMap<Key<D>, Node>>;

/// Rank owning `key` in a world of `ranks` ranks.
///
/// Depends only on the key, so every tree of a world shares one
/// distribution.
pub fn owner_of<const D: usize>(key: &Key<D>, ranks: usize) -> Rank {
  let mut hasher = FxHasher::default();
  key.hash(&mut hasher);
  (hasher.finish() % ranks as u64) as Rank
}

struct TreeInner<const D: usize> {
  world: World,
  config: MraConfig<D>,
  two_scale: Arc<TwoScale>,
  shards: Vec<Shard<D>>,
  compressed: AtomicBool,
}

/// Handle to a distributed function tree (cheap to clone, shared storage).
#[derive(Clone)]
pub struct FunctionTree<const D: usize> {
  inner: Arc<TreeInner<D>>,
}

impl<const D: usize> FunctionTree<D> {
  /// Tree with no nodes.
  pub fn new_empty(world: &World, config: MraConfig<D>) -> Result<Self> {
    config.validate()?;
    let two_scale = Arc::new(TwoScale::new(config.k));
    Ok(Self::with_parts(world.clone(), config, two_scale))
  }

  /// Empty tree with the world, defaults and distribution of `other`.
  pub fn empty_like(other: &Self) -> Self {
    Self::with_parts(
      other.inner.world.clone(),
      other.inner.config.clone(),
      Arc::clone(&other.inner.two_scale),
    )
  }

  fn with_parts(world: World, config: MraConfig<D>, two_scale: Arc<TwoScale>) -> Self {
    let shards = (0..world.size())
      .map(|_| RwLock::new(FxHashMap::default()))
      .collect();
    Self {
      inner: Arc::new(TreeInner {
        world,
        config,
        two_scale,
        shards,
        compressed: AtomicBool::new(false),
      }),
    }
  }

  #[inline]
  pub fn world(&self) -> &World {
    &self.inner.world
  }

  #[inline]
  pub fn world_id(&self) -> WorldId {
    self.inner.world.id()
  }

  #[inline]
  pub fn config(&self) -> &MraConfig<D> {
    &self.inner.config
  }

  /// Wavelet order.
  #[inline]
  pub fn k(&self) -> usize {
    self.inner.config.k
  }

  #[inline]
  pub fn two_scale(&self) -> &TwoScale {
    &self.inner.two_scale
  }

  #[inline]
  pub fn owner(&self, key: &Key<D>) -> Rank {
    owner_of(key, self.inner.shards.len())
  }

  #[inline]
  fn shard(&self, key: &Key<D>) -> &Shard<D> {
    &self.inner.shards[self.owner(key)]
  }

  pub fn get(&self, key: &Key<D>) -> Option<Node> {
    self
      .shard(key)
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(key)
      .cloned()
  }

  pub fn contains(&self, key: &Key<D>) -> bool {
    self
      .shard(key)
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .contains_key(key)
  }

  /// Insert or overwrite the node at `key` on its owner.
  pub fn replace(&self, key: Key<D>, node: Node) {
    self
      .shard(&key)
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(key, node);
  }

  /// Snapshot of the nodes owned by `rank`.
  pub fn local_nodes(&self, rank: Rank) -> Vec<(Key<D>, Node)> {
    self.inner.shards[rank]
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .map(|(key, node)| (*key, node.clone()))
      .collect()
  }

  /// Probe the owner's shard for exactly `key`.
  ///
  /// Internal nodes are reported as [`NeighborBlock::Internal`] whether or
  /// not they carry compressed coefficients.
  pub fn lookup_local(&self, key: &Key<D>) -> Result<LocalLookup<D>> {
    let Some(node) = self.get(key) else {
      return Ok(LocalLookup::Absent);
    };
    if node.has_children() {
      return Ok(LocalLookup::Found(NeighborBlock::Internal { key: *key }));
    }
    let coeffs = node
      .coeffs()
      .ok_or_else(|| DiffError::InconsistentNode { key: key.into() })?;
    Ok(LocalLookup::Found(NeighborBlock::Leaf {
      key: *key,
      coeffs: Arc::clone(coeffs),
    }))
  }

  /// Interpolate coefficients held at `from` onto the descendant box `to`.
  pub fn refine_to(&self, block: &Block, from: &Key<D>, to: &Key<D>) -> Result<Block> {
    self
      .inner
      .two_scale
      .refine(&block.view(), from, to)
      .ok_or_else(|| DiffError::InconsistentNode { key: from.into() })
  }

  /// Coefficients of the function on exactly the box of `key`.
  ///
  /// Taken from the node itself when it holds them, interpolated from the
  /// covering leaf when `key` lies below the tree, or restricted from the
  /// descendants when `key` is an internal node of a reconstructed tree.
  pub fn coeffs_at(&self, key: &Key<D>) -> Result<Block> {
    if !key.is_in_domain() {
      return Err(DiffError::MissingNode { key: key.into() });
    }

    if let Some(node) = self.get(key) {
      return match (node.coeffs(), node.has_children()) {
        (Some(coeffs), false) => Ok(Block::clone(coeffs)),
        (Some(coeffs), true) if self.is_compressed() => Ok(Block::clone(coeffs)),
        (_, true) => {
          let children = key
            .children()
            .map(|child| self.coeffs_at(&child))
            .collect::<Result<Vec<_>>>()?;
          Ok(self.inner.two_scale.restrict(&children))
        }
        (None, false) => Err(DiffError::InconsistentNode { key: key.into() }),
      };
    }

    let mut ancestor = key.parent();
    while let Some(candidate) = ancestor {
      if let Some(node) = self.get(&candidate) {
        return match (node.coeffs(), node.is_leaf()) {
          (Some(coeffs), true) => self.refine_to(coeffs, &candidate, key),
          _ => Err(DiffError::MissingNode { key: key.into() }),
        };
      }
      ancestor = candidate.parent();
    }
    Err(DiffError::MissingNode { key: key.into() })
  }

  /// Evaluate at a point given in user coordinates.
  pub fn eval(&self, point: [f64; D]) -> Result<f64> {
    let sim = self.inner.config.to_simulation(point)?;
    let mut key = Key::<D>::root();
    loop {
      let node = self
        .get(&key)
        .ok_or_else(|| DiffError::MissingNode { key: key.into() })?;
      if node.is_leaf() {
        let coeffs = node
          .coeffs()
          .ok_or_else(|| DiffError::InconsistentNode { key: key.into() })?;
        return Ok(self.inner.two_scale.eval(&coeffs.view(), &key, sim));
      }

      let level = key.level() + 1;
      let n = (1i64 << level) as f64;
      let mut translation = [0; D];
      for (axis, l) in translation.iter_mut().enumerate() {
        *l = ((sim[axis] * n).floor() as i64).clamp(0, (1i64 << level) - 1);
      }
      key = Key::new(level, translation);
    }
  }

  /// Sorted keys of all leaves.
  pub fn leaf_keys(&self) -> Vec<Key<D>> {
    let mut keys: Vec<_> = self
      .inner
      .shards
      .iter()
      .flat_map(|shard| {
        shard
          .read()
          .unwrap_or_else(PoisonError::into_inner)
          .iter()
          .filter(|(_, node)| node.is_leaf())
          .map(|(key, _)| *key)
          .collect::<Vec<_>>()
      })
      .collect();
    keys.sort_unstable();
    keys
  }

  pub fn leaf_count(&self) -> usize {
    self
      .inner
      .shards
      .iter()
      .map(|shard| {
        shard
          .read()
          .unwrap_or_else(PoisonError::into_inner)
          .values()
          .filter(|node| node.is_leaf())
          .count()
      })
      .sum()
  }

  pub fn node_count(&self) -> usize {
    self
      .inner
      .shards
      .iter()
      .map(|shard| shard.read().unwrap_or_else(PoisonError::into_inner).len())
      .sum()
  }

  /// Every node, ordered by key.
  pub fn snapshot(&self) -> BTreeMap<Key<D>, Node> {
    self
      .inner
      .shards
      .iter()
      .flat_map(|shard| {
        shard
          .read()
          .unwrap_or_else(PoisonError::into_inner)
          .iter()
          .map(|(key, node)| (*key, node.clone()))
          .collect::<Vec<_>>()
      })
      .collect()
  }

  #[inline]
  pub fn is_compressed(&self) -> bool {
    self.inner.compressed.load(Ordering::Acquire)
  }

  /// Store on every internal node the restriction of its children.
  ///
  /// Leaves are untouched, so [`reconstruct`](Self::reconstruct) is exact.
  pub fn compress(&self) -> Result<()> {
    if self.is_compressed() {
      return Ok(());
    }

    let mut by_level: BTreeMap<_, Vec<Key<D>>> = BTreeMap::new();
    for (key, node) in self.snapshot() {
      if node.has_children() {
        by_level.entry(key.level()).or_default().push(key);
      }
    }

    // Finest internal level first so every child already holds coefficients.
    for keys in by_level.values().rev() {
      keys.par_iter().try_for_each(|key| -> Result<()> {
        let children = key
          .children()
          .map(|child| {
            self
              .get(&child)
              .and_then(|node| node.coeffs().map(|c| Block::clone(c)))
              .ok_or_else(|| DiffError::InconsistentNode { key: child.into() })
          })
          .collect::<Result<Vec<_>>>()?;
        let coeffs: Coeffs = Arc::new(self.inner.two_scale.restrict(&children));
        self.replace(*key, Node::internal_with(coeffs));
        Ok(())
      })?;
    }

    self.inner.compressed.store(true, Ordering::Release);
    tracing::debug!(nodes = self.node_count(), "tree compressed");
    Ok(())
  }

  /// Drop the coefficients held by internal nodes.
  pub fn reconstruct(&self) {
    if !self.is_compressed() {
      return;
    }
    for shard in &self.inner.shards {
      let mut shard = shard.write().unwrap_or_else(PoisonError::into_inner);
      for node in shard.values_mut() {
        if node.has_children() {
          *node = Node::internal();
        }
      }
    }
    self.inner.compressed.store(false, Ordering::Release);
    tracing::debug!("tree reconstructed");
  }
}

impl<const D: usize> std::fmt::Debug for FunctionTree<D> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FunctionTree")
      .field("world", &self.inner.world.id())
      .field("k", &self.inner.config.k)
      .field("nodes", &self.node_count())
      .field("compressed", &self.is_compressed())
      .finish()
  }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
