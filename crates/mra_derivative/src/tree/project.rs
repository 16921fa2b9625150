//! Building trees by projecting closures onto the scaling-function basis.
//!
//! Levels above `initial_level` are scaffolding (internal nodes only). From
//! `initial_level` down, each level of candidate boxes is projected in
//! parallel; a box either becomes a leaf or is split and its children become
//! the next level's candidates.

use std::sync::Arc;

use rayon::prelude::*;

use super::{FunctionTree, Node};
use crate::block::{norm, Block};
use crate::config::MraConfig;
use crate::error::Result;
use crate::key::{Key, Level};
use crate::legendre::TwoScale;
use crate::world::World;

impl<const D: usize> FunctionTree<D> {
  /// Adaptive projection of `f` (user coordinates).
  ///
  /// A box is split while the norm of its two-scale difference exceeds
  /// `config.thresh` and it lies above `config.max_level`.
  #[tracing::instrument(skip_all, fields(k = config.k, thresh = config.thresh))]
  pub fn project<F>(world: &World, config: MraConfig<D>, f: F) -> Result<Self>
  where
    F: Fn([f64; D]) -> f64 + Sync,
  {
    let thresh = config.thresh;
    Self::build(world, config, f, move |two_scale, key, block, f| {
      detail_norm(two_scale, key, block, f) > thresh
    })
  }

  /// Projection of `f` refined wherever `refine(key)` holds, bounded by
  /// `config.max_level`.
  #[tracing::instrument(skip_all, fields(k = config.k))]
  pub fn project_refined<F, P>(world: &World, config: MraConfig<D>, f: F, refine: P) -> Result<Self>
  where
    F: Fn([f64; D]) -> f64 + Sync,
    P: Fn(&Key<D>) -> bool + Sync,
  {
    Self::build(world, config, f, move |_, key, _, _| refine(key))
  }

  /// Projection with every leaf at `level`.
  pub fn project_uniform<F>(world: &World, config: MraConfig<D>, f: F, level: Level) -> Result<Self>
  where
    F: Fn([f64; D]) -> f64 + Sync,
  {
    let config = config
      .with_initial_level(level)
      .with_max_level(level);
    Self::project_refined(world, config, f, |_| false)
  }

  fn build<F, S>(world: &World, config: MraConfig<D>, f: F, split: S) -> Result<Self>
  where
    F: Fn([f64; D]) -> f64 + Sync,
    S: Fn(&TwoScale, &Key<D>, &Block, &(dyn Fn([f64; D]) -> f64 + Sync)) -> bool + Sync,
  {
    let tree = Self::new_empty(world, config)?;
    let config = tree.config();
    let two_scale = tree.two_scale();
    let sim = |x: [f64; D]| f(config.to_user(x));

    for level in 0..config.initial_level {
      for key in Key::level_keys(level) {
        tree.replace(key, Node::internal());
      }
    }

    let mut frontier: Vec<Key<D>> = Key::level_keys(config.initial_level).collect();
    while !frontier.is_empty() {
      frontier = frontier
        .par_iter()
        .flat_map_iter(|key| {
          let block = two_scale.project(key, &sim);
          if key.level() < config.max_level && split(two_scale, key, &block, &sim) {
            tree.replace(*key, Node::internal());
            key.children().collect::<Vec<_>>()
          } else {
            tree.replace(*key, Node::leaf(Arc::new(block)));
            Vec::new()
          }
        })
        .collect();
    }

    tracing::debug!(
      leaves = tree.leaf_count(),
      nodes = tree.node_count(),
      "projection complete"
    );
    Ok(tree)
  }
}

/// Norm of what the children add to the parent's representation.
fn detail_norm<const D: usize>(
  two_scale: &TwoScale,
  key: &Key<D>,
  parent: &Block,
  f: &(dyn Fn([f64; D]) -> f64 + Sync),
) -> f64 {
  key
    .children()
    .map(|child| {
      let fine = two_scale.project(&child, f);
      match two_scale.refine(&parent.view(), key, &child) {
        Some(coarse) => norm(&(fine - coarse).view()).powi(2),
        None => f64::INFINITY,
      }
    })
    .sum::<f64>()
    .sqrt()
}

#[cfg(test)]
#[path = "project_test.rs"]
mod project_test;
