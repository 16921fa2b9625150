//! Test utilities shared by unit tests.
//!
//! Provides worlds, configurations and comparison helpers so each module's
//! tests can build projected functions in a couple of lines.

use crate::block::max_abs_diff;
use crate::config::{MraConfig, WorldConfig};
use crate::key::{Key, Level};
use crate::tree::FunctionTree;
use crate::world::World;

// =============================================================================
// Fixtures
// =============================================================================

/// World with `ranks` ranks of two threads each.
pub fn world(ranks: usize) -> World {
  World::new(WorldConfig::default().with_ranks(ranks)).expect("valid world config")
}

/// Unit cell, order `k`, uniform refinement to `level`.
pub fn uniform_config<const D: usize>(k: usize, level: Level) -> MraConfig<D> {
  MraConfig::default()
    .with_k(k)
    .with_initial_level(level)
    .with_max_level(level)
}

/// Uniform projection on the unit cell.
pub fn uniform<const D: usize>(
  world: &World,
  k: usize,
  level: Level,
  f: impl Fn([f64; D]) -> f64 + Sync,
) -> FunctionTree<D> {
  FunctionTree::project_uniform(world, uniform_config(k, level), f, level).expect("projection")
}

// =============================================================================
// Comparison helpers
// =============================================================================

/// Largest coefficient error of `tree`'s leaves against the projection of
/// `exact` onto the same boxes.
pub fn max_leaf_error<const D: usize>(
  tree: &FunctionTree<D>,
  exact: impl Fn([f64; D]) -> f64 + Sync,
) -> f64 {
  max_error_where(tree, exact, |_| true)
}

/// [`max_leaf_error`] restricted to leaves selected by `filter`.
pub fn max_error_where<const D: usize>(
  tree: &FunctionTree<D>,
  exact: impl Fn([f64; D]) -> f64 + Sync,
  filter: impl Fn(&Key<D>) -> bool,
) -> f64 {
  let config = tree.config();
  let sim = |x: [f64; D]| exact(config.to_user(x));
  tree
    .snapshot()
    .into_iter()
    .filter(|(key, node)| node.is_leaf() && filter(key))
    .map(|(key, node)| {
      let coeffs = node.coeffs().expect("leaf has coefficients");
      let expected = tree.two_scale().project(&key, &sim);
      max_abs_diff(&coeffs.view(), &expected.view())
    })
    .fold(0.0, f64::max)
}

/// Largest coefficient difference between two trees with identical
/// structure. Panics if the structures differ.
pub fn max_tree_diff<const D: usize>(a: &FunctionTree<D>, b: &FunctionTree<D>) -> f64 {
  let (a, b) = (a.snapshot(), b.snapshot());
  assert_eq!(
    a.keys().collect::<Vec<_>>(),
    b.keys().collect::<Vec<_>>(),
    "tree structures differ"
  );
  a.values()
    .zip(b.values())
    .map(|(x, y)| {
      assert_eq!(x.has_children(), y.has_children());
      match (x.coeffs(), y.coeffs()) {
        (Some(x), Some(y)) => max_abs_diff(&x.view(), &y.view()),
        (None, None) => 0.0,
        _ => f64::INFINITY,
      }
    })
    .fold(0.0, f64::max)
}
