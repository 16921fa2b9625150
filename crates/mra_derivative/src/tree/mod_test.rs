use super::*;
use crate::block::max_abs_diff;
use crate::test_utils::{uniform, uniform_config, world};

#[test]
fn test_owner_is_stable_and_in_range() {
  for ranks in 1..6 {
    for key in Key::<2>::level_keys(3) {
      let owner = owner_of(&key, ranks);
      assert!(owner < ranks);
      assert_eq!(owner, owner_of(&key, ranks));
    }
  }
}

/// Trees of one world share a distribution.
#[test]
fn test_empty_like_shares_distribution() {
  let world = world(3);
  let f = uniform::<1>(&world, 3, 3, |x| x[0]);
  let g = FunctionTree::empty_like(&f);

  assert_eq!(g.node_count(), 0);
  assert_eq!(g.world_id(), f.world_id());
  assert_eq!(g.k(), 3);
  for key in f.leaf_keys() {
    assert_eq!(f.owner(&key), g.owner(&key));
  }
}

#[test]
fn test_uniform_structure() {
  let tree = uniform::<2>(&world(2), 2, 2, |_| 1.0);

  assert_eq!(tree.leaf_count(), 16);
  // 1 + 4 internal scaffold nodes above the leaves.
  assert_eq!(tree.node_count(), 21);
  assert!(tree.get(&Key::root()).expect("root").has_children());
  assert!(tree.get(&Key::new(2, [3, 1])).expect("leaf").is_leaf());
}

#[test]
fn test_local_nodes_partition_tree() {
  let world = world(4);
  let tree = uniform::<2>(&world, 2, 3, |x| x[0] + x[1]);

  let total: usize = (0..world.size()).map(|r| tree.local_nodes(r).len()).sum();
  assert_eq!(total, tree.node_count());
  for rank in 0..world.size() {
    for (key, _) in tree.local_nodes(rank) {
      assert_eq!(tree.owner(&key), rank);
    }
  }
}

#[test]
fn test_lookup_local_classifies_nodes() {
  let tree = uniform::<1>(&world(1), 2, 2, |x| x[0]);

  assert!(matches!(
    tree.lookup_local(&Key::new(2, [1])),
    Ok(LocalLookup::Found(NeighborBlock::Leaf { .. }))
  ));
  assert_eq!(
    tree.lookup_local(&Key::new(1, [0])),
    Ok(LocalLookup::Found(NeighborBlock::Internal {
      key: Key::new(1, [0])
    }))
  );
  assert_eq!(tree.lookup_local(&Key::new(3, [0])), Ok(LocalLookup::Absent));
}

#[test]
fn test_childless_internal_node_is_missing_coverage() {
  let tree = FunctionTree::<1>::new_empty(&world(1), uniform_config(2, 0)).unwrap();
  tree.replace(Key::root(), Node::internal());
  tree.replace(Key::new(1, [0]), Node::internal());

  // Internal nodes without children below them cannot supply coefficients.
  assert!(matches!(
    tree.coeffs_at(&Key::new(1, [0])),
    Err(DiffError::MissingNode { .. })
  ));
}

/// coeffs_at interpolates below a leaf and restricts above leaves.
#[test]
fn test_coeffs_at_every_level() {
  let f = |x: [f64; 1]| 1.0 - 2.0 * x[0] + x[0] * x[0];
  let world = world(2);
  let tree = uniform::<1>(&world, 3, 2, f);
  let reference = uniform::<1>(&world, 3, 4, f);

  for key in [Key::new(4, [7]), Key::new(3, [0]), Key::new(2, [2])] {
    let expected = reference.coeffs_at(&key).expect("reference");
    let got = tree.coeffs_at(&key).expect("below or at leaf");
    assert!(max_abs_diff(&got.view(), &expected.view()) < 1e-12, "{key}");
  }

  let exact_root = tree.two_scale().project(&Key::root(), &f);
  let root = tree.coeffs_at(&Key::root()).expect("restricted");
  assert!(max_abs_diff(&root.view(), &exact_root.view()) < 1e-12);

  assert!(matches!(
    tree.coeffs_at(&Key::new(2, [4])),
    Err(DiffError::MissingNode { .. })
  ));
}

#[test]
fn test_eval_in_user_coordinates() {
  let config = uniform_config::<2>(4, 2).with_cell([[-1.0, 1.0], [0.0, 3.0]]);
  let f = |x: [f64; 2]| x[0] * x[0] - x[1];
  let tree = FunctionTree::project_uniform(&world(1), config, f, 2).unwrap();

  for point in [[-1.0, 0.0], [0.3, 2.9], [1.0, 3.0], [0.0, 1.5]] {
    assert!((tree.eval(point).unwrap() - f(point)).abs() < 1e-11, "{point:?}");
  }
  assert_eq!(tree.eval([2.0, 0.0]), Err(DiffError::OutsideDomain));
}

#[test]
fn test_compress_reconstruct_roundtrip() {
  let tree = uniform::<2>(&world(3), 3, 3, |x| (x[0] * 4.0).sin() + x[1]);
  let before = tree.snapshot();

  tree.compress().unwrap();
  assert!(tree.is_compressed());
  let root = tree.get(&Key::root()).unwrap();
  assert!(root.has_children() && root.coeffs().is_some());

  // Compressed internal nodes answer coeffs_at directly.
  let restricted = tree.coeffs_at(&Key::new(1, [1, 0])).unwrap();
  let stored = tree.get(&Key::new(1, [1, 0])).unwrap();
  assert_eq!(&restricted, stored.coeffs().unwrap().as_ref());

  tree.reconstruct();
  assert!(!tree.is_compressed());
  assert_eq!(tree.snapshot(), before);
}
