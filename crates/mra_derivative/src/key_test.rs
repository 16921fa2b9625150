use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use super::*;

/// Two keys with same level and translation should be equal.
#[test]
fn test_key_equality() {
  let a = Key::new(3, [1, 2, 3]);
  let b = Key::new(3, [1, 2, 3]);
  let c = Key::new(4, [1, 2, 3]);

  assert_eq!(a, b);
  assert_ne!(a, c);
}

/// Equal keys must produce equal hashes (shard ownership relies on it).
#[test]
fn test_key_hash_consistency() {
  let hash = |key: &Key<2>| {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
  };

  assert_eq!(hash(&Key::new(5, [10, 20])), hash(&Key::new(5, [10, 20])));
}

/// All 2^D children are distinct, one level finer, and inside the parent.
#[test]
fn test_children_cover_parent() {
  let parent = Key::new(2, [1, 3, 2]);
  let children: HashSet<_> = parent.children().collect();

  assert_eq!(children.len(), 8);
  for child in &children {
    assert_eq!(child.level(), 3);
    assert!(parent.is_ancestor_of(child));
    assert_eq!(child.parent(), Some(parent));
  }
}

/// Child index bits select the upper half per axis.
#[test]
fn test_child_index_roundtrip() {
  let parent = Key::new(4, [5, 6]);

  for index in 0..Key::<2>::NUM_CHILDREN {
    let child = parent.child(index);
    assert_eq!(child.child_index(), index);
    assert_eq!(child.translation()[0], 10 + (index & 1) as i64);
    assert_eq!(child.translation()[1], 12 + ((index >> 1) & 1) as i64);
  }
}

#[test]
fn test_root_has_no_parent() {
  assert!(Key::<3>::root().parent().is_none());
}

#[test]
fn test_ancestor_at() {
  let key = Key::new(5, [23, 7]);

  assert_eq!(key.ancestor_at(5), Some(key));
  assert_eq!(key.ancestor_at(3), Some(Key::new(3, [5, 1])));
  assert_eq!(key.ancestor_at(0), Some(Key::root()));
  assert_eq!(key.ancestor_at(6), None);
}

#[test]
fn test_domain_check() {
  assert!(Key::new(2, [0, 3]).is_in_domain());
  assert!(!Key::new(2, [0, 4]).is_in_domain());
  assert!(!Key::new(2, [-1, 0]).is_in_domain());
}

#[test]
fn test_node_addr_display() {
  let addr = NodeAddr::from(Key::new(2, [1, 3]));
  assert_eq!(addr.to_string(), "(2, [1, 3])");
}

#[test]
fn test_level_keys_enumerates_every_box() {
  let keys: Vec<_> = Key::<2>::level_keys(2).collect();
  assert_eq!(keys.len(), 16);
  assert_eq!(keys[0], Key::new(2, [0, 0]));
  assert_eq!(keys[1], Key::new(2, [1, 0]));
  assert_eq!(keys[15], Key::new(2, [3, 3]));

  let unique: HashSet<_> = keys.iter().collect();
  assert_eq!(unique.len(), 16);
  assert!(keys.iter().all(Key::is_in_domain));

  assert_eq!(Key::<3>::level_keys(0).collect::<Vec<_>>(), vec![Key::root()]);
}
