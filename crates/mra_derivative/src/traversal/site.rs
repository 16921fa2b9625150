//! Differencing sites and the join point that assembles their flanks.

use std::sync::{Arc, Mutex, PoisonError};

use crate::bc::Side;
use crate::key::Key;
use crate::tree::NeighborBlock;

/// A destination box together with the three source blocks it is
/// differenced from.
///
/// `center` may be held at an ancestor of `key` (after a split); flanks may
/// be held at an ancestor of the true neighbor.
#[derive(Clone, Debug, PartialEq)]
pub struct StencilSite<const D: usize> {
  pub key: Key<D>,
  pub left: NeighborBlock<D>,
  pub center: NeighborBlock<D>,
  pub right: NeighborBlock<D>,
}

/// Progress of a site through the traversal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
  /// At least one flank lookup is still in flight.
  AwaitingNeighbors,
  /// A flank turned out to be refined further; refetch it at this level.
  Refining(Side),
  ReadyInterior,
  ReadyBoundary,
  /// Result stored in the destination tree.
  Done,
}

impl Stage {
  /// Next step for a site whose flanks are both resolved.
  ///
  /// The left flank is refetched before the right one.
  pub fn classify<const D: usize>(site: &StencilSite<D>) -> Self {
    if site.left.is_internal() {
      Stage::Refining(Side::Left)
    } else if site.right.is_internal() {
      Stage::Refining(Side::Right)
    } else if site.left.is_outside() || site.right.is_outside() {
      Stage::ReadyBoundary
    } else {
      Stage::ReadyInterior
    }
  }
}

/// Join point for the two flank lookups of one site.
///
/// Each lookup delivers exactly once; the delivery that completes the pair
/// receives the assembled site and continues the traversal.
#[derive(Debug)]
pub struct PendingSite<const D: usize> {
  key: Key<D>,
  center: NeighborBlock<D>,
  flanks: Mutex<[Option<NeighborBlock<D>>; 2]>,
}

impl<const D: usize> PendingSite<D> {
  /// Site with both flanks outstanding.
  pub fn new(key: Key<D>, center: NeighborBlock<D>) -> Arc<Self> {
    Arc::new(Self {
      key,
      center,
      flanks: Mutex::new([None, None]),
    })
  }

  /// Site with only `side` outstanding; the other flank is kept.
  pub fn refetch(site: StencilSite<D>, side: Side) -> Arc<Self> {
    let flanks = match side {
      Side::Left => [None, Some(site.right)],
      Side::Right => [Some(site.left), None],
    };
    Arc::new(Self {
      key: site.key,
      center: site.center,
      flanks: Mutex::new(flanks),
    })
  }

  #[inline]
  pub fn key(&self) -> &Key<D> {
    &self.key
  }

  /// Fill one flank. Returns the site once both flanks are present.
  pub fn deliver(&self, side: Side, block: NeighborBlock<D>) -> Option<StencilSite<D>> {
    let mut flanks = self.flanks.lock().unwrap_or_else(PoisonError::into_inner);
    flanks[side.index()] = Some(block);
    if flanks.iter().any(Option::is_none) {
      return None;
    }
    let [left, right] = std::mem::take(&mut *flanks);
    Some(StencilSite {
      key: self.key,
      left: left?,
      center: self.center.clone(),
      right: right?,
    })
  }
}
