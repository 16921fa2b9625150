//! Tree traversal engine for nearest-neighbor operators.
//!
//! For every leaf of the source tree the engine gathers the left and right
//! neighbor blocks along one axis, then hands the assembled site to a
//! [`SiteKernel`]. All steps run as tasks on the rank owning the data they
//! touch:
//!
//! ```text
//! leaf (owner rank)
//!   |-- find_neighbor(-1) --> owner(n) --absent--> owner(parent(n)) --> ...
//!   |-- find_neighbor(+1) --> owner(n) ...
//!   v
//! PendingSite: both flanks delivered
//!   v
//! do_diff1: flank internal? --yes--> mark destination internal,
//!   |                                 one site per child
//!   v
//! forward_do_diff1 (owner of destination box)
//!   |-- flank internal --> refetch at this level --> do_diff1
//!   |-- flank outside  --> kernel.handle_boundary
//!   '-- otherwise      --> kernel.handle_interior
//! ```
//!
//! Lookups that miss walk towards the root one task per hop instead of
//! recursing, so deep level differences never grow the call stack.
//!
//! # Module Structure
//!
//! - [`site`]: `StencilSite`, `Stage`, `PendingSite`

pub mod site;

use std::sync::Arc;

use crate::bc::Side;
use crate::block::{zeros, Block};
use crate::config::TraversalOptions;
use crate::error::{DiffError, Result};
use crate::key::Key;
use crate::metrics::TraversalMetrics;
use crate::neighbor::NeighborResolver;
use crate::tree::{FunctionTree, LocalLookup, NeighborBlock, Node};
use crate::world::{Rank, World};

pub use site::{PendingSite, Stage, StencilSite};

/// Operator-specific work done once a site's flanks are known.
///
/// Both handlers return the destination block for `site.key`.
pub trait SiteKernel<const D: usize>: Send + Sync + 'static {
  /// Both flanks are real blocks.
  fn handle_interior(&self, ctx: &SiteContext<'_, D>, site: &StencilSite<D>) -> Result<Block>;

  /// At least one flank lies outside a non-periodic edge.
  fn handle_boundary(&self, ctx: &SiteContext<'_, D>, site: &StencilSite<D>) -> Result<Block>;
}

/// What a kernel may consult while handling a site.
pub struct SiteContext<'a, const D: usize> {
  /// Rank executing the kernel (owner of the destination box).
  pub rank: Rank,
  pub f: &'a FunctionTree<D>,
  pub resolver: &'a NeighborResolver<D>,
}

impl<const D: usize> SiteContext<'_, D> {
  #[inline]
  pub fn axis(&self) -> usize {
    self.resolver.axis()
  }

  #[inline]
  pub fn k(&self) -> usize {
    self.f.k()
  }

  /// Coefficients of `flank` on the box `target`; zero when outside.
  pub fn refined(&self, flank: &NeighborBlock<D>, target: &Key<D>) -> Result<Block> {
    match flank {
      NeighborBlock::Leaf { key, coeffs } => self.f.refine_to(coeffs, key, target),
      NeighborBlock::Outside => Ok(zeros(self.k(), D)),
      NeighborBlock::Internal { key } => Err(DiffError::InconsistentNode { key: key.into() }),
    }
  }

  /// Center block on the site's own box.
  pub fn center(&self, site: &StencilSite<D>) -> Result<Block> {
    self.refined(&site.center, &site.key)
  }

  /// Left (`Side::Left`) or right flank on the neighbor box of the site.
  pub fn flank(&self, site: &StencilSite<D>, side: Side) -> Result<Block> {
    let (flank, step) = match side {
      Side::Left => (&site.left, -1),
      Side::Right => (&site.right, 1),
    };
    if flank.is_outside() {
      return Ok(zeros(self.k(), D));
    }
    let target = self
      .resolver
      .neighbor(&site.key, step)?
      .ok_or_else(|| DiffError::InconsistentNode {
        key: (&site.key).into(),
      })?;
    self.refined(flank, &target)
  }
}

/// Asynchronous driver applying a [`SiteKernel`] to every leaf of a tree.
pub struct TreeTraversal<const D: usize, K> {
  resolver: NeighborResolver<D>,
  kernel: Arc<K>,
  options: TraversalOptions,
  metrics: Arc<TraversalMetrics>,
}

impl<const D: usize, K: SiteKernel<D>> TreeTraversal<D, K> {
  pub fn new(resolver: NeighborResolver<D>, kernel: K, options: TraversalOptions) -> Self {
    Self {
      resolver,
      kernel: Arc::new(kernel),
      options,
      metrics: Arc::new(TraversalMetrics::new()),
    }
  }

  #[inline]
  pub fn resolver(&self) -> &NeighborResolver<D> {
    &self.resolver
  }

  #[inline]
  pub fn kernel(&self) -> &K {
    &self.kernel
  }

  #[inline]
  pub fn options(&self) -> TraversalOptions {
    self.options
  }

  #[inline]
  pub fn metrics(&self) -> &TraversalMetrics {
    &self.metrics
  }

  /// Schedule the traversal of `f` and return the destination tree.
  ///
  /// Non-blocking: the destination is complete only after the world has
  /// been fenced.
  pub fn impldiff(&self, f: &FunctionTree<D>) -> FunctionTree<D> {
    let df = FunctionTree::empty_like(f);
    let pass = Arc::new(Pass {
      f: f.clone(),
      df: df.clone(),
      resolver: self.resolver,
      kernel: Arc::clone(&self.kernel),
      options: self.options,
      metrics: Arc::clone(&self.metrics),
    });

    tracing::debug!(
      axis = self.resolver.axis(),
      nodes = f.node_count(),
      "traversal scheduled"
    );
    let world = f.world();
    for rank in 0..world.size() {
      let pass = Arc::clone(&pass);
      world.spawn(rank, move || pass.visit_local(rank));
    }
    df
  }
}

/// State shared by every task of one traversal.
struct Pass<const D: usize, K> {
  f: FunctionTree<D>,
  df: FunctionTree<D>,
  resolver: NeighborResolver<D>,
  kernel: Arc<K>,
  options: TraversalOptions,
  metrics: Arc<TraversalMetrics>,
}

impl<const D: usize, K: SiteKernel<D>> Pass<D, K> {
  #[inline]
  fn world(&self) -> &World {
    self.f.world()
  }

  /// Start one site per local leaf; mirror local internal nodes.
  fn visit_local(self: &Arc<Self>, rank: Rank) -> Result<()> {
    for (key, node) in self.f.local_nodes(rank) {
      if node.has_children() {
        self.metrics.record_internal();
        self.df.replace(key, Node::internal());
        continue;
      }
      let coeffs = node
        .coeffs()
        .cloned()
        .ok_or_else(|| DiffError::InconsistentNode { key: key.into() })?;
      let pending = PendingSite::new(key, NeighborBlock::Leaf { key, coeffs });
      self.find_neighbor(rank, &pending, Side::Left)?;
      self.find_neighbor(rank, &pending, Side::Right)?;
    }
    Ok(())
  }

  fn find_neighbor(self: &Arc<Self>, rank: Rank, pending: &Arc<PendingSite<D>>, side: Side) -> Result<()> {
    let step = match side {
      Side::Left => -1,
      Side::Right => 1,
    };
    match self.resolver.neighbor(pending.key(), step)? {
      Some(target) => {
        self.request_lookup(target, target, Arc::clone(pending), side);
        Ok(())
      }
      None => self.deliver(rank, pending, side, NeighborBlock::Outside),
    }
  }

  /// Ask the owner of `candidate` for the node covering `target`.
  fn request_lookup(
    self: &Arc<Self>,
    candidate: Key<D>,
    target: Key<D>,
    pending: Arc<PendingSite<D>>,
    side: Side,
  ) {
    self.metrics.record_lookup();
    let owner = self.f.owner(&candidate);
    let pass = Arc::clone(self);
    self
      .world()
      .spawn(owner, move || pass.resolve(owner, candidate, target, pending, side));
  }

  fn resolve(
    self: &Arc<Self>,
    rank: Rank,
    candidate: Key<D>,
    target: Key<D>,
    pending: Arc<PendingSite<D>>,
    side: Side,
  ) -> Result<()> {
    match self.f.lookup_local(&candidate)? {
      LocalLookup::Found(block @ NeighborBlock::Leaf { .. }) => {
        let levels = target.level() - candidate.level();
        if self.options.check_balance && levels > 1 {
          return Err(DiffError::Unbalanced {
            key: pending.key().into(),
            levels,
          });
        }
        self.deliver(rank, &pending, side, block)
      }
      LocalLookup::Found(block @ NeighborBlock::Internal { .. }) if candidate == target => {
        self.deliver(rank, &pending, side, block)
      }
      LocalLookup::Found(_) => Err(DiffError::MissingNode { key: target.into() }),
      LocalLookup::Absent => match candidate.parent() {
        Some(parent) => {
          self.metrics.record_ancestor_hop();
          self.request_lookup(parent, target, pending, side);
          Ok(())
        }
        None => Err(DiffError::MissingNode { key: target.into() }),
      },
    }
  }

  fn deliver(
    self: &Arc<Self>,
    rank: Rank,
    pending: &PendingSite<D>,
    side: Side,
    block: NeighborBlock<D>,
  ) -> Result<()> {
    match pending.deliver(side, block) {
      Some(site) => self.do_diff1(rank, site),
      None => {
        tracing::trace!(key = %pending.key(), stage = ?Stage::AwaitingNeighbors);
        Ok(())
      }
    }
  }

  /// Split the site when a flank is refined further, else pass it on.
  fn do_diff1(self: &Arc<Self>, rank: Rank, site: StencilSite<D>) -> Result<()> {
    if !(site.left.is_internal() || site.right.is_internal()) {
      return self.forward_do_diff1(rank, site);
    }

    self.metrics.record_split();
    self.df.replace(site.key, Node::internal());
    let axis = self.resolver.axis();
    for child in site.key.children() {
      // The sibling along the axis is covered by the parent's own block.
      let child_site = if child.translation()[axis] & 1 == 0 {
        StencilSite {
          key: child,
          left: site.left.clone(),
          center: site.center.clone(),
          right: site.center.clone(),
        }
      } else {
        StencilSite {
          key: child,
          left: site.center.clone(),
          center: site.center.clone(),
          right: site.right.clone(),
        }
      };
      self.forward_do_diff1(rank, child_site)?;
    }
    Ok(())
  }

  /// Run the site on the owner of its destination box.
  fn forward_do_diff1(self: &Arc<Self>, rank: Rank, site: StencilSite<D>) -> Result<()> {
    let owner = self.f.owner(&site.key);
    if owner != rank {
      self.metrics.record_forward();
      let pass = Arc::clone(self);
      self
        .world()
        .spawn(owner, move || pass.forward_do_diff1(owner, site));
      return Ok(());
    }

    let stage = Stage::classify(&site);
    tracing::trace!(key = %site.key, ?stage);
    let ctx = SiteContext {
      rank,
      f: &self.f,
      resolver: &self.resolver,
    };
    let block = match stage {
      Stage::Refining(side) => {
        let pending = PendingSite::refetch(site, side);
        return self.find_neighbor(rank, &pending, side);
      }
      Stage::ReadyInterior => {
        self.metrics.record_interior();
        self.kernel.handle_interior(&ctx, &site)?
      }
      Stage::ReadyBoundary => {
        self.metrics.record_boundary();
        self.kernel.handle_boundary(&ctx, &site)?
      }
      Stage::AwaitingNeighbors | Stage::Done => {
        return Err(DiffError::InconsistentNode {
          key: (&site.key).into(),
        })
      }
    };

    self.df.replace(site.key, Node::leaf(Arc::new(block)));
    tracing::trace!(key = %site.key, stage = ?Stage::Done);
    Ok(())
  }
}
