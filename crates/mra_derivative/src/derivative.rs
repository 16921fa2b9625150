//! First-derivative operator along one axis.
//!
//! ```ignore
//! let world = World::new(WorldConfig::default().with_ranks(4))?;
//! let f = FunctionTree::project(&world, MraConfig::<3>::default(), |x| x[0].sin())?;
//!
//! let dx = Derivative::new(&world, f.k(), 0, BoundaryConds::periodic())?;
//! let df = dx.apply(&f, true)?;
//! ```
//!
//! Inhomogeneous Dirichlet and Neumann edges take their boundary data from
//! functions supplied with [`Derivative::with_boundary_functions`].

use std::sync::Arc;

use web_time::Instant;

use crate::bc::{BcCode, BoundaryConds, Side};
use crate::block::{boundary_outer, contract_axis, contract_axis_into, Block};
use crate::config::TraversalOptions;
use crate::error::{DiffError, Result};
use crate::metrics::TraversalMetrics;
use crate::neighbor::NeighborResolver;
use crate::stencil::Stencil;
use crate::traversal::{SiteContext, SiteKernel, StencilSite, TreeTraversal};
use crate::tree::FunctionTree;
use crate::world::World;

/// Stencil application for one axis; the [`SiteKernel`] of the derivative.
pub struct DerivativeKernel<const D: usize> {
  stencil: Arc<Stencil>,
  codes: [BcCode; 2],
  /// Boundary-value functions, left then right.
  boundary: [Option<FunctionTree<D>>; 2],
}

impl<const D: usize> DerivativeKernel<D> {
  /// `2^n / width` along the axis.
  #[inline]
  fn scale(ctx: &SiteContext<'_, D>, site: &StencilSite<D>) -> f64 {
    (site.key.level() as f64).exp2() * ctx.f.config().rcell_width(ctx.axis())
  }

  /// Boundary-data term of an edge site, if the edge carries one.
  fn boundary_term(&self, ctx: &SiteContext<'_, D>, site: &StencilSite<D>) -> Result<Option<Block>> {
    let axis = ctx.axis();
    let side = if site.key.translation()[axis] == 0 {
      Side::Left
    } else {
      Side::Right
    };
    let code = self.codes[side.index()];
    if !code.needs_boundary_function() {
      return Ok(None);
    }

    let g = self.boundary[side.index()]
      .as_ref()
      .ok_or(DiffError::MissingBoundaryFunction { side: side.as_str() })?;
    let bv = match side {
      Side::Left => &self.stencil.bv_left,
      Side::Right => &self.stencil.bv_right,
    };

    let gcoeffs = g.coeffs_at(&site.key)?;
    let mut term = boundary_outer(bv, &gcoeffs.view(), axis);
    let mut scale = ctx.f.config().rcell_width(axis);
    if code == BcCode::Dirichlet {
      scale *= (site.key.level() as f64).exp2();
    }
    term *= scale;
    Ok(Some(term))
  }
}

impl<const D: usize> SiteKernel<D> for DerivativeKernel<D> {
  fn handle_interior(&self, ctx: &SiteContext<'_, D>, site: &StencilSite<D>) -> Result<Block> {
    let axis = ctx.axis();
    let left = ctx.flank(site, Side::Left)?;
    let center = ctx.center(site)?;
    let right = ctx.flank(site, Side::Right)?;

    let mut d = contract_axis(&left.view(), &self.stencil.rp, axis);
    contract_axis_into(&center.view(), &self.stencil.r0, axis, &mut d);
    contract_axis_into(&right.view(), &self.stencil.rm, axis, &mut d);
    d *= Self::scale(ctx, site);
    Ok(d)
  }

  fn handle_boundary(&self, ctx: &SiteContext<'_, D>, site: &StencilSite<D>) -> Result<Block> {
    let axis = ctx.axis();
    let center = ctx.center(site)?;

    // Left edge takes precedence when a single box spans the whole axis.
    let mut d = if site.key.translation()[axis] == 0 {
      let right = ctx.flank(site, Side::Right)?;
      let mut d = contract_axis(&right.view(), &self.stencil.left_rm, axis);
      contract_axis_into(&center.view(), &self.stencil.left_r0, axis, &mut d);
      d
    } else {
      let left = ctx.flank(site, Side::Left)?;
      let mut d = contract_axis(&left.view(), &self.stencil.right_rp, axis);
      contract_axis_into(&center.view(), &self.stencil.right_r0, axis, &mut d);
      d
    };
    d *= Self::scale(ctx, site);

    if let Some(term) = self.boundary_term(ctx, site)? {
      d += &term;
    }
    Ok(d)
  }
}

/// Boundary-aware first derivative along `axis`.
///
/// Owns its stencils; operators for different axes or boundary conditions
/// run concurrently without sharing state.
pub struct Derivative<const D: usize> {
  world: World,
  k: usize,
  bc: BoundaryConds<D>,
  traversal: TreeTraversal<D, DerivativeKernel<D>>,
}

impl<const D: usize> Derivative<D> {
  /// Operator of order `k` along `axis` with boundary conditions `bc`.
  pub fn new(world: &World, k: usize, axis: usize, bc: BoundaryConds<D>) -> Result<Self> {
    Self::build(world, k, axis, bc, [None, None], TraversalOptions::default())
  }

  /// Derivative with free boundaries on every side.
  pub fn free_space(world: &World, k: usize, axis: usize) -> Result<Self> {
    Self::new(world, k, axis, BoundaryConds::free())
  }

  /// Derivative on a fully periodic cell.
  pub fn periodic(world: &World, k: usize, axis: usize) -> Result<Self> {
    Self::new(world, k, axis, BoundaryConds::periodic())
  }

  /// Supply the boundary-value functions for inhomogeneous edges.
  ///
  /// Either may be omitted when its edge is homogeneous; a missing function
  /// on an inhomogeneous edge faults the first apply that reaches it.
  pub fn with_boundary_functions(
    self,
    left: Option<FunctionTree<D>>,
    right: Option<FunctionTree<D>>,
  ) -> Result<Self> {
    let options = self.traversal.options();
    Self::build(&self.world, self.k, self.axis(), self.bc, [left, right], options)
  }

  /// Replace the traversal switches.
  pub fn with_options(self, options: TraversalOptions) -> Result<Self> {
    let kernel = self.traversal.kernel();
    let boundary = kernel.boundary.clone();
    Self::build(&self.world, self.k, self.axis(), self.bc, boundary, options)
  }

  fn build(
    world: &World,
    k: usize,
    axis: usize,
    bc: BoundaryConds<D>,
    boundary: [Option<FunctionTree<D>>; 2],
    options: TraversalOptions,
  ) -> Result<Self> {
    if k == 0 {
      return Err(DiffError::InvalidOrder { k });
    }
    let resolver = NeighborResolver::new(bc, axis)?;
    for g in boundary.iter().flatten() {
      if g.world_id() != world.id() {
        return Err(DiffError::WorldMismatch);
      }
      if g.k() != k {
        return Err(DiffError::OrderMismatch {
          expected: k,
          found: g.k(),
        });
      }
    }

    let codes = bc.axis(axis);
    let stencil = Arc::new(Stencil::new(k, codes[0], codes[1]));
    tracing::debug!(k, axis, %bc, "derivative operator created");

    let kernel = DerivativeKernel {
      stencil,
      codes,
      boundary,
    };
    Ok(Self {
      world: world.clone(),
      k,
      bc,
      traversal: TreeTraversal::new(resolver, kernel, options),
    })
  }

  #[inline]
  pub fn axis(&self) -> usize {
    self.traversal.resolver().axis()
  }

  #[inline]
  pub fn k(&self) -> usize {
    self.k
  }

  #[inline]
  pub fn bc(&self) -> &BoundaryConds<D> {
    &self.bc
  }

  #[inline]
  pub fn world(&self) -> &World {
    &self.world
  }

  #[inline]
  pub fn stencil(&self) -> &Stencil {
    &self.traversal.kernel().stencil
  }

  #[inline]
  pub fn metrics(&self) -> &TraversalMetrics {
    self.traversal.metrics()
  }

  fn check(&self, f: &FunctionTree<D>, fence: bool) -> Result<()> {
    if f.world_id() != self.world.id() {
      return Err(DiffError::WorldMismatch);
    }
    if f.k() != self.k {
      return Err(DiffError::OrderMismatch {
        expected: self.k,
        found: f.k(),
      });
    }
    for (side, g) in [Side::Left, Side::Right]
      .into_iter()
      .zip(&self.traversal.kernel().boundary)
    {
      if g.as_ref().is_some_and(|g| g.config().cell != f.config().cell) {
        return Err(DiffError::CellMismatch { side: side.as_str() });
      }
    }
    if f.is_compressed() {
      if !fence {
        return Err(DiffError::CompressedWithoutFence);
      }
      f.reconstruct();
    }
    Ok(())
  }

  /// Differentiate `f`, returning a new function with the same distribution.
  ///
  /// With `fence` the call blocks until the result is complete and reports
  /// any traversal fault. Without it the caller must fence the world before
  /// reading the result; a compressed `f` is then rejected.
  #[tracing::instrument(skip_all, fields(axis = self.axis(), fence = fence))]
  pub fn apply(&self, f: &FunctionTree<D>, fence: bool) -> Result<FunctionTree<D>> {
    self.check(f, fence)?;
    let start = Instant::now();
    let df = self.traversal.impldiff(f);
    if fence {
      self.world.fence()?;
      let apply_us = start.elapsed().as_micros() as u64;
      self.metrics().record_apply_timing(apply_us);
      tracing::debug!(
        apply_us,
        range_us = ?self.metrics().apply_timing_range_us(),
        "apply complete"
      );
    }
    Ok(df)
  }

  /// Differentiate every function of `fs`.
  ///
  /// The world is fenced after every `vector_chunk` functions to bound the
  /// number of in-flight tasks, and once more at the end when `fence` is
  /// set. Results are identical to calling [`apply`](Self::apply) on each.
  #[tracing::instrument(skip_all, fields(axis = self.axis(), count = fs.len(), fence = fence))]
  pub fn apply_vec(&self, fs: &[FunctionTree<D>], fence: bool) -> Result<Vec<FunctionTree<D>>> {
    for f in fs {
      self.check(f, fence)?;
    }

    let chunk = self.world.config().vector_chunk;
    let mut out = Vec::with_capacity(fs.len());
    let mut batches = fs.chunks(chunk).peekable();
    while let Some(batch) = batches.next() {
      out.extend(batch.iter().map(|f| self.traversal.impldiff(f)));
      if batches.peek().is_some() {
        self.world.fence()?;
      }
    }
    if fence {
      self.world.fence()?;
    }
    Ok(out)
  }
}

/// All `D` first partial derivatives of `f` under boundary conditions `bc`.
///
/// Fences once after scheduling every axis.
pub fn gradient<const D: usize>(
  world: &World,
  f: &FunctionTree<D>,
  bc: BoundaryConds<D>,
) -> Result<Vec<FunctionTree<D>>> {
  if f.is_compressed() {
    f.reconstruct();
  }
  let ops = (0..D)
    .map(|axis| Derivative::new(world, f.k(), axis, bc))
    .collect::<Result<Vec<_>>>()?;
  let out = ops
    .iter()
    .map(|op| op.apply(f, false))
    .collect::<Result<Vec<_>>>()?;
  world.fence()?;
  Ok(out)
}

#[cfg(test)]
#[path = "derivative_test.rs"]
mod derivative_test;
