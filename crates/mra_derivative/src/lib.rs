//! mra_derivative - Boundary-aware directional derivatives of multiresolution
//! functions
//!
//! Functions are represented by orthonormal scaling-function coefficients
//! (Legendre polynomials of order `k`) on the leaves of a 2^D-tree over a
//! rectangular cell. The tree is spread across the ranks of a [`World`];
//! the derivative operator visits every leaf on its owning rank, fetches the
//! left and right neighbor blocks along one axis with asynchronous tasks and
//! applies a three-block stencil.
//!
//! # Features
//!
//! - **Adaptive trees**: neighbors at different levels are reconciled by
//!   splitting the site or interpolating the coarser block
//! - **Boundary conditions**: zero, periodic, free, Dirichlet, zero-Neumann
//!   and Neumann edges per axis and side
//! - **Task routing**: every step runs on the rank owning the data it reads;
//!   lookups walk towards the root one task per hop
//! - **Metrics** (feature `metrics`): traversal counters and apply timings
//!
//! # Example
//!
//! ```ignore
//! use mra_derivative::{BoundaryConds, Derivative, FunctionTree, MraConfig, World, WorldConfig};
//!
//! let world = World::new(WorldConfig::default().with_ranks(4))?;
//! let f = FunctionTree::project(&world, MraConfig::<2>::default(), |x| x[0].sin() * x[1])?;
//!
//! let dx = Derivative::new(&world, f.k(), 0, BoundaryConds::free())?;
//! let df = dx.apply(&f, true)?;
//!
//! println!("{} leaves", df.leaf_count());
//! ```

pub mod bc;
pub mod block;
pub mod config;
pub mod error;
pub mod key;
pub mod legendre;

pub use bc::{BcCode, BoundaryConds, Side};
pub use config::{MraConfig, TraversalOptions, WorldConfig};
pub use error::{DiffError, Result};
pub use key::{Key, Level, NodeAddr, Translation};

// Distributed substrate
pub mod world;
pub use world::{Rank, World, WorldId};

pub mod tree;
pub use tree::{FunctionTree, NeighborBlock, Node};

// Neighbor resolution and the traversal engine
pub mod neighbor;
pub use neighbor::{enforce_bc, NeighborResolver};

pub mod traversal;
pub use traversal::{SiteContext, SiteKernel, Stage, StencilSite, TreeTraversal};

// The derivative operator
pub mod stencil;
pub use stencil::Stencil;

pub mod derivative;
pub use derivative::{gradient, Derivative, DerivativeKernel};

pub mod async_apply;
pub use async_apply::{ApplyResult, AsyncDerivative};

pub mod metrics;
pub use metrics::{TraversalMetrics, TraversalStats};

#[cfg(test)]
mod test_utils;
