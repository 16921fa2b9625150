//! World - the task-routing substrate shared by trees and operators.
//!
//! A world owns a fixed set of ranks. Each rank is backed by its own rayon
//! thread pool; tree nodes are distributed across ranks by key hash and work
//! on a node is routed to the rank that owns it.
//!
//! ```ignore
//! let world = World::new(WorldConfig::default().with_ranks(4))?;
//!
//! world.spawn(2, move || {
//!   // runs on rank 2, may spawn further tasks
//!   Ok(())
//! });
//!
//! // Wait for every outstanding task, then surface the first fault.
//! world.fence()?;
//! ```
//!
//! Faults are sticky: once a task fails, every later task of the world is
//! skipped and every `fence` reports the first fault.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::WorldConfig;
use crate::error::{DiffError, Result};

/// Index of a worker rank, `0..world.size()`.
pub type Rank = usize;

/// Atomic counter for generating unique WorldIds.
static WORLD_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque world identifier.
///
/// Generated atomically - guaranteed unique within process lifetime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct WorldId(u64);

impl WorldId {
  /// Generate a new unique WorldId.
  pub fn new() -> Self {
    Self(WORLD_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  /// Get the raw ID value.
  pub fn raw(&self) -> u64 {
    self.0
  }
}

impl Default for WorldId {
  fn default() -> Self {
    Self::new()
  }
}

struct WorldInner {
  id: WorldId,
  config: WorldConfig,
  pools: Vec<ThreadPool>,
  /// Tasks queued or running.
  outstanding: Mutex<usize>,
  idle: Condvar,
  /// First recorded fault.
  fault: Mutex<Option<DiffError>>,
  faulted: AtomicBool,
}

impl WorldInner {
  fn record(&self, err: DiffError) {
    let mut fault = self.fault.lock().unwrap_or_else(PoisonError::into_inner);
    if fault.is_none() {
      tracing::warn!(world = self.id.raw(), error = %err, "world faulted");
      *fault = Some(err);
    }
    self.faulted.store(true, Ordering::Release);
  }

  fn finish_task(&self) {
    let mut outstanding = self
      .outstanding
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    *outstanding -= 1;
    if *outstanding == 0 {
      self.idle.notify_all();
    }
  }
}

/// Handle to a set of worker ranks (cheap to clone).
#[derive(Clone)]
pub struct World {
  inner: Arc<WorldInner>,
}

impl World {
  pub fn new(config: WorldConfig) -> Result<Self> {
    config.validate()?;
    let pools = (0..config.ranks)
      .map(|rank| {
        ThreadPoolBuilder::new()
          .num_threads(config.threads_per_rank)
          .thread_name(move |i| format!("mra-rank{rank}-{i}"))
          .build()
          .map_err(|e| DiffError::InvalidWorld(e.to_string()))
      })
      .collect::<Result<Vec<_>>>()?;

    let id = WorldId::new();
    tracing::debug!(world = id.raw(), ranks = config.ranks, "world created");

    Ok(Self {
      inner: Arc::new(WorldInner {
        id,
        config,
        pools,
        outstanding: Mutex::new(0),
        idle: Condvar::new(),
        fault: Mutex::new(None),
        faulted: AtomicBool::new(false),
      }),
    })
  }

  /// Single-rank world with default threading.
  pub fn local() -> Result<Self> {
    Self::new(WorldConfig::default())
  }

  #[inline]
  pub fn id(&self) -> WorldId {
    self.inner.id
  }

  /// Number of ranks.
  #[inline]
  pub fn size(&self) -> usize {
    self.inner.pools.len()
  }

  #[inline]
  pub fn config(&self) -> &WorldConfig {
    &self.inner.config
  }

  /// Queue `task` on `rank` (non-blocking). `rank` must be below
  /// [`size`](Self::size).
  ///
  /// An `Err` returned by the task, or a panic inside it, faults the world.
  /// Tasks queued after a fault are dropped without running.
  pub fn spawn<F>(&self, rank: Rank, task: F)
  where
    F: FnOnce() -> Result<()> + Send + 'static,
  {
    debug_assert!(rank < self.size(), "rank {rank} out of range");
    let pool = &self.inner.pools[rank];
    {
      let mut outstanding = self
        .inner
        .outstanding
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
      *outstanding += 1;
    }

    let inner = Arc::clone(&self.inner);
    pool.spawn(move || {
      if !inner.faulted.load(Ordering::Acquire) {
        match catch_unwind(AssertUnwindSafe(task)) {
          Ok(Ok(())) => {}
          Ok(Err(err)) => inner.record(err),
          Err(_) => inner.record(DiffError::TaskPanicked { rank }),
        }
      }
      inner.finish_task();
    });
  }

  /// Record a fault without running a task.
  pub fn fail(&self, err: DiffError) {
    self.inner.record(err);
  }

  #[inline]
  pub fn is_faulted(&self) -> bool {
    self.inner.faulted.load(Ordering::Acquire)
  }

  /// First recorded fault, if any.
  pub fn fault(&self) -> Option<DiffError> {
    self
      .inner
      .fault
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  /// Tasks queued or running.
  pub fn pending_count(&self) -> usize {
    *self
      .inner
      .outstanding
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  /// Block until every outstanding task has finished.
  ///
  /// Must not be called from inside a task: the calling task would count as
  /// outstanding and never observe quiescence.
  pub fn fence(&self) -> Result<()> {
    let mut outstanding = self
      .inner
      .outstanding
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    while *outstanding > 0 {
      outstanding = self
        .inner
        .idle
        .wait(outstanding)
        .unwrap_or_else(PoisonError::into_inner);
    }
    drop(outstanding);

    tracing::debug!(world = self.inner.id.raw(), "fence complete");
    match self.fault() {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }
}

impl std::fmt::Debug for World {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("World")
      .field("id", &self.inner.id)
      .field("ranks", &self.size())
      .finish()
  }
}

// =============================================================================
// Tests
// =============================================================================
