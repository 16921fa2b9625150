//! Non-blocking derivative handle.
//!
//! Runs a fenced [`Derivative::apply`] off the calling thread and hands the
//! result back through a channel, for callers that poll (a frame loop, an
//! event loop) rather than block.
//!
//! # Flow
//!
//! ```text
//! Caller                            Async (rayon)
//! ┌────────────────┐
//! │ start(op, f)   │
//! └───────┬────────┘
//!         │
//!         ▼
//!                                  ┌───────────────┐
//!                                  │ op.apply(f,   │
//!                                  │   fence=true) │
//!                                  └───────┬───────┘
//! ┌────────────────┐                       │
//! │ poll_results() │◄──────────────────────┘
//! └────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let mut handle = AsyncDerivative::new();
//! handle.start(Arc::clone(&op), f.clone());
//!
//! // Poll each frame
//! if let Some(result) = handle.poll_results() {
//!     let df = result.df?;
//! }
//! ```

use std::sync::Arc;

use crossbeam_channel::{self as channel, Receiver, TryRecvError};
use web_time::Instant;

use crate::derivative::Derivative;
use crate::error::Result;
use crate::tree::FunctionTree;
use crate::world::WorldId;

/// Outcome of one asynchronous apply.
#[derive(Debug)]
pub struct ApplyResult<const D: usize> {
  pub world_id: WorldId,
  pub axis: usize,
  /// The derivative, or the fault that terminated the traversal.
  pub df: Result<FunctionTree<D>>,
  /// Wall time of the apply in microseconds.
  pub apply_us: u64,
}

/// Poll-based handle around a single in-flight apply.
pub struct AsyncDerivative<const D: usize> {
  receiver: Option<Receiver<ApplyResult<D>>>,
}

impl<const D: usize> Default for AsyncDerivative<D> {
  fn default() -> Self {
    Self::new()
  }
}

impl<const D: usize> AsyncDerivative<D> {
  pub fn new() -> Self {
    Self { receiver: None }
  }

  /// Check if an apply is in flight.
  pub fn is_busy(&self) -> bool {
    self.receiver.is_some()
  }

  /// Start differentiating `f` with `op`.
  ///
  /// Returns `true` if started, `false` if already busy.
  pub fn start(&mut self, op: Arc<Derivative<D>>, f: FunctionTree<D>) -> bool {
    if self.is_busy() {
      return false;
    }

    let (sender, receiver) = channel::bounded(1);
    self.receiver = Some(receiver);

    // Not on a world rank: the apply fences, which must happen outside the
    // world's own pools.
    rayon::spawn(move || {
      let start = Instant::now();
      let df = op.apply(&f, true);
      let result = ApplyResult {
        world_id: op.world().id(),
        axis: op.axis(),
        df,
        apply_us: start.elapsed().as_micros() as u64,
      };
      // Receiver dropped = result discarded.
      let _ = sender.send(result);
    });

    true
  }

  /// Poll for the result (non-blocking).
  ///
  /// Returns `Some(result)` when complete, `None` if still running.
  pub fn poll_results(&mut self) -> Option<ApplyResult<D>> {
    let receiver = self.receiver.as_ref()?;

    match receiver.try_recv() {
      Ok(result) => {
        self.receiver = None;
        Some(result)
      }
      Err(TryRecvError::Empty) => None,
      Err(TryRecvError::Disconnected) => {
        self.receiver = None;
        None
      }
    }
  }

  /// Stop waiting for the in-flight apply.
  ///
  /// The traversal itself runs to completion; only its result is dropped.
  pub fn cancel(&mut self) {
    self.receiver = None;
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;
  use crate::test_utils::{max_leaf_error, uniform, world};

  fn wait<const D: usize>(handle: &mut AsyncDerivative<D>) -> ApplyResult<D> {
    for _ in 0..5000 {
      if let Some(result) = handle.poll_results() {
        return result;
      }
      std::thread::sleep(Duration::from_millis(1));
    }
    panic!("async apply did not finish");
  }

  #[test]
  fn test_start_and_poll() {
    let world = world(2);
    let f = uniform::<1>(&world, 4, 3, |x| x[0] * x[0]);
    let op = Arc::new(Derivative::free_space(&world, 4, 0).unwrap());

    let mut handle = AsyncDerivative::new();
    assert!(handle.start(Arc::clone(&op), f.clone()));
    assert!(handle.is_busy());
    assert!(!handle.start(Arc::clone(&op), f), "second start while busy");

    let result = wait(&mut handle);
    assert!(!handle.is_busy());
    assert_eq!(result.world_id, world.id());
    assert_eq!(result.axis, 0);
    let df = result.df.unwrap();
    assert!(max_leaf_error(&df, |x| 2.0 * x[0]) < 1e-10);
  }

  #[test]
  fn test_fault_is_delivered() {
    let world = world(1);
    let other = crate::test_utils::world(1);
    let f = uniform::<1>(&other, 3, 2, |x| x[0]);
    let op = Arc::new(Derivative::free_space(&world, 3, 0).unwrap());

    let mut handle = AsyncDerivative::new();
    handle.start(op, f);
    let result = wait(&mut handle);
    assert_eq!(result.df.unwrap_err(), crate::DiffError::WorldMismatch);
  }

  #[test]
  fn test_cancel() {
    let world = world(1);
    let f = uniform::<1>(&world, 3, 2, |x| x[0]);
    let op = Arc::new(Derivative::periodic(&world, 3, 0).unwrap());

    let mut handle = AsyncDerivative::new();
    handle.start(op, f);
    handle.cancel();
    assert!(!handle.is_busy());
    assert!(handle.poll_results().is_none());
  }
}
