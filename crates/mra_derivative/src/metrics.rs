//! Engine-agnostic metrics collection for tree traversals.
//!
//! Feature-gated and runtime-toggled to ensure zero overhead when disabled.
//!
//! # Usage
//!
//! ```ignore
//! use mra_derivative::metrics::COLLECT_METRICS;
//!
//! // Compile with --features metrics
//! // Runtime toggle:
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! let df = op.apply(&f, true)?;
//! let stats = op.metrics().snapshot();
//! println!("{} interior, {} boundary", stats.interior_sites, stats.boundary_sites);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Runtime toggle for metrics collection.
/// Set to false to disable metrics gathering at runtime.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Check if metrics collection is enabled (both compile-time and runtime).
#[inline]
pub fn is_enabled() -> bool {
  #[cfg(feature = "metrics")]
  {
    COLLECT_METRICS.load(Ordering::Relaxed)
  }
  #[cfg(not(feature = "metrics"))]
  {
    false
  }
}

/// Rolling window for storing recent values (e.g., timing history).
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
  buffer: VecDeque<T>,
  capacity: usize,
}

impl<T> RollingWindow<T> {
  /// Create a new rolling window with the given capacity.
  pub fn new(capacity: usize) -> Self {
    Self {
      buffer: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  /// Push a new value, evicting the oldest if at capacity.
  pub fn push(&mut self, value: T) {
    if self.buffer.len() >= self.capacity {
      self.buffer.pop_front();
    }
    self.buffer.push_back(value);
  }

  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
  }
}

impl<T: Copy + Default + std::ops::Add<Output = T>> RollingWindow<T> {
  /// Compute the sum of all values.
  pub fn sum(&self) -> T {
    self.buffer.iter().copied().fold(T::default(), |acc, x| acc + x)
  }
}

impl RollingWindow<u64> {
  /// Compute the average of all values.
  pub fn average(&self) -> f64 {
    if self.buffer.is_empty() {
      0.0
    } else {
      self.sum() as f64 / self.buffer.len() as f64
    }
  }

  /// Get min and max values.
  pub fn min_max(&self) -> Option<(u64, u64)> {
    let min = *self.buffer.iter().min()?;
    let max = *self.buffer.iter().max()?;
    Some((min, max))
  }
}

impl Default for RollingWindow<u64> {
  fn default() -> Self {
    Self::new(128)
  }
}

/// Point-in-time copy of [`TraversalMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraversalStats {
  /// Neighbor lookups issued (one per flank request).
  pub lookups: u64,
  /// Lookups re-routed to the owner of an ancestor.
  pub ancestor_hops: u64,
  /// Sites forwarded to the rank owning their destination box.
  pub forwarded_sites: u64,
  pub interior_sites: u64,
  pub boundary_sites: u64,
  /// Sites split because a flank is refined further.
  pub splits: u64,
  /// Destination nodes marked internal because the source node was.
  pub internal_nodes: u64,
}

/// Counters updated concurrently by traversal tasks.
#[derive(Debug)]
pub struct TraversalMetrics {
  lookups: AtomicU64,
  ancestor_hops: AtomicU64,
  forwarded_sites: AtomicU64,
  interior_sites: AtomicU64,
  boundary_sites: AtomicU64,
  splits: AtomicU64,
  internal_nodes: AtomicU64,
  /// Wall time of fenced applies in microseconds.
  apply_timings: Mutex<RollingWindow<u64>>,
}

impl Default for TraversalMetrics {
  fn default() -> Self {
    Self {
      lookups: AtomicU64::new(0),
      ancestor_hops: AtomicU64::new(0),
      forwarded_sites: AtomicU64::new(0),
      interior_sites: AtomicU64::new(0),
      boundary_sites: AtomicU64::new(0),
      splits: AtomicU64::new(0),
      internal_nodes: AtomicU64::new(0),
      apply_timings: Mutex::new(RollingWindow::default()),
    }
  }
}

#[inline]
fn bump(counter: &AtomicU64) {
  if is_enabled() {
    counter.fetch_add(1, Ordering::Relaxed);
  }
}

impl TraversalMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record_lookup(&self) {
    bump(&self.lookups);
  }

  pub fn record_ancestor_hop(&self) {
    bump(&self.ancestor_hops);
  }

  pub fn record_forward(&self) {
    bump(&self.forwarded_sites);
  }

  pub fn record_interior(&self) {
    bump(&self.interior_sites);
  }

  pub fn record_boundary(&self) {
    bump(&self.boundary_sites);
  }

  pub fn record_split(&self) {
    bump(&self.splits);
  }

  pub fn record_internal(&self) {
    bump(&self.internal_nodes);
  }

  /// Record the duration of a fenced apply.
  pub fn record_apply_timing(&self, timing_us: u64) {
    if is_enabled() {
      self
        .apply_timings
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(timing_us);
    }
  }

  /// Average fenced apply time in microseconds.
  pub fn avg_apply_timing_us(&self) -> f64 {
    self
      .apply_timings
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .average()
  }

  /// Fastest and slowest recent fenced apply in microseconds.
  pub fn apply_timing_range_us(&self) -> Option<(u64, u64)> {
    self
      .apply_timings
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .min_max()
  }

  pub fn snapshot(&self) -> TraversalStats {
    TraversalStats {
      lookups: self.lookups.load(Ordering::Relaxed),
      ancestor_hops: self.ancestor_hops.load(Ordering::Relaxed),
      forwarded_sites: self.forwarded_sites.load(Ordering::Relaxed),
      interior_sites: self.interior_sites.load(Ordering::Relaxed),
      boundary_sites: self.boundary_sites.load(Ordering::Relaxed),
      splits: self.splits.load(Ordering::Relaxed),
      internal_nodes: self.internal_nodes.load(Ordering::Relaxed),
    }
  }

  /// Reset all counters and timings.
  pub fn reset(&self) {
    for counter in [
      &self.lookups,
      &self.ancestor_hops,
      &self.forwarded_sites,
      &self.interior_sites,
      &self.boundary_sites,
      &self.splits,
      &self.internal_nodes,
    ] {
      counter.store(0, Ordering::Relaxed);
    }
    self
      .apply_timings
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_rolling_window() {
    let mut window = RollingWindow::new(3);
    assert!(window.is_empty());

    window.push(10u64);
    window.push(20);
    window.push(30);
    assert_eq!(window.len(), 3);
    assert_eq!(window.sum(), 60);
    assert_eq!(window.average(), 20.0);

    // Push one more, oldest should be evicted
    window.push(40);
    assert_eq!(window.len(), 3);
    assert_eq!(window.sum(), 90);
    assert_eq!(window.average(), 30.0);
    assert_eq!(window.min_max(), Some((20, 40)));
  }

  #[cfg(not(feature = "metrics"))]
  #[test]
  fn test_counters_are_noops_without_feature() {
    let metrics = TraversalMetrics::new();
    metrics.record_lookup();
    metrics.record_split();
    metrics.record_apply_timing(100);

    assert_eq!(metrics.snapshot(), TraversalStats::default());
    assert_eq!(metrics.avg_apply_timing_us(), 0.0);
    assert_eq!(metrics.apply_timing_range_us(), None);
  }

  #[cfg(feature = "metrics")]
  #[test]
  fn test_counters_accumulate() {
    let metrics = TraversalMetrics::new();
    metrics.record_lookup();
    metrics.record_lookup();
    metrics.record_interior();
    metrics.record_apply_timing(1000);
    metrics.record_apply_timing(3000);

    let stats = metrics.snapshot();
    assert_eq!(stats.lookups, 2);
    assert_eq!(stats.interior_sites, 1);
    assert_eq!(metrics.avg_apply_timing_us(), 2000.0);
    assert_eq!(metrics.apply_timing_range_us(), Some((1000, 3000)));

    metrics.reset();
    assert_eq!(metrics.snapshot(), TraversalStats::default());
    assert_eq!(metrics.apply_timing_range_us(), None);
  }
}
