//! Fixed-capacity sliding window of recent readings for one device.

use std::collections::VecDeque;

use crate::stats;

/// FIFO buffer of the most recent `capacity` samples, plus the variance
/// baseline frozen for the current epoch.
///
/// Statistics are recomputed from the window on demand; at these sizes that
/// is cheap and cannot drift.
#[derive(Debug, Clone)]
pub struct BaselineWindow {
  capacity: usize,
  samples: VecDeque<f64>,
  frozen_baseline_variance: Option<f64>,
  frozen_baseline_sample_count: usize,
}

impl BaselineWindow {
  /// `capacity` is clamped to at least one sample.
  pub fn new(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self {
      capacity,
      samples: VecDeque::with_capacity(capacity),
      frozen_baseline_variance: None,
      frozen_baseline_sample_count: 0,
    }
  }

  /// Append to the tail, evicting the oldest sample when full.
  pub fn push(&mut self, value: f64) {
    if self.samples.len() == self.capacity {
      self.samples.pop_front();
    }
    self.samples.push_back(value);
  }

  pub fn mean(&self) -> f64 {
    stats::mean(&self.samples)
  }

  pub fn variance(&self) -> f64 {
    stats::variance(&self.samples)
  }

  pub fn sample_count(&self) -> usize {
    self.samples.len()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  /// Oldest first.
  pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
    self.samples.iter().copied()
  }

  /// Variance of the oldest `n` retained samples.
  pub fn head_variance(&self, n: usize) -> f64 {
    stats::variance(self.samples.range(..n.min(self.samples.len())))
  }

  pub fn frozen_baseline_variance(&self) -> Option<f64> {
    self.frozen_baseline_variance
  }

  pub fn frozen_baseline_sample_count(&self) -> usize {
    self.frozen_baseline_sample_count
  }

  /// Record the epoch baseline. Only the first call per epoch takes effect.
  pub fn freeze_baseline(&mut self, variance: f64, sample_count: usize) -> bool {
    if self.frozen_baseline_variance.is_some() {
      return false;
    }
    self.frozen_baseline_variance = Some(variance);
    self.frozen_baseline_sample_count = sample_count;
    true
  }

  /// Clear all samples and the frozen baseline.
  pub fn reset(&mut self) {
    self.samples.clear();
    self.frozen_baseline_variance = None;
    self.frozen_baseline_sample_count = 0;
  }
}
