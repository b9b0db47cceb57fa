//! Variance mode: sustained variance increase over a frozen epoch baseline.
//!
//! An epoch starts at stream start or at a reset. The variance of its first
//! `min_data_points` readings is frozen once; every later reading compares the
//! variance of the whole epoch so far against it.

use tracing::debug;

use crate::stats::RunningStats;
use crate::types::{DetectionResult, ReasonCode, Reading};
use crate::window::BaselineWindow;

#[derive(Debug, Clone)]
pub struct VarianceDetector {
  min_data_points: usize,
  threshold_percent: f64,
}

impl VarianceDetector {
  pub fn new(min_data_points: usize, threshold_percent: f64) -> Self {
    Self {
      min_data_points,
      threshold_percent,
    }
  }

  pub fn min_data_points(&self) -> usize {
    self.min_data_points
  }

  /// Freeze the epoch baseline once enough readings have arrived.
  ///
  /// Must run right after the reading that completes the baseline is pushed;
  /// the window then still holds the first `min_data_points` readings of the
  /// epoch (window capacity >= `min_data_points`).
  pub fn freeze_if_due(&self, window: &mut BaselineWindow, epoch: &RunningStats) -> bool {
    if window.frozen_baseline_variance().is_some()
      || (epoch.count() as usize) < self.min_data_points
    {
      return false;
    }
    let baseline = window.head_variance(self.min_data_points);
    debug!(
      baseline_variance = baseline,
      samples = self.min_data_points,
      "variance baseline frozen"
    );
    window.freeze_baseline(baseline, self.min_data_points)
  }

  /// Judge the epoch that now includes `reading`.
  pub fn evaluate(
    &self,
    window: &BaselineWindow,
    epoch: &RunningStats,
    reading: &Reading,
  ) -> DetectionResult {
    let (mean, current) = epoch_moments(window, epoch);

    let mut result =
      DetectionResult::quiet(reading.device_id(), Some(reading.value()), reading.timestamp());
    result.mean = mean;
    result.variance = current;
    result.sample_count = epoch.count() as usize;
    result.required_samples = self.min_data_points;

    let baseline = match window.frozen_baseline_variance() {
      Some(b) => b,
      None => return result,
    };

    let pct = variance_increase_percent(current, baseline);
    result.baseline_established = true;
    result.baseline_variance = Some(baseline);
    result.deviation_percent = Some(pct);
    result.limit = Some(self.threshold_percent);
    if pct >= self.threshold_percent {
      result.is_abnormal = true;
      result.reason = ReasonCode::VarianceIncrease;
    }
    result
  }
}

/// Epoch mean and variance.
///
/// While nothing has been evicted the window *is* the epoch, and recomputing
/// from it keeps the boundary reading bit-identical to the frozen baseline.
/// After eviction the Welford accumulator carries the whole epoch.
fn epoch_moments(window: &BaselineWindow, epoch: &RunningStats) -> (f64, f64) {
  if epoch.count() as usize == window.sample_count() {
    (window.mean(), window.variance())
  } else {
    (epoch.mean(), epoch.variance())
  }
}

/// Percentage growth of `current` over `baseline`.
///
/// A zero baseline makes any variance an infinite increase.
pub fn variance_increase_percent(current: f64, baseline: f64) -> f64 {
  if baseline == 0.0 {
    if current > 0.0 {
      f64::INFINITY
    } else {
      0.0
    }
  } else {
    (current - baseline) / baseline * 100.0
  }
}
