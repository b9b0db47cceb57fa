//! Static min/max bounds. No learning state.

use crate::config::Bounds;
use crate::types::{DetectionResult, ReasonCode, Reading};
use crate::window::BaselineWindow;

#[derive(Debug, Clone)]
pub struct ThresholdDetector {
  default_bounds: Bounds,
}

impl ThresholdDetector {
  pub fn new(default_bounds: Bounds) -> Self {
    Self { default_bounds }
  }

  /// Judge `reading` against `bounds` (or the defaults). The window only
  /// feeds the reported mean/variance; it plays no part in the verdict.
  pub fn evaluate(
    &self,
    window: &BaselineWindow,
    reading: &Reading,
    bounds: Option<&Bounds>,
  ) -> DetectionResult {
    let bounds = bounds.copied().unwrap_or(self.default_bounds);
    let value = reading.value();

    let mut result = DetectionResult::quiet(reading.device_id(), Some(value), reading.timestamp());
    result.mean = window.mean();
    result.variance = window.variance();
    result.sample_count = window.sample_count();
    result.baseline_established = true;
    result.reason = classify(value, &bounds);
    result.is_abnormal = result.reason != ReasonCode::None;
    result.limit = match result.reason {
      ReasonCode::BelowMin => Some(bounds.min),
      ReasonCode::AboveMax => Some(bounds.max),
      _ => None,
    };
    result
  }
}

/// Bounds are inclusive: only values strictly outside are abnormal.
pub fn classify(value: f64, bounds: &Bounds) -> ReasonCode {
  if value < bounds.min {
    ReasonCode::BelowMin
  } else if value > bounds.max {
    ReasonCode::AboveMax
  } else {
    ReasonCode::None
  }
}
