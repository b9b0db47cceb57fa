//! Average mode: percentage deviation from the sliding-window mean.

use crate::types::{DetectionResult, ReasonCode, Reading};
use crate::window::BaselineWindow;

#[derive(Debug, Clone)]
pub struct DeviationDetector {
  min_samples: usize,
  threshold_percent: f64,
}

impl DeviationDetector {
  pub fn new(min_samples: usize, threshold_percent: f64) -> Self {
    Self {
      min_samples,
      threshold_percent,
    }
  }

  pub fn min_samples(&self) -> usize {
    self.min_samples
  }

  /// Judge `reading` against the window as it stood *before* the reading.
  ///
  /// The caller pushes the value afterwards, so a new point never dilutes its
  /// own deviation. The reading being judged counts toward the baseline: the
  /// Nth reading is judged against the mean of the N-1 before it.
  pub fn evaluate(&self, window: &BaselineWindow, reading: &Reading) -> DetectionResult {
    let prior = window.sample_count();
    let observed = (prior + 1).min(window.capacity());
    let value = reading.value();

    let mut result = DetectionResult::quiet(reading.device_id(), Some(value), reading.timestamp());
    result.mean = window.mean();
    result.variance = window.variance();
    result.sample_count = observed;
    result.required_samples = self.min_samples;
    result.baseline_established = prior >= 1 && prior + 1 >= self.min_samples;

    if !result.baseline_established {
      return result;
    }

    let pct = deviation_percent(value, result.mean);
    result.deviation_percent = Some(pct);
    result.limit = Some(self.threshold_percent);
    if pct > self.threshold_percent {
      result.is_abnormal = true;
      result.reason = ReasonCode::DeviationFromAverage;
    }
    result
  }
}

/// `|value - mean| / |mean| * 100`; zero when the mean is zero.
pub fn deviation_percent(value: f64, mean: f64) -> f64 {
  if mean == 0.0 {
    return 0.0;
  }
  (value - mean).abs() / mean.abs() * 100.0
}

#[cfg(test)]
mod tests {
  use super::*;

  fn reading(value: f64) -> Reading {
    Reading::new("d1", value, 0).unwrap()
  }

  fn window_of(values: &[f64]) -> BaselineWindow {
    let mut window = BaselineWindow::new(50);
    for v in values {
      window.push(*v);
    }
    window
  }

  #[test]
  fn deviation_percent_basic() {
    assert!((deviation_percent(70.0, 50.0) - 40.0).abs() < 1e-12);
    assert!((deviation_percent(30.0, 50.0) - 40.0).abs() < 1e-12);
    assert_eq!(deviation_percent(1234.0, 0.0), 0.0);
  }

  #[test]
  fn not_established_before_min_samples() {
    let detector = DeviationDetector::new(10, 20.0);
    let window = window_of(&[50.0; 8]);
    let result = detector.evaluate(&window, &reading(500.0));
    assert!(!result.baseline_established);
    assert!(!result.is_abnormal);
    assert_eq!(result.reason, ReasonCode::None);
    assert_eq!(result.sample_count, 9);
    assert_eq!(result.required_samples, 10);
    assert!((result.mean - 50.0).abs() < f64::EPSILON);
  }

  #[test]
  fn judged_against_prior_history() {
    let detector = DeviationDetector::new(10, 20.0);
    let window = window_of(&[50.0; 10]);
    let result = detector.evaluate(&window, &reading(70.0));
    assert!(result.baseline_established);
    assert!(result.is_abnormal);
    assert_eq!(result.reason, ReasonCode::DeviationFromAverage);
    assert!((result.deviation_percent.unwrap() - 40.0).abs() < 1e-9);
    // Window untouched by evaluation.
    assert_eq!(window.sample_count(), 10);
  }

  #[test]
  fn exactly_at_threshold_is_not_abnormal() {
    let detector = DeviationDetector::new(2, 20.0);
    let window = window_of(&[50.0, 50.0]);
    let result = detector.evaluate(&window, &reading(60.0));
    assert!((result.deviation_percent.unwrap() - 20.0).abs() < 1e-9);
    assert!(!result.is_abnormal);
  }

  #[test]
  fn zero_mean_never_alerts() {
    let detector = DeviationDetector::new(3, 20.0);
    let window = window_of(&[0.0, 0.0, 0.0]);
    let result = detector.evaluate(&window, &reading(99.0));
    assert!(result.baseline_established);
    assert_eq!(result.deviation_percent, Some(0.0));
    assert!(!result.is_abnormal);
  }

  #[test]
  fn single_sample_baseline_needs_one_prior() {
    let detector = DeviationDetector::new(1, 20.0);
    let empty = BaselineWindow::new(5);
    assert!(!detector.evaluate(&empty, &reading(10.0)).baseline_established);
    let one = window_of(&[10.0]);
    assert!(detector.evaluate(&one, &reading(10.0)).baseline_established);
  }
}
