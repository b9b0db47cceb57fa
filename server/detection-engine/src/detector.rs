//! Strategy selection: one configured detector, dispatched per reading.
//!
//! The strategies differ in *when* a reading joins history. Average mode
//! judges first and pushes after, so a point never dilutes its own deviation.
//! Variance mode pushes first, because the epoch the reading is judged on
//! includes it.

use crate::config::{Bounds, Config, DetectionMode};
use crate::deviation::DeviationDetector;
use crate::stats::RunningStats;
use crate::threshold::ThresholdDetector;
use crate::types::{DetectionResult, Reading};
use crate::variance::VarianceDetector;
use crate::window::BaselineWindow;

/// Learning state for one device, shared by every strategy.
#[derive(Debug, Clone)]
pub struct History {
  pub window: BaselineWindow,
  /// Accumulates every reading since the epoch started; variance mode only.
  pub epoch: RunningStats,
}

impl History {
  pub fn new(capacity: usize) -> Self {
    Self {
      window: BaselineWindow::new(capacity),
      epoch: RunningStats::new(),
    }
  }

  /// Start a new epoch.
  pub fn reset(&mut self) {
    self.window.reset();
    self.epoch.reset();
  }
}

#[derive(Debug, Clone)]
pub enum Detector {
  Threshold(ThresholdDetector),
  Deviation(DeviationDetector),
  Variance(VarianceDetector),
}

impl Detector {
  /// Build the strategy named by `config.mode`. Assumes a validated config.
  pub fn from_config(config: &Config) -> Self {
    match config.mode {
      DetectionMode::Threshold => Self::Threshold(ThresholdDetector::new(config.default_bounds)),
      DetectionMode::Average => Self::Deviation(DeviationDetector::new(
        config.min_readings(),
        config.deviation_threshold_percent,
      )),
      DetectionMode::Variance => Self::Variance(VarianceDetector::new(
        config.min_readings(),
        config.variance_increase_threshold_percent,
      )),
    }
  }

  pub fn mode(&self) -> DetectionMode {
    match self {
      Self::Threshold(_) => DetectionMode::Threshold,
      Self::Deviation(_) => DetectionMode::Average,
      Self::Variance(_) => DetectionMode::Variance,
    }
  }

  /// Judge `reading` and fold it into `history`.
  ///
  /// `bounds` overrides the threshold defaults for this device; other
  /// strategies ignore it.
  pub fn observe(
    &self,
    history: &mut History,
    reading: &Reading,
    bounds: Option<&Bounds>,
  ) -> DetectionResult {
    let value = reading.value();
    match self {
      Self::Threshold(detector) => {
        history.window.push(value);
        detector.evaluate(&history.window, reading, bounds)
      }
      Self::Deviation(detector) => {
        let result = detector.evaluate(&history.window, reading);
        history.window.push(value);
        result
      }
      Self::Variance(detector) => {
        history.window.push(value);
        history.epoch.push(value);
        detector.freeze_if_due(&mut history.window, &history.epoch);
        detector.evaluate(&history.window, &history.epoch, reading)
      }
    }
  }

  /// Readings the current verdict rests on: the window, or the whole epoch
  /// in variance mode.
  pub fn sample_count(&self, history: &History) -> usize {
    match self {
      Self::Variance(_) => history.epoch.count() as usize,
      Self::Threshold(_) | Self::Deviation(_) => history.window.sample_count(),
    }
  }

  /// Statistics of `history` as they stand, for echoing on rejected readings.
  pub fn snapshot(&self, history: &History, device_id: &str, timestamp: i64) -> DetectionResult {
    let mut result = DetectionResult::quiet(device_id, None, timestamp);
    result.mean = history.window.mean();
    result.variance = history.window.variance();
    result.sample_count = self.sample_count(history);
    match self {
      Self::Threshold(_) => {
        result.baseline_established = true;
      }
      Self::Deviation(detector) => {
        result.required_samples = detector.min_samples();
        result.baseline_established = result.sample_count >= detector.min_samples();
      }
      Self::Variance(detector) => {
        result.required_samples = detector.min_data_points();
        result.baseline_variance = history.window.frozen_baseline_variance();
        result.baseline_established = result.baseline_variance.is_some();
        if history.epoch.count() as usize != history.window.sample_count() {
          result.mean = history.epoch.mean();
          result.variance = history.epoch.variance();
        }
      }
    }
    result
  }
}
