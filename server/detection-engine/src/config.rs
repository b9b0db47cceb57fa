//! Engine configuration with sane defaults.
//!
//! Configuration is static per run and validated once, at construction time.
//! A bad value never surfaces per reading.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Default baseline size for average (deviation) mode.
pub const DEFAULT_MIN_READINGS_AVERAGE: usize = 10;
/// Default baseline size for variance mode.
pub const DEFAULT_MIN_READINGS_VARIANCE: usize = 20;
/// Five minutes.
pub const DEFAULT_COOLDOWN_MS: i64 = 5 * 60 * 1000;

/// Which detection strategy judges readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
  /// Static min/max bounds; no learning.
  Threshold,
  /// Percentage deviation from the sliding-window average.
  Average,
  /// Sustained variance increase over a frozen per-epoch baseline.
  Variance,
}

impl DetectionMode {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Threshold => "threshold",
      Self::Average => "average",
      Self::Variance => "variance",
    }
  }

  /// Whether this mode has a learning phase (and therefore a DETECTING state).
  pub fn learns_baseline(self) -> bool {
    !matches!(self, Self::Threshold)
  }
}

impl fmt::Display for DetectionMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for DetectionMode {
  type Err = EngineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "threshold" => Ok(Self::Threshold),
      "average" => Ok(Self::Average),
      "variance" => Ok(Self::Variance),
      other => Err(EngineError::config(
        "mode",
        &format!("unknown detection mode '{}' (expected threshold|average|variance)", other),
      )),
    }
  }
}

/// Inclusive static bounds for threshold mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
  pub min: f64,
  pub max: f64,
}

impl Bounds {
  pub(crate) fn validate(&self, field: &str) -> Result<(), EngineError> {
    if !self.min.is_finite() || !self.max.is_finite() {
      return Err(EngineError::config(field, "min and max must be finite"));
    }
    if self.min > self.max {
      return Err(EngineError::config(field, "min must not exceed max"));
    }
    Ok(())
  }
}

impl Default for Bounds {
  fn default() -> Self {
    Self { min: 0.0, max: 100.0 }
  }
}

/// Tunable detection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub mode: DetectionMode,
  /// Readings needed before a learned baseline is trusted. `None` picks the
  /// per-mode default.
  pub min_readings_for_baseline: Option<usize>,
  /// Capacity of the per-device FIFO window.
  pub window_size: usize,
  /// Average mode: alert when deviation from the mean exceeds this percentage.
  pub deviation_threshold_percent: f64,
  /// Variance mode: alert when variance grows by at least this percentage.
  pub variance_increase_threshold_percent: f64,
  /// Threshold mode bounds for devices without their own.
  pub default_bounds: Bounds,
  /// Minimum spacing between two notifications for one device.
  pub cooldown_ms: i64,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      mode: DetectionMode::Average,
      min_readings_for_baseline: None,
      window_size: 50,
      deviation_threshold_percent: 20.0,
      variance_increase_threshold_percent: 20.0,
      default_bounds: Bounds::default(),
      cooldown_ms: DEFAULT_COOLDOWN_MS,
    }
  }
}

impl Config {
  /// Defaults for the given mode.
  pub fn for_mode(mode: DetectionMode) -> Self {
    Self {
      mode,
      ..Self::default()
    }
  }

  /// Parse a JSON configuration document; missing keys take defaults.
  pub fn from_json(raw: &str) -> Result<Self, EngineError> {
    let config: Self = serde_json::from_str(raw)?;
    config.validate()?;
    Ok(config)
  }

  /// Effective minimum reading count for the configured mode.
  pub fn min_readings(&self) -> usize {
    self.min_readings_for_baseline.unwrap_or(match self.mode {
      DetectionMode::Variance => DEFAULT_MIN_READINGS_VARIANCE,
      DetectionMode::Average | DetectionMode::Threshold => DEFAULT_MIN_READINGS_AVERAGE,
    })
  }

  pub fn validate(&self) -> Result<(), EngineError> {
    if self.window_size == 0 {
      return Err(EngineError::config("window_size", "must be at least 1"));
    }
    if self.min_readings() == 0 {
      return Err(EngineError::config(
        "min_readings_for_baseline",
        "must be at least 1",
      ));
    }
    // Learned baselines are read out of the window.
    if self.mode.learns_baseline() && self.window_size < self.min_readings() {
      return Err(EngineError::config(
        "window_size",
        "must be >= min_readings_for_baseline when learning a baseline",
      ));
    }
    check_percent("deviation_threshold_percent", self.deviation_threshold_percent)?;
    check_percent(
      "variance_increase_threshold_percent",
      self.variance_increase_threshold_percent,
    )?;
    self.default_bounds.validate("default_bounds")?;
    if self.cooldown_ms < 0 {
      return Err(EngineError::config("cooldown_ms", "must not be negative"));
    }
    Ok(())
  }
}

fn check_percent(field: &str, value: f64) -> Result<(), EngineError> {
  if !value.is_finite() || value < 0.0 {
    return Err(EngineError::config(field, "must be a finite, non-negative percentage"));
  }
  Ok(())
}
