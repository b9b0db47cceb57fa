//! Command-line configuration shared by the binaries.
//!
//! Layers: built-in defaults, then an optional JSON file, then flags (each
//! flag also reads an environment variable).

use std::path::PathBuf;

use clap::Args;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::{Bounds, Config, DetectionMode};
use crate::error::EngineError;

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
  /// JSON configuration file; flags override its values
  #[arg(long, env = "DETECTION_CONFIG")]
  pub config: Option<PathBuf>,

  /// Detection mode (threshold, average, variance)
  #[arg(long, env = "DETECTION_MODE")]
  pub mode: Option<DetectionMode>,

  /// Capacity of the per-device sliding window
  #[arg(long, env = "DETECTION_WINDOW_SIZE")]
  pub window_size: Option<usize>,

  /// Readings needed before a learned baseline is trusted
  #[arg(long, env = "DETECTION_MIN_READINGS")]
  pub min_readings: Option<usize>,

  /// Average mode: alert above this deviation (percent)
  #[arg(long, env = "DETECTION_DEVIATION_THRESHOLD")]
  pub deviation_threshold: Option<f64>,

  /// Variance mode: alert at this variance increase (percent)
  #[arg(long, env = "DETECTION_VARIANCE_THRESHOLD")]
  pub variance_threshold: Option<f64>,

  /// Threshold mode lower bound
  #[arg(long, env = "DETECTION_MIN")]
  pub min: Option<f64>,

  /// Threshold mode upper bound
  #[arg(long, env = "DETECTION_MAX")]
  pub max: Option<f64>,

  /// Minimum spacing between notifications per device (ms)
  #[arg(long, env = "DETECTION_COOLDOWN_MS")]
  pub cooldown_ms: Option<i64>,

  /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
  #[arg(long, env = "LOG_LEVEL", default_value = "info")]
  pub log_level: String,
}

impl ConfigArgs {
  /// Resolve the layered configuration and validate it.
  pub fn resolve(&self) -> Result<Config, EngineError> {
    let mut config = match &self.config {
      Some(path) => {
        let raw = std::fs::read_to_string(path).map_err(|e| {
          EngineError::config("config", &format!("cannot read {}: {}", path.display(), e))
        })?;
        Config::from_json(&raw)?
      }
      None => Config::default(),
    };
    self.apply(&mut config);
    config.validate()?;
    Ok(config)
  }

  fn apply(&self, config: &mut Config) {
    if let Some(mode) = self.mode {
      config.mode = mode;
    }
    if let Some(n) = self.window_size {
      config.window_size = n;
    }
    if let Some(n) = self.min_readings {
      config.min_readings_for_baseline = Some(n);
    }
    if let Some(p) = self.deviation_threshold {
      config.deviation_threshold_percent = p;
    }
    if let Some(p) = self.variance_threshold {
      config.variance_increase_threshold_percent = p;
    }
    if let Some(min) = self.min {
      config.default_bounds.min = min;
    }
    if let Some(max) = self.max {
      config.default_bounds.max = max;
    }
    if let Some(ms) = self.cooldown_ms {
      config.cooldown_ms = ms;
    }
  }
}

/// Install the global subscriber. Logs go to stderr; `RUST_LOG` wins over
/// `level`.
pub fn init_tracing(level: &str) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
    let level = match level.to_lowercase().as_str() {
      "trace" => Level::TRACE,
      "debug" => Level::DEBUG,
      "warn" => Level::WARN,
      "error" => Level::ERROR,
      _ => Level::INFO,
    };
    EnvFilter::default().add_directive(level.into())
  });

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args() -> ConfigArgs {
    ConfigArgs {
      log_level: "info".into(),
      ..ConfigArgs::default()
    }
  }

  #[test]
  fn no_flags_gives_defaults() {
    assert_eq!(args().resolve().unwrap(), Config::default());
  }

  #[test]
  fn flags_override_defaults() {
    let config = ConfigArgs {
      mode: Some(DetectionMode::Threshold),
      min: Some(-5.0),
      max: Some(5.0),
      cooldown_ms: Some(0),
      ..args()
    }
    .resolve()
    .unwrap();
    assert_eq!(config.mode, DetectionMode::Threshold);
    assert_eq!(config.default_bounds, Bounds { min: -5.0, max: 5.0 });
    assert_eq!(config.cooldown_ms, 0);
  }

  #[test]
  fn file_then_flags() {
    let path = std::env::temp_dir().join(format!("detection-cli-{}.json", std::process::id()));
    std::fs::write(&path, r#"{"mode": "variance", "window_size": 40}"#).unwrap();
    let config = ConfigArgs {
      config: Some(path.clone()),
      window_size: Some(30),
      ..args()
    }
    .resolve()
    .unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(config.mode, DetectionMode::Variance);
    assert_eq!(config.window_size, 30);
  }

  #[test]
  fn invalid_layered_config_is_rejected() {
    let err = ConfigArgs {
      mode: Some(DetectionMode::Variance),
      window_size: Some(5),
      ..args()
    }
    .resolve()
    .unwrap_err();
    assert_eq!(err.field(), Some("window_size"));
  }

  #[test]
  fn missing_file_is_config_error() {
    let err = ConfigArgs {
      config: Some(PathBuf::from("/nonexistent/detection.json")),
      ..args()
    }
    .resolve()
    .unwrap_err();
    assert_eq!(err.field(), Some("config"));
  }
}
