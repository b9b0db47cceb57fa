//! Structured error types for the detection engine.
//!
//! Only malformed envelopes and invalid configuration are errors. A reading
//! whose value cannot be parsed is not: it yields a rejected outcome instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("config: {field}: {reason}")]
  Config { field: String, reason: String },

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl EngineError {
  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn config(field: &str, reason: &str) -> Self {
    Self::Config {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  /// The offending field, when the error names one.
  pub fn field(&self) -> Option<&str> {
    match self {
      Self::Validation { field, .. } | Self::Config { field, .. } => Some(field),
      Self::Json(_) => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn validation_display_names_field() {
    let err = EngineError::validation("device_id", "must not be empty");
    assert_eq!(err.to_string(), "validation: device_id: must not be empty");
    assert_eq!(err.field(), Some("device_id"));
  }

  #[test]
  fn config_display_names_field() {
    let err = EngineError::config("mode", "unknown detection mode 'median'");
    assert_eq!(err.to_string(), "config: mode: unknown detection mode 'median'");
  }

  #[test]
  fn json_error_has_no_field() {
    let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err = EngineError::from(parse);
    assert!(err.to_string().starts_with("json: "));
    assert_eq!(err.field(), None);
  }
}
