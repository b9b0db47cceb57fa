//! Core types for the detection engine (JSON contracts + internal models).

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Inbound types (JSON contract: what the ingestion side sends)
// ---------------------------------------------------------------------------

/// One raw device payload. Unknown fields are silently ignored.
///
/// `value` is kept as unparsed JSON text so that a number serde cannot hold
/// (say `1e400`) still reaches `normalize` and is rejected there, instead of
/// failing the whole envelope.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundReading {
  #[serde(default, alias = "device_id")]
  pub device_id: String,
  #[serde(default)]
  pub value: Option<Box<RawValue>>,
  /// Milliseconds since the Unix epoch. Stamped on receipt when absent.
  #[serde(default)]
  pub timestamp: Option<i64>,
  #[serde(default)]
  pub unit: Option<String>,
}

impl InboundReading {
  pub fn new(device_id: impl Into<String>, value: &serde_json::Value, timestamp: Option<i64>) -> Self {
    Self {
      device_id: device_id.into(),
      value: serde_json::value::to_raw_value(value).ok(),
      timestamp,
      unit: None,
    }
  }
}

/// One line of the JSON-lines protocol: a command or a reading.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "InboundLine")]
pub enum InboundMessage {
  Reset { reset: String },
  ResetCooldown { reset_cooldown: String },
  Reading(InboundReading),
}

// Flat on purpose: untagged/flattened parsing would buffer `value` and lose
// the raw text.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InboundLine {
  #[serde(default)]
  reset: Option<String>,
  #[serde(default, alias = "reset_cooldown")]
  reset_cooldown: Option<String>,
  #[serde(default, alias = "device_id")]
  device_id: String,
  #[serde(default)]
  value: Option<Box<RawValue>>,
  #[serde(default)]
  timestamp: Option<i64>,
  #[serde(default)]
  unit: Option<String>,
}

impl From<InboundLine> for InboundMessage {
  fn from(line: InboundLine) -> Self {
    if let Some(reset) = line.reset {
      return Self::Reset { reset };
    }
    if let Some(reset_cooldown) = line.reset_cooldown {
      return Self::ResetCooldown { reset_cooldown };
    }
    Self::Reading(InboundReading {
      device_id: line.device_id,
      value: line.value,
      timestamp: line.timestamp,
      unit: line.unit,
    })
  }
}

// ---------------------------------------------------------------------------
// Reading (validated, immutable)
// ---------------------------------------------------------------------------

/// A timestamped scalar measurement for one device.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
  device_id: String,
  value: f64,
  timestamp: i64,
  unit: Option<String>,
}

impl Reading {
  pub fn new(device_id: impl Into<String>, value: f64, timestamp: i64) -> Result<Self, EngineError> {
    let device_id = device_id.into();
    if device_id.trim().is_empty() {
      return Err(EngineError::validation("device_id", "must not be empty"));
    }
    if !value.is_finite() {
      return Err(EngineError::validation("value", "must be a finite number"));
    }
    Ok(Self {
      device_id,
      value,
      timestamp,
      unit: None,
    })
  }

  /// Attach a display unit (e.g. "C"); blank units are dropped.
  pub fn with_unit(mut self, unit: Option<&str>) -> Self {
    self.unit = unit.map(str::trim).filter(|u| !u.is_empty()).map(str::to_string);
    self
  }

  pub fn device_id(&self) -> &str {
    &self.device_id
  }

  pub fn value(&self) -> f64 {
    self.value
  }

  pub fn timestamp(&self) -> i64 {
    self.timestamp
  }

  pub fn unit(&self) -> Option<&str> {
    self.unit.as_deref()
  }
}

// ---------------------------------------------------------------------------
// Verdicts and states
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
  None,
  BelowMin,
  AboveMax,
  DeviationFromAverage,
  VarianceIncrease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertState {
  /// Not enough history to judge yet.
  #[default]
  Detecting,
  Normal,
  Alert,
}

impl AlertState {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Detecting => "DETECTING",
      Self::Normal => "NORMAL",
      Self::Alert => "ALERT",
    }
  }
}

impl std::fmt::Display for AlertState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Verdict for one reading. Recomputed on every reading; never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
  pub device_id: String,
  /// `None` when the reading was rejected as unparseable.
  pub value: Option<f64>,
  pub timestamp: i64,
  /// False when the reading never touched the statistics.
  pub accepted: bool,
  /// Mean of the reference the reading was judged against.
  pub mean: f64,
  pub variance: f64,
  pub sample_count: usize,
  /// Samples needed before the baseline is trusted ("collecting k/N").
  pub required_samples: usize,
  pub baseline_established: bool,
  pub is_abnormal: bool,
  /// Deviation from the mean (average mode) or variance increase (variance
  /// mode), in percent. Infinite increases serialize as `null`.
  pub deviation_percent: Option<f64>,
  /// Frozen epoch baseline (variance mode only).
  #[serde(skip_serializing_if = "Option::is_none")]
  pub baseline_variance: Option<f64>,
  /// The bound (threshold mode) or percentage limit the reading was held to.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<f64>,
  #[serde(rename = "reasonCode")]
  pub reason: ReasonCode,
}

impl DetectionResult {
  /// A result that judged nothing: no deviation, not abnormal.
  pub fn quiet(device_id: &str, value: Option<f64>, timestamp: i64) -> Self {
    Self {
      device_id: device_id.to_string(),
      value,
      timestamp,
      accepted: value.is_some(),
      mean: 0.0,
      variance: 0.0,
      sample_count: 0,
      required_samples: 0,
      baseline_established: false,
      is_abnormal: false,
      deviation_percent: None,
      baseline_variance: None,
      limit: None,
      reason: ReasonCode::None,
    }
  }
}

// ---------------------------------------------------------------------------
// Output types (JSON contract: what we emit)
// ---------------------------------------------------------------------------

/// Message for the notification transport to deliver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
  pub id: String,
  pub device_id: String,
  pub title: String,
  pub body: String,
  #[serde(rename = "reasonCode")]
  pub reason: ReasonCode,
  pub value: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub unit: Option<String>,
  pub notified_at: i64,
}

/// Everything a subscriber needs after one reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionOutcome {
  pub result: DetectionResult,
  pub state: AlertState,
  pub previous_state: AlertState,
  pub should_notify: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notification: Option<Notification>,
}

impl DetectionOutcome {
  pub fn state_changed(&self) -> bool {
    self.state != self.previous_state
  }
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// Structured error output for invalid input lines.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}

impl From<&EngineError> for ErrorOutput {
  fn from(err: &EngineError) -> Self {
    match err {
      EngineError::Validation { field, reason } | EngineError::Config { field, reason } => {
        Self::new(reason.clone()).with_field(field.clone())
      }
      EngineError::Json(_) => Self::new(err.to_string()),
    }
  }
}

/// Acknowledgement for a command line.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
  pub ok: bool,
  pub command: &'static str,
  pub device_id: String,
  /// Whether the device had any state before the command.
  pub known: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reading_rejects_empty_device() {
    let err = Reading::new("  ", 1.0, 0).unwrap_err();
    assert_eq!(err.field(), Some("device_id"));
  }

  #[test]
  fn reading_rejects_non_finite_value() {
    assert!(Reading::new("d", f64::NAN, 0).is_err());
    assert!(Reading::new("d", f64::INFINITY, 0).is_err());
    let r = Reading::new("d", 42.5, 7).unwrap();
    assert_eq!((r.device_id(), r.value(), r.timestamp()), ("d", 42.5, 7));
  }

  #[test]
  fn inbound_accepts_camel_case_device_id() {
    let raw: InboundReading =
      serde_json::from_str(r#"{"deviceId": "esp32-1", "value": 12, "rssi": -40}"#).unwrap();
    assert_eq!(raw.device_id, "esp32-1");
    assert_eq!(raw.timestamp, None);
  }

  #[test]
  fn inbound_message_distinguishes_commands() {
    let reset: InboundMessage = serde_json::from_str(r#"{"reset": "d1"}"#).unwrap();
    assert!(matches!(reset, InboundMessage::Reset { reset } if reset == "d1"));

    let cooldown: InboundMessage = serde_json::from_str(r#"{"reset_cooldown": "d1"}"#).unwrap();
    assert!(matches!(cooldown, InboundMessage::ResetCooldown { .. }));
    let cooldown: InboundMessage = serde_json::from_str(r#"{"resetCooldown": "d1"}"#).unwrap();
    assert!(matches!(cooldown, InboundMessage::ResetCooldown { .. }));

    let reading: InboundMessage =
      serde_json::from_str(r#"{"device_id": "d1", "value": 3}"#).unwrap();
    assert!(matches!(reading, InboundMessage::Reading(ref r) if r.device_id == "d1"));
  }

  #[test]
  fn out_of_range_value_keeps_envelope() {
    let raw: InboundReading =
      serde_json::from_str(r#"{"deviceId": "d", "value": 1e400, "timestamp": 1}"#).unwrap();
    assert_eq!(raw.value.unwrap().get(), "1e400");

    let line: InboundMessage =
      serde_json::from_str(r#"{"deviceId": "d", "value": 1e400, "unit": "C"}"#).unwrap();
    match line {
      InboundMessage::Reading(r) => assert_eq!(r.unit.as_deref(), Some("C")),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn unit_is_trimmed_and_blank_dropped() {
    let r = Reading::new("d", 1.0, 0).unwrap().with_unit(Some(" C "));
    assert_eq!(r.unit(), Some("C"));
    let r = Reading::new("d", 1.0, 0).unwrap().with_unit(Some("  "));
    assert_eq!(r.unit(), None);
  }

  #[test]
  fn enums_serialize_screaming_snake_case() {
    assert_eq!(serde_json::to_string(&AlertState::Detecting).unwrap(), "\"DETECTING\"");
    assert_eq!(
      serde_json::to_string(&ReasonCode::DeviationFromAverage).unwrap(),
      "\"DEVIATION_FROM_AVERAGE\""
    );
  }

  #[test]
  fn infinite_deviation_serializes_as_null() {
    let mut result = DetectionResult::quiet("d", Some(1.0), 0);
    result.deviation_percent = Some(f64::INFINITY);
    let json = serde_json::to_value(&result).unwrap();
    assert!(json["deviationPercent"].is_null());
    assert_eq!(json["reasonCode"], "NONE");
    assert_eq!(json["deviceId"], "d");
  }
}
