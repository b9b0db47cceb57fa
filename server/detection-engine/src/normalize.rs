//! Normalize raw device payloads into validated readings.
//!
//! Parsing fails closed: `value` must be one of the shapes below, and there is
//! no fallback to other field names.

use chrono::Utc;
use serde_json::value::RawValue;
use serde_json::Value;

use crate::error::EngineError;
use crate::types::{InboundReading, Reading};

/// Outcome of normalizing one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
  Reading(Reading),
  /// Envelope is fine but the value is not a usable number. The engine
  /// answers these without touching any statistics.
  Unparseable {
    device_id: String,
    timestamp: i64,
    reason: &'static str,
  },
}

/// Current time in Unix milliseconds, used to stamp payloads without one.
pub fn now_millis() -> i64 {
  Utc::now().timestamp_millis()
}

/// Validate the envelope and parse the value.
///
/// Only a missing device id is an error; a bad value yields
/// `Normalized::Unparseable`.
pub fn normalize(raw: &InboundReading, received_at: i64) -> Result<Normalized, EngineError> {
  let device_id = raw.device_id.trim();
  if device_id.is_empty() {
    return Err(EngineError::validation("device_id", "must not be empty"));
  }
  let timestamp = raw.timestamp.unwrap_or(received_at);

  let value = match raw.value.as_deref() {
    Some(v) => parse_raw(v),
    None => Err("missing value"),
  };

  match value {
    Ok((v, inner_unit)) => {
      let unit = raw.unit.as_deref().or(inner_unit.as_deref());
      Ok(Normalized::Reading(Reading::new(device_id, v, timestamp)?.with_unit(unit)))
    }
    Err(reason) => Ok(Normalized::Unparseable {
      device_id: device_id.to_string(),
      timestamp,
      reason,
    }),
  }
}

/// Parse unparsed JSON text; also returns the unit of the object form.
///
/// The text is already known to be valid JSON, so a failure here means a
/// number beyond the range of `f64`.
fn parse_raw(raw: &RawValue) -> Result<(f64, Option<String>), &'static str> {
  let v: Value = serde_json::from_str(raw.get()).map_err(|_| "number out of range")?;
  let unit = v.get("unit").and_then(Value::as_str).map(str::to_string);
  Ok((parse_value(&v)?, unit))
}

/// Accepts a number, a numeric string, or `{"value": <number|numeric string>}`.
pub fn parse_value(v: &Value) -> Result<f64, &'static str> {
  match v {
    Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).ok_or("number out of range"),
    Value::String(s) => parse_numeric_str(s),
    Value::Object(map) => match map.get("value") {
      Some(Value::Number(n)) => n.as_f64().filter(|f| f.is_finite()).ok_or("number out of range"),
      Some(Value::String(s)) => parse_numeric_str(s),
      _ => Err("object without numeric value"),
    },
    Value::Null => Err("missing value"),
    Value::Bool(_) | Value::Array(_) => Err("value is not numeric"),
  }
}

fn parse_numeric_str(s: &str) -> Result<f64, &'static str> {
  match s.trim().parse::<f64>() {
    Ok(f) if f.is_finite() => Ok(f),
    Ok(_) => Err("non-finite value"),
    Err(_) => Err("value is not numeric"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn inbound(value: Option<Value>) -> InboundReading {
    match value {
      Some(v) => InboundReading::new("esp32-1", &v, Some(1_000)),
      None => InboundReading {
        device_id: "esp32-1".into(),
        timestamp: Some(1_000),
        ..InboundReading::default()
      },
    }
  }

  #[test]
  fn accepted_shapes() {
    assert_eq!(parse_value(&json!(42)), Ok(42.0));
    assert_eq!(parse_value(&json!(-3.5)), Ok(-3.5));
    assert_eq!(parse_value(&json!(" 17.25 ")), Ok(17.25));
    assert_eq!(parse_value(&json!({"value": 81, "unit": "ppi"})), Ok(81.0));
    assert_eq!(parse_value(&json!({"value": "81"})), Ok(81.0));
  }

  #[test]
  fn rejected_shapes() {
    for bad in [
      json!(null),
      json!(true),
      json!([1, 2]),
      json!(""),
      json!("abc"),
      json!("NaN"),
      json!("inf"),
      json!({"reading": 5}),
      json!({"value": null}),
    ] {
      assert!(parse_value(&bad).is_err(), "should reject {}", bad);
    }
  }

  #[test]
  fn valid_payload_becomes_reading() {
    let out = normalize(&inbound(Some(json!(12.5))), 0).unwrap();
    let expected = Reading::new("esp32-1", 12.5, 1_000).unwrap();
    assert_eq!(out, Normalized::Reading(expected));
  }

  #[test]
  fn missing_value_is_unparseable_not_error() {
    let out = normalize(&inbound(None), 0).unwrap();
    assert!(matches!(
      out,
      Normalized::Unparseable { ref device_id, timestamp: 1_000, reason: "missing value" }
        if device_id == "esp32-1"
    ));
  }

  #[test]
  fn no_fallback_to_other_fields() {
    let raw: InboundReading =
      serde_json::from_str(r#"{"deviceId": "d", "reading": 55, "timestamp": 1}"#).unwrap();
    assert!(matches!(normalize(&raw, 0).unwrap(), Normalized::Unparseable { .. }));
  }

  #[test]
  fn out_of_range_number_is_unparseable() {
    let raw: InboundReading =
      serde_json::from_str(r#"{"deviceId": "d", "value": 1e400, "timestamp": 4}"#).unwrap();
    assert_eq!(
      normalize(&raw, 0).unwrap(),
      Normalized::Unparseable {
        device_id: "d".into(),
        timestamp: 4,
        reason: "number out of range",
      }
    );
  }

  #[test]
  fn unit_from_envelope_or_object() {
    let mut raw = inbound(Some(json!({"value": 21.5, "unit": "C"})));
    match normalize(&raw, 0).unwrap() {
      Normalized::Reading(r) => assert_eq!(r.unit(), Some("C")),
      other => panic!("unexpected {:?}", other),
    }
    raw.unit = Some("F".into());
    match normalize(&raw, 0).unwrap() {
      Normalized::Reading(r) => assert_eq!(r.unit(), Some("F")),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn missing_timestamp_is_stamped() {
    let mut raw = inbound(Some(json!(1)));
    raw.timestamp = None;
    match normalize(&raw, 77).unwrap() {
      Normalized::Reading(r) => assert_eq!(r.timestamp(), 77),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn empty_device_is_validation_error() {
    let mut raw = inbound(Some(json!(1)));
    raw.device_id = "   ".into();
    let err = normalize(&raw, 0).unwrap_err();
    assert!(err.to_string().contains("device_id"));
  }

  #[test]
  fn now_millis_is_recent() {
    // 2020-01-01T00:00:00Z
    assert!(now_millis() > 1_577_836_800_000);
  }
}
