//! Request/response types for the ingest server.

use detection_engine::types::ErrorOutput;
use detection_engine::InboundReading;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::date;

/// Device payload as posted over HTTP. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestPayload {
  #[serde(default, alias = "device_id")]
  pub device_id: String,
  #[serde(default)]
  pub value: Option<Box<RawValue>>,
  #[serde(default)]
  pub timestamp: Option<Timestamp>,
  #[serde(default)]
  pub unit: Option<String>,
}

/// Devices send either Unix milliseconds or an RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
  Millis(i64),
  Text(String),
}

impl IngestPayload {
  /// Convert to the engine's envelope. Only an unreadable timestamp fails
  /// here; everything else is judged by the engine.
  pub fn into_inbound(self) -> Result<InboundReading, ErrorOutput> {
    let timestamp = match self.timestamp {
      None => None,
      Some(Timestamp::Millis(ms)) => Some(ms),
      Some(Timestamp::Text(s)) => match date::parse_timestamp_millis(&s) {
        Some(ms) => Some(ms),
        None => {
          return Err(
            ErrorOutput::new(format!("invalid timestamp '{}' (expected RFC 3339 or Unix ms)", s))
              .with_field("timestamp"),
          )
        }
      },
    };
    Ok(InboundReading {
      device_id: self.device_id,
      value: self.value,
      timestamp,
      unit: self.unit,
    })
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
  pub device_id: String,
  pub known: bool,
}
