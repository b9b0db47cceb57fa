//! HTTP handlers for the ingest server.

use std::sync::Arc;

use axum::{
  body::Bytes,
  extract::{Path, State},
  http::StatusCode,
  Json,
};
use detection_engine::normalize::now_millis;
use detection_engine::types::ErrorOutput;
use detection_engine::{DetectionOutcome, DeviceStatus};
use tracing::{debug, info, warn};

use crate::state::AppState;
use crate::types::{IngestPayload, ResetResponse};

type ApiError = (StatusCode, Json<ErrorOutput>);

fn bad_request(err: ErrorOutput) -> ApiError {
  (StatusCode::BAD_REQUEST, Json(err))
}

pub async fn health() -> &'static str {
  "ok"
}

/// The body is parsed here rather than through `Json` so that `value` keeps
/// its raw text and every malformed body gets the same `ErrorOutput`.
pub async fn ingest(
  State(state): State<Arc<AppState>>,
  body: Bytes,
) -> Result<Json<DetectionOutcome>, ApiError> {
  let payload: IngestPayload = serde_json::from_slice(&body).map_err(|e| {
    warn!(error = %e, "ingest: unreadable body");
    bad_request(ErrorOutput::new(format!("json parse: {}", e)))
  })?;

  let raw = payload.into_inbound().map_err(|err| {
    warn!(reason = %err.message, "ingest: bad envelope");
    bad_request(err)
  })?;

  match state.engine.process_at(&raw, now_millis()) {
    Ok(outcome) => {
      debug!(device_id = %outcome.result.device_id, state = %outcome.state, "ingest: reading processed");
      Ok(Json(outcome))
    }
    Err(e) => {
      warn!(error = %e, "ingest: rejected payload");
      Err(bad_request(ErrorOutput::from(&e)))
    }
  }
}

pub async fn device_status(
  State(state): State<Arc<AppState>>,
  Path(device_id): Path<String>,
) -> Result<Json<DeviceStatus>, StatusCode> {
  state
    .engine
    .status(&device_id)
    .map(Json)
    .ok_or(StatusCode::NOT_FOUND)
}

pub async fn reset_device(
  State(state): State<Arc<AppState>>,
  Path(device_id): Path<String>,
) -> Json<ResetResponse> {
  let known = state.engine.reset(&device_id);
  info!(device_id = %device_id, known, "device reset requested");
  Json(ResetResponse { device_id, known })
}

pub async fn reset_cooldown(
  State(state): State<Arc<AppState>>,
  Path(device_id): Path<String>,
) -> Json<ResetResponse> {
  let known = state.engine.reset_cooldown(&device_id);
  info!(device_id = %device_id, known, "cooldown reset requested");
  Json(ResetResponse { device_id, known })
}

#[cfg(test)]
mod tests {
  use super::*;
  use detection_engine::{AlertState, Config, DetectionMode, ReasonCode, SharedEngine};
  use serde_json::json;

  fn app(mode: DetectionMode) -> Arc<AppState> {
    Arc::new(AppState::new(SharedEngine::new(Config::for_mode(mode)).unwrap()))
  }

  fn body(v: serde_json::Value) -> Bytes {
    Bytes::from(v.to_string())
  }

  #[tokio::test]
  async fn health_is_ok() {
    assert_eq!(health().await, "ok");
  }

  #[tokio::test]
  async fn ingest_returns_outcome() {
    let state = app(DetectionMode::Threshold);
    let Json(outcome) = ingest(
      State(state.clone()),
      body(json!({"deviceId": "esp32-1", "value": 150, "timestamp": 1000})),
    )
    .await
    .unwrap();
    assert_eq!(outcome.state, AlertState::Alert);
    assert_eq!(outcome.result.reason, ReasonCode::AboveMax);
    assert!(outcome.should_notify);
  }

  #[tokio::test]
  async fn ingest_stamps_missing_timestamp() {
    let state = app(DetectionMode::Threshold);
    let before = now_millis();
    let Json(outcome) = ingest(State(state), body(json!({"deviceId": "d", "value": 5})))
      .await
      .unwrap();
    assert!(outcome.result.timestamp >= before);
  }

  #[tokio::test]
  async fn ingest_missing_device_is_bad_request() {
    let state = app(DetectionMode::Average);
    let (status, Json(err)) = ingest(State(state), body(json!({"value": 5})))
      .await
      .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err.field.as_deref(), Some("device_id"));
  }

  #[tokio::test]
  async fn ingest_malformed_json_is_bad_request() {
    let state = app(DetectionMode::Average);
    let (status, Json(err)) = ingest(State(state), Bytes::from_static(b"{\"deviceId\": "))
      .await
      .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err.message.starts_with("json parse"));
  }

  #[tokio::test]
  async fn ingest_bad_timestamp_is_bad_request() {
    let state = app(DetectionMode::Average);
    let (status, _) = ingest(
      State(state),
      body(json!({"deviceId": "d", "value": 5, "timestamp": "later"})),
    )
    .await
    .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn unparseable_value_is_answered_not_rejected() {
    let state = app(DetectionMode::Average);
    let Json(outcome) = ingest(
      State(state),
      body(json!({"deviceId": "d", "value": "n/a", "timestamp": 1})),
    )
    .await
    .unwrap();
    assert!(!outcome.result.accepted);
    assert_eq!(outcome.state, AlertState::Detecting);
  }

  #[tokio::test]
  async fn out_of_range_value_is_answered_not_rejected() {
    let state = app(DetectionMode::Threshold);
    let Json(outcome) = ingest(
      State(state.clone()),
      Bytes::from_static(br#"{"deviceId": "d", "value": 1e400, "timestamp": 1}"#),
    )
    .await
    .unwrap();
    assert!(!outcome.result.accepted);
    assert_eq!(outcome.result.value, None);
    assert!(state.engine.status("d").is_none());
  }

  #[tokio::test]
  async fn status_unknown_device_is_not_found() {
    let state = app(DetectionMode::Average);
    let err = device_status(State(state), Path("nope".into())).await.unwrap_err();
    assert_eq!(err, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn status_uses_one_casing() {
    let state = app(DetectionMode::Threshold);
    ingest(
      State(state.clone()),
      body(json!({"deviceId": "d", "value": 150, "timestamp": 10})),
    )
    .await
    .unwrap();
    let Json(status) = device_status(State(state), Path("d".into())).await.unwrap();
    let v = serde_json::to_value(&status).unwrap();
    assert_eq!(v["deviceId"], "d");
    assert_eq!(v["sampleCount"], 1);
    assert_eq!(v["lastNotifiedAt"], 10);
    assert_eq!(v["lastResult"]["reasonCode"], "ABOVE_MAX");
    assert_eq!(v["lastResult"]["sampleCount"], 1);
  }

  #[tokio::test]
  async fn status_reset_and_cooldown() {
    let state = app(DetectionMode::Threshold);
    ingest(
      State(state.clone()),
      body(json!({"deviceId": "d", "value": 150, "timestamp": 10})),
    )
    .await
    .unwrap();

    let Json(status) = device_status(State(state.clone()), Path("d".into())).await.unwrap();
    assert_eq!(status.state, AlertState::Alert);
    assert_eq!(status.sample_count, 1);
    assert_eq!(status.last_notified_at, Some(10));

    let Json(resp) = reset_cooldown(State(state.clone()), Path("d".into())).await;
    assert!(resp.known);
    let Json(status) = device_status(State(state.clone()), Path("d".into())).await.unwrap();
    assert_eq!(status.last_notified_at, None);
    assert_eq!(status.state, AlertState::Alert);

    let Json(resp) = reset_device(State(state.clone()), Path("d".into())).await;
    assert!(resp.known);
    let Json(status) = device_status(State(state.clone()), Path("d".into())).await.unwrap();
    assert_eq!(status.state, AlertState::Detecting);
    assert_eq!(status.sample_count, 0);

    let Json(resp) = reset_device(State(state), Path("ghost".into())).await;
    assert!(!resp.known);
  }
}
