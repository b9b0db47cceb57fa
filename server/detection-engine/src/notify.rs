//! Notification gate: per-device cooldown plus the message handed to transport.

use crate::types::{AlertState, DetectionResult, Notification, ReasonCode};

/// Rate-limits alert notifications for one device.
///
/// Fires on every ALERT reading once the cooldown has elapsed, so a sustained
/// alert re-notifies periodically rather than once per episode.
#[derive(Debug, Clone)]
pub struct NotificationGate {
  cooldown_ms: i64,
  last_notified_at: Option<i64>,
}

impl NotificationGate {
  pub fn new(cooldown_ms: i64) -> Self {
    Self {
      cooldown_ms,
      last_notified_at: None,
    }
  }

  pub fn last_notified_at(&self) -> Option<i64> {
    self.last_notified_at
  }

  /// Decide whether to notify at `now`; records `now` when it does.
  ///
  /// A `now` earlier than the last notification (clock skew) never fires.
  pub fn maybe_notify(&mut self, state: AlertState, now: i64) -> bool {
    if state != AlertState::Alert {
      return false;
    }
    let due = match self.last_notified_at {
      None => true,
      Some(last) => now.saturating_sub(last) >= self.cooldown_ms,
    };
    if due {
      self.last_notified_at = Some(now);
    }
    due
  }

  /// Allow the next ALERT to notify immediately.
  pub fn reset_cooldown(&mut self) {
    self.last_notified_at = None;
  }
}

/// Assemble the message for a fired notification.
///
/// `epoch_start` is the timestamp of the first reading since the device's
/// last reset; it keeps ids distinct across epochs.
pub fn build_notification(
  result: &DetectionResult,
  unit: Option<&str>,
  epoch_start: i64,
  notified_at: i64,
) -> Notification {
  let value = result.value.unwrap_or_default();
  let fmt_num = |v: f64| match unit {
    Some(u) => format!("{:.2} {}", v, u),
    None => format!("{:.2}", v),
  };

  let id = {
    let mut hasher = blake3::Hasher::new();
    hasher.update(result.device_id.as_bytes());
    hasher.update(b"|");
    hasher.update(epoch_start.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(notified_at.to_string().as_bytes());
    let hex = hasher.finalize().to_hex();
    format!("ntf-{}", &hex[..16])
  };

  let body = match result.reason {
    ReasonCode::AboveMax => format!(
      "Reading {} exceeds the maximum {}",
      fmt_num(value),
      fmt_num(result.limit.unwrap_or_default()),
    ),
    ReasonCode::BelowMin => format!(
      "Reading {} is below the minimum {}",
      fmt_num(value),
      fmt_num(result.limit.unwrap_or_default()),
    ),
    ReasonCode::DeviationFromAverage => format!(
      "Reading {} deviates {}% from the average {} (limit {}%)",
      fmt_num(value),
      fmt_pct(result.deviation_percent),
      fmt_num(result.mean),
      fmt_pct(result.limit),
    ),
    ReasonCode::VarianceIncrease => format!(
      "Reading {}: variance rose {}% over baseline {:.2} to {:.2} (limit {}%)",
      fmt_num(value),
      fmt_pct(result.deviation_percent),
      result.baseline_variance.unwrap_or_default(),
      result.variance,
      fmt_pct(result.limit),
    ),
    ReasonCode::None => format!("Reading {} flagged as abnormal", fmt_num(value)),
  };

  Notification {
    id,
    device_id: result.device_id.clone(),
    title: format!("Sensor alert: {}", result.device_id),
    body,
    reason: result.reason,
    value,
    unit: unit.map(str::to_string),
    notified_at,
  }
}

fn fmt_pct(pct: Option<f64>) -> String {
  match pct {
    Some(p) if p.is_infinite() => "∞".to_string(),
    Some(p) => format!("{:.1}", p),
    None => "?".to_string(),
  }
}
