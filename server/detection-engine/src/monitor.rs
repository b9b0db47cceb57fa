//! Per-device state: learning history, alert state, notification cooldown.

use tracing::{debug, info, warn};

use crate::alert::AlertStateMachine;
use crate::config::{Bounds, Config};
use crate::detector::{Detector, History};
use crate::notify::{self, NotificationGate};
use crate::types::{AlertState, DetectionOutcome, DetectionResult, Reading};

/// Everything the engine owns for one device. Never shared across devices.
#[derive(Debug, Clone)]
pub struct DeviceMonitor {
  device_id: String,
  history: History,
  alert: AlertStateMachine,
  gate: NotificationGate,
  bounds: Option<Bounds>,
  epoch_start: Option<i64>,
  last_result: Option<DetectionResult>,
  /// Set once the device is evicted from a shared registry.
  retired: bool,
}

impl DeviceMonitor {
  pub fn new(device_id: &str, config: &Config) -> Self {
    Self {
      device_id: device_id.to_string(),
      history: History::new(config.window_size),
      alert: AlertStateMachine::new(config.mode),
      gate: NotificationGate::new(config.cooldown_ms),
      bounds: None,
      epoch_start: None,
      last_result: None,
      retired: false,
    }
  }

  pub fn device_id(&self) -> &str {
    &self.device_id
  }

  pub fn state(&self) -> AlertState {
    self.alert.state()
  }

  pub fn sample_count(&self, detector: &Detector) -> usize {
    detector.sample_count(&self.history)
  }

  pub fn last_notified_at(&self) -> Option<i64> {
    self.gate.last_notified_at()
  }

  pub fn last_result(&self) -> Option<&DetectionResult> {
    self.last_result.as_ref()
  }

  pub fn set_bounds(&mut self, bounds: Option<Bounds>) {
    self.bounds = bounds;
  }

  /// Judge one reading, update state, and decide on notification.
  pub fn submit(&mut self, detector: &Detector, reading: &Reading) -> DetectionOutcome {
    let epoch_start = *self.epoch_start.get_or_insert(reading.timestamp());
    let result = detector.observe(&mut self.history, reading, self.bounds.as_ref());
    let (previous, state) = self.alert.apply(&result);

    debug!(
      device_id = %self.device_id,
      value = reading.value(),
      mean = result.mean,
      samples = result.sample_count,
      deviation = ?result.deviation_percent,
      state = %state,
      "reading evaluated"
    );
    if previous != state {
      info!(device_id = %self.device_id, from = %previous, to = %state, reason = ?result.reason, "alert state changed");
    }

    let should_notify = self.gate.maybe_notify(state, reading.timestamp());
    let notification = if should_notify {
      let n = notify::build_notification(&result, reading.unit(), epoch_start, reading.timestamp());
      info!(device_id = %self.device_id, notification_id = %n.id, "notification fired");
      Some(n)
    } else {
      None
    };

    self.last_result = Some(result.clone());
    DetectionOutcome {
      result,
      state,
      previous_state: previous,
      should_notify,
      notification,
    }
  }

  /// Answer an unparseable reading without touching any state.
  pub fn reject(&self, detector: &Detector, timestamp: i64, reason: &str) -> DetectionOutcome {
    warn!(device_id = %self.device_id, reason, "reading rejected");
    let state = self.alert.state();
    DetectionOutcome {
      result: detector.snapshot(&self.history, &self.device_id, timestamp),
      state,
      previous_state: state,
      should_notify: false,
      notification: None,
    }
  }

  /// Clear window, frozen baseline, alert state and cooldown. Device bounds
  /// are configuration, not history, and survive.
  pub fn reset(&mut self) {
    self.history.reset();
    self.alert.reset();
    self.gate.reset_cooldown();
    self.epoch_start = None;
    self.last_result = None;
    info!(device_id = %self.device_id, "device state reset");
  }

  pub fn reset_cooldown(&mut self) {
    self.gate.reset_cooldown();
  }

  pub(crate) fn retire(&mut self) {
    self.retired = true;
  }

  pub(crate) fn is_retired(&self) -> bool {
    self.retired
  }

  /// Consult the cooldown gate outside of `submit`.
  pub fn maybe_notify(&mut self, state: AlertState, now: i64) -> bool {
    self.gate.maybe_notify(state, now)
  }
}
