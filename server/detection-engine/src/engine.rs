//! Core engine: per-device registry, reading dispatch, lifecycle.
//!
//! `DetectionEngine` is the single-threaded registry. `SharedEngine` offers the
//! same operations through `&self`, locking per device so that one device's
//! readings are strictly serialized while different devices run in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::config::{Bounds, Config};
use crate::detector::Detector;
use crate::error::EngineError;
use crate::monitor::DeviceMonitor;
use crate::normalize::{self, Normalized};
use crate::types::*;

/// The detection engine. Holds in-memory state per device id.
pub struct DetectionEngine {
  config: Config,
  detector: Detector,
  devices: HashMap<String, DeviceMonitor>,
}

impl DetectionEngine {
  /// Fails on invalid configuration; nothing is checked per reading.
  pub fn new(config: Config) -> Result<Self, EngineError> {
    config.validate()?;
    Ok(Self {
      detector: Detector::from_config(&config),
      config,
      devices: HashMap::new(),
    })
  }

  pub fn with_defaults() -> Self {
    let config = Config::default();
    Self {
      detector: Detector::from_config(&config),
      config,
      devices: HashMap::new(),
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Process one raw payload. Payloads without a timestamp are stamped now.
  pub fn process(&mut self, raw: &InboundReading) -> Result<DetectionOutcome, EngineError> {
    self.process_at(raw, normalize::now_millis())
  }

  /// Like `process`, with an explicit receive time.
  pub fn process_at(
    &mut self,
    raw: &InboundReading,
    received_at: i64,
  ) -> Result<DetectionOutcome, EngineError> {
    match normalize::normalize(raw, received_at)? {
      Normalized::Reading(reading) => Ok(self.submit_reading(&reading)),
      Normalized::Unparseable {
        device_id,
        timestamp,
        reason,
      } => Ok(self.reject(&device_id, timestamp, reason)),
    }
  }

  /// Judge a validated reading. Creates the device on first sight.
  pub fn submit_reading(&mut self, reading: &Reading) -> DetectionOutcome {
    let config = &self.config;
    let monitor = self
      .devices
      .entry(reading.device_id().to_string())
      .or_insert_with(|| DeviceMonitor::new(reading.device_id(), config));
    monitor.submit(&self.detector, reading)
  }

  fn reject(&self, device_id: &str, timestamp: i64, reason: &str) -> DetectionOutcome {
    match self.devices.get(device_id) {
      Some(monitor) => monitor.reject(&self.detector, timestamp, reason),
      // Unknown devices are not created by a reading that carries no value.
      None => DeviceMonitor::new(device_id, &self.config).reject(&self.detector, timestamp, reason),
    }
  }

  /// DETECTING for devices never seen.
  pub fn alert_state(&self, device_id: &str) -> AlertState {
    self
      .devices
      .get(device_id)
      .map(DeviceMonitor::state)
      .unwrap_or_default()
  }

  pub fn sample_count(&self, device_id: &str) -> usize {
    self
      .devices
      .get(device_id)
      .map_or(0, |m| m.sample_count(&self.detector))
  }

  pub fn last_notified_at(&self, device_id: &str) -> Option<i64> {
    self.devices.get(device_id).and_then(DeviceMonitor::last_notified_at)
  }

  pub fn last_result(&self, device_id: &str) -> Option<&DetectionResult> {
    self.devices.get(device_id).and_then(DeviceMonitor::last_result)
  }

  pub fn contains(&self, device_id: &str) -> bool {
    self.devices.contains_key(device_id)
  }

  /// Sorted, for deterministic output.
  pub fn device_ids(&self) -> Vec<String> {
    let mut ids: Vec<String> = self.devices.keys().cloned().collect();
    ids.sort();
    ids
  }

  /// Gate a notification for `device_id` directly (e.g. for a state read
  /// elsewhere). Unknown devices never notify.
  pub fn maybe_notify(&mut self, device_id: &str, state: AlertState, now: i64) -> bool {
    self
      .devices
      .get_mut(device_id)
      .map_or(false, |m| m.maybe_notify(state, now))
  }

  /// Wipe window, frozen baseline, alert state and cooldown. Returns whether
  /// the device was known.
  pub fn reset(&mut self, device_id: &str) -> bool {
    match self.devices.get_mut(device_id) {
      Some(monitor) => {
        monitor.reset();
        true
      }
      None => false,
    }
  }

  pub fn reset_cooldown(&mut self, device_id: &str) -> bool {
    match self.devices.get_mut(device_id) {
      Some(monitor) => {
        monitor.reset_cooldown();
        true
      }
      None => false,
    }
  }

  /// Drop a device entirely (eviction).
  pub fn remove(&mut self, device_id: &str) -> bool {
    self.devices.remove(device_id).is_some()
  }

  /// Per-device threshold bounds; creates the device if needed.
  pub fn set_device_bounds(&mut self, device_id: &str, bounds: Bounds) -> Result<(), EngineError> {
    bounds.validate("bounds")?;
    let config = &self.config;
    self
      .devices
      .entry(device_id.to_string())
      .or_insert_with(|| DeviceMonitor::new(device_id, config))
      .set_bounds(Some(bounds));
    Ok(())
  }

  pub fn clear_device_bounds(&mut self, device_id: &str) {
    if let Some(monitor) = self.devices.get_mut(device_id) {
      monitor.set_bounds(None);
    }
  }
}

// ---------------------------------------------------------------------------
// Thread-safe engine
// ---------------------------------------------------------------------------

type SharedMonitor = Arc<Mutex<DeviceMonitor>>;

/// Point-in-time view of one device.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
  pub device_id: String,
  pub state: AlertState,
  pub sample_count: usize,
  pub last_notified_at: Option<i64>,
  pub last_result: Option<DetectionResult>,
}

/// Engine shareable across threads/tasks.
pub struct SharedEngine {
  config: Config,
  detector: Detector,
  devices: RwLock<HashMap<String, SharedMonitor>>,
}

impl SharedEngine {
  pub fn new(config: Config) -> Result<Self, EngineError> {
    config.validate()?;
    Ok(Self {
      detector: Detector::from_config(&config),
      config,
      devices: RwLock::new(HashMap::new()),
    })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn process(&self, raw: &InboundReading) -> Result<DetectionOutcome, EngineError> {
    self.process_at(raw, normalize::now_millis())
  }

  pub fn process_at(&self, raw: &InboundReading, received_at: i64) -> Result<DetectionOutcome, EngineError> {
    match normalize::normalize(raw, received_at)? {
      Normalized::Reading(reading) => Ok(self.submit_reading(&reading)),
      Normalized::Unparseable {
        device_id,
        timestamp,
        reason,
      } => {
        let detector = &self.detector;
        let outcome = self
          .with_device(&device_id, |m| m.reject(detector, timestamp, reason))
          .unwrap_or_else(|| {
            DeviceMonitor::new(&device_id, &self.config).reject(detector, timestamp, reason)
          });
        Ok(outcome)
      }
    }
  }

  /// A reading that races `remove` lands on a fresh monitor, never on the
  /// evicted one.
  pub fn submit_reading(&self, reading: &Reading) -> DetectionOutcome {
    loop {
      let monitor = self.get_or_create(reading.device_id());
      let mut guard = lock(&monitor);
      if !guard.is_retired() {
        return guard.submit(&self.detector, reading);
      }
    }
  }

  pub fn alert_state(&self, device_id: &str) -> AlertState {
    self.with_device(device_id, |m| m.state()).unwrap_or_default()
  }

  pub fn sample_count(&self, device_id: &str) -> usize {
    let detector = &self.detector;
    self.with_device(device_id, |m| m.sample_count(detector)).unwrap_or(0)
  }

  pub fn last_notified_at(&self, device_id: &str) -> Option<i64> {
    self.with_device(device_id, |m| m.last_notified_at()).flatten()
  }

  pub fn status(&self, device_id: &str) -> Option<DeviceStatus> {
    let detector = &self.detector;
    self.with_device(device_id, |m| DeviceStatus {
      device_id: m.device_id().to_string(),
      state: m.state(),
      sample_count: m.sample_count(detector),
      last_notified_at: m.last_notified_at(),
      last_result: m.last_result().cloned(),
    })
  }

  pub fn device_ids(&self) -> Vec<String> {
    let mut ids: Vec<String> = read_registry(&self.devices).keys().cloned().collect();
    ids.sort();
    ids
  }

  pub fn maybe_notify(&self, device_id: &str, state: AlertState, now: i64) -> bool {
    self
      .with_device(device_id, |m| m.maybe_notify(state, now))
      .unwrap_or(false)
  }

  pub fn reset(&self, device_id: &str) -> bool {
    self.with_device(device_id, DeviceMonitor::reset).is_some()
  }

  pub fn reset_cooldown(&self, device_id: &str) -> bool {
    self.with_device(device_id, DeviceMonitor::reset_cooldown).is_some()
  }

  /// Evict a device. Waits for any reading in progress on it to finish.
  pub fn remove(&self, device_id: &str) -> bool {
    let evicted = write_registry(&self.devices).remove(device_id);
    match evicted {
      Some(monitor) => {
        lock(&monitor).retire();
        true
      }
      None => false,
    }
  }

  pub fn set_device_bounds(&self, device_id: &str, bounds: Bounds) -> Result<(), EngineError> {
    bounds.validate("bounds")?;
    loop {
      let monitor = self.get_or_create(device_id);
      let mut guard = lock(&monitor);
      if !guard.is_retired() {
        guard.set_bounds(Some(bounds));
        return Ok(());
      }
    }
  }

  pub fn clear_device_bounds(&self, device_id: &str) {
    self.with_device(device_id, |m| m.set_bounds(None));
  }

  /// Run `f` with the device locked; `None` for unknown devices.
  fn with_device<R>(&self, device_id: &str, f: impl FnOnce(&mut DeviceMonitor) -> R) -> Option<R> {
    let monitor = read_registry(&self.devices).get(device_id).cloned()?;
    let mut guard = lock(&monitor);
    let out = f(&mut guard);
    Some(out)
  }

  fn get_or_create(&self, device_id: &str) -> SharedMonitor {
    if let Some(m) = read_registry(&self.devices).get(device_id) {
      return Arc::clone(m);
    }
    write_registry(&self.devices)
      .entry(device_id.to_string())
      .or_insert_with(|| Arc::new(Mutex::new(DeviceMonitor::new(device_id, &self.config))))
      .clone()
  }
}

// One panicking device must not wedge the rest of the engine.
fn lock(monitor: &SharedMonitor) -> MutexGuard<'_, DeviceMonitor> {
  monitor.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_registry(
  devices: &RwLock<HashMap<String, SharedMonitor>>,
) -> std::sync::RwLockReadGuard<'_, HashMap<String, SharedMonitor>> {
  devices.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_registry(
  devices: &RwLock<HashMap<String, SharedMonitor>>,
) -> std::sync::RwLockWriteGuard<'_, HashMap<String, SharedMonitor>> {
  devices.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
