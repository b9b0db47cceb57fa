//! Sensor Detection Engine: unsupervised, per-device baseline detection.
//!
//! Ingests single-value sensor readings, learns a sliding baseline per device,
//! judges each reading (static bounds, deviation from average, or variance
//! increase), reduces verdicts to DETECTING / NORMAL / ALERT, and rate-limits
//! notifications.
//!
//! No DB, no network; pure computation + in-memory state.

pub mod alert;
pub mod cli;
pub mod config;
pub mod detector;
pub mod deviation;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod normalize;
pub mod notify;
pub mod stats;
pub mod threshold;
pub mod types;
pub mod variance;
pub mod window;

pub use config::{Bounds, Config, DetectionMode};
pub use engine::{DetectionEngine, DeviceStatus, SharedEngine};
pub use error::EngineError;
pub use types::{
  AlertState, DetectionOutcome, DetectionResult, InboundReading, Notification, ReasonCode, Reading,
};
