//! Alert state machine: DETECTING / NORMAL / ALERT.
//!
//! Memoryless. The next state depends only on the latest verdict, so an
//! alert clears on the very next non-abnormal reading. Callers that want
//! sticky or debounced alerts layer that on top.

use crate::config::DetectionMode;
use crate::types::{AlertState, DetectionResult};

/// Map the latest verdict (if any) to a state.
pub fn transition(mode: DetectionMode, latest: Option<&DetectionResult>) -> AlertState {
  let result = match latest {
    Some(r) => r,
    None => return AlertState::Detecting,
  };
  if mode.learns_baseline() && !result.baseline_established {
    AlertState::Detecting
  } else if result.is_abnormal {
    AlertState::Alert
  } else {
    AlertState::Normal
  }
}

#[derive(Debug, Clone)]
pub struct AlertStateMachine {
  mode: DetectionMode,
  state: AlertState,
}

impl AlertStateMachine {
  pub fn new(mode: DetectionMode) -> Self {
    Self {
      mode,
      state: AlertState::Detecting,
    }
  }

  pub fn state(&self) -> AlertState {
    self.state
  }

  /// Apply a verdict; returns `(previous, current)`.
  ///
  /// Rejected readings never reach here, so they leave the state untouched.
  pub fn apply(&mut self, result: &DetectionResult) -> (AlertState, AlertState) {
    let previous = self.state;
    self.state = transition(self.mode, Some(result));
    (previous, self.state)
  }

  pub fn reset(&mut self) {
    self.state = AlertState::Detecting;
  }
}
