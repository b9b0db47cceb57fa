//! Shared application state.

use detection_engine::SharedEngine;

pub struct AppState {
  pub engine: SharedEngine,
}

impl AppState {
  pub fn new(engine: SharedEngine) -> Self {
    Self { engine }
  }
}
