//! Binary entrypoint: read JSON lines from stdin, write JSON lines to stdout.
//!
//! Each input line is a reading payload or a command. Output lines are:
//! - A DetectionOutcome for every reading (rejected readings included)
//! - A CommandOutput for `{"reset": id}` / `{"reset_cooldown": id}`
//! - An ErrorOutput when the line cannot be parsed or validated
//!
//! Logs go to stderr so stdout stays machine-readable.

use std::io::{self, BufRead, Write};

use clap::Parser;
use detection_engine::cli::{self, ConfigArgs};
use detection_engine::types::{CommandOutput, ErrorOutput, InboundMessage};
use detection_engine::DetectionEngine;
use serde::Serialize;
use tracing::{error, info};

/// Streaming per-device anomaly detection over JSON lines
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  #[command(flatten)]
  config: ConfigArgs,
}

fn main() {
  let args = Args::parse();
  cli::init_tracing(&args.config.log_level);

  let config = match args.config.resolve() {
    Ok(c) => c,
    Err(e) => {
      error!(error = %e, "invalid configuration");
      std::process::exit(2);
    }
  };
  info!(mode = %config.mode, window = config.window_size, min_readings = config.min_readings(), "detection-engine starting");

  let mut engine = match DetectionEngine::new(config) {
    Ok(e) => e,
    Err(e) => {
      error!(error = %e, "invalid configuration");
      std::process::exit(2);
    }
  };

  let stdin = io::stdin();
  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());

  for line in stdin.lock().lines() {
    let line = match line {
      Ok(l) => l,
      Err(e) => {
        error!(error = %e, "read error");
        std::process::exit(1);
      }
    };

    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }

    let message: InboundMessage = match serde_json::from_str(trimmed) {
      Ok(v) => v,
      Err(e) => {
        emit(&mut out, &ErrorOutput::new(format!("json parse: {}", e)));
        continue;
      }
    };

    match message {
      InboundMessage::Reset { reset } => {
        let known = engine.reset(&reset);
        emit(&mut out, &CommandOutput {
          ok: true,
          command: "reset",
          device_id: reset,
          known,
        });
      }
      InboundMessage::ResetCooldown { reset_cooldown } => {
        let known = engine.reset_cooldown(&reset_cooldown);
        emit(&mut out, &CommandOutput {
          ok: true,
          command: "reset_cooldown",
          device_id: reset_cooldown,
          known,
        });
      }
      InboundMessage::Reading(raw) => match engine.process(&raw) {
        Ok(outcome) => emit(&mut out, &outcome),
        Err(e) => emit(&mut out, &ErrorOutput::from(&e)),
      },
    }
  }

  let _ = out.flush();
}

fn emit<W: Write, T: Serialize>(out: &mut W, value: &T) {
  let _ = serde_json::to_writer(&mut *out, value);
  let _ = writeln!(out);
}
