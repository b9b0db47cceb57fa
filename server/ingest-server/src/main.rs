//! Binary entrypoint for the ingest server.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use detection_engine::cli::{self, ConfigArgs};
use detection_engine::SharedEngine;
use tracing::info;

use ingest_server::AppState;

/// HTTP ingest for per-device sensor anomaly detection
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// Port to listen on (127.0.0.1 only)
  #[arg(short, long, env = "PORT", default_value = "8080")]
  port: u16,

  #[command(flatten)]
  config: ConfigArgs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  let args = Args::parse();
  cli::init_tracing(&args.config.log_level);

  let config = args.config.resolve()?;
  info!(mode = %config.mode, window = config.window_size, "detection config loaded");
  let state = Arc::new(AppState::new(SharedEngine::new(config)?));

  let app = ingest_server::router(state);

  let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
  info!("ingest-server listening on http://{}", addr);

  let listener = tokio::net::TcpListener::bind(addr).await?;
  axum::serve(listener, app).await?;

  Ok(())
}
