mod core;
mod ui;
mod utils;
mod workers;

use crate::core::engine::{StubEngine, TransferEngine};
use crate::utils::log_buffer::{BufferLayer, FileLogLayer, LogBuffer};
use crate::utils::sos::SignalOfStop;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use workers::args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::load();

    let filter = match args.verbose {
        0 => "warn,droplink=info",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let log_buffer = LogBuffer::new();

    let filter_layer = EnvFilter::new(filter);
    let buffer_layer = BufferLayer::new(log_buffer.clone());
    let file_layer = FileLogLayer::new(&args.log_file)?;

    // No fmt layer writing to stderr, which would corrupt the prompt and
    // progress redraws. Recent logs are visible via the `logs` command,
    // full history goes to the log file.
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(buffer_layer)
        .with(file_layer)
        .init();

    let sos = SignalOfStop::new();

    // Ctrl+C handler
    let sos_clone = sos.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        sos_clone.cancel();
    });

    let device_name = args
        .device_name
        .clone()
        .unwrap_or_else(|| "droplink".to_string());
    let engine: Arc<dyn TransferEngine> = Arc::new(StubEngine::new(device_name));

    ui::run(args, engine, sos, log_buffer).await
}
