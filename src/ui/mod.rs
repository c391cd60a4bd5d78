//! Interactive terminal frontend.
//!
//! `run` wires the coordination core to stdin and stdout: one cooperative
//! loop multiplexes operator input, engine events arriving over the bridge
//! channel and the stop signal. All rendering happens here, on the loop.

pub mod presenter;
pub mod shell;

use crate::core::arbiter::RequestArbiter;
use crate::core::bridge::{AppEvent, EventBridge};
use crate::core::config::ARBITRATION_TIMEOUT;
use crate::core::controller::Controller;
use crate::core::dispatch::DispatchQueue;
use crate::core::engine::{start_server_with_retry, EngineCallback, TransferEngine};
use crate::core::registry::{PeerRegistry, PendingRequestRegistry};
use crate::ui::presenter::{normalize_engine_error, Presenter, TerminalPresenter, TransferStatus};
use crate::ui::shell::Shell;
use crate::utils::log_buffer::LogBuffer;
use crate::utils::sos::SignalOfStop;
use crate::workers::args::Args;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::unbounded_channel;
use tracing::info;

pub async fn run(
    args: Args,
    engine: Arc<dyn TransferEngine>,
    sos: SignalOfStop,
    log_buffer: LogBuffer,
) -> anyhow::Result<()> {
    let peers = Arc::new(PeerRegistry::new());
    let requests = Arc::new(PendingRequestRegistry::new());
    let timeout = args
        .decision_timeout
        .map(Duration::from_secs)
        .unwrap_or(ARBITRATION_TIMEOUT);
    let arbiter = Arc::new(RequestArbiter::new(requests.clone(), timeout));

    let (tx, mut rx) = unbounded_channel::<AppEvent>();
    let bridge = Arc::new(EventBridge::new(tx, arbiter.clone()));
    let callback: Arc<dyn EngineCallback> = bridge;

    // Server failure here is fatal; once the loop runs, `reload` retries.
    start_server_with_retry(&engine, &args.engine_config, callback.clone())
        .await
        .context("engine server failed to start")?;

    let identity = engine.my_name();
    let queue = Arc::new(DispatchQueue::new());
    queue.start(engine.clone(), callback.clone(), identity.clone());

    let controller = Arc::new(Controller::new(
        peers.clone(),
        requests.clone(),
        arbiter.clone(),
        queue.clone(),
        engine.clone(),
    ));
    let shell = Shell::new(
        controller,
        peers.clone(),
        requests,
        arbiter,
        engine,
        callback,
        args.engine_config.clone(),
        log_buffer,
        sos.clone(),
    );
    let mut presenter = TerminalPresenter::new(args.dev);

    shell.print_banner(&identity);
    shell.print_prompt(&identity);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        shell.execute(&line, &mut presenter).await;
                        if sos.cancelled() {
                            break;
                        }
                        shell.print_prompt(&identity);
                    }
                    // stdin closed, treat as exit
                    Ok(None) | Err(_) => break,
                }
            }
            event = rx.recv() => {
                match event {
                    Some(event) => handle_event(event, &peers, &mut presenter),
                    None => break,
                }
            }
            _ = sos.wait() => break,
        }
    }

    info!(event = "shutdown", "Stopping dispatch queue");
    queue.shutdown();
    Ok(())
}

/// Apply one bridged engine event to loop-owned state and the presenter.
fn handle_event(event: AppEvent, peers: &Arc<PeerRegistry>, presenter: &mut dyn Presenter) {
    match event {
        AppEvent::PeerFound(record) => {
            peers.update(record);
        }
        AppEvent::PeerLost { peer_id } => {
            peers.remove(&peer_id);
        }
        AppEvent::RequestPrompt(request) => presenter.handle_incoming_request(&request),
        AppEvent::TransferStarted { task_id, filename } => {
            presenter.on_start(&task_id, &filename)
        }
        AppEvent::Progress {
            task_id,
            current,
            total,
        } => presenter.on_progress(&task_id, current, total),
        AppEvent::Completed { task_id, info } => {
            presenter.on_status_change(&task_id, TransferStatus::Completed, &info)
        }
        AppEvent::Failed { task_id, message } => {
            presenter.on_error(&task_id, &normalize_engine_error(&message))
        }
        AppEvent::Rejected { task_id, reason } => presenter.on_reject(&task_id, &reason),
        // Already logged at the bridge.
        AppEvent::ServerStarted { .. } => {}
    }
}
