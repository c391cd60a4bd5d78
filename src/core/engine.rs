//! Boundary to the external transfer engine.
//!
//! The engine owns discovery, the wire protocol, encryption and raw I/O.
//! This module defines the two surfaces this layer touches: the synchronous
//! commands we issue into the engine (`TransferEngine`) and the callback the
//! engine invokes from its own worker threads (`EngineCallback`).
//!
//! Engine callbacks may arrive at arbitrary times on threads this crate
//! does not own. The only callback whose calling convention demands a
//! synchronous reply is the accept/reject (and certificate) verdict; every
//! other event kind is fire-and-forget from the engine's point of view.

use crate::core::config::{SERVER_START_MAX_RETRIES, SERVER_START_RETRY_DELAY};
use crate::core::error::EngineError;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Payload attached to an engine callback: either a flat string or a
/// structured `(current, total)` pair for progress updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackData {
    Text(String),
    Pair(u64, u64),
}

impl CallbackData {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CallbackData::Text(s) => Some(s),
            CallbackData::Pair(..) => None,
        }
    }
}

/// Callback surface the engine invokes from its worker threads.
///
/// Implementations must never panic across this boundary and must not
/// block the calling thread, except for the event kinds that require a
/// synchronous verdict (`Incoming` offers, certificate verification) —
/// those may block up to the arbitration timeout and must return
/// `Some(verdict)`. All other kinds return `None`.
pub trait EngineCallback: Send + Sync {
    fn on_event(&self, event_type: &str, task_id: &str, data: CallbackData) -> Option<bool>;
}

/// Destination platform hint inferred from the peer's advertised name.
/// A heuristic, not a protocol guarantee; inconclusive names map to
/// `Generic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOs {
    Ios,
    Macos,
    Generic,
}

impl TargetOs {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetOs::Ios => "ios",
            TargetOs::Macos => "macos",
            TargetOs::Generic => "generic",
        }
    }
}

/// Parameters for one outbound `send_file` call.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub peer_ip: String,
    pub peer_port: u16,
    pub file_path: String,
    pub task_id: String,
    pub device_name: String,
    pub target_os: TargetOs,
}

/// Synchronous command surface of the engine.
///
/// `send_file` is a long blocking call from this layer's point of view;
/// the dispatch worker is the only caller and serializes it deliberately.
pub trait TransferEngine: Send + Sync {
    /// Start (or restart) the engine server. Events begin flowing into
    /// `callback` once this returns.
    fn start_server(
        &self,
        config_path: &Path,
        callback: Arc<dyn EngineCallback>,
    ) -> Result<(), EngineError>;

    /// Send one file to a peer, blocking until the transfer concludes or
    /// fails. Progress is reported through `callback` by task id.
    fn send_file(
        &self,
        request: SendRequest,
        callback: Arc<dyn EngineCallback>,
    ) -> Result<(), EngineError>;

    /// Resolve a pending inbound request by task id.
    fn resolve_request(&self, task_id: &str, accepted: bool) -> Result<(), EngineError>;

    /// This node's advertised identity.
    fn my_name(&self) -> String;
}

/// Start the engine server, retrying address-in-use failures with bounded
/// backoff. Restarting a TCP listener quickly often hits the previous
/// socket still closing; any other failure is returned immediately.
pub async fn start_server_with_retry(
    engine: &Arc<dyn TransferEngine>,
    config_path: &Path,
    callback: Arc<dyn EngineCallback>,
) -> Result<(), EngineError> {
    let mut attempt = 1;
    loop {
        match engine.start_server(config_path, callback.clone()) {
            Ok(()) => {
                info!(event = "server_started", config = %config_path.display(), "Engine server running");
                return Ok(());
            }
            Err(e) if e.is_address_in_use() && attempt < SERVER_START_MAX_RETRIES => {
                warn!(
                    event = "server_start_retry",
                    attempt,
                    max = SERVER_START_MAX_RETRIES,
                    "Listen address busy, waiting for it to release"
                );
                tokio::time::sleep(SERVER_START_RETRY_DELAY).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Placeholder backend used by the binary until the real engine is linked
/// in. Accepts the server start so the shell comes up, logs every command,
/// and fails sends.
pub struct StubEngine {
    name: String,
}

impl StubEngine {
    pub fn new(name: String) -> Self {
        Self { name }
    }
}

impl TransferEngine for StubEngine {
    fn start_server(
        &self,
        config_path: &Path,
        _callback: Arc<dyn EngineCallback>,
    ) -> Result<(), EngineError> {
        warn!(
            event = "stub_engine",
            config = %config_path.display(),
            "No engine backend linked; running without network"
        );
        Ok(())
    }

    fn send_file(
        &self,
        request: SendRequest,
        _callback: Arc<dyn EngineCallback>,
    ) -> Result<(), EngineError> {
        warn!(event = "stub_engine", task_id = %request.task_id, "Dropping send, no backend");
        Err(EngineError::Unavailable)
    }

    fn resolve_request(&self, task_id: &str, accepted: bool) -> Result<(), EngineError> {
        warn!(event = "stub_engine", task_id, accepted, "No backend to resolve against");
        Ok(())
    }

    fn my_name(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
pub mod mock {
    //! Recording engine used across module tests.

    use super::*;
    use std::sync::mpsc::{channel, Receiver, Sender};
    use std::sync::Mutex;

    pub struct MockEngine {
        pub sends: Mutex<Vec<SendRequest>>,
        pub resolves: Mutex<Vec<(String, bool)>>,
        send_tx: Mutex<Option<Sender<String>>>,
        pub fail_sends: std::sync::atomic::AtomicBool,
    }

    impl MockEngine {
        pub fn new() -> Self {
            Self {
                sends: Mutex::new(Vec::new()),
                resolves: Mutex::new(Vec::new()),
                send_tx: Mutex::new(None),
                fail_sends: std::sync::atomic::AtomicBool::new(false),
            }
        }

        /// Receive the task id of each dispatched send, in dispatch order.
        pub fn watch_sends(&self) -> Receiver<String> {
            let (tx, rx) = channel();
            *self.send_tx.lock().unwrap() = Some(tx);
            rx
        }

        pub fn sent_task_ids(&self) -> Vec<String> {
            self.sends
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.task_id.clone())
                .collect()
        }
    }

    impl TransferEngine for MockEngine {
        fn start_server(
            &self,
            _config_path: &Path,
            _callback: Arc<dyn EngineCallback>,
        ) -> Result<(), EngineError> {
            Ok(())
        }

        fn send_file(
            &self,
            request: SendRequest,
            _callback: Arc<dyn EngineCallback>,
        ) -> Result<(), EngineError> {
            let task_id = request.task_id.clone();
            self.sends.lock().unwrap().push(request);
            if let Some(tx) = self.send_tx.lock().unwrap().as_ref() {
                let _ = tx.send(task_id);
            }
            if self.fail_sends.load(std::sync::atomic::Ordering::Relaxed) {
                return Err(EngineError::Other("mock send failure".to_string()));
            }
            Ok(())
        }

        fn resolve_request(&self, task_id: &str, accepted: bool) -> Result<(), EngineError> {
            self.resolves
                .lock()
                .unwrap()
                .push((task_id.to_string(), accepted));
            Ok(())
        }

        fn my_name(&self) -> String {
            "mock".to_string()
        }
    }
}
