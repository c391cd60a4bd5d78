//! Event bridge: ferries engine callbacks onto the cooperative loop.
//!
//! The engine invokes `EngineCallback::on_event` from threads this crate
//! does not own, at arbitrary times, concurrently across task ids. The
//! bridge decides the payload shape once (`core::protocol`), then forwards
//! every fire-and-forget event through a single thread-safe channel to the
//! control loop, so the foreign thread is never held up by rendering. Only
//! the two event kinds whose calling convention demands a synchronous
//! verdict — inbound offers and certificate verification — are answered on
//! the calling thread, the former through the `RequestArbiter`.
//!
//! The boundary is panic- and error-opaque: anything raised while
//! interpreting an event is caught and logged here; an unwind crossing
//! into engine code is undefined behavior and is prevented unconditionally.

use crate::core::arbiter::RequestArbiter;
use crate::core::engine::{CallbackData, EngineCallback};
use crate::core::error::CoreError;
use crate::core::protocol::{self, Incoming};
use crate::core::registry::{now_unix, PeerRecord, PendingRequest};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

/// A unit of work handed to the cooperative loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    PeerFound(PeerRecord),
    PeerLost { peer_id: String },
    /// Render the accept/reject prompt for an offer under arbitration.
    RequestPrompt(PendingRequest),
    TransferStarted { task_id: String, filename: String },
    Progress { task_id: String, current: u64, total: u64 },
    Completed { task_id: String, info: String },
    Failed { task_id: String, message: String },
    Rejected { task_id: String, reason: String },
    ServerStarted { port: String },
}

#[derive(Clone)]
pub struct EventBridge {
    tx: UnboundedSender<AppEvent>,
    arbiter: Arc<RequestArbiter>,
}

impl EventBridge {
    pub fn new(tx: UnboundedSender<AppEvent>, arbiter: Arc<RequestArbiter>) -> Self {
        Self { tx, arbiter }
    }

    /// Schedule a unit of work on the loop. A send failure means the loop
    /// has shut down; the event is dropped, never surfaced to the engine.
    fn schedule(&self, event: AppEvent) {
        if self.tx.send(event).is_err() {
            debug!(event = "loop_gone", "Control loop stopped, dropping event");
        }
    }

    fn handle(&self, event_type: &str, task_id: &str, data: CallbackData) -> Option<bool> {
        match event_type {
            "Incoming" => {
                let Some(raw) = data.as_text() else {
                    warn!(event = "malformed_incoming", task_id, "Expected text payload");
                    return None;
                };
                match protocol::decode_incoming(raw) {
                    Incoming::Request {
                        filename,
                        filesize,
                        sender_name,
                        sender_device,
                    } => {
                        let request = PendingRequest {
                            task_id: task_id.to_string(),
                            filename,
                            filesize,
                            sender_name,
                            sender_device,
                            created_at: now_unix(),
                        };
                        let tx = self.tx.clone();
                        let verdict = self.arbiter.arbitrate(request, move |req| {
                            let _ = tx.send(AppEvent::RequestPrompt(req));
                        });
                        Some(verdict)
                    }
                    Incoming::Start { filename } => {
                        // Peer proceeded without waiting for our verdict.
                        self.arbiter.abandon(task_id);
                        self.schedule(AppEvent::TransferStarted {
                            task_id: task_id.to_string(),
                            filename,
                        });
                        None
                    }
                    Incoming::Unrecognized => None,
                }
            }
            "ask_verify_certificate" => {
                // Trust-by-default placeholder for future trust-policy logic.
                debug!(event = "certificate_trusted", task_id, "Default-trusting certificate");
                Some(true)
            }
            "PEER_FOUND" => {
                if let Some(raw) = data.as_text() {
                    if let Some(ann) = protocol::decode_peer_announcement(raw) {
                        self.schedule(AppEvent::PeerFound(PeerRecord {
                            id: task_id.to_string(),
                            name: ann.name,
                            ip: ann.ip,
                            port: ann.port,
                            transport: ann.transport,
                        }));
                    }
                }
                None
            }
            "PEER_LOST" => {
                self.schedule(AppEvent::PeerLost {
                    peer_id: task_id.to_string(),
                });
                None
            }
            "START" => {
                let filename = data.as_text().unwrap_or_default().to_string();
                self.schedule(AppEvent::TransferStarted {
                    task_id: task_id.to_string(),
                    filename,
                });
                None
            }
            "PROGRESS" => {
                if let Some((current, total)) = protocol::decode_progress(&data) {
                    self.schedule(AppEvent::Progress {
                        task_id: task_id.to_string(),
                        current,
                        total,
                    });
                }
                None
            }
            "COMPLETED" => {
                self.schedule(AppEvent::Completed {
                    task_id: task_id.to_string(),
                    info: data.as_text().unwrap_or_default().to_string(),
                });
                None
            }
            "ERROR" => {
                self.schedule(AppEvent::Failed {
                    task_id: task_id.to_string(),
                    message: data.as_text().unwrap_or_default().to_string(),
                });
                None
            }
            "REJECTED" => {
                self.schedule(AppEvent::Rejected {
                    task_id: task_id.to_string(),
                    reason: data.as_text().unwrap_or_default().to_string(),
                });
                None
            }
            "SERVER_STARTED" => {
                info!(event = "engine_server_started", port = task_id, "Engine server started");
                self.schedule(AppEvent::ServerStarted {
                    port: task_id.to_string(),
                });
                None
            }
            other => {
                warn!(event = "unknown_engine_event", kind = other, task_id, "Ignoring event");
                None
            }
        }
    }
}

impl EngineCallback for EventBridge {
    fn on_event(&self, event_type: &str, task_id: &str, data: CallbackData) -> Option<bool> {
        match catch_unwind(AssertUnwindSafe(|| self.handle(event_type, task_id, data))) {
            Ok(reply) => reply,
            Err(_) => {
                error!(
                    event = "bridge_callback_panic",
                    task_id,
                    error = %CoreError::BridgeCallback {
                        event_type: event_type.to_string(),
                    },
                    "Panic while interpreting engine event, contained at the boundary"
                );
                // The engine still blocks on the verdict kinds; answer with
                // the safe default rather than unwinding into foreign code.
                match event_type {
                    "Incoming" => Some(false),
                    "ask_verify_certificate" => Some(true),
                    _ => None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::PendingRequestRegistry;
    use std::thread;
    use std::time::Duration;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn bridge(timeout_ms: u64) -> (EventBridge, UnboundedReceiver<AppEvent>, Arc<RequestArbiter>) {
        let (tx, rx) = unbounded_channel();
        let arbiter = Arc::new(RequestArbiter::new(
            Arc::new(PendingRequestRegistry::new()),
            Duration::from_millis(timeout_ms),
        ));
        (EventBridge::new(tx, arbiter.clone()), rx, arbiter)
    }

    fn text(s: &str) -> CallbackData {
        CallbackData::Text(s.to_string())
    }

    #[test]
    fn fire_and_forget_events_reach_the_loop_in_order() {
        let (bridge, mut rx, _) = bridge(100);
        assert_eq!(bridge.on_event("START", "t1", text("a.bin")), None);
        assert_eq!(bridge.on_event("PROGRESS", "t1", CallbackData::Pair(10, 20)), None);
        assert_eq!(bridge.on_event("COMPLETED", "t1", text("done")), None);

        assert!(matches!(
            rx.try_recv().unwrap(),
            AppEvent::TransferStarted { ref task_id, .. } if task_id == "t1"
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            AppEvent::Progress { current: 10, total: 20, .. }
        ));
        assert!(matches!(rx.try_recv().unwrap(), AppEvent::Completed { .. }));
    }

    #[test]
    fn peer_announcement_becomes_a_peer_record() {
        let (bridge, mut rx, _) = bridge(100);
        bridge.on_event("PEER_FOUND", "p1", text("Alice|192.168.1.7|9400||QUIC"));
        match rx.try_recv().unwrap() {
            AppEvent::PeerFound(rec) => {
                assert_eq!(rec.id, "p1");
                assert_eq!(rec.name, "Alice");
                assert_eq!(rec.port, 9400);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn malformed_payloads_are_dropped_without_events() {
        let (bridge, mut rx, _) = bridge(100);
        bridge.on_event("PEER_FOUND", "p1", text("Alice|192.168.1.7|bad-port"));
        bridge.on_event("PROGRESS", "t1", text("abc|def"));
        bridge.on_event("Incoming", "t1", text("garbage"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn incoming_request_blocks_until_resolved() {
        let (bridge, mut rx, arbiter) = bridge(5_000);
        let worker = thread::spawn(move || {
            bridge.on_event(
                "Incoming",
                "T1",
                text("[[REQUEST]]|report.pdf|204800|Alice|iPhone"),
            )
        });

        // The prompt is scheduled onto the loop with the decoded fields.
        loop {
            if let Ok(AppEvent::RequestPrompt(req)) = rx.try_recv() {
                assert_eq!(req.task_id, "T1");
                assert_eq!(req.filename, "report.pdf");
                assert_eq!(req.filesize, 204800);
                assert_eq!(req.sender_name, "Alice");
                assert_eq!(req.sender_device, "iPhone");
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }

        arbiter.resolve("T1", true).unwrap();
        assert_eq!(worker.join().unwrap(), Some(true));
    }

    #[test]
    fn start_payload_supersedes_pending_arbitration() {
        let (bridge, _rx, _arbiter) = bridge(5_000);
        let b2 = bridge.clone();
        let worker = thread::spawn(move || {
            b2.on_event("Incoming", "T1", text("[[REQUEST]]|a.bin|1|Bob|mac"))
        });
        thread::sleep(Duration::from_millis(20));
        assert_eq!(bridge.on_event("Incoming", "T1", text("[[START]]|a.bin")), None);
        assert_eq!(worker.join().unwrap(), Some(true));
    }

    #[test]
    fn certificate_verification_is_trusted_by_default() {
        let (bridge, _rx, _) = bridge(100);
        assert_eq!(
            bridge.on_event("ask_verify_certificate", "peer", text("fingerprint")),
            Some(true)
        );
    }

    #[test]
    fn unknown_event_kinds_are_ignored() {
        let (bridge, mut rx, _) = bridge(100);
        assert_eq!(bridge.on_event("WAT", "t1", text("x")), None);
        assert!(rx.try_recv().is_err());
    }
}
