//! Operator command surface: queue sends, resolve inbound offers.
//!
//! The controller validates operator intent against the registries before
//! anything reaches the engine: a send to an unknown peer fails with a
//! registry miss and queues nothing; an accept/reject for an unknown task
//! id surfaces as a user error.

use crate::core::arbiter::RequestArbiter;
use crate::core::config::DEFAULT_SEND_PRIORITY;
use crate::core::dispatch::{infer_target_os, DispatchQueue, TransferTask};
use crate::core::engine::TransferEngine;
use crate::core::error::CoreError;
use crate::core::registry::{PeerRegistry, PendingRequestRegistry};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct Controller {
    peers: Arc<PeerRegistry>,
    requests: Arc<PendingRequestRegistry>,
    arbiter: Arc<RequestArbiter>,
    queue: Arc<DispatchQueue>,
    engine: Arc<dyn TransferEngine>,
}

impl Controller {
    pub fn new(
        peers: Arc<PeerRegistry>,
        requests: Arc<PendingRequestRegistry>,
        arbiter: Arc<RequestArbiter>,
        queue: Arc<DispatchQueue>,
        engine: Arc<dyn TransferEngine>,
    ) -> Self {
        Self {
            peers,
            requests,
            arbiter,
            queue,
            engine,
        }
    }

    /// Queue a file for transfer to a known peer. Returns the task id
    /// under which progress events will be reported.
    pub fn enqueue_send(&self, file_path: &str, peer_id: &str) -> Result<String, CoreError> {
        let peer = self
            .peers
            .get(peer_id)
            .ok_or_else(|| CoreError::registry_miss("peer", peer_id))?;

        let task_id = synthesize_task_id(file_path);
        let target_os = infer_target_os(&peer.name);
        info!(
            event = "send_queued",
            task_id = %task_id,
            peer = %peer.name,
            target_os = target_os.as_str(),
            "Queuing transfer"
        );
        self.queue.enqueue(TransferTask {
            priority: DEFAULT_SEND_PRIORITY,
            file_path: file_path.to_string(),
            peer_ip: peer.ip,
            peer_port: peer.port,
            task_id: task_id.clone(),
            target_os,
        });
        Ok(task_id)
    }

    /// Accept a pending inbound request.
    pub fn accept(&self, task_id: &str) -> Result<(), CoreError> {
        self.resolve_pending(task_id, true)
    }

    /// Reject a pending inbound request.
    pub fn reject(&self, task_id: &str) -> Result<(), CoreError> {
        self.resolve_pending(task_id, false)
    }

    fn resolve_pending(&self, task_id: &str, accepted: bool) -> Result<(), CoreError> {
        // Wakes the engine thread blocked on the arbitration verdict; the
        // woken thread clears the registry entry itself.
        self.arbiter.resolve(task_id, accepted)?;
        // Confirmation command for engines whose calling convention does
        // not block on the callback verdict.
        self.engine.resolve_request(task_id, accepted)?;
        info!(event = "request_resolved", task_id, accepted, "Operator verdict recorded");
        Ok(())
    }

    /// Snapshot of pending requests, for listings.
    pub fn pending_requests(&self) -> std::collections::HashMap<String, crate::core::registry::PendingRequest> {
        self.requests.snapshot()
    }
}

/// Session-unique task id: the file's base name plus a random token.
///
/// The base name alone is what peers display, but it collides when the
/// same filename is sent twice; the token keeps registry and UI entries
/// distinct within a session.
pub fn synthesize_task_id(file_path: &str) -> String {
    let base = Path::new(file_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_path.to_string());
    let token = Uuid::new_v4().simple().to_string();
    format!("{}-{}", base, &token[..8])
}
