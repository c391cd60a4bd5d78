//! Shared state registries: known peers and pending inbound requests.
//!
//! These are the only shared mutable resources in the crate. Both
//! registries hand out copy-on-read snapshots: a caller iterating a
//! snapshot never observes a concurrent mutation. The locks are held only
//! for the duration of a single map operation.

use crate::core::protocol::Transport;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tracing::{debug, info};

/// A peer discovered by the engine. Identity is the engine-assigned `id`,
/// which is not necessarily stable across restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub id: String,
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub transport: Transport,
}

/// Active peers keyed by engine-assigned id.
#[derive(Default)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<String, PeerRecord>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a peer. Returns `true` (and logs) only on the
    /// first insert for a given id.
    pub fn update(&self, record: PeerRecord) -> bool {
        let mut peers = self.peers.write().unwrap();
        let is_new = !peers.contains_key(&record.id);
        if is_new {
            info!(
                event = "peer_found",
                peer = %record.name,
                addr = format!("{}:{}", record.ip, record.port),
                "New peer"
            );
        }
        peers.insert(record.id.clone(), record);
        is_new
    }

    /// Remove a peer. No-op if absent.
    pub fn remove(&self, id: &str) -> Option<PeerRecord> {
        let removed = self.peers.write().unwrap().remove(id);
        if let Some(peer) = &removed {
            info!(event = "peer_lost", peer = %peer.name, "Peer lost");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<PeerRecord> {
        self.peers.read().unwrap().get(id).cloned()
    }

    /// Immutable snapshot of all known peers.
    pub fn snapshot(&self) -> HashMap<String, PeerRecord> {
        self.peers.read().unwrap().clone()
    }
}

/// An inbound transfer offer awaiting an operator verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub task_id: String,
    pub filename: String,
    pub filesize: u64,
    pub sender_name: String,
    pub sender_device: String,
    /// Unix timestamp (seconds) at which the offer arrived.
    pub created_at: u64,
}

/// Pending inbound requests keyed by task id.
///
/// Also tracks a global arbitration-in-progress flag: the interactive
/// surface can present only one decision at a time, so a second offer
/// arriving mid-arbitration is auto-rejected by the arbiter.
#[derive(Default)]
pub struct PendingRequestRegistry {
    requests: RwLock<HashMap<String, PendingRequest>>,
    arbitration_active: AtomicBool,
}

impl PendingRequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a request. An existing entry for the same task id is
    /// overwritten: a retried offer from the same peer supersedes, it does
    /// not duplicate.
    pub fn add(&self, request: PendingRequest) {
        debug!(
            event = "request_pending",
            task_id = %request.task_id,
            file = %request.filename,
            sender = %request.sender_name,
            "Pending request added"
        );
        self.requests
            .write()
            .unwrap()
            .insert(request.task_id.clone(), request);
    }

    /// Remove a request. No-op if absent.
    pub fn remove(&self, task_id: &str) -> Option<PendingRequest> {
        self.requests.write().unwrap().remove(task_id)
    }

    pub fn get(&self, task_id: &str) -> Option<PendingRequest> {
        self.requests.read().unwrap().get(task_id).cloned()
    }

    /// Immutable snapshot of all pending requests.
    pub fn snapshot(&self) -> HashMap<String, PendingRequest> {
        self.requests.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.requests.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_arbitration_active(&self, active: bool) {
        self.arbitration_active.store(active, Ordering::Release);
    }

    pub fn arbitration_active(&self) -> bool {
        self.arbitration_active.load(Ordering::Acquire)
    }
}

/// Current Unix timestamp in seconds.
pub fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: &str, name: &str) -> PeerRecord {
        PeerRecord {
            id: id.to_string(),
            name: name.to_string(),
            ip: "10.0.0.1".to_string(),
            port: 9400,
            transport: Transport::Tcp,
        }
    }

    fn request(task_id: &str, filename: &str) -> PendingRequest {
        PendingRequest {
            task_id: task_id.to_string(),
            filename: filename.to_string(),
            filesize: 1024,
            sender_name: "Alice".to_string(),
            sender_device: "iPhone".to_string(),
            created_at: now_unix(),
        }
    }

    #[test]
    fn update_then_get_returns_last_written_record() {
        let reg = PeerRegistry::new();
        assert!(reg.update(peer("p1", "Alice")));
        assert!(!reg.update(peer("p1", "Alice-MBP")));
        assert_eq!(reg.get("p1").unwrap().name, "Alice-MBP");
    }

    #[test]
    fn remove_is_idempotent() {
        let reg = PeerRegistry::new();
        reg.update(peer("p1", "Alice"));
        assert!(reg.remove("p1").is_some());
        assert!(reg.get("p1").is_none());
        assert!(reg.remove("p1").is_none());
    }

    #[test]
    fn snapshot_does_not_observe_later_mutations() {
        let reg = PeerRegistry::new();
        reg.update(peer("p1", "Alice"));
        let snap = reg.snapshot();
        reg.update(peer("p2", "Bob"));
        reg.remove("p1");
        assert_eq!(snap.len(), 1);
        assert_eq!(snap["p1"].name, "Alice");
    }

    #[test]
    fn pending_add_overwrites_same_task_id() {
        let reg = PendingRequestRegistry::new();
        reg.add(request("t1", "a.bin"));
        reg.add(request("t1", "b.bin"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("t1").unwrap().filename, "b.bin");
    }

    #[test]
    fn pending_remove_then_get_is_absent() {
        let reg = PendingRequestRegistry::new();
        reg.add(request("t1", "a.bin"));
        assert!(reg.remove("t1").is_some());
        assert!(reg.get("t1").is_none());
        assert!(reg.remove("t1").is_none());
    }

    #[test]
    fn arbitration_flag_round_trips() {
        let reg = PendingRequestRegistry::new();
        assert!(!reg.arbitration_active());
        reg.set_arbitration_active(true);
        assert!(reg.arbitration_active());
        reg.set_arbitration_active(false);
        assert!(!reg.arbitration_active());
    }
}
