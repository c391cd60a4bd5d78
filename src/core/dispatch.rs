//! Serialized outbound transfer dispatch.
//!
//! Operator send intents land in a priority queue (lower value first, FIFO
//! among equals) drained by one dedicated worker thread. The worker issues
//! a single blocking `send_file` engine call at a time — transfers are
//! intentionally serialized, because the engine call is a long blocking
//! operation from this layer's point of view and the engine offers no
//! concurrent-session primitive at this boundary. Candidate for parallel
//! sessions if the engine ever grows one.
//!
//! Shutdown is cooperative: the worker observes a running flag between
//! dequeues, so outstanding tasks are cancelled rather than leaking the
//! thread.

use crate::core::engine::{EngineCallback, SendRequest, TargetOs, TransferEngine};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error, info};

/// One queued outbound transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    /// Lower values are served first.
    pub priority: i32,
    pub file_path: String,
    pub peer_ip: String,
    pub peer_port: u16,
    pub task_id: String,
    pub target_os: TargetOs,
}

/// Heap entry: ordered by priority, then by arrival sequence so equal
/// priorities dequeue FIFO.
struct QueuedTask {
    priority: i32,
    seq: u64,
    task: TransferTask,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    // BinaryHeap is a max-heap: invert so the smallest (priority, seq)
    // pops first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .priority
            .cmp(&self.priority)
            .then(other.seq.cmp(&self.seq))
    }
}

struct QueueShared {
    heap: Mutex<BinaryHeap<QueuedTask>>,
    available: Condvar,
    running: AtomicBool,
    seq: AtomicU64,
}

pub struct DispatchQueue {
    shared: Arc<QueueShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(QueueShared {
                heap: Mutex::new(BinaryHeap::new()),
                available: Condvar::new(),
                running: AtomicBool::new(false),
                seq: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Queue a task for dispatch. Consumed exactly once by the worker.
    pub fn enqueue(&self, task: TransferTask) {
        let seq = self.shared.seq.fetch_add(1, Ordering::Relaxed);
        debug!(
            event = "task_enqueued",
            task_id = %task.task_id,
            priority = task.priority,
            "Transfer queued"
        );
        self.shared.heap.lock().unwrap().push(QueuedTask {
            priority: task.priority,
            seq,
            task,
        });
        self.shared.available.notify_one();
    }

    pub fn len(&self) -> usize {
        self.shared.heap.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn the dispatch worker. Engine failures are surfaced once as an
    /// `ERROR` event through the callback and the task is dropped from
    /// tracking; the worker keeps serving the queue.
    pub fn start(
        &self,
        engine: Arc<dyn TransferEngine>,
        callback: Arc<dyn EngineCallback>,
        device_name: String,
    ) {
        self.shared.running.store(true, Ordering::Release);
        let shared = self.shared.clone();
        let handle = std::thread::Builder::new()
            .name("dispatch".to_string())
            .spawn(move || {
                info!(event = "dispatch_worker_started", "Dispatch worker running");
                while let Some(task) = next_task(&shared) {
                    let request = SendRequest {
                        peer_ip: task.peer_ip,
                        peer_port: task.peer_port,
                        file_path: task.file_path,
                        task_id: task.task_id.clone(),
                        device_name: device_name.clone(),
                        target_os: task.target_os,
                    };
                    if let Err(e) = engine.send_file(request, callback.clone()) {
                        error!(
                            event = "send_failed",
                            task_id = %task.task_id,
                            error = %e,
                            "Engine rejected send, dropping task"
                        );
                        callback.on_event(
                            "ERROR",
                            &task.task_id,
                            crate::core::engine::CallbackData::Text(e.to_string()),
                        );
                    }
                }
                let cancelled = shared.heap.lock().unwrap().len();
                info!(
                    event = "dispatch_worker_stopped",
                    cancelled_tasks = cancelled,
                    "Dispatch worker exited"
                );
            })
            .expect("failed to spawn dispatch worker");
        *self.worker.lock().unwrap() = Some(handle);
    }

    /// Stop the worker and join it. Queued tasks that have not been
    /// dispatched yet are cancelled.
    pub fn shutdown(&self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.available.notify_all();
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Block until a task is available or shutdown is signalled.
fn next_task(shared: &QueueShared) -> Option<TransferTask> {
    let mut heap = shared.heap.lock().unwrap();
    loop {
        if !shared.running.load(Ordering::Acquire) {
            return None;
        }
        if let Some(entry) = heap.pop() {
            return Some(entry.task);
        }
        heap = shared.available.wait(heap).unwrap();
    }
}

/// Infer the destination platform from the peer's advertised name.
/// Substrings indicating a known handheld OS force a compatibility
/// transfer mode; anything inconclusive degrades to `Generic`.
pub fn infer_target_os(peer_name: &str) -> TargetOs {
    let name = peer_name.to_lowercase();
    if name.contains("iphone") || name.contains("ipad") {
        TargetOs::Ios
    } else if name.contains("mac") {
        TargetOs::Macos
    } else {
        TargetOs::Generic
    }
}
