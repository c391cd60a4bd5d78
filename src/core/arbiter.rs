//! Blocking accept/reject handshake for inbound transfer offers.
//!
//! The engine invokes its decision callback synchronously from one of its
//! own threads and blocks on the returned verdict, because the wire
//! protocol requires an immediate reply. The decision itself comes from
//! the operator on the cooperative loop. The arbiter bridges the two: the
//! foreign thread parks on a condvar with a bounded timeout while the loop
//! prompts the operator, and `resolve` wakes it with the verdict.
//!
//! Only one arbitration may be in flight at a time — the interactive
//! surface can present a single prompt — so a second offer arriving
//! mid-arbitration is auto-rejected with a busy reason. On timeout the
//! foreign thread returns the reject default and raises a cancellation
//! flag; the prompt checks that flag before committing a late answer the
//! engine no longer awaits.

use crate::core::error::CoreError;
use crate::core::registry::{PendingRequest, PendingRequestRegistry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ArbiterState {
    Idle,
    Awaiting { task_id: String },
    Decided { task_id: String, accepted: bool },
}

pub struct RequestArbiter {
    state: Mutex<ArbiterState>,
    decided: Condvar,
    prompt_cancelled: AtomicBool,
    timeout: Duration,
    requests: Arc<PendingRequestRegistry>,
}

impl RequestArbiter {
    pub fn new(requests: Arc<PendingRequestRegistry>, timeout: Duration) -> Self {
        Self {
            state: Mutex::new(ArbiterState::Idle),
            decided: Condvar::new(),
            prompt_cancelled: AtomicBool::new(false),
            timeout,
            requests,
        }
    }

    /// Run one arbitration on the calling (foreign) thread.
    ///
    /// Publishes the request, schedules the operator prompt through
    /// `schedule_prompt` (which must hand off to the cooperative loop and
    /// return immediately), then parks until `resolve` supplies a verdict
    /// or the timeout elapses. Always returns a verdict: timeout and busy
    /// both reject.
    pub fn arbitrate<F>(&self, request: PendingRequest, schedule_prompt: F) -> bool
    where
        F: FnOnce(PendingRequest),
    {
        let task_id = request.task_id.clone();
        {
            let mut state = self.state.lock().unwrap();
            if *state != ArbiterState::Idle {
                warn!(
                    event = "arbitration_busy",
                    task_id = %task_id,
                    "Another arbitration is active, auto-rejecting offer"
                );
                return false;
            }
            *state = ArbiterState::Awaiting {
                task_id: task_id.clone(),
            };
        }
        self.prompt_cancelled.store(false, Ordering::Release);
        self.requests.set_arbitration_active(true);
        self.requests.add(request.clone());
        schedule_prompt(request);

        let guard = self.state.lock().unwrap();
        let (mut state, _) = self
            .decided
            .wait_timeout_while(guard, self.timeout, |s| {
                !matches!(s, ArbiterState::Decided { .. })
            })
            .unwrap();

        let accepted = match &*state {
            ArbiterState::Decided {
                task_id: decided_id,
                accepted,
            } if *decided_id == task_id => {
                let accepted = *accepted;
                debug!(event = "arbitration_resolved", task_id = %task_id, accepted, "Verdict recorded");
                accepted
            }
            _ => {
                // Timed out: the prompt may still be waiting on input.
                self.prompt_cancelled.store(true, Ordering::Release);
                warn!(
                    event = "arbitration_timeout",
                    task_id = %task_id,
                    timeout_secs = self.timeout.as_secs(),
                    "No operator decision, rejecting by default"
                );
                false
            }
        };
        *state = ArbiterState::Idle;
        drop(state);

        self.requests.remove(&task_id);
        self.requests.set_arbitration_active(false);
        accepted
    }

    /// Record the operator's verdict and wake the blocked engine thread.
    ///
    /// Fails with a registry miss if no arbitration is awaiting this task
    /// id — including when the same task was already resolved once, so a
    /// verdict is delivered at most once.
    pub fn resolve(&self, task_id: &str, accepted: bool) -> Result<(), CoreError> {
        let mut state = self.state.lock().unwrap();
        match &*state {
            ArbiterState::Awaiting { task_id: awaiting } if awaiting == task_id => {
                *state = ArbiterState::Decided {
                    task_id: task_id.to_string(),
                    accepted,
                };
                self.decided.notify_all();
                Ok(())
            }
            _ => Err(CoreError::registry_miss("pending request", task_id)),
        }
    }

    /// The peer proceeded without waiting for a verdict (a `[[START]]`
    /// arrived for a task still under arbitration). Treated as an implicit
    /// acceptance, not an error.
    pub fn abandon(&self, task_id: &str) {
        let mut state = self.state.lock().unwrap();
        if let ArbiterState::Awaiting { task_id: awaiting } = &*state {
            if awaiting == task_id {
                debug!(
                    event = "arbitration_superseded",
                    task_id,
                    "Peer started without waiting, resolving implicitly"
                );
                *state = ArbiterState::Decided {
                    task_id: task_id.to_string(),
                    accepted: true,
                };
                self.decided.notify_all();
            }
        }
    }

    /// Consume the stale-prompt flag. Returns `true` once after an
    /// arbitration timed out with the prompt still open.
    pub fn take_prompt_cancelled(&self) -> bool {
        self.prompt_cancelled.swap(false, Ordering::AcqRel)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::now_unix;
    use std::thread;
    use std::time::Duration;

    fn request(task_id: &str) -> PendingRequest {
        PendingRequest {
            task_id: task_id.to_string(),
            filename: "report.pdf".to_string(),
            filesize: 204800,
            sender_name: "Alice".to_string(),
            sender_device: "iPhone".to_string(),
            created_at: now_unix(),
        }
    }

    fn arbiter(timeout_ms: u64) -> Arc<RequestArbiter> {
        Arc::new(RequestArbiter::new(
            Arc::new(PendingRequestRegistry::new()),
            Duration::from_millis(timeout_ms),
        ))
    }

    #[test]
    fn operator_verdict_is_returned_to_the_blocked_thread() {
        let arb = arbiter(5_000);
        let arb2 = arb.clone();
        let worker = thread::spawn(move || arb2.arbitrate(request("t1"), |_| {}));

        // Wait for the request to be published, then answer.
        while arb.requests.get("t1").is_none() {
            thread::sleep(Duration::from_millis(5));
        }
        arb.resolve("t1", true).unwrap();

        assert!(worker.join().unwrap());
        assert!(arb.requests.get("t1").is_none());
        assert!(!arb.requests.arbitration_active());
    }

    #[test]
    fn verdict_is_delivered_at_most_once() {
        let arb = arbiter(5_000);
        let arb2 = arb.clone();
        let worker = thread::spawn(move || arb2.arbitrate(request("t1"), |_| {}));

        while arb.requests.get("t1").is_none() {
            thread::sleep(Duration::from_millis(5));
        }
        arb.resolve("t1", false).unwrap();
        assert!(matches!(
            arb.resolve("t1", true),
            Err(CoreError::RegistryMiss { .. })
        ));
        assert!(!worker.join().unwrap());
    }

    #[test]
    fn timeout_rejects_clears_request_and_raises_cancellation() {
        let arb = arbiter(30);
        let verdict = arb.arbitrate(request("t1"), |_| {});
        assert!(!verdict);
        assert!(arb.requests.get("t1").is_none());
        assert!(arb.take_prompt_cancelled());
        // Flag is consumed exactly once.
        assert!(!arb.take_prompt_cancelled());
        // A late answer finds nothing to resolve.
        assert!(arb.resolve("t1", true).is_err());
    }

    #[test]
    fn second_offer_mid_arbitration_is_auto_rejected() {
        let arb = arbiter(5_000);
        let arb2 = arb.clone();
        let worker = thread::spawn(move || arb2.arbitrate(request("t1"), |_| {}));

        while arb.requests.get("t1").is_none() {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(arb.requests.arbitration_active());
        // Second offer on another foreign thread while t1 is pending.
        assert!(!arb.arbitrate(request("t2"), |_| {}));
        assert!(arb.requests.get("t2").is_none());

        arb.resolve("t1", true).unwrap();
        assert!(worker.join().unwrap());
    }

    #[test]
    fn start_for_pending_task_resolves_implicitly() {
        let arb = arbiter(5_000);
        let arb2 = arb.clone();
        let worker = thread::spawn(move || arb2.arbitrate(request("t1"), |_| {}));

        while arb.requests.get("t1").is_none() {
            thread::sleep(Duration::from_millis(5));
        }
        arb.abandon("t1");
        assert!(worker.join().unwrap());
        assert!(arb.requests.get("t1").is_none());
    }

    #[test]
    fn abandon_of_unknown_task_is_a_no_op() {
        let arb = arbiter(50);
        arb.abandon("nobody");
        assert!(arb.resolve("nobody", true).is_err());
    }

    #[test]
    fn prompt_is_scheduled_with_the_request() {
        let arb = arbiter(30);
        let (tx, rx) = std::sync::mpsc::channel();
        let _ = arb.arbitrate(request("t1"), move |req| {
            tx.send(req).unwrap();
        });
        let prompted = rx.try_recv().unwrap();
        assert_eq!(prompted.task_id, "t1");
        assert_eq!(prompted.filename, "report.pdf");
    }
}
