//! Centralized configuration constants for Droplink.
//!
//! All tunable parameters live here so they can be reviewed and adjusted
//! in a single place. Wire-format constants (protocol prefixes, field
//! separators) stay in `core::protocol`.

use std::time::Duration;

// ── Arbitration ──────────────────────────────────────────────────────────────

/// How long a blocked engine thread waits for the operator to accept or
/// reject an inbound transfer offer. On expiry the offer is rejected and
/// the stale prompt is cancelled.
pub const ARBITRATION_TIMEOUT: Duration = Duration::from_secs(60);

// ── Dispatch ─────────────────────────────────────────────────────────────────

/// Priority assigned to operator-queued transfers. Lower values are served
/// first; with a single constant the queue degrades to FIFO.
pub const DEFAULT_SEND_PRIORITY: i32 = 10;

// ── Server lifecycle ─────────────────────────────────────────────────────────

/// Attempts made when (re)starting the engine server while the listen
/// address is still held by a closing socket.
pub const SERVER_START_MAX_RETRIES: u32 = 5;

/// Delay between server (re)start attempts.
pub const SERVER_START_RETRY_DELAY: Duration = Duration::from_secs(1);

// ── UI / Misc ────────────────────────────────────────────────────────────────

/// Maximum log entries kept in the in-memory ring buffer.
pub const MAX_LOG_ENTRIES: usize = 500;

/// Minimum interval between instantaneous speed samples while a transfer
/// is in flight. Short enough to catch the peak on fast LAN transfers.
pub const SPEED_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Sampling interval of the dev-mode process resource monitor.
pub const RESOURCE_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);
