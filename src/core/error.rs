//! Error taxonomy for the coordination layer.
//!
//! Nothing here is allowed to terminate the process once the control loop
//! is running: protocol decode failures degrade to dropped events, registry
//! misses surface as operator errors, and engine failures are reported once
//! and the affected task dropped from tracking.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the coordination core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A pipe-delimited payload failed to parse. Logged and dropped,
    /// never fatal.
    #[error("malformed payload: {0}")]
    ProtocolDecode(String),

    /// An operation referenced a peer or task the registries don't know.
    /// Surfaced to the operator as a user error.
    #[error("unknown {kind}: '{id}'")]
    RegistryMiss { kind: &'static str, id: String },

    /// No operator decision arrived within the arbitration window.
    /// Treated as an implicit reject.
    #[error("no operator decision within {0:?}")]
    ArbitrationTimeout(Duration),

    /// The engine rejected a command.
    #[error("engine call failed: {0}")]
    EngineCall(#[from] EngineError),

    /// A panic was caught at the engine callback boundary. Logged with the
    /// offending event kind; never propagated into engine code.
    #[error("panic while handling engine event '{event_type}'")]
    BridgeCallback { event_type: String },
}

impl CoreError {
    pub fn registry_miss(kind: &'static str, id: impl Into<String>) -> Self {
        Self::RegistryMiss {
            kind,
            id: id.into(),
        }
    }
}

/// Failures reported by the external engine boundary.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The listen address is still held, typically by a closing socket.
    /// The server-(re)start path retries this with bounded backoff.
    #[error("address already in use")]
    AddressInUse,

    /// The engine backend is not linked into this build.
    #[error("engine backend not available")]
    Unavailable,

    /// Any other engine-reported failure, surfaced once.
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    pub fn is_address_in_use(&self) -> bool {
        matches!(self, EngineError::AddressInUse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_failing_context() {
        assert_eq!(
            CoreError::registry_miss("peer", "P9").to_string(),
            "unknown peer: 'P9'"
        );
        assert_eq!(
            CoreError::BridgeCallback {
                event_type: "PROGRESS".to_string()
            }
            .to_string(),
            "panic while handling engine event 'PROGRESS'"
        );
        assert_eq!(
            CoreError::from(EngineError::AddressInUse).to_string(),
            "engine call failed: address already in use"
        );
    }
}
