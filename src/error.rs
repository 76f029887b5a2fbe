// Error taxonomy for the compositor core
//
// See spec §7: protocol errors are client misuse and are surfaced as
// a wire-layer disconnect; resource errors use anyhow and propagate to
// the event loop boundary; backend errors are logged and handled by
// the Output state machine; fatal errors reuse the shutdown path.

use thiserror::Error;

/// Client-caused misuse of the protocol. The wire layer is expected to
/// translate these into a protocol error post() and disconnect the
/// offending client; core state remains consistent either way.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ProtocolError {
    #[error("surface already has role {existing:?}, cannot assign {requested:?}")]
    RoleConflict {
        existing: &'static str,
        requested: &'static str,
    },
    #[error("buffer scale must be >= 1, got {0}")]
    InvalidBufferScale(i32),
    #[error("xdg_surface configure was never acked before commit")]
    MissingConfigure,
    #[error("surface has no role assigned for this request")]
    UnknownRole,
}

/// A non-fatal backend/render failure (spec §4.2 step 4, §7). The
/// Output that produced it stays alive; repeated failures mark it
/// unusable (see Output::record_backend_failure).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("backend error: {0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(reason: impl Into<String>) -> BackendError {
        BackendError(reason.into())
    }
}
