use crate::store::StoreError;

use super::authorize::DenyReason;

#[derive(Debug)]
pub enum EngineError {
    /// Authorization said no. Expected outcome, surfaced verbatim.
    Denied(DenyReason),
    NotFound(String),
    /// An idempotency id was reused for a different booking.
    AlreadyExists(String),
    Invalid(&'static str),
    /// The persistence collaborator failed; the write may or may not have landed.
    Store(StoreError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Denied(reason) => write!(f, "booking denied: {reason}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Invalid(msg) => write!(f, "invalid request: {msg}"),
            EngineError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e)
    }
}
