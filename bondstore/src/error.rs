//! Error types for the keystore, its persistence and the event bridge.
//!
//! Key material is never included in error messages.

use bondstore_proto::FieldError;

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage medium failed: {0}")]
    Medium(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("corrupt store: {0}")]
    CorruptStore(#[from] serde_json::Error),
    #[error("failed to encode store: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Errors raised while handling a radio-stack event.
///
/// These indicate a radio-stack / library mismatch and are returned to the
/// caller rather than recovered from.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("unknown bond type: {0}")]
    InvalidBondKind(i64),
    #[error("unknown event: {0}")]
    UnknownEvent(u8),
    #[error("malformed payload: {0}")]
    Payload(#[from] FieldError),
}
