//! Engine-level error types.

use crate::store::StoreError;

/// Errors the decision engine can surface to the adapter.
///
/// Anything here is fatal for the current request; the adapter maps it to a
/// 5xx status. Routine negatives (no token, unknown route, missing entry)
/// are not errors and never appear here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("escrow store failure: {0}")]
    Store(#[from] StoreError),

    /// A stored document failed to deserialize. Served as an error, never
    /// as a 200 with garbage body.
    #[error("corrupt escrow entry: {0}")]
    CorruptEntry(#[from] serde_json::Error),

    /// The downstream response body was not valid UTF-8, so it cannot be
    /// carried in the sequence-of-strings stored format.
    #[error("escrowed response body is not valid UTF-8")]
    BodyNotText,

    /// A downstream response header value was not representable as text,
    /// so the stored copy could not reproduce the response as-is.
    #[error("escrowed response header is not representable as text")]
    HeaderNotText,
}
