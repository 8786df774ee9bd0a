use thiserror::Error;

use crate::index::store::PayloadMode;

/// Errors surfaced by the feature-map index.
///
/// All of them are detected synchronously at the offending call and leave
/// the index unchanged; none are retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// Ingestion mode does not match the mode the store was constructed with.
    #[error("cannot ingest {requested:?} payloads into a store fixed to {fixed:?} payloads")]
    OwnershipConflict {
        fixed: PayloadMode,
        requested: PayloadMode,
    },

    /// Mutable payload access on a store holding shared references.
    #[error("mutable feature access requires an exclusively owned payload store")]
    ModeError,

    /// Feature id at or past the current size.
    #[error("feature id {id} out of range (size {size})")]
    OutOfRange { id: usize, size: usize },

    /// Wrong number of per-map inputs.
    #[error("expected {expected} per-map entries, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
}
