//! Error types for the access layer.

use portico_model::ModelError;
use portico_store::EngineError;
use thiserror::Error;

/// Result type for access-layer operations.
pub type AccessResult<T> = Result<T, AccessError>;

/// Errors surfaced by [`Db`](crate::Db) and [`Dao`](crate::Dao) operations.
///
/// Engine and model failures pass through wrapped; the two local variants
/// cover conditions only this layer can detect. Recoverable engine signals
/// never reach callers as errors: `save` folds staleness into `Ok(false)`
/// and `commit` folds a commit conflict into `Ok(false)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The storage engine rejected the operation.
    #[error("engine: {0}")]
    Engine(#[from] EngineError),

    /// A stored record could not be hydrated into the requested type.
    #[error("model: {0}")]
    Model(#[from] ModelError),

    /// The operation needs a persisted entity but the entity has no key.
    #[error("entity has no key; it was never saved")]
    MissingKey,

    /// The database handle was closed by `close_database`.
    #[error("database is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_wrap_transparently() {
        let err = AccessError::from(EngineError::unknown_entity("Ghost"));
        assert!(matches!(
            err,
            AccessError::Engine(EngineError::UnknownEntity { .. })
        ));
        assert!(err.to_string().contains("Ghost"));
    }

    #[test]
    fn local_variants_render() {
        assert_eq!(
            AccessError::MissingKey.to_string(),
            "entity has no key; it was never saved"
        );
        assert_eq!(AccessError::Closed.to_string(), "database is closed");
    }
}
