//! Error types for storage engines.

use portico_model::Key;
use thiserror::Error;

use crate::session::CursorId;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by a storage engine.
///
/// `StaleObject` and `CommitConflict` are the recoverable conditions the
/// access layer turns into failure flags; everything else is fatal for
/// the unit of work.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The row changed (or disappeared) since this session loaded it.
    #[error("stale object {entity} {key}: row changed since it was loaded")]
    StaleObject {
        /// Concrete entity type of the row.
        entity: String,
        /// Row key.
        key: Key,
    },

    /// A staged write lost a race with another session's commit.
    #[error("commit conflict on {entity} {key}: row changed since the write was staged")]
    CommitConflict {
        /// Concrete entity type of the row.
        entity: String,
        /// Row key.
        key: Key,
    },

    /// A caller-supplied query or predicate could not be parsed or
    /// evaluated.
    #[error("query error: {message}")]
    Query {
        /// What went wrong, verbatim from the engine.
        message: String,
    },

    /// An entity name that was never registered with the engine.
    #[error("unknown entity type '{name}'")]
    UnknownEntity {
        /// The unregistered name.
        name: String,
    },

    /// A query referenced an attribute the bound entity does not declare.
    #[error("unknown attribute '{attribute}' on entity '{entity}'")]
    UnknownAttribute {
        /// Entity the query was bound to.
        entity: String,
        /// The undeclared attribute.
        attribute: String,
    },

    /// A query used a named parameter with no binding.
    #[error("unbound parameter :{name}")]
    UnboundParameter {
        /// Parameter name without the sigil.
        name: String,
    },

    /// The session hit the configured limit of open cursors.
    #[error("open cursor limit of {limit} reached")]
    CursorLimit {
        /// The configured limit.
        limit: usize,
    },

    /// A cursor id that is not (or no longer) open on this session.
    #[error("invalid cursor {cursor}")]
    InvalidCursor {
        /// The offending cursor id.
        cursor: CursorId,
    },

    /// The engine rejected its entity registration.
    #[error("registration error: {message}")]
    Registration {
        /// Why the registration is invalid.
        message: String,
    },

    /// The engine (or this session's database) has been closed.
    #[error("engine is closed")]
    Closed,

    /// An internal consistency fault.
    #[error("internal engine error: {message}")]
    Internal {
        /// Description of the fault.
        message: String,
    },
}

impl EngineError {
    /// Create a stale-object error.
    pub fn stale_object(entity: impl Into<String>, key: Key) -> Self {
        Self::StaleObject {
            entity: entity.into(),
            key,
        }
    }

    /// Create a commit-conflict error.
    pub fn commit_conflict(entity: impl Into<String>, key: Key) -> Self {
        Self::CommitConflict {
            entity: entity.into(),
            key,
        }
    }

    /// Create a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create an unknown-entity error.
    pub fn unknown_entity(name: impl Into<String>) -> Self {
        Self::UnknownEntity { name: name.into() }
    }

    /// Create an unknown-attribute error.
    pub fn unknown_attribute(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::UnknownAttribute {
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }

    /// Create an unbound-parameter error.
    pub fn unbound_parameter(name: impl Into<String>) -> Self {
        Self::UnboundParameter { name: name.into() }
    }

    /// Create a registration error.
    pub fn registration(message: impl Into<String>) -> Self {
        Self::Registration {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error is the recoverable staleness signal.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleObject { .. })
    }

    /// Whether this error is the recoverable commit-conflict signal.
    #[must_use]
    pub fn is_commit_conflict(&self) -> bool {
        matches!(self, Self::CommitConflict { .. })
    }
}
