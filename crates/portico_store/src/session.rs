//! Engine and session trait definitions.

use std::collections::BTreeMap;
use std::fmt;

use portico_model::{Key, Record, Value};

use crate::error::EngineResult;

/// Identifier of a server-side cursor within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CursorId(pub u64);

impl CursorId {
    /// Creates a cursor id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CursorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cur:{}", self.0)
    }
}

/// Comparison applied by a structured criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriterionOp {
    /// Value equality.
    Eq,
    /// Text pattern match with `%` and `_` wildcards.
    Like,
}

/// One structured filter predicate.
///
/// Criteria are the engine-side form of query-by-example: the access
/// layer derives them from a sample entity and the engine ANDs them
/// together over a type-bound scan. Building criteria directly keeps
/// derived queries out of the text dialect entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    /// Attribute the predicate applies to.
    pub attribute: String,
    /// Comparison operator.
    pub op: CriterionOp,
    /// Right-hand value. For `Like` this is the pattern text.
    pub value: Value,
}

impl Criterion {
    /// Creates an equality criterion.
    pub fn eq(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            attribute: attribute.into(),
            op: CriterionOp::Eq,
            value: value.into(),
        }
    }

    /// Creates a pattern-match criterion.
    pub fn like(attribute: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            op: CriterionOp::Like,
            value: Value::Text(pattern.into()),
        }
    }
}

/// Named parameter bindings for dialect queries.
///
/// Parameters appear in query text with the `:name` sigil and bind here
/// by bare name.
///
/// # Example
///
/// ```
/// use portico_store::Params;
///
/// let params = Params::new().bind("kind", 2i64).bind("name", "Nikki");
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    /// Creates an empty binding set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Looks a binding up by bare name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no bindings are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One row of a dialect query result.
///
/// A bare `from` query yields entity records; a `select <attr>` query
/// yields one scalar per matching row. Callers of the raw-query escape
/// hatch get these untyped and decide themselves what to do with them.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRow {
    /// A full entity row.
    Entity(Record),
    /// A projected attribute value.
    Scalar(Value),
}

impl QueryRow {
    /// Get this row as an entity record, if it is one.
    #[must_use]
    pub fn as_entity(&self) -> Option<&Record> {
        match self {
            QueryRow::Entity(record) => Some(record),
            QueryRow::Scalar(_) => None,
        }
    }

    /// Get this row as a projected scalar, if it is one.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            QueryRow::Scalar(value) => Some(value),
            QueryRow::Entity(_) => None,
        }
    }
}

/// A unit-of-work handle onto a storage engine.
///
/// A session always has an open transaction: writes stage into it,
/// reads on the same session observe the staged writes (read-your-writes),
/// and `commit`/`rollback` end the transaction with the next operation
/// implicitly starting the next one. Other sessions see only committed
/// state.
///
/// # Invariants
///
/// - At most one transaction is active per session, by construction.
/// - `save` validates staleness against the version this session last
///   loaded for the row and refuses to stage a stale write.
/// - `commit` re-validates every staged write and applies all of them or
///   none.
/// - A cursor stays open until `close_cursor`, session close, or is
///   reported exhausted and then closed by the caller.
///
/// Sessions are `Send` but not `Sync`: one calling context at a time.
pub trait Session: Send {
    /// Stages an insert or update for the record.
    ///
    /// A record without a key is an insert; the engine assigns and
    /// returns the new key. A record with a key updates the existing row
    /// or inserts at the pre-assigned key.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StaleObject`](crate::EngineError) when the
    /// row changed since this session loaded it; the write is not staged.
    /// Other errors are fatal for the unit of work.
    fn save(&mut self, record: &Record) -> EngineResult<Key>;

    /// Reads one row by key through this session's merged view.
    ///
    /// Rows whose concrete type is outside `entity`'s hierarchy branch
    /// read as absent.
    fn get(&mut self, entity: &str, key: Key) -> EngineResult<Option<Record>>;

    /// Re-reads committed state for one row, discarding any write this
    /// session staged for it, and re-bases the session on the current
    /// version. Returns the committed record, or `None` if the row is
    /// gone.
    fn refresh(&mut self, entity: &str, key: Key) -> EngineResult<Option<Record>>;

    /// Stages a delete for one row.
    fn delete(&mut self, entity: &str, key: Key) -> EngineResult<()>;

    /// Stages deletes for every row of the bound type (subtype rows
    /// included). Returns how many rows were staged.
    fn delete_all(&mut self, entity: &str) -> EngineResult<u64>;

    /// Executes a dialect query with named-parameter bindings.
    ///
    /// # Errors
    ///
    /// Malformed text, unknown entities or attributes, and unbound
    /// parameters surface as errors, unsanitized.
    fn query(&mut self, text: &str, params: &Params) -> EngineResult<Vec<QueryRow>>;

    /// Scans the bound type and filters by criteria ANDed together.
    fn query_by(&mut self, entity: &str, criteria: &[Criterion]) -> EngineResult<Vec<Record>>;

    /// Opens a cursor over the bound type, with an optional predicate
    /// appended verbatim to the generated `from` query, positioned past
    /// the first `skip` rows.
    fn open_cursor(
        &mut self,
        entity: &str,
        predicate: Option<&str>,
        skip: u64,
    ) -> EngineResult<CursorId>;

    /// Pulls the next row off a cursor. `Ok(None)` signals exhaustion;
    /// an exhausted cursor remains open until closed.
    fn advance(&mut self, cursor: CursorId) -> EngineResult<Option<Record>>;

    /// Releases a cursor.
    fn close_cursor(&mut self, cursor: CursorId) -> EngineResult<()>;

    /// Applies every staged write atomically and starts the next
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CommitConflict`](crate::EngineError) if any
    /// staged write lost a race with another session's commit; nothing is
    /// applied and the staged writes remain until `rollback`.
    fn commit(&mut self) -> EngineResult<()>;

    /// Discards every staged write and starts the next transaction.
    fn rollback(&mut self) -> EngineResult<()>;

    /// Number of cursors currently open on this session.
    fn open_cursors(&self) -> usize;
}

/// A storage engine that hands out sessions.
///
/// # Invariants
///
/// - Sessions are independent units of work; staged writes of one are
///   invisible to others until commit.
/// - `close` is process-wide teardown: open sessions fail afterwards.
/// - Engines must be `Send + Sync`; they are shared behind an `Arc` by
///   every database handle built on them.
pub trait Engine: Send + Sync {
    /// Opens a new session.
    fn open_session(&self) -> EngineResult<Box<dyn Session>>;

    /// Releases the engine's resources entirely.
    fn close(&self) -> EngineResult<()>;

    /// Whether the engine still accepts work.
    fn is_open(&self) -> bool;

    /// Number of cursors currently open across all sessions.
    ///
    /// Exists so resource-safety contracts are checkable: paged
    /// iteration must leave this at zero, abandoned streaming iteration
    /// leaves it raised until the owning session closes.
    fn open_cursors(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criterion_constructors() {
        let eq = Criterion::eq("rank", 3i64);
        assert_eq!(eq.op, CriterionOp::Eq);
        assert_eq!(eq.value, Value::Int(3));

        let like = Criterion::like("nickname", "L%");
        assert_eq!(like.op, CriterionOp::Like);
        assert_eq!(like.value, Value::Text("L%".to_string()));
    }

    #[test]
    fn params_bind_and_lookup() {
        let params = Params::new().bind("ct", 1i64).bind("who", "Nikki");
        assert_eq!(params.get("ct"), Some(&Value::Int(1)));
        assert_eq!(params.get("who"), Some(&Value::Text("Nikki".to_string())));
        assert_eq!(params.get("missing"), None);
        assert!(!params.is_empty());
    }

    #[test]
    fn query_row_accessors() {
        let scalar = QueryRow::Scalar(Value::Int(5));
        assert_eq!(scalar.as_scalar(), Some(&Value::Int(5)));
        assert!(scalar.as_entity().is_none());

        let entity = QueryRow::Entity(Record::new("Gadget"));
        assert!(entity.as_entity().is_some());
        assert!(entity.as_scalar().is_none());
    }

    #[test]
    fn cursor_id_display() {
        assert_eq!(format!("{}", CursorId::new(3)), "cur:3");
    }
}
