//! The persisted-entity trait.

use crate::attr::{Accessor, EntityDef};
use crate::error::ModelResult;
use crate::record::Record;
use crate::types::Key;

/// Trait for types that can be persisted through Portico.
///
/// Implementors must provide:
/// - `def()`: the static descriptor chain for the type's hierarchy level
/// - `accessors()`: the static read-accessor table across all levels
/// - `key()` / `assign_key()`: identity access; `None` until first save
/// - `from_record()`: hydration from a stored record
///
/// Lowering to a record is mechanical and provided: `to_record()` walks
/// the accessor table. A base-bound enum over concrete subtypes overrides
/// it to delegate to the active variant so the record keeps the concrete
/// tag.
///
/// # Example
///
/// ```rust,ignore
/// use portico_model::{
///     Accessor, AttrDef, AttrKind, EntityDef, Key, ModelResult, Persistent, Record, Value,
/// };
///
/// struct User {
///     key: Option<Key>,
///     name: String,
/// }
///
/// static USER: EntityDef = EntityDef {
///     name: "User",
///     parent: None,
///     key_attr: Some("id"),
///     declared: &[AttrDef::new("name", AttrKind::Text)],
/// };
///
/// impl Persistent for User {
///     fn def() -> &'static EntityDef {
///         &USER
///     }
///
///     fn accessors() -> &'static [Accessor<Self>] {
///         static ACCESSORS: [Accessor<User>; 1] =
///             [Accessor::new("name", |u: &User| Value::from(u.name.as_str()))];
///         &ACCESSORS
///     }
///
///     fn key(&self) -> Option<Key> {
///         self.key
///     }
///
///     fn assign_key(&mut self, key: Key) {
///         self.key = Some(key);
///     }
///
///     fn from_record(record: &Record) -> ModelResult<Self> {
///         Ok(User {
///             key: Some(record.require_key()?),
///             name: record.text("name")?,
///         })
///     }
/// }
/// ```
pub trait Persistent: Sized + 'static {
    /// The descriptor level this type binds to.
    ///
    /// For a concrete type this is its own level; for a base-bound enum
    /// it is the shared base level.
    fn def() -> &'static EntityDef;

    /// Read accessors for every readable attribute, across all levels.
    ///
    /// A declared attribute without an accessor entry is unreadable from
    /// samples and silently skipped by query-by-example.
    fn accessors() -> &'static [Accessor<Self>];

    /// The entity's identity, if storage has assigned (or the caller
    /// pre-assigned) one.
    fn key(&self) -> Option<Key>;

    /// Stores the identity assigned by the engine on first save.
    fn assign_key(&mut self, key: Key);

    /// Hydrates an entity from a stored record.
    fn from_record(record: &Record) -> ModelResult<Self>;

    /// Lowers the entity into a record by walking the accessor table.
    fn to_record(&self) -> Record {
        let mut record = Record::new(Self::def().name);
        if let Some(key) = self.key() {
            record.set_key(key);
        }
        for accessor in Self::accessors() {
            record.set(accessor.attr, (accessor.read)(self));
        }
        record
    }
}
