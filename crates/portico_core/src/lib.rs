//! Typed data access over a storage engine.
//!
//! This crate is the layer applications talk to:
//!
//! - [`Db`]: the session-provider handle over a storage engine; opens a
//!   session implicitly, commits on [`Db::close_session`], shuts the
//!   engine down on [`Db::close_database`]
//! - [`Dao`]: every persistence operation for one
//!   [`Persistent`](portico_model::Persistent) entity type: save with
//!   staleness recovery, fetches, lazy iteration, raw object-queries,
//!   query-by-example, deletion, transaction control
//! - [`PageIter`] and [`EntityCursor`]: the two lazy result shapes and
//!   their different cursor-resource contracts
//!
//! Staleness and commit conflicts are outcomes, not errors: `save` and
//! `commit` return `Ok(false)` on those paths and keep the caller in
//! control. Everything else surfaces as [`AccessError`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use portico_core::{AccessResult, Dao, Db};
//! use portico_model::{
//!     Accessor, AttrDef, AttrKind, EntityDef, Key, ModelResult, Persistent, Record, Value,
//! };
//! use portico_store::MemoryEngine;
//!
//! struct Note {
//!     key: Option<Key>,
//!     body: String,
//! }
//!
//! static NOTE: EntityDef = EntityDef {
//!     name: "Note",
//!     parent: None,
//!     key_attr: Some("id"),
//!     declared: &[AttrDef::new("body", AttrKind::Text)],
//! };
//!
//! impl Persistent for Note {
//!     fn def() -> &'static EntityDef {
//!         &NOTE
//!     }
//!
//!     fn accessors() -> &'static [Accessor<Self>] {
//!         static ACCESSORS: [Accessor<Note>; 1] =
//!             [Accessor::new("body", |n: &Note| Value::from(n.body.as_str()))];
//!         &ACCESSORS
//!     }
//!
//!     fn key(&self) -> Option<Key> {
//!         self.key
//!     }
//!
//!     fn assign_key(&mut self, key: Key) {
//!         self.key = Some(key);
//!     }
//!
//!     fn from_record(record: &Record) -> ModelResult<Self> {
//!         Ok(Note {
//!             key: Some(record.require_key()?),
//!             body: record.text("body")?,
//!         })
//!     }
//! }
//!
//! # fn main() -> AccessResult<()> {
//! let engine = MemoryEngine::builder().register(&NOTE).build()?;
//! let db = Db::new(Arc::new(engine));
//! let notes: Dao<Note> = Dao::new(&db);
//!
//! let mut note = Note {
//!     key: None,
//!     body: "first".to_string(),
//! };
//! notes.save(&mut note)?;
//! assert!(note.key.is_some());
//! notes.commit()?;
//!
//! let sample = Note {
//!     key: None,
//!     body: "fir%".to_string(),
//! };
//! assert_eq!(notes.find_by_example(&sample)?.len(), 1);
//!
//! db.close_database()?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod dao;
mod db;
mod error;
mod example;
mod iter;
#[cfg(test)]
mod testutil;

pub use dao::Dao;
pub use db::Db;
pub use error::{AccessError, AccessResult};
pub use iter::{EntityCursor, PageIter};

// the query types a Dao caller has to construct or destructure
pub use portico_store::{Params, QueryRow};
