//! Storage engine contract and the embedded in-memory engine.
//!
//! This crate is the seam between the access layer and whatever stores
//! the rows. It defines:
//!
//! - [`Engine`] and [`Session`]: the exact interfaces the access layer
//!   needs (versioned CRUD, staged transactions, structured criteria,
//!   dialect queries, server-side cursors)
//! - [`EngineError`]: the engine-side error taxonomy, including the two
//!   recoverable signals `StaleObject` and `CommitConflict`
//! - [`MemoryEngine`]: an embedded, in-process engine implementing the
//!   whole contract against in-memory tables, used by tests and demos
//!
//! The engine speaks a small object-query dialect
//! (`from Entity where ... order by ...`) with named `:parameters` and
//! `%`/`_` text patterns; see [`like_match`] for the pattern rules.
//!
//! # Example
//!
//! ```
//! use portico_model::{AttrDef, AttrKind, EntityDef, Record};
//! use portico_store::{Engine, MemoryEngine, Params};
//!
//! static NOTE: EntityDef = EntityDef {
//!     name: "Note",
//!     parent: None,
//!     key_attr: Some("id"),
//!     declared: &[AttrDef::new("body", AttrKind::Text)],
//! };
//!
//! # fn main() -> portico_store::EngineResult<()> {
//! let engine = MemoryEngine::builder().register(&NOTE).build()?;
//! let mut session = engine.open_session()?;
//!
//! let mut note = Record::new("Note");
//! note.set("body", "first");
//! session.save(&note)?;
//! session.commit()?;
//!
//! let rows = session.query("from Note where body = 'first'", &Params::new())?;
//! assert_eq!(rows.len(), 1);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod memory;
mod query;
mod session;

pub use config::StoreConfig;
pub use error::{EngineError, EngineResult};
pub use memory::{MemoryEngine, MemoryEngineBuilder};
pub use query::like_match;
pub use session::{Criterion, CriterionOp, CursorId, Engine, Params, QueryRow, Session};
