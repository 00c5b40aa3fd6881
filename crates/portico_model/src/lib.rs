//! # Portico Model
//!
//! Entity descriptor tables, dynamic values, and attribute records: the
//! vocabulary shared by the Portico access layer and its storage engines.
//!
//! The crate replaces runtime reflection with static metadata. An entity
//! type declares:
//! - an [`EntityDef`] level (name, base link, declared attributes), one
//!   per type in its hierarchy;
//! - an [`Accessor`] table giving read access to each attribute;
//! - hydration from a stored [`Record`] via [`Persistent::from_record`].
//!
//! Everything an engine stores or filters is a [`Value`]; entity rows
//! travel as [`Record`]s keyed by [`Key`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod attr;
mod entity;
mod error;
mod record;
mod types;
mod value;

pub use attr::{Accessor, AttrDef, AttrKind, ChainIter, EntityDef};
pub use entity::Persistent;
pub use error::{ModelError, ModelResult};
pub use record::Record;
pub use types::{Key, Timestamp};
pub use value::Value;
