//! Shared fixtures for the crate's unit tests.

use std::sync::Arc;

use portico_model::{
    Accessor, AttrDef, AttrKind, EntityDef, Key, ModelResult, Persistent, Record, Value,
};
use portico_store::MemoryEngine;

use crate::db::Db;

// "shelf" is declared but has no accessor; "tags" is array-kinded.
// Query-by-example must skip both.
pub(crate) static BOOK: EntityDef = EntityDef {
    name: "Book",
    parent: None,
    key_attr: Some("id"),
    declared: &[
        AttrDef::new("title", AttrKind::Text),
        AttrDef::new("pages", AttrKind::Int),
        AttrDef::new("shelf", AttrKind::Text),
        AttrDef::new("tags", AttrKind::Array),
    ],
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Book {
    pub key: Option<Key>,
    pub title: String,
    pub pages: i64,
}

impl Persistent for Book {
    fn def() -> &'static EntityDef {
        &BOOK
    }

    fn accessors() -> &'static [Accessor<Self>] {
        static ACCESSORS: [Accessor<Book>; 2] = [
            Accessor::new("title", |b: &Book| Value::from(b.title.as_str())),
            Accessor::new("pages", |b: &Book| Value::from(b.pages)),
        ];
        &ACCESSORS
    }

    fn key(&self) -> Option<Key> {
        self.key
    }

    fn assign_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    fn from_record(record: &Record) -> ModelResult<Self> {
        Ok(Book {
            key: Some(record.require_key()?),
            title: record.text("title")?,
            pages: record.int("pages")?,
        })
    }
}

pub(crate) fn book(title: &str, pages: i64) -> Book {
    Book {
        key: None,
        title: title.to_string(),
        pages,
    }
}

pub(crate) fn engine() -> MemoryEngine {
    MemoryEngine::builder()
        .register(&BOOK)
        .build()
        .expect("fixture engine builds")
}

pub(crate) fn db_over(engine: &MemoryEngine) -> Db {
    Db::new(Arc::new(engine.clone()))
}

pub(crate) fn db() -> Db {
    db_over(&engine())
}
