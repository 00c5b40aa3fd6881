//! Streaming iteration over one long-lived cursor.

use std::marker::PhantomData;

use tracing::debug;

use portico_model::Persistent;
use portico_store::CursorId;

use crate::db::Db;
use crate::error::AccessResult;

/// A forward-only stream of entities backed by a single engine cursor.
///
/// The cursor is opened when the stream is constructed and released
/// exactly when the stream reports exhaustion. Stopping earlier leaves
/// the cursor open: call [`close`](EntityCursor::close) when abandoning
/// a stream mid-way, or the cursor counts against the engine's limit
/// until the session closes. There is deliberately no `Drop` cleanup;
/// releasing the cursor takes an engine call that can fail, and a silent
/// drop would hide that.
///
/// A row that fails to hydrate is yielded as an error and the stream
/// continues past it.
#[derive(Debug)]
pub struct EntityCursor<E: Persistent> {
    db: Db,
    cursor: Option<CursorId>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Persistent> EntityCursor<E> {
    pub(crate) fn open(db: Db, predicate: Option<String>) -> AccessResult<Self> {
        let cursor = db.with_session(|session| {
            session.open_cursor(E::def().name, predicate.as_deref(), 0)
        })?;
        Ok(EntityCursor {
            db,
            cursor: Some(cursor),
            _entity: PhantomData,
        })
    }

    /// Releases the cursor before exhaustion. Idempotent; the stream
    /// yields nothing afterwards.
    ///
    /// # Errors
    ///
    /// Fails when the engine rejects the release; the cursor is
    /// considered gone either way.
    pub fn close(&mut self) -> AccessResult<()> {
        if let Some(cursor) = self.cursor.take() {
            self.db
                .with_session(|session| session.close_cursor(cursor))?;
        }
        Ok(())
    }

    /// Whether the underlying cursor is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.cursor.is_some()
    }
}

impl<E: Persistent> Iterator for EntityCursor<E> {
    type Item = AccessResult<E>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor?;
        match self.db.with_session(|session| session.advance(cursor)) {
            Ok(Some(record)) => Some(E::from_record(&record).map_err(Into::into)),
            Ok(None) => match self.close() {
                Ok(()) => None,
                Err(err) => Some(Err(err)),
            },
            Err(err) => {
                // the stream is unusable; release the cursor and stop
                if let Err(close_err) = self.close() {
                    debug!(%close_err, "cursor release after failed advance");
                }
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::dao::Dao;
    use crate::error::AccessError;
    use crate::testutil::{self, book, Book};
    use portico_model::Record;
    use portico_store::{Engine, EngineError, MemoryEngine, StoreConfig};

    fn seeded(count: i64) -> (MemoryEngine, Dao<Book>) {
        let engine = testutil::engine();
        let dao = Dao::new(&testutil::db_over(&engine));
        for i in 1..=count {
            dao.save(&mut book(&format!("Book {i:02}"), 100 * i)).unwrap();
        }
        assert!(dao.commit().unwrap());
        (engine, dao)
    }

    #[test]
    fn streams_everything_and_auto_closes() {
        let (engine, dao) = seeded(3);

        let books: Vec<Book> = dao.iterate_all().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(books.len(), 3);
        assert_eq!(engine.open_cursors(), 0);
    }

    #[test]
    fn early_abandon_leaks_until_session_close() {
        let (engine, dao) = seeded(3);

        let mut stream = dao.iterate_all().unwrap();
        stream.next().unwrap().unwrap();
        drop(stream);
        assert_eq!(engine.open_cursors(), 1);

        dao.close_session().unwrap();
        assert_eq!(engine.open_cursors(), 0);
    }

    #[test]
    fn explicit_close_releases_immediately() {
        let (engine, dao) = seeded(3);

        let mut stream = dao.iterate_all().unwrap();
        stream.next().unwrap().unwrap();
        stream.close().unwrap();
        assert!(!stream.is_open());
        assert_eq!(engine.open_cursors(), 0);

        stream.close().unwrap();
        assert!(stream.next().is_none());
    }

    #[test]
    fn exhaustion_closes_exactly_once() {
        let (engine, dao) = seeded(1);

        let mut stream = dao.iterate_all().unwrap();
        assert!(stream.next().is_some());
        assert_eq!(engine.open_cursors(), 1);
        assert!(stream.next().is_none());
        assert_eq!(engine.open_cursors(), 0);
        assert!(!stream.is_open());
        assert!(stream.next().is_none());
    }

    #[test]
    fn predicate_orders_the_stream() {
        let (_engine, dao) = seeded(3);

        let books: Vec<Book> = dao
            .iterate_all_where("where pages > 100 order by pages desc")
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        let titles: Vec<&str> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, ["Book 03", "Book 02"]);
    }

    #[test]
    fn cursor_limit_applies_at_open() {
        let engine = MemoryEngine::builder()
            .register(&testutil::BOOK)
            .config(StoreConfig::new().max_open_cursors(1))
            .build()
            .unwrap();
        let dao: Dao<Book> = Dao::new(&testutil::db_over(&engine));
        dao.save(&mut book("Dune", 412)).unwrap();

        let first = dao.iterate_all().unwrap();
        let err = dao.iterate_all().unwrap_err();
        assert!(matches!(
            err,
            AccessError::Engine(EngineError::CursorLimit { limit: 1 })
        ));
        drop(first);
    }

    #[test]
    fn bad_row_is_an_error_but_the_stream_continues() {
        let (engine, dao) = seeded(1);
        let db = testutil::db_over(&engine);

        // a committed row the Book hydrator cannot read
        let mut bare = Record::new("Book");
        bare.set("title", "No page count");
        db.with_session(|session| session.save(&bare)).unwrap();
        db.close_session().unwrap();

        let results: Vec<_> = dao.iterate_all().unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(AccessError::Model(_))));
        assert_eq!(engine.open_cursors(), 0);
    }
}
