//! Typed data-access objects.

use std::fmt;
use std::marker::PhantomData;

use tracing::{debug, warn};

use portico_model::{Key, Persistent};
use portico_store::{Params, QueryRow};

use crate::db::Db;
use crate::error::{AccessError, AccessResult};
use crate::example;
use crate::iter::{EntityCursor, PageIter};

/// Typed access to one entity type through a shared [`Db`].
///
/// A `Dao<E>` performs every persistence operation for `E`: create and
/// update through [`save`](Dao::save), lookups, lazy iteration, raw
/// queries and query-by-example, deletion, and transaction control. All
/// daos constructed from the same `Db` share one session, so
/// [`commit`](Dao::commit) applies the writes staged through any of
/// them.
///
/// A dao bound to a base type sees subtype rows as well: `fetch_all` on
/// the base returns every concrete variant, and `fetch` refuses keys
/// whose stored tag falls outside the bound type.
///
/// # Example
///
/// ```rust,ignore
/// let db = Db::new(Arc::new(engine));
/// let users: Dao<User> = Dao::new(&db);
///
/// let mut user = User::named("Ada");
/// users.save(&mut user)?;        // key assigned here
/// users.commit()?;
///
/// let found = users.fetch(user.key().unwrap())?;
/// ```
pub struct Dao<E: Persistent> {
    db: Db,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Persistent> Dao<E> {
    /// Binds a dao to a database handle.
    #[must_use]
    pub fn new(db: &Db) -> Self {
        Dao {
            db: db.clone(),
            _entity: PhantomData,
        }
    }

    fn type_name() -> &'static str {
        E::def().name
    }

    /// Saves an entity: insert when it has no key, update otherwise.
    ///
    /// On insert the engine assigns a key and `save` writes it back into
    /// the entity. The write is staged in the open transaction; it
    /// becomes visible to other sessions only after [`commit`](Dao::commit).
    ///
    /// Returns `Ok(false)` when the engine reports the entity stale
    /// (another session committed a newer version, or deleted the row,
    /// after this session read it). On that path the entity is reloaded
    /// from current committed state so the caller can reapply their
    /// change and save again; a deleted row leaves the entity untouched.
    /// The transaction stays open.
    ///
    /// # Errors
    ///
    /// Any other engine failure is fatal for the unit of work: the
    /// transaction is rolled back, the session released, and the error
    /// returned.
    pub fn save(&self, entity: &mut E) -> AccessResult<bool> {
        let record = entity.to_record();
        match self.db.with_session(|session| session.save(&record)) {
            Ok(key) => {
                entity.assign_key(key);
                Ok(true)
            }
            Err(AccessError::Engine(err)) if err.is_stale() => {
                debug!(entity = Self::type_name(), "stale save, refreshing");
                self.refresh_into(entity)?;
                Ok(false)
            }
            Err(err) => {
                warn!(entity = Self::type_name(), %err, "save failed, abandoning session");
                self.db.abandon();
                Err(err)
            }
        }
    }

    /// Reloads the entity from committed state after a stale save. Also
    /// drops the rejected staged write so a later save starts from the
    /// refreshed version.
    fn refresh_into(&self, entity: &mut E) -> AccessResult<()> {
        let Some(key) = entity.key() else {
            return Ok(());
        };
        let refreshed = self
            .db
            .with_session(|session| session.refresh(Self::type_name(), key))?;
        if let Some(record) = refreshed {
            *entity = E::from_record(&record)?;
        }
        Ok(())
    }

    /// Fetches one entity by key.
    ///
    /// Missing rows yield `Ok(None)`, never an error. A dao bound to a
    /// subtype refuses rows stored under a sibling tag the same way.
    ///
    /// # Errors
    ///
    /// Fails when the row cannot be hydrated into `E` or the engine
    /// rejects the read.
    pub fn fetch(&self, key: Key) -> AccessResult<Option<E>> {
        let record = self
            .db
            .with_session(|session| session.get(Self::type_name(), key))?;
        match record {
            Some(record) => Ok(Some(E::from_record(&record)?)),
            None => Ok(None),
        }
    }

    /// Fetches every entity of the bound type, subtype rows included,
    /// eagerly materialized in key order.
    ///
    /// # Errors
    ///
    /// Fails when a row cannot be hydrated into `E` or the engine
    /// rejects the scan.
    pub fn fetch_all(&self) -> AccessResult<Vec<E>> {
        let records = self
            .db
            .with_session(|session| session.query_by(Self::type_name(), &[]))?;
        records
            .iter()
            .map(|record| Ok(E::from_record(record)?))
            .collect()
    }

    /// Iterates the bound type in batches of at most `page_size`,
    /// skipping `start_row` rows first.
    ///
    /// Each batch opens a fresh cursor positioned past the rows already
    /// produced and closes it before the batch is returned, so the
    /// iterator is always safe to abandon.
    #[must_use]
    pub fn iterate_pages(&self, page_size: usize, start_row: u64) -> PageIter<E> {
        PageIter::new(self.db.clone(), page_size, start_row, None)
    }

    /// Like [`iterate_pages`](Dao::iterate_pages) with a filter. The
    /// predicate is appended verbatim to the generated `from <type>`
    /// query, so it starts with `where` or `order by`.
    #[must_use]
    pub fn iterate_pages_where(
        &self,
        page_size: usize,
        start_row: u64,
        predicate: &str,
    ) -> PageIter<E> {
        PageIter::new(
            self.db.clone(),
            page_size,
            start_row,
            Some(predicate.to_string()),
        )
    }

    /// Streams the bound type entity by entity over one long-lived
    /// cursor.
    ///
    /// The cursor closes itself when the stream is exhausted;
    /// [`EntityCursor::close`] releases it early. Dropping the iterator
    /// without either leaks the cursor until the session closes.
    ///
    /// # Errors
    ///
    /// Fails when the cursor cannot be opened, for instance at the
    /// engine's open-cursor limit.
    pub fn iterate_all(&self) -> AccessResult<EntityCursor<E>> {
        EntityCursor::open(self.db.clone(), None)
    }

    /// Like [`iterate_all`](Dao::iterate_all) with a filter, appended
    /// verbatim after the generated `from <type>`.
    ///
    /// # Errors
    ///
    /// Fails when the predicate does not parse or the cursor cannot be
    /// opened.
    pub fn iterate_all_where(&self, predicate: &str) -> AccessResult<EntityCursor<E>> {
        EntityCursor::open(self.db.clone(), Some(predicate.to_string()))
    }

    /// Runs a raw object-query and returns untyped rows.
    ///
    /// The escape hatch for projections and cross-type queries: a bare
    /// `from` query yields [`QueryRow::Entity`] records, a `select`
    /// projection yields [`QueryRow::Scalar`] values. The query names its
    /// own entity, which does not have to be the bound type.
    ///
    /// # Errors
    ///
    /// Malformed input fails with the engine's query error, unmodified.
    pub fn find(&self, query: &str) -> AccessResult<Vec<QueryRow>> {
        self.find_with(query, &Params::new())
    }

    /// Runs a raw object-query with named parameter bindings.
    ///
    /// # Errors
    ///
    /// As [`find`](Dao::find); additionally fails when the query names a
    /// parameter the bindings do not provide.
    pub fn find_with(&self, query: &str, params: &Params) -> AccessResult<Vec<QueryRow>> {
        self.db.with_session(|session| session.query(query, params))
    }

    /// Finds entities matching a sample instance.
    ///
    /// Every set attribute of the example contributes a criterion: text
    /// becomes a `like` pattern (wildcards honored), everything else an
    /// equality check. Criteria are combined with AND. Null values,
    /// numeric zero, `0.0`, epoch-zero timestamps, and empty text all
    /// count as unset and filter nothing, so a genuine zero cannot be
    /// searched for this way.
    ///
    /// # Errors
    ///
    /// Fails when a matching row cannot be hydrated into `E` or the
    /// engine rejects the query.
    pub fn find_by_example(&self, example: &E) -> AccessResult<Vec<E>> {
        self.find_by_example_excluding(example, &[])
    }

    /// Like [`find_by_example`](Dao::find_by_example), ignoring the
    /// named attributes even when set.
    ///
    /// # Errors
    ///
    /// As [`find_by_example`](Dao::find_by_example).
    pub fn find_by_example_excluding(&self, example: &E, excluded: &[&str]) -> AccessResult<Vec<E>> {
        let criteria = example::criteria_from(example, excluded);
        let records = self
            .db
            .with_session(|session| session.query_by(Self::type_name(), &criteria))?;
        records
            .iter()
            .map(|record| Ok(E::from_record(record)?))
            .collect()
    }

    /// Stages the deletion of one entity.
    ///
    /// # Errors
    ///
    /// An entity that was never saved has no key and is rejected with
    /// [`AccessError::MissingKey`].
    pub fn delete(&self, entity: &E) -> AccessResult<()> {
        let key = entity.key().ok_or(AccessError::MissingKey)?;
        self.db
            .with_session(|session| session.delete(Self::type_name(), key))
    }

    /// Stages the deletion of every entity of the bound type, subtype
    /// rows included. Returns how many rows were staged for deletion.
    ///
    /// # Errors
    ///
    /// Fails when the engine rejects the scan.
    pub fn delete_all(&self) -> AccessResult<u64> {
        self.db
            .with_session(|session| session.delete_all(Self::type_name()))
    }

    /// Commits the shared session's transaction. See [`Db::commit`].
    ///
    /// # Errors
    ///
    /// See [`Db::commit`].
    pub fn commit(&self) -> AccessResult<bool> {
        self.db.commit()
    }

    /// Rolls back the shared session's transaction. See [`Db::rollback`].
    ///
    /// # Errors
    ///
    /// See [`Db::rollback`].
    pub fn rollback(&self) -> AccessResult<()> {
        self.db.rollback()
    }

    /// Commits and releases the shared session. See [`Db::close_session`].
    ///
    /// # Errors
    ///
    /// See [`Db::close_session`].
    pub fn close_session(&self) -> AccessResult<()> {
        self.db.close_session()
    }
}

impl<E: Persistent> fmt::Debug for Dao<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dao<{}>", Self::type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{self, book, Book};
    use portico_model::Value;
    use portico_store::{EngineError, MemoryEngine};

    fn dao_over(db: &Db) -> Dao<Book> {
        Dao::new(db)
    }

    #[test]
    fn save_inserts_and_assigns_a_key() {
        let dao = dao_over(&testutil::db());

        let mut dune = book("Dune", 412);
        assert!(dao.save(&mut dune).unwrap());
        let key = dune.key.unwrap();

        let found = dao.fetch(key).unwrap().unwrap();
        assert_eq!(found, dune);
    }

    #[test]
    fn save_updates_in_place() {
        let dao = dao_over(&testutil::db());

        let mut dune = book("Dune", 412);
        dao.save(&mut dune).unwrap();
        assert!(dao.commit().unwrap());

        dune.pages = 604;
        assert!(dao.save(&mut dune).unwrap());
        assert!(dao.commit().unwrap());

        let found = dao.fetch(dune.key.unwrap()).unwrap().unwrap();
        assert_eq!(found.pages, 604);
    }

    #[test]
    fn stale_save_returns_false_and_refreshes_the_entity() {
        let engine = testutil::engine();
        let first = dao_over(&testutil::db_over(&engine));
        let second = dao_over(&testutil::db_over(&engine));

        let mut original = book("Dune", 412);
        first.save(&mut original).unwrap();
        assert!(first.commit().unwrap());
        let key = original.key.unwrap();

        // both sessions load the row, then the second one wins the race
        let mut mine = first.fetch(key).unwrap().unwrap();
        let mut theirs = second.fetch(key).unwrap().unwrap();
        theirs.pages = 500;
        second.save(&mut theirs).unwrap();
        assert!(second.commit().unwrap());

        mine.pages = 999;
        assert!(!first.save(&mut mine).unwrap());
        // refreshed to the committed winner, not left at the rejected state
        assert_eq!(mine.pages, 500);

        // the refresh re-based the session, so the retry goes through
        mine.pages = 999;
        assert!(first.save(&mut mine).unwrap());
        assert!(first.commit().unwrap());
        assert_eq!(second.fetch(key).unwrap().unwrap().pages, 999);
    }

    #[test]
    fn stale_save_against_a_deleted_row_leaves_the_entity() {
        let engine = testutil::engine();
        let first = dao_over(&testutil::db_over(&engine));
        let second = dao_over(&testutil::db_over(&engine));

        let mut original = book("Dune", 412);
        first.save(&mut original).unwrap();
        assert!(first.commit().unwrap());
        let key = original.key.unwrap();

        let mut mine = first.fetch(key).unwrap().unwrap();
        second.delete(&second.fetch(key).unwrap().unwrap()).unwrap();
        assert!(second.commit().unwrap());

        mine.pages = 999;
        assert!(!first.save(&mut mine).unwrap());
        assert_eq!(mine.pages, 999);
    }

    #[test]
    fn fatal_save_abandons_the_session() {
        // an engine with no registered types rejects the save outright
        let bare = MemoryEngine::builder().build().unwrap();
        let db = testutil::db_over(&bare);
        let dao = dao_over(&db);

        let mut dune = book("Dune", 412);
        let err = dao.save(&mut dune).unwrap_err();
        assert!(matches!(
            err,
            AccessError::Engine(EngineError::UnknownEntity { .. })
        ));
        assert!(!db.has_session());
    }

    #[test]
    fn fetch_missing_is_none() {
        let dao = dao_over(&testutil::db());
        assert_eq!(dao.fetch(Key::new(404)).unwrap(), None);
    }

    #[test]
    fn fetch_all_sees_pending_writes() {
        let dao = dao_over(&testutil::db());

        for (title, pages) in [("Dune", 412), ("Emma", 474), ("Ivanhoe", 527)] {
            dao.save(&mut book(title, pages)).unwrap();
        }
        assert!(dao.commit().unwrap());
        dao.save(&mut book("Persuasion", 249)).unwrap();

        let all = dao.fetch_all().unwrap();
        let titles: Vec<&str> = all.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, ["Dune", "Emma", "Ivanhoe", "Persuasion"]);
    }

    #[test]
    fn find_projects_scalars() {
        let dao = dao_over(&testutil::db());
        for (title, pages) in [("Dune", 412), ("Emma", 474), ("Pnin", 191)] {
            dao.save(&mut book(title, pages)).unwrap();
        }

        let rows = dao
            .find("select title from Book where pages > 200 order by title desc")
            .unwrap();
        let titles: Vec<&Value> = rows.iter().filter_map(QueryRow::as_scalar).collect();
        assert_eq!(
            titles,
            [&Value::Text("Emma".into()), &Value::Text("Dune".into())]
        );
    }

    #[test]
    fn find_with_binds_parameters() {
        let dao = dao_over(&testutil::db());
        for (title, pages) in [("Dune", 412), ("Pnin", 191)] {
            dao.save(&mut book(title, pages)).unwrap();
        }

        let params = Params::new().bind("limit", 200i64);
        let rows = dao
            .find_with("from Book where pages < :limit", &params)
            .unwrap();
        assert_eq!(rows.len(), 1);
        let record = rows[0].as_entity().unwrap();
        assert_eq!(record.value("title"), &Value::Text("Pnin".into()));
    }

    #[test]
    fn find_by_example_matches_on_set_attributes() {
        let dao = dao_over(&testutil::db());
        for (title, pages) in [("Dune", 412), ("Dracula", 418), ("Emma", 474)] {
            dao.save(&mut book(title, pages)).unwrap();
        }

        // pages 0 counts as unset and filters nothing
        let sample = book("D%", 0);
        let matches = dao.find_by_example(&sample).unwrap();
        let titles: Vec<&str> = matches.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, ["Dune", "Dracula"]);
    }

    #[test]
    fn find_by_example_excluding_drops_criteria() {
        let dao = dao_over(&testutil::db());
        for (title, pages) in [("Dune", 412), ("Emma", 474)] {
            dao.save(&mut book(title, pages)).unwrap();
        }

        let sample = book("D%", 0);
        let all = dao.find_by_example_excluding(&sample, &["title"]).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn delete_requires_a_key() {
        let dao = dao_over(&testutil::db());
        assert_eq!(dao.delete(&book("Dune", 412)), Err(AccessError::MissingKey));
    }

    #[test]
    fn delete_and_delete_all() {
        let engine = testutil::engine();
        let dao = dao_over(&testutil::db_over(&engine));

        let mut dune = book("Dune", 412);
        dao.save(&mut dune).unwrap();
        dao.save(&mut book("Emma", 474)).unwrap();
        dao.save(&mut book("Pnin", 191)).unwrap();
        assert!(dao.commit().unwrap());

        dao.delete(&dune).unwrap();
        assert_eq!(dao.fetch(dune.key.unwrap()).unwrap(), None);
        assert_eq!(dao.delete_all().unwrap(), 2);
        assert!(dao.commit().unwrap());
        assert_eq!(engine.committed_count("Book").unwrap(), 0);
    }

    #[test]
    fn rollback_discards_staged_writes() {
        let dao = dao_over(&testutil::db());

        let mut dune = book("Dune", 412);
        dao.save(&mut dune).unwrap();
        dao.rollback().unwrap();

        assert_eq!(dao.fetch(dune.key.unwrap()).unwrap(), None);
    }
}
