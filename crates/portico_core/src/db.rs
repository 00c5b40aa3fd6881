//! Database handle and session lifecycle.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use portico_store::{Engine, EngineResult, Session};

use crate::error::{AccessError, AccessResult};

/// The session slot guarded by the handle's mutex.
struct Slot {
    /// The active session, if one has been acquired.
    session: Option<Box<dyn Session>>,
    /// Set by `close_database`; every later operation fails.
    closed: bool,
}

/// The database handle: a session provider over a storage [`Engine`].
///
/// `Db` owns at most one session at a time and hands it to every
/// [`Dao`](crate::Dao) constructed from the same handle. The session is
/// acquired implicitly by the first operation that needs one and lives
/// until [`close_session`](Db::close_session) or
/// [`close_database`](Db::close_database). Cloning the handle is cheap;
/// all clones share the one session slot.
///
/// # Opening
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use portico_core::{Dao, Db};
/// use portico_store::MemoryEngine;
///
/// let engine = MemoryEngine::builder().register(&USER).build()?;
/// let db = Db::new(Arc::new(engine));
/// let users: Dao<User> = Dao::new(&db);
/// ```
///
/// # Thread Safety
///
/// The slot mutex is held only for the duration of a single engine call,
/// which keeps the handle memory-safe under sharing. It does not make
/// interleaved use coherent: callers that share one `Db` across threads
/// serialize their logical work, or take independent handles over the
/// same engine.
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

struct DbInner {
    engine: Arc<dyn Engine>,
    slot: Mutex<Slot>,
}

impl Db {
    /// Creates a handle over an engine. No session is opened yet.
    #[must_use]
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Db {
            inner: Arc::new(DbInner {
                engine,
                slot: Mutex::new(Slot {
                    session: None,
                    closed: false,
                }),
            }),
        }
    }

    /// Runs one engine call against the active session, opening a
    /// session first if none is active.
    pub(crate) fn with_session<T, F>(&self, f: F) -> AccessResult<T>
    where
        F: FnOnce(&mut dyn Session) -> EngineResult<T>,
    {
        let mut slot = self.inner.slot.lock();
        if slot.closed {
            return Err(AccessError::Closed);
        }
        if slot.session.is_none() {
            slot.session = Some(self.inner.engine.open_session()?);
            debug!("session acquired");
        }
        let Some(session) = slot.session.as_mut() else {
            return Err(AccessError::Closed);
        };
        f(session.as_mut()).map_err(AccessError::from)
    }

    /// Rolls back and releases the active session after a fatal error.
    /// Rollback failures are logged and swallowed; the session is
    /// released either way.
    pub(crate) fn abandon(&self) {
        let mut slot = self.inner.slot.lock();
        if let Some(mut session) = slot.session.take() {
            drop(slot);
            if let Err(err) = session.rollback() {
                warn!(%err, "rollback during session abandonment failed");
            }
            debug!("session abandoned");
        }
    }

    /// Commits the open transaction.
    ///
    /// Returns `Ok(true)` when every staged write applied. When the
    /// engine rejects the commit (another session committed a conflicting
    /// write first, see `EngineError::CommitConflict`) the transaction is
    /// rolled back automatically and the result is `Ok(false)`; nothing
    /// was applied and the session stays usable.
    ///
    /// # Errors
    ///
    /// Fails with [`AccessError::Closed`] after `close_database`, or with
    /// the engine's error when the automatic rollback itself fails.
    pub fn commit(&self) -> AccessResult<bool> {
        match self.with_session(|session| session.commit()) {
            Ok(()) => Ok(true),
            Err(AccessError::Engine(err)) => {
                warn!(%err, "commit failed, rolling back");
                self.with_session(|session| session.rollback())?;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Discards every staged write of the open transaction.
    ///
    /// # Errors
    ///
    /// Fails with [`AccessError::Closed`] after `close_database`.
    pub fn rollback(&self) -> AccessResult<()> {
        self.with_session(|session| session.rollback())
    }

    /// Commits any open transaction, then releases the session.
    ///
    /// Idempotent: with no active session this does nothing. The session
    /// is released even when the final commit fails, so the error tells
    /// the caller their last writes were discarded rather than applied.
    ///
    /// # Errors
    ///
    /// Propagates the final commit's failure.
    pub fn close_session(&self) -> AccessResult<()> {
        let taken = self.inner.slot.lock().session.take();
        if let Some(mut session) = taken {
            session.commit()?;
            debug!("session closed");
        }
        Ok(())
    }

    /// Closes the active session, then shuts the engine down.
    ///
    /// After this call every operation on this handle (and its clones)
    /// fails with [`AccessError::Closed`]. The engine shutdown is
    /// process-wide: sessions of other handles over the same engine stop
    /// working too.
    ///
    /// # Errors
    ///
    /// Propagates the final commit's failure; in that case the engine is
    /// left open and the call can be retried after a rollback.
    pub fn close_database(&self) -> AccessResult<()> {
        self.close_session()?;
        self.inner.slot.lock().closed = true;
        self.inner.engine.close()?;
        debug!("database closed");
        Ok(())
    }

    /// Whether a session is currently active.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.inner.slot.lock().session.is_some()
    }

    /// Whether the handle is still usable.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.inner.slot.lock().closed
    }
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.inner.slot.lock();
        f.debug_struct("Db")
            .field("has_session", &slot.session.is_some())
            .field("closed", &slot.closed)
            .finish_non_exhaustive()
    }
}
