//! The embedded in-memory engine.
//!
//! A complete, in-process implementation of the [`Engine`]/[`Session`]
//! contract, used by tests and demos. It keeps one versioned table per
//! registered hierarchy root, stages writes per session, and detects
//! write conflicts through row versions both at save time and again at
//! commit.
//!
//! # Example
//!
//! ```ignore
//! let engine = MemoryEngine::builder()
//!     .register(&ADDRESS)
//!     .config(StoreConfig::new().max_open_cursors(8))
//!     .build()?;
//! let mut session = engine.open_session()?;
//! ```

mod session;
mod store;

use std::sync::Arc;

use portico_model::EntityDef;
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::{EngineError, EngineResult};
use crate::session::{Engine, Session};

use self::session::MemorySession;
use self::store::{Registry, StoreInner};

/// The embedded in-memory storage engine.
///
/// Cloning is cheap and every clone shares the same tables; hand one
/// clone to a database handle and keep another for inspection. Entity
/// hierarchies must be registered up front through the
/// [builder](MemoryEngine::builder); operations naming anything else
/// fail with [`EngineError::UnknownEntity`].
///
/// # Thread Safety
///
/// The engine is `Send + Sync`. Sessions are independent and carry their
/// own staged state; the shared tables sit behind a `parking_lot`
/// read-write lock that protects memory, not transactional ordering.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    inner: Arc<StoreInner>,
}

impl MemoryEngine {
    /// Starts building an engine.
    #[must_use]
    pub fn builder() -> MemoryEngineBuilder {
        MemoryEngineBuilder::default()
    }

    /// Number of committed rows visible through `entity`, subtype rows
    /// included. Pending writes of open sessions are not counted.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::UnknownEntity`] for unregistered names.
    pub fn committed_count(&self, entity: &str) -> EngineResult<u64> {
        self.inner.committed_count(entity)
    }
}

impl Engine for MemoryEngine {
    fn open_session(&self) -> EngineResult<Box<dyn Session>> {
        if !self.inner.is_open() {
            return Err(EngineError::Closed);
        }
        Ok(Box::new(MemorySession::new(Arc::clone(&self.inner))))
    }

    fn close(&self) -> EngineResult<()> {
        self.inner.close();
        debug!("engine closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn open_cursors(&self) -> usize {
        self.inner.open_cursors.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Builder for [`MemoryEngine`].
#[derive(Debug, Default)]
pub struct MemoryEngineBuilder {
    registered: Vec<&'static EntityDef>,
    config: StoreConfig,
}

impl MemoryEngineBuilder {
    /// Registers an entity hierarchy. Registering any level registers
    /// its whole chain, so registering a subtype is enough to create the
    /// root's table.
    #[must_use]
    pub fn register(mut self, def: &'static EntityDef) -> Self {
        self.registered.push(def);
        self
    }

    /// Replaces the engine configuration.
    #[must_use]
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the registered definitions and builds the engine.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::Registration`] when definitions collide
    /// by name, a root names no identity attribute, a non-root names
    /// one, or declared attributes clash.
    pub fn build(self) -> EngineResult<MemoryEngine> {
        let registry = Registry::build(&self.registered)?;
        let inner = Arc::new(StoreInner::new(registry, self.config));
        debug!("engine built");
        Ok(MemoryEngine { inner })
    }
}

#[cfg(test)]
mod tests {
    use portico_model::{AttrDef, AttrKind, Record};

    use super::*;

    static ITEM: EntityDef = EntityDef {
        name: "Item",
        parent: None,
        key_attr: Some("id"),
        declared: &[AttrDef::new("label", AttrKind::Text)],
    };

    #[test]
    fn build_registers_and_opens() {
        let engine = MemoryEngine::builder().register(&ITEM).build().unwrap();
        assert!(engine.is_open());
        assert_eq!(engine.open_cursors(), 0);
        assert_eq!(engine.committed_count("Item").unwrap(), 0);
        assert!(engine.committed_count("Other").is_err());
    }

    #[test]
    fn build_rejects_invalid_definitions() {
        static BROKEN: EntityDef = EntityDef {
            name: "Broken",
            parent: None,
            key_attr: None,
            declared: &[],
        };
        let err = MemoryEngine::builder().register(&BROKEN).build().unwrap_err();
        assert!(matches!(err, EngineError::Registration { .. }));
    }

    #[test]
    fn close_is_process_wide() {
        let engine = MemoryEngine::builder().register(&ITEM).build().unwrap();
        let mut session = engine.open_session().unwrap();
        engine.close().unwrap();
        assert!(!engine.is_open());
        assert!(engine.open_session().is_err());
        assert!(session.save(&Record::new("Item")).is_err());
    }

    #[test]
    fn committed_count_ignores_pending_writes() {
        let engine = MemoryEngine::builder().register(&ITEM).build().unwrap();
        let mut session = engine.open_session().unwrap();
        session.save(&Record::new("Item")).unwrap();
        assert_eq!(engine.committed_count("Item").unwrap(), 0);
        session.commit().unwrap();
        assert_eq!(engine.committed_count("Item").unwrap(), 1);
    }
}
