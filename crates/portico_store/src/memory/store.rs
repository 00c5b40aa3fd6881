//! Shared engine state: the entity registry and versioned tables.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;
use portico_model::{EntityDef, Key, Record};

use crate::config::StoreConfig;
use crate::error::{EngineError, EngineResult};

/// Registered entity definitions, keyed by level name.
///
/// Built once by the engine builder and immutable afterwards, so lookups
/// need no locking.
#[derive(Debug)]
pub(crate) struct Registry {
    defs: HashMap<&'static str, &'static EntityDef>,
}

impl Registry {
    /// Builds a registry from the registered definitions. Registering any
    /// level of a hierarchy registers its whole chain up to the root.
    pub(crate) fn build(registered: &[&'static EntityDef]) -> EngineResult<Self> {
        let mut defs: HashMap<&'static str, &'static EntityDef> = HashMap::new();
        for def in registered {
            for level in def.chain() {
                if let Some(existing) = defs.get(level.name) {
                    if std::ptr::eq(*existing, level) {
                        continue;
                    }
                    return Err(EngineError::registration(format!(
                        "entity name '{}' is declared by two different definitions",
                        level.name
                    )));
                }
                Self::check_level(level)?;
                defs.insert(level.name, level);
            }
        }
        Ok(Self { defs })
    }

    fn check_level(level: &'static EntityDef) -> EngineResult<()> {
        if level.parent.is_none() && level.key_attr.is_none() {
            return Err(EngineError::registration(format!(
                "root entity '{}' names no identity attribute",
                level.name
            )));
        }
        if level.parent.is_some() && level.key_attr.is_some() {
            return Err(EngineError::registration(format!(
                "'{}' is not a root level and must not name an identity attribute",
                level.name
            )));
        }
        for (i, attr) in level.declared.iter().enumerate() {
            if level.declared[..i].iter().any(|a| a.name == attr.name) {
                return Err(EngineError::registration(format!(
                    "'{}' declares attribute '{}' twice",
                    level.name, attr.name
                )));
            }
        }
        if let Some(key) = level.key_attribute() {
            if level.declared.iter().any(|a| a.name == key) {
                return Err(EngineError::registration(format!(
                    "identity attribute '{}' of '{}' must not appear among declared attributes",
                    key, level.name
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn lookup(&self, name: &str) -> EngineResult<&'static EntityDef> {
        self.defs
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::unknown_entity(name))
    }

    /// Whether a row tagged `tag` is visible through a dao bound to
    /// `ancestor`. Unregistered tags are never visible.
    pub(crate) fn tag_extends(&self, tag: &str, ancestor: &str) -> bool {
        self.defs.get(tag).is_some_and(|def| def.extends(ancestor))
    }

    pub(crate) fn roots(&self) -> impl Iterator<Item = &'static EntityDef> + '_ {
        self.defs
            .values()
            .copied()
            .filter(|def| def.parent.is_none())
    }
}

/// One committed row.
#[derive(Debug, Clone)]
pub(crate) struct VersionedRow {
    /// The stored record; its entity name is the concrete tag.
    pub record: Record,
    /// Bumped by one on every committed write.
    pub version: u64,
}

/// One root's rows plus its key sequence.
#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<Key, VersionedRow>,
    next_key: u64,
}

impl Table {
    fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_key: 1,
        }
    }
}

/// A write staged by a session, applied on commit.
///
/// `base` is the store version the write was staged against: `None` for
/// inserts and for writes against rows this session never loaded.
#[derive(Debug, Clone)]
pub(crate) enum Pending {
    Put {
        record: Record,
        base: Option<u64>,
    },
    Delete {
        base: Option<u64>,
    },
}

/// Engine state shared by all sessions.
#[derive(Debug)]
pub(crate) struct StoreInner {
    registry: Registry,
    config: StoreConfig,
    tables: RwLock<HashMap<&'static str, Table>>,
    open: AtomicBool,
    pub(crate) open_cursors: AtomicUsize,
}

impl StoreInner {
    pub(crate) fn new(registry: Registry, config: StoreConfig) -> Self {
        let tables = registry
            .roots()
            .map(|root| (root.name, Table::new()))
            .collect();
        Self {
            registry,
            config,
            tables: RwLock::new(tables),
            open: AtomicBool::new(true),
            open_cursors: AtomicUsize::new(0),
        }
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub(crate) fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Draws the next key from a root's sequence. Reserved keys are never
    /// handed out again, committed or not.
    pub(crate) fn reserve_key(&self, root: &'static str) -> EngineResult<Key> {
        let mut tables = self.tables.write();
        let table = Self::table_mut(&mut tables, root)?;
        let key = Key::new(table.next_key);
        table.next_key += 1;
        Ok(key)
    }

    /// Advances a root's sequence past a pre-assigned key.
    pub(crate) fn reserve_at(&self, root: &'static str, key: Key) -> EngineResult<()> {
        let mut tables = self.tables.write();
        let table = Self::table_mut(&mut tables, root)?;
        if key.as_u64() >= table.next_key {
            table.next_key = key.as_u64() + 1;
        }
        Ok(())
    }

    pub(crate) fn committed(
        &self,
        root: &'static str,
        key: Key,
    ) -> EngineResult<Option<VersionedRow>> {
        let tables = self.tables.read();
        let table = Self::table(&tables, root)?;
        Ok(table.rows.get(&key).cloned())
    }

    /// Every committed row of a root's table, in key order.
    pub(crate) fn committed_scan(&self, root: &'static str) -> EngineResult<Vec<VersionedRow>> {
        let tables = self.tables.read();
        let table = Self::table(&tables, root)?;
        Ok(table.rows.values().cloned().collect())
    }

    /// Committed rows visible through `entity`, honoring subtype tags.
    pub(crate) fn committed_count(&self, entity: &str) -> EngineResult<u64> {
        let def = self.registry.lookup(entity)?;
        let root = def.root().name;
        let tables = self.tables.read();
        let table = Self::table(&tables, root)?;
        let count = table
            .rows
            .values()
            .filter(|row| self.registry.tag_extends(row.record.entity(), entity))
            .count();
        Ok(count as u64)
    }

    /// Validates and applies one session's staged writes atomically.
    ///
    /// Validation and application happen under a single write lock, so a
    /// successful commit is never invalidated by a racing one. On
    /// conflict nothing is applied. Returns the new version per applied
    /// key (`None` for deletes), for the session to re-base on.
    pub(crate) fn commit(
        &self,
        pending: &BTreeMap<(&'static str, Key), Pending>,
    ) -> EngineResult<Vec<((&'static str, Key), Option<u64>)>> {
        let mut tables = self.tables.write();

        for (&(root, key), op) in pending {
            let table = Self::table(&tables, root)?;
            let current = table.rows.get(&key);
            match op {
                Pending::Put { base: None, .. } => {
                    // insert: the key must still be free
                    if current.is_some() {
                        return Err(EngineError::commit_conflict(root, key));
                    }
                }
                Pending::Put {
                    base: Some(version),
                    ..
                } => match current {
                    Some(row) if row.version == *version => {}
                    _ => return Err(EngineError::commit_conflict(root, key)),
                },
                Pending::Delete {
                    base: Some(version),
                } => {
                    // deleting an already-deleted row is fine
                    if let Some(row) = current {
                        if row.version != *version {
                            return Err(EngineError::commit_conflict(root, key));
                        }
                    }
                }
                Pending::Delete { base: None } => {}
            }
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        for (&(root, key), op) in pending {
            let table = Self::table_mut(&mut tables, root)?;
            match op {
                Pending::Put { record, .. } => {
                    let version = table.rows.get(&key).map_or(1, |row| row.version + 1);
                    let mut record = record.clone();
                    record.set_key(key);
                    table.rows.insert(key, VersionedRow { record, version });
                    outcomes.push(((root, key), Some(version)));
                }
                Pending::Delete { .. } => {
                    table.rows.remove(&key);
                    outcomes.push(((root, key), None));
                }
            }
        }
        Ok(outcomes)
    }

    fn table<'t>(
        tables: &'t HashMap<&'static str, Table>,
        root: &'static str,
    ) -> EngineResult<&'t Table> {
        tables
            .get(root)
            .ok_or_else(|| EngineError::internal(format!("no table for root '{root}'")))
    }

    fn table_mut<'t>(
        tables: &'t mut HashMap<&'static str, Table>,
        root: &'static str,
    ) -> EngineResult<&'t mut Table> {
        tables
            .get_mut(root)
            .ok_or_else(|| EngineError::internal(format!("no table for root '{root}'")))
    }
}

#[cfg(test)]
mod tests {
    use portico_model::{AttrDef, AttrKind};

    use super::*;

    static PLAIN: EntityDef = EntityDef {
        name: "Plain",
        parent: None,
        key_attr: Some("id"),
        declared: &[AttrDef::new("label", AttrKind::Text)],
    };

    static KEYLESS: EntityDef = EntityDef {
        name: "Keyless",
        parent: None,
        key_attr: None,
        declared: &[],
    };

    static KEYED_CHILD: EntityDef = EntityDef {
        name: "KeyedChild",
        parent: Some(&PLAIN),
        key_attr: Some("other"),
        declared: &[],
    };

    static DOUBLED: EntityDef = EntityDef {
        name: "Doubled",
        parent: None,
        key_attr: Some("id"),
        declared: &[
            AttrDef::new("label", AttrKind::Text),
            AttrDef::new("label", AttrKind::Int),
        ],
    };

    static KEY_DECLARED: EntityDef = EntityDef {
        name: "KeyDeclared",
        parent: None,
        key_attr: Some("id"),
        declared: &[AttrDef::new("id", AttrKind::Int)],
    };

    #[test]
    fn registry_accepts_a_chain_once() {
        static CHILD: EntityDef = EntityDef {
            name: "Child",
            parent: Some(&PLAIN),
            key_attr: None,
            declared: &[],
        };
        // registering the child twice registers Plain once
        let registry = Registry::build(&[&CHILD, &CHILD]).unwrap();
        assert!(registry.lookup("Plain").is_ok());
        assert!(registry.lookup("Child").is_ok());
        assert!(registry.lookup("Missing").is_err());
        assert!(registry.tag_extends("Child", "Plain"));
        assert!(!registry.tag_extends("Plain", "Child"));
    }

    #[test]
    fn registry_rejects_bad_declarations() {
        assert!(Registry::build(&[&KEYLESS]).is_err());
        assert!(Registry::build(&[&KEYED_CHILD]).is_err());
        assert!(Registry::build(&[&DOUBLED]).is_err());
        assert!(Registry::build(&[&KEY_DECLARED]).is_err());
    }

    #[test]
    fn registry_rejects_name_collisions() {
        static OTHER_PLAIN: EntityDef = EntityDef {
            name: "Plain",
            parent: None,
            key_attr: Some("id"),
            declared: &[],
        };
        assert!(Registry::build(&[&PLAIN, &OTHER_PLAIN]).is_err());
    }

    #[test]
    fn key_sequence_skips_reserved_keys() {
        let registry = Registry::build(&[&PLAIN]).unwrap();
        let store = StoreInner::new(registry, StoreConfig::default());

        assert_eq!(store.reserve_key("Plain").unwrap(), Key::new(1));
        assert_eq!(store.reserve_key("Plain").unwrap(), Key::new(2));
        store.reserve_at("Plain", Key::new(10)).unwrap();
        assert_eq!(store.reserve_key("Plain").unwrap(), Key::new(11));
        // pre-assigned keys below the sequence leave it alone
        store.reserve_at("Plain", Key::new(3)).unwrap();
        assert_eq!(store.reserve_key("Plain").unwrap(), Key::new(12));
    }

    #[test]
    fn commit_applies_all_or_nothing() {
        let registry = Registry::build(&[&PLAIN]).unwrap();
        let store = StoreInner::new(registry, StoreConfig::default());

        let mut first = BTreeMap::new();
        first.insert(
            ("Plain", Key::new(1)),
            Pending::Put {
                record: Record::new("Plain"),
                base: None,
            },
        );
        store.commit(&first).unwrap();
        assert_eq!(store.committed("Plain", Key::new(1)).unwrap().unwrap().version, 1);

        // a batch with one conflicting insert applies nothing
        let mut second = BTreeMap::new();
        second.insert(
            ("Plain", Key::new(1)),
            Pending::Put {
                record: Record::new("Plain"),
                base: None,
            },
        );
        second.insert(
            ("Plain", Key::new(2)),
            Pending::Put {
                record: Record::new("Plain"),
                base: None,
            },
        );
        assert!(store.commit(&second).unwrap_err().is_commit_conflict());
        assert!(store.committed("Plain", Key::new(2)).unwrap().is_none());
    }

    #[test]
    fn commit_checks_base_versions() {
        let registry = Registry::build(&[&PLAIN]).unwrap();
        let store = StoreInner::new(registry, StoreConfig::default());

        let mut insert = BTreeMap::new();
        insert.insert(
            ("Plain", Key::new(1)),
            Pending::Put {
                record: Record::new("Plain"),
                base: None,
            },
        );
        store.commit(&insert).unwrap();

        let mut update = BTreeMap::new();
        update.insert(
            ("Plain", Key::new(1)),
            Pending::Put {
                record: Record::new("Plain"),
                base: Some(1),
            },
        );
        let outcomes = store.commit(&update).unwrap();
        assert_eq!(outcomes, vec![(("Plain", Key::new(1)), Some(2))]);

        // the same base again has lost the race
        assert!(store.commit(&update).unwrap_err().is_commit_conflict());

        // deletes tolerate missing rows but not moved versions
        let mut stale_delete = BTreeMap::new();
        stale_delete.insert(("Plain", Key::new(1)), Pending::Delete { base: Some(1) });
        assert!(store.commit(&stale_delete).unwrap_err().is_commit_conflict());

        let mut delete = BTreeMap::new();
        delete.insert(("Plain", Key::new(1)), Pending::Delete { base: Some(2) });
        store.commit(&delete).unwrap();
        store.commit(&delete).unwrap();
        assert!(store.committed("Plain", Key::new(1)).unwrap().is_none());
    }
}
