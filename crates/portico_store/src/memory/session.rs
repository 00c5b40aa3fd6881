//! Session state: pending writes, staleness tracking, cursors.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use portico_model::{Key, Record};
use tracing::debug;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::query::{self, check_attribute, read_attribute, CmpOp, EvalContext, Expr, Operand};
use crate::session::{Criterion, CriterionOp, CursorId, Params, QueryRow, Session};

use super::store::{Pending, StoreInner};

/// A materialized cursor: the merged scan snapshotted at open time.
#[derive(Debug)]
struct CursorState {
    rows: Vec<Record>,
    pos: usize,
}

/// One unit of work against a [`MemoryEngine`](super::MemoryEngine).
///
/// Reads overlay the session's own staged writes over committed state;
/// other sessions never see staged writes. The session records the store
/// version of every row it reads and refuses writes whose recorded
/// version has been overtaken.
#[derive(Debug)]
pub(crate) struct MemorySession {
    id: Uuid,
    store: Arc<StoreInner>,
    pending: BTreeMap<(&'static str, Key), Pending>,
    loaded: HashMap<(&'static str, Key), u64>,
    cursors: HashMap<CursorId, CursorState>,
    next_cursor: u64,
}

impl MemorySession {
    pub(crate) fn new(store: Arc<StoreInner>) -> Self {
        let id = Uuid::new_v4();
        debug!(session = %id, "session opened");
        Self {
            id,
            store,
            pending: BTreeMap::new(),
            loaded: HashMap::new(),
            cursors: HashMap::new(),
            next_cursor: 1,
        }
    }

    fn guard(&self) -> EngineResult<()> {
        if self.store.is_open() {
            Ok(())
        } else {
            Err(EngineError::Closed)
        }
    }

    /// Validates an update against the version this session last loaded
    /// and returns the base version a fresh stage should carry.
    fn check_staleness(
        &self,
        root: &'static str,
        key: Key,
        tag: &str,
    ) -> EngineResult<Option<u64>> {
        match self.store.committed(root, key)? {
            Some(row) => {
                if row.record.entity() != tag {
                    return Err(EngineError::internal(format!(
                        "row {key} in '{root}' holds a '{}', not a '{tag}'",
                        row.record.entity()
                    )));
                }
                if let Some(&loaded) = self.loaded.get(&(root, key)) {
                    if loaded != row.version {
                        return Err(EngineError::stale_object(tag, key));
                    }
                }
                Ok(Some(row.version))
            }
            None => {
                if self.loaded.contains_key(&(root, key)) {
                    // loaded earlier, deleted underneath us since
                    return Err(EngineError::stale_object(tag, key));
                }
                // insert at a pre-assigned key
                self.store.reserve_at(root, key)?;
                Ok(None)
            }
        }
    }

    /// Stages a delete if the row is visible through `bound`. Returns
    /// whether anything was staged or unstaged.
    fn stage_delete(&mut self, root: &'static str, bound: &str, key: Key) -> EngineResult<bool> {
        match self.pending.get(&(root, key)) {
            Some(Pending::Put { base: None, .. }) => {
                // deleting a staged insert unstages it
                self.pending.remove(&(root, key));
                return Ok(true);
            }
            Some(Pending::Put {
                base: Some(version),
                ..
            }) => {
                let base = Some(*version);
                self.pending.insert((root, key), Pending::Delete { base });
                return Ok(true);
            }
            Some(Pending::Delete { .. }) => return Ok(true),
            None => {}
        }
        match self.store.committed(root, key)? {
            Some(row) if self.store.registry().tag_extends(row.record.entity(), bound) => {
                let base = self.loaded.get(&(root, key)).copied();
                self.pending.insert((root, key), Pending::Delete { base });
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// The session's merged view of one root table, filtered to rows
    /// visible through `bound`, in key order. Store-sourced rows record
    /// their version in the loaded map.
    fn merged_scan(&mut self, bound: &str, root: &'static str) -> EngineResult<Vec<Record>> {
        let mut merged: BTreeMap<Key, (Record, Option<u64>)> = BTreeMap::new();
        for row in self.store.committed_scan(root)? {
            let Some(key) = row.record.key() else { continue };
            merged.insert(key, (row.record, Some(row.version)));
        }
        for (&(pending_root, key), op) in &self.pending {
            if pending_root != root {
                continue;
            }
            match op {
                Pending::Put { record, .. } => {
                    let mut record = record.clone();
                    record.set_key(key);
                    merged.insert(key, (record, None));
                }
                Pending::Delete { .. } => {
                    merged.remove(&key);
                }
            }
        }
        let mut rows = Vec::new();
        for (key, (record, version)) in merged {
            if !self.store.registry().tag_extends(record.entity(), bound) {
                continue;
            }
            if let Some(version) = version {
                self.loaded.insert((root, key), version);
            }
            rows.push(record);
        }
        Ok(rows)
    }
}

impl Session for MemorySession {
    fn save(&mut self, record: &Record) -> EngineResult<Key> {
        self.guard()?;
        let def = self.store.registry().lookup(record.entity())?;
        let root = def.root().name;

        let (key, base) = match record.key() {
            None => (self.store.reserve_key(root)?, None),
            Some(key) => (key, self.check_staleness(root, key, record.entity())?),
        };

        let mut staged = record.clone();
        staged.set_key(key);

        // coalescing keeps the base of the earliest staged write
        let base = match self.pending.get(&(root, key)) {
            Some(Pending::Put { base: original, .. } | Pending::Delete { base: original }) => {
                *original
            }
            None => base,
        };
        self.pending.insert(
            (root, key),
            Pending::Put {
                record: staged,
                base,
            },
        );
        debug!(session = %self.id, entity = record.entity(), %key, "write staged");
        Ok(key)
    }

    fn get(&mut self, entity: &str, key: Key) -> EngineResult<Option<Record>> {
        self.guard()?;
        let def = self.store.registry().lookup(entity)?;
        let root = def.root().name;

        if let Some(op) = self.pending.get(&(root, key)) {
            return Ok(match op {
                Pending::Delete { .. } => None,
                Pending::Put { record, .. } => {
                    if self.store.registry().tag_extends(record.entity(), entity) {
                        let mut record = record.clone();
                        record.set_key(key);
                        Some(record)
                    } else {
                        None
                    }
                }
            });
        }

        match self.store.committed(root, key)? {
            Some(row) if self.store.registry().tag_extends(row.record.entity(), entity) => {
                self.loaded.insert((root, key), row.version);
                Ok(Some(row.record))
            }
            _ => Ok(None),
        }
    }

    fn refresh(&mut self, entity: &str, key: Key) -> EngineResult<Option<Record>> {
        self.guard()?;
        let def = self.store.registry().lookup(entity)?;
        let root = def.root().name;
        self.pending.remove(&(root, key));
        match self.store.committed(root, key)? {
            Some(row) if self.store.registry().tag_extends(row.record.entity(), entity) => {
                self.loaded.insert((root, key), row.version);
                Ok(Some(row.record))
            }
            _ => {
                self.loaded.remove(&(root, key));
                Ok(None)
            }
        }
    }

    fn delete(&mut self, entity: &str, key: Key) -> EngineResult<()> {
        self.guard()?;
        let def = self.store.registry().lookup(entity)?;
        let root = def.root().name;
        self.stage_delete(root, entity, key)?;
        Ok(())
    }

    fn delete_all(&mut self, entity: &str) -> EngineResult<u64> {
        self.guard()?;
        let def = self.store.registry().lookup(entity)?;
        let root = def.root().name;
        let rows = self.merged_scan(entity, root)?;
        let mut staged = 0u64;
        for record in rows {
            let Some(key) = record.key() else { continue };
            if self.stage_delete(root, entity, key)? {
                staged += 1;
            }
        }
        debug!(session = %self.id, entity, staged, "bulk delete staged");
        Ok(staged)
    }

    fn query(&mut self, text: &str, params: &Params) -> EngineResult<Vec<QueryRow>> {
        self.guard()?;
        let parsed = query::parse(text)?;
        let def = self.store.registry().lookup(&parsed.entity)?;
        let root = def.root().name;
        query::validate(&parsed, def, params)?;

        let rows = self.merged_scan(def.name, root)?;
        let ctx = EvalContext {
            def,
            params,
            like_case_insensitive: self.store.config().like_case_insensitive,
        };
        let mut kept = Vec::new();
        for record in rows {
            let keep = match &parsed.filter {
                Some(filter) => ctx.matches(filter, &record)?,
                None => true,
            };
            if keep {
                kept.push(record);
            }
        }
        if let Some(order) = &parsed.order {
            ctx.sort(&mut kept, order);
        }
        Ok(match &parsed.projection {
            Some(attribute) => kept
                .into_iter()
                .map(|record| QueryRow::Scalar(read_attribute(&record, def, attribute)))
                .collect(),
            None => kept.into_iter().map(QueryRow::Entity).collect(),
        })
    }

    fn query_by(&mut self, entity: &str, criteria: &[Criterion]) -> EngineResult<Vec<Record>> {
        self.guard()?;
        let def = self.store.registry().lookup(entity)?;
        let root = def.root().name;

        let mut exprs = Vec::with_capacity(criteria.len());
        for criterion in criteria {
            check_attribute(def, &criterion.attribute)?;
            exprs.push(Expr::Cmp {
                attribute: criterion.attribute.clone(),
                op: match criterion.op {
                    CriterionOp::Eq => CmpOp::Eq,
                    CriterionOp::Like => CmpOp::Like,
                },
                operand: Operand::Literal(criterion.value.clone()),
            });
        }

        let rows = self.merged_scan(def.name, root)?;
        let params = Params::new();
        let ctx = EvalContext {
            def,
            params: &params,
            like_case_insensitive: self.store.config().like_case_insensitive,
        };
        let mut kept = Vec::new();
        'rows: for record in rows {
            for expr in &exprs {
                if !ctx.matches(expr, &record)? {
                    continue 'rows;
                }
            }
            kept.push(record);
        }
        Ok(kept)
    }

    fn open_cursor(
        &mut self,
        entity: &str,
        predicate: Option<&str>,
        skip: u64,
    ) -> EngineResult<CursorId> {
        let text = match predicate {
            Some(predicate) => format!("from {entity} {predicate}"),
            None => format!("from {entity}"),
        };
        let rows = self.query(&text, &Params::new())?;

        let limit = self.store.config().max_open_cursors;
        let before = self.store.open_cursors.fetch_add(1, Ordering::SeqCst);
        if before >= limit {
            self.store.open_cursors.fetch_sub(1, Ordering::SeqCst);
            return Err(EngineError::CursorLimit { limit });
        }

        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let rows: Vec<Record> = rows
            .into_iter()
            .filter_map(|row| match row {
                QueryRow::Entity(record) => Some(record),
                QueryRow::Scalar(_) => None,
            })
            .skip(skip)
            .collect();

        let id = CursorId::new(self.next_cursor);
        self.next_cursor += 1;
        self.cursors.insert(id, CursorState { rows, pos: 0 });
        debug!(session = %self.id, cursor = %id, entity, "cursor opened");
        Ok(id)
    }

    fn advance(&mut self, cursor: CursorId) -> EngineResult<Option<Record>> {
        self.guard()?;
        let state = self
            .cursors
            .get_mut(&cursor)
            .ok_or(EngineError::InvalidCursor { cursor })?;
        if state.pos >= state.rows.len() {
            return Ok(None);
        }
        let record = state.rows[state.pos].clone();
        state.pos += 1;
        Ok(Some(record))
    }

    fn close_cursor(&mut self, cursor: CursorId) -> EngineResult<()> {
        // cursor cleanup stays possible after engine close
        if self.cursors.remove(&cursor).is_none() {
            return Err(EngineError::InvalidCursor { cursor });
        }
        self.store.open_cursors.fetch_sub(1, Ordering::SeqCst);
        debug!(session = %self.id, cursor = %cursor, "cursor closed");
        Ok(())
    }

    fn commit(&mut self) -> EngineResult<()> {
        self.guard()?;
        if self.pending.is_empty() {
            return Ok(());
        }
        let outcomes = self.store.commit(&self.pending)?;
        let applied = outcomes.len();
        for ((root, key), version) in outcomes {
            match version {
                Some(version) => {
                    self.loaded.insert((root, key), version);
                }
                None => {
                    self.loaded.remove(&(root, key));
                }
            }
        }
        self.pending.clear();
        debug!(session = %self.id, applied, "transaction committed");
        Ok(())
    }

    fn rollback(&mut self) -> EngineResult<()> {
        self.guard()?;
        let discarded = self.pending.len();
        self.pending.clear();
        debug!(session = %self.id, discarded, "transaction rolled back");
        Ok(())
    }

    fn open_cursors(&self) -> usize {
        self.cursors.len()
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        let open = self.cursors.len();
        if open > 0 {
            self.store.open_cursors.fetch_sub(open, Ordering::SeqCst);
        }
        debug!(session = %self.id, released_cursors = open, "session closed");
    }
}
