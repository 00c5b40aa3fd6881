//! Batched iteration with per-page cursors.

use std::marker::PhantomData;

use portico_model::Persistent;

use crate::db::Db;
use crate::error::AccessResult;

/// A forward-only sequence of entity batches.
///
/// Every call to [`next`](Iterator::next) opens a fresh cursor
/// positioned past the rows already produced, reads at most `page_size`
/// rows, and closes the cursor before the batch is returned. No engine
/// resource outlives the call, so the iterator can be dropped at any
/// point without cleanup.
///
/// The sequence ends after the first short or empty batch. It fuses on
/// error: a failed page is yielded once and ends the iteration.
pub struct PageIter<E: Persistent> {
    db: Db,
    page_size: usize,
    predicate: Option<String>,
    /// Rows consumed so far, including the initial skip.
    scroll_index: u64,
    finished: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Persistent> PageIter<E> {
    pub(crate) fn new(db: Db, page_size: usize, start_row: u64, predicate: Option<String>) -> Self {
        PageIter {
            db,
            page_size,
            predicate,
            scroll_index: start_row,
            finished: false,
            _entity: PhantomData,
        }
    }

    fn read_page(&mut self) -> AccessResult<Vec<E>> {
        let records = self.db.with_session(|session| {
            let cursor =
                session.open_cursor(E::def().name, self.predicate.as_deref(), self.scroll_index)?;
            let mut records = Vec::with_capacity(self.page_size.min(64));
            let outcome = loop {
                if records.len() >= self.page_size {
                    break Ok(());
                }
                match session.advance(cursor) {
                    Ok(Some(record)) => records.push(record),
                    Ok(None) => break Ok(()),
                    Err(err) => break Err(err),
                }
            };
            // release the cursor before surfacing any error
            session.close_cursor(cursor)?;
            outcome?;
            Ok(records)
        })?;

        let mut page = Vec::with_capacity(records.len());
        for record in &records {
            page.push(E::from_record(record)?);
        }
        self.scroll_index += records.len() as u64;
        Ok(page)
    }
}

impl<E: Persistent> Iterator for PageIter<E> {
    type Item = AccessResult<Vec<E>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_page() {
            Ok(page) => {
                if page.len() < self.page_size {
                    self.finished = true;
                }
                if page.is_empty() {
                    self.finished = true;
                    None
                } else {
                    Some(Ok(page))
                }
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}
