//! Lazy result sequences over engine cursors.
//!
//! Two shapes with different resource contracts:
//!
//! - [`PageIter`] yields batches; every batch opens and closes its own
//!   cursor, so abandoning the iterator anywhere is free.
//! - [`EntityCursor`] yields single entities over one long-lived cursor;
//!   it closes itself on exhaustion, but abandoning it early without
//!   [`EntityCursor::close`] leaks the cursor until the session closes.

mod pages;
mod stream;

pub use pages::PageIter;
pub use stream::EntityCursor;
