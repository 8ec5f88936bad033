//! Forward-only row cursor produced by prefix scans.
//!
//! A cursor owns whatever the reader holds open for the scan. The release
//! hook runs exactly once: on [`RowCursor::close`] or, failing that, on drop.

use std::fmt;

use super::errors::ReaderResult;
use super::Row;

type Rows = Box<dyn Iterator<Item = ReaderResult<Row>> + Send>;
type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Lazy, finite sequence of rows with a scoped release.
pub struct RowCursor {
    rows: Rows,
    on_release: Option<ReleaseHook>,
}

impl RowCursor {
    /// Wrap a row iterator. Iteration errors surface as `Err` items.
    pub fn new<I>(rows: I) -> Self
    where
        I: Iterator<Item = ReaderResult<Row>> + Send + 'static,
    {
        Self {
            rows: Box::new(rows),
            on_release: None,
        }
    }

    /// A cursor over rows that are already materialized
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self::new(rows.into_iter().map(Ok))
    }

    /// Run `hook` when the cursor is released
    pub fn on_release(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// Release the cursor now
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}

impl Iterator for RowCursor {
    type Item = ReaderResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

impl Drop for RowCursor {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for RowCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowCursor")
            .field("released", &self.on_release.is_none())
            .finish()
    }
}
