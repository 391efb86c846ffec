//! Application-bound row values
//!
//! Positioned updates and inserts take their values from column arrays bound
//! by the application, one entry per rowset row. Bookmark operations take
//! their targets from a bound bookmark array.

use crate::bookmark::Bookmark;
use crate::row::Value;

/// A bound value for one column of one row
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    /// Write this value (`Value::Null` writes NULL)
    Value(Value),
    /// Leave the column out of the synthesized statement
    Ignore,
    /// Supply the value later through `put_data`
    DataAtExec,
}

impl From<Value> for BoundValue {
    fn from(v: Value) -> Self {
        BoundValue::Value(v)
    }
}

static IGNORED: BoundValue = BoundValue::Ignore;

/// Bound column arrays of a statement
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    columns: Vec<Option<Vec<BoundValue>>>,
    bookmarks: Option<Vec<Option<Bookmark>>>,
}

impl Bindings {
    /// Create empty bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value array to a 0-based result column
    pub fn bind_column(&mut self, ordinal: usize, values: Vec<BoundValue>) {
        if self.columns.len() <= ordinal {
            self.columns.resize(ordinal + 1, None);
        }
        self.columns[ordinal] = Some(values);
    }

    /// Remove a column binding
    pub fn unbind_column(&mut self, ordinal: usize) {
        if let Some(slot) = self.columns.get_mut(ordinal) {
            *slot = None;
        }
    }

    /// Bind the bookmark array
    pub fn bind_bookmarks(&mut self, bookmarks: Vec<Bookmark>) {
        self.bookmarks = Some(bookmarks.into_iter().map(Some).collect());
    }

    /// Remove every binding
    pub fn clear(&mut self) {
        self.columns.clear();
        self.bookmarks = None;
    }

    /// Whether a column has a binding
    pub fn is_bound(&self, ordinal: usize) -> bool {
        matches!(self.columns.get(ordinal), Some(Some(_)))
    }

    /// Bound value for a column in a 0-based rowset row
    ///
    /// Unbound columns, and rows past the end of the bound array, read as
    /// `Ignore`.
    pub fn value(&self, ordinal: usize, row: usize) -> &BoundValue {
        self.columns
            .get(ordinal)
            .and_then(Option::as_ref)
            .and_then(|values| values.get(row))
            .unwrap_or(&IGNORED)
    }

    /// Bound bookmark for a 0-based rowset row
    pub fn bookmark(&self, row: usize) -> Option<&Bookmark> {
        self.bookmarks.as_ref()?.get(row)?.as_ref()
    }

    /// Length of the bound bookmark array, empty entries included
    pub fn bookmark_rows(&self) -> usize {
        self.bookmarks.as_ref().map_or(0, Vec::len)
    }

    /// Whether a bookmark array is bound
    pub fn has_bookmarks(&self) -> bool {
        self.bookmarks.is_some()
    }

    /// Store the outcome of an insert into the bound array
    ///
    /// A failed row clears its entry. No array is created for a failed row.
    pub(crate) fn set_bookmark(&mut self, row: usize, bookmark: Option<Bookmark>) {
        if bookmark.is_none() && self.bookmarks.is_none() {
            return;
        }
        let bookmarks = self.bookmarks.get_or_insert_with(Vec::new);
        if bookmarks.len() <= row {
            bookmarks.resize(row + 1, None);
        }
        bookmarks[row] = bookmark;
    }

    /// Columns marked data-at-exec in a row, in column order
    pub fn data_at_exec_columns(&self, row: usize) -> Vec<usize> {
        (0..self.columns.len())
            .filter(|&ordinal| matches!(self.value(ordinal, row), BoundValue::DataAtExec))
            .collect()
    }

    /// Number of columns with a binding slot
    pub fn width(&self) -> usize {
        self.columns.len()
    }
}
