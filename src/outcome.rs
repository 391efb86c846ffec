//! Results of fetches and positioned operations
//!
//! Row-array calls report one status per rowset row, in rowset order, plus an
//! aggregate [`ReturnCode`]. Rows that failed also get a [`RowError`] with the
//! reason; rows that succeeded are never rolled back because a later row
//! failed.

use crate::bookmark::Bookmark;
use crate::constants::{ReturnCode, RowStatus};
use crate::error::Error;
use crate::row::Row;

/// One rowset row as returned to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedRow {
    /// Row status
    pub status: RowStatus,
    /// Bookmark (bookmarks enabled only)
    pub bookmark: Option<Bookmark>,
    /// Column data (None for deleted/failed rows or when data is not retrieved)
    pub row: Option<Row>,
}

/// Result of a fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// Aggregate outcome (`NoData` before first / after last)
    pub return_code: ReturnCode,
    /// Rows with data (deleted and failed rows are not counted)
    pub rows_fetched: usize,
    /// One status per row-array entry, padded with `NoRow`
    pub statuses: Vec<RowStatus>,
    /// Positioned rows
    pub rows: Vec<FetchedRow>,
    /// Absolute position of the rowset's first row (0 when not on a row)
    pub position: usize,
    /// Whether the end of the result was reached
    pub at_end: bool,
}

impl FetchOutcome {
    /// A fetch that positioned nothing
    pub fn no_data(row_array_size: usize, at_end: bool) -> Self {
        Self {
            return_code: ReturnCode::NoData,
            rows_fetched: 0,
            statuses: vec![RowStatus::NoRow; row_array_size],
            rows: Vec::new(),
            position: 0,
            at_end,
        }
    }

    /// Whether nothing was positioned
    pub fn is_no_data(&self) -> bool {
        self.return_code == ReturnCode::NoData
    }

    /// First positioned row with data
    pub fn first(&self) -> Option<&Row> {
        self.rows.iter().find_map(|r| r.row.as_ref())
    }
}

/// A failed row inside a row-array operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// 1-based rowset row
    pub row: usize,
    /// SQLSTATE
    pub sqlstate: String,
    /// Native error code
    pub native_code: u32,
    /// Error message
    pub message: String,
}

impl RowError {
    /// Create a row error from an engine or server error
    pub fn new(row: usize, err: &Error) -> Self {
        Self {
            row,
            sqlstate: err.sqlstate().to_string(),
            native_code: err.native_code(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Row {}: [{}] {}", self.row, self.sqlstate, self.message)
    }
}

impl std::error::Error for RowError {}

/// Result of `set_position`, `bulk_operation` and `param_data`
#[derive(Debug, Clone, PartialEq)]
pub struct OperationOutcome {
    /// Aggregate outcome
    pub return_code: ReturnCode,
    /// Status per processed row, in row order
    pub statuses: Vec<RowStatus>,
    /// Rows changed on the server
    pub affected_rows: u64,
    /// Failed rows
    pub errors: Vec<RowError>,
    /// Bookmarks of inserted rows, one entry per processed row
    pub bookmarks: Vec<Option<Bookmark>>,
    /// Rows read by refresh and fetch-by-bookmark
    pub rows: Vec<FetchedRow>,
    /// Number of rows that succeeded
    pub success_count: usize,
    /// Number of rows that failed
    pub failure_count: usize,
}

impl OperationOutcome {
    /// Create an empty outcome
    pub fn new() -> Self {
        Self {
            return_code: ReturnCode::Success,
            statuses: Vec::new(),
            affected_rows: 0,
            errors: Vec::new(),
            bookmarks: Vec::new(),
            rows: Vec::new(),
            success_count: 0,
            failure_count: 0,
        }
    }

    /// Outcome of a call suspended for data-at-exec values
    pub fn need_data() -> Self {
        Self {
            return_code: ReturnCode::NeedData,
            ..Self::new()
        }
    }

    /// Check if all rows succeeded
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.return_code.is_success()
    }

    /// Check if any row failed
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl Default for OperationOutcome {
    fn default() -> Self {
        Self::new()
    }
}
