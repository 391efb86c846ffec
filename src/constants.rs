//! Cursor engine constants
//!
//! Enumerations shared across the engine (cursor types, concurrency modes,
//! row statuses, positioned operations, return codes) and the SQLSTATE codes
//! reported through diagnostics.

// =============================================================================
// Cursor Types
// =============================================================================

/// Cursor type requested for a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CursorType {
    /// Rows are read once, front to back
    #[default]
    ForwardOnly,
    /// Rows are buffered client-side; scrollable, no re-read
    Static,
    /// Scrollable; each positioned row is re-read by key, rowset refreshed
    /// before writes
    Dynamic,
    /// Scrollable; row membership fixed at open, each positioned row re-read
    /// by key
    KeysetDriven,
}

impl CursorType {
    /// Whether the cursor can move in any direction
    pub fn is_scrollable(self) -> bool {
        !matches!(self, CursorType::ForwardOnly)
    }
}

impl std::fmt::Display for CursorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CursorType::ForwardOnly => "forward-only",
            CursorType::Static => "static",
            CursorType::Dynamic => "dynamic",
            CursorType::KeysetDriven => "keyset-driven",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// Concurrency
// =============================================================================

/// Concurrency mode for positioned writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Concurrency {
    /// Positioned update/delete/add refused
    ReadOnly,
    /// Re-reads issued with `FOR UPDATE`
    Lock,
    /// Row-version optimistic concurrency (handled like `Values`)
    RowVersion,
    /// Optimistic concurrency comparing key values
    #[default]
    Values,
}

// =============================================================================
// Row Status
// =============================================================================

/// Status of one row in the rowset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RowStatus {
    /// Row fetched or written successfully
    #[default]
    Success,
    /// Row updated through this cursor
    Updated,
    /// Row deleted, through this cursor or on the server
    Deleted,
    /// Row inserted through this cursor
    Added,
    /// Row failed
    Error,
    /// No row at this rowset position
    NoRow,
}

impl RowStatus {
    /// Whether the row counts as fetched
    pub fn has_data(self) -> bool {
        matches!(
            self,
            RowStatus::Success | RowStatus::Updated | RowStatus::Added
        )
    }
}

// =============================================================================
// Positioned Operations
// =============================================================================

/// Operation for `set_position`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetPosOperation {
    /// Make the row current
    Position,
    /// Re-read the row(s)
    Refresh,
    /// Write bound values back to the row(s)
    Update,
    /// Delete the row(s)
    Delete,
    /// Insert bound row(s)
    Add,
}

/// Operation for `bulk_operation`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkOperation {
    /// Insert every bound row
    Add,
    /// Update the rows named by the bound bookmarks
    UpdateByBookmark,
    /// Delete the rows named by the bound bookmarks
    DeleteByBookmark,
    /// Fetch the rows named by the bound bookmarks into the rowset
    FetchByBookmark,
}

/// Lock request for `set_position`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LockType {
    /// Leave the lock state unchanged (the only supported value)
    #[default]
    NoChange,
    /// Lock the row exclusively
    Exclusive,
    /// Unlock the row
    Unlock,
}

// =============================================================================
// Return Codes
// =============================================================================

/// Outcome classification of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    /// Everything succeeded
    Success,
    /// Succeeded with warnings or partial row failures
    SuccessWithInfo,
    /// Nothing to return
    NoData,
    /// Deferred values must be supplied with `put_data`
    NeedData,
    /// Every row failed
    Error,
}

impl ReturnCode {
    /// Aggregate per-row results into a call-level return code
    pub fn from_rows(succeeded: usize, failed: usize, warned: bool) -> Self {
        if succeeded == 0 && failed > 0 {
            ReturnCode::Error
        } else if failed > 0 || warned {
            ReturnCode::SuccessWithInfo
        } else {
            ReturnCode::Success
        }
    }

    /// `Success` or `SuccessWithInfo`
    pub fn is_success(self) -> bool {
        matches!(self, ReturnCode::Success | ReturnCode::SuccessWithInfo)
    }
}

// =============================================================================
// Limits
// =============================================================================

/// Maximum cursor name length in bytes
pub const MAX_CURSOR_NAME_LEN: usize = 64;

/// Prefix of generated cursor names
pub const GENERATED_CURSOR_PREFIX: &str = "SQL_CUR";

/// Prefixes reserved for generated cursor names
pub const RESERVED_CURSOR_PREFIXES: [&str; 2] = ["SQLCUR", "SQL_CUR"];

/// Width of a bookmark in bytes
pub const BOOKMARK_LEN: usize = 8;

// =============================================================================
// SQLSTATE Codes
// =============================================================================

/// SQLSTATE codes reported by the engine
#[allow(missing_docs)]
pub mod sqlstate {
    pub const ROW_ERROR: &str = "01S01";
    pub const OPTION_CHANGED: &str = "01S02";
    pub const NO_ROWS_AFFECTED: &str = "01S03";
    pub const MORE_THAN_ONE_ROW: &str = "01S04";
    pub const INVALID_DESCRIPTOR_INDEX: &str = "07009";
    pub const DEGREE_MISMATCH: &str = "21S02";
    pub const INVALID_CHARACTER_VALUE: &str = "22018";
    pub const INVALID_CURSOR_STATE: &str = "24000";
    pub const INVALID_CURSOR_NAME: &str = "34000";
    pub const DUPLICATE_CURSOR_NAME: &str = "3C000";
    pub const GENERAL_ERROR: &str = "HY000";
    pub const FUNCTION_SEQUENCE: &str = "HY010";
    pub const INVALID_ATTRIBUTE_VALUE: &str = "HY024";
    pub const INVALID_ATTRIBUTE_IDENTIFIER: &str = "HY092";
    pub const FETCH_TYPE_OUT_OF_RANGE: &str = "HY106";
    pub const ROW_OUT_OF_RANGE: &str = "HY107";
    pub const INVALID_CURSOR_POSITION: &str = "HY109";
    pub const INVALID_BOOKMARK: &str = "HY111";
    pub const OPTIONAL_FEATURE: &str = "HYC00";
}
