//! Error types for the cursor engine
//!
//! Every fatal failure of a call is an [`Error`]. Each variant maps onto the
//! SQLSTATE a driver would report for it, so callers can surface the same
//! diagnostics an ODBC application expects. Non-fatal outcomes (no rows
//! matched, ambiguous writes, per-row failures inside a bulk call) are never
//! errors; they are recorded as diagnostics on the statement instead.

use thiserror::Error;

use crate::constants::sqlstate;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the cursor engine
#[derive(Error, Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Error {
    // =========================================================================
    // Sequencing Errors
    // =========================================================================
    /// Operation invoked in the wrong statement state
    #[error("function sequence error: {0}")]
    FunctionSequence(String),

    /// No open cursor, or the cursor is in a state that forbids the call
    #[error("invalid cursor state: {0}")]
    InvalidCursorState(String),

    /// Fetch orientation not allowed for this cursor type
    #[error("fetch type out of range: {0}")]
    FetchTypeOutOfRange(String),

    /// Cursor cannot be positioned on the requested row
    #[error("invalid cursor position: {0}")]
    InvalidCursorPosition(String),

    /// Row number outside the current rowset
    #[error("row value out of range: row {row} requested, rowset holds {rowset_len}")]
    RowOutOfRange { row: usize, rowset_len: usize },

    // =========================================================================
    // Predicate Resolution Errors
    // =========================================================================
    /// Result set spans more than one base table
    #[error(
        "can't modify a row from a statement that uses more than one table ({})",
        .0.join(", ")
    )]
    MultipleTables(Vec<String>),

    /// Result set columns carry no base table at all
    #[error("result set has no base table; row to modify cannot be identified")]
    NoBaseTable,

    /// No key candidate and no usable fallback columns
    #[error("no usable key columns in result set for table {0}")]
    NoUsableKey(String),

    /// A true-key column holds NULL, which breaks the equality predicate
    #[error("key column {0} is NULL, so row to modify cannot be identified")]
    NullKeyValue(String),

    /// Every bound column was ignored, or the bookmark column is unbound
    #[error("degree of derived table does not match column list")]
    DegreeMismatch,

    // =========================================================================
    // Bookmark Errors
    // =========================================================================
    /// Bookmark does not name a live row of this cursor
    #[error("invalid bookmark value: {0}")]
    BookmarkNotFound(String),

    /// Bookmark operation on a statement without bookmarks
    #[error("bookmarks are not enabled on this statement")]
    BookmarksDisabled,

    // =========================================================================
    // Cursor Name Errors
    // =========================================================================
    /// Cursor name rejected or unknown
    #[error("invalid cursor name: {0}")]
    InvalidCursorName(String),

    /// Cursor name already used by another statement on the connection
    #[error("duplicate cursor name: {0}")]
    DuplicateCursorName(String),

    // =========================================================================
    // Option Errors
    // =========================================================================
    /// Feature not supported by this driver
    #[error("optional feature not implemented: {0}")]
    FeatureNotSupported(String),

    /// Write-back requested on a read-only cursor
    #[error("cursor is read-only: {0}")]
    ReadOnlyCursor(String),

    /// Statement option value rejected
    #[error("invalid attribute value: {0}")]
    InvalidAttribute(String),

    // =========================================================================
    // Data Errors
    // =========================================================================
    /// Value cannot be serialized for the target column
    #[error("data conversion error: {0}")]
    DataConversion(String),

    // =========================================================================
    // Server Errors
    // =========================================================================
    /// Error reported by the query executor
    #[error("server error ({code}): {message}")]
    Server {
        code: u32,
        sqlstate: String,
        message: String,
    },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new server error
    pub fn server(code: u32, sqlstate: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Server {
            code,
            sqlstate: sqlstate.into(),
            message: message.into(),
        }
    }

    /// The SQLSTATE reported for this error
    pub fn sqlstate(&self) -> &str {
        match self {
            Error::FunctionSequence(_) => sqlstate::FUNCTION_SEQUENCE,
            Error::InvalidCursorState(_) => sqlstate::INVALID_CURSOR_STATE,
            Error::FetchTypeOutOfRange(_) => sqlstate::FETCH_TYPE_OUT_OF_RANGE,
            Error::InvalidCursorPosition(_) => sqlstate::INVALID_CURSOR_POSITION,
            Error::RowOutOfRange { .. } => sqlstate::ROW_OUT_OF_RANGE,
            Error::MultipleTables(_)
            | Error::NoBaseTable
            | Error::NoUsableKey(_)
            | Error::NullKeyValue(_) => sqlstate::GENERAL_ERROR,
            Error::DegreeMismatch => sqlstate::DEGREE_MISMATCH,
            Error::BookmarkNotFound(_) => sqlstate::INVALID_BOOKMARK,
            Error::BookmarksDisabled => sqlstate::INVALID_DESCRIPTOR_INDEX,
            Error::InvalidCursorName(_) => sqlstate::INVALID_CURSOR_NAME,
            Error::DuplicateCursorName(_) => sqlstate::DUPLICATE_CURSOR_NAME,
            Error::FeatureNotSupported(_) => sqlstate::OPTIONAL_FEATURE,
            Error::ReadOnlyCursor(_) => sqlstate::INVALID_ATTRIBUTE_IDENTIFIER,
            Error::InvalidAttribute(_) => sqlstate::INVALID_ATTRIBUTE_VALUE,
            Error::DataConversion(_) => sqlstate::INVALID_CHARACTER_VALUE,
            Error::Server { sqlstate, .. } => sqlstate,
            Error::Internal(_) => sqlstate::GENERAL_ERROR,
        }
    }

    /// Native error code (server errors only)
    pub fn native_code(&self) -> u32 {
        match self {
            Error::Server { code, .. } => *code,
            _ => 0,
        }
    }

    /// Check if this is a call-sequencing error
    pub fn is_sequencing_error(&self) -> bool {
        matches!(
            self,
            Error::FunctionSequence(_)
                | Error::InvalidCursorState(_)
                | Error::FetchTypeOutOfRange(_)
                | Error::InvalidCursorPosition(_)
        )
    }

    /// Check if this error means no write-back predicate can be built
    pub fn is_predicate_resolution_error(&self) -> bool {
        matches!(
            self,
            Error::MultipleTables(_)
                | Error::NoBaseTable
                | Error::NoUsableKey(_)
                | Error::NullKeyValue(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display() {
        let err = Error::server(1062, "23000", "Duplicate entry '1' for key 'PRIMARY'");
        assert_eq!(
            err.to_string(),
            "server error (1062): Duplicate entry '1' for key 'PRIMARY'"
        );
        assert_eq!(err.sqlstate(), "23000");
        assert_eq!(err.native_code(), 1062);
    }

    #[test]
    fn test_sqlstate_mapping() {
        assert_eq!(Error::FunctionSequence("x".into()).sqlstate(), "HY010");
        assert_eq!(Error::FetchTypeOutOfRange("x".into()).sqlstate(), "HY106");
        assert_eq!(
            Error::RowOutOfRange {
                row: 5,
                rowset_len: 2
            }
            .sqlstate(),
            "HY107"
        );
        assert_eq!(Error::DegreeMismatch.sqlstate(), "21S02");
        assert_eq!(Error::InvalidCursorName("c".into()).sqlstate(), "34000");
    }

    #[test]
    fn test_multiple_tables_display() {
        let err = Error::MultipleTables(vec!["a".into(), "b".into()]);
        assert_eq!(
            err.to_string(),
            "can't modify a row from a statement that uses more than one table (a, b)"
        );
        assert!(err.is_predicate_resolution_error());
        assert!(!err.is_sequencing_error());
    }
}
