//! Diagnostic records
//!
//! Warnings and per-row failures are not errors: a call that returns
//! `SuccessWithInfo` leaves [`Diagnostic`] records on the statement describing
//! what happened. Records are cleared at the start of every call.

use std::fmt;

use crate::error::Error;

/// One diagnostic record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// SQLSTATE
    pub sqlstate: String,
    /// Native error code (0 when the engine raised it)
    pub native_code: u32,
    /// Message text
    pub message: String,
    /// 1-based rowset row the record refers to
    pub row: Option<usize>,
}

impl Diagnostic {
    /// Create a record
    pub fn new(sqlstate: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sqlstate: sqlstate.into(),
            native_code: 0,
            message: message.into(),
            row: None,
        }
    }

    /// Attach a row number
    pub fn for_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    /// Record for an error
    pub fn from_error(err: &Error) -> Self {
        Self {
            sqlstate: err.sqlstate().to_string(),
            native_code: err.native_code(),
            message: err.to_string(),
            row: None,
        }
    }

    /// Whether this is a warning (class 01)
    pub fn is_warning(&self) -> bool {
        self.sqlstate.starts_with("01")
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(row) = self.row {
            write!(f, "Row {}: ", row)?;
        }
        write!(f, "[{}] {}", self.sqlstate, self.message)
    }
}

/// Diagnostic records of the last call
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record
    pub fn push(&mut self, record: Diagnostic) {
        tracing::debug!(
            sqlstate = %record.sqlstate,
            row = ?record.row,
            message = %record.message,
            "diagnostic"
        );
        self.records.push(record);
    }

    /// Add a warning
    pub fn warn(&mut self, sqlstate: &str, message: impl Into<String>) {
        self.push(Diagnostic::new(sqlstate, message));
    }

    /// Remove every record
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// All records in order
    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    /// Whether a record with this SQLSTATE exists
    pub fn contains(&self, sqlstate: &str) -> bool {
        self.records.iter().any(|r| r.sqlstate == sqlstate)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over records
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::new("01S03", "No rows updated/deleted").for_row(2);
        assert_eq!(d.to_string(), "Row 2: [01S03] No rows updated/deleted");
        assert!(d.is_warning());
    }

    #[test]
    fn test_from_error() {
        let err = Error::server(1048, "23000", "Column 'name' cannot be null");
        let d = Diagnostic::from_error(&err);
        assert_eq!(d.sqlstate, "23000");
        assert_eq!(d.native_code, 1048);
        assert!(!d.is_warning());
    }

    #[test]
    fn test_diagnostics_list() {
        let mut diags = Diagnostics::new();
        assert!(diags.is_empty());
        diags.warn("01S02", "Cursor type changed");
        diags.push(Diagnostic::new("HY000", "boom").for_row(1));
        assert_eq!(diags.len(), 2);
        assert!(diags.contains("01S02"));
        assert!(!diags.contains("01S04"));
        diags.clear();
        assert!(diags.is_empty());
    }
}
