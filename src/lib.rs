#![warn(missing_docs)]

//! # rowset-cursor
//!
//! Updatable, scrollable cursors over forward-only SQL result streams.
//!
//! This crate is the cursor engine of a client-side SQL driver. The server
//! hands back every result as a forward-only stream; the engine buffers it,
//! lets the application scroll it in rowsets, and turns positioned updates,
//! deletes and inserts into ordinary `UPDATE`/`DELETE`/`INSERT` statements
//! keyed on whatever columns re-identify a row.
//!
//! ## Features
//!
//! - **Scrolling** - NEXT, PRIOR, FIRST, LAST, ABSOLUTE, RELATIVE and
//!   BOOKMARK fetches over forward-only, static, keyset-driven and dynamic
//!   cursors
//! - **Positioned writes** - `set_position` and `bulk_operation` with per-row
//!   status arrays
//! - **Key resolution** - primary key, then shortest unique index, then every
//!   comparable column
//! - **Bookmarks** - opaque row identifiers that survive scrolling
//! - **Cursor names** - `UPDATE ... WHERE CURRENT OF <cursor>` across
//!   statements of a connection
//! - **Data at execution** - values streamed in with `put_data`
//!
//! The engine never talks to a server. Queries and statements go through a
//! [`QueryExecutor`] and key metadata comes from a [`MetadataProvider`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rowset_cursor::{
//!     Config, Connection, CursorType, FetchOrientation, LockType, SetPosOperation,
//!     StatementOptions, Value,
//! };
//!
//! let conn = Connection::new(Config::new(), executor, metadata);
//! let mut stmt = conn.statement_with(
//!     StatementOptions::new().cursor_type(CursorType::Static).row_array_size(10),
//! )?;
//!
//! stmt.execute("SELECT id, name, qty FROM items")?;
//! stmt.fetch(FetchOrientation::Absolute(3))?;
//!
//! // Change qty of the first row in the rowset
//! stmt.bind_column(2, vec![Value::Integer(5).into()])?;
//! let outcome = stmt.set_position(1, SetPosOperation::Update, LockType::NoChange)?;
//! assert_eq!(outcome.affected_rows, 1);
//! ```
//!
//! ## Return codes and diagnostics
//!
//! Calls that fail outright return [`Error`], whose [`Error::sqlstate`] gives
//! the ODBC SQLSTATE. Calls that partly succeed return an outcome whose
//! [`ReturnCode`] is `SuccessWithInfo`, with the details left as
//! [`Diagnostic`] records on the statement.

pub mod binding;
pub mod bookmark;
pub mod column;
pub mod config;
pub mod connection;
pub mod constants;
pub mod cursor;
mod dispatcher;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod key_resolver;
pub mod literal;
pub mod outcome;
pub mod registry;
pub mod row;
pub mod row_buffer;
pub mod sql;
pub mod statement;
pub mod synthesizer;

// Re-exports for convenience
pub use binding::{Bindings, BoundValue};
pub use bookmark::{Bookmark, BookmarkManager};
pub use column::{ColumnDescriptor, ResultDescriptor, SqlType, TableRef};
pub use config::{BindMode, Config, IdentifierQuote, StatementOptions};
pub use connection::Connection;
pub use constants::{
    BulkOperation, Concurrency, CursorType, LockType, ReturnCode, RowStatus, SetPosOperation,
};
pub use cursor::{Cursor, CursorState, FetchOrientation};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::{Error, Result};
pub use executor::{
    ExecOutcome, KeyTerm, MetadataProvider, NoMetadata, QueryExecutor, QueryOutput, RowStream,
    SqlRequest, TableColumn, TableMetadata, UniqueIndex, VecRowStream, WriteBackPlan,
};
pub use key_resolver::{KeyColumn, KeySet, KeySource};
pub use outcome::{FetchOutcome, FetchedRow, OperationOutcome, RowError};
pub use registry::PositionedTarget;
pub use row::{Row, Value};
pub use sql::{SqlText, StatementKind};
pub use statement::{ParamData, Statement};
pub use synthesizer::Synthesizer;
