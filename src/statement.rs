//! Statement handle
//!
//! A [`Statement`] executes SQL, owns the cursor of the result it opened and
//! runs positioned operations against that cursor's rowset. Calls follow the
//! usual call-level-interface sequence:
//!
//! 1. set options and bind column arrays
//! 2. `execute` a query, which opens a cursor
//! 3. `fetch` rowsets, `set_position` / `bulk_operation` to write back
//! 4. `close_cursor` before executing again
//!
//! Warnings and per-row failures are left as [`Diagnostics`] on the statement
//! and are cleared at the start of the next call.
//!
//! # Data at execution
//!
//! When a write touches a column bound as [`BoundValue::DataAtExec`], the call
//! returns `NeedData` and the statement suspends. The application then loops:
//!
//! ```rust,ignore
//! let mut step = stmt.param_data()?;
//! while let ParamData::NeedData { column } = step {
//!     stmt.put_data(Value::from(load_column(column)))?;
//!     step = stmt.param_data()?;
//! }
//! ```
//!
//! Any other call while suspended fails with `HY010` and leaves the
//! suspended operation in place.
//!
//! [`BoundValue::DataAtExec`]: crate::BoundValue::DataAtExec

use std::sync::Arc;

use crate::binding::{Bindings, BoundValue};
use crate::bookmark::Bookmark;
use crate::column::ResultDescriptor;
use crate::config::StatementOptions;
use crate::connection::Shared;
use crate::constants::{
    sqlstate, BulkOperation, LockType, ReturnCode, SetPosOperation, MAX_CURSOR_NAME_LEN,
    RESERVED_CURSOR_PREFIXES,
};
use crate::cursor::{Cursor, FetchOrientation, ServerContext};
use crate::diagnostics::Diagnostics;
use crate::dispatcher::{self, DeferredValues, Dispatch};
use crate::error::{Error, Result};
use crate::executor::{MetadataProvider, SqlRequest};
use crate::outcome::{FetchOutcome, FetchedRow, OperationOutcome};
use crate::registry::PositionedTarget;
use crate::row::{Row, Value};
use crate::sql::{PositionedClause, SqlText};

/// Progress of a data-at-execution sequence
#[derive(Debug, Clone, PartialEq)]
pub enum ParamData {
    /// Supply the value of this 0-based result column with `put_data`
    NeedData {
        /// Result column ordinal
        column: usize,
    },
    /// Every value was supplied and the operation ran
    Done(OperationOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SuspendedOperation {
    SetPosition { row: usize, operation: SetPosOperation },
    Bulk(BulkOperation),
}

/// A write suspended until its data-at-exec values arrive
#[derive(Debug)]
struct Continuation {
    operation: SuspendedOperation,
    columns: Vec<usize>,
    /// Index into `columns` of the column being supplied
    current: Option<usize>,
    values: DeferredValues,
}

/// A statement on a [`Connection`](crate::Connection)
pub struct Statement {
    id: u64,
    shared: Arc<Shared>,
    options: StatementOptions,
    bindings: Bindings,
    cursor: Option<Cursor>,
    diagnostics: Diagnostics,
    row_count: Option<u64>,
    pending: Option<Continuation>,
    named: bool,
}

impl Statement {
    pub(crate) fn new(id: u64, shared: Arc<Shared>, options: StatementOptions) -> Self {
        Self {
            id,
            shared,
            options,
            bindings: Bindings::new(),
            cursor: None,
            diagnostics: Diagnostics::new(),
            row_count: None,
            pending: None,
            named: false,
        }
    }

    /// Statement ID, unique within its connection
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Effective options (after any cursor-type downgrade)
    pub fn options(&self) -> &StatementOptions {
        &self.options
    }

    /// Diagnostics of the last call
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Rows affected by the last DML or positioned write
    pub fn row_count(&self) -> Option<u64> {
        self.row_count
    }

    /// The open cursor, if any
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref().filter(|c| c.is_open())
    }

    /// Metadata of the open result
    pub fn descriptor(&self) -> Option<&ResultDescriptor> {
        self.cursor().map(Cursor::descriptor)
    }

    /// Whether a data-at-exec operation is waiting for values
    pub fn needs_data(&self) -> bool {
        self.pending.is_some()
    }

    /// Values of a row of the current rowset (1-based)
    pub fn row(&self, row: usize) -> Option<Row> {
        self.cursor()?.row(row)
    }

    /// The current rowset
    pub fn rowset(&self) -> Vec<FetchedRow> {
        self.cursor().map(Cursor::rowset).unwrap_or_default()
    }

    /// Start a call: refuse while suspended, then reset diagnostics
    fn begin_call(&mut self) -> Result<()> {
        if self.pending.is_some() {
            return Err(Error::FunctionSequence(
                "data-at-execution values are still pending".to_string(),
            ));
        }
        self.diagnostics.clear();
        Ok(())
    }

    fn open_cursor(&mut self) -> Result<&mut Cursor> {
        match self.cursor.as_mut() {
            Some(cursor) if cursor.is_open() => Ok(cursor),
            _ => Err(Error::InvalidCursorState("no open cursor".to_string())),
        }
    }

    fn code(&self) -> ReturnCode {
        if self.diagnostics.is_empty() {
            ReturnCode::Success
        } else {
            ReturnCode::SuccessWithInfo
        }
    }

    // =========================================================================
    // Options and bindings
    // =========================================================================

    /// Replace the statement options
    ///
    /// Fails with `24000` while a cursor is open. A cursor type the
    /// connection does not allow is downgraded with warning `01S02`.
    pub fn set_options(&mut self, options: StatementOptions) -> Result<ReturnCode> {
        self.begin_call()?;
        if self.cursor().is_some() {
            return Err(Error::InvalidCursorState(
                "cannot change options while a cursor is open".to_string(),
            ));
        }
        options.validate()?;

        let (effective, changed) = self.shared.config().effective_cursor_type(options.cursor_type);
        if changed {
            tracing::debug!(
                requested = %options.cursor_type,
                effective = %effective,
                "cursor type downgraded"
            );
            self.diagnostics.warn(
                sqlstate::OPTION_CHANGED,
                format!(
                    "Option value changed: cursor type {} used instead of {}",
                    effective, options.cursor_type
                ),
            );
        }
        self.options = StatementOptions {
            cursor_type: effective,
            ..options
        };
        Ok(self.code())
    }

    /// Bind a value array to a 0-based result column, one entry per rowset row
    pub fn bind_column(&mut self, ordinal: usize, values: Vec<BoundValue>) -> Result<()> {
        self.begin_call()?;
        self.bindings.bind_column(ordinal, values);
        Ok(())
    }

    /// Bind the bookmark array used by bookmark operations
    pub fn bind_bookmarks(&mut self, bookmarks: Vec<Bookmark>) -> Result<()> {
        self.begin_call()?;
        self.bindings.bind_bookmarks(bookmarks);
        Ok(())
    }

    /// Remove every binding
    pub fn unbind_all(&mut self) -> Result<()> {
        self.begin_call()?;
        self.bindings.clear();
        Ok(())
    }

    /// Bound bookmark array (filled in by inserts)
    pub fn bound_bookmark(&self, row: usize) -> Option<&Bookmark> {
        self.bindings.bookmark(row)
    }

    // =========================================================================
    // Execute
    // =========================================================================

    /// Execute a statement without parameters
    pub fn execute(&mut self, sql: &str) -> Result<ReturnCode> {
        self.execute_with_params(sql, &[])
    }

    /// Execute a statement
    ///
    /// A query opens a cursor. DML sets the row count. A trailing
    /// `WHERE CURRENT OF <cursor>` is replaced by the named cursor's
    /// current-row predicate.
    pub fn execute_with_params(&mut self, sql: &str, params: &[Value]) -> Result<ReturnCode> {
        self.begin_call()?;
        if self.cursor().is_some() {
            return Err(Error::InvalidCursorState("cursor is still open".to_string()));
        }

        let text = SqlText::parse(sql);
        tracing::trace!(
            kind = ?text.kind(),
            placeholders = text.placeholders(),
            params = params.len(),
            "executing statement"
        );
        self.cursor = None;
        self.row_count = None;

        if let Some(clause) = text.positioned() {
            return self.execute_positioned(&text, clause, params);
        }

        let shared = Arc::clone(&self.shared);
        let mut inner = shared.lock()?;
        let request = SqlRequest::new(sql).with_params(params.to_vec());

        if text.is_query() {
            let output = inner.executor.query(&request)?;
            self.cursor = Some(Cursor::open(
                self.options.cursor_type,
                output.descriptor,
                output.rows,
                &self.options,
            ));
        } else {
            let outcome = inner.executor.execute(&request)?;
            self.row_count = Some(outcome.affected_rows);
        }
        Ok(self.code())
    }

    fn execute_positioned(
        &mut self,
        text: &SqlText,
        clause: &PositionedClause,
        params: &[Value],
    ) -> Result<ReturnCode> {
        let shared = Arc::clone(&self.shared);
        let mut inner = shared.lock()?;
        let target = inner.registry.target_for(&clause.cursor_name)?;

        let (predicate, predicate_params) = shared.synthesizer().predicate(&target.terms)?;
        let sql = text
            .rewrite_positioned(&predicate)
            .ok_or_else(|| Error::Internal("positioned clause vanished".to_string()))?;
        let mut all_params = params.to_vec();
        all_params.extend(predicate_params);

        tracing::debug!(cursor = %clause.cursor_name, sql = %sql, "positioned statement rewritten");
        let outcome = inner
            .executor
            .execute(&SqlRequest::new(sql).with_params(all_params))?;
        self.row_count = Some(outcome.affected_rows);

        match outcome.affected_rows {
            0 => self
                .diagnostics
                .warn(sqlstate::NO_ROWS_AFFECTED, "No rows updated/deleted"),
            1 => {}
            n => {
                tracing::warn!(
                    cursor = %clause.cursor_name,
                    affected = n,
                    "positioned statement changed more than one row"
                );
                self.diagnostics
                    .warn(sqlstate::MORE_THAN_ONE_ROW, "More than one row updated/deleted");
            }
        }
        Ok(self.code())
    }

    // =========================================================================
    // Cursor operations
    // =========================================================================

    /// Position a rowset
    pub fn fetch(&mut self, orientation: FetchOrientation) -> Result<FetchOutcome> {
        self.begin_call()?;
        let shared = Arc::clone(&self.shared);
        let cursor = match self.cursor.as_mut() {
            Some(cursor) if cursor.is_open() => cursor,
            _ => return Err(Error::InvalidCursorState("no open cursor".to_string())),
        };

        let mut inner = shared.lock()?;
        let inner = &mut *inner;
        let mut ctx = ServerContext {
            executor: inner.executor.as_mut(),
            metadata: shared.metadata(),
            synthesizer: shared.synthesizer(),
        };
        let outcome = cursor.fetch(&orientation, &mut ctx, &mut self.diagnostics)?;
        if outcome.return_code == ReturnCode::SuccessWithInfo {
            self.diagnostics.warn(sqlstate::ROW_ERROR, "Error in row");
        }
        if self.named {
            inner
                .registry
                .publish(self.id, current_target(cursor, shared.metadata()));
        }
        Ok(outcome)
    }

    /// Operate on a row of the rowset (`row` 0 means every row)
    pub fn set_position(
        &mut self,
        row: usize,
        operation: SetPosOperation,
        lock: LockType,
    ) -> Result<OperationOutcome> {
        self.begin_call()?;
        let concurrency = self.options.concurrency;
        let cursor = self.open_cursor()?;
        dispatcher::validate_set_position(cursor, concurrency, row, operation, lock)?;

        if matches!(operation, SetPosOperation::Update | SetPosOperation::Add) {
            let rows = match (operation, row) {
                (SetPosOperation::Add, 0) => cursor.row_array_size(),
                (_, 0) => cursor.rowset_len(),
                _ => 1,
            };
            let first = if row == 0 { 1 } else { row };
            let suspended = SuspendedOperation::SetPosition { row, operation };
            if let Some(outcome) = self.suspend_for_data(suspended, first, rows)? {
                return Ok(outcome);
            }
        }

        self.run(SuspendedOperation::SetPosition { row, operation }, None)
    }

    /// Bulk operation over the bound row arrays
    pub fn bulk_operation(&mut self, operation: BulkOperation) -> Result<OperationOutcome> {
        self.begin_call()?;
        let rows = self.open_cursor()?.row_array_size();

        if matches!(operation, BulkOperation::Add | BulkOperation::UpdateByBookmark) {
            let suspended = SuspendedOperation::Bulk(operation);
            if let Some(outcome) = self.suspend_for_data(suspended, 1, rows)? {
                return Ok(outcome);
            }
        }

        self.run(SuspendedOperation::Bulk(operation), None)
    }

    /// Suspend when the first row has data-at-exec columns
    fn suspend_for_data(
        &mut self,
        operation: SuspendedOperation,
        first_row: usize,
        rows: usize,
    ) -> Result<Option<OperationOutcome>> {
        let has_deferred = (first_row..first_row + rows)
            .any(|r| !self.bindings.data_at_exec_columns(r - 1).is_empty());
        if !has_deferred {
            return Ok(None);
        }
        if rows > 1 {
            return Err(Error::FeatureNotSupported(
                "data-at-execution columns in a multi-row operation".to_string(),
            ));
        }
        let columns = self.bindings.data_at_exec_columns(first_row - 1);
        tracing::debug!(operation = ?operation, columns = ?columns, "operation suspended for data");
        self.pending = Some(Continuation {
            operation,
            columns,
            current: None,
            values: DeferredValues::new(),
        });
        Ok(Some(OperationOutcome::need_data()))
    }

    /// Dispatch an operation against the open cursor
    fn run(
        &mut self,
        operation: SuspendedOperation,
        deferred: Option<&DeferredValues>,
    ) -> Result<OperationOutcome> {
        let shared = Arc::clone(&self.shared);
        let concurrency = self.options.concurrency;
        let cursor = match self.cursor.as_mut() {
            Some(cursor) if cursor.is_open() => cursor,
            _ => return Err(Error::InvalidCursorState("no open cursor".to_string())),
        };

        let mut inner = shared.lock()?;
        let inner = &mut *inner;
        let mut ctx = ServerContext {
            executor: inner.executor.as_mut(),
            metadata: shared.metadata(),
            synthesizer: shared.synthesizer(),
        };
        let mut dispatch = Dispatch {
            cursor,
            bindings: &mut self.bindings,
            ctx: &mut ctx,
            diagnostics: &mut self.diagnostics,
            concurrency,
            deferred,
        };

        let outcome = match operation {
            SuspendedOperation::SetPosition { row, operation } => {
                dispatch.set_position(row, operation)?
            }
            SuspendedOperation::Bulk(operation) => dispatch.bulk(operation)?,
        };

        let writes = !matches!(
            operation,
            SuspendedOperation::SetPosition {
                operation: SetPosOperation::Position | SetPosOperation::Refresh,
                ..
            } | SuspendedOperation::Bulk(BulkOperation::FetchByBookmark)
        );
        if writes {
            self.row_count = Some(outcome.affected_rows);
        }
        if self.named {
            inner
                .registry
                .publish(self.id, current_target(cursor_of(&mut self.cursor)?, shared.metadata()));
        }
        Ok(outcome)
    }

    /// Advance a suspended operation
    ///
    /// Returns the next column to supply, or runs the operation once every
    /// column has been supplied.
    pub fn param_data(&mut self) -> Result<ParamData> {
        let pending = self.pending.as_mut().ok_or_else(|| {
            Error::FunctionSequence("no data-at-execution operation is pending".to_string())
        })?;

        let next = pending.current.map_or(0, |i| i + 1);
        if next < pending.columns.len() {
            pending.current = Some(next);
            return Ok(ParamData::NeedData {
                column: pending.columns[next],
            });
        }

        let mut continuation = match self.pending.take() {
            Some(continuation) => continuation,
            None => return Err(Error::Internal("continuation disappeared".to_string())),
        };
        for column in &continuation.columns {
            continuation.values.entry(*column).or_insert(Value::Null);
        }
        self.diagnostics.clear();
        let outcome = self.run(continuation.operation, Some(&continuation.values))?;
        Ok(ParamData::Done(outcome))
    }

    /// Supply (or append to) the value of the column `param_data` asked for
    pub fn put_data(&mut self, value: Value) -> Result<()> {
        let pending = self.pending.as_mut().ok_or_else(|| {
            Error::FunctionSequence("no data-at-execution operation is pending".to_string())
        })?;
        let column = pending
            .current
            .and_then(|i| pending.columns.get(i).copied())
            .ok_or_else(|| {
                Error::FunctionSequence("param_data has not requested a column".to_string())
            })?;

        match pending.values.get_mut(&column) {
            Some(existing) => {
                let kind = value.kind();
                if !existing.append(value) {
                    return Err(Error::DataConversion(format!(
                        "column {} cannot take a {} value in pieces",
                        column, kind
                    )));
                }
            }
            None => {
                pending.values.insert(column, value);
            }
        }
        Ok(())
    }

    /// Bookmark of a row of the current rowset (1-based)
    pub fn get_bookmark(&mut self, row: usize) -> Result<Bookmark> {
        self.begin_call()?;
        let cursor = self.open_cursor()?;
        if !cursor.uses_bookmarks() {
            return Err(Error::BookmarksDisabled);
        }
        if row == 0 || row > cursor.rowset_len() {
            return Err(Error::RowOutOfRange {
                row,
                rowset_len: cursor.rowset_len(),
            });
        }
        cursor
            .rowset_slot(row)
            .and_then(|id| cursor.bookmarks().get(id).cloned())
            .ok_or_else(|| Error::InvalidCursorPosition(format!("row {} has no bookmark", row)))
    }

    /// Close the open cursor, discarding any suspended operation
    pub fn close_cursor(&mut self) -> Result<()> {
        if self.pending.take().is_some() {
            tracing::debug!(
                statement_id = self.id,
                "pending data-at-execution operation discarded"
            );
        }
        self.diagnostics.clear();
        let cursor = self
            .cursor
            .as_mut()
            .filter(|c| c.is_open())
            .ok_or_else(|| Error::InvalidCursorState("no open cursor".to_string()))?;
        cursor.close();
        self.cursor = None;
        if self.named {
            self.shared.lock()?.registry.publish(self.id, None);
        }
        Ok(())
    }

    // =========================================================================
    // Cursor names
    // =========================================================================

    /// Name the statement's cursor
    pub fn set_cursor_name(&mut self, name: &str) -> Result<()> {
        self.begin_call()?;
        if name.is_empty() || name.len() > MAX_CURSOR_NAME_LEN {
            return Err(Error::InvalidCursorName(format!(
                "cursor name must be 1 to {} bytes",
                MAX_CURSOR_NAME_LEN
            )));
        }
        let upper = name.to_ascii_uppercase();
        if RESERVED_CURSOR_PREFIXES.iter().any(|p| upper.starts_with(p)) {
            return Err(Error::InvalidCursorName(format!(
                "cursor name '{}' uses a reserved prefix",
                name
            )));
        }

        let shared = Arc::clone(&self.shared);
        let mut inner = shared.lock()?;
        inner.registry.register(self.id, name)?;
        self.named = true;
        if let Some(cursor) = self.cursor.as_mut().filter(|c| c.is_open()) {
            inner
                .registry
                .publish(self.id, current_target(cursor, shared.metadata()));
        }
        Ok(())
    }

    /// Cursor name, generating `SQL_CUR<n>` if none was set
    pub fn cursor_name(&mut self) -> Result<String> {
        let shared = Arc::clone(&self.shared);
        let mut inner = shared.lock()?;
        if let Some(name) = inner.registry.name_of(self.id) {
            return Ok(name.to_string());
        }
        let name = inner.registry.generate_name(self.id)?;
        self.named = true;
        if let Some(cursor) = self.cursor.as_mut().filter(|c| c.is_open()) {
            inner
                .registry
                .publish(self.id, current_target(cursor, shared.metadata()));
        }
        Ok(name)
    }
}

fn cursor_of(cursor: &mut Option<Cursor>) -> Result<&mut Cursor> {
    cursor
        .as_mut()
        .ok_or_else(|| Error::InvalidCursorState("no open cursor".to_string()))
}

/// Key predicate of a cursor's current row, for `WHERE CURRENT OF`
fn current_target(
    cursor: &mut Cursor,
    metadata: &dyn MetadataProvider,
) -> Option<Result<PositionedTarget>> {
    let image = cursor.current_image()?;
    Some(cursor.key_set(metadata).and_then(|key| {
        Ok(PositionedTarget {
            table: key.table().clone(),
            terms: key.terms(&image)?,
            unique: key.is_unique(),
        })
    }))
}

impl Drop for Statement {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.shared.lock() {
            inner.registry.unregister(self.id);
        }
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("cursor", &self.cursor)
            .field("row_count", &self.row_count)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}
