//! Positioned-operation dispatch
//!
//! Runs `set_position` and `bulk_operation` calls against the current rowset:
//! checks the call is legal for the cursor, expands "all rows" into one
//! request per row, synthesizes and executes each request and folds the
//! per-row results into an [`OperationOutcome`].
//!
//! A failing row never undoes the rows before it, and never stops the rows
//! after it. Errors that make the whole call impossible (a join result, a
//! read-only cursor, a row number outside the rowset) are returned before
//! any SQL is sent.

use indexmap::IndexMap;

use crate::binding::{Bindings, BoundValue};
use crate::bookmark::Bookmark;
use crate::column::{ResultDescriptor, SqlType, TableRef};
use crate::constants::{
    sqlstate, BulkOperation, Concurrency, LockType, ReturnCode, RowStatus, SetPosOperation,
};
use crate::cursor::{Cursor, ServerContext};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{Error, Result};
use crate::key_resolver::{self, KeySet};
use crate::outcome::{OperationOutcome, RowError};
use crate::row::Value;
use crate::row_buffer::SlotId;

/// Values supplied through `put_data`, by result ordinal
pub(crate) type DeferredValues = IndexMap<usize, Value>;

/// Result of one row of a row-array operation
#[derive(Debug)]
enum RowResult {
    Done { affected: u64, status: RowStatus },
    NoMatch,
    Skipped,
    Failed(Error),
}

/// Folds per-row results into an outcome
struct Tally {
    outcome: OperationOutcome,
    warned: bool,
}

impl Tally {
    fn new() -> Self {
        Self {
            outcome: OperationOutcome::new(),
            warned: false,
        }
    }

    fn record(
        &mut self,
        row: usize,
        result: RowResult,
        current: RowStatus,
        diagnostics: &mut Diagnostics,
    ) {
        match result {
            RowResult::Done { affected, status } => {
                if affected > 1 {
                    tracing::warn!(
                        row = row,
                        affected = affected,
                        "positioned statement changed more than one row"
                    );
                    diagnostics.push(
                        Diagnostic::new(
                            sqlstate::MORE_THAN_ONE_ROW,
                            "More than one row updated/deleted",
                        )
                        .for_row(row),
                    );
                    self.warned = true;
                }
                self.outcome.affected_rows += affected;
                self.outcome.success_count += 1;
                self.outcome.statuses.push(status);
            }
            RowResult::NoMatch => {
                diagnostics.push(
                    Diagnostic::new(sqlstate::NO_ROWS_AFFECTED, "No rows updated/deleted")
                        .for_row(row),
                );
                self.warned = true;
                self.outcome.statuses.push(current);
            }
            RowResult::Skipped => {
                self.outcome.statuses.push(current);
            }
            RowResult::Failed(err) => {
                tracing::debug!(row = row, error = %err, "row failed");
                diagnostics.push(Diagnostic::from_error(&err).for_row(row));
                self.outcome.errors.push(RowError::new(row, &err));
                self.outcome.failure_count += 1;
                self.outcome.statuses.push(RowStatus::Error);
            }
        }
    }

    fn finish(mut self, diagnostics: &mut Diagnostics) -> OperationOutcome {
        let failed = self.outcome.failure_count;
        self.outcome.return_code =
            ReturnCode::from_rows(self.outcome.success_count, failed, self.warned);
        if failed > 0 && self.outcome.return_code == ReturnCode::SuccessWithInfo {
            diagnostics.warn(sqlstate::ROW_ERROR, "Error in row");
        }
        self.outcome
    }
}

/// One positioned call in flight
pub(crate) struct Dispatch<'a, 'c> {
    pub cursor: &'a mut Cursor,
    pub bindings: &'a mut Bindings,
    pub ctx: &'a mut ServerContext<'c>,
    pub diagnostics: &'a mut Diagnostics,
    pub concurrency: Concurrency,
    pub deferred: Option<&'a DeferredValues>,
}

/// Check a `set_position` call before anything runs
pub(crate) fn validate_set_position(
    cursor: &Cursor,
    concurrency: Concurrency,
    row: usize,
    operation: SetPosOperation,
    lock: LockType,
) -> Result<()> {
    cursor.ensure_open()?;
    if lock != LockType::NoChange {
        return Err(Error::FeatureNotSupported(format!(
            "lock type {:?} is not supported",
            lock
        )));
    }
    if !cursor.is_scrollable() && operation != SetPosOperation::Position {
        return Err(Error::InvalidCursorPosition(
            "forward-only cursors only support positioning".to_string(),
        ));
    }
    if concurrency == Concurrency::ReadOnly
        && matches!(
            operation,
            SetPosOperation::Update | SetPosOperation::Delete | SetPosOperation::Add
        )
    {
        return Err(Error::ReadOnlyCursor(format!("{:?}", operation).to_uppercase()));
    }

    if operation == SetPosOperation::Add {
        if row > cursor.row_array_size() {
            return Err(Error::RowOutOfRange {
                row,
                rowset_len: cursor.row_array_size(),
            });
        }
        return Ok(());
    }

    if cursor.rowset_len() == 0 {
        return Err(Error::InvalidCursorState(
            "cursor is not positioned on a rowset".to_string(),
        ));
    }
    if operation == SetPosOperation::Position && row == 0 {
        return Err(Error::InvalidCursorPosition(
            "cannot position on row 0".to_string(),
        ));
    }
    if row > cursor.rowset_len() {
        return Err(Error::RowOutOfRange {
            row,
            rowset_len: cursor.rowset_len(),
        });
    }
    Ok(())
}

impl Dispatch<'_, '_> {
    /// Run a validated `set_position` call
    pub(crate) fn set_position(
        &mut self,
        row: usize,
        operation: SetPosOperation,
    ) -> Result<OperationOutcome> {
        let rows: Vec<usize> = match (operation, row) {
            (SetPosOperation::Add, 0) => (1..=self.cursor.row_array_size()).collect(),
            (_, 0) => (1..=self.cursor.rowset_len()).collect(),
            (_, row) => vec![row],
        };
        tracing::debug!(operation = ?operation, rows = rows.len(), "set_position");

        match operation {
            SetPosOperation::Position => Ok(self.position(row)),
            SetPosOperation::Refresh => Ok(self.refresh(&rows)),
            SetPosOperation::Update => self.update_rows(&rows, row == 0),
            SetPosOperation::Delete => self.delete_rows(&rows),
            SetPosOperation::Add => self.add_rows(&rows),
        }
    }

    /// Run a `bulk_operation` call
    pub(crate) fn bulk(&mut self, operation: BulkOperation) -> Result<OperationOutcome> {
        self.cursor.ensure_open()?;
        if !self.cursor.is_scrollable() {
            return Err(Error::InvalidCursorPosition(
                "bulk operations need a scrollable cursor".to_string(),
            ));
        }
        if self.concurrency == Concurrency::ReadOnly
            && operation != BulkOperation::FetchByBookmark
        {
            return Err(Error::ReadOnlyCursor(format!("{:?}", operation).to_uppercase()));
        }
        tracing::debug!(operation = ?operation, "bulk_operation");

        match operation {
            BulkOperation::Add => {
                let rows: Vec<usize> = (1..=self.cursor.row_array_size()).collect();
                self.add_rows(&rows)
            }
            BulkOperation::FetchByBookmark => {
                let targets = self.bookmark_targets()?;
                Ok(self.fetch_by_bookmark(&targets))
            }
            BulkOperation::UpdateByBookmark => {
                let targets = self.bookmark_targets()?;
                self.update_by_bookmark(&targets)
            }
            BulkOperation::DeleteByBookmark => {
                let targets = self.bookmark_targets()?;
                self.delete_by_bookmark(&targets)
            }
        }
    }

    /// Bound bookmarks paired with their 1-based row; empty entries are None
    fn bookmark_targets(&self) -> Result<Vec<(usize, Option<Bookmark>)>> {
        if !self.cursor.uses_bookmarks() {
            return Err(Error::BookmarksDisabled);
        }
        if !self.bindings.has_bookmarks() {
            return Err(Error::DegreeMismatch);
        }
        let rows = self.bindings.bookmark_rows().min(self.cursor.row_array_size());
        Ok((0..rows)
            .map(|i| (i + 1, self.bindings.bookmark(i).cloned()))
            .collect())
    }

    // =========================================================================
    // Position and refresh
    // =========================================================================

    fn position(&mut self, row: usize) -> OperationOutcome {
        self.cursor.set_current_row(row);
        let status = self.cursor.statuses().get(row - 1).copied().unwrap_or(RowStatus::NoRow);
        let mut outcome = OperationOutcome::new();
        outcome.statuses.push(status);
        outcome.success_count = 1;
        outcome
    }

    fn refresh(&mut self, rows: &[usize]) -> OperationOutcome {
        let fetched = self.cursor.refresh(rows, self.ctx, self.diagnostics);
        let mut tally = Tally::new();
        for (row, fetched_row) in rows.iter().zip(&fetched) {
            let result = match fetched_row.status {
                RowStatus::Error => RowResult::Failed(Error::Internal(format!(
                    "row {} could not be refreshed",
                    row
                ))),
                status => RowResult::Done { affected: 0, status },
            };
            tally.record(*row, result, fetched_row.status, self.diagnostics);
        }
        if let Some(&first) = rows.first() {
            self.cursor.set_current_row(first);
        }
        let mut outcome = tally.finish(self.diagnostics);
        outcome.rows = fetched;
        outcome
    }

    // =========================================================================
    // Update and delete
    // =========================================================================

    fn key_set(&mut self) -> Result<KeySet> {
        self.cursor.key_set(self.ctx.metadata)
    }

    fn prepare_write(&mut self, rows: &[usize]) -> Result<KeySet> {
        let key = self.key_set()?;
        if self.cursor.refreshes_before_write() {
            self.cursor.reread(Some(rows), self.ctx, self.diagnostics);
        }
        Ok(key)
    }

    /// Assignments of one bound row, restricted to the key table
    fn assignments(
        &self,
        binding_row: usize,
        descriptor: &ResultDescriptor,
        table: &TableRef,
    ) -> Result<Vec<(usize, Value)>> {
        let mut out = Vec::new();
        for (ordinal, column) in descriptor.columns().iter().enumerate() {
            if !column.belongs_to(table) {
                continue;
            }
            match self.bindings.value(ordinal, binding_row) {
                BoundValue::Ignore => {}
                BoundValue::Value(v) => out.push((ordinal, v.clone())),
                BoundValue::DataAtExec => {
                    let value = self
                        .deferred
                        .and_then(|d| d.get(&ordinal))
                        .cloned()
                        .ok_or_else(|| {
                            Error::FunctionSequence(format!(
                                "no data supplied for data-at-exec column {}",
                                column.name
                            ))
                        })?;
                    out.push((ordinal, value));
                }
            }
        }
        Ok(out)
    }

    fn update_rows(&mut self, rows: &[usize], whole_rowset: bool) -> Result<OperationOutcome> {
        let key = self.prepare_write(rows)?;
        let descriptor = self.cursor.descriptor().clone();

        if !whole_rowset {
            if let Some(&row) = rows.first() {
                if self.assignments(row - 1, &descriptor, key.table())?.is_empty() {
                    return Err(Error::DegreeMismatch);
                }
            }
        }

        let mut tally = Tally::new();
        for &row in rows {
            let current = self.current_status(row);
            let result = match self.cursor.rowset_slot(row) {
                Some(id) => self.update_slot(id, row - 1, &key, &descriptor),
                None => RowResult::Failed(Error::InvalidCursorPosition(format!(
                    "row {} is not in the rowset",
                    row
                ))),
            };
            tally.record(row, result, current, self.diagnostics);
        }
        self.cursor.sync_statuses();
        Ok(tally.finish(self.diagnostics))
    }

    fn delete_rows(&mut self, rows: &[usize]) -> Result<OperationOutcome> {
        let key = self.prepare_write(rows)?;
        let mut tally = Tally::new();
        for &row in rows {
            let current = self.current_status(row);
            let result = match self.cursor.rowset_slot(row) {
                Some(id) => self.delete_slot(id, &key),
                None => RowResult::Failed(Error::InvalidCursorPosition(format!(
                    "row {} is not in the rowset",
                    row
                ))),
            };
            tally.record(row, result, current, self.diagnostics);
        }
        self.cursor.sync_statuses();
        Ok(tally.finish(self.diagnostics))
    }

    fn current_status(&self, row: usize) -> RowStatus {
        self.cursor
            .rowset_slot(row)
            .and_then(|id| self.cursor.buffer().get(id))
            .map_or(RowStatus::NoRow, |slot| slot.status())
    }

    fn live_image(&self, id: SlotId) -> Result<Vec<Value>> {
        match self.cursor.buffer().get(id) {
            Some(slot) if slot.is_deleted() => Err(Error::InvalidCursorPosition(
                "row has been deleted".to_string(),
            )),
            Some(slot) => Ok(slot.image().to_vec()),
            None => Err(Error::Internal("row is no longer buffered".to_string())),
        }
    }

    fn update_slot(
        &mut self,
        id: SlotId,
        binding_row: usize,
        key: &KeySet,
        descriptor: &ResultDescriptor,
    ) -> RowResult {
        let image = match self.live_image(id) {
            Ok(image) => image,
            Err(err) => return RowResult::Failed(err),
        };
        let assignments = match self.assignments(binding_row, descriptor, key.table()) {
            Ok(a) if a.is_empty() => return RowResult::Skipped,
            Ok(a) => a,
            Err(err) => return RowResult::Failed(err),
        };
        let request = match self.ctx.synthesizer.update(key, descriptor, &image, &assignments) {
            Ok(request) => request,
            Err(err) => return RowResult::Failed(err),
        };
        match self.ctx.executor.execute(&request) {
            Ok(out) if out.affected_rows == 0 => RowResult::NoMatch,
            Ok(out) => {
                if let Some(slot) = self.cursor.buffer_mut().get_mut(id) {
                    slot.apply(&assignments);
                    slot.set_status(RowStatus::Updated);
                }
                RowResult::Done {
                    affected: out.affected_rows,
                    status: RowStatus::Updated,
                }
            }
            Err(err) => RowResult::Failed(err),
        }
    }

    fn delete_slot(&mut self, id: SlotId, key: &KeySet) -> RowResult {
        let image = match self.live_image(id) {
            Ok(image) => image,
            Err(err) => return RowResult::Failed(err),
        };
        let request = match self.ctx.synthesizer.delete(key, &image) {
            Ok(request) => request,
            Err(err) => return RowResult::Failed(err),
        };
        match self.ctx.executor.execute(&request) {
            Ok(out) if out.affected_rows == 0 => RowResult::NoMatch,
            Ok(out) => {
                if let Some(slot) = self.cursor.buffer_mut().get_mut(id) {
                    slot.set_status(RowStatus::Deleted);
                }
                self.cursor.bookmarks_mut().retire(id);
                RowResult::Done {
                    affected: out.affected_rows,
                    status: RowStatus::Deleted,
                }
            }
            Err(err) => RowResult::Failed(err),
        }
    }

    // =========================================================================
    // Add
    // =========================================================================

    fn add_rows(&mut self, rows: &[usize]) -> Result<OperationOutcome> {
        let descriptor = self.cursor.descriptor().clone();
        let table = key_resolver::single_table(&descriptor)?;
        let auto_key = self.auto_increment_column(&descriptor);

        let mut tally = Tally::new();
        for &row in rows {
            let (result, bookmark) = self.add_row(row, &table, &descriptor, auto_key);
            self.bindings.set_bookmark(row - 1, bookmark.clone());
            tally.outcome.bookmarks.push(bookmark);
            tally.record(row, result, RowStatus::NoRow, self.diagnostics);
        }
        Ok(tally.finish(self.diagnostics))
    }

    /// Single integer key column the server may fill in on insert
    fn auto_increment_column(&mut self, descriptor: &ResultDescriptor) -> Option<usize> {
        let key = self.key_set().ok()?;
        match key.columns() {
            [column] if key.is_unique() => {
                let sql_type = descriptor.column(column.ordinal)?.sql_type;
                matches!(
                    sql_type,
                    SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer | SqlType::BigInt
                )
                .then_some(column.ordinal)
            }
            _ => None,
        }
    }

    fn add_row(
        &mut self,
        row: usize,
        table: &TableRef,
        descriptor: &ResultDescriptor,
        auto_key: Option<usize>,
    ) -> (RowResult, Option<Bookmark>) {
        let values = match self.assignments(row - 1, descriptor, table) {
            Ok(values) => values,
            Err(err) => return (RowResult::Failed(err), None),
        };
        let request = match self.ctx.synthesizer.insert(table, descriptor, &values) {
            Ok(request) => request,
            Err(err) => return (RowResult::Failed(err), None),
        };
        let out = match self.ctx.executor.execute(&request) {
            Ok(out) => out,
            Err(err) => return (RowResult::Failed(err), None),
        };

        let mut image = vec![Value::Null; descriptor.len()];
        for (ordinal, value) in values {
            image[ordinal] = value;
        }
        if let (Some(ordinal), Some(id)) = (auto_key, out.last_insert_id) {
            if image[ordinal].is_null() {
                image[ordinal] = Value::Integer(id as i64);
            }
        }
        let (_, bookmark) = self.cursor.add_row(image);
        (
            RowResult::Done {
                affected: out.affected_rows,
                status: RowStatus::Added,
            },
            bookmark,
        )
    }

    // =========================================================================
    // Bookmark operations
    // =========================================================================

    fn resolve(&self, bookmark: &Bookmark) -> Result<SlotId> {
        self.cursor
            .bookmarks()
            .resolve(bookmark)
            .ok_or_else(|| Error::BookmarkNotFound(bookmark.to_hex()))
    }

    fn fetch_by_bookmark(&mut self, targets: &[(usize, Option<Bookmark>)]) -> OperationOutcome {
        let mut entries = Vec::with_capacity(targets.len());
        let mut statuses = Vec::with_capacity(targets.len());
        let mut tally = Tally::new();
        for (row, bookmark) in targets {
            let Some(bookmark) = bookmark else {
                entries.push(None);
                statuses.push(RowStatus::NoRow);
                tally.record(*row, RowResult::Skipped, RowStatus::NoRow, self.diagnostics);
                continue;
            };
            match self.resolve(bookmark) {
                Ok(id) => {
                    let status = self.status_of(id);
                    entries.push(Some(id));
                    statuses.push(status);
                    let result = RowResult::Done {
                        affected: 0,
                        status,
                    };
                    tally.record(*row, result, status, self.diagnostics);
                }
                Err(err) => {
                    entries.push(None);
                    statuses.push(RowStatus::Error);
                    tally.record(*row, RowResult::Failed(err), RowStatus::Error, self.diagnostics);
                }
            }
        }
        self.cursor.replace_rowset(entries, statuses);
        let mut outcome = tally.finish(self.diagnostics);
        outcome.rows = self.cursor.rowset();
        outcome
    }

    fn update_by_bookmark(
        &mut self,
        targets: &[(usize, Option<Bookmark>)],
    ) -> Result<OperationOutcome> {
        let key = self.key_set()?;
        let descriptor = self.cursor.descriptor().clone();
        let mut tally = Tally::new();
        for (row, bookmark) in targets {
            let (result, current) = match bookmark.as_ref().map(|b| self.resolve(b)) {
                None => (RowResult::Skipped, RowStatus::NoRow),
                Some(Ok(id)) => {
                    let current = self.status_of(id);
                    (self.update_slot(id, row - 1, &key, &descriptor), current)
                }
                Some(Err(err)) => (RowResult::Failed(err), RowStatus::Error),
            };
            tally.record(*row, result, current, self.diagnostics);
        }
        self.cursor.sync_statuses();
        Ok(tally.finish(self.diagnostics))
    }

    fn delete_by_bookmark(
        &mut self,
        targets: &[(usize, Option<Bookmark>)],
    ) -> Result<OperationOutcome> {
        let key = self.key_set()?;
        let mut tally = Tally::new();
        for (row, bookmark) in targets {
            let (result, current) = match bookmark.as_ref().map(|b| self.resolve(b)) {
                None => (RowResult::Skipped, RowStatus::NoRow),
                Some(Ok(id)) => {
                    let current = self.status_of(id);
                    (self.delete_slot(id, &key), current)
                }
                Some(Err(err)) => (RowResult::Failed(err), RowStatus::Error),
            };
            tally.record(*row, result, current, self.diagnostics);
        }
        self.cursor.sync_statuses();
        Ok(tally.finish(self.diagnostics))
    }

    fn status_of(&self, id: SlotId) -> RowStatus {
        self.cursor
            .buffer()
            .get(id)
            .map_or(RowStatus::NoRow, |slot| slot.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDescriptor;
    use crate::config::StatementOptions;
    use crate::constants::CursorType;
    use crate::cursor::FetchOrientation;
    use crate::executor::{
        ExecOutcome, NoMetadata, QueryExecutor, QueryOutput, SqlRequest, VecRowStream,
    };
    use crate::synthesizer::Synthesizer;

    /// Records executed SQL and answers with a fixed affected count
    struct Recorder {
        sql: Vec<String>,
        affected: u64,
    }

    impl QueryExecutor for Recorder {
        fn query(&mut self, _request: &SqlRequest) -> Result<QueryOutput> {
            Err(Error::Internal("no queries".to_string()))
        }

        fn execute(&mut self, request: &SqlRequest) -> Result<ExecOutcome> {
            self.sql.push(request.sql.clone());
            Ok(ExecOutcome {
                affected_rows: self.affected,
                last_insert_id: Some(42),
            })
        }
    }

    fn descriptor() -> ResultDescriptor {
        let t = TableRef::new("items");
        ResultDescriptor::new(vec![
            ColumnDescriptor::new("id", SqlType::Integer).with_table(t.clone()).primary_key(),
            ColumnDescriptor::new("name", SqlType::Varchar).with_table(t),
        ])
    }

    fn cursor(options: StatementOptions) -> Cursor {
        let rows = (1..=3)
            .map(|i| vec![Value::Integer(i), Value::from(format!("n{}", i))])
            .collect();
        Cursor::open(options.cursor_type, descriptor(), Box::new(VecRowStream::new(rows)), &options)
    }

    struct Harness {
        cursor: Cursor,
        bindings: Bindings,
        server: Recorder,
        diagnostics: Diagnostics,
    }

    impl Harness {
        fn new(options: StatementOptions, affected: u64) -> Self {
            Self {
                cursor: cursor(options),
                bindings: Bindings::new(),
                server: Recorder { sql: Vec::new(), affected },
                diagnostics: Diagnostics::new(),
            }
        }

        fn run<T>(&mut self, f: impl FnOnce(&mut Dispatch<'_, '_>) -> T) -> T {
            let synthesizer = Synthesizer::default();
            let mut ctx = ServerContext {
                executor: &mut self.server,
                metadata: &NoMetadata,
                synthesizer: &synthesizer,
            };
            let mut dispatch = Dispatch {
                cursor: &mut self.cursor,
                bindings: &mut self.bindings,
                ctx: &mut ctx,
                diagnostics: &mut self.diagnostics,
                concurrency: Concurrency::Values,
                deferred: None,
            };
            f(&mut dispatch)
        }

        fn fetch(&mut self, orientation: FetchOrientation) {
            self.run(|d| d.cursor.fetch(&orientation, d.ctx, d.diagnostics))
                .unwrap();
        }
    }

    fn scrollable(size: usize) -> StatementOptions {
        StatementOptions::new()
            .cursor_type(CursorType::Static)
            .row_array_size(size)
    }

    /// SQLSTATE of a rejected set_position with no lock change
    fn rejected(
        cursor: &Cursor,
        concurrency: Concurrency,
        row: usize,
        op: SetPosOperation,
    ) -> String {
        validate_set_position(cursor, concurrency, row, op, LockType::NoChange)
            .unwrap_err()
            .sqlstate()
            .to_string()
    }

    #[test]
    fn test_validate_lock_type() {
        let c = cursor(scrollable(1));
        let err = validate_set_position(
            &c,
            Concurrency::Values,
            1,
            SetPosOperation::Position,
            LockType::Exclusive,
        )
        .unwrap_err();
        assert_eq!(err.sqlstate(), "HYC00");
    }

    #[test]
    fn test_validate_row_range() {
        let mut h = Harness::new(scrollable(2), 1);
        h.fetch(FetchOrientation::First);
        let values = Concurrency::Values;
        assert_eq!(rejected(&h.cursor, values, 3, SetPosOperation::Update), "HY107");
        assert_eq!(rejected(&h.cursor, values, 0, SetPosOperation::Position), "HY109");
        let read_only = Concurrency::ReadOnly;
        assert_eq!(rejected(&h.cursor, read_only, 1, SetPosOperation::Delete), "HY092");
    }

    #[test]
    fn test_validate_forward_only() {
        let c = cursor(StatementOptions::new());
        assert_eq!(rejected(&c, Concurrency::Values, 1, SetPosOperation::Update), "HY109");
    }

    #[test]
    fn test_update_single_row() {
        let mut h = Harness::new(scrollable(2), 1);
        h.fetch(FetchOrientation::First);
        h.bindings.bind_column(1, vec![Value::from("x").into(), Value::from("y").into()]);
        let out = h.run(|d| d.set_position(2, SetPosOperation::Update)).unwrap();
        assert_eq!(out.return_code, ReturnCode::Success);
        assert_eq!(out.statuses, vec![RowStatus::Updated]);
        assert_eq!(h.server.sql, vec!["UPDATE `items` SET `name`='y' WHERE `id`=2"]);
        assert_eq!(h.cursor.statuses(), vec![RowStatus::Success, RowStatus::Updated]);
        assert_eq!(h.cursor.row(2).unwrap().get_string(1), Some("y"));
    }

    #[test]
    fn test_update_with_nothing_bound() {
        let mut h = Harness::new(scrollable(2), 1);
        h.fetch(FetchOrientation::First);
        let err = h.run(|d| d.set_position(1, SetPosOperation::Update)).unwrap_err();
        assert_eq!(err, Error::DegreeMismatch);
        let out = h.run(|d| d.set_position(0, SetPosOperation::Update)).unwrap();
        assert_eq!(out.return_code, ReturnCode::Success);
        assert!(h.server.sql.is_empty());
    }

    #[test]
    fn test_no_match_warns_and_keeps_status() {
        let mut h = Harness::new(scrollable(1), 0);
        h.fetch(FetchOrientation::First);
        h.bindings.bind_column(1, vec![Value::from("x").into()]);
        let out = h.run(|d| d.set_position(1, SetPosOperation::Update)).unwrap();
        assert_eq!(out.return_code, ReturnCode::SuccessWithInfo);
        assert_eq!(out.statuses, vec![RowStatus::Success]);
        assert!(h.diagnostics.contains("01S03"));
    }

    #[test]
    fn test_delete_retires_bookmark() {
        let mut h = Harness::new(scrollable(3).with_bookmarks(), 1);
        h.fetch(FetchOrientation::First);
        let bm = h.cursor.rowset()[1].bookmark.clone().unwrap();
        let out = h.run(|d| d.set_position(2, SetPosOperation::Delete)).unwrap();
        assert_eq!(out.statuses, vec![RowStatus::Deleted]);
        assert_eq!(h.server.sql, vec!["DELETE FROM `items` WHERE `id`=2"]);
        assert!(h.cursor.bookmarks().resolve(&bm).is_none());
        assert!(h.cursor.row(2).is_none());

        let out = h.run(|d| d.set_position(2, SetPosOperation::Delete)).unwrap();
        assert_eq!(out.return_code, ReturnCode::Error);
        assert_eq!(h.server.sql.len(), 1);
    }

    #[test]
    fn test_delete_more_than_one_row_warns() {
        let mut h = Harness::new(scrollable(1), 2);
        h.fetch(FetchOrientation::First);
        let out = h.run(|d| d.set_position(1, SetPosOperation::Delete)).unwrap();
        assert_eq!(out.return_code, ReturnCode::SuccessWithInfo);
        assert_eq!(out.affected_rows, 2);
        assert!(h.diagnostics.contains("01S04"));
    }

    #[test]
    fn test_add_fills_auto_increment_key() {
        let mut h = Harness::new(scrollable(1).with_bookmarks(), 1);
        h.bindings.bind_column(0, vec![BoundValue::Ignore]);
        h.bindings.bind_column(1, vec![Value::from("new").into()]);
        let out = h.run(|d| d.set_position(0, SetPosOperation::Add)).unwrap();
        assert_eq!(out.statuses, vec![RowStatus::Added]);
        assert_eq!(h.server.sql, vec!["INSERT INTO `items` (`name`) VALUES ('new')"]);
        let bm = out.bookmarks[0].clone().unwrap();
        assert_eq!(h.bindings.bookmark(0), Some(&bm));

        let id = h.cursor.bookmarks().resolve(&bm).unwrap();
        let slot = h.cursor.buffer().get(id).unwrap();
        assert_eq!(slot.values()[0], Value::Integer(42));
        assert_eq!(slot.position(), None);
    }

    #[test]
    fn test_bulk_needs_bookmarks() {
        let mut h = Harness::new(scrollable(1), 1);
        h.fetch(FetchOrientation::First);
        let err = h.run(|d| d.bulk(BulkOperation::DeleteByBookmark)).unwrap_err();
        assert_eq!(err, Error::BookmarksDisabled);

        let mut h = Harness::new(scrollable(1).with_bookmarks(), 1);
        h.fetch(FetchOrientation::First);
        let err = h.run(|d| d.bulk(BulkOperation::DeleteByBookmark)).unwrap_err();
        assert_eq!(err, Error::DegreeMismatch);
    }

    #[test]
    fn test_fetch_by_bookmark_reports_missing_rows() {
        let mut h = Harness::new(scrollable(2).with_bookmarks(), 1);
        h.fetch(FetchOrientation::Absolute(2));
        let known = h.cursor.rowset()[1].bookmark.clone().unwrap();
        let unknown = Bookmark::from_bytes(vec![0u8, 0, 0, 0, 0, 0, 0, 77]);
        h.bindings.bind_bookmarks(vec![unknown, known]);

        let out = h.run(|d| d.bulk(BulkOperation::FetchByBookmark)).unwrap();
        assert_eq!(out.return_code, ReturnCode::SuccessWithInfo);
        assert_eq!(out.statuses, vec![RowStatus::Error, RowStatus::Success]);
        assert_eq!(out.errors[0].sqlstate, "HY111");
        assert_eq!(out.rows[1].row.as_ref().and_then(|r| r.get_i64(0)), Some(3));
        assert!(h.diagnostics.contains("01S01"));
    }
}
