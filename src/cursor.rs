//! Scrollable cursor state machine
//!
//! The server delivers every result as a forward-only stream. A [`Cursor`]
//! turns it into a scrollable one by pulling rows into a [`RowBuffer`] on
//! demand and positioning a rowset (a window of `row_array_size` rows) over
//! the buffered positions.
//!
//! What a cursor type may do is fixed by a behaviour table chosen at open:
//!
//! | type          | scroll | keeps rows | re-reads by key | refresh before write |
//! |---------------|--------|------------|-----------------|----------------------|
//! | forward-only  | no     | no         | no              | no                   |
//! | static        | yes    | yes        | no              | no                   |
//! | keyset-driven | yes    | yes        | yes             | no                   |
//! | dynamic       | yes    | yes        | yes             | yes                  |
//!
//! # Example
//!
//! ```rust,ignore
//! use rowset_cursor::{CursorType, FetchOrientation, StatementOptions};
//!
//! let mut stmt = conn.statement_with(
//!     StatementOptions::new().cursor_type(CursorType::Static).row_array_size(10),
//! )?;
//! stmt.execute("SELECT id, name FROM items")?;
//!
//! let last = stmt.fetch(FetchOrientation::Last)?;
//! let third = stmt.fetch(FetchOrientation::Absolute(3))?;
//! let back = stmt.fetch(FetchOrientation::Relative(-1))?;
//! stmt.close_cursor()?;
//! ```

use std::fmt;
use std::sync::Arc;

use crate::bookmark::{Bookmark, BookmarkManager};
use crate::column::ResultDescriptor;
use crate::config::StatementOptions;
use crate::constants::{Concurrency, CursorType, ReturnCode, RowStatus};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{Error, Result};
use crate::executor::{MetadataProvider, QueryExecutor, RowStream, SqlRequest};
use crate::key_resolver::{self, KeySet};
use crate::outcome::{FetchOutcome, FetchedRow};
use crate::row::{Row, Value};
use crate::row_buffer::{RowBuffer, SlotId};
use crate::synthesizer::Synthesizer;

/// Fetch direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOrientation {
    /// Rowset following the current one
    Next,
    /// Rowset preceding the current one
    Prior,
    /// First rowset
    First,
    /// Last rowset
    Last,
    /// Rowset starting at a row; negative counts from the end
    Absolute(i64),
    /// Rowset starting `n` rows from the current rowset start
    Relative(i64),
    /// Rowset starting `offset` rows from a bookmarked row
    Bookmark(Bookmark, i64),
}

/// Capabilities of a cursor type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Behavior {
    scrollable: bool,
    retains_rows: bool,
    rereads_rows: bool,
    refresh_before_write: bool,
}

const FORWARD_ONLY: Behavior = Behavior {
    scrollable: false,
    retains_rows: false,
    rereads_rows: false,
    refresh_before_write: false,
};

const STATIC: Behavior = Behavior {
    scrollable: true,
    retains_rows: true,
    rereads_rows: false,
    refresh_before_write: false,
};

const KEYSET_DRIVEN: Behavior = Behavior {
    scrollable: true,
    retains_rows: true,
    rereads_rows: true,
    refresh_before_write: false,
};

const DYNAMIC: Behavior = Behavior {
    scrollable: true,
    retains_rows: true,
    rereads_rows: true,
    refresh_before_write: true,
};

fn behavior(kind: CursorType) -> Behavior {
    match kind {
        CursorType::ForwardOnly => FORWARD_ONLY,
        CursorType::Static => STATIC,
        CursorType::KeysetDriven => KEYSET_DRIVEN,
        CursorType::Dynamic => DYNAMIC,
    }
}

/// Lifecycle state of an opened cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Result open; fetches and positioned operations allowed
    Open,
    /// Result released
    Closed,
}

/// Where a fetch lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    BeforeFirst,
    AfterLast,
    Row(usize),
}

/// Server access needed while a cursor works
pub(crate) struct ServerContext<'a> {
    pub executor: &'a mut dyn QueryExecutor,
    pub metadata: &'a dyn MetadataProvider,
    pub synthesizer: &'a Synthesizer,
}

/// An open result set with a scrollable rowset
pub struct Cursor {
    kind: CursorType,
    behavior: Behavior,
    state: CursorState,
    descriptor: ResultDescriptor,
    names: Arc<[String]>,
    stream: Option<Box<dyn RowStream>>,
    buffer: RowBuffer,
    bookmarks: BookmarkManager,
    use_bookmarks: bool,
    retrieve_data: bool,
    lock_rereads: bool,
    max_rows: Option<usize>,
    row_array_size: usize,
    /// Absolute position of the rowset's first row; 0 before first
    rowset_start: usize,
    after_last: bool,
    rowset: Vec<Option<SlotId>>,
    statuses: Vec<RowStatus>,
    /// 1-based row within the rowset; 0 when no row is current
    current_row: usize,
    key: Option<Result<KeySet>>,
}

impl Cursor {
    pub(crate) fn open(
        kind: CursorType,
        descriptor: ResultDescriptor,
        stream: Box<dyn RowStream>,
        options: &StatementOptions,
    ) -> Self {
        tracing::debug!(
            cursor_type = %kind,
            columns = descriptor.len(),
            row_array_size = options.row_array_size,
            "cursor opened"
        );
        Self {
            kind,
            behavior: behavior(kind),
            state: CursorState::Open,
            names: descriptor.names().into(),
            descriptor,
            stream: Some(stream),
            buffer: RowBuffer::new(),
            bookmarks: BookmarkManager::new(),
            use_bookmarks: options.use_bookmarks,
            retrieve_data: options.retrieve_data,
            lock_rereads: options.concurrency == Concurrency::Lock,
            max_rows: options.max_rows,
            row_array_size: options.row_array_size.max(1),
            rowset_start: 0,
            after_last: false,
            rowset: Vec::new(),
            statuses: Vec::new(),
            current_row: 0,
            key: None,
        }
    }

    /// Cursor type
    pub fn kind(&self) -> CursorType {
        self.kind
    }

    /// Lifecycle state
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Whether the cursor is open
    pub fn is_open(&self) -> bool {
        self.state == CursorState::Open
    }

    /// Result metadata
    pub fn descriptor(&self) -> &ResultDescriptor {
        &self.descriptor
    }

    /// Rows per rowset
    pub fn row_array_size(&self) -> usize {
        self.row_array_size
    }

    /// Absolute position of the first rowset row (0 when not on a row)
    pub fn position(&self) -> usize {
        if self.after_last {
            0
        } else {
            self.rowset_start
        }
    }

    /// Rows in the current rowset
    pub fn rowset_len(&self) -> usize {
        self.rowset.len()
    }

    /// Whether the cursor is past the last row
    pub fn is_after_last(&self) -> bool {
        self.after_last
    }

    /// Current row within the rowset (1-based), if any
    pub fn current_row(&self) -> Option<usize> {
        (self.current_row > 0).then_some(self.current_row)
    }

    /// Statuses of the current rowset, padded with `NoRow`
    pub fn statuses(&self) -> Vec<RowStatus> {
        let mut statuses = self.statuses.clone();
        statuses.resize(self.row_array_size.max(statuses.len()), RowStatus::NoRow);
        statuses
    }

    /// Whether bookmarks are minted
    pub fn uses_bookmarks(&self) -> bool {
        self.use_bookmarks
    }

    pub(crate) fn is_scrollable(&self) -> bool {
        self.behavior.scrollable
    }

    pub(crate) fn refreshes_before_write(&self) -> bool {
        self.behavior.refresh_before_write
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        match self.state {
            CursorState::Open => Ok(()),
            CursorState::Closed => Err(Error::InvalidCursorState("cursor is closed".to_string())),
        }
    }

    /// Release the result and every buffered row
    pub(crate) fn close(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        self.state = CursorState::Closed;
        self.stream = None;
        self.buffer.clear();
        self.bookmarks = BookmarkManager::new();
        self.rowset.clear();
        self.statuses.clear();
        self.rowset_start = 0;
        self.current_row = 0;
        self.after_last = false;
        self.key = None;
        tracing::debug!(cursor_type = %self.kind, "cursor closed");
    }

    // =========================================================================
    // Stream and buffer
    // =========================================================================

    /// Read from the stream until `position` is buffered or the result ends
    fn pull_to(&mut self, position: usize) -> Result<()> {
        while self.buffer.known_rows() < position && !self.buffer.is_exhausted() {
            if self
                .max_rows
                .is_some_and(|max| self.buffer.known_rows() >= max)
            {
                self.buffer.mark_exhausted();
                break;
            }
            let next = match self.stream.as_mut() {
                Some(stream) => stream.next_row()?,
                None => None,
            };
            match next {
                Some(values) => {
                    self.buffer.push(values);
                }
                None => {
                    self.buffer.mark_exhausted();
                    self.stream = None;
                    tracing::trace!(rows = self.buffer.known_rows(), "result stream exhausted");
                }
            }
        }
        Ok(())
    }

    /// Read the whole result; returns the row count
    fn drain(&mut self) -> Result<usize> {
        self.pull_to(usize::MAX)?;
        Ok(self.buffer.known_rows())
    }

    pub(crate) fn buffer(&self) -> &RowBuffer {
        &self.buffer
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut RowBuffer {
        &mut self.buffer
    }

    pub(crate) fn bookmarks(&self) -> &BookmarkManager {
        &self.bookmarks
    }

    pub(crate) fn bookmarks_mut(&mut self) -> &mut BookmarkManager {
        &mut self.bookmarks
    }

    /// Key set of the result, resolved once and cached
    pub(crate) fn key_set(&mut self, metadata: &dyn MetadataProvider) -> Result<KeySet> {
        if self.key.is_none() {
            self.key = Some(key_resolver::resolve(&self.descriptor, metadata));
        }
        match &self.key {
            Some(resolved) => resolved.clone(),
            None => Err(Error::Internal("key set not resolved".to_string())),
        }
    }

    // =========================================================================
    // Fetching
    // =========================================================================

    fn target(&mut self, orientation: &FetchOrientation) -> Result<Target> {
        let size = self.row_array_size as i64;
        let start = self.rowset_start as i64;

        let target = match orientation {
            FetchOrientation::Next => {
                if self.after_last {
                    Target::AfterLast
                } else if start == 0 {
                    Target::Row(1)
                } else {
                    Target::Row((start + size) as usize)
                }
            }
            FetchOrientation::Prior => {
                if self.after_last {
                    let total = self.drain()? as i64;
                    if total == 0 {
                        Target::BeforeFirst
                    } else {
                        Target::Row((total - size + 1).max(1) as usize)
                    }
                } else if start <= 1 {
                    Target::BeforeFirst
                } else if start <= size {
                    Target::Row(1)
                } else {
                    Target::Row((start - size) as usize)
                }
            }
            FetchOrientation::First => Target::Row(1),
            FetchOrientation::Last => {
                let total = self.drain()? as i64;
                if total == 0 {
                    Target::AfterLast
                } else {
                    Target::Row((total - size + 1).max(1) as usize)
                }
            }
            FetchOrientation::Absolute(n) => {
                let n = *n;
                if n > 0 {
                    Target::Row(n as usize)
                } else if n == 0 {
                    Target::BeforeFirst
                } else {
                    let total = self.drain()? as i64;
                    from_end(total, n, size)
                }
            }
            FetchOrientation::Relative(n) => {
                let n = *n;
                if self.after_last {
                    if n >= 0 {
                        Target::AfterLast
                    } else {
                        let total = self.drain()? as i64;
                        from_end(total, n, size)
                    }
                } else if start == 0 {
                    if n > 0 {
                        Target::Row(n as usize)
                    } else {
                        Target::BeforeFirst
                    }
                } else {
                    match start.checked_add(n) {
                        Some(p) if p >= 1 => Target::Row(p as usize),
                        Some(_) if n.unsigned_abs() <= size as u64 => Target::Row(1),
                        None if n > 0 => Target::AfterLast,
                        _ => Target::BeforeFirst,
                    }
                }
            }
            FetchOrientation::Bookmark(bookmark, offset) => {
                if !self.use_bookmarks {
                    return Err(Error::BookmarksDisabled);
                }
                // A retired bookmark still names its row's position
                let position = self
                    .bookmarks
                    .locate(bookmark)
                    .and_then(|id| self.buffer.get(id))
                    .and_then(|slot| slot.position())
                    .ok_or_else(|| Error::BookmarkNotFound(bookmark.to_hex()))?;
                match (position as i64).checked_add(*offset) {
                    Some(p) if p >= 1 => Target::Row(p as usize),
                    None if *offset > 0 => Target::AfterLast,
                    _ => Target::BeforeFirst,
                }
            }
        };
        Ok(target)
    }

    fn clear_rowset(&mut self) {
        self.rowset.clear();
        self.statuses.clear();
        self.current_row = 0;
    }

    /// Position a rowset; returns the outcome the caller sees
    pub(crate) fn fetch(
        &mut self,
        orientation: &FetchOrientation,
        ctx: &mut ServerContext<'_>,
        diagnostics: &mut Diagnostics,
    ) -> Result<FetchOutcome> {
        self.ensure_open()?;
        if !self.behavior.scrollable && *orientation != FetchOrientation::Next {
            return Err(Error::FetchTypeOutOfRange(
                "wrong fetch type with forward-only cursor".to_string(),
            ));
        }

        let position = match self.target(orientation)? {
            Target::BeforeFirst => {
                self.clear_rowset();
                self.rowset_start = 0;
                self.after_last = false;
                tracing::debug!("cursor positioned before first row");
                return Ok(FetchOutcome::no_data(self.row_array_size, false));
            }
            Target::AfterLast => return Ok(self.move_after_last()),
            Target::Row(position) => position,
        };

        if !self.behavior.retains_rows && self.buffer.known_rows() < position {
            let known = self.buffer.known_rows();
            self.buffer.discard_through(known);
            self.bookmarks.forget_all();
        }

        let last_wanted = position.saturating_add(self.row_array_size - 1);
        self.pull_to(last_wanted)?;
        let known = self.buffer.known_rows();
        if position > known {
            return Ok(self.move_after_last());
        }

        let end = last_wanted.min(known);
        self.rowset = (position..=end).map(|p| self.buffer.slot_at(p)).collect();
        self.rowset_start = position;
        self.after_last = false;
        self.current_row = 1;

        if self.behavior.rereads_rows {
            self.reread(None, ctx, diagnostics);
        }
        self.sync_statuses();

        let at_end = self.buffer.is_exhausted() && end == self.buffer.known_rows();
        tracing::debug!(
            position = position,
            rows = self.rowset.len(),
            at_end = at_end,
            "rowset positioned"
        );
        Ok(self.outcome(at_end))
    }

    fn move_after_last(&mut self) -> FetchOutcome {
        self.clear_rowset();
        self.after_last = true;
        tracing::debug!("cursor positioned after last row");
        FetchOutcome::no_data(self.row_array_size, true)
    }

    /// Rebuild the status array from the slots, minting bookmarks
    pub(crate) fn sync_statuses(&mut self) {
        let mut statuses = Vec::with_capacity(self.rowset.len());
        for entry in &self.rowset {
            let status = entry
                .and_then(|id| self.buffer.get(id))
                .map_or(RowStatus::Error, |slot| slot.status());
            if self.use_bookmarks && status != RowStatus::Deleted {
                if let Some(id) = entry {
                    self.bookmarks.mint(*id);
                }
            }
            statuses.push(status);
        }
        self.statuses = statuses;
    }

    fn outcome(&self, at_end: bool) -> FetchOutcome {
        let rows = self.rowset();
        let rows_fetched = self.statuses.iter().filter(|s| s.has_data()).count();
        let failed = self
            .statuses
            .iter()
            .filter(|s| **s == RowStatus::Error)
            .count();
        FetchOutcome {
            return_code: ReturnCode::from_rows(rows_fetched, failed, false),
            rows_fetched,
            statuses: self.statuses(),
            rows,
            position: self.rowset_start,
            at_end,
        }
    }

    /// Current rowset as caller-visible rows
    pub fn rowset(&self) -> Vec<FetchedRow> {
        self.rowset
            .iter()
            .zip(&self.statuses)
            .map(|(entry, status)| self.fetched_row(*entry, *status))
            .collect()
    }

    pub(crate) fn fetched_row(&self, entry: Option<SlotId>, status: RowStatus) -> FetchedRow {
        let bookmark = entry
            .filter(|_| self.use_bookmarks)
            .and_then(|id| self.bookmarks.get(id).cloned());
        let row = entry
            .filter(|_| self.retrieve_data && status.has_data())
            .and_then(|id| self.buffer.get(id))
            .map(|slot| Row::new(slot.values().to_vec(), Arc::clone(&self.names)));
        FetchedRow {
            status,
            bookmark,
            row,
        }
    }

    /// Values of a rowset row (1-based)
    pub fn row(&self, row: usize) -> Option<Row> {
        let id = self.rowset_slot(row)?;
        let slot = self.buffer.get(id)?;
        if slot.is_deleted() {
            return None;
        }
        Some(Row::new(slot.values().to_vec(), Arc::clone(&self.names)))
    }

    // =========================================================================
    // Rowset access for positioned operations
    // =========================================================================

    /// Slot behind a 1-based rowset row
    pub(crate) fn rowset_slot(&self, row: usize) -> Option<SlotId> {
        if row == 0 {
            return None;
        }
        self.rowset.get(row - 1).copied().flatten()
    }

    pub(crate) fn set_current_row(&mut self, row: usize) {
        self.current_row = row;
    }

    /// Server image of the current row, unless it was deleted
    pub(crate) fn current_image(&self) -> Option<Vec<Value>> {
        let slot = self.buffer.get(self.rowset_slot(self.current_row)?)?;
        (!slot.is_deleted()).then(|| slot.image().to_vec())
    }

    /// Replace the rowset with explicit slots (fetch by bookmark)
    pub(crate) fn replace_rowset(
        &mut self,
        entries: Vec<Option<SlotId>>,
        statuses: Vec<RowStatus>,
    ) {
        self.rowset = entries;
        self.statuses = statuses;
        self.current_row = if self.rowset.is_empty() { 0 } else { 1 };
        self.after_last = false;
    }

    /// Store an inserted row; returns its slot and bookmark
    pub(crate) fn add_row(&mut self, values: Vec<Value>) -> (SlotId, Option<Bookmark>) {
        let id = self.buffer.push_detached(values, RowStatus::Added);
        let bookmark = self.use_bookmarks.then(|| self.bookmarks.mint(id));
        (id, bookmark)
    }

    /// Re-read rows by key; `rows` are 1-based rowset rows (None = all)
    ///
    /// Rows that no longer exist become `Deleted`. Without a usable key set
    /// the buffered values are kept.
    pub(crate) fn reread(
        &mut self,
        rows: Option<&[usize]>,
        ctx: &mut ServerContext<'_>,
        diagnostics: &mut Diagnostics,
    ) {
        let key = match self.key_set(ctx.metadata) {
            Ok(key) => key,
            Err(err) => {
                tracing::debug!(error = %err, "rows not re-read: no key set");
                return;
            }
        };

        let targets: Vec<usize> = match rows {
            Some(rows) => rows.to_vec(),
            None => (1..=self.rowset.len()).collect(),
        };

        for row in targets {
            let Some(id) = self.rowset_slot(row) else {
                continue;
            };
            let Some(slot) = self.buffer.get(id) else {
                continue;
            };
            if slot.is_deleted() {
                continue;
            }
            let image = slot.image().to_vec();

            let read = ctx
                .synthesizer
                .select_by_key(&key, &self.descriptor, &image, self.lock_rereads)
                .and_then(|(request, ordinals)| {
                    read_one(&mut *ctx.executor, &request).map(|values| (values, ordinals))
                });

            match read {
                Ok((Some(values), ordinals)) => {
                    if let Some(slot) = self.buffer.get_mut(id) {
                        let mut merged = slot.values().to_vec();
                        for (value, ordinal) in values.into_iter().zip(ordinals) {
                            if let Some(target) = merged.get_mut(ordinal) {
                                *target = value;
                            }
                        }
                        slot.reload(merged);
                        if slot.status() == RowStatus::Error {
                            slot.set_status(RowStatus::Success);
                        }
                    }
                }
                Ok((None, _)) => {
                    tracing::debug!(row = row, "row no longer exists on the server");
                    if let Some(slot) = self.buffer.get_mut(id) {
                        slot.set_status(RowStatus::Deleted);
                    }
                    self.bookmarks.retire(id);
                }
                Err(err) => {
                    tracing::warn!(row = row, error = %err, "re-read failed");
                    if let Some(slot) = self.buffer.get_mut(id) {
                        slot.set_status(RowStatus::Error);
                    }
                    diagnostics.push(Diagnostic::from_error(&err).for_row(row));
                }
            }
        }
    }

    /// Re-read (when the cursor type does) and rebuild statuses for rows
    pub(crate) fn refresh(
        &mut self,
        rows: &[usize],
        ctx: &mut ServerContext<'_>,
        diagnostics: &mut Diagnostics,
    ) -> Vec<FetchedRow> {
        if self.behavior.rereads_rows {
            self.reread(Some(rows), ctx, diagnostics);
        }
        self.sync_statuses();
        rows.iter()
            .map(|&row| {
                let status = row
                    .checked_sub(1)
                    .and_then(|i| self.statuses.get(i).copied())
                    .unwrap_or(RowStatus::NoRow);
                self.fetched_row(self.rowset_slot(row), status)
            })
            .collect()
    }
}

fn from_end(total: i64, n: i64, size: i64) -> Target {
    match total.checked_add(n).and_then(|p| p.checked_add(1)) {
        Some(p) if p >= 1 => Target::Row(p as usize),
        _ if n.unsigned_abs() <= size as u64 && total > 0 => Target::Row(1),
        _ => Target::BeforeFirst,
    }
}

fn read_one(executor: &mut dyn QueryExecutor, request: &SqlRequest) -> Result<Option<Vec<Value>>> {
    let mut output = executor.query(request)?;
    output.rows.next_row()
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("columns", &self.descriptor.len())
            .field("buffered", &self.buffer.known_rows())
            .field("rowset_start", &self.rowset_start)
            .field("rowset_len", &self.rowset.len())
            .field("after_last", &self.after_last)
            .finish()
    }
}
