//! Collaborator interfaces
//!
//! The engine never talks to a server itself. Queries and statements go
//! through a [`QueryExecutor`], and key metadata comes from a
//! [`MetadataProvider`]. Both are supplied when the
//! [`Connection`](crate::Connection) is created.
//!
//! Every synthesized statement is sent as a [`SqlRequest`] carrying the SQL
//! text, its ordered parameters (in [`BindMode::Parameters`]) and a
//! [`WriteBackPlan`] describing what the text does, so executors that cannot
//! or should not parse SQL can still act on it.
//!
//! [`BindMode::Parameters`]: crate::BindMode::Parameters

use crate::column::{ResultDescriptor, SqlType, TableRef};
use crate::error::Result;
use crate::row::Value;

/// One `column = value` term of a key predicate
///
/// A `Value::Null` term means `column IS NULL`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyTerm {
    /// Base column name
    pub column: String,
    /// Column type (drives literal rendering)
    pub sql_type: SqlType,
    /// Value the row had when it was fetched
    pub value: Value,
}

impl KeyTerm {
    /// Create a key term
    pub fn new(column: impl Into<String>, sql_type: SqlType, value: Value) -> Self {
        Self {
            column: column.into(),
            sql_type,
            value,
        }
    }
}

/// Structured description of a synthesized statement
#[derive(Debug, Clone, PartialEq)]
pub enum WriteBackPlan {
    /// `UPDATE table SET assignments WHERE predicate`
    Update {
        /// Target table
        table: TableRef,
        /// Column/value pairs in SET order
        assignments: Vec<(String, Value)>,
        /// Row-identifying predicate
        predicate: Vec<KeyTerm>,
    },
    /// `DELETE FROM table WHERE predicate`
    Delete {
        /// Target table
        table: TableRef,
        /// Row-identifying predicate
        predicate: Vec<KeyTerm>,
    },
    /// `INSERT INTO table (columns) VALUES (values)`
    Insert {
        /// Target table
        table: TableRef,
        /// Column/value pairs in column order
        values: Vec<(String, Value)>,
    },
    /// `SELECT columns FROM table WHERE predicate`
    SelectByKey {
        /// Source table
        table: TableRef,
        /// Selected base column names
        columns: Vec<String>,
        /// Row-identifying predicate
        predicate: Vec<KeyTerm>,
        /// Whether `FOR UPDATE` was appended
        for_update: bool,
    },
}

impl WriteBackPlan {
    /// The table the plan targets
    pub fn table(&self) -> &TableRef {
        match self {
            WriteBackPlan::Update { table, .. }
            | WriteBackPlan::Delete { table, .. }
            | WriteBackPlan::Insert { table, .. }
            | WriteBackPlan::SelectByKey { table, .. } => table,
        }
    }
}

/// A statement sent to the executor
#[derive(Debug, Clone, PartialEq)]
pub struct SqlRequest {
    /// SQL text
    pub sql: String,
    /// Parameters for `?` placeholders, in order
    pub params: Vec<Value>,
    /// What a synthesized statement does (None for application SQL)
    pub plan: Option<WriteBackPlan>,
}

impl SqlRequest {
    /// Create a request for application SQL
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            plan: None,
        }
    }

    /// Attach parameters
    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    /// Attach a write-back plan
    pub fn with_plan(mut self, plan: WriteBackPlan) -> Self {
        self.plan = Some(plan);
        self
    }
}

/// Result of a non-query statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecOutcome {
    /// Rows matched by the statement
    pub affected_rows: u64,
    /// Auto-increment value generated by an INSERT
    pub last_insert_id: Option<u64>,
}

impl ExecOutcome {
    /// Outcome with an affected-row count
    pub fn affected(rows: u64) -> Self {
        Self {
            affected_rows: rows,
            last_insert_id: None,
        }
    }
}

/// Forward-only stream of result rows
pub trait RowStream: Send {
    /// Next row, or None at end of result
    fn next_row(&mut self) -> Result<Option<Vec<Value>>>;
}

/// Row stream over rows already in memory
#[derive(Debug, Default)]
pub struct VecRowStream {
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl VecRowStream {
    /// Create a stream yielding the given rows in order
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl RowStream for VecRowStream {
    fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.next())
    }
}

/// An opened query result
pub struct QueryOutput {
    /// Column metadata
    pub descriptor: ResultDescriptor,
    /// Row stream
    pub rows: Box<dyn RowStream>,
}

impl QueryOutput {
    /// Create a query result
    pub fn new(descriptor: ResultDescriptor, rows: Box<dyn RowStream>) -> Self {
        Self { descriptor, rows }
    }
}

impl std::fmt::Debug for QueryOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOutput")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Runs SQL on the server
pub trait QueryExecutor: Send {
    /// Run a query and open its result stream
    fn query(&mut self, request: &SqlRequest) -> Result<QueryOutput>;

    /// Run a statement that returns no rows
    fn execute(&mut self, request: &SqlRequest) -> Result<ExecOutcome>;
}

/// A column of a table as reported by the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    /// Column name
    pub name: String,
    /// Semantic type
    pub sql_type: SqlType,
    /// Whether NULL values are allowed
    pub nullable: bool,
}

impl TableColumn {
    /// Create a nullable column
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
        }
    }

    /// Mark as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// A unique index of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueIndex {
    /// Index name
    pub name: String,
    /// Column names in index order
    pub columns: Vec<String>,
}

impl UniqueIndex {
    /// Create a unique index description
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Catalog view of one table
#[derive(Debug, Clone, PartialEq)]
pub struct TableMetadata {
    /// The table
    pub table: TableRef,
    /// Columns in declaration order
    pub columns: Vec<TableColumn>,
    /// Primary key columns in key order (empty if none)
    pub primary_key: Vec<String>,
    /// Unique indexes in declaration order
    pub unique_indexes: Vec<UniqueIndex>,
}

impl TableMetadata {
    /// Create metadata with no keys
    pub fn new(table: TableRef, columns: Vec<TableColumn>) -> Self {
        Self {
            table,
            columns,
            primary_key: Vec::new(),
            unique_indexes: Vec::new(),
        }
    }

    /// Set the primary key
    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Add a unique index
    pub fn with_unique_index(mut self, index: UniqueIndex) -> Self {
        self.unique_indexes.push(index);
        self
    }

    /// Look up a column by name (case-insensitive)
    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Supplies key metadata for base tables
pub trait MetadataProvider: Send + Sync {
    /// Metadata for a table, or None if the catalog has no entry
    fn table_metadata(&self, table: &TableRef) -> Result<Option<TableMetadata>>;
}

/// Provider with no catalog; key resolution falls back to column flags
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

impl MetadataProvider for NoMetadata {
    fn table_metadata(&self, _table: &TableRef) -> Result<Option<TableMetadata>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_row_stream() {
        let mut stream = VecRowStream::new(vec![vec![Value::Integer(1)], vec![Value::Integer(2)]]);
        assert_eq!(stream.next_row().unwrap(), Some(vec![Value::Integer(1)]));
        assert_eq!(stream.next_row().unwrap(), Some(vec![Value::Integer(2)]));
        assert_eq!(stream.next_row().unwrap(), None);
        assert_eq!(stream.next_row().unwrap(), None);
    }

    #[test]
    fn test_request_builder() {
        let plan = WriteBackPlan::Delete {
            table: TableRef::new("t"),
            predicate: vec![KeyTerm::new("id", SqlType::Integer, Value::Integer(1))],
        };
        let req = SqlRequest::new("DELETE FROM `t` WHERE `id`=?")
            .with_params(vec![Value::Integer(1)])
            .with_plan(plan);
        assert_eq!(req.params.len(), 1);
        assert_eq!(req.plan.as_ref().map(|p| p.table().name.as_str()), Some("t"));
    }

    #[test]
    fn test_table_metadata_builder() {
        let meta = TableMetadata::new(
            TableRef::new("t"),
            vec![
                TableColumn::new("id", SqlType::Integer).not_null(),
                TableColumn::new("code", SqlType::Varchar),
            ],
        )
        .with_primary_key(&["id"])
        .with_unique_index(UniqueIndex::new("uq_code", &["code"]));
        assert_eq!(meta.primary_key, vec!["id".to_string()]);
        assert_eq!(meta.unique_indexes.len(), 1);
        assert!(meta.column("ID").is_some_and(|c| !c.nullable));
    }

    #[test]
    fn test_no_metadata() {
        assert_eq!(NoMetadata.table_metadata(&TableRef::new("t")).unwrap(), None);
    }
}
