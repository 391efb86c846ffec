//! In-memory server shared by the integration tests
//!
//! Implements `QueryExecutor` and `MetadataProvider` over a handful of
//! tables. Synthesized statements are applied through their `WriteBackPlan`;
//! application queries of the form `SELECT <cols|*> FROM <table>` are
//! answered from the tables, anything else from canned results.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use rowset_cursor::{
    ColumnDescriptor, Config, Connection, Error, ExecOutcome, KeyTerm, MetadataProvider,
    QueryExecutor, QueryOutput, Result, ResultDescriptor, SqlRequest, SqlType, TableColumn,
    TableMetadata, TableRef, Value, VecRowStream, WriteBackPlan,
};

struct Table {
    meta: TableMetadata,
    auto_increment: Option<usize>,
    next_id: i64,
    defaults: Vec<Value>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    fn ordinal(&self, column: &str) -> Option<usize> {
        self.meta
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(column))
    }

    fn matches(&self, row: &[Value], predicate: &[KeyTerm]) -> bool {
        predicate.iter().all(|term| {
            self.ordinal(&term.column)
                .and_then(|i| row.get(i))
                .is_some_and(|v| values_equal(v, &term.value))
        })
    }

    fn descriptor(&self, columns: &[usize]) -> ResultDescriptor {
        let table = self.meta.table.clone();
        ResultDescriptor::new(
            columns
                .iter()
                .map(|&i| {
                    let col = &self.meta.columns[i];
                    let mut desc = ColumnDescriptor::new(col.name.clone(), col.sql_type)
                        .with_table(table.clone());
                    if !col.nullable {
                        desc = desc.not_null();
                    }
                    if self
                        .meta
                        .primary_key
                        .iter()
                        .any(|k| k.eq_ignore_ascii_case(&col.name))
                    {
                        desc = desc.primary_key();
                    }
                    desc
                })
                .collect(),
        )
    }

    fn check_not_null(&self, row: &[Value]) -> Result<()> {
        for (col, value) in self.meta.columns.iter().zip(row) {
            if !col.nullable && value.is_null() {
                return Err(Error::server(
                    1048,
                    "23000",
                    format!("Column '{}' cannot be null", col.name),
                ));
            }
        }
        Ok(())
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Integer(x), Value::Decimal(y)) | (Value::Decimal(y), Value::Integer(x)) => {
            y.parse::<i64>().ok() == Some(*x)
        }
        _ => a == b,
    }
}

#[derive(Default)]
struct Database {
    tables: Vec<Table>,
    canned: Vec<(String, ResultDescriptor, Vec<Vec<Value>>)>,
    executed: Vec<SqlRequest>,
    queries: Vec<SqlRequest>,
    plain_affected: u64,
    failures: Vec<String>,
    hide_metadata: bool,
}

impl Database {
    fn table(&self, name: &TableRef) -> Option<&Table> {
        self.tables.iter().find(|t| t.meta.table.same_table(name))
    }

    fn table_mut(&mut self, name: &TableRef) -> Result<&mut Table> {
        self.tables
            .iter_mut()
            .find(|t| t.meta.table.same_table(name))
            .ok_or_else(|| Error::server(1146, "42S02", format!("Table '{}' doesn't exist", name)))
    }

    fn check_failure(&self, sql: &str) -> Result<()> {
        match self.failures.iter().find(|f| sql.contains(f.as_str())) {
            Some(_) => Err(Error::server(1205, "HY000", "Lock wait timeout exceeded")),
            None => Ok(()),
        }
    }
}

/// In-memory tables behind a cloneable handle
#[derive(Clone, Default)]
pub struct MemoryServer {
    db: Arc<Mutex<Database>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap()
    }

    /// Add a table; `auto_increment` names a column filled on insert
    pub fn create_table(&self, meta: TableMetadata, auto_increment: Option<&str>) {
        let auto = auto_increment.and_then(|name| {
            meta.columns
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(name))
        });
        let defaults = vec![Value::Null; meta.columns.len()];
        self.db().tables.push(Table {
            meta,
            auto_increment: auto,
            next_id: 1,
            defaults,
            rows: Vec::new(),
        });
    }

    /// Value an INSERT that omits `column` stores
    pub fn set_default(&self, table: &str, column: &str, value: Value) {
        let mut db = self.db();
        let t = db.table_mut(&TableRef::new(table)).unwrap();
        let ordinal = t.ordinal(column).unwrap();
        t.defaults[ordinal] = value;
    }

    /// Load rows, advancing the auto-increment counter past them
    pub fn insert_rows(&self, table: &str, rows: Vec<Vec<Value>>) {
        let mut db = self.db();
        let t = db.table_mut(&TableRef::new(table)).unwrap();
        for row in rows {
            if let Some(Value::Integer(id)) = t.auto_increment.and_then(|i| row.get(i)) {
                t.next_id = t.next_id.max(id + 1);
            }
            t.rows.push(row);
        }
    }

    /// Current rows of a table
    pub fn rows(&self, table: &str) -> Vec<Vec<Value>> {
        self.db()
            .table(&TableRef::new(table))
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Change rows behind the engine's back
    pub fn modify(&self, table: &str, f: impl FnOnce(&mut Vec<Vec<Value>>)) {
        let mut db = self.db();
        let t = db.table_mut(&TableRef::new(table)).unwrap();
        f(&mut t.rows);
    }

    /// Answer a query text with a fixed result
    pub fn canned(&self, sql: &str, descriptor: ResultDescriptor, rows: Vec<Vec<Value>>) {
        self.db().canned.push((sql.to_string(), descriptor, rows));
    }

    /// Affected-row count reported for statements without a plan
    pub fn set_plain_affected(&self, rows: u64) {
        self.db().plain_affected = rows;
    }

    /// Fail every executed statement whose SQL contains `fragment`
    pub fn fail_when(&self, fragment: &str) {
        self.db().failures.push(fragment.to_string());
    }

    /// Report no catalog entries
    pub fn hide_metadata(&self) {
        self.db().hide_metadata = true;
    }

    /// SQL of every executed statement
    pub fn executed_sql(&self) -> Vec<String> {
        self.db().executed.iter().map(|r| r.sql.clone()).collect()
    }

    /// Every executed request
    pub fn executed(&self) -> Vec<SqlRequest> {
        self.db().executed.clone()
    }

    /// SQL of every query
    pub fn query_sql(&self) -> Vec<String> {
        self.db().queries.iter().map(|r| r.sql.clone()).collect()
    }

    pub fn clear_log(&self) {
        let mut db = self.db();
        db.executed.clear();
        db.queries.clear();
    }

    pub fn connection(&self, config: Config) -> Connection {
        Connection::new(config, self.clone(), self.clone())
    }

    fn select_table(db: &Database, sql: &str) -> Result<QueryOutput> {
        let upper = sql.to_ascii_uppercase();
        let from = upper
            .find(" FROM ")
            .ok_or_else(|| Error::server(1064, "42000", "You have an error in your SQL syntax"))?;
        let select = sql[..from].trim();
        let select = select
            .get(6..)
            .ok_or_else(|| Error::server(1064, "42000", "You have an error in your SQL syntax"))?;
        let table_name = sql[from + 6..]
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_matches('`');
        let table = db.table(&TableRef::new(table_name)).ok_or_else(|| {
            Error::server(1146, "42S02", format!("Table '{}' doesn't exist", table_name))
        })?;

        let columns: Vec<usize> = if select.trim() == "*" {
            (0..table.meta.columns.len()).collect()
        } else {
            select
                .split(',')
                .map(|c| {
                    let name = c.trim().trim_matches('`');
                    table.ordinal(name).ok_or_else(|| {
                        Error::server(1054, "42S22", format!("Unknown column '{}'", name))
                    })
                })
                .collect::<Result<_>>()?
        };

        let rows = table
            .rows
            .iter()
            .map(|row| columns.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(QueryOutput::new(
            table.descriptor(&columns),
            Box::new(VecRowStream::new(rows)),
        ))
    }
}

impl QueryExecutor for MemoryServer {
    fn query(&mut self, request: &SqlRequest) -> Result<QueryOutput> {
        let mut db = self.db();
        db.queries.push(request.clone());

        if let Some(WriteBackPlan::SelectByKey {
            table,
            columns,
            predicate,
            ..
        }) = &request.plan
        {
            let t = db.table_mut(table)?;
            let ordinals: Vec<usize> = columns.iter().filter_map(|c| t.ordinal(c)).collect();
            let rows = t
                .rows
                .iter()
                .filter(|row| t.matches(row, predicate))
                .map(|row| ordinals.iter().map(|&i| row[i].clone()).collect())
                .collect();
            return Ok(QueryOutput::new(
                t.descriptor(&ordinals),
                Box::new(VecRowStream::new(rows)),
            ));
        }

        let canned = db.canned.iter().find(|(sql, _, _)| *sql == request.sql);
        if let Some((_, descriptor, rows)) = canned {
            return Ok(QueryOutput::new(
                descriptor.clone(),
                Box::new(VecRowStream::new(rows.clone())),
            ));
        }

        Self::select_table(&db, &request.sql)
    }

    fn execute(&mut self, request: &SqlRequest) -> Result<ExecOutcome> {
        let mut db = self.db();
        db.executed.push(request.clone());
        db.check_failure(&request.sql)?;

        match &request.plan {
            Some(WriteBackPlan::Update {
                table,
                assignments,
                predicate,
            }) => {
                let t = db.table_mut(table)?;
                let targets: Vec<usize> = (0..t.rows.len())
                    .filter(|&i| t.matches(&t.rows[i], predicate))
                    .collect();
                for &i in &targets {
                    let mut row = t.rows[i].clone();
                    for (column, value) in assignments {
                        if let Some(ordinal) = t.ordinal(column) {
                            row[ordinal] = value.clone();
                        }
                    }
                    t.check_not_null(&row)?;
                    t.rows[i] = row;
                }
                Ok(ExecOutcome::affected(targets.len() as u64))
            }
            Some(WriteBackPlan::Delete { table, predicate }) => {
                let t = db.table_mut(table)?;
                let before = t.rows.len();
                let predicate = predicate.clone();
                let kept: Vec<Vec<Value>> = t
                    .rows
                    .iter()
                    .filter(|row| !t.matches(row, &predicate))
                    .cloned()
                    .collect();
                t.rows = kept;
                Ok(ExecOutcome::affected((before - t.rows.len()) as u64))
            }
            Some(WriteBackPlan::Insert { table, values }) => {
                let t = db.table_mut(table)?;
                let mut row = t.defaults.clone();
                for (column, value) in values {
                    if let Some(ordinal) = t.ordinal(column) {
                        row[ordinal] = value.clone();
                    }
                }
                let mut last_insert_id = None;
                if let Some(auto) = t.auto_increment {
                    if row[auto].is_null() {
                        row[auto] = Value::Integer(t.next_id);
                        last_insert_id = Some(t.next_id as u64);
                        t.next_id += 1;
                    }
                }
                t.check_not_null(&row)?;

                let key: Vec<usize> = t
                    .meta
                    .primary_key
                    .iter()
                    .filter_map(|k| t.ordinal(k))
                    .collect();
                if !key.is_empty()
                    && t
                        .rows
                        .iter()
                        .any(|r| key.iter().all(|&i| values_equal(&r[i], &row[i])))
                {
                    return Err(Error::server(1062, "23000", "Duplicate entry for key 'PRIMARY'"));
                }
                t.rows.push(row);
                Ok(ExecOutcome {
                    affected_rows: 1,
                    last_insert_id,
                })
            }
            Some(WriteBackPlan::SelectByKey { .. }) => Err(Error::server(
                1064,
                "42000",
                "SELECT sent through execute",
            )),
            None => Ok(ExecOutcome::affected(db.plain_affected)),
        }
    }
}

impl MetadataProvider for MemoryServer {
    fn table_metadata(&self, table: &TableRef) -> Result<Option<TableMetadata>> {
        let db = self.db();
        if db.hide_metadata {
            return Ok(None);
        }
        Ok(db.table(table).map(|t| t.meta.clone()))
    }
}

/// `items(id INT PK AUTO_INCREMENT, name VARCHAR NOT NULL, qty INT)` with
/// rows `id = 1..=count`, `name = "item<id>"`, `qty = id * 10`
pub fn items_server(count: i64) -> MemoryServer {
    let server = MemoryServer::new();
    server.create_table(
        TableMetadata::new(
            TableRef::new("items"),
            vec![
                TableColumn::new("id", SqlType::Integer).not_null(),
                TableColumn::new("name", SqlType::Varchar).not_null(),
                TableColumn::new("qty", SqlType::Integer),
            ],
        )
        .with_primary_key(&["id"]),
        Some("id"),
    );
    server.insert_rows(
        "items",
        (1..=count)
            .map(|i| {
                vec![
                    Value::Integer(i),
                    Value::from(format!("item{}", i)),
                    Value::Integer(i * 10),
                ]
            })
            .collect(),
    );
    server
}

/// First column of every row of a rowset, as integers
pub fn ids(rows: &[rowset_cursor::FetchedRow]) -> Vec<i64> {
    rows.iter()
        .filter_map(|r| r.row.as_ref().and_then(|row| row.get_i64(0)))
        .collect()
}
