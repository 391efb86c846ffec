//! Write-back statement synthesis
//!
//! Builds the UPDATE, DELETE, INSERT and select-by-key statements that carry
//! positioned operations to the server. Rows are identified by the key set's
//! columns, using the values the row had when it was last read from the
//! server, never the application's pending edits.
//!
//! Every request carries a [`WriteBackPlan`] alongside the SQL text.

use crate::column::{ResultDescriptor, SqlType, TableRef};
use crate::config::{BindMode, Config, IdentifierQuote};
use crate::error::{Error, Result};
use crate::executor::{KeyTerm, SqlRequest, WriteBackPlan};
use crate::key_resolver::KeySet;
use crate::literal;
use crate::row::Value;

/// Renders write-back statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Synthesizer {
    quote: IdentifierQuote,
    bind_mode: BindMode,
}

impl Synthesizer {
    /// Create a synthesizer
    pub fn new(quote: IdentifierQuote, bind_mode: BindMode) -> Self {
        Self { quote, bind_mode }
    }

    /// Create a synthesizer from connection configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.identifier_quote, config.bind_mode)
    }

    fn writer(&self) -> SqlWriter<'_> {
        SqlWriter {
            synth: self,
            sql: String::with_capacity(128),
            params: Vec::new(),
        }
    }

    /// `UPDATE <table> SET ... WHERE <key>`
    ///
    /// `assignments` are (result ordinal, new value) pairs for the columns
    /// that are not ignored; an empty list is a degree mismatch.
    pub fn update(
        &self,
        key: &KeySet,
        descriptor: &ResultDescriptor,
        image: &[Value],
        assignments: &[(usize, Value)],
    ) -> Result<SqlRequest> {
        if assignments.is_empty() {
            return Err(Error::DegreeMismatch);
        }
        let predicate = key.terms(image)?;

        let mut w = self.writer();
        w.push("UPDATE ");
        w.table(key.table());
        w.push(" SET ");
        let mut set = Vec::with_capacity(assignments.len());
        for (i, (ordinal, value)) in assignments.iter().enumerate() {
            let (name, sql_type) = column_of(descriptor, *ordinal)?;
            if i > 0 {
                w.push(", ");
            }
            w.ident(name);
            w.push("=");
            w.value(value, sql_type)?;
            set.push((name.to_string(), value.clone()));
        }
        w.push(" WHERE ");
        w.predicate(&predicate)?;

        Ok(w.finish(WriteBackPlan::Update {
            table: key.table().clone(),
            assignments: set,
            predicate,
        }))
    }

    /// `DELETE FROM <table> WHERE <key>`
    pub fn delete(&self, key: &KeySet, image: &[Value]) -> Result<SqlRequest> {
        let predicate = key.terms(image)?;

        let mut w = self.writer();
        w.push("DELETE FROM ");
        w.table(key.table());
        w.push(" WHERE ");
        w.predicate(&predicate)?;

        Ok(w.finish(WriteBackPlan::Delete {
            table: key.table().clone(),
            predicate,
        }))
    }

    /// `INSERT INTO <table> (<columns>) VALUES (<values>)`
    pub fn insert(
        &self,
        table: &TableRef,
        descriptor: &ResultDescriptor,
        values: &[(usize, Value)],
    ) -> Result<SqlRequest> {
        let mut columns = Vec::with_capacity(values.len());
        for (ordinal, value) in values {
            let (name, sql_type) = column_of(descriptor, *ordinal)?;
            columns.push((name, sql_type, value));
        }

        let mut w = self.writer();
        w.push("INSERT INTO ");
        w.table(table);
        w.push(" (");
        for (i, (name, _, _)) in columns.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.ident(name);
        }
        w.push(") VALUES (");
        for (i, (_, sql_type, value)) in columns.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.value(value, *sql_type)?;
        }
        w.push(")");

        Ok(w.finish(WriteBackPlan::Insert {
            table: table.clone(),
            values: columns
                .into_iter()
                .map(|(name, _, value)| (name.to_string(), value.clone()))
                .collect(),
        }))
    }

    /// `SELECT <table columns> FROM <table> WHERE <key>`
    ///
    /// Returns the request and the result ordinals of the selected columns,
    /// in select-list order.
    pub fn select_by_key(
        &self,
        key: &KeySet,
        descriptor: &ResultDescriptor,
        image: &[Value],
        for_update: bool,
    ) -> Result<(SqlRequest, Vec<usize>)> {
        let predicate = key.terms(image)?;
        let ordinals: Vec<usize> = descriptor
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.belongs_to(key.table()))
            .map(|(i, _)| i)
            .collect();

        let mut w = self.writer();
        w.push("SELECT ");
        let mut names = Vec::with_capacity(ordinals.len());
        for (i, ordinal) in ordinals.iter().enumerate() {
            let (name, _) = column_of(descriptor, *ordinal)?;
            if i > 0 {
                w.push(", ");
            }
            w.ident(name);
            names.push(name.to_string());
        }
        w.push(" FROM ");
        w.table(key.table());
        w.push(" WHERE ");
        w.predicate(&predicate)?;
        if for_update {
            w.push(" FOR UPDATE");
        }

        let request = w.finish(WriteBackPlan::SelectByKey {
            table: key.table().clone(),
            columns: names,
            predicate,
            for_update,
        });
        Ok((request, ordinals))
    }

    /// Render a predicate on its own, for `WHERE CURRENT OF` rewriting
    pub fn predicate(&self, terms: &[KeyTerm]) -> Result<(String, Vec<Value>)> {
        let mut w = self.writer();
        w.predicate(terms)?;
        Ok((w.sql, w.params))
    }
}

fn column_of(descriptor: &ResultDescriptor, ordinal: usize) -> Result<(&str, SqlType)> {
    descriptor
        .column(ordinal)
        .map(|c| (c.base_column(), c.sql_type))
        .ok_or_else(|| Error::Internal(format!("no result column at ordinal {}", ordinal)))
}

/// Parameter value for a column, normalized like an inline literal would be
fn param_value(value: &Value, sql_type: SqlType) -> Result<Value> {
    match value {
        Value::String(s) if sql_type.is_numeric() => literal::normalize_number(s)
            .map(Value::Decimal)
            .ok_or_else(|| {
                Error::DataConversion(format!("'{}' is not a valid {:?} value", s, sql_type))
            }),
        Value::Float(f) if !f.is_finite() => Err(Error::DataConversion(format!(
            "{} cannot be written as a SQL number",
            f
        ))),
        other => Ok(other.clone()),
    }
}

struct SqlWriter<'a> {
    synth: &'a Synthesizer,
    sql: String,
    params: Vec<Value>,
}

impl SqlWriter<'_> {
    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn ident(&mut self, name: &str) {
        let quoted = literal::quote_identifier(name, self.synth.quote);
        self.sql.push_str(&quoted);
    }

    fn table(&mut self, table: &TableRef) {
        let quoted = literal::quote_table(table, self.synth.quote);
        self.sql.push_str(&quoted);
    }

    fn value(&mut self, value: &Value, sql_type: SqlType) -> Result<()> {
        match self.synth.bind_mode {
            BindMode::Inline => {
                let lit = literal::render(value, sql_type)?;
                self.sql.push_str(&lit);
            }
            BindMode::Parameters if value.is_null() => self.sql.push_str("NULL"),
            BindMode::Parameters => {
                self.params.push(param_value(value, sql_type)?);
                self.sql.push('?');
            }
        }
        Ok(())
    }

    fn predicate(&mut self, terms: &[KeyTerm]) -> Result<()> {
        for (i, term) in terms.iter().enumerate() {
            if i > 0 {
                self.push(" AND ");
            }
            self.ident(&term.column);
            if term.value.is_null() {
                self.push(" IS NULL");
            } else {
                self.push("=");
                self.value(&term.value, term.sql_type)?;
            }
        }
        Ok(())
    }

    fn finish(self, plan: WriteBackPlan) -> SqlRequest {
        tracing::trace!(sql = %self.sql, params = self.params.len(), "synthesized statement");
        SqlRequest {
            sql: self.sql,
            params: self.params,
            plan: Some(plan),
        }
    }
}
