//! Connection-scoped cursor-name registry
//!
//! Every statement that has a cursor name is registered here, together with
//! the key predicate of its current row. `UPDATE ... WHERE CURRENT OF <name>`
//! executed on another statement of the same connection looks the name up
//! and substitutes that predicate.
//!
//! Names compare case-insensitively. Entries are kept in registration order.

use indexmap::IndexMap;

use crate::column::TableRef;
use crate::constants::GENERATED_CURSOR_PREFIX;
use crate::error::{Error, Result};
use crate::executor::KeyTerm;

/// Identifies the current row of a named cursor
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedTarget {
    /// Base table of the cursor's result
    pub table: TableRef,
    /// Key predicate of the current row
    pub terms: Vec<KeyTerm>,
    /// Whether the key is a true database key
    pub unique: bool,
}

#[derive(Debug)]
struct NamedCursor {
    statement_id: u64,
    name: String,
    /// None while the statement has no positioned row
    target: Option<Result<PositionedTarget>>,
}

/// Cursor names of one connection
#[derive(Debug, Default)]
pub struct CursorRegistry {
    entries: IndexMap<String, NamedCursor>,
    generated: u64,
}

fn registry_key(name: &str) -> String {
    name.to_ascii_uppercase()
}

impl CursorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Give a statement a name, replacing any name it had
    pub fn register(&mut self, statement_id: u64, name: &str) -> Result<()> {
        let key = registry_key(name);
        if let Some(existing) = self.entries.get(&key) {
            if existing.statement_id == statement_id {
                return Ok(());
            }
            return Err(Error::DuplicateCursorName(name.to_string()));
        }
        let target = self.unregister(statement_id).flatten();
        tracing::trace!(statement_id = statement_id, name = name, "cursor name registered");
        self.entries.insert(
            key,
            NamedCursor {
                statement_id,
                name: name.to_string(),
                target,
            },
        );
        Ok(())
    }

    /// Generate and register a `SQL_CUR<n>` name
    pub fn generate_name(&mut self, statement_id: u64) -> Result<String> {
        loop {
            let name = format!("{}{}", GENERATED_CURSOR_PREFIX, self.generated);
            self.generated += 1;
            if !self.entries.contains_key(&registry_key(&name)) {
                self.register(statement_id, &name)?;
                return Ok(name);
            }
        }
    }

    /// Name registered for a statement
    pub fn name_of(&self, statement_id: u64) -> Option<&str> {
        self.entries
            .values()
            .find(|e| e.statement_id == statement_id)
            .map(|e| e.name.as_str())
    }

    /// Record the current row of a statement's cursor
    pub fn publish(&mut self, statement_id: u64, target: Option<Result<PositionedTarget>>) {
        if let Some(entry) = self
            .entries
            .values_mut()
            .find(|e| e.statement_id == statement_id)
        {
            entry.target = target;
        }
    }

    /// Current-row predicate of a named cursor
    pub fn target_for(&self, name: &str) -> Result<PositionedTarget> {
        match self.entries.get(&registry_key(name)).and_then(|e| e.target.as_ref()) {
            Some(target) => target.clone(),
            None => Err(Error::InvalidCursorName(format!(
                "Cursor '{}' does not exist or does not have a result set.",
                name
            ))),
        }
    }

    /// Remove a statement's name; returns the target it held
    pub fn unregister(&mut self, statement_id: u64) -> Option<Option<Result<PositionedTarget>>> {
        let index = self
            .entries
            .values()
            .position(|e| e.statement_id == statement_id)?;
        let (_, entry) = self.entries.shift_remove_index(index)?;
        tracing::trace!(statement_id = statement_id, name = %entry.name, "cursor name released");
        Some(entry.target)
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<String> {
        self.entries.values().map(|e| e.name.clone()).collect()
    }

    /// Number of registered names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no name is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::SqlType;
    use crate::row::Value;

    fn target(id: i64) -> PositionedTarget {
        PositionedTarget {
            table: TableRef::new("items"),
            terms: vec![KeyTerm::new("id", SqlType::Integer, Value::Integer(id))],
            unique: true,
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut reg = CursorRegistry::new();
        reg.register(1, "orders").unwrap();
        assert_eq!(reg.name_of(1), Some("orders"));

        let err = reg.target_for("ORDERS").unwrap_err();
        assert_eq!(err.sqlstate(), "34000");

        reg.publish(1, Some(Ok(target(3))));
        assert_eq!(reg.target_for("Orders").unwrap(), target(3));
    }

    #[test]
    fn test_duplicate_name() {
        let mut reg = CursorRegistry::new();
        reg.register(1, "c").unwrap();
        reg.register(1, "C").unwrap();
        let err = reg.register(2, "c").unwrap_err();
        assert_eq!(err.sqlstate(), "3C000");
    }

    #[test]
    fn test_rename_keeps_target() {
        let mut reg = CursorRegistry::new();
        reg.register(1, "a").unwrap();
        reg.publish(1, Some(Ok(target(7))));
        reg.register(1, "b").unwrap();
        assert_eq!(reg.names(), vec!["b".to_string()]);
        assert_eq!(reg.target_for("b").unwrap(), target(7));
        assert!(reg.target_for("a").is_err());
    }

    #[test]
    fn test_generated_names() {
        let mut reg = CursorRegistry::new();
        assert_eq!(reg.generate_name(1).unwrap(), "SQL_CUR0");
        assert_eq!(reg.generate_name(2).unwrap(), "SQL_CUR1");
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_unregister() {
        let mut reg = CursorRegistry::new();
        reg.register(1, "a").unwrap();
        assert!(reg.unregister(1).is_some());
        assert!(reg.unregister(1).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_unresolvable_target_is_reported() {
        let mut reg = CursorRegistry::new();
        reg.register(1, "j").unwrap();
        reg.publish(
            1,
            Some(Err(Error::MultipleTables(vec!["a".into(), "b".into()]))),
        );
        assert!(matches!(reg.target_for("j"), Err(Error::MultipleTables(_))));
    }
}
