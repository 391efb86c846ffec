//! Key resolution
//!
//! Decides which result columns re-identify a row on the server when a
//! positioned write is synthesized. Candidates, in priority order:
//!
//! 1. the table's primary key, when every component is in the result;
//! 2. the shortest unique index fully present in the result (declaration
//!    order breaks ties);
//! 3. every usable column of the table present in the result, flagged as a
//!    non-unique fallback.
//!
//! A candidate is rejected when a component is missing from the result or is
//! a long/streamed type. Results spanning several base tables have no key.

use crate::column::{ColumnDescriptor, ResultDescriptor, SqlType, TableRef};
use crate::error::{Error, Result};
use crate::executor::{KeyTerm, MetadataProvider, TableMetadata};
use crate::row::Value;

/// Where a key set came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Primary key
    PrimaryKey,
    /// Unique index with this name
    UniqueIndex(String),
    /// All usable columns (not guaranteed unique)
    AllColumns,
}

/// One component of a key set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumn {
    /// 0-based result ordinal
    pub ordinal: usize,
    /// Base column name
    pub name: String,
    /// Column type
    pub sql_type: SqlType,
}

/// Columns identifying a row of the result's base table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySet {
    table: TableRef,
    columns: Vec<KeyColumn>,
    source: KeySource,
}

impl KeySet {
    /// Owning table
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Key components in predicate order
    pub fn columns(&self) -> &[KeyColumn] {
        &self.columns
    }

    /// Where the key came from
    pub fn source(&self) -> &KeySource {
        &self.source
    }

    /// True database key (at most one row matches)
    pub fn is_unique(&self) -> bool {
        self.source != KeySource::AllColumns
    }

    /// Predicate terms for a row's values
    ///
    /// A NULL in a true key cannot identify a row and is an error; the
    /// fallback compares it with `IS NULL`.
    pub fn terms(&self, values: &[Value]) -> Result<Vec<KeyTerm>> {
        self.columns
            .iter()
            .map(|col| {
                let value = values.get(col.ordinal).cloned().ok_or_else(|| {
                    Error::Internal(format!(
                        "row has no value for key column {} (ordinal {})",
                        col.name, col.ordinal
                    ))
                })?;
                if value.is_null() && self.is_unique() {
                    return Err(Error::NullKeyValue(col.name.clone()));
                }
                Ok(KeyTerm::new(col.name.clone(), col.sql_type, value))
            })
            .collect()
    }
}

/// The single base table of a result
pub fn single_table(descriptor: &ResultDescriptor) -> Result<TableRef> {
    let tables = descriptor.tables();
    match tables.as_slice() {
        [] => Err(Error::NoBaseTable),
        [table] => Ok((*table).clone()),
        many => Err(Error::MultipleTables(
            many.iter().map(|t| t.to_string()).collect(),
        )),
    }
}

/// Resolve the key set of a result, consulting the metadata provider
pub fn resolve(descriptor: &ResultDescriptor, provider: &dyn MetadataProvider) -> Result<KeySet> {
    let table = single_table(descriptor)?;
    let metadata = provider.table_metadata(&table)?;
    let key = match metadata {
        Some(meta) => resolve_with_metadata(descriptor, &table, &meta)?,
        None => resolve_from_flags(descriptor, &table)?,
    };

    if key.is_unique() {
        tracing::debug!(
            table = %key.table,
            source = ?key.source,
            columns = key.columns.len(),
            "resolved key set"
        );
    } else {
        tracing::warn!(
            table = %key.table,
            columns = key.columns.len(),
            "no unique key in result; identifying rows by all columns"
        );
    }
    Ok(key)
}

fn key_column(descriptor: &ResultDescriptor, table: &TableRef, name: &str) -> Option<KeyColumn> {
    let ordinal = descriptor.ordinal_of(table, name)?;
    let col = descriptor.column(ordinal)?;
    if col.sql_type.is_long() {
        return None;
    }
    Some(KeyColumn {
        ordinal,
        name: col.base_column().to_string(),
        sql_type: col.sql_type,
    })
}

/// Every named column present and usable, or None
fn candidate<S: AsRef<str>>(
    descriptor: &ResultDescriptor,
    table: &TableRef,
    names: &[S],
) -> Option<Vec<KeyColumn>> {
    if names.is_empty() {
        return None;
    }
    names
        .iter()
        .map(|name| key_column(descriptor, table, name.as_ref()))
        .collect()
}

fn resolve_with_metadata(
    descriptor: &ResultDescriptor,
    table: &TableRef,
    meta: &TableMetadata,
) -> Result<KeySet> {
    if let Some(columns) = candidate(descriptor, table, &meta.primary_key) {
        return Ok(KeySet {
            table: table.clone(),
            columns,
            source: KeySource::PrimaryKey,
        });
    }

    let mut best: Option<(usize, Vec<KeyColumn>)> = None;
    for (i, index) in meta.unique_indexes.iter().enumerate() {
        if let Some(columns) = candidate(descriptor, table, &index.columns) {
            let shorter = best
                .as_ref()
                .map_or(true, |(_, current)| columns.len() < current.len());
            if shorter {
                best = Some((i, columns));
            }
        }
    }
    if let Some((i, columns)) = best {
        return Ok(KeySet {
            table: table.clone(),
            columns,
            source: KeySource::UniqueIndex(meta.unique_indexes[i].name.clone()),
        });
    }

    let names: Vec<&str> = meta.columns.iter().map(|c| c.name.as_str()).collect();
    fallback(descriptor, table, names)
}

fn resolve_from_flags(descriptor: &ResultDescriptor, table: &TableRef) -> Result<KeySet> {
    let own: Vec<&ColumnDescriptor> = descriptor
        .columns()
        .iter()
        .filter(|c| c.belongs_to(table))
        .collect();

    let pk: Vec<&str> = own
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| c.base_column())
        .collect();
    if let Some(columns) = candidate(descriptor, table, &pk) {
        return Ok(KeySet {
            table: table.clone(),
            columns,
            source: KeySource::PrimaryKey,
        });
    }

    for col in own.iter().filter(|c| c.unique_key) {
        if let Some(columns) = candidate(descriptor, table, &[col.base_column()]) {
            return Ok(KeySet {
                table: table.clone(),
                columns,
                source: KeySource::UniqueIndex(col.base_column().to_string()),
            });
        }
    }

    let names: Vec<&str> = own.iter().map(|c| c.base_column()).collect();
    fallback(descriptor, table, names)
}

fn fallback(descriptor: &ResultDescriptor, table: &TableRef, names: Vec<&str>) -> Result<KeySet> {
    let mut columns: Vec<KeyColumn> = names
        .into_iter()
        .filter_map(|name| key_column(descriptor, table, name))
        .filter(|col| !col.sql_type.is_inexact())
        .collect();
    columns.sort_by_key(|c| c.ordinal);
    columns.dedup_by_key(|c| c.ordinal);

    if columns.is_empty() {
        return Err(Error::NoUsableKey(table.to_string()));
    }
    Ok(KeySet {
        table: table.clone(),
        columns,
        source: KeySource::AllColumns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{NoMetadata, TableColumn, UniqueIndex};

    struct Catalog(TableMetadata);

    impl MetadataProvider for Catalog {
        fn table_metadata(&self, table: &TableRef) -> Result<Option<TableMetadata>> {
            Ok(table.same_table(&self.0.table).then(|| self.0.clone()))
        }
    }

    fn t() -> TableRef {
        TableRef::new("t")
    }

    fn col(name: &str, ty: SqlType) -> ColumnDescriptor {
        ColumnDescriptor::new(name, ty).with_table(t())
    }

    fn table_meta() -> TableMetadata {
        TableMetadata::new(
            t(),
            vec![
                TableColumn::new("id", SqlType::Integer).not_null(),
                TableColumn::new("a", SqlType::Varchar),
                TableColumn::new("b", SqlType::Varchar),
                TableColumn::new("c", SqlType::Varchar),
                TableColumn::new("price", SqlType::Double),
                TableColumn::new("notes", SqlType::LongVarchar),
            ],
        )
    }

    #[test]
    fn test_primary_key_preferred() {
        let desc =
            ResultDescriptor::new(vec![col("a", SqlType::Varchar), col("id", SqlType::Integer)]);
        let meta = table_meta()
            .with_primary_key(&["id"])
            .with_unique_index(UniqueIndex::new("uq_a", &["a"]));
        let key = resolve(&desc, &Catalog(meta)).unwrap();
        assert_eq!(key.source(), &KeySource::PrimaryKey);
        assert!(key.is_unique());
        assert_eq!(key.columns().len(), 1);
        assert_eq!(key.columns()[0].ordinal, 1);
        assert_eq!(key.columns()[0].name, "id");
    }

    #[test]
    fn test_shortest_unique_index_when_pk_absent_from_result() {
        let desc = ResultDescriptor::new(vec![
            col("a", SqlType::Varchar),
            col("b", SqlType::Varchar),
            col("c", SqlType::Varchar),
        ]);
        let meta = table_meta()
            .with_primary_key(&["id"])
            .with_unique_index(UniqueIndex::new("uq_ab", &["a", "b"]))
            .with_unique_index(UniqueIndex::new("uq_c", &["c"]))
            .with_unique_index(UniqueIndex::new("uq_b", &["b"]));
        let key = resolve(&desc, &Catalog(meta)).unwrap();
        assert_eq!(key.source(), &KeySource::UniqueIndex("uq_c".to_string()));
        assert_eq!(key.columns()[0].ordinal, 2);
    }

    #[test]
    fn test_unique_index_with_long_column_rejected() {
        let desc = ResultDescriptor::new(vec![
            col("a", SqlType::Varchar),
            col("notes", SqlType::LongVarchar),
        ]);
        let meta = table_meta()
            .with_unique_index(UniqueIndex::new("uq_notes", &["notes"]))
            .with_unique_index(UniqueIndex::new("uq_a", &["a"]));
        let key = resolve(&desc, &Catalog(meta)).unwrap();
        assert_eq!(key.source(), &KeySource::UniqueIndex("uq_a".to_string()));
    }

    #[test]
    fn test_fallback_all_columns() {
        let desc = ResultDescriptor::new(vec![
            col("a", SqlType::Varchar),
            col("price", SqlType::Double),
            col("b", SqlType::Varchar),
            col("notes", SqlType::LongVarchar),
        ]);
        let key = resolve(&desc, &Catalog(table_meta())).unwrap();
        assert_eq!(key.source(), &KeySource::AllColumns);
        assert!(!key.is_unique());
        let names: Vec<&str> = key.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_fallback_without_usable_columns() {
        let desc = ResultDescriptor::new(vec![col("price", SqlType::Double)]);
        let err = resolve(&desc, &Catalog(table_meta())).unwrap_err();
        assert_eq!(err, Error::NoUsableKey("t".to_string()));
    }

    #[test]
    fn test_multiple_tables_refused() {
        let desc = ResultDescriptor::new(vec![
            col("id", SqlType::Integer),
            ColumnDescriptor::new("id", SqlType::Integer).with_table(TableRef::new("u")),
        ]);
        let err = resolve(&desc, &NoMetadata).unwrap_err();
        assert!(matches!(err, Error::MultipleTables(ref t) if t.len() == 2));
    }

    #[test]
    fn test_no_base_table() {
        let desc = ResultDescriptor::new(vec![ColumnDescriptor::new("1", SqlType::Integer)]);
        assert_eq!(resolve(&desc, &NoMetadata).unwrap_err(), Error::NoBaseTable);
    }

    #[test]
    fn test_flags_without_metadata() {
        let desc = ResultDescriptor::new(vec![
            col("a", SqlType::Varchar).unique_key(),
            col("k1", SqlType::Integer).primary_key(),
            col("k2", SqlType::Integer).primary_key(),
        ]);
        let key = resolve(&desc, &NoMetadata).unwrap();
        assert_eq!(key.source(), &KeySource::PrimaryKey);
        let ordinals: Vec<usize> = key.columns().iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2]);

        let desc = ResultDescriptor::new(vec![
            col("a", SqlType::Varchar),
            col("b", SqlType::Varchar).unique_key(),
        ]);
        let key = resolve(&desc, &NoMetadata).unwrap();
        assert_eq!(key.source(), &KeySource::UniqueIndex("b".to_string()));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let desc = ResultDescriptor::new(vec![
            col("a", SqlType::Varchar),
            col("b", SqlType::Varchar),
        ]);
        let meta = table_meta()
            .with_unique_index(UniqueIndex::new("uq_b", &["b"]))
            .with_unique_index(UniqueIndex::new("uq_a", &["a"]));
        let catalog = Catalog(meta);
        let first = resolve(&desc, &catalog).unwrap();
        for _ in 0..5 {
            assert_eq!(resolve(&desc, &catalog).unwrap(), first);
        }
        assert_eq!(first.source(), &KeySource::UniqueIndex("uq_b".to_string()));
    }

    #[test]
    fn test_terms_null_handling() {
        let desc = ResultDescriptor::new(vec![col("id", SqlType::Integer).primary_key()]);
        let key = resolve(&desc, &NoMetadata).unwrap();
        assert_eq!(
            key.terms(&[Value::Null]).unwrap_err(),
            Error::NullKeyValue("id".to_string())
        );

        let desc = ResultDescriptor::new(vec![col("a", SqlType::Varchar)]);
        let key = resolve(&desc, &NoMetadata).unwrap();
        let terms = key.terms(&[Value::Null]).unwrap();
        assert_eq!(terms[0].value, Value::Null);
    }
}
