//! Result-set metadata
//!
//! A [`ResultDescriptor`] is produced by the executor when a query opens and
//! never changes while the cursor is open. Each [`ColumnDescriptor`] records
//! where the column came from (base table and base column name), which the
//! key resolver and the statement synthesizer rely on.

use std::fmt;

/// Semantic column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum SqlType {
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Decimal,
    Float,
    Double,
    Char,
    Varchar,
    LongVarchar,
    Binary,
    Varbinary,
    LongVarbinary,
    Date,
    Time,
    Timestamp,
    Json,
}

impl SqlType {
    /// Large or streamed types (TEXT/BLOB, JSON) never usable in a key
    pub fn is_long(self) -> bool {
        matches!(
            self,
            SqlType::LongVarchar | SqlType::LongVarbinary | SqlType::Json
        )
    }

    /// Types whose equality comparison is inexact
    pub fn is_inexact(self) -> bool {
        matches!(self, SqlType::Float | SqlType::Double | SqlType::Decimal)
    }

    /// Numeric types (rendered without quotes)
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            SqlType::Bit
                | SqlType::TinyInt
                | SqlType::SmallInt
                | SqlType::Integer
                | SqlType::BigInt
                | SqlType::Decimal
                | SqlType::Float
                | SqlType::Double
        )
    }

    /// Binary types (rendered as hex literals)
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            SqlType::Binary | SqlType::Varbinary | SqlType::LongVarbinary
        )
    }
}

/// A base table, optionally qualified by catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    /// Catalog (database) name
    pub catalog: Option<String>,
    /// Table name
    pub name: String,
}

impl TableRef {
    /// Create an unqualified table reference
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            catalog: None,
            name: name.into(),
        }
    }

    /// Create a catalog-qualified table reference
    pub fn qualified(catalog: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            catalog: Some(catalog.into()),
            name: name.into(),
        }
    }

    /// Case-insensitive comparison, ignoring a missing catalog on either side
    pub fn same_table(&self, other: &TableRef) -> bool {
        if !self.name.eq_ignore_ascii_case(&other.name) {
            return false;
        }
        match (&self.catalog, &other.catalog) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => true,
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.catalog {
            Some(catalog) => write!(f, "{}.{}", catalog, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Metadata for one result column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Column name in the result (alias if any)
    pub name: String,
    /// Column name in the base table
    pub base_name: Option<String>,
    /// Owning base table (None for expressions)
    pub table: Option<TableRef>,
    /// Semantic type
    pub sql_type: SqlType,
    /// Maximum length in bytes
    pub octet_length: u32,
    /// Display size in characters
    pub display_size: u32,
    /// Numeric precision
    pub precision: i16,
    /// Numeric scale
    pub scale: i16,
    /// Whether NULL values are allowed
    pub nullable: bool,
    /// Part of the table's primary key
    pub primary_key: bool,
    /// Part of a unique index
    pub unique_key: bool,
}

impl ColumnDescriptor {
    /// Create a column with minimal info
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            base_name: None,
            table: None,
            sql_type,
            octet_length: 0,
            display_size: 0,
            precision: 0,
            scale: 0,
            nullable: true,
            primary_key: false,
            unique_key: false,
        }
    }

    /// Set the owning table
    pub fn with_table(mut self, table: TableRef) -> Self {
        self.table = Some(table);
        self
    }

    /// Set the base column name (when the result name is an alias)
    pub fn with_base_name(mut self, base_name: impl Into<String>) -> Self {
        self.base_name = Some(base_name.into());
        self
    }

    /// Set precision and scale
    pub fn with_precision(mut self, precision: i16, scale: i16) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    /// Set the octet length
    pub fn with_length(mut self, octet_length: u32) -> Self {
        self.octet_length = octet_length;
        self.display_size = octet_length;
        self
    }

    /// Mark as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark as primary key component
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Mark as unique key component
    pub fn unique_key(mut self) -> Self {
        self.unique_key = true;
        self
    }

    /// Column name in the base table
    pub fn base_column(&self) -> &str {
        self.base_name.as_deref().unwrap_or(&self.name)
    }

    /// Whether this column comes from the given table
    pub fn belongs_to(&self, table: &TableRef) -> bool {
        self.table.as_ref().is_some_and(|t| t.same_table(table))
    }
}

/// Ordered column metadata of a result set
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultDescriptor {
    columns: Vec<ColumnDescriptor>,
}

impl ResultDescriptor {
    /// Create a descriptor from columns
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    /// All columns
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the result has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column at a 0-based ordinal
    pub fn column(&self, ordinal: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(ordinal)
    }

    /// Result column names
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Ordinal of the column with this base name in the given table
    pub fn ordinal_of(&self, table: &TableRef, base_name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.belongs_to(table) && c.base_column().eq_ignore_ascii_case(base_name))
    }

    /// Distinct base tables in column order
    pub fn tables(&self) -> Vec<&TableRef> {
        let mut tables: Vec<&TableRef> = Vec::new();
        for table in self.columns.iter().filter_map(|c| c.table.as_ref()) {
            if !tables.iter().any(|t| t.same_table(table)) {
                tables.push(table);
            }
        }
        tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> TableRef {
        TableRef::new("items")
    }

    #[test]
    fn test_column_builder() {
        let col = ColumnDescriptor::new("item_id", SqlType::Integer)
            .with_table(items())
            .with_base_name("id")
            .primary_key();
        assert_eq!(col.base_column(), "id");
        assert!(col.primary_key);
        assert!(!col.nullable);
        assert!(col.belongs_to(&TableRef::new("ITEMS")));
    }

    #[test]
    fn test_tables_distinct() {
        let desc = ResultDescriptor::new(vec![
            ColumnDescriptor::new("a", SqlType::Integer).with_table(items()),
            ColumnDescriptor::new("b", SqlType::Varchar).with_table(TableRef::new("Items")),
            ColumnDescriptor::new("cnt", SqlType::BigInt),
        ]);
        assert_eq!(desc.tables().len(), 1);

        let join = ResultDescriptor::new(vec![
            ColumnDescriptor::new("a", SqlType::Integer).with_table(items()),
            ColumnDescriptor::new("b", SqlType::Integer).with_table(TableRef::new("orders")),
        ]);
        assert_eq!(join.tables().len(), 2);
    }

    #[test]
    fn test_ordinal_of() {
        let desc = ResultDescriptor::new(vec![
            ColumnDescriptor::new("x", SqlType::Integer)
                .with_table(items())
                .with_base_name("id"),
            ColumnDescriptor::new("name", SqlType::Varchar).with_table(items()),
        ]);
        assert_eq!(desc.ordinal_of(&items(), "ID"), Some(0));
        assert_eq!(desc.ordinal_of(&items(), "name"), Some(1));
        assert_eq!(desc.ordinal_of(&items(), "x"), None);
    }

    #[test]
    fn test_table_display() {
        assert_eq!(TableRef::new("t").to_string(), "t");
        assert_eq!(TableRef::qualified("shop", "t").to_string(), "shop.t");
        assert!(TableRef::qualified("shop", "t").same_table(&TableRef::new("T")));
        assert!(!TableRef::qualified("a", "t").same_table(&TableRef::qualified("b", "t")));
    }

    #[test]
    fn test_type_classes() {
        assert!(SqlType::LongVarchar.is_long());
        assert!(SqlType::Json.is_long());
        assert!(!SqlType::Varchar.is_long());
        assert!(SqlType::Double.is_inexact());
        assert!(SqlType::Decimal.is_numeric());
        assert!(SqlType::Varbinary.is_binary());
    }
}
