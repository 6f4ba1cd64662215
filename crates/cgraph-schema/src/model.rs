//! Declarative table, column and index model.

use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};

/// Portable column types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ColumnType {
    BigInt { unsigned: bool },
    Integer,
    /// Variable-width string with a maximum length.
    String { length: u32 },
    Text,
    /// Fixed-width binary.
    Binary { length: u32 },
    DateTimeImmutable,
    Json,
    Boolean,
}

/// Default value of a column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnDefault {
    Null,
    Bool(bool),
    Text(String),
    CurrentTimestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ColumnDefault>,
    #[serde(default)]
    pub autoincrement: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
}

impl Column {
    /// A `NOT NULL` column without default.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            default: None,
            autoincrement: false,
            charset: None,
            collation: None,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn with_collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
}

impl Index {
    /// An index named deterministically from its table and columns.
    pub fn for_columns(table: &str, columns: &[&str]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(table.as_bytes());
        for column in columns {
            hasher.update(b"\0");
            hasher.update(column.as_bytes());
        }
        let digest = hasher.finalize();
        Self {
            name: format!("IDX_{}", hex::encode_upper(&digest.as_bytes()[..10])),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Whether both indexes cover the same columns in the same order.
    pub fn covers_same_columns(&self, other: &Index) -> bool {
        self.columns == other.columns
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub indexes: Vec<Index>,
}

impl Table {
    /// Create a table, rejecting duplicate column names.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> SchemaResult<Self> {
        let name = name.into();
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(SchemaError::DuplicateColumn {
                    table: name,
                    column: column.name.clone(),
                });
            }
        }
        Ok(Self {
            name,
            columns,
            primary_key: Vec::new(),
            indexes: Vec::new(),
        })
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn set_primary_key(mut self, columns: &[&str]) -> SchemaResult<Self> {
        self.check_columns(columns)?;
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        Ok(self)
    }

    pub fn add_index(mut self, columns: &[&str]) -> SchemaResult<Self> {
        self.check_columns(columns)?;
        self.indexes.push(Index::for_columns(&self.name, columns));
        Ok(self)
    }

    /// Whether an index (or the primary key) covers exactly `columns`.
    pub fn has_index_on(&self, columns: &[String]) -> bool {
        self.primary_key == columns || self.indexes.iter().any(|i| i.columns == columns)
    }

    fn check_columns(&self, columns: &[&str]) -> SchemaResult<()> {
        match columns.iter().find(|c| self.column(c).is_none()) {
            Some(missing) => Err(SchemaError::UnknownColumn {
                table: self.name.clone(),
                column: missing.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// A set of tables.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub tables: Vec<Table>,
}

impl Schema {
    /// Collect tables, rejecting duplicate names.
    pub fn with_tables(tables: Vec<Table>) -> SchemaResult<Self> {
        for (i, table) in tables.iter().enumerate() {
            if tables[..i].iter().any(|t| t.name == table.name) {
                return Err(SchemaError::DuplicateTable(table.name.clone()));
            }
        }
        Ok(Self { tables })
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}
