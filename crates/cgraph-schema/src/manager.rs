//! Introspection of an existing schema and the migration diff.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{SchemaError, SchemaResult};
use crate::model::{Column, Index, Schema, Table};

/// Reports the schema currently present in a database.
pub trait SchemaManager: Send + Sync {
    /// `Ok(None)` when nothing has been set up yet.
    fn introspect(&self) -> SchemaResult<Option<Schema>>;
}

/// What is missing from an existing schema to reach a desired one.
///
/// Only additions are tracked. Columns or indexes the database has beyond the
/// desired layout are left alone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDiff {
    pub missing_tables: Vec<Table>,
    /// `(table, column)` pairs.
    pub missing_columns: Vec<(String, Column)>,
    pub missing_indexes: Vec<(String, Index)>,
}

impl SchemaDiff {
    pub fn between(existing: Option<&Schema>, desired: &Schema) -> Self {
        let mut diff = Self::default();
        for table in &desired.tables {
            let Some(current) = existing.and_then(|s| s.table(&table.name)) else {
                diff.missing_tables.push(table.clone());
                continue;
            };
            for column in &table.columns {
                if current.column(&column.name).is_none() {
                    diff.missing_columns.push((table.name.clone(), column.clone()));
                }
            }
            for index in &table.indexes {
                if !current.has_index_on(&index.columns) {
                    diff.missing_indexes.push((table.name.clone(), index.clone()));
                }
            }
        }
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.missing_tables.is_empty() && self.missing_columns.is_empty() && self.missing_indexes.is_empty()
    }

    /// Apply the additions to `schema`.
    pub fn apply_to(&self, schema: &mut Schema) {
        schema.tables.extend(self.missing_tables.iter().cloned());
        for (table, column) in &self.missing_columns {
            if let Some(t) = schema.tables.iter_mut().find(|t| &t.name == table) {
                t.columns.push(column.clone());
            }
        }
        for (table, index) in &self.missing_indexes {
            if let Some(t) = schema.tables.iter_mut().find(|t| &t.name == table) {
                t.indexes.push(index.clone());
            }
        }
    }
}

/// A [`SchemaManager`] over a schema held in memory.
#[derive(Debug, Default)]
pub struct InMemorySchemaManager {
    schema: RwLock<Option<Schema>>,
}

impl InMemorySchemaManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema: RwLock::new(Some(schema)),
        }
    }

    /// Record the additions of `diff` as applied.
    pub fn apply(&self, diff: &SchemaDiff) -> SchemaResult<()> {
        let mut guard = self
            .schema
            .write()
            .map_err(|e| SchemaError::LockPoisoned(e.to_string()))?;
        let schema = guard.get_or_insert_with(Schema::default);
        diff.apply_to(schema);
        info!(
            tables = diff.missing_tables.len(),
            columns = diff.missing_columns.len(),
            indexes = diff.missing_indexes.len(),
            "applied schema diff"
        );
        Ok(())
    }
}

impl SchemaManager for InMemorySchemaManager {
    fn introspect(&self) -> SchemaResult<Option<Schema>> {
        Ok(self
            .schema
            .read()
            .map_err(|e| SchemaError::LockPoisoned(e.to_string()))?
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ContentGraphSchemaBuilder;

    fn builder() -> ContentGraphSchemaBuilder {
        ContentGraphSchemaBuilder::new("cr_test_p_graph").unwrap()
    }

    #[test]
    fn empty_database_needs_every_table() {
        let diff = builder().diff_against(&InMemorySchemaManager::new()).unwrap();
        assert_eq!(diff.missing_tables.len(), 5);
        assert!(diff.missing_columns.is_empty());
        assert!(diff.missing_indexes.is_empty());
    }

    #[test]
    fn applied_schema_is_up_to_date() {
        let manager = InMemorySchemaManager::new();
        let diff = builder().diff_against(&manager).unwrap();
        manager.apply(&diff).unwrap();
        assert!(builder().diff_against(&manager).unwrap().is_empty());
    }

    #[test]
    fn reports_missing_columns_and_indexes() {
        let mut existing = builder().build().unwrap();
        let node = existing
            .tables
            .iter_mut()
            .find(|t| t.name == "cr_test_p_graph_node")
            .unwrap();
        node.columns.retain(|c| c.name != "originallastmodified");
        node.indexes.retain(|i| i.columns != ["nodetypename"]);

        let diff = builder()
            .diff_against(&InMemorySchemaManager::with_schema(existing))
            .unwrap();
        assert!(diff.missing_tables.is_empty());
        assert_eq!(diff.missing_columns.len(), 1);
        assert_eq!(diff.missing_columns[0].1.name, "originallastmodified");
        assert_eq!(diff.missing_indexes.len(), 1);
        assert_eq!(diff.missing_indexes[0].1.columns, vec!["nodetypename"]);
    }

    #[test]
    fn extra_columns_are_ignored() {
        let mut existing = builder().build().unwrap();
        existing.tables[0]
            .columns
            .push(Column::new("legacy", crate::model::ColumnType::Integer));
        let diff = SchemaDiff::between(Some(&existing), &builder().build().unwrap());
        assert!(diff.is_empty());
    }

    #[test]
    fn diff_serializes() {
        let diff = builder().diff_against(&InMemorySchemaManager::new()).unwrap();
        let json = serde_json::to_string(&diff).unwrap();
        let back: SchemaDiff = serde_json::from_str(&json).unwrap();
        assert_eq!(back, diff);
    }
}
