//! The content graph table layout.

use tracing::debug;

use crate::columns;
use crate::error::{SchemaError, SchemaResult};
use crate::manager::{SchemaDiff, SchemaManager};
use crate::model::{Column, ColumnDefault, ColumnType, Schema, Table};

/// Table name suffixes, appended to the configured prefix.
pub const NODE: &str = "node";
pub const HIERARCHY_RELATION: &str = "hierarchyrelation";
pub const REFERENCE_RELATION: &str = "referencerelation";
pub const DIMENSION_SPACE_POINTS: &str = "dimensionspacepoints";
pub const CONTENT_STREAM: &str = "contentstream";

/// Builds the five content graph tables under a table name prefix.
#[derive(Clone, Debug)]
pub struct ContentGraphSchemaBuilder {
    prefix: String,
}

impl ContentGraphSchemaBuilder {
    pub fn new(prefix: impl Into<String>) -> SchemaResult<Self> {
        let prefix = prefix.into();
        let valid = !prefix.is_empty()
            && prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !prefix.starts_with(|c: char| c.is_ascii_digit());
        if !valid {
            return Err(SchemaError::InvalidPrefix(prefix));
        }
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `<prefix>_<suffix>`.
    pub fn table_name(&self, suffix: &str) -> String {
        format!("{}_{}", self.prefix, suffix)
    }

    pub fn build(&self) -> SchemaResult<Schema> {
        Schema::with_tables(vec![
            self.node_table()?,
            self.hierarchy_relation_table()?,
            self.reference_relation_table()?,
            self.dimension_space_points_table()?,
            self.content_stream_table()?,
        ])
    }

    /// Compare the desired layout with what `manager` reports.
    pub fn diff_against(&self, manager: &dyn SchemaManager) -> SchemaResult<SchemaDiff> {
        let desired = self.build()?;
        let existing = manager.introspect()?;
        let diff = SchemaDiff::between(existing.as_ref(), &desired);
        debug!(
            missing_tables = diff.missing_tables.len(),
            missing_columns = diff.missing_columns.len(),
            missing_indexes = diff.missing_indexes.len(),
            "compared content graph schema"
        );
        Ok(diff)
    }

    fn node_table(&self) -> SchemaResult<Table> {
        Table::new(
            self.table_name(NODE),
            vec![
                columns::node_anchor_point("relationanchorpoint").autoincrement(),
                columns::node_aggregate_id("nodeaggregateid").nullable(true),
                columns::dimension_space_point_hash("origindimensionspacepointhash").nullable(true),
                columns::node_type_name("nodetypename"),
                Column::new("properties", ColumnType::Text).with_collation(columns::UNICODE_COLLATION),
                Column::new("classification", ColumnType::Binary { length: 20 }),
                created("created"),
                created("originalcreated"),
                modified("lastmodified"),
                modified("originallastmodified"),
            ],
        )?
        .set_primary_key(&["relationanchorpoint"])?
        .add_index(&["nodeaggregateid"])?
        .add_index(&["nodetypename"])
    }

    fn hierarchy_relation_table(&self) -> SchemaResult<Table> {
        Table::new(
            self.table_name(HIERARCHY_RELATION),
            vec![
                columns::relation_name("name").nullable(true),
                Column::new("position", ColumnType::Integer),
                columns::content_stream_id("contentstreamid"),
                columns::dimension_space_point_hash("dimensionspacepointhash"),
                columns::node_anchor_point("parentnodeanchor"),
                columns::node_anchor_point("childnodeanchor"),
                Column::new("subtreetags", ColumnType::Json)
                    .with_default(ColumnDefault::Text("{}".to_string())),
            ],
        )?
        .add_index(&["childnodeanchor"])?
        .add_index(&["contentstreamid"])?
        .add_index(&["parentnodeanchor"])?
        .add_index(&["contentstreamid", "childnodeanchor", "dimensionspacepointhash"])?
        .add_index(&["contentstreamid", "dimensionspacepointhash"])
    }

    fn reference_relation_table(&self) -> SchemaResult<Table> {
        Table::new(
            self.table_name(REFERENCE_RELATION),
            vec![
                columns::relation_name("name"),
                Column::new("position", ColumnType::Integer),
                columns::node_anchor_point("nodeanchorpoint"),
                Column::new("properties", ColumnType::Text)
                    .nullable(true)
                    .with_collation(columns::UNICODE_COLLATION),
                columns::node_aggregate_id("destinationnodeaggregateid"),
            ],
        )?
        .set_primary_key(&["name", "position", "nodeanchorpoint"])
    }

    fn dimension_space_points_table(&self) -> SchemaResult<Table> {
        Table::new(
            self.table_name(DIMENSION_SPACE_POINTS),
            vec![
                columns::dimension_space_point_hash("hash"),
                columns::dimension_space_point("dimensionspacepoint"),
            ],
        )?
        .set_primary_key(&["hash"])
    }

    fn content_stream_table(&self) -> SchemaResult<Table> {
        Table::new(
            self.table_name(CONTENT_STREAM),
            vec![
                columns::content_stream_id("contentStreamid"),
                Column::new("version", ColumnType::Integer),
                columns::content_stream_id("sourcecontentstreamid").nullable(true),
                Column::new("state", ColumnType::Binary { length: 20 }),
                Column::new("removed", ColumnType::Boolean)
                    .nullable(true)
                    .with_default(ColumnDefault::Bool(false)),
            ],
        )?
        .set_primary_key(&["contentStreamid"])
    }
}

fn created(name: &str) -> Column {
    Column::new(name, ColumnType::DateTimeImmutable).with_default(ColumnDefault::CurrentTimestamp)
}

fn modified(name: &str) -> Column {
    Column::new(name, ColumnType::DateTimeImmutable)
        .nullable(true)
        .with_default(ColumnDefault::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        ContentGraphSchemaBuilder::new("cr_default_p_graph").unwrap().build().unwrap()
    }

    #[test]
    fn builds_five_prefixed_tables() {
        assert_eq!(
            schema().table_names(),
            vec![
                "cr_default_p_graph_node",
                "cr_default_p_graph_hierarchyrelation",
                "cr_default_p_graph_referencerelation",
                "cr_default_p_graph_dimensionspacepoints",
                "cr_default_p_graph_contentstream",
            ]
        );
    }

    #[test]
    fn node_table_layout() {
        let schema = schema();
        let node = schema.table("cr_default_p_graph_node").unwrap();
        assert_eq!(node.primary_key, vec!["relationanchorpoint"]);
        let anchor = node.column("relationanchorpoint").unwrap();
        assert!(anchor.autoincrement);
        assert_eq!(anchor.column_type, ColumnType::BigInt { unsigned: true });
        assert!(node.column("nodeaggregateid").unwrap().nullable);
        assert!(!node.column("properties").unwrap().nullable);
        assert_eq!(
            node.column("classification").unwrap().column_type,
            ColumnType::Binary { length: 20 }
        );
        assert_eq!(
            node.column("created").unwrap().default,
            Some(ColumnDefault::CurrentTimestamp)
        );
        assert!(node.column("lastmodified").unwrap().nullable);
        assert!(node.has_index_on(&["nodetypename".to_string()]));
    }

    #[test]
    fn hierarchy_relation_has_no_primary_key_and_five_indexes() {
        let schema = schema();
        let table = schema.table("cr_default_p_graph_hierarchyrelation").unwrap();
        assert!(table.primary_key.is_empty());
        assert_eq!(table.indexes.len(), 5);
        assert!(table.column("name").unwrap().nullable);
        assert_eq!(
            table.column("subtreetags").unwrap().default,
            Some(ColumnDefault::Text("{}".into()))
        );
    }

    #[test]
    fn reference_relation_key() {
        let schema = schema();
        let table = schema.table("cr_default_p_graph_referencerelation").unwrap();
        assert_eq!(table.primary_key, vec!["name", "position", "nodeanchorpoint"]);
        assert!(table.column("properties").unwrap().nullable);
        assert!(!table.column("name").unwrap().nullable);
    }

    #[test]
    fn content_stream_table() {
        let schema = schema();
        let table = schema.table("cr_default_p_graph_contentstream").unwrap();
        assert_eq!(table.primary_key, vec!["contentStreamid"]);
        assert!(table.column("sourcecontentstreamid").unwrap().nullable);
        assert!(!table.column("contentStreamid").unwrap().nullable);
        let removed = table.column("removed").unwrap();
        assert_eq!(removed.default, Some(ColumnDefault::Bool(false)));
        assert_eq!(
            table.column("state").unwrap().column_type,
            ColumnType::Binary { length: 20 }
        );
    }

    #[test]
    fn rejects_bad_prefixes() {
        for bad in ["", "has space", "1abc", "semi;colon"] {
            assert!(matches!(
                ContentGraphSchemaBuilder::new(bad),
                Err(SchemaError::InvalidPrefix(_))
            ));
        }
    }
}
