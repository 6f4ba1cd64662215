//! Shared column shapes for identifier-like columns.

use crate::model::{Column, ColumnType};

pub const ASCII: &str = "ascii";
pub const ASCII_COLLATION: &str = "ascii_general_ci";
/// Collation of free-form JSON text columns.
pub const UNICODE_COLLATION: &str = "utf8mb4_unicode_520_ci";

pub fn node_anchor_point(name: &str) -> Column {
    Column::new(name, ColumnType::BigInt { unsigned: true })
}

pub fn node_aggregate_id(name: &str) -> Column {
    ascii(Column::new(name, ColumnType::String { length: 64 }))
}

pub fn content_stream_id(name: &str) -> Column {
    ascii(Column::new(name, ColumnType::String { length: 36 }))
}

pub fn dimension_space_point_hash(name: &str) -> Column {
    ascii(Column::new(name, ColumnType::String { length: 32 }))
}

pub fn dimension_space_point(name: &str) -> Column {
    Column::new(name, ColumnType::Text).with_collation(UNICODE_COLLATION)
}

pub fn node_type_name(name: &str) -> Column {
    ascii(Column::new(name, ColumnType::String { length: 255 }))
}

/// Relation names: nullable for hierarchy edges, required for references.
pub fn relation_name(name: &str) -> Column {
    ascii(Column::new(name, ColumnType::String { length: 255 }))
}

fn ascii(column: Column) -> Column {
    column.with_charset(ASCII).with_collation(ASCII_COLLATION)
}
