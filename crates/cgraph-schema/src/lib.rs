//! Table layout of the content graph projection.
//!
//! The graph is persisted in five tables sharing a configurable name prefix:
//! nodes, hierarchy relations, reference relations, dimension space points
//! and content streams. This crate describes them declaratively, compares the
//! description against an existing database through [`SchemaManager`], and
//! renders DDL for MySQL and SQLite.

pub mod builder;
pub mod columns;
pub mod error;
pub mod manager;
pub mod model;
pub mod sql;

pub use builder::ContentGraphSchemaBuilder;
pub use error::{SchemaError, SchemaResult};
pub use manager::{InMemorySchemaManager, SchemaDiff, SchemaManager};
pub use model::{Column, ColumnDefault, ColumnType, Index, Schema, Table};
pub use sql::Dialect;
