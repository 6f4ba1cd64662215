//! DDL rendering.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::manager::SchemaDiff;
use crate::model::{Column, ColumnDefault, ColumnType, Index, Schema, Table};

/// Target SQL dialect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    MySql,
    Sqlite,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MySql => f.write_str("mysql"),
            Self::Sqlite => f.write_str("sqlite"),
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown SQL dialect {other:?}")),
        }
    }
}

impl Schema {
    /// One statement per table and index, without trailing semicolons.
    pub fn to_statements(&self, dialect: Dialect) -> Vec<String> {
        let mut out = Vec::new();
        for table in &self.tables {
            out.push(create_table(table, dialect));
            out.extend(table.indexes.iter().map(|i| create_index(&table.name, i, dialect)));
        }
        out
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        join(self.to_statements(dialect))
    }
}

impl SchemaDiff {
    pub fn to_statements(&self, dialect: Dialect) -> Vec<String> {
        let mut out = Schema {
            tables: self.missing_tables.clone(),
        }
        .to_statements(dialect);
        for (table, column) in &self.missing_columns {
            out.push(format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote(table, dialect),
                column_definition(column, dialect, false)
            ));
        }
        out.extend(
            self.missing_indexes
                .iter()
                .map(|(table, index)| create_index(table, index, dialect)),
        );
        out
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        join(self.to_statements(dialect))
    }
}

fn join(statements: Vec<String>) -> String {
    statements
        .into_iter()
        .map(|s| format!("{s};\n"))
        .collect()
}

fn quote(identifier: &str, dialect: Dialect) -> String {
    match dialect {
        Dialect::MySql => format!("`{identifier}`"),
        Dialect::Sqlite => format!("\"{identifier}\""),
    }
}

fn create_table(table: &Table, dialect: Dialect) -> String {
    // SQLite only autoincrements an inline INTEGER PRIMARY KEY.
    let inline_key = dialect == Dialect::Sqlite
        && table.primary_key.len() == 1
        && table
            .column(&table.primary_key[0])
            .is_some_and(|c| c.autoincrement);

    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("    {}", column_definition(c, dialect, inline_key)))
        .collect();
    if !table.primary_key.is_empty() && !inline_key {
        let key: Vec<_> = table.primary_key.iter().map(|c| quote(c, dialect)).collect();
        lines.push(format!("    PRIMARY KEY ({})", key.join(", ")));
    }

    let body = lines.join(",\n");
    match dialect {
        Dialect::MySql => format!(
            "CREATE TABLE {} (\n{body}\n) DEFAULT CHARACTER SET utf8mb4 COLLATE `utf8mb4_unicode_520_ci` ENGINE = InnoDB",
            quote(&table.name, dialect)
        ),
        Dialect::Sqlite => format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{body}\n)",
            quote(&table.name, dialect)
        ),
    }
}

fn create_index(table: &str, index: &Index, dialect: Dialect) -> String {
    let columns: Vec<_> = index.columns.iter().map(|c| quote(c, dialect)).collect();
    let if_not_exists = match dialect {
        Dialect::MySql => "",
        Dialect::Sqlite => "IF NOT EXISTS ",
    };
    format!(
        "CREATE INDEX {if_not_exists}{} ON {} ({})",
        quote(&index.name, dialect),
        quote(table, dialect),
        columns.join(", ")
    )
}

fn column_definition(column: &Column, dialect: Dialect, inline_key: bool) -> String {
    let mut def = format!("{} {}", quote(&column.name, dialect), column_type(column.column_type, dialect));

    if dialect == Dialect::MySql {
        if let Some(charset) = &column.charset {
            def.push_str(&format!(" CHARACTER SET {charset}"));
        }
        if let Some(collation) = &column.collation {
            def.push_str(&format!(" COLLATE `{collation}`"));
        }
    }

    if column.autoincrement && inline_key {
        def.push_str(" PRIMARY KEY AUTOINCREMENT");
        return def;
    }

    def.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
    if let Some(default) = &column.default {
        def.push_str(" DEFAULT ");
        def.push_str(&default_literal(default));
    }
    if column.autoincrement && dialect == Dialect::MySql {
        def.push_str(" AUTO_INCREMENT");
    }
    def
}

fn column_type(column_type: ColumnType, dialect: Dialect) -> String {
    match (dialect, column_type) {
        (Dialect::MySql, ColumnType::BigInt { unsigned: true }) => "BIGINT UNSIGNED".into(),
        (Dialect::MySql, ColumnType::BigInt { unsigned: false }) => "BIGINT".into(),
        (Dialect::MySql, ColumnType::Integer) => "INT".into(),
        (Dialect::MySql, ColumnType::Text) => "LONGTEXT".into(),
        (Dialect::MySql, ColumnType::Binary { length }) => format!("BINARY({length})"),
        (Dialect::MySql, ColumnType::Json) => "JSON".into(),
        (Dialect::MySql, ColumnType::Boolean) => "TINYINT(1)".into(),
        (Dialect::Sqlite, ColumnType::BigInt { .. } | ColumnType::Integer) => "INTEGER".into(),
        (Dialect::Sqlite, ColumnType::Text | ColumnType::Json) => "TEXT".into(),
        (Dialect::Sqlite, ColumnType::Binary { .. }) => "BLOB".into(),
        (Dialect::Sqlite, ColumnType::Boolean) => "BOOLEAN".into(),
        (_, ColumnType::String { length }) => format!("VARCHAR({length})"),
        (_, ColumnType::DateTimeImmutable) => "DATETIME".into(),
    }
}

fn default_literal(default: &ColumnDefault) -> String {
    match default {
        ColumnDefault::Null => "NULL".into(),
        ColumnDefault::Bool(true) => "1".into(),
        ColumnDefault::Bool(false) => "0".into(),
        ColumnDefault::Text(s) => format!("'{}'", s.replace('\'', "''")),
        ColumnDefault::CurrentTimestamp => "CURRENT_TIMESTAMP".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ContentGraphSchemaBuilder;

    fn schema() -> Schema {
        ContentGraphSchemaBuilder::new("cr_default_p_graph").unwrap().build().unwrap()
    }

    #[test]
    fn mysql_node_table() {
        let sql = schema().to_sql(Dialect::MySql);
        assert!(sql.contains("CREATE TABLE `cr_default_p_graph_node` ("));
        assert!(sql.contains("`relationanchorpoint` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT"));
        assert!(sql.contains(
            "`nodeaggregateid` VARCHAR(64) CHARACTER SET ascii COLLATE `ascii_general_ci` NULL"
        ));
        assert!(sql.contains("`created` DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP"));
        assert!(sql.contains("`lastmodified` DATETIME NULL DEFAULT NULL"));
        assert!(sql.contains("PRIMARY KEY (`relationanchorpoint`)"));
        assert!(sql.contains("ENGINE = InnoDB"));
    }

    #[test]
    fn mysql_json_and_boolean_defaults() {
        let sql = schema().to_sql(Dialect::MySql);
        assert!(sql.contains("`subtreetags` JSON NOT NULL DEFAULT '{}'"));
        assert!(sql.contains("`removed` TINYINT(1) NULL DEFAULT 0"));
        assert!(sql.contains("PRIMARY KEY (`name`, `position`, `nodeanchorpoint`)"));
    }

    #[test]
    fn statement_count_covers_tables_and_indexes() {
        // 5 tables, 2 node indexes, 5 hierarchy indexes.
        assert_eq!(schema().to_statements(Dialect::MySql).len(), 12);
        assert!(schema().to_sql(Dialect::Sqlite).ends_with(";\n"));
    }

    #[test]
    fn sqlite_inlines_autoincrement_key() {
        let sql = schema().to_sql(Dialect::Sqlite);
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS \"cr_default_p_graph_node\""));
        assert!(sql.contains("\"relationanchorpoint\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(!sql.contains("PRIMARY KEY (\"relationanchorpoint\")"));
        assert!(!sql.contains("CHARACTER SET"));
        assert!(sql.contains("CREATE INDEX IF NOT EXISTS"));
    }

    #[test]
    fn diff_renders_alter_table() {
        let mut diff = SchemaDiff::default();
        diff.missing_columns.push((
            "t".into(),
            Column::new("c", ColumnType::Integer).with_default(ColumnDefault::Text("it's".into())),
        ));
        assert_eq!(
            diff.to_sql(Dialect::Sqlite),
            "ALTER TABLE \"t\" ADD COLUMN \"c\" INTEGER NOT NULL DEFAULT 'it''s';\n"
        );
    }

    #[test]
    fn dialect_parses() {
        assert_eq!("MySQL".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!("sqlite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert!("oracle".parse::<Dialect>().is_err());
    }
}
