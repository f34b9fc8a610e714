//! MySQL / MariaDB platform.

use crate::diff::TableDiff;
use crate::schema::{ColumnDef, ColumnType, IndexDef, TableDef};

use super::{is_temporary, secondary_indexes, str_option, Platform};

/// MySQL platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlPlatform;

impl MysqlPlatform {
    /// Creates a new MySQL platform.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Picks the smallest LOB type holding `length` bytes.
    fn lob_type(prefix: &str, length: Option<u32>) -> String {
        match length {
            Some(len) if len <= 255 => format!("TINY{prefix}"),
            Some(len) if len <= 65_535 => prefix.to_string(),
            Some(len) if len <= 16_777_215 => format!("MEDIUM{prefix}"),
            _ => format!("LONG{prefix}"),
        }
    }

    fn table_options(&self, table: &TableDef) -> String {
        let mut opts = Vec::new();
        if let Some(engine) = str_option(&table.options, "engine") {
            opts.push(format!("ENGINE = {engine}"));
        }
        if let Some(charset) = str_option(&table.options, "charset") {
            opts.push(format!("DEFAULT CHARACTER SET {charset}"));
        }
        if let Some(collation) = str_option(&table.options, "collation") {
            opts.push(format!("COLLATE {collation}"));
        }
        opts.join(" ")
    }
}

impl Platform for MysqlPlatform {
    fn dialect_name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn native_type(&self, column: &ColumnDef) -> String {
        match &column.column_type {
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Integer => "INT".to_string(),
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::Boolean => "TINYINT(1)".to_string(),
            ColumnType::String => {
                let len = column.length.unwrap_or(255);
                if column.fixed {
                    format!("CHAR({len})")
                } else {
                    format!("VARCHAR({len})")
                }
            }
            ColumnType::Text => Self::lob_type("TEXT", column.length),
            ColumnType::Binary => {
                let len = column.length.unwrap_or(255);
                if column.fixed {
                    format!("BINARY({len})")
                } else {
                    format!("VARBINARY({len})")
                }
            }
            ColumnType::Blob => Self::lob_type("BLOB", column.length),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime | ColumnType::DateTimeTz => "DATETIME".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Float => "DOUBLE PRECISION".to_string(),
            ColumnType::Decimal => format!(
                "NUMERIC({}, {})",
                column.precision.unwrap_or(10),
                column.scale.unwrap_or(0)
            ),
            ColumnType::Guid => "CHAR(36)".to_string(),
            ColumnType::Json => "JSON".to_string(),
            ColumnType::Custom(name) => name.to_ascii_uppercase(),
        }
    }

    fn max_identifier_length(&self) -> usize {
        64
    }

    fn column_declaration(&self, name: &str, column: &ColumnDef) -> String {
        if let Some(definition) = &column.definition {
            return format!("{} {}", self.quote_identifier(name), definition);
        }

        let mut parts = vec![self.quote_identifier(name), self.native_type(column)];
        let numeric = column.column_type.is_integer()
            || matches!(column.column_type, ColumnType::Decimal | ColumnType::Float);
        if column.unsigned && numeric {
            parts.push("UNSIGNED".to_string());
        }
        if let Some(charset) = str_option(&column.options, "charset") {
            parts.push(format!("CHARACTER SET {charset}"));
        }
        if let Some(collation) = str_option(&column.options, "collation") {
            parts.push(format!("COLLATE {collation}"));
        }
        parts.push(if column.nullable { "NULL" } else { "NOT NULL" }.to_string());
        if let Some(default) = self.default_sql(&column.default) {
            parts.push(format!("DEFAULT {default}"));
        }
        if column.auto_increment {
            parts.push("AUTO_INCREMENT".to_string());
        }
        if let Some(comment) = &column.comment {
            parts.push(format!("COMMENT {}", self.quote_literal(comment)));
        }
        parts.join(" ")
    }

    fn create_table_sql(&self, name: &str, table: &TableDef) -> Vec<String> {
        let mut defs: Vec<String> = table
            .columns
            .iter()
            .map(|(col_name, col)| self.column_declaration(col_name, col))
            .collect();
        if let Some((_, pk)) = table.primary_key() {
            defs.push(format!("PRIMARY KEY ({})", self.quote_list(&pk.columns)));
        }

        let mut create = format!(
            "CREATE {}TABLE {} ({})",
            if is_temporary(table) { "TEMPORARY " } else { "" },
            self.quote_identifier(name),
            defs.join(", ")
        );
        let options = self.table_options(table);
        if !options.is_empty() {
            create.push(' ');
            create.push_str(&options);
        }

        let mut sql = vec![create];
        for (idx_name, idx) in secondary_indexes(table) {
            sql.push(self.create_index_sql(name, idx_name, idx));
        }
        sql
    }

    fn alter_table_sql(&self, diff: &TableDiff) -> Vec<String> {
        let table = self.quote_identifier(&diff.name);
        let mut sql = Vec::new();

        for (name, _) in &diff.dropped_indexes {
            sql.push(self.drop_index_sql(&diff.name, name));
        }
        if diff.dropped_primary.is_some() {
            sql.push(format!("ALTER TABLE {table} DROP PRIMARY KEY"));
        }
        for name in &diff.dropped_columns {
            sql.push(format!(
                "ALTER TABLE {table} DROP {}",
                self.quote_identifier(name)
            ));
        }
        for (name, col) in &diff.added_columns {
            sql.push(format!(
                "ALTER TABLE {table} ADD {}",
                self.column_declaration(name, col)
            ));
        }
        for (name, change) in &diff.changed_columns {
            sql.push(format!(
                "ALTER TABLE {table} MODIFY {}",
                self.column_declaration(name, &change.to)
            ));
        }
        if let Some((_, pk)) = &diff.added_primary {
            sql.push(format!(
                "ALTER TABLE {table} ADD PRIMARY KEY ({})",
                self.quote_list(&pk.columns)
            ));
        }
        for (name, idx) in &diff.added_indexes {
            sql.push(self.create_index_sql(&diff.name, name, idx));
        }
        if diff.options_changed {
            let options = self.table_options(&diff.to);
            if !options.is_empty() {
                sql.push(format!("ALTER TABLE {table} {options}"));
            }
        }
        sql
    }

    fn rename_column_sql(&self, table: &str, from: &str, to: &str, column: &ColumnDef) -> String {
        format!(
            "ALTER TABLE {} CHANGE {} {}",
            self.quote_identifier(table),
            self.quote_identifier(from),
            self.column_declaration(to, column)
        )
    }

    fn rename_index_sql(&self, table: &str, from: &str, to: &str, _index: &IndexDef) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} RENAME INDEX {} TO {}",
            self.quote_identifier(table),
            self.quote_identifier(from),
            self.quote_identifier(to)
        )]
    }

    fn create_index_sql(&self, table: &str, name: &str, index: &IndexDef) -> String {
        let kind = if index.is_spatial() {
            "SPATIAL "
        } else if index.unique {
            "UNIQUE "
        } else {
            ""
        };
        format!(
            "CREATE {kind}INDEX {} ON {} ({})",
            self.quote_identifier(name),
            self.quote_identifier(table),
            self.quote_list(&index.columns)
        )
    }

    fn drop_index_sql(&self, table: &str, name: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(name),
            self.quote_identifier(table)
        )
    }

    fn drop_foreign_key_sql(&self, table: &str, name: &str) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.quote_identifier(table),
            self.quote_identifier(name)
        )]
    }
}
