//! SQLite platform.
//!
//! SQLite has limited ALTER TABLE support, so most table changes use the
//! "table recreation" strategy: create a new table, copy data, drop the old
//! table, rename the new table. Primary and foreign keys are declared inline
//! and sequences do not exist.

use crate::diff::{SchemaDiff, TableDiff};
use crate::schema::{ColumnDef, ColumnType, DefaultValue, IndexDef, SchemaSnapshot, TableDef};

use super::{is_temporary, secondary_indexes, Platform};

/// Prefix of the intermediate table used while rebuilding a table.
const TEMP_PREFIX: &str = "__temp__";

/// SQLite platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlitePlatform;

impl SqlitePlatform {
    /// Creates a new SQLite platform.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Generates the CREATE TABLE statement without indexes.
    fn create_table_statement(&self, name: &str, table: &TableDef) -> String {
        let mut defs: Vec<String> = table
            .columns
            .iter()
            .map(|(col_name, col)| self.column_declaration(col_name, col))
            .collect();

        // An AUTOINCREMENT column already carries the primary key
        if let Some((_, pk)) = table.primary_key() {
            let inline = pk.columns.len() == 1
                && table
                    .column(&pk.columns[0])
                    .is_some_and(|c| self.is_rowid_alias(c));
            if !inline {
                defs.push(format!("PRIMARY KEY ({})", self.quote_list(&pk.columns)));
            }
        }

        for (fk_name, fk) in &table.foreign_keys {
            defs.push(self.foreign_key_clause(fk_name, fk));
        }

        format!(
            "CREATE {}TABLE {} (\n  {}\n)",
            if is_temporary(table) { "TEMPORARY " } else { "" },
            self.quote_identifier(name),
            defs.join(",\n  ")
        )
    }

    fn is_rowid_alias(&self, column: &ColumnDef) -> bool {
        column.auto_increment && column.column_type.is_integer() && column.definition.is_none()
    }

    /// Returns true if the changes can be applied with ADD COLUMN and index
    /// statements only.
    fn can_alter_in_place(diff: &TableDiff) -> bool {
        diff.changed_columns.is_empty()
            && diff.dropped_columns.is_empty()
            && !diff.primary_changed()
            && diff.added_foreign_keys.is_empty()
            && diff.dropped_foreign_keys.is_empty()
            && diff.added_columns.iter().all(|(_, col)| {
                !col.auto_increment
                    && (col.nullable
                        || matches!(
                            col.default,
                            DefaultValue::Null
                                | DefaultValue::Bool(_)
                                | DefaultValue::Integer(_)
                                | DefaultValue::Float(_)
                                | DefaultValue::String(_)
                        ))
            })
    }

    /// Recreates the table with its new definition and copies the data of
    /// the columns both versions share.
    fn rebuild_table_sql(&self, diff: &TableDiff) -> Vec<String> {
        let temp = format!("{TEMP_PREFIX}{}", diff.name);
        let common: Vec<String> = diff
            .to
            .columns
            .keys()
            .filter(|c| diff.from.columns.contains_key(*c))
            .cloned()
            .collect();

        // dropping the old table must not cascade into referencing tables
        let mut sql = vec![
            "PRAGMA foreign_keys = OFF".to_string(),
            self.create_table_statement(&temp, &diff.to),
        ];
        if !common.is_empty() {
            let cols = self.quote_list(&common);
            sql.push(format!(
                "INSERT INTO {} ({cols}) SELECT {cols} FROM {}",
                self.quote_identifier(&temp),
                self.quote_identifier(&diff.name)
            ));
        }
        sql.push(self.drop_table_sql(&diff.name));
        sql.push(self.rename_table_sql(&temp, &diff.name));
        for (idx_name, idx) in secondary_indexes(&diff.to) {
            sql.push(self.create_index_sql(&diff.name, idx_name, idx));
        }
        sql.push("PRAGMA foreign_keys = ON".to_string());
        sql
    }
}

impl Platform for SqlitePlatform {
    fn dialect_name(&self) -> &'static str {
        "sqlite"
    }

    fn native_type(&self, column: &ColumnDef) -> String {
        if self.is_rowid_alias(column) {
            return "INTEGER".to_string();
        }
        match &column.column_type {
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::String => {
                let len = column.length.unwrap_or(255);
                if column.fixed {
                    format!("CHAR({len})")
                } else {
                    format!("VARCHAR({len})")
                }
            }
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Binary => {
                let len = column.length.unwrap_or(255);
                if column.fixed {
                    format!("BINARY({len})")
                } else {
                    format!("VARBINARY({len})")
                }
            }
            ColumnType::Blob => "BLOB".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime | ColumnType::DateTimeTz => "DATETIME".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Float => "DOUBLE PRECISION".to_string(),
            ColumnType::Decimal => format!(
                "NUMERIC({}, {})",
                column.precision.unwrap_or(10),
                column.scale.unwrap_or(0)
            ),
            ColumnType::Guid => "UUID".to_string(),
            ColumnType::Json => "JSON".to_string(),
            ColumnType::Custom(name) => name.to_ascii_uppercase(),
        }
    }

    fn max_identifier_length(&self) -> usize {
        128
    }

    fn column_declaration(&self, name: &str, column: &ColumnDef) -> String {
        if let Some(definition) = &column.definition {
            return format!("{} {}", self.quote_identifier(name), definition);
        }

        let mut parts = vec![self.quote_identifier(name), self.native_type(column)];
        if self.is_rowid_alias(column) {
            parts.push("PRIMARY KEY AUTOINCREMENT".to_string());
        }
        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = self.default_sql(&column.default) {
            parts.push(format!("DEFAULT {default}"));
        }
        parts.join(" ")
    }

    fn column_changed(&self, from: &ColumnDef, to: &ColumnDef) -> bool {
        // INTEGER and BIGINT share one storage class; the rowid alias always
        // reads back as INTEGER
        let storage = |column: &ColumnDef| {
            let mut column = column.clone();
            if column.column_type == ColumnType::BigInt {
                column.column_type = ColumnType::Integer;
            }
            column
        };
        let (from, to) = (storage(from), storage(to));
        from.auto_increment != to.auto_increment
            || self.column_declaration("", &from) != self.column_declaration("", &to)
    }

    // foreign_keys = OFF is ignored inside a transaction, so dropping a
    // referenced table during a rebuild would cascade into its children
    fn non_transactional_tables(
        &self,
        applied: &SchemaSnapshot,
        desired: &SchemaSnapshot,
    ) -> Vec<String> {
        let referenced = |name: &str| {
            applied.tables.iter().any(|(table_name, table)| {
                table_name != name
                    && table.foreign_keys.values().any(|fk| fk.foreign_table == name)
            })
        };

        SchemaDiff::between(applied, desired, self)
            .altered_tables
            .iter()
            .filter(|diff| !Self::can_alter_in_place(diff) && referenced(&diff.name))
            .map(|diff| diff.name.clone())
            .collect()
    }

    fn index_changed(&self, from: &IndexDef, to: &IndexDef) -> bool {
        // index flags are not stored by SQLite
        !to.spans_columns(&from.columns) || from.unique != to.unique || from.primary != to.primary
    }

    fn create_table_sql(&self, name: &str, table: &TableDef) -> Vec<String> {
        let mut sql = vec![self.create_table_statement(name, table)];
        for (idx_name, idx) in secondary_indexes(table) {
            sql.push(self.create_index_sql(name, idx_name, idx));
        }
        sql
    }

    fn alter_table_sql(&self, diff: &TableDiff) -> Vec<String> {
        if !Self::can_alter_in_place(diff) {
            return self.rebuild_table_sql(diff);
        }

        let mut sql = Vec::new();
        for (name, _) in &diff.dropped_indexes {
            sql.push(self.drop_index_sql(&diff.name, name));
        }
        for (name, col) in &diff.added_columns {
            sql.push(format!(
                "ALTER TABLE {} ADD COLUMN {}",
                self.quote_identifier(&diff.name),
                self.column_declaration(name, col)
            ));
        }
        for (name, idx) in &diff.added_indexes {
            sql.push(self.create_index_sql(&diff.name, name, idx));
        }
        sql
    }

    fn rename_index_sql(&self, table: &str, from: &str, to: &str, index: &IndexDef) -> Vec<String> {
        vec![
            self.drop_index_sql(table, from),
            self.create_index_sql(table, to, index),
        ]
    }

    // Foreign keys are part of the table definition and change by rebuild
    fn add_foreign_key_sql(
        &self,
        _table: &str,
        _name: &str,
        _fk: &crate::schema::ForeignKeyDef,
    ) -> Vec<String> {
        Vec::new()
    }

    fn drop_foreign_key_sql(&self, _table: &str, _name: &str) -> Vec<String> {
        Vec::new()
    }
}
