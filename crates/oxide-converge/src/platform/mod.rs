//! SQL dialect providers.
//!
//! A [`Platform`] turns the difference between two schema snapshots into
//! DDL statements for one database system, and renders the statements for
//! operations that are executed directly (drops, renames, views).

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MysqlPlatform;
pub use postgres::PostgresPlatform;
pub use sqlite::SqlitePlatform;

use std::fmt;

use crate::diff::{SchemaDiff, SequenceChange, TableDiff};
use crate::schema::{
    ColumnDef, DefaultValue, ForeignKeyDef, IndexDef, SchemaSnapshot, SequenceDef, TableDef,
};

/// Trait for database-specific SQL generation.
pub trait Platform: Send + Sync + fmt::Debug {
    /// Returns the dialect name (`sqlite`, `postgresql`, `mysql`, ...).
    fn dialect_name(&self) -> &'static str;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quote a string literal.
    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Returns the bind parameter placeholder for the 1-based `index`.
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// Returns the native type declaration for a column.
    fn native_type(&self, column: &ColumnDef) -> String;

    /// Maximum identifier length.
    fn max_identifier_length(&self) -> usize {
        63
    }

    /// Returns whether this dialect has sequences.
    fn supports_sequences(&self) -> bool {
        false
    }

    /// Returns the SQL for a boolean literal.
    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    /// Returns the SQL for a default value, or `None` if no default is set.
    fn default_sql(&self, default: &DefaultValue) -> Option<String> {
        match default {
            DefaultValue::None => None,
            DefaultValue::Null => Some("NULL".to_string()),
            DefaultValue::Bool(b) => Some(self.boolean_literal(*b).to_string()),
            DefaultValue::Integer(i) => Some(i.to_string()),
            DefaultValue::Float(f) => Some(f.to_string()),
            DefaultValue::String(s) => Some(self.quote_literal(s)),
            DefaultValue::Expression(e) => Some(e.clone()),
        }
    }

    /// Generates the column definition used in CREATE/ALTER TABLE.
    fn column_declaration(&self, name: &str, column: &ColumnDef) -> String {
        if let Some(definition) = &column.definition {
            return format!("{} {}", self.quote_identifier(name), definition);
        }

        let mut parts = vec![self.quote_identifier(name), self.native_type(column)];
        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = self.default_sql(&column.default) {
            parts.push(format!("DEFAULT {default}"));
        }
        parts.join(" ")
    }

    /// Returns true if the column must be altered to go from `from` to `to`.
    fn column_changed(&self, from: &ColumnDef, to: &ColumnDef) -> bool {
        from.auto_increment != to.auto_increment
            || self.column_declaration("", from) != self.column_declaration("", to)
    }

    /// Returns true if the index must be recreated to go from `from` to `to`.
    fn index_changed(&self, from: &IndexDef, to: &IndexDef) -> bool {
        !to.spans_columns(&from.columns)
            || from.unique != to.unique
            || from.primary != to.primary
            || from.flags != to.flags
    }

    /// Generates the statements creating a table and its indexes.
    fn create_table_sql(&self, name: &str, table: &TableDef) -> Vec<String>;

    /// Generates the statements altering a table.
    fn alter_table_sql(&self, diff: &TableDiff) -> Vec<String>;

    /// Generates SQL for dropping a table.
    fn drop_table_sql(&self, name: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(name))
    }

    /// Generates SQL for renaming a table.
    fn rename_table_sql(&self, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }

    /// Generates SQL for renaming a column.
    fn rename_column_sql(&self, table: &str, from: &str, to: &str, _column: &ColumnDef) -> String {
        format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.quote_identifier(table),
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }

    /// Generates SQL for renaming an index.
    fn rename_index_sql(&self, _table: &str, from: &str, to: &str, _index: &IndexDef) -> Vec<String> {
        vec![format!(
            "ALTER INDEX {} RENAME TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        )]
    }

    /// Generates SQL for creating an index.
    fn create_index_sql(&self, table: &str, name: &str, index: &IndexDef) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            self.quote_identifier(name),
            self.quote_identifier(table),
            self.quote_list(&index.columns)
        )
    }

    /// Generates SQL for dropping an index.
    fn drop_index_sql(&self, _table: &str, name: &str) -> String {
        format!("DROP INDEX {}", self.quote_identifier(name))
    }

    /// Generates the constraint clause of a foreign key.
    fn foreign_key_clause(&self, name: &str, fk: &ForeignKeyDef) -> String {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            self.quote_identifier(name),
            self.quote_list(&fk.columns),
            self.quote_identifier(&fk.foreign_table),
            self.quote_list(&fk.foreign_columns),
            fk.on_delete.to_sql(),
            fk.on_update.to_sql()
        )
    }

    /// Generates SQL for adding a foreign key to an existing table.
    fn add_foreign_key_sql(&self, table: &str, name: &str, fk: &ForeignKeyDef) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(table),
            self.foreign_key_clause(name, fk)
        )]
    }

    /// Generates SQL for dropping a foreign key.
    fn drop_foreign_key_sql(&self, table: &str, name: &str) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote_identifier(table),
            self.quote_identifier(name)
        )]
    }

    /// Generates SQL for creating a sequence.
    fn create_sequence_sql(&self, _name: &str, _sequence: &SequenceDef) -> Vec<String> {
        Vec::new()
    }

    /// Generates SQL for altering a sequence.
    fn alter_sequence_sql(&self, _name: &str, _change: &SequenceChange) -> Vec<String> {
        Vec::new()
    }

    /// Generates SQL for dropping a sequence.
    fn drop_sequence_sql(&self, _name: &str) -> Vec<String> {
        Vec::new()
    }

    /// Generates SQL for creating a view.
    fn create_view_sql(&self, name: &str, sql: &str) -> String {
        format!("CREATE VIEW {} AS {}", self.quote_identifier(name), sql)
    }

    /// Generates SQL for dropping a view.
    fn drop_view_sql(&self, name: &str) -> String {
        format!("DROP VIEW {}", self.quote_identifier(name))
    }

    /// Quotes and joins a list of identifiers.
    fn quote_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.quote_identifier(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Returns the statements converting `applied` into `desired`.
    fn diff_to_statements(&self, applied: &SchemaSnapshot, desired: &SchemaSnapshot) -> Vec<String> {
        let diff = SchemaDiff::between(applied, desired, self);
        self.diff_sql(&diff)
    }

    /// Returns the tables whose pending changes cannot run inside an open
    /// transaction.
    fn non_transactional_tables(
        &self,
        _applied: &SchemaSnapshot,
        _desired: &SchemaSnapshot,
    ) -> Vec<String> {
        Vec::new()
    }

    /// Renders a diff in an order that keeps references valid.
    fn diff_sql(&self, diff: &SchemaDiff) -> Vec<String> {
        let mut sql = Vec::new();

        for (name, seq) in &diff.created_sequences {
            sql.extend(self.create_sequence_sql(name, seq));
        }

        for table in &diff.altered_tables {
            for (name, _) in &table.dropped_foreign_keys {
                sql.extend(self.drop_foreign_key_sql(&table.name, name));
            }
        }
        for (table, def) in &diff.dropped_tables {
            for name in def.foreign_keys.keys() {
                sql.extend(self.drop_foreign_key_sql(table, name));
            }
        }

        for (name, _) in &diff.dropped_tables {
            sql.push(self.drop_table_sql(name));
        }

        for (name, table) in &diff.created_tables {
            sql.extend(self.create_table_sql(name, table));
        }

        for table in &diff.altered_tables {
            sql.extend(self.alter_table_sql(table));
        }

        for (name, table) in &diff.created_tables {
            for (fk_name, fk) in &table.foreign_keys {
                sql.extend(self.add_foreign_key_sql(name, fk_name, fk));
            }
        }
        for table in &diff.altered_tables {
            for (name, fk) in &table.added_foreign_keys {
                sql.extend(self.add_foreign_key_sql(&table.name, name, fk));
            }
        }

        for (name, change) in &diff.altered_sequences {
            sql.extend(self.alter_sequence_sql(name, change));
        }
        for name in &diff.dropped_sequences {
            sql.extend(self.drop_sequence_sql(name));
        }

        sql
    }
}

/// Returns true if the table is declared temporary.
pub(crate) fn is_temporary(table: &TableDef) -> bool {
    table
        .options
        .get("temporary")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

/// Returns a string option of a table or column.
pub(crate) fn str_option<'a>(
    options: &'a std::collections::BTreeMap<String, serde_json::Value>,
    key: &str,
) -> Option<&'a str> {
    options.get(key).and_then(serde_json::Value::as_str)
}

/// Returns the non-primary indexes of a table.
pub(crate) fn secondary_indexes(table: &TableDef) -> impl Iterator<Item = (&String, &IndexDef)> {
    table.indexes.iter().filter(|(_, idx)| !idx.primary)
}
