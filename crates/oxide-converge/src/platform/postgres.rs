//! PostgreSQL platform.

use crate::diff::{SequenceChange, TableDiff};
use crate::schema::{ColumnDef, ColumnType, SequenceDef, TableDef};

use super::{is_temporary, secondary_indexes, Platform};

/// PostgreSQL platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresPlatform;

impl PostgresPlatform {
    /// Creates a new PostgreSQL platform.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn comment_sql(&self, table: &str, column: &str, comment: Option<&str>) -> String {
        format!(
            "COMMENT ON COLUMN {}.{} IS {}",
            self.quote_identifier(table),
            self.quote_identifier(column),
            comment.map_or_else(|| "NULL".to_string(), |c| self.quote_literal(c))
        )
    }

    fn sequence_options(sequence: &SequenceDef) -> String {
        let mut sql = format!(" INCREMENT BY {} START WITH {}", sequence.step, sequence.start);
        if let Some(cache) = sequence.cache {
            sql.push_str(&format!(" CACHE {cache}"));
        }
        sql
    }

    /// Renders the `OWNED BY` target, quoting `table.column` part by part.
    fn owner_sql(&self, owner: Option<&str>) -> String {
        owner.map_or_else(
            || "NONE".to_string(),
            |owner| {
                owner
                    .split('.')
                    .map(|part| self.quote_identifier(part))
                    .collect::<Vec<_>>()
                    .join(".")
            },
        )
    }

    fn alter_column_sql(&self, table: &str, name: &str, from: &ColumnDef, to: &ColumnDef) -> Vec<String> {
        let prefix = format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(name)
        );
        let mut sql = Vec::new();

        if self.native_type(from) != self.native_type(to) || from.definition != to.definition {
            let native = to.definition.clone().unwrap_or_else(|| self.native_type(to));
            sql.push(format!("{prefix} TYPE {native}"));
        }
        if from.nullable != to.nullable {
            let action = if to.nullable { "DROP" } else { "SET" };
            sql.push(format!("{prefix} {action} NOT NULL"));
        }
        if from.default != to.default {
            match self.default_sql(&to.default) {
                Some(default) => sql.push(format!("{prefix} SET DEFAULT {default}")),
                None => sql.push(format!("{prefix} DROP DEFAULT")),
            }
        }
        if from.auto_increment != to.auto_increment {
            if to.auto_increment {
                sql.push(format!("{prefix} ADD GENERATED BY DEFAULT AS IDENTITY"));
            } else {
                sql.push(format!("{prefix} DROP IDENTITY IF EXISTS"));
            }
        }
        if from.comment != to.comment {
            sql.push(self.comment_sql(table, name, to.comment.as_deref()));
        }
        sql
    }
}

impl Platform for PostgresPlatform {
    fn dialect_name(&self) -> &'static str {
        "postgresql"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn native_type(&self, column: &ColumnDef) -> String {
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
            ColumnType::Binary | ColumnType::Blob => "BYTEA".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime => "TIMESTAMP(0) WITHOUT TIME ZONE".to_string(),
            ColumnType::DateTimeTz => "TIMESTAMP(0) WITH TIME ZONE".to_string(),
            ColumnType::Time => "TIME(0) WITHOUT TIME ZONE".to_string(),
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

    fn supports_sequences(&self) -> bool {
        true
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    fn column_declaration(&self, name: &str, column: &ColumnDef) -> String {
        if let Some(definition) = &column.definition {
            return format!("{} {}", self.quote_identifier(name), definition);
        }

        let mut parts = vec![self.quote_identifier(name), self.native_type(column)];
        if column.auto_increment {
            parts.push("GENERATED BY DEFAULT AS IDENTITY".to_string());
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
        from.comment != to.comment
            || from.auto_increment != to.auto_increment
            || self.column_declaration("", from) != self.column_declaration("", to)
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

        let mut sql = vec![format!(
            "CREATE {}TABLE {} ({})",
            if is_temporary(table) { "TEMPORARY " } else { "" },
            self.quote_identifier(name),
            defs.join(", ")
        )];
        for (idx_name, idx) in secondary_indexes(table) {
            sql.push(self.create_index_sql(name, idx_name, idx));
        }
        for (col_name, col) in &table.columns {
            if let Some(comment) = &col.comment {
                sql.push(self.comment_sql(name, col_name, Some(comment)));
            }
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
            sql.push(format!(
                "ALTER TABLE {table} DROP CONSTRAINT {}",
                self.quote_identifier(&format!("{}_pkey", diff.name))
            ));
        }
        for name in &diff.dropped_columns {
            sql.push(format!(
                "ALTER TABLE {table} DROP COLUMN {}",
                self.quote_identifier(name)
            ));
        }
        for (name, col) in &diff.added_columns {
            sql.push(format!(
                "ALTER TABLE {table} ADD {}",
                self.column_declaration(name, col)
            ));
            if let Some(comment) = &col.comment {
                sql.push(self.comment_sql(&diff.name, name, Some(comment)));
            }
        }
        for (name, change) in &diff.changed_columns {
            sql.extend(self.alter_column_sql(&diff.name, name, &change.from, &change.to));
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
        sql
    }

    fn create_sequence_sql(&self, name: &str, sequence: &SequenceDef) -> Vec<String> {
        let mut sql = format!(
            "CREATE SEQUENCE {}{}",
            self.quote_identifier(name),
            Self::sequence_options(sequence)
        );
        if sequence.owner.is_some() {
            sql.push_str(&format!(" OWNED BY {}", self.owner_sql(sequence.owner.as_deref())));
        }
        vec![sql]
    }

    fn alter_sequence_sql(&self, name: &str, change: &SequenceChange) -> Vec<String> {
        let (from, to) = (&change.from, &change.to);
        let mut sql = format!(
            "ALTER SEQUENCE {} INCREMENT BY {}",
            self.quote_identifier(name),
            to.step
        );
        if from.start != to.start {
            sql.push_str(&format!(" START WITH {0} RESTART WITH {0}", to.start));
        }
        if let Some(cache) = to.cache {
            sql.push_str(&format!(" CACHE {cache}"));
        }
        if from.owner != to.owner {
            sql.push_str(&format!(" OWNED BY {}", self.owner_sql(to.owner.as_deref())));
        }
        vec![sql]
    }

    fn drop_sequence_sql(&self, name: &str) -> Vec<String> {
        vec![format!("DROP SEQUENCE {}", self.quote_identifier(name))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DefaultValue, IndexDef, SchemaSnapshot};

    fn items() -> TableDef {
        let mut table = TableDef::new();
        let mut id = ColumnDef::new(ColumnType::BigInt);
        id.auto_increment = true;
        table.columns.insert("id".to_string(), id);
        let mut flag = ColumnDef::new(ColumnType::Boolean);
        flag.default = DefaultValue::Bool(false);
        table.columns.insert("flag".to_string(), flag);
        table
            .indexes
            .insert("primary".to_string(), IndexDef::primary(vec!["id".to_string()]));
        table
    }

    #[test]
    fn test_create_table_with_identity() {
        let sql = PostgresPlatform::new().create_table_sql("items", &items());
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE \"items\" (\"id\" BIGINT GENERATED BY DEFAULT AS IDENTITY NOT NULL, \"flag\" BOOLEAN NOT NULL DEFAULT FALSE, PRIMARY KEY (\"id\"))"
            ]
        );
    }

    #[test]
    fn test_alter_column() {
        let platform = PostgresPlatform::new();
        let mut from = SchemaSnapshot::new();
        from.tables.insert("items".to_string(), items());
        let mut to = from.clone();
        if let Some(flag) = to
            .tables
            .get_mut("items")
            .and_then(|t| t.columns.get_mut("flag"))
        {
            flag.nullable = true;
            flag.comment = Some("Enabled".to_string());
        }

        let sql = platform.diff_to_statements(&from, &to);
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE \"items\" ALTER COLUMN \"flag\" DROP NOT NULL",
                "COMMENT ON COLUMN \"items\".\"flag\" IS 'Enabled'",
            ]
        );
    }

    #[test]
    fn test_sequences() {
        let platform = PostgresPlatform::new();
        let seq = SequenceDef {
            start: 1000,
            step: 10,
            cache: Some(100),
            owner: None,
        };
        assert_eq!(
            platform.create_sequence_sql("seq_test", &seq),
            vec!["CREATE SEQUENCE \"seq_test\" INCREMENT BY 10 START WITH 1000 CACHE 100"]
        );
        assert_eq!(
            platform.drop_sequence_sql("seq_test"),
            vec!["DROP SEQUENCE \"seq_test\""]
        );
    }

    #[test]
    fn test_sequence_owner_quotes_each_part() {
        let platform = PostgresPlatform::new();
        let seq = SequenceDef {
            owner: Some("orders.id".to_string()),
            ..SequenceDef::default()
        };
        assert_eq!(
            platform.create_sequence_sql("seq_orders", &seq),
            vec![
                "CREATE SEQUENCE \"seq_orders\" INCREMENT BY 1 START WITH 1 \
                 OWNED BY \"orders\".\"id\""
            ]
        );
    }

    #[test]
    fn test_alter_sequence_restarts_on_new_start() {
        let platform = PostgresPlatform::new();
        let from = SequenceDef::default();

        let to = SequenceDef {
            start: 500,
            ..SequenceDef::default()
        };
        let change = SequenceChange {
            from: from.clone(),
            to,
        };
        assert_eq!(
            platform.alter_sequence_sql("seq_test", &change),
            vec!["ALTER SEQUENCE \"seq_test\" INCREMENT BY 1 START WITH 500 RESTART WITH 500"]
        );

        let to = SequenceDef {
            step: 5,
            cache: Some(20),
            owner: Some("items.id".to_string()),
            ..SequenceDef::default()
        };
        let change = SequenceChange { from, to };
        assert_eq!(
            platform.alter_sequence_sql("seq_test", &change),
            vec!["ALTER SEQUENCE \"seq_test\" INCREMENT BY 5 CACHE 20 OWNED BY \"items\".\"id\""]
        );
    }

    #[test]
    fn test_rename_statements() {
        let platform = PostgresPlatform::new();
        assert_eq!(
            platform.rename_column_sql("t", "a", "b", &ColumnDef::new(ColumnType::Integer)),
            "ALTER TABLE \"t\" RENAME COLUMN \"a\" TO \"b\""
        );
        assert_eq!(
            platform.rename_index_sql("t", "idx_a", "idx_b", &IndexDef::default()),
            vec!["ALTER INDEX \"idx_a\" RENAME TO \"idx_b\""]
        );
    }

    #[test]
    fn test_foreign_keys_after_tables() {
        let platform = PostgresPlatform::new();
        let mut to = SchemaSnapshot::new();
        to.tables.insert("parent".to_string(), items());
        let mut child = TableDef::new();
        child
            .columns
            .insert("parent_id".to_string(), ColumnDef::new(ColumnType::BigInt));
        child.foreign_keys.insert(
            "fk_child_parent".to_string(),
            crate::schema::ForeignKeyDef {
                columns: vec!["parent_id".to_string()],
                foreign_table: "parent".to_string(),
                foreign_columns: vec!["id".to_string()],
                on_delete: crate::schema::ForeignKeyAction::Cascade,
                on_update: crate::schema::ForeignKeyAction::Cascade,
            },
        );
        to.tables.insert("child".to_string(), child);

        let sql = platform.diff_to_statements(&SchemaSnapshot::new(), &to);
        assert_eq!(sql.len(), 3);
        assert!(sql[0].starts_with("CREATE TABLE \"child\""));
        assert!(sql[1].starts_with("CREATE TABLE \"parent\""));
        assert!(sql[2].starts_with("ALTER TABLE \"child\" ADD CONSTRAINT \"fk_child_parent\""));
    }
}
