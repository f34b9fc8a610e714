//! SQLite driver built on `sqlx`.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteRow};
use sqlx::{Column, Connection as _, Executor, Row as _, Sqlite, TypeInfo, ValueRef};
use tracing::debug;

use crate::connection::{Connection, ConnectionFactory, DatabaseConfig, Introspector};
use crate::error::{ConvergeError, Result};
use crate::platform::{Platform, SqlitePlatform};
use crate::schema::{
    generated_name, ColumnDef, ColumnType, DefaultValue, ForeignKeyAction, ForeignKeyDef,
    IndexDef, SchemaSnapshot, TableDef, ViewDef,
};
use crate::value::{Row, Value};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// A connection to a SQLite database.
pub struct SqliteConnection {
    conn: sqlx::SqliteConnection,
    platform: Arc<SqlitePlatform>,
    introspector: Arc<SqliteIntrospector>,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection").finish_non_exhaustive()
    }
}

impl SqliteConnection {
    /// Opens a connection, creating the database file if it is missing.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let conn = sqlx::SqliteConnection::connect_with(&options).await?;
        Ok(Self::from_sqlx(conn))
    }

    /// Wraps an already opened `sqlx` connection.
    #[must_use]
    pub fn from_sqlx(conn: sqlx::SqliteConnection) -> Self {
        Self {
            conn,
            platform: Arc::new(SqlitePlatform::new()),
            introspector: Arc::new(SqliteIntrospector::new()),
        }
    }
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &'q Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.as_str()),
        Value::Bytes(b) => query.bind(b.as_slice()),
    }
}

fn decode_row(row: &SqliteRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());

    for (i, col) in row.columns().iter().enumerate() {
        columns.push(col.name().to_string());

        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_string();
            match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => Value::Int(row.try_get_unchecked::<i64, _>(i)?),
                "REAL" | "NUMERIC" => Value::Float(row.try_get_unchecked::<f64, _>(i)?),
                "BLOB" => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(i)?),
                _ => Value::Text(row.try_get_unchecked::<String, _>(i)?),
            }
        };
        values.push(value);
    }

    Ok(Row::new(columns, values))
}

#[async_trait]
impl Connection for SqliteConnection {
    fn platform(&self) -> Arc<dyn Platform> {
        self.platform.clone()
    }

    fn introspector(&self) -> Arc<dyn Introspector> {
        self.introspector.clone()
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        debug!(sql = %sql, params = params.len(), "Executing statement");
        let query = params.iter().fold(sqlx::query(sql), bind_value);
        let result = query.execute(&mut self.conn).await?;
        Ok(result.rows_affected())
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<()> {
        debug!(sql = %sql, "Executing batch");
        Executor::execute(&mut self.conn, sql).await?;
        Ok(())
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        debug!(sql = %sql, params = params.len(), "Running query");
        let query = params.iter().fold(sqlx::query(sql), bind_value);
        let rows = query.fetch_all(&mut self.conn).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn begin(&mut self) -> Result<()> {
        Executor::execute(&mut self.conn, "BEGIN").await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        Executor::execute(&mut self.conn, "COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        Executor::execute(&mut self.conn, "ROLLBACK").await?;
        Ok(())
    }

    async fn last_insert_id(&mut self, _sequence: Option<&str>) -> Result<i64> {
        let row = sqlx::query("SELECT last_insert_rowid()")
            .fetch_one(&mut self.conn)
            .await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.conn.close().await?;
        Ok(())
    }
}

/// Opens [`SqliteConnection`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnectionFactory;

#[async_trait]
impl ConnectionFactory for SqliteConnectionFactory {
    async fn connect(&self, config: &DatabaseConfig) -> Result<Box<dyn Connection>> {
        if !config.driver.eq_ignore_ascii_case("sqlite") {
            return Err(ConvergeError::config(format!(
                "Unsupported driver \"{}\"",
                config.driver
            )));
        }
        Ok(Box::new(SqliteConnection::connect(&config.url).await?))
    }
}

/// Reads the schema from `sqlite_master` and the table pragmas.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteIntrospector;

impl SqliteIntrospector {
    /// Creates a new introspector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn table(
        &self,
        conn: &mut dyn Connection,
        platform: &SqlitePlatform,
        name: &str,
        create_sql: &str,
    ) -> Result<TableDef> {
        let mut table = TableDef::new();
        let quoted = platform.quote_identifier(name);
        let autoincrement = create_sql.to_ascii_uppercase().contains("AUTOINCREMENT");

        let mut pk: Vec<(i64, String)> = Vec::new();
        let mut declared_types = HashMap::new();
        for row in conn
            .query(&format!("PRAGMA table_info({quoted})"), &[])
            .await?
        {
            let col_name = text(&row, "name")?;
            let declared = text(&row, "type")?;
            let mut column = parse_declared_type(&declared);
            column.nullable = int(&row, "notnull")? == 0;
            column.default = match row.get("dflt_value") {
                Some(Value::Text(raw)) => DefaultValue::from_sql(raw),
                Some(Value::Int(i)) => DefaultValue::Integer(*i),
                Some(Value::Float(f)) => DefaultValue::Float(*f),
                _ => DefaultValue::None,
            };

            let pk_pos = int(&row, "pk")?;
            if pk_pos > 0 {
                pk.push((pk_pos, col_name.clone()));
            }
            declared_types.insert(col_name.clone(), declared);
            table.columns.insert(col_name, column);
        }

        pk.sort();
        if !pk.is_empty() {
            let columns: Vec<String> = pk.into_iter().map(|(_, c)| c).collect();
            if autoincrement && columns.len() == 1 {
                if let Some(col) = table.columns.get_mut(&columns[0]) {
                    col.auto_increment = col.column_type.is_integer();
                }
            }
            table
                .indexes
                .insert("primary".to_string(), IndexDef::primary(columns));
        }

        // keep declarations the column attributes cannot reproduce, such as
        // COLLATE or CHECK clauses
        let inline_pk = Regex::new(r"(?i)\bPRIMARY\s+KEY(?:\s+(?:ASC|DESC))?(?:\s+AUTOINCREMENT)?")
            .map_err(|e| ConvergeError::execution(e.to_string()))?;
        for (col_name, raw) in column_declarations(create_sql) {
            let (Some(column), Some(declared)) =
                (table.columns.get_mut(&col_name), declared_types.get(&col_name))
            else {
                continue;
            };
            let rendered = platform.column_declaration("", column);
            let rendered = rendered
                .strip_prefix(&platform.quote_identifier(""))
                .unwrap_or(&rendered);
            if constraints(&inline_pk, &raw, declared)
                != constraints(&inline_pk, rendered, &platform.native_type(column))
            {
                column.definition = Some(raw);
            }
        }

        for row in conn
            .query(&format!("PRAGMA index_list({quoted})"), &[])
            .await?
        {
            let idx_name = text(&row, "name")?;
            if text(&row, "origin")? == "pk" || idx_name.starts_with("sqlite_autoindex_") {
                continue;
            }

            let mut cols: Vec<(i64, String)> = Vec::new();
            for info in conn
                .query(
                    &format!("PRAGMA index_info({})", platform.quote_identifier(&idx_name)),
                    &[],
                )
                .await?
            {
                cols.push((int(&info, "seqno")?, text(&info, "name")?));
            }
            cols.sort();

            let mut index = IndexDef::new(cols.into_iter().map(|(_, c)| c).collect());
            index.unique = int(&row, "unique")? != 0;
            table.indexes.insert(idx_name, index);
        }

        let names = constraint_names(create_sql)?;
        let mut fks: Vec<(i64, ForeignKeyDef)> = Vec::new();
        for row in conn
            .query(&format!("PRAGMA foreign_key_list({quoted})"), &[])
            .await?
        {
            let id = int(&row, "id")?;
            let from = text(&row, "from")?;
            let to = text(&row, "to")?;
            match fks.iter_mut().find(|(fk_id, _)| *fk_id == id) {
                Some((_, fk)) => {
                    fk.columns.push(from);
                    fk.foreign_columns.push(to);
                }
                None => fks.push((
                    id,
                    ForeignKeyDef {
                        columns: vec![from],
                        foreign_table: text(&row, "table")?,
                        foreign_columns: vec![to],
                        on_delete: ForeignKeyAction::from_sql(&text(&row, "on_delete")?)
                            .unwrap_or(ForeignKeyAction::NoAction),
                        on_update: ForeignKeyAction::from_sql(&text(&row, "on_update")?)
                            .unwrap_or(ForeignKeyAction::NoAction),
                    },
                )),
            }
        }

        for (_, fk) in fks {
            let fk_name = names
                .iter()
                .find(|(cols, _)| {
                    cols.len() == fk.columns.len()
                        && cols.iter().zip(&fk.columns).all(|(a, b)| a.eq_ignore_ascii_case(b))
                })
                .map_or_else(
                    || generated_name("fk", name, &fk.columns),
                    |(_, n)| n.clone(),
                );
            table.foreign_keys.insert(fk_name, fk);
        }

        Ok(table)
    }
}

#[async_trait]
impl Introspector for SqliteIntrospector {
    async fn snapshot(&self, conn: &mut dyn Connection) -> Result<SchemaSnapshot> {
        let platform = SqlitePlatform::new();
        let mut schema = SchemaSnapshot::new();

        let tables = conn
            .query(
                "SELECT name, sql FROM sqlite_master WHERE type = 'table' \
                 AND name NOT LIKE 'sqlite_%' ORDER BY name",
                &[],
            )
            .await?;
        for row in tables {
            let name = text(&row, "name")?;
            let sql = row.get("sql").and_then(Value::as_str).unwrap_or_default().to_string();
            let table = self.table(conn, &platform, &name, &sql).await?;
            schema.tables.insert(name, table);
        }

        for view in self.list_views(conn).await? {
            schema.views.insert(view.name.clone(), view);
        }

        Ok(schema)
    }

    async fn list_views(&self, conn: &mut dyn Connection) -> Result<Vec<ViewDef>> {
        let body = Regex::new(r"(?is)^\s*CREATE\s+(?:TEMP\w*\s+)?VIEW\s+.+?\s+AS\s+(.*)$")
            .map_err(|e| ConvergeError::execution(e.to_string()))?;

        let rows = conn
            .query(
                "SELECT name, sql FROM sqlite_master WHERE type = 'view' ORDER BY name",
                &[],
            )
            .await?;
        rows.iter()
            .map(|row| {
                let sql = row.get("sql").and_then(Value::as_str).unwrap_or_default();
                let select = body
                    .captures(sql)
                    .and_then(|c| c.get(1))
                    .map_or(sql, |m| m.as_str());
                Ok(ViewDef {
                    name: text(row, "name")?,
                    sql: select.trim().to_string(),
                })
            })
            .collect()
    }
}

fn text(row: &Row, column: &str) -> Result<String> {
    match row.get(column) {
        Some(Value::Text(s)) => Ok(s.clone()),
        Some(Value::Int(i)) => Ok(i.to_string()),
        Some(Value::Null) => Ok(String::new()),
        _ => Err(ConvergeError::execution(format!(
            "Missing column \"{column}\" in catalog row"
        ))),
    }
}

fn int(row: &Row, column: &str) -> Result<i64> {
    row.get(column).and_then(Value::as_i64).ok_or_else(|| {
        ConvergeError::execution(format!("Missing integer column \"{column}\" in catalog row"))
    })
}

/// Extracts `CONSTRAINT name FOREIGN KEY (cols)` pairs from a CREATE TABLE
/// statement.
fn constraint_names(create_sql: &str) -> Result<Vec<(Vec<String>, String)>> {
    let re = Regex::new(
        r#"(?i)CONSTRAINT\s+["`\[]?([^"`\]\s]+)["`\]]?\s+FOREIGN\s+KEY\s*\(([^)]*)\)"#,
    )
    .map_err(|e| ConvergeError::execution(e.to_string()))?;

    Ok(re
        .captures_iter(create_sql)
        .map(|c| {
            let cols = c[2]
                .split(',')
                .map(|s| s.trim().trim_matches(|ch| ch == '"' || ch == '`').to_string())
                .collect();
            (cols, c[1].to_string())
        })
        .collect())
}

/// Splits the column list of a CREATE TABLE statement into
/// `(column, declaration)` pairs. Table constraints are skipped.
fn column_declarations(create_sql: &str) -> Vec<(String, String)> {
    let Some(start) = create_sql.find('(') else {
        return Vec::new();
    };

    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = create_sql[start + 1..].chars().peekable();
    while let Some(ch) = chars.next() {
        if let Some(close) = quote {
            current.push(ch);
            if ch == close {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                quote = Some(']');
                current.push(ch);
            }
            '-' if chars.peek() == Some(&'-') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        break;
                    }
                }
                current.push(' ');
            }
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' if depth == 0 => {
                items.push(std::mem::take(&mut current));
                break;
            }
            ')' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => items.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }

    items
        .iter()
        .filter_map(|item| split_column(item.trim()))
        .collect()
}

fn split_column(item: &str) -> Option<(String, String)> {
    let (name, rest) = match item.chars().next()? {
        open @ ('"' | '`' | '[') => {
            let close = if open == '[' { ']' } else { open };
            let end = item[1..].find(close)? + 1;
            (item[1..end].to_string(), &item[end + 1..])
        }
        _ => {
            let end = item.find(char::is_whitespace).unwrap_or(item.len());
            let name = &item[..end];
            if matches!(
                name.to_ascii_uppercase().as_str(),
                "CONSTRAINT" | "PRIMARY" | "UNIQUE" | "CHECK" | "FOREIGN"
            ) {
                return None;
            }
            (name.to_string(), &item[end..])
        }
    };
    Some((name, rest.trim().to_string()))
}

/// Returns the normalized clauses following the type of a column
/// declaration, without the inline primary key clause.
fn constraints(inline_pk: &Regex, declaration: &str, declared_type: &str) -> String {
    let normalize = |sql: &str| {
        sql.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase()
            .replace("( ", "(")
            .replace(" )", ")")
            .replace(" ,", ",")
    };
    let declaration = normalize(&inline_pk.replace_all(declaration, " "));
    let declared_type = normalize(declared_type);
    declaration
        .strip_prefix(declared_type.as_str())
        .unwrap_or(&declaration)
        .trim()
        .to_string()
}

/// Maps a declared column type back to a column definition.
fn parse_declared_type(declared: &str) -> ColumnDef {
    let upper = declared.trim().to_ascii_uppercase();
    let (base, args) = match upper.find('(') {
        Some(pos) => (
            upper[..pos].trim().to_string(),
            upper[pos + 1..]
                .trim_end_matches(')')
                .split(',')
                .filter_map(|a| a.trim().parse::<u32>().ok())
                .collect::<Vec<_>>(),
        ),
        None => (upper.clone(), Vec::new()),
    };
    let first = args.first().copied();

    let mut column = ColumnDef::new(ColumnType::Custom(declared.trim().to_string()));
    match base.as_str() {
        "BIGINT" => column.column_type = ColumnType::BigInt,
        "INTEGER" | "INT" => column.column_type = ColumnType::Integer,
        "SMALLINT" => column.column_type = ColumnType::SmallInt,
        "BOOLEAN" => column.column_type = ColumnType::Boolean,
        "VARCHAR" | "CHAR" => {
            column.column_type = ColumnType::String;
            column.length = first;
            column.fixed = base == "CHAR";
        }
        "TEXT" => column.column_type = ColumnType::Text,
        "VARBINARY" | "BINARY" => {
            column.column_type = ColumnType::Binary;
            column.length = first;
            column.fixed = base == "BINARY";
        }
        "BLOB" => column.column_type = ColumnType::Blob,
        "DATE" => column.column_type = ColumnType::Date,
        "DATETIME" => column.column_type = ColumnType::DateTime,
        "TIME" => column.column_type = ColumnType::Time,
        "DOUBLE PRECISION" | "DOUBLE" | "REAL" | "FLOAT" => column.column_type = ColumnType::Float,
        "NUMERIC" | "DECIMAL" => {
            column.column_type = ColumnType::Decimal;
            column.precision = first;
            column.scale = args.get(1).copied();
        }
        "UUID" => column.column_type = ColumnType::Guid,
        "JSON" => column.column_type = ColumnType::Json,
        _ => {}
    }
    column
}
