//! The live schema model of one database.
//!
//! A [`SchemaModel`] keeps two snapshots: the one last known to be applied
//! to the database and the desired one edited through the builders. Every
//! operation that touches the database first converges the desired schema,
//! so statements always run against the structure the caller declared
//! before them.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::builder::{matches_dialect, SequenceBuilder, TableBuilder};
use crate::connection::{Connection, ConnectionFactory, DatabaseConfig, Introspector};
use crate::error::{ConvergeError, Result};
use crate::naming::{IndexKind, NamingStrategy};
use crate::platform::Platform;
use crate::schema::SchemaSnapshot;
use crate::value::{Row, Value};

/// Schema and data access for one named database connection.
pub struct SchemaModel {
    name: String,
    config: DatabaseConfig,
    factory: Arc<dyn ConnectionFactory>,
    conn: Box<dyn Connection>,
    platform: Arc<dyn Platform>,
    introspector: Arc<dyn Introspector>,
    naming: Arc<dyn NamingStrategy>,
    applied: SchemaSnapshot,
    desired: SchemaSnapshot,
    in_transaction: bool,
}

impl std::fmt::Debug for SchemaModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaModel")
            .field("name", &self.name)
            .field("dialect", &self.platform.dialect_name())
            .field("naming", &self.naming)
            .finish_non_exhaustive()
    }
}

impl SchemaModel {
    /// Opens a connection and reads the current schema.
    pub async fn connect(
        name: impl Into<String>,
        config: DatabaseConfig,
        factory: Arc<dyn ConnectionFactory>,
        naming: Arc<dyn NamingStrategy>,
    ) -> Result<Self> {
        let conn = factory.connect(&config).await?;
        Self::from_connection(name, config, factory, conn, naming).await
    }

    /// Wraps an open connection and reads the current schema.
    pub async fn from_connection(
        name: impl Into<String>,
        config: DatabaseConfig,
        factory: Arc<dyn ConnectionFactory>,
        mut conn: Box<dyn Connection>,
        naming: Arc<dyn NamingStrategy>,
    ) -> Result<Self> {
        let platform = conn.platform();
        let introspector = conn.introspector();
        let applied = introspector.snapshot(&mut *conn).await?;

        let name = name.into();
        debug!(
            database = %name,
            dialect = platform.dialect_name(),
            tables = applied.tables.len(),
            "Schema loaded"
        );

        Ok(Self {
            name,
            config,
            factory,
            conn,
            platform,
            introspector,
            naming,
            desired: applied.clone(),
            applied,
            in_transaction: false,
        })
    }

    /// Returns the configured name of this database.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the connection settings.
    #[must_use]
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Returns the dialect name.
    #[must_use]
    pub fn dialect(&self) -> &'static str {
        self.platform.dialect_name()
    }

    /// Returns the SQL platform.
    #[must_use]
    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    /// Returns the schema last applied to the database.
    #[must_use]
    pub fn applied(&self) -> &SchemaSnapshot {
        &self.applied
    }

    /// Returns the desired schema.
    #[must_use]
    pub fn desired(&self) -> &SchemaSnapshot {
        &self.desired
    }

    /// Returns true if the dialect is one of `dialects`.
    #[must_use]
    pub fn is_dialect(&self, dialects: &[&str]) -> bool {
        matches_dialect(self.dialect(), dialects)
    }

    /// Executes raw statements only if the dialect is one of `dialects`.
    /// Returns true if they were executed.
    pub async fn for_dialects(&mut self, dialects: &[&str], statements: &[&str]) -> Result<bool> {
        if !self.is_dialect(dialects) {
            return Ok(false);
        }
        for sql in statements {
            self.exec(sql, &[]).await?;
        }
        Ok(true)
    }

    /// Quotes a string literal.
    #[must_use]
    pub fn q(&self, value: &str) -> String {
        self.platform.quote_literal(value)
    }

    /// Quotes an identifier.
    #[must_use]
    pub fn qi(&self, name: &str) -> String {
        self.platform.quote_identifier(name)
    }

    /// Returns a builder for the table, registering it if it is new.
    pub fn table(&mut self, name: &str) -> TableBuilder<'_> {
        TableBuilder::new(
            &mut self.desired,
            name,
            self.platform.dialect_name(),
            self.naming.as_ref(),
        )
    }

    /// Edits the table in a closure.
    pub fn table_with(&mut self, name: &str, f: impl FnOnce(&mut TableBuilder<'_>)) -> &mut Self {
        f(&mut self.table(name));
        self
    }

    /// Returns a builder for the sequence, registering it if it is new.
    pub fn sequence(&mut self, name: &str) -> SequenceBuilder<'_> {
        SequenceBuilder::new(&mut self.desired, name)
    }

    /// Edits the sequence in a closure.
    pub fn sequence_with(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut SequenceBuilder<'_>),
    ) -> &mut Self {
        f(&mut self.sequence(name));
        self
    }

    /// Returns the statements [`converge`](Self::converge) would execute.
    #[must_use]
    pub fn pending_statements(&self) -> Vec<String> {
        self.platform.diff_to_statements(&self.applied, &self.desired)
    }

    /// Applies all differences between the applied and the desired schema
    /// and returns the number of executed statements.
    pub async fn converge(&mut self) -> Result<usize> {
        if self.in_transaction {
            let tables = self
                .platform
                .non_transactional_tables(&self.applied, &self.desired);
            if !tables.is_empty() {
                return Err(ConvergeError::execution(format!(
                    "Cannot rebuild referenced table(s) {} inside a transaction",
                    tables.join(", ")
                )));
            }
        }

        let statements = self.pending_statements();
        for sql in &statements {
            self.run_ddl(sql).await?;
        }

        if !statements.is_empty() {
            info!(
                database = %self.name,
                statements = statements.len(),
                "Schema converged"
            );
        }
        self.applied = self.desired.clone();
        Ok(statements.len())
    }

    /// Reads the schema from the database again, discarding pending changes.
    pub async fn reload(&mut self) -> Result<()> {
        self.applied = self.introspector.snapshot(&mut *self.conn).await?;
        self.desired = self.applied.clone();
        Ok(())
    }

    async fn run_ddl(&mut self, sql: &str) -> Result<()> {
        debug!(database = %self.name, sql = %sql, "Executing SQL");
        self.conn.execute_batch(sql).await
    }

    /// Creates a view if it does not exist and the dialect is listed
    /// (all dialects if `dialects` is empty). Returns true if it was created.
    pub async fn view(&mut self, name: &str, sql: &str, dialects: &[&str]) -> Result<bool> {
        self.converge().await?;
        if !self.is_dialect(dialects) || self.has_view(name).await? {
            return Ok(false);
        }

        let stmt = self.platform.create_view_sql(name, sql);
        self.run_ddl(&stmt).await?;
        self.reload().await?;
        Ok(true)
    }

    /// Drops views if they exist.
    pub async fn drop_view(&mut self, names: &[&str]) -> Result<()> {
        self.converge().await?;
        let views = self.introspector.list_views(&mut *self.conn).await?;

        let mut dropped = false;
        for name in names {
            if views.iter().any(|v| v.name == *name) {
                let sql = self.platform.drop_view_sql(name);
                self.run_ddl(&sql).await?;
                dropped = true;
            }
        }

        if dropped {
            self.reload().await?;
        }
        Ok(())
    }

    /// Drops tables if they exist.
    pub async fn drop_table(&mut self, names: &[&str]) -> Result<()> {
        self.converge().await?;

        let mut dropped = false;
        for name in names {
            if self.applied.has_table(name) {
                let sql = self.platform.drop_table_sql(name);
                self.run_ddl(&sql).await?;
                dropped = true;
            }
        }

        if dropped {
            self.reload().await?;
        }
        Ok(())
    }

    /// Drops columns of a table if they exist.
    pub async fn drop_column(&mut self, table: &str, columns: &[&str]) -> Result<usize> {
        if self.desired.has_table(table) {
            self.table(table).drop_column(columns);
        }
        self.converge().await
    }

    /// Drops indexes of a table if they exist.
    pub async fn drop_index(&mut self, table: &str, indexes: &[&str]) -> Result<usize> {
        if self.desired.has_table(table) {
            self.table(table).drop_index(indexes);
        }
        self.converge().await
    }

    /// Drops foreign keys of a table if they exist.
    pub async fn drop_foreign(&mut self, table: &str, names: &[&str]) -> Result<usize> {
        if self.desired.has_table(table) {
            self.table(table).drop_foreign(names);
        }
        self.converge().await
    }

    /// Drops sequences if they exist.
    pub async fn drop_sequence(&mut self, names: &[&str]) -> Result<usize> {
        for name in names {
            self.desired.sequences.remove(*name);
        }
        self.converge().await
    }

    /// Renames tables given as `(from, to)` pairs. Missing tables are skipped.
    pub async fn rename_table(&mut self, pairs: &[(&str, &str)]) -> Result<()> {
        for (from, to) in pairs {
            if to.is_empty() {
                return Err(ConvergeError::config(format!(
                    "Renaming table \"{from}\" requires a non-empty new name"
                )));
            }
        }
        self.converge().await?;

        let mut renamed = false;
        for (from, to) in pairs {
            if self.applied.has_table(from) {
                let sql = self.platform.rename_table_sql(from, to);
                self.run_ddl(&sql).await?;
                renamed = true;
            }
        }

        if renamed {
            self.reload().await?;
        }
        Ok(())
    }

    /// Renames columns of a table given as `(from, to)` pairs. Missing
    /// columns are skipped.
    pub async fn rename_column(&mut self, table: &str, pairs: &[(&str, &str)]) -> Result<()> {
        for (from, to) in pairs {
            if to.is_empty() {
                return Err(ConvergeError::config(format!(
                    "Renaming column \"{from}\" in table \"{table}\" requires a non-empty new name"
                )));
            }
        }
        self.converge().await?;

        let mut statements = Vec::new();
        if let Some(def) = self.applied.table(table) {
            for (from, to) in pairs {
                if let Some(column) = def.column(from) {
                    statements.push(self.platform.rename_column_sql(table, from, to, column));
                }
            }
        }

        for sql in &statements {
            self.run_ddl(sql).await?;
        }
        if !statements.is_empty() {
            self.reload().await?;
        }
        Ok(())
    }

    /// Renames indexes of a table given as `(from, to)` pairs. An empty
    /// target name is generated from the index kind and columns.
    pub async fn rename_index(&mut self, table: &str, pairs: &[(&str, &str)]) -> Result<()> {
        self.converge().await?;

        let mut statements = Vec::new();
        if let Some(def) = self.applied.table(table) {
            for (from, to) in pairs {
                let Some(index) = def.indexes.get(*from) else {
                    continue;
                };
                let to = if to.is_empty() {
                    let kind = if index.primary {
                        IndexKind::Primary
                    } else if index.unique {
                        IndexKind::Unique
                    } else {
                        IndexKind::Index
                    };
                    self.naming.name_for(table, &index.columns, kind)
                } else {
                    (*to).to_string()
                };
                if to != *from {
                    statements.extend(self.platform.rename_index_sql(table, from, &to, index));
                }
            }
        }

        for sql in &statements {
            self.run_ddl(sql).await?;
        }
        if !statements.is_empty() {
            self.reload().await?;
        }
        Ok(())
    }

    /// Returns true if all tables exist in the desired schema.
    #[must_use]
    pub fn has_table(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.desired.has_table(n))
    }

    /// Returns true if all columns exist in the table.
    #[must_use]
    pub fn has_column(&self, table: &str, names: &[&str]) -> bool {
        self.desired
            .table(table)
            .is_some_and(|t| t.has_columns(names))
    }

    /// Returns true if all indexes exist in the table.
    #[must_use]
    pub fn has_index(&self, table: &str, names: &[&str]) -> bool {
        self.desired
            .table(table)
            .is_some_and(|t| names.iter().all(|n| t.indexes.contains_key(*n)))
    }

    /// Returns true if all foreign keys exist in the table.
    #[must_use]
    pub fn has_foreign(&self, table: &str, names: &[&str]) -> bool {
        self.desired
            .table(table)
            .is_some_and(|t| names.iter().all(|n| t.foreign_keys.contains_key(*n)))
    }

    /// Returns true if all sequences exist.
    #[must_use]
    pub fn has_sequence(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.desired.has_sequence(n))
    }

    /// Returns true if the view exists in the database.
    pub async fn has_view(&mut self, name: &str) -> Result<bool> {
        let views = self.introspector.list_views(&mut *self.conn).await?;
        Ok(views.iter().any(|v| v.name == name))
    }

    /// Executes a statement after converging and returns the affected rows.
    pub async fn exec(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.converge().await?;
        debug!(database = %self.name, sql = %sql, "Executing SQL");
        self.conn.execute(sql, params).await
    }

    /// Executes one or more statements without parameters after converging.
    pub async fn exec_batch(&mut self, sql: &str) -> Result<()> {
        self.converge().await?;
        self.run_ddl(sql).await
    }

    /// Runs a query after converging.
    pub async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.converge().await?;
        debug!(database = %self.name, sql = %sql, "Running query");
        self.conn.query(sql, params).await
    }

    /// Renders `col = ?` conditions joined by AND, binding into `params`.
    fn where_clause(&self, conditions: &[(&str, Value)], params: &mut Vec<Value>) -> String {
        if conditions.is_empty() {
            return String::new();
        }

        let parts: Vec<String> = conditions
            .iter()
            .map(|(col, value)| {
                if value.is_null() {
                    format!("{} IS NULL", self.qi(col))
                } else {
                    params.push(value.clone());
                    format!("{} = {}", self.qi(col), self.platform.placeholder(params.len()))
                }
            })
            .collect();
        format!(" WHERE {}", parts.join(" AND "))
    }

    /// Inserts a row.
    pub async fn insert(&mut self, table: &str, data: &[(&str, Value)]) -> Result<u64> {
        let sql = if data.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.qi(table))
        } else {
            let columns: Vec<String> = data.iter().map(|(c, _)| self.qi(c)).collect();
            let placeholders: Vec<String> = (1..=data.len())
                .map(|i| self.platform.placeholder(i))
                .collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.qi(table),
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        let params: Vec<Value> = data.iter().map(|(_, v)| v.clone()).collect();
        self.exec(&sql, &params).await
    }

    /// Updates the rows matching all conditions, or every row without
    /// conditions.
    pub async fn update(
        &mut self,
        table: &str,
        data: &[(&str, Value)],
        conditions: &[(&str, Value)],
    ) -> Result<u64> {
        if data.is_empty() {
            return Ok(0);
        }

        let mut params: Vec<Value> = Vec::with_capacity(data.len() + conditions.len());
        let mut sets = Vec::with_capacity(data.len());
        for (col, value) in data {
            params.push(value.clone());
            sets.push(format!(
                "{} = {}",
                self.qi(col),
                self.platform.placeholder(params.len())
            ));
        }
        let filter = self.where_clause(conditions, &mut params);
        let sql = format!("UPDATE {} SET {}{filter}", self.qi(table), sets.join(", "));
        self.exec(&sql, &params).await
    }

    /// Deletes the rows matching all conditions, or every row without
    /// conditions.
    pub async fn delete(&mut self, table: &str, conditions: &[(&str, Value)]) -> Result<u64> {
        let mut params = Vec::with_capacity(conditions.len());
        let filter = self.where_clause(conditions, &mut params);
        let sql = format!("DELETE FROM {}{filter}", self.qi(table));
        self.exec(&sql, &params).await
    }

    /// Selects the rows matching all conditions.
    pub async fn select(&mut self, table: &str, conditions: &[(&str, Value)]) -> Result<Vec<Row>> {
        let mut params = Vec::with_capacity(conditions.len());
        let filter = self.where_clause(conditions, &mut params);
        let sql = format!("SELECT * FROM {}{filter}", self.qi(table));
        self.query(&sql, &params).await
    }

    /// Returns the last generated ID, optionally of a named sequence.
    pub async fn last_id(&mut self, sequence: Option<&str>) -> Result<i64> {
        self.conn.last_insert_id(sequence).await
    }

    /// Runs `f` inside a transaction, committing on success and rolling
    /// back on error.
    ///
    /// Pending changes are converged before the transaction starts. Schema
    /// changes declared inside `f` that would rebuild a table referenced by
    /// foreign keys fail with [`ConvergeError::Execution`] and roll back.
    pub async fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        T: Send,
        F: for<'m> FnOnce(&'m mut Self) -> BoxFuture<'m, Result<T>> + Send,
    {
        self.converge().await?;
        self.conn.begin().await?;

        self.in_transaction = true;
        let result = f(self).await;
        self.in_transaction = false;

        match result {
            Ok(value) => {
                self.conn.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.rollback().await {
                    warn!(database = %self.name, error = %rollback, "Rollback failed");
                }
                // the structure may have changed inside the transaction
                self.reload().await?;
                Err(e)
            }
        }
    }

    /// Converges and opens a second model on a new connection to the same
    /// database, sharing the desired schema.
    ///
    /// Every `sqlite::memory:` connection opens its own empty database, so
    /// the new model starts with an empty applied snapshot and its pending
    /// statements recreate the whole desired schema there. Use a file
    /// database when both connections must see the same tables.
    pub async fn with_new_connection(&mut self) -> Result<Self> {
        self.converge().await?;
        let mut model = Self::connect(
            self.name.clone(),
            self.config.clone(),
            Arc::clone(&self.factory),
            Arc::clone(&self.naming),
        )
        .await?;
        model.desired = self.desired.clone();
        Ok(model)
    }

    /// Converges pending changes and closes the connection.
    pub async fn close(mut self) -> Result<()> {
        self.converge().await?;
        self.conn.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SqliteConnectionFactory;
    use crate::naming::DefaultNaming;

    async fn memory() -> SchemaModel {
        SchemaModel::connect(
            "db",
            DatabaseConfig::sqlite("sqlite::memory:"),
            Arc::new(SqliteConnectionFactory),
            Arc::new(DefaultNaming),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_converge_creates_and_is_idempotent() {
        let mut db = memory().await;
        db.table_with("test", |t| {
            t.id(None);
            t.string("label", 100);
        });

        assert_eq!(db.converge().await.unwrap(), 1);
        assert!(db.pending_statements().is_empty());

        db.reload().await.unwrap();
        db.table_with("test", |t| {
            t.id(None);
            t.string("label", 100);
        });
        assert!(db.pending_statements().is_empty());
    }

    #[tokio::test]
    async fn test_crud_helpers() {
        let mut db = memory().await;
        db.table_with("test", |t| {
            t.id(None);
            t.string("label", 100);
            t.integer("pos").null(true);
        });

        db.insert("test", &[("label", "a".into()), ("pos", Value::Int(1))])
            .await
            .unwrap();
        db.insert("test", &[("label", "b".into())]).await.unwrap();
        assert_eq!(db.last_id(None).await.unwrap(), 2);

        let rows = db.select("test", &[("label", "a".into())]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("pos"), Some(&Value::Int(1)));

        let rows = db.select("test", &[("pos", Value::Null)]).await.unwrap();
        assert_eq!(rows.len(), 1);

        assert_eq!(db.update("test", &[("pos", Value::Int(5))], &[]).await.unwrap(), 2);
        assert_eq!(db.delete("test", &[("label", "b".into())]).await.unwrap(), 1);
        assert_eq!(db.select("test", &[]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_drop_nonexistent_is_noop() {
        let mut db = memory().await;
        db.drop_table(&["missing"]).await.unwrap();
        db.drop_view(&["missing"]).await.unwrap();
        assert_eq!(db.drop_column("missing", &["a"]).await.unwrap(), 0);
        assert_eq!(db.drop_index("missing", &["a"]).await.unwrap(), 0);
        assert_eq!(db.drop_sequence(&["missing"]).await.unwrap(), 0);
        assert!(!db.has_table(&["missing"]));
    }

    #[tokio::test]
    async fn test_rename_requires_target() {
        let mut db = memory().await;
        let err = db.rename_table(&[("a", "")]).await.unwrap_err();
        assert!(matches!(err, ConvergeError::Configuration(_)));
        let err = db.rename_column("t", &[("a", "")]).await.unwrap_err();
        assert!(matches!(err, ConvergeError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_rename_table_and_column() {
        let mut db = memory().await;
        db.table_with("old", |t| {
            t.id(None);
            t.string("label", 50);
        });
        db.rename_table(&[("old", "new"), ("missing", "other")])
            .await
            .unwrap();
        assert!(db.has_table(&["new"]));
        assert!(!db.has_table(&["old", "other"]));

        db.rename_column("new", &[("label", "title")]).await.unwrap();
        assert!(db.has_column("new", &["id", "title"]));
        assert!(!db.has_column("new", &["label"]));
    }

    #[tokio::test]
    async fn test_view_created_once() {
        let mut db = memory().await;
        db.table_with("test", |t| {
            t.id(None);
        });

        assert!(db.view("testview", "SELECT * FROM \"test\"", &[]).await.unwrap());
        assert!(!db.view("testview", "SELECT id FROM \"test\"", &[]).await.unwrap());
        assert!(!db.view("other", "SELECT 1", &["mysql"]).await.unwrap());
        assert!(db.has_view("testview").await.unwrap());

        db.drop_view(&["testview"]).await.unwrap();
        assert!(!db.has_view("testview").await.unwrap());
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_error() {
        let mut db = memory().await;
        db.table_with("test", |t| {
            t.id(None);
            t.string("label", 50);
        });

        let result: Result<()> = db
            .transaction(|db| {
                Box::pin(async move {
                    db.insert("test", &[("label", "a".into())]).await?;
                    Err(ConvergeError::execution("abort"))
                })
            })
            .await;
        assert!(result.is_err());
        assert!(db.select("test", &[]).await.unwrap().is_empty());

        let id = db
            .transaction(|db| {
                Box::pin(async move {
                    db.insert("test", &[("label", "b".into())]).await?;
                    db.last_id(None).await
                })
            })
            .await
            .unwrap();
        assert!(id > 0);
        assert_eq!(db.select("test", &[]).await.unwrap().len(), 1);
    }

    async fn parent_with_child(db: &mut SchemaModel) {
        db.table_with("parent", |t| {
            t.id(None);
            t.string("code", 20);
        });
        db.table("child").id(None);
        db.table("child")
            .foreign(&["parent_id"], "parent", &[], None)
            .unwrap();
        db.insert("parent", &[("code", "a".into())]).await.unwrap();
        db.insert("child", &[("parent_id", Value::Int(1))])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rebuild_of_referenced_table_refused_in_transaction() {
        let mut db = memory().await;
        parent_with_child(&mut db).await;

        let result: Result<()> = db
            .transaction(|db| {
                Box::pin(async move {
                    db.table("parent").string("code", 50);
                    db.select("parent", &[]).await?;
                    Ok(())
                })
            })
            .await;
        assert!(matches!(result, Err(ConvergeError::Execution(_))));

        assert_eq!(db.select("child", &[]).await.unwrap().len(), 1);
        let parent = db.applied().table("parent").unwrap();
        assert_eq!(parent.columns["code"].length, Some(20));
        assert!(db.pending_statements().is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_of_referenced_table_keeps_children() {
        let mut db = memory().await;
        parent_with_child(&mut db).await;

        db.table("parent").string("code", 50);
        assert!(db.converge().await.unwrap() > 0);

        assert_eq!(db.select("child", &[]).await.unwrap().len(), 1);
        let violations = db.query("PRAGMA foreign_key_check", &[]).await.unwrap();
        assert!(violations.is_empty());
    }

    #[tokio::test]
    async fn test_additive_change_allowed_in_transaction() {
        let mut db = memory().await;
        parent_with_child(&mut db).await;

        db.transaction(|db| {
            Box::pin(async move {
                db.table("parent").text("note").null(true);
                db.update("parent", &[("note", "x".into())], &[]).await?;
                Ok(())
            })
        })
        .await
        .unwrap();

        let rows = db.select("parent", &[]).await.unwrap();
        assert_eq!(rows[0].get("note"), Some(&Value::Text("x".to_string())));
        assert_eq!(db.select("child", &[]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_table_without_columns_is_not_created() {
        let mut db = memory().await;
        db.table("ghost").drop_column(&["x"]);
        assert!(db.pending_statements().is_empty());
        assert_eq!(db.converge().await.unwrap(), 0);

        db.table("ghost").id(None);
        assert_eq!(db.converge().await.unwrap(), 1);
        db.reload().await.unwrap();
        assert!(db.applied().has_table("ghost"));
    }

    #[tokio::test]
    async fn test_new_memory_connection_is_a_separate_database() {
        let mut db = memory().await;
        db.table_with("test", |t| {
            t.id(None);
        });

        let other = db.with_new_connection().await.unwrap();
        assert!(db.applied().has_table("test"));
        assert!(!other.applied().has_table("test"));
        assert!(other.has_table(&["test"]));
        assert_eq!(other.pending_statements().len(), 1);
    }

    #[tokio::test]
    async fn test_for_dialects() {
        let mut db = memory().await;
        assert!(db.is_dialect(&["sqlite", "mysql"]));
        assert!(!db.is_dialect(&["postgresql"]));

        let ran = db
            .for_dialects(&["postgresql"], &["CREATE TABLE \"pg_only\" (a INTEGER)"])
            .await
            .unwrap();
        assert!(!ran);
        let ran = db
            .for_dialects(&["sqlite"], &["CREATE TABLE \"lite_only\" (a INTEGER)"])
            .await
            .unwrap();
        assert!(ran);

        let rows = db
            .query("SELECT name FROM sqlite_master WHERE type = 'table'", &[])
            .await
            .unwrap();
        let names: Vec<_> = rows.iter().filter_map(|r| r.get("name")?.as_str()).collect();
        assert_eq!(names, vec!["lite_only"]);
        assert_eq!(db.qi("a\"b"), "\"a\"\"b\"");
        assert_eq!(db.q("it's"), "'it''s'");
    }
}
