//! Migration tasks and their discovery.
//!
//! A task is a named unit of schema work with ordering constraints. Tasks
//! are either registered programmatically or created from the files found
//! in the task directories by a [`TaskFactory`]. The bundled
//! [`SqlTaskFactory`] turns `*.sql` files into tasks whose header comments
//! declare their ordering:
//!
//! ```sql
//! -- @after: create_users
//! -- @database: logs
//! -- @dialect: sqlite, mysql
//! CREATE INDEX "idx_users_name" ON "users" ("name");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::error::{ConvergeError, Result};
use crate::scheduler::Context;

/// A unit of schema work.
#[async_trait]
pub trait Task: Send + Sync {
    /// Unique task name.
    fn name(&self) -> &str;

    /// Names of the tasks that must run after this one.
    fn before(&self) -> Vec<String> {
        Vec::new()
    }

    /// Names of the tasks that must run before this one.
    fn after(&self) -> Vec<String> {
        Vec::new()
    }

    /// Applies the task.
    async fn apply(&self, ctx: &mut Context) -> Result<()>;
}

impl fmt::Debug for dyn Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("name", &self.name()).finish()
    }
}

type TaskFn = dyn for<'c> Fn(&'c mut Context) -> BoxFuture<'c, Result<()>> + Send + Sync;

/// A task defined by a closure.
///
/// ```ignore
/// let task = FnTask::new("create_users", |ctx| {
///     Box::pin(async move {
///         ctx.db("").await?.table_with("users", |t| {
///             t.id(None);
///             t.string("name", 100);
///         });
///         Ok(())
///     })
/// })
/// .runs_after(["create_groups"]);
/// ```
pub struct FnTask {
    name: String,
    before: Vec<String>,
    after: Vec<String>,
    apply: Box<TaskFn>,
}

impl FnTask {
    /// Creates a task running `apply`.
    pub fn new<F>(name: impl Into<String>, apply: F) -> Self
    where
        F: for<'c> Fn(&'c mut Context) -> BoxFuture<'c, Result<()>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            before: Vec::new(),
            after: Vec::new(),
            apply: Box::new(apply),
        }
    }

    /// Declares tasks that must run after this one.
    #[must_use]
    pub fn runs_before<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.before.extend(names.into_iter().map(Into::into));
        self
    }

    /// Declares tasks that must run before this one.
    #[must_use]
    pub fn runs_after<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.after.extend(names.into_iter().map(Into::into));
        self
    }
}

impl fmt::Debug for FnTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask")
            .field("name", &self.name)
            .field("before", &self.before)
            .field("after", &self.after)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Task for FnTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn before(&self) -> Vec<String> {
        self.before.clone()
    }

    fn after(&self) -> Vec<String> {
        self.after.clone()
    }

    async fn apply(&self, ctx: &mut Context) -> Result<()> {
        (self.apply)(ctx).await
    }
}

/// Creates tasks from files in the task directories.
pub trait TaskFactory: Send + Sync + fmt::Debug {
    /// Returns the task defined by the file, or `None` if the file is not a
    /// task.
    fn create(&self, path: &Path) -> Result<Option<Box<dyn Task>>>;
}

/// Creates a [`SqlFileTask`] for every `*.sql` file.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlTaskFactory;

impl TaskFactory for SqlTaskFactory {
    fn create(&self, path: &Path) -> Result<Option<Box<dyn Task>>> {
        if path.extension().and_then(|e| e.to_str()) != Some("sql") {
            return Ok(None);
        }
        Ok(Some(Box::new(SqlFileTask::from_file(path)?)))
    }
}

/// A task running the statements of a SQL file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFileTask {
    name: String,
    path: PathBuf,
    after: Vec<String>,
    before: Vec<String>,
    database: Option<String>,
    dialects: Vec<String>,
    sql: String,
}

impl SqlFileTask {
    /// Reads the task from a file; the task is named after the file stem.
    pub fn from_file(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                ConvergeError::config(format!("Invalid task file name {}", path.display()))
            })?
            .to_string();
        let sql = std::fs::read_to_string(path).map_err(|e| ConvergeError::io(path, e))?;

        let mut task = Self::parse(&name, &sql).map_err(|e| match e {
            ConvergeError::Configuration(msg) => {
                ConvergeError::config(format!("{msg} in {}", path.display()))
            }
            other => other,
        })?;
        task.path = path.to_path_buf();
        Ok(task)
    }

    /// Parses the header directives and statements of a SQL task.
    pub fn parse(name: &str, sql: &str) -> Result<Self> {
        let mut task = Self {
            name: name.to_string(),
            path: PathBuf::new(),
            after: Vec::new(),
            before: Vec::new(),
            database: None,
            dialects: Vec::new(),
            sql: sql.to_string(),
        };

        for line in sql.lines().map(str::trim) {
            if line.is_empty() {
                continue;
            }
            let Some(comment) = line.strip_prefix("--") else {
                break;
            };
            let Some(directive) = comment.trim().strip_prefix('@') else {
                continue;
            };

            let (key, value) = directive.split_once(':').unwrap_or((directive, ""));
            let values: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect();

            match key.trim() {
                "after" => task.after.extend(values),
                "before" => task.before.extend(values),
                "database" => task.database = values.into_iter().next(),
                "dialect" => task.dialects.extend(values),
                other => {
                    return Err(ConvergeError::config(format!(
                        "Unknown task directive \"@{other}\""
                    )))
                }
            }
        }

        Ok(task)
    }

    /// Returns the file the task was read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configured database name, if any.
    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Returns the dialects the task is restricted to.
    #[must_use]
    pub fn dialects(&self) -> &[String] {
        &self.dialects
    }
}

#[async_trait]
impl Task for SqlFileTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn before(&self) -> Vec<String> {
        self.before.clone()
    }

    fn after(&self) -> Vec<String> {
        self.after.clone()
    }

    async fn apply(&self, ctx: &mut Context) -> Result<()> {
        let db = ctx.db(self.database.as_deref().unwrap_or_default()).await?;

        let dialects: Vec<&str> = self.dialects.iter().map(String::as_str).collect();
        if !db.is_dialect(&dialects) {
            info!(task = %self.name, dialect = db.dialect(), "Skipping task for other dialects");
            return Ok(());
        }

        db.exec_batch(&self.sql).await?;
        // raw statements may have changed the structure
        db.reload().await
    }
}

/// Creates the tasks of all files directly inside `paths`, keyed and
/// sorted by name. A later path overrides tasks with the same name.
pub fn discover(
    paths: &[PathBuf],
    factory: &dyn TaskFactory,
) -> Result<BTreeMap<String, Box<dyn Task>>> {
    let mut tasks: BTreeMap<String, Box<dyn Task>> = BTreeMap::new();

    for dir in paths {
        let entries = std::fs::read_dir(dir).map_err(|e| ConvergeError::io(dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| ConvergeError::io(dir, e))?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        for file in files {
            let Some(task) = factory.create(&file)? else {
                continue;
            };
            debug!(task = task.name(), path = %file.display(), "Task discovered");
            if let Some(previous) = tasks.insert(task.name().to_string(), task) {
                warn!(task = previous.name(), path = %file.display(), "Task overridden");
            }
        }
    }

    Ok(tasks)
}
