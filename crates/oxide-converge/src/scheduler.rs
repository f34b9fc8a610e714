//! Dependency ordered task execution.
//!
//! The scheduler collects the tasks of all task directories and the
//! registered ones, then runs each task once, after all tasks it depends
//! on. A task `A` depends on `B` if `A` lists `B` in `after()` or `B` lists
//! `A` in `before()`. Tasks are visited in name order, so the execution
//! order is stable for a given set of tasks. After every task, all open
//! database models are converged.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use crate::connection::{Config, ConnectionFactory};
use crate::driver::SqliteConnectionFactory;
use crate::error::{ConvergeError, Result};
use crate::model::SchemaModel;
use crate::naming::{DefaultNaming, NamingStrategy};
use crate::task::{discover, SqlTaskFactory, Task, TaskFactory};

/// Outcome of a scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Executed tasks in execution order.
    pub executed: Vec<String>,
    /// Dependencies that named no known task.
    pub missing: Vec<String>,
}

/// Shared state handed to every task.
pub struct Context {
    config: Config,
    paths: Vec<PathBuf>,
    factory: Arc<dyn ConnectionFactory>,
    naming: Arc<dyn NamingStrategy>,
    models: IndexMap<String, SchemaModel>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("paths", &self.paths)
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Context {
    fn new(
        config: Config,
        paths: Vec<PathBuf>,
        factory: Arc<dyn ConnectionFactory>,
        naming: Arc<dyn NamingStrategy>,
    ) -> Self {
        Self {
            config,
            paths,
            factory,
            naming,
            models: IndexMap::new(),
        }
    }

    /// Returns the model of the named database, connecting on first use.
    /// Unknown names resolve to the first configured database.
    pub async fn db(&mut self, name: &str) -> Result<&mut SchemaModel> {
        let (resolved, config) = self.config.get(name)?;
        let (resolved, config) = (resolved.to_string(), config.clone());

        if !self.models.contains_key(&resolved) {
            let model = SchemaModel::connect(
                resolved.clone(),
                config,
                Arc::clone(&self.factory),
                Arc::clone(&self.naming),
            )
            .await?;
            self.models.insert(resolved.clone(), model);
        }

        self.models.get_mut(&resolved).ok_or_else(|| {
            ConvergeError::execution(format!("Database \"{resolved}\" is not connected"))
        })
    }

    /// Returns an independent model of the named database on a new
    /// connection. The shared model is converged first.
    pub async fn db_new(&mut self, name: &str) -> Result<SchemaModel> {
        self.db(name).await?.with_new_connection().await
    }

    /// Returns the existing paths `relative` resolves to below each task
    /// directory.
    #[must_use]
    pub fn paths(&self, relative: &str) -> Vec<PathBuf> {
        let relative = relative.trim_matches(|c| c == '/' || c == '\\');
        self.paths
            .iter()
            .map(|p| {
                if relative.is_empty() {
                    p.clone()
                } else {
                    p.join(relative)
                }
            })
            .filter(|p| p.exists())
            .collect()
    }

    /// Converges all open models.
    pub async fn converge_all(&mut self) -> Result<usize> {
        let mut total = 0;
        for model in self.models.values_mut() {
            total += model.converge().await?;
        }
        Ok(total)
    }

    /// Converges and closes all open models.
    pub async fn close(self) -> Result<()> {
        for (_, model) in self.models {
            model.close().await?;
        }
        Ok(())
    }
}

/// Runs tasks in dependency order.
pub struct Scheduler {
    config: Config,
    paths: Vec<PathBuf>,
    tasks: Vec<Box<dyn Task>>,
    factory: Arc<dyn ConnectionFactory>,
    task_factory: Arc<dyn TaskFactory>,
    naming: Arc<dyn NamingStrategy>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("paths", &self.paths)
            .field("tasks", &self.tasks.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("factory", &self.factory)
            .field("task_factory", &self.task_factory)
            .field("naming", &self.naming)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates a scheduler for the configured databases.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            paths: Vec::new(),
            tasks: Vec::new(),
            factory: Arc::new(SqliteConnectionFactory),
            task_factory: Arc::new(SqlTaskFactory),
            naming: Arc::new(DefaultNaming),
        })
    }

    /// Adds a task directory.
    #[must_use]
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Registers a task. It overrides a discovered task of the same name.
    #[must_use]
    pub fn task(mut self, task: impl Task + 'static) -> Self {
        self.tasks.push(Box::new(task));
        self
    }

    /// Sets the connection factory.
    #[must_use]
    pub fn factory(mut self, factory: Arc<dyn ConnectionFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Sets the factory creating tasks from files.
    #[must_use]
    pub fn task_factory(mut self, factory: Arc<dyn TaskFactory>) -> Self {
        self.task_factory = factory;
        self
    }

    /// Sets the naming strategy for indexes and constraints.
    #[must_use]
    pub fn naming(mut self, naming: Arc<dyn NamingStrategy>) -> Self {
        self.naming = naming;
        self
    }

    /// Discovers and runs all tasks.
    pub async fn run(&self) -> Result<RunReport> {
        if self.paths.is_empty() && self.tasks.is_empty() {
            return Err(ConvergeError::config("No path for the tasks passed"));
        }

        let discovered = discover(&self.paths, self.task_factory.as_ref())?;
        let mut tasks: BTreeMap<String, &dyn Task> = discovered
            .iter()
            .map(|(name, task)| (name.clone(), task.as_ref()))
            .collect();
        for task in &self.tasks {
            tasks.insert(task.name().to_string(), task.as_ref());
        }

        let mut dependencies: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, task) in &tasks {
            for before in task.before() {
                dependencies.entry(before).or_default().push(name.clone());
            }
            for after in task.after() {
                dependencies.entry(name.clone()).or_default().push(after);
            }
        }

        let mut plan = Plan {
            dependencies: &dependencies,
            done: HashSet::new(),
            order: Vec::new(),
        };
        for name in tasks.keys() {
            plan.resolve(name, &mut Vec::new())?;
        }
        let order = plan.order;

        info!(tasks = tasks.len(), "Running tasks");
        let started = Instant::now();

        let mut report = RunReport::default();
        let mut ctx = Context::new(
            self.config.clone(),
            self.paths.clone(),
            Arc::clone(&self.factory),
            Arc::clone(&self.naming),
        );

        for name in &order {
            match tasks.get(name) {
                Some(task) => {
                    apply(*task, &mut ctx).await?;
                    report.executed.push(name.clone());
                }
                None => {
                    warn!(task = %name, "Task not found, skipping");
                    report.missing.push(name.clone());
                }
            }
        }
        ctx.close().await?;

        info!(
            executed = report.executed.len(),
            missing = report.missing.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Tasks completed"
        );
        Ok(report)
    }
}

/// Execution order of one run. Resolving the whole graph before any task
/// runs keeps a cycle from leaving a partially applied run behind.
struct Plan<'p> {
    dependencies: &'p BTreeMap<String, Vec<String>>,
    done: HashSet<String>,
    order: Vec<String>,
}

impl Plan<'_> {
    /// Appends the dependencies of `name`, then `name` itself. `stack` holds
    /// the tasks waiting for `name`.
    fn resolve(&mut self, name: &str, stack: &mut Vec<String>) -> Result<()> {
        if self.done.contains(name) {
            return Ok(());
        }
        if stack.iter().any(|s| s == name) {
            return Err(ConvergeError::CircularDependency {
                task: name.to_string(),
                stack: stack.clone(),
            });
        }

        stack.push(name.to_string());
        if let Some(dependencies) = self.dependencies.get(name) {
            for dependency in dependencies {
                self.resolve(dependency, stack)?;
            }
        }
        stack.pop();

        self.done.insert(name.to_string());
        self.order.push(name.to_string());
        Ok(())
    }
}

async fn apply(task: &dyn Task, ctx: &mut Context) -> Result<()> {
    let span = info_span!("task", name = %task.name());
    async {
        info!("Task started");
        let started = Instant::now();

        task.apply(ctx).await.map_err(|e| ConvergeError::Task {
            task: task.name().to_string(),
            source: Box::new(e),
        })?;
        ctx.converge_all().await?;

        info!(elapsed_ms = started.elapsed().as_millis(), "Task completed");
        Ok(())
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::DatabaseConfig;
    use crate::task::FnTask;
    use std::sync::Mutex;

    fn config() -> Config {
        Config::new().database("db", DatabaseConfig::sqlite("sqlite::memory:"))
    }

    fn recording(name: &str, log: &Arc<Mutex<Vec<String>>>) -> FnTask {
        let log = Arc::clone(log);
        let task_name = name.to_string();
        FnTask::new(name, move |_ctx| {
            let log = Arc::clone(&log);
            let task_name = task_name.clone();
            Box::pin(async move {
                log.lock().unwrap().push(task_name);
                Ok::<(), ConvergeError>(())
            })
        })
    }

    #[test]
    fn test_empty_config_is_rejected() {
        let err = Scheduler::new(Config::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: No database configuration passed"
        );
    }

    #[tokio::test]
    async fn test_run_without_tasks_is_rejected() {
        let err = Scheduler::new(config()).unwrap().run().await.unwrap_err();
        assert!(matches!(err, ConvergeError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_after_and_before_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let report = Scheduler::new(config())
            .unwrap()
            .task(recording("a", &log).runs_after(["c"]))
            .task(recording("b", &log))
            .task(recording("c", &log).runs_before(["b"]))
            .run()
            .await
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["c", "a", "b"]);
        assert_eq!(report.executed, vec!["c", "a", "b"]);
        assert!(report.missing.is_empty());
    }

    #[tokio::test]
    async fn test_cycle_detected_before_apply() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let err = Scheduler::new(config())
            .unwrap()
            .task(recording("a", &log).runs_after(["b"]))
            .task(recording("b", &log).runs_after(["a"]))
            .run()
            .await
            .unwrap_err();

        match err {
            ConvergeError::CircularDependency { task, stack } => {
                assert_eq!(task, "a");
                assert_eq!(stack, vec!["a", "b"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cycle_stops_independent_tasks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let err = Scheduler::new(config())
            .unwrap()
            .task(recording("a", &log))
            .task(recording("x", &log).runs_after(["y"]))
            .task(recording("y", &log).runs_after(["x"]))
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, ConvergeError::CircularDependency { .. }));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_dependency_is_reported() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let report = Scheduler::new(config())
            .unwrap()
            .task(recording("a", &log).runs_after(["ghost"]))
            .run()
            .await
            .unwrap();
        assert_eq!(report.executed, vec!["a"]);
        assert_eq!(report.missing, vec!["ghost"]);
    }

    #[tokio::test]
    async fn test_task_error_is_wrapped() {
        let err = Scheduler::new(config())
            .unwrap()
            .task(FnTask::new("broken", |ctx| {
                Box::pin(async move {
                    ctx.db("db")
                        .await?
                        .table("child")
                        .foreign(&["parent_id"], "parent", &[], None)?;
                    Ok::<(), ConvergeError>(())
                })
            }))
            .run()
            .await
            .unwrap_err();

        match err {
            ConvergeError::Task { task, source } => {
                assert_eq!(task, "broken");
                assert_eq!(
                    source.to_string(),
                    "Configuration error: Table \"parent\" is missing"
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_context_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();
        let ctx = Context::new(
            config(),
            vec![dir.path().to_path_buf(), PathBuf::from("/nonexistent")],
            Arc::new(SqliteConnectionFactory),
            Arc::new(DefaultNaming),
        );

        assert_eq!(ctx.paths("/data/"), vec![dir.path().join("data")]);
        assert!(ctx.paths("missing").is_empty());
        assert_eq!(ctx.paths(""), vec![dir.path().to_path_buf()]);
    }
}
