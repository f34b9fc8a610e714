//! Integration tests for task discovery and dependency ordered execution.

mod common;

use std::path::Path;
use std::sync::{Arc, Mutex};

use common::{file_config, open};
use oxide_converge::prelude::*;

fn write(dir: &Path, name: &str, sql: &str) {
    std::fs::write(dir.join(name), sql).unwrap();
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

#[tokio::test]
async fn test_sql_tasks_run_in_dependency_order() {
    let db_dir = tempfile::tempdir().unwrap();
    let tasks = tempfile::tempdir().unwrap();
    write(
        tasks.path(),
        "create_users.sql",
        "CREATE TABLE \"users\" (\n\
         \"id\" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,\n\
         \"name\" VARCHAR(100) NOT NULL DEFAULT ''\n\
         );\n",
    );
    write(
        tasks.path(),
        "a_index.sql",
        "-- @after: create_users\n\
         CREATE INDEX \"idx_users_name\" ON \"users\" (\"name\");\n",
    );
    write(
        tasks.path(),
        "seed_users.sql",
        "-- @after: create_users\n\
         INSERT INTO \"users\" (\"name\") VALUES ('alice');\n\
         INSERT INTO \"users\" (\"name\") VALUES ('bob');\n",
    );
    write(tasks.path(), "README.md", "not a task");

    let config = file_config(&db_dir);
    let report = Scheduler::new(config.clone())
        .unwrap()
        .path(tasks.path())
        .run()
        .await
        .unwrap();

    assert_eq!(report.executed, vec!["create_users", "a_index", "seed_users"]);
    assert!(report.missing.is_empty());

    let mut db = open(&config).await;
    assert!(db.has_index("users", &["idx_users_name"]));
    assert_eq!(db.select("users", &[]).await.unwrap().len(), 2);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_builder_task_extends_sql_task() {
    let db_dir = tempfile::tempdir().unwrap();
    let tasks = tempfile::tempdir().unwrap();
    write(
        tasks.path(),
        "create_users.sql",
        "CREATE TABLE \"users\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL);\n",
    );

    let add_email = FnTask::new("add_email", |ctx| {
        Box::pin(async move {
            let db = ctx.db("db").await?;
            db.table("users").string("email", 200).null(true);
            Ok::<(), ConvergeError>(())
        })
    })
    .runs_after(["create_users"]);

    let config = file_config(&db_dir);
    let report = Scheduler::new(config.clone())
        .unwrap()
        .path(tasks.path())
        .task(add_email)
        .run()
        .await
        .unwrap();
    assert_eq!(report.executed, vec!["create_users", "add_email"]);

    let db = open(&config).await;
    assert!(db.has_column("users", &["id", "email"]));
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_builder_changes_reach_database_before_dependents() {
    let db_dir = tempfile::tempdir().unwrap();
    let config = file_config(&db_dir);

    let create_items = FnTask::new("create_items", |ctx| {
        Box::pin(async move {
            let db = ctx.db("db").await?;
            db.table_with("items", |t| {
                t.id(None);
                t.string("label", 50);
            });
            Ok::<(), ConvergeError>(())
        })
    });

    // writes through a separate connection, which only sees applied DDL
    let seed_config = config.clone();
    let seed_items = FnTask::new("seed_items", move |_ctx| {
        let config = seed_config.clone();
        Box::pin(async move {
            let mut other = open(&config).await;
            other
                .exec("INSERT INTO \"items\" (\"label\") VALUES ('x')", &[])
                .await?;
            other.close().await?;
            Ok::<(), ConvergeError>(())
        })
    })
    .runs_after(["create_items"]);

    let report = Scheduler::new(config.clone())
        .unwrap()
        .task(seed_items)
        .task(create_items)
        .run()
        .await
        .unwrap();
    assert_eq!(report.executed, vec!["create_items", "seed_items"]);

    let mut db = open(&config).await;
    let rows = db.select("items", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("label"), Some(&Value::Text("x".to_string())));
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_cycle_in_files_applies_nothing() {
    let db_dir = tempfile::tempdir().unwrap();
    let tasks = tempfile::tempdir().unwrap();
    write(
        tasks.path(),
        "x.sql",
        "-- @after: y\nCREATE TABLE \"x\" (\"id\" INTEGER);\n",
    );
    write(
        tasks.path(),
        "y.sql",
        "-- @before: x\n-- @after: x\nCREATE TABLE \"y\" (\"id\" INTEGER);\n",
    );

    let config = file_config(&db_dir);
    let err = Scheduler::new(config.clone())
        .unwrap()
        .path(tasks.path())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, ConvergeError::CircularDependency { .. }));

    let db = open(&config).await;
    assert!(!db.has_table(&["x"]));
    assert!(!db.has_table(&["y"]));
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_before_orders_registered_tasks() {
    let db_dir = tempfile::tempdir().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    let report = Scheduler::new(file_config(&db_dir))
        .unwrap()
        .task(recording("x", &log))
        .task(recording("y", &log).runs_before(["x"]))
        .run()
        .await
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["y", "x"]);
    assert_eq!(report.executed, vec!["y", "x"]);
}

#[tokio::test]
async fn test_later_path_overrides_task() {
    let db_dir = tempfile::tempdir().unwrap();
    let base = tempfile::tempdir().unwrap();
    let custom = tempfile::tempdir().unwrap();
    write(
        base.path(),
        "create_items.sql",
        "CREATE TABLE \"items\" (\"id\" INTEGER);\n",
    );
    write(
        custom.path(),
        "create_items.sql",
        "CREATE TABLE \"items\" (\"id\" INTEGER, \"label\" TEXT);\n",
    );

    let config = file_config(&db_dir);
    let report = Scheduler::new(config.clone())
        .unwrap()
        .path(base.path())
        .path(custom.path())
        .run()
        .await
        .unwrap();
    assert_eq!(report.executed, vec!["create_items"]);

    let db = open(&config).await;
    assert!(db.has_column("items", &["id", "label"]));
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_dialect_restricted_task_is_skipped() {
    let db_dir = tempfile::tempdir().unwrap();
    let tasks = tempfile::tempdir().unwrap();
    write(
        tasks.path(),
        "pg_only.sql",
        "-- @dialect: postgresql\nCREATE TABLE \"pg\" (\"id\" SERIAL);\n",
    );

    let config = file_config(&db_dir);
    let report = Scheduler::new(config.clone())
        .unwrap()
        .path(tasks.path())
        .run()
        .await
        .unwrap();
    assert_eq!(report.executed, vec!["pg_only"]);

    let db = open(&config).await;
    assert!(!db.has_table(&["pg"]));
    db.close().await.unwrap();
}
