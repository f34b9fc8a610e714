//! Integration tests for schema convergence against a file database.
//!
//! Every test declares a schema, converges it, closes the connection and
//! reopens the database, so the applied snapshot comes from introspection
//! instead of the previous desired state.

mod common;

use common::{file_config, open};
use oxide_converge::prelude::*;

fn declare(db: &mut SchemaModel) -> Result<()> {
    let mut t = db.table("groups");
    t.bigid(None);
    t.string("name", 100);
    t.unique(&["name"], None);

    let mut t = db.table("users");
    t.bigid(None);
    t.string("email", 200);
    t.boolean("active");
    t.text("bio").null(true);
    t.decimal("balance", 10, 2);
    t.index(&["email"], Some("idx_users_email"));
    t.foreign(&["group_id"], "groups", &[], Some("fk_users_group"))?;
    Ok(())
}

#[tokio::test]
async fn test_reopened_schema_has_nothing_pending() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir);

    let mut db = open(&config).await;
    declare(&mut db).unwrap();
    assert!(db.converge().await.unwrap() > 0);
    db.close().await.unwrap();

    let mut db = open(&config).await;
    assert!(db.has_table(&["groups", "users"]));
    assert!(db.has_index("users", &["idx_users_email"]));
    assert!(db.has_foreign("users", &["fk_users_group"]));

    declare(&mut db).unwrap();
    assert_eq!(db.pending_statements(), Vec::<String>::new());
    assert_eq!(db.converge().await.unwrap(), 0);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_foreign_key_column_matches_referenced_type() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir);

    let mut db = open(&config).await;
    declare(&mut db).unwrap();
    db.converge().await.unwrap();
    db.close().await.unwrap();

    let db = open(&config).await;
    let users = db.applied().table("users").unwrap();
    assert_eq!(users.columns["group_id"].column_type, ColumnType::BigInt);
    assert!(!users.columns["group_id"].nullable);

    let fk = &users.foreign_keys["fk_users_group"];
    assert_eq!(fk.foreign_table, "groups");
    assert_eq!(fk.foreign_columns, vec!["id"]);
    assert_eq!(fk.on_delete, ForeignKeyAction::Cascade);
    assert_eq!(fk.on_update, ForeignKeyAction::Cascade);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_index_recreated_when_columns_change() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir);

    let mut db = open(&config).await;
    declare(&mut db).unwrap();
    db.converge().await.unwrap();
    db.close().await.unwrap();

    let mut db = open(&config).await;
    declare(&mut db).unwrap();
    db.table("users")
        .index(&["email", "active"], Some("idx_users_email"));
    // drop plus create
    assert_eq!(db.pending_statements().len(), 2);
    db.converge().await.unwrap();
    db.close().await.unwrap();

    let db = open(&config).await;
    let index = &db.applied().table("users").unwrap().indexes["idx_users_email"];
    assert_eq!(index.columns, vec!["email", "active"]);
    assert!(!index.unique);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_added_column_keeps_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir);

    let mut db = open(&config).await;
    db.table_with("notes", |t| {
        t.id(None);
        t.string("title", 100);
    });
    db.insert("notes", &[("title", "first".into())]).await.unwrap();
    db.close().await.unwrap();

    let mut db = open(&config).await;
    db.table("notes").string("tag", 20).null(true);
    let rows = db.select("notes", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("title"), Some(&Value::Text("first".to_string())));
    assert_eq!(rows[0].get("tag"), Some(&Value::Text(String::new())));
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_changed_column_rebuild_keeps_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir);

    let mut db = open(&config).await;
    db.table_with("notes", |t| {
        t.id(None);
        t.string("title", 100);
        t.index(&["title"], Some("idx_notes_title"));
    });
    db.insert("notes", &[("title", "first".into())]).await.unwrap();
    db.close().await.unwrap();

    let mut db = open(&config).await;
    db.table("notes").string("title", 250);
    assert!(db.converge().await.unwrap() > 0);
    db.close().await.unwrap();

    let mut db = open(&config).await;
    let notes = db.applied().table("notes").unwrap();
    assert_eq!(notes.columns["title"].length, Some(250));
    assert!(db.has_index("notes", &["idx_notes_title"]));
    let rows = db.select("notes", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("title"), Some(&Value::Text("first".to_string())));
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_dropped_column_is_removed_from_database() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir);

    let mut db = open(&config).await;
    db.table_with("notes", |t| {
        t.id(None);
        t.string("title", 100);
        t.string("obsolete", 10);
    });
    db.converge().await.unwrap();
    assert!(db.drop_column("notes", &["obsolete", "missing"]).await.unwrap() > 0);
    db.close().await.unwrap();

    let db = open(&config).await;
    assert!(db.has_column("notes", &["id", "title"]));
    assert!(!db.has_column("notes", &["obsolete"]));
    db.close().await.unwrap();
}

fn declare_people(db: &mut SchemaModel) {
    let mut t = db.table("people");
    t.id(None);
    t.string("name", 10)
        .custom("VARCHAR(10) COLLATE NOCASE", &["sqlite"]);
}

#[tokio::test]
async fn test_custom_declaration_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir);

    let mut db = open(&config).await;
    declare_people(&mut db);
    db.insert("people", &[("name", "Alice".into())]).await.unwrap();
    db.close().await.unwrap();

    let mut db = open(&config).await;
    declare_people(&mut db);
    assert_eq!(db.pending_statements(), Vec::<String>::new());
    let rows = db.select("people", &[("name", "alice".into())]).await.unwrap();
    assert_eq!(rows.len(), 1);

    // dropping the custom declaration is still a change
    db.table("people").string("name", 10);
    assert!(!db.pending_statements().is_empty());
    db.close().await.unwrap();

    let db = open(&config).await;
    assert!(db.applied().table("people").unwrap().columns["name"]
        .definition
        .is_none());
    db.close().await.unwrap();
}
