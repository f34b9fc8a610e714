#![allow(dead_code)]

use std::sync::Arc;

use oxide_converge::prelude::*;
use tempfile::TempDir;

pub fn file_config(dir: &TempDir) -> Config {
    let url = format!("sqlite://{}", dir.path().join("app.db").display());
    Config::new().database("db", DatabaseConfig::sqlite(url))
}

pub async fn open(config: &Config) -> SchemaModel {
    let (name, db) = config.get("db").unwrap();
    SchemaModel::connect(
        name,
        db.clone(),
        Arc::new(SqliteConnectionFactory),
        Arc::new(DefaultNaming),
    )
    .await
    .unwrap_or_else(|e| panic!("Failed to open database: {e}"))
}
