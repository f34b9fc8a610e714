//! Desired-state schema convergence for Rust.
//!
//! `oxide-converge` keeps a database structure in line with schema code.
//! Instead of writing forward and backward migrations, tasks declare what
//! the schema should look like and the engine computes the difference to
//! the live database:
//!
//! - **Schema model** - per-database pair of the applied and the desired
//!   [`SchemaSnapshot`], edited through fluent builders
//! - **Platforms** - dialect-aware DDL for SQLite, PostgreSQL and MySQL
//! - **Scheduler** - discovers tasks and runs them in dependency order,
//!   converging every touched database after each task
//! - **Generator** - writes task stubs for an existing schema
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_converge::prelude::*;
//!
//! let config = Config::new().database("db", DatabaseConfig::sqlite("sqlite://app.db?mode=rwc"));
//!
//! let groups = FnTask::new("create_groups", |ctx| {
//!     Box::pin(async move {
//!         let db = ctx.db("db").await?;
//!         let mut t = db.table("groups");
//!         t.id(None);
//!         t.string("name", 100);
//!         Ok(())
//!     })
//! });
//!
//! let users = FnTask::new("create_users", |ctx| {
//!     Box::pin(async move {
//!         let db = ctx.db("db").await?;
//!         let mut t = db.table("users");
//!         t.id(None);
//!         t.string("name", 100).null(true);
//!         t.foreign(&["group_id"], "groups", &[], None)?;
//!         Ok(())
//!     })
//! })
//! .runs_after(["create_groups"]);
//!
//! let report = Scheduler::new(config)?.task(groups).task(users).run().await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Run the SQL tasks of a directory
//! oxide-converge --database sqlite://app.db up --path tasks
//!
//! # Print the current schema as JSON
//! oxide-converge snapshot
//!
//! # Write task stubs for the existing schema
//! oxide-converge generate --out tasks
//! ```

pub mod builder;
pub mod connection;
pub mod diff;
pub mod driver;
pub mod error;
pub mod generate;
pub mod logging;
pub mod model;
pub mod naming;
pub mod platform;
pub mod scheduler;
pub mod schema;
pub mod task;
pub mod value;

pub use async_trait::async_trait;

pub use builder::{ColumnBuilder, ForeignBuilder, SequenceBuilder, TableBuilder};
pub use connection::{Config, DatabaseConfig};
pub use error::{ConvergeError, Result};
pub use generate::Generator;
pub use logging::Verbosity;
pub use model::SchemaModel;
pub use scheduler::{Context, RunReport, Scheduler};
pub use schema::{
    ColumnDef, ColumnType, DefaultValue, ForeignKeyAction, ForeignKeyDef, IndexDef,
    SchemaSnapshot, SequenceDef, TableDef, ViewDef,
};
pub use task::{FnTask, SqlFileTask, SqlTaskFactory, Task, TaskFactory};
pub use value::{Row, Value};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::async_trait;
    pub use crate::builder::{ColumnBuilder, ForeignBuilder, SequenceBuilder, TableBuilder};
    pub use crate::connection::{Config, ConnectionFactory, DatabaseConfig};
    pub use crate::driver::sqlite::SqliteConnectionFactory;
    pub use crate::error::{ConvergeError, Result};
    pub use crate::model::SchemaModel;
    pub use crate::naming::{ConventionNaming, DefaultNaming, NamingStrategy};
    pub use crate::scheduler::{Context, RunReport, Scheduler};
    pub use crate::schema::{ColumnType, DefaultValue, ForeignKeyAction, SchemaSnapshot};
    pub use crate::task::{FnTask, SqlTaskFactory, Task, TaskFactory};
    pub use crate::value::{Row, Value};
}
