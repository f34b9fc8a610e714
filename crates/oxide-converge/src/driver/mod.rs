//! Bundled database drivers.

pub mod sqlite;

pub use sqlite::{SqliteConnection, SqliteConnectionFactory, SqliteIntrospector};
