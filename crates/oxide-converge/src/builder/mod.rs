//! Fluent builders over the desired schema.
//!
//! Builders never own schema objects. They hold the key of the entry they
//! edit and a mutable borrow of the desired [`SchemaSnapshot`], so every
//! call lands in the same table, column, sequence or foreign key definition.
//! All calls are idempotent: repeating the same builder code against a
//! schema that already matches changes nothing.
//!
//! [`SchemaSnapshot`]: crate::schema::SchemaSnapshot

mod column;
mod foreign;
mod sequence;
mod table;

pub use column::ColumnBuilder;
pub use foreign::ForeignBuilder;
pub use sequence::SequenceBuilder;
pub use table::TableBuilder;

/// Returns true if `dialect` is listed, or if the list is empty.
pub(crate) fn matches_dialect(dialect: &str, dialects: &[&str]) -> bool {
    dialects.is_empty() || dialects.iter().any(|d| d.eq_ignore_ascii_case(dialect))
}
