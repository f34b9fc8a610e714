//! Pluggable naming of indexes and constraints.
//!
//! Dialects limit identifier lengths differently, so the name of an index
//! created without an explicit name is decided by a [`NamingStrategy`]. When
//! the strategy returns `None`, the deterministic fallback from
//! [`generated_name`](crate::schema::generated_name) is used.

use std::fmt;

use crate::schema::generated_name;

/// Kind of a generated index or constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// Plain index.
    Index,
    /// Unique index.
    Unique,
    /// Primary key.
    Primary,
    /// Foreign key constraint.
    Foreign,
}

impl IndexKind {
    /// Returns the short tag used in generated names.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Index => "idx",
            Self::Unique => "unq",
            Self::Primary => "pk",
            Self::Foreign => "fk",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Decides the name of an index or constraint that was not named explicitly.
pub trait NamingStrategy: Send + Sync + fmt::Debug {
    /// Returns the name to use, or `None` to fall back to the generated name.
    fn index_name(&self, table: &str, columns: &[String], kind: IndexKind) -> Option<String>;

    /// Returns the strategy's name or the deterministic fallback.
    fn name_for(&self, table: &str, columns: &[String], kind: IndexKind) -> String {
        self.index_name(table, columns, kind)
            .unwrap_or_else(|| generated_name(kind.tag(), table, columns))
    }
}

/// Leaves naming to the deterministic fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNaming;

impl NamingStrategy for DefaultNaming {
    fn index_name(&self, _table: &str, _columns: &[String], _kind: IndexKind) -> Option<String> {
        None
    }
}

/// Names indexes `{tag}_{table}_{columns}`, truncated to `max_length`.
#[derive(Debug, Clone, Copy)]
pub struct ConventionNaming {
    /// Maximum identifier length of the target dialect.
    pub max_length: usize,
}

impl ConventionNaming {
    /// Creates the strategy for the given identifier limit.
    #[must_use]
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl Default for ConventionNaming {
    fn default() -> Self {
        // PostgreSQL's NAMEDATALEN - 1, the shortest common limit
        Self::new(63)
    }
}

impl NamingStrategy for ConventionNaming {
    fn index_name(&self, table: &str, columns: &[String], kind: IndexKind) -> Option<String> {
        let mut name = format!("{}_{}_{}", kind.tag(), table, columns.join("_"))
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect::<String>()
            .to_ascii_lowercase();
        name.truncate(self.max_length);
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_naming_defers() {
        let cols = vec!["a".to_string()];
        assert!(DefaultNaming.index_name("t", &cols, IndexKind::Index).is_none());
        assert!(DefaultNaming
            .name_for("t", &cols, IndexKind::Index)
            .starts_with("idx_"));
        assert_eq!(DefaultNaming.name_for("t", &cols, IndexKind::Primary), "primary");
    }

    #[test]
    fn test_convention_naming() {
        let naming = ConventionNaming::default();
        let cols = vec!["status".to_string(), "pos".to_string()];
        assert_eq!(
            naming.index_name("test", &cols, IndexKind::Unique).as_deref(),
            Some("unq_test_status_pos")
        );
    }

    #[test]
    fn test_convention_naming_truncates() {
        let naming = ConventionNaming::new(10);
        let cols = vec!["a_very_long_column".to_string()];
        let name = naming.index_name("table", &cols, IndexKind::Index).unwrap();
        assert_eq!(name, "idx_table_");
        assert_eq!(name.len(), 10);
    }
}
