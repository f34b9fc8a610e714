//! Structural comparison of two schema snapshots.
//!
//! The diff is computed between the last applied snapshot and the desired
//! one. Whether a column or index counts as changed is decided by the
//! platform, so attributes a dialect cannot store never produce endless
//! alterations.

use std::collections::BTreeMap;

use crate::platform::Platform;
use crate::schema::{ColumnDef, ForeignKeyDef, IndexDef, SchemaSnapshot, SequenceDef, TableDef};

/// A column whose definition differs between both snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnChange {
    /// Definition in the applied snapshot.
    pub from: ColumnDef,
    /// Definition in the desired snapshot.
    pub to: ColumnDef,
}

/// A sequence whose options differ between both snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceChange {
    /// Sequence as applied.
    pub from: SequenceDef,
    /// Sequence as desired.
    pub to: SequenceDef,
}

/// Changes of a table present in both snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDiff {
    /// Table name.
    pub name: String,
    /// Table as applied.
    pub from: TableDef,
    /// Table as desired.
    pub to: TableDef,
    /// Columns to add.
    pub added_columns: Vec<(String, ColumnDef)>,
    /// Columns to alter.
    pub changed_columns: Vec<(String, ColumnChange)>,
    /// Columns to drop.
    pub dropped_columns: Vec<String>,
    /// Non-primary indexes to create.
    pub added_indexes: Vec<(String, IndexDef)>,
    /// Non-primary indexes to drop.
    pub dropped_indexes: Vec<(String, IndexDef)>,
    /// Primary key to drop.
    pub dropped_primary: Option<(String, IndexDef)>,
    /// Primary key to add.
    pub added_primary: Option<(String, IndexDef)>,
    /// Foreign keys to add.
    pub added_foreign_keys: Vec<(String, ForeignKeyDef)>,
    /// Foreign keys to drop.
    pub dropped_foreign_keys: Vec<(String, ForeignKeyDef)>,
    /// Whether the table options differ.
    pub options_changed: bool,
}

impl TableDiff {
    /// Returns true if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_columns.is_empty()
            && self.changed_columns.is_empty()
            && self.dropped_columns.is_empty()
            && self.added_indexes.is_empty()
            && self.dropped_indexes.is_empty()
            && self.dropped_primary.is_none()
            && self.added_primary.is_none()
            && self.added_foreign_keys.is_empty()
            && self.dropped_foreign_keys.is_empty()
            && !self.options_changed
    }

    /// Returns true if the primary key is replaced.
    #[must_use]
    pub fn primary_changed(&self) -> bool {
        self.dropped_primary.is_some() || self.added_primary.is_some()
    }
}

/// Differences between two snapshots, ordered by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDiff {
    /// Sequences to create.
    pub created_sequences: Vec<(String, SequenceDef)>,
    /// Sequences to alter.
    pub altered_sequences: Vec<(String, SequenceChange)>,
    /// Sequences to drop.
    pub dropped_sequences: Vec<String>,
    /// Tables to create.
    pub created_tables: Vec<(String, TableDef)>,
    /// Tables to alter.
    pub altered_tables: Vec<TableDiff>,
    /// Tables to drop, with their applied definition.
    pub dropped_tables: Vec<(String, TableDef)>,
}

impl SchemaDiff {
    /// Compares `applied` with `desired` using the platform's notion of change.
    #[must_use]
    pub fn between<P: Platform + ?Sized>(
        applied: &SchemaSnapshot,
        desired: &SchemaSnapshot,
        platform: &P,
    ) -> Self {
        let mut diff = Self::default();

        for (name, seq) in &desired.sequences {
            match applied.sequences.get(name) {
                None => diff.created_sequences.push((name.clone(), seq.clone())),
                Some(old) if old != seq => diff.altered_sequences.push((
                    name.clone(),
                    SequenceChange {
                        from: old.clone(),
                        to: seq.clone(),
                    },
                )),
                Some(_) => {}
            }
        }
        for name in applied.sequences.keys() {
            if !desired.sequences.contains_key(name) {
                diff.dropped_sequences.push(name.clone());
            }
        }

        for (name, table) in desired.tables.iter().filter(|(_, t)| !t.columns.is_empty()) {
            match existing(applied, name) {
                None => diff.created_tables.push((name.clone(), table.clone())),
                Some(old) => {
                    let table_diff = diff_table(name, old, table, platform);
                    if !table_diff.is_empty() {
                        diff.altered_tables.push(table_diff);
                    }
                }
            }
        }
        for (name, table) in applied.tables.iter().filter(|(_, t)| !t.columns.is_empty()) {
            if existing(desired, name).is_none() {
                diff.dropped_tables.push((name.clone(), table.clone()));
            }
        }

        diff
    }

    /// Returns true if both snapshots are structurally equal for the platform.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created_sequences.is_empty()
            && self.altered_sequences.is_empty()
            && self.dropped_sequences.is_empty()
            && self.created_tables.is_empty()
            && self.altered_tables.is_empty()
            && self.dropped_tables.is_empty()
    }
}

/// Returns the table if it can exist in the database. A table without
/// columns was only named by a builder.
fn existing<'s>(schema: &'s SchemaSnapshot, name: &str) -> Option<&'s TableDef> {
    schema.tables.get(name).filter(|t| !t.columns.is_empty())
}

/// Compares two versions of one table.
fn diff_table<P: Platform + ?Sized>(
    name: &str,
    from: &TableDef,
    to: &TableDef,
    platform: &P,
) -> TableDiff {
    let mut diff = TableDiff {
        name: name.to_string(),
        from: from.clone(),
        to: to.clone(),
        added_columns: Vec::new(),
        changed_columns: Vec::new(),
        dropped_columns: Vec::new(),
        added_indexes: Vec::new(),
        dropped_indexes: Vec::new(),
        dropped_primary: None,
        added_primary: None,
        added_foreign_keys: Vec::new(),
        dropped_foreign_keys: Vec::new(),
        options_changed: from.options != to.options,
    };

    // Columns
    for (col_name, col) in &to.columns {
        match from.columns.get(col_name) {
            None => diff.added_columns.push((col_name.clone(), col.clone())),
            Some(old) if platform.column_changed(old, col) => diff.changed_columns.push((
                col_name.clone(),
                ColumnChange {
                    from: old.clone(),
                    to: col.clone(),
                },
            )),
            Some(_) => {}
        }
    }
    for col_name in from.columns.keys() {
        if !to.columns.contains_key(col_name) {
            diff.dropped_columns.push(col_name.clone());
        }
    }

    // Primary key, matched by role
    match (from.primary_key(), to.primary_key()) {
        (None, None) => {}
        (Some((_, old)), Some((_, new))) if !platform.index_changed(old, new) => {}
        (old, new) => {
            diff.dropped_primary = old.map(|(n, i)| (n.to_string(), i.clone()));
            diff.added_primary = new.map(|(n, i)| (n.to_string(), i.clone()));
        }
    }

    // Other indexes; a changed index is dropped and created again
    let from_indexes = secondary_indexes(&from.indexes);
    let to_indexes = secondary_indexes(&to.indexes);
    for (idx_name, idx) in &to_indexes {
        match from_indexes.get(idx_name) {
            None => diff.added_indexes.push(((*idx_name).clone(), (*idx).clone())),
            Some(old) if platform.index_changed(old, idx) => {
                diff.dropped_indexes
                    .push(((*idx_name).clone(), (*old).clone()));
                diff.added_indexes.push(((*idx_name).clone(), (*idx).clone()));
            }
            Some(_) => {}
        }
    }
    for (idx_name, idx) in &from_indexes {
        if !to_indexes.contains_key(idx_name) {
            diff.dropped_indexes
                .push(((*idx_name).clone(), (*idx).clone()));
        }
    }

    // Foreign keys
    for (fk_name, fk) in &to.foreign_keys {
        match from.foreign_keys.get(fk_name) {
            None => diff.added_foreign_keys.push((fk_name.clone(), fk.clone())),
            Some(old) if old != fk => {
                diff.dropped_foreign_keys.push((fk_name.clone(), old.clone()));
                diff.added_foreign_keys.push((fk_name.clone(), fk.clone()));
            }
            Some(_) => {}
        }
    }
    for (fk_name, fk) in &from.foreign_keys {
        if !to.foreign_keys.contains_key(fk_name) {
            diff.dropped_foreign_keys.push((fk_name.clone(), fk.clone()));
        }
    }

    diff
}

fn secondary_indexes(indexes: &BTreeMap<String, IndexDef>) -> BTreeMap<&String, &IndexDef> {
    indexes.iter().filter(|(_, idx)| !idx.primary).collect()
}
