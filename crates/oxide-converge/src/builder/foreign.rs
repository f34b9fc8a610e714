//! Foreign key builder.

use crate::schema::{ForeignKeyAction, ForeignKeyDef};

use super::TableBuilder;

/// Edits one foreign key constraint of a table.
///
/// Both actions default to `CASCADE`.
pub struct ForeignBuilder<'t, 'a> {
    table: &'t mut TableBuilder<'a>,
    name: String,
}

impl<'t, 'a> ForeignBuilder<'t, 'a> {
    pub(crate) fn new(table: &'t mut TableBuilder<'a>, name: String) -> Self {
        Self { table, name }
    }

    fn update(self, f: impl FnOnce(&mut ForeignKeyDef)) -> Self {
        if let Some(fk) = self.table.def_mut().foreign_keys.get_mut(&self.name) {
            f(fk);
        }
        self
    }

    /// Returns the constraint name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the constraint definition.
    #[must_use]
    pub fn def(&self) -> Option<&ForeignKeyDef> {
        self.table.foreign_def(&self.name)
    }

    /// Sets the action on delete.
    pub fn on_delete(self, action: ForeignKeyAction) -> Self {
        self.update(|fk| fk.on_delete = action)
    }

    /// Sets the action on update.
    pub fn on_update(self, action: ForeignKeyAction) -> Self {
        self.update(|fk| fk.on_update = action)
    }

    /// Sets the action on delete and on update.
    pub fn on_both(self, action: ForeignKeyAction) -> Self {
        self.update(|fk| {
            fk.on_delete = action;
            fk.on_update = action;
        })
    }
}

impl std::fmt::Debug for ForeignBuilder<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForeignBuilder")
            .field("table", &self.table.name())
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::TableBuilder;
    use crate::naming::DefaultNaming;
    use crate::schema::{ForeignKeyAction, SchemaSnapshot};

    #[test]
    fn test_actions() {
        let mut schema = SchemaSnapshot::new();
        TableBuilder::new(&mut schema, "parent", "sqlite", &DefaultNaming).id(None);
        let mut t = TableBuilder::new(&mut schema, "child", "sqlite", &DefaultNaming);

        let fk = t
            .foreign(&["parent_id"], "parent", &[], Some("fk_parent"))
            .unwrap()
            .on_delete(ForeignKeyAction::SetNull);
        let def = fk.def().unwrap();
        assert_eq!(def.on_delete, ForeignKeyAction::SetNull);
        assert_eq!(def.on_update, ForeignKeyAction::Cascade);

        let fk = t
            .foreign(&["parent_id"], "parent", &[], Some("fk_parent"))
            .unwrap()
            .on_both(ForeignKeyAction::Restrict);
        let def = fk.def().unwrap();
        assert_eq!(def.on_delete, ForeignKeyAction::Restrict);
        assert_eq!(def.on_update, ForeignKeyAction::Restrict);
    }
}
