//! Table builder.

use crate::error::{ConvergeError, Result};
use crate::naming::{IndexKind, NamingStrategy};
use crate::schema::{
    ColumnDef, ColumnType, DefaultValue, ForeignKeyAction, ForeignKeyDef, IndexDef,
    SchemaSnapshot, TableDef,
};

use super::{matches_dialect, ColumnBuilder, ForeignBuilder};

/// Default length of `text()` columns.
const TEXT_LENGTH: u32 = 0xffff;
/// Default length of `blob()` columns.
const BLOB_LENGTH: u32 = 0x7fff;

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}

/// Declares the shape of one table in the desired schema.
///
/// The table is registered in the desired schema when the builder is
/// created. Column factories create a column or retype the existing one.
pub struct TableBuilder<'a> {
    schema: &'a mut SchemaSnapshot,
    name: String,
    dialect: &'static str,
    naming: &'a dyn NamingStrategy,
}

impl<'a> TableBuilder<'a> {
    pub(crate) fn new(
        schema: &'a mut SchemaSnapshot,
        name: &str,
        dialect: &'static str,
        naming: &'a dyn NamingStrategy,
    ) -> Self {
        schema.tables.entry(name.to_string()).or_default();
        Self {
            schema,
            name: name.to_string(),
            dialect,
            naming,
        }
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the dialect the schema is built for.
    #[must_use]
    pub fn dialect(&self) -> &'static str {
        self.dialect
    }

    /// Returns the current table definition.
    #[must_use]
    pub fn def(&self) -> Option<&TableDef> {
        self.schema.tables.get(&self.name)
    }

    pub(crate) fn def_mut(&mut self) -> &mut TableDef {
        self.schema.tables.entry(self.name.clone()).or_default()
    }

    /// Returns a column definition.
    #[must_use]
    pub fn column_def(&self, name: &str) -> Option<&ColumnDef> {
        self.def().and_then(|t| t.columns.get(name))
    }

    /// Returns an index definition.
    #[must_use]
    pub fn index_def(&self, name: &str) -> Option<&IndexDef> {
        self.def().and_then(|t| t.indexes.get(name))
    }

    /// Returns a foreign key definition.
    #[must_use]
    pub fn foreign_def(&self, name: &str) -> Option<&ForeignKeyDef> {
        self.def().and_then(|t| t.foreign_keys.get(name))
    }

    /// Creates the column or changes the type of the existing one, which
    /// also discards a previous [`custom`](ColumnBuilder::custom) declaration.
    pub fn col(&mut self, name: &str, column_type: impl Into<ColumnType>) -> ColumnBuilder<'_, 'a> {
        let column_type = column_type.into();
        let columns = &mut self.def_mut().columns;
        match columns.get_mut(name) {
            Some(col) => {
                col.column_type = column_type;
                col.definition = None;
            }
            None => {
                columns.insert(name.to_string(), ColumnDef::new(column_type));
            }
        }
        ColumnBuilder::new(self, name)
    }

    /// Auto-incrementing BIGINT primary key, named `id` by default.
    pub fn bigid(&mut self, name: Option<&str>) -> ColumnBuilder<'_, 'a> {
        self.col(name.unwrap_or("id"), ColumnType::BigInt)
            .default(DefaultValue::None)
            .seq(true)
            .primary(None)
    }

    /// BIGINT column, defaults to 0.
    pub fn bigint(&mut self, name: &str) -> ColumnBuilder<'_, 'a> {
        self.col(name, ColumnType::BigInt).default(0)
    }

    /// Variable length binary column, defaults to an empty string.
    pub fn binary(&mut self, name: &str, length: u32) -> ColumnBuilder<'_, 'a> {
        self.col(name, ColumnType::Binary)
            .length(length)
            .default("")
    }

    /// Binary large object, defaults to an empty string.
    pub fn blob(&mut self, name: &str) -> ColumnBuilder<'_, 'a> {
        self.col(name, ColumnType::Blob)
            .length(BLOB_LENGTH)
            .default("")
    }

    /// Alias of [`boolean`](Self::boolean).
    pub fn bool(&mut self, name: &str) -> ColumnBuilder<'_, 'a> {
        self.boolean(name)
    }

    /// Boolean column, defaults to `false`.
    pub fn boolean(&mut self, name: &str) -> ColumnBuilder<'_, 'a> {
        self.col(name, ColumnType::Boolean).default(false)
    }

    /// Fixed length character column.
    pub fn char(&mut self, name: &str, length: u32) -> ColumnBuilder<'_, 'a> {
        self.col(name, ColumnType::String).length(length).fixed(true)
    }

    /// Date column.
    pub fn date(&mut self, name: &str) -> ColumnBuilder<'_, 'a> {
        self.col(name, ColumnType::Date)
    }

    /// Date and time column.
    pub fn datetime(&mut self, name: &str) -> ColumnBuilder<'_, 'a> {
        self.col(name, ColumnType::DateTime)
    }

    /// Date and time column with time zone.
    pub fn datetimetz(&mut self, name: &str) -> ColumnBuilder<'_, 'a> {
        self.col(name, ColumnType::DateTimeTz)
    }

    /// Exact numeric column, defaults to 0.
    pub fn decimal(&mut self, name: &str, digits: u32, decimals: u32) -> ColumnBuilder<'_, 'a> {
        self.col(name, ColumnType::Decimal)
            .precision(digits)
            .scale(decimals)
            .default(0)
    }

    /// Floating point column, defaults to 0.
    pub fn float(&mut self, name: &str) -> ColumnBuilder<'_, 'a> {
        self.col(name, ColumnType::Float).default(0)
    }

    /// UUID column.
    pub fn guid(&mut self, name: &str) -> ColumnBuilder<'_, 'a> {
        self.col(name, ColumnType::Guid)
    }

    /// Auto-incrementing INTEGER primary key, named `id` by default.
    pub fn id(&mut self, name: Option<&str>) -> ColumnBuilder<'_, 'a> {
        self.integer(name.unwrap_or("id"))
            .default(DefaultValue::None)
            .seq(true)
            .primary(None)
    }

    /// Alias of [`integer`](Self::integer).
    pub fn int(&mut self, name: &str) -> ColumnBuilder<'_, 'a> {
        self.integer(name)
    }

    /// INTEGER column.
    pub fn integer(&mut self, name: &str) -> ColumnBuilder<'_, 'a> {
        self.col(name, ColumnType::Integer)
    }

    /// JSON column.
    pub fn json(&mut self, name: &str) -> ColumnBuilder<'_, 'a> {
        self.col(name, ColumnType::Json)
    }

    /// SMALLINT column, defaults to 0.
    pub fn smallint(&mut self, name: &str) -> ColumnBuilder<'_, 'a> {
        self.col(name, ColumnType::SmallInt).default(0)
    }

    /// Variable length string column, defaults to an empty string.
    pub fn string(&mut self, name: &str, length: u32) -> ColumnBuilder<'_, 'a> {
        self.col(name, ColumnType::String)
            .length(length)
            .default("")
    }

    /// Text column, defaults to an empty string.
    pub fn text(&mut self, name: &str) -> ColumnBuilder<'_, 'a> {
        self.col(name, ColumnType::Text)
            .length(TEXT_LENGTH)
            .default("")
    }

    /// Time column.
    pub fn time(&mut self, name: &str) -> ColumnBuilder<'_, 'a> {
        self.col(name, ColumnType::Time)
    }

    /// Alias of [`guid`](Self::guid).
    pub fn uuid(&mut self, name: &str) -> ColumnBuilder<'_, 'a> {
        self.guid(name)
    }

    /// Drops columns together with the indexes and foreign keys using them.
    pub fn drop_column(&mut self, names: &[&str]) -> &mut Self {
        let table = self.def_mut();
        for name in names {
            if table.columns.shift_remove(*name).is_some() {
                table
                    .indexes
                    .retain(|_, idx| !idx.columns.iter().any(|c| c == name));
                table
                    .foreign_keys
                    .retain(|_, fk| !fk.columns.iter().any(|c| c == name));
            }
        }
        self
    }

    /// Drops indexes if they exist.
    pub fn drop_index(&mut self, names: &[&str]) -> &mut Self {
        let table = self.def_mut();
        for name in names {
            table.indexes.remove(*name);
        }
        self
    }

    /// Drops foreign keys if they exist.
    pub fn drop_foreign(&mut self, names: &[&str]) -> &mut Self {
        let table = self.def_mut();
        for name in names {
            table.foreign_keys.remove(*name);
        }
        self
    }

    /// Drops the primary key if it exists.
    pub fn drop_primary(&mut self) -> &mut Self {
        self.def_mut().indexes.retain(|_, idx| !idx.primary);
        self
    }

    /// Returns true if all columns exist.
    #[must_use]
    pub fn has_column(&self, names: &[&str]) -> bool {
        self.def().is_some_and(|t| t.has_columns(names))
    }

    /// Returns true if all indexes exist.
    #[must_use]
    pub fn has_index(&self, names: &[&str]) -> bool {
        self.def()
            .is_some_and(|t| names.iter().all(|n| t.indexes.contains_key(*n)))
    }

    /// Returns true if all foreign keys exist.
    #[must_use]
    pub fn has_foreign(&self, names: &[&str]) -> bool {
        self.def()
            .is_some_and(|t| names.iter().all(|n| t.foreign_keys.contains_key(*n)))
    }

    /// Adds a foreign key from `local` columns to `foreign_columns` of
    /// `foreign_table` (`["id"]` when empty).
    ///
    /// The local columns are created or altered to match the type of the
    /// referenced columns. Fails if the foreign table or one of its columns
    /// does not exist, or if the column counts differ.
    pub fn foreign(
        &mut self,
        local: &[&str],
        foreign_table: &str,
        foreign_columns: &[&str],
        name: Option<&str>,
    ) -> Result<ForeignBuilder<'_, 'a>> {
        let foreign_columns = if foreign_columns.is_empty() {
            vec!["id".to_string()]
        } else {
            to_strings(foreign_columns)
        };

        let referenced = self.schema.tables.get(foreign_table).ok_or_else(|| {
            ConvergeError::config(format!("Table \"{foreign_table}\" is missing"))
        })?;

        if local.len() != foreign_columns.len() {
            return Err(ConvergeError::config(format!(
                "No matching local column for foreign columns \"{}\" in table \"{foreign_table}\"",
                foreign_columns.join(", ")
            )));
        }

        let mut sources = Vec::with_capacity(local.len());
        for (local_col, foreign_col) in local.iter().zip(&foreign_columns) {
            let column = referenced.columns.get(foreign_col).ok_or_else(|| {
                ConvergeError::config(format!(
                    "Column \"{foreign_col}\" in table \"{foreign_table}\" is missing"
                ))
            })?;
            sources.push(((*local_col).to_string(), column.clone()));
        }

        let columns = &mut self.def_mut().columns;
        for (local_col, source) in sources {
            match columns.get_mut(&local_col) {
                Some(col) => col.copy_type_from(&source),
                None => {
                    let mut col = ColumnDef::new(source.column_type.clone());
                    col.copy_type_from(&source);
                    columns.insert(local_col, col);
                }
            }
        }

        let local = to_strings(local);
        let name = name.map_or_else(
            || self.naming.name_for(&self.name, &local, IndexKind::Foreign),
            str::to_string,
        );
        self.def_mut().foreign_keys.insert(
            name.clone(),
            ForeignKeyDef {
                columns: local,
                foreign_table: foreign_table.to_string(),
                foreign_columns,
                on_delete: ForeignKeyAction::Cascade,
                on_update: ForeignKeyAction::Cascade,
            },
        );

        Ok(ForeignBuilder::new(self, name))
    }

    /// Adds an index over `columns`.
    ///
    /// An index with the same name spanning the same columns is kept, one
    /// spanning other columns is replaced. Without a name, nothing is added
    /// if any index already spans exactly these columns.
    pub fn index(&mut self, columns: &[&str], name: Option<&str>) -> &mut Self {
        let columns = to_strings(columns);
        let explicit = name
            .map(str::to_string)
            .or_else(|| self.naming.index_name(&self.name, &columns, IndexKind::Index));
        let resolved = explicit
            .clone()
            .unwrap_or_else(|| self.naming.name_for(&self.name, &columns, IndexKind::Index));

        let table = self.def_mut();
        match &explicit {
            Some(n) => {
                if let Some(existing) = table.indexes.get(n) {
                    if existing.spans_columns(&columns) {
                        return self;
                    }
                    table.indexes.remove(n);
                }
            }
            None => {
                if table.indexes.values().any(|idx| idx.spans_columns(&columns)) {
                    return self;
                }
            }
        }

        table.indexes.insert(resolved, IndexDef::new(columns));
        self
    }

    /// Adds a unique index over `columns`.
    pub fn unique(&mut self, columns: &[&str], name: Option<&str>) -> &mut Self {
        let columns = to_strings(columns);
        let name = name.map_or_else(
            || self.naming.name_for(&self.name, &columns, IndexKind::Unique),
            str::to_string,
        );

        let table = self.def_mut();
        if let Some(existing) = table.indexes.get(&name) {
            if existing.unique && !existing.primary && existing.spans_columns(&columns) {
                return self;
            }
            table.indexes.remove(&name);
        }

        table.indexes.insert(name, IndexDef::unique(columns));
        self
    }

    /// Adds a spatial index over `columns`.
    pub fn spatial(&mut self, columns: &[&str], name: Option<&str>) -> &mut Self {
        let columns = to_strings(columns);
        let name = name.map_or_else(
            || self.naming.name_for(&self.name, &columns, IndexKind::Index),
            str::to_string,
        );

        let table = self.def_mut();
        if let Some(existing) = table.indexes.get(&name) {
            if existing.is_spatial() && existing.spans_columns(&columns) {
                return self;
            }
            table.indexes.remove(&name);
        }

        table.indexes.insert(name, IndexDef::spatial(columns));
        self
    }

    /// Sets the primary key, replacing one spanning other columns.
    pub fn primary(&mut self, columns: &[&str], name: Option<&str>) -> &mut Self {
        let columns = to_strings(columns);
        if self
            .def()
            .and_then(TableDef::primary_key)
            .is_some_and(|(_, pk)| pk.spans_columns(&columns))
        {
            return self;
        }

        let name = name.map_or_else(
            || self.naming.name_for(&self.name, &columns, IndexKind::Primary),
            str::to_string,
        );
        let table = self.def_mut();
        table.indexes.retain(|_, idx| !idx.primary);
        table.indexes.insert(name, IndexDef::primary(columns));
        self
    }

    /// Renames an index in the desired schema; an empty target name is
    /// generated from the index kind and columns.
    pub fn rename_index(&mut self, from: &str, to: &str) -> &mut Self {
        let Some(index) = self.def_mut().indexes.remove(from) else {
            return self;
        };

        let to = if to.is_empty() {
            let kind = if index.primary {
                IndexKind::Primary
            } else if index.unique {
                IndexKind::Unique
            } else {
                IndexKind::Index
            };
            self.naming.name_for(&self.name, &index.columns, kind)
        } else {
            to.to_string()
        };

        self.def_mut().indexes.insert(to, index);
        self
    }

    /// Returns a table option.
    #[must_use]
    pub fn opt(&self, name: &str) -> Option<&serde_json::Value> {
        self.def().and_then(|t| t.options.get(name))
    }

    /// Sets a table option.
    pub fn set_opt(&mut self, name: &str, value: impl Into<serde_json::Value>) -> &mut Self {
        self.def_mut().options.insert(name.to_string(), value.into());
        self
    }

    /// Sets a table option only for the listed dialects.
    pub fn set_opt_for(
        &mut self,
        name: &str,
        value: impl Into<serde_json::Value>,
        dialects: &[&str],
    ) -> &mut Self {
        if matches_dialect(self.dialect, dialects) {
            self.set_opt(name, value);
        }
        self
    }

    /// Sets the storage engine (MySQL).
    pub fn engine(&mut self, value: &str) -> &mut Self {
        self.set_opt("engine", value)
    }

    /// Sets the default character set.
    pub fn charset(&mut self, value: &str) -> &mut Self {
        self.set_opt("charset", value)
    }

    /// Sets the default collation.
    pub fn collation(&mut self, value: &str) -> &mut Self {
        self.set_opt("collation", value)
    }

    /// Marks the table as temporary.
    pub fn temporary(&mut self, value: bool) -> &mut Self {
        self.set_opt("temporary", value)
    }
}

impl std::fmt::Debug for TableBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableBuilder")
            .field("name", &self.name)
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{ConventionNaming, DefaultNaming};

    fn builder<'a>(schema: &'a mut SchemaSnapshot, name: &str) -> TableBuilder<'a> {
        TableBuilder::new(schema, name, "sqlite", &DefaultNaming)
    }

    #[test]
    fn test_table_is_registered() {
        let mut schema = SchemaSnapshot::new();
        builder(&mut schema, "test");
        assert!(schema.has_table("test"));
    }

    #[test]
    fn test_typed_columns_apply_defaults() {
        let mut schema = SchemaSnapshot::new();
        let mut t = builder(&mut schema, "test");
        t.boolean("flag");
        t.string("code", 50);
        t.decimal("price", 10, 2);
        t.char("lang", 2);
        t.text("body");

        assert_eq!(t.column_def("flag").unwrap().default, DefaultValue::Bool(false));
        let code = t.column_def("code").unwrap();
        assert_eq!(code.length, Some(50));
        assert_eq!(code.default, DefaultValue::String(String::new()));
        let price = t.column_def("price").unwrap();
        assert_eq!((price.precision, price.scale), (Some(10), Some(2)));
        assert_eq!(price.default, DefaultValue::Integer(0));
        assert!(t.column_def("lang").unwrap().fixed);
        assert_eq!(t.column_def("body").unwrap().length, Some(0xffff));
    }

    #[test]
    fn test_col_retypes_existing_column() {
        let mut schema = SchemaSnapshot::new();
        let mut t = builder(&mut schema, "test");
        t.string("code", 50).null(true);
        t.col("code", ColumnType::Text);

        let code = t.column_def("code").unwrap();
        assert_eq!(code.column_type, ColumnType::Text);
        assert!(code.nullable);
    }

    #[test]
    fn test_id_sets_primary_key() {
        let mut schema = SchemaSnapshot::new();
        let mut t = builder(&mut schema, "test");
        t.id(None);

        let id = t.column_def("id").unwrap();
        assert!(id.auto_increment);
        assert_eq!(id.column_type, ColumnType::Integer);
        let (name, pk) = t.def().unwrap().primary_key().unwrap();
        assert_eq!(name, "primary");
        assert_eq!(pk.columns, vec!["id"]);
    }

    #[test]
    fn test_bigid_has_no_default() {
        let mut schema = SchemaSnapshot::new();
        let mut t = builder(&mut schema, "test");
        t.bigid(Some("uid"));
        let uid = t.column_def("uid").unwrap();
        assert_eq!(uid.column_type, ColumnType::BigInt);
        assert!(uid.default.is_none());
    }

    #[test]
    fn test_index_idempotence() {
        let mut schema = SchemaSnapshot::new();
        let mut t = builder(&mut schema, "test");
        t.integer("a");
        t.integer("b");
        t.integer("c");

        t.index(&["a", "b"], Some("idx1"));
        let before = t.def().unwrap().clone();
        t.index(&["a", "b"], Some("idx1"));
        assert_eq!(t.def().unwrap(), &before);

        t.index(&["a", "c"], Some("idx1"));
        assert!(t.index_def("idx1").unwrap().spans_columns(&["a", "c"]));
        assert_eq!(t.def().unwrap().indexes.len(), 1);
    }

    #[test]
    fn test_unnamed_index_is_not_duplicated() {
        let mut schema = SchemaSnapshot::new();
        let mut t = builder(&mut schema, "test");
        t.integer("a");
        t.index(&["a"], Some("custom"));
        t.index(&["a"], None);
        assert_eq!(t.def().unwrap().indexes.len(), 1);

        t.index(&["a", "b"], None);
        t.index(&["a", "b"], None);
        assert_eq!(t.def().unwrap().indexes.len(), 2);
    }

    #[test]
    fn test_unique_replaces_plain_index_with_same_name() {
        let mut schema = SchemaSnapshot::new();
        let mut t = builder(&mut schema, "test");
        t.index(&["a"], Some("idx_a"));
        t.unique(&["a"], Some("idx_a"));
        assert!(t.index_def("idx_a").unwrap().unique);

        t.unique(&["a"], Some("idx_a"));
        assert_eq!(t.def().unwrap().indexes.len(), 1);
    }

    #[test]
    fn test_spatial_flag() {
        let mut schema = SchemaSnapshot::new();
        let mut t = builder(&mut schema, "test");
        t.spatial(&["pos"], None);
        let (_, idx) = t.def().unwrap().indexes.iter().next().unwrap();
        assert!(idx.is_spatial());
    }

    #[test]
    fn test_primary_replaced_only_when_columns_differ() {
        let mut schema = SchemaSnapshot::new();
        let mut t = builder(&mut schema, "test");
        t.primary(&["a"], Some("pk_custom"));
        t.primary(&["a"], None);
        assert!(t.has_index(&["pk_custom"]));

        t.primary(&["a", "b"], None);
        assert!(!t.has_index(&["pk_custom"]));
        let (name, pk) = t.def().unwrap().primary_key().unwrap();
        assert_eq!(name, "primary");
        assert_eq!(pk.columns, vec!["a", "b"]);
    }

    #[test]
    fn test_foreign_creates_matching_local_column() {
        let mut schema = SchemaSnapshot::new();
        builder(&mut schema, "parent").bigid(None);

        let mut t = builder(&mut schema, "child");
        let fk_name = t
            .foreign(&["parent_id"], "parent", &[], None)
            .unwrap()
            .name()
            .to_string();

        let local = t.column_def("parent_id").unwrap();
        assert_eq!(local.column_type, ColumnType::BigInt);
        assert!(!local.auto_increment);
        let fk = t.foreign_def(&fk_name).unwrap();
        assert_eq!(fk.foreign_columns, vec!["id"]);
        assert_eq!(fk.on_delete, ForeignKeyAction::Cascade);
        assert_eq!(fk.on_update, ForeignKeyAction::Cascade);
    }

    #[test]
    fn test_foreign_alters_existing_local_column() {
        let mut schema = SchemaSnapshot::new();
        builder(&mut schema, "parent").string("code", 20);

        let mut t = builder(&mut schema, "child");
        t.integer("parent_code").null(true);
        t.foreign(&["parent_code"], "parent", &["code"], Some("fk_code"))
            .unwrap();

        let local = t.column_def("parent_code").unwrap();
        assert_eq!(local.column_type, ColumnType::String);
        assert_eq!(local.length, Some(20));
        assert!(local.nullable);
    }

    #[test]
    fn test_foreign_errors() {
        let mut schema = SchemaSnapshot::new();
        builder(&mut schema, "parent").id(None);
        let mut t = builder(&mut schema, "child");

        let err = t.foreign(&["x"], "missing", &[], None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Table \"missing\" is missing"
        );

        let err = t.foreign(&["x"], "parent", &["nope"], None).unwrap_err();
        assert!(err.to_string().contains("Column \"nope\" in table \"parent\""));

        let err = t.foreign(&["x", "y"], "parent", &["id"], None).unwrap_err();
        assert!(matches!(err, ConvergeError::Configuration(_)));
    }

    #[test]
    fn test_drop_column_removes_dependent_indexes() {
        let mut schema = SchemaSnapshot::new();
        let mut t = builder(&mut schema, "test");
        t.integer("a");
        t.integer("b");
        t.index(&["a", "b"], Some("idx_ab"));
        t.index(&["b"], Some("idx_b"));

        t.drop_column(&["a", "missing"]);
        assert!(!t.has_column(&["a"]));
        assert!(!t.has_index(&["idx_ab"]));
        assert!(t.has_index(&["idx_b"]));
    }

    #[test]
    fn test_rename_index_generates_name() {
        let mut schema = SchemaSnapshot::new();
        let naming = ConventionNaming::default();
        let mut t = TableBuilder::new(&mut schema, "test", "sqlite", &naming);
        t.unique(&["code"], Some("old"));
        t.rename_index("old", "");
        assert!(t.has_index(&["unq_test_code"]));
        t.rename_index("missing", "other");
        assert!(!t.has_index(&["other"]));
    }

    #[test]
    fn test_options_per_dialect() {
        let mut schema = SchemaSnapshot::new();
        let mut t = builder(&mut schema, "test");
        t.engine("InnoDB");
        t.set_opt_for("engine", "MyISAM", &["mysql"]);
        t.set_opt_for("strict", true, &["sqlite"]);
        assert_eq!(t.opt("engine"), Some(&serde_json::json!("InnoDB")));
        assert_eq!(t.opt("strict"), Some(&serde_json::json!(true)));
    }
}
