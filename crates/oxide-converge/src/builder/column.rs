//! Column builder.

use crate::schema::{ColumnDef, ColumnType, DefaultValue};

use super::{matches_dialect, TableBuilder};

/// Edits one column of a table in the desired schema.
///
/// Setters consume and return the builder so they can be chained:
///
/// ```ignore
/// table.string("label", 255).null(true).comment("shown in lists");
/// ```
pub struct ColumnBuilder<'t, 'a> {
    table: &'t mut TableBuilder<'a>,
    name: String,
}

impl<'t, 'a> ColumnBuilder<'t, 'a> {
    pub(crate) fn new(table: &'t mut TableBuilder<'a>, name: &str) -> Self {
        Self {
            table,
            name: name.to_string(),
        }
    }

    fn update(self, f: impl FnOnce(&mut ColumnDef)) -> Self {
        if let Some(col) = self.table.def_mut().columns.get_mut(&self.name) {
            f(col);
        }
        self
    }

    /// Returns the column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column definition.
    #[must_use]
    pub fn def(&self) -> Option<&ColumnDef> {
        self.table.column_def(&self.name)
    }

    /// Sets the column type.
    pub fn column_type(self, column_type: impl Into<ColumnType>) -> Self {
        let column_type = column_type.into();
        self.update(|c| c.column_type = column_type)
    }

    /// Sets the maximum length.
    pub fn length(self, length: u32) -> Self {
        self.update(|c| c.length = Some(length))
    }

    /// Sets the total number of digits.
    pub fn precision(self, precision: u32) -> Self {
        self.update(|c| c.precision = Some(precision))
    }

    /// Sets the number of decimals.
    pub fn scale(self, scale: u32) -> Self {
        self.update(|c| c.scale = Some(scale))
    }

    /// Allows or forbids NULL values.
    pub fn null(self, nullable: bool) -> Self {
        self.update(|c| c.nullable = nullable)
    }

    /// Sets the default value. [`DefaultValue::None`] removes it.
    pub fn default(self, value: impl Into<DefaultValue>) -> Self {
        let value = value.into();
        self.update(|c| c.default = value)
    }

    /// Uses a fixed width type (CHAR instead of VARCHAR).
    pub fn fixed(self, fixed: bool) -> Self {
        self.update(|c| c.fixed = fixed)
    }

    /// Uses an unsigned numeric type where supported.
    pub fn unsigned(self, unsigned: bool) -> Self {
        self.update(|c| c.unsigned = unsigned)
    }

    /// Generates values from a sequence or identity.
    pub fn seq(self, auto_increment: bool) -> Self {
        self.update(|c| c.auto_increment = auto_increment)
    }

    /// Alias of [`seq`](Self::seq).
    pub fn autoincrement(self, auto_increment: bool) -> Self {
        self.seq(auto_increment)
    }

    /// Sets the column comment.
    pub fn comment(self, comment: &str) -> Self {
        let comment = (!comment.is_empty()).then(|| comment.to_string());
        self.update(|c| c.comment = comment)
    }

    /// Sets the character set.
    pub fn charset(self, charset: &str) -> Self {
        self.set_opt("charset", charset)
    }

    /// Sets the collation.
    pub fn collation(self, collation: &str) -> Self {
        self.set_opt("collation", collation)
    }

    /// Replaces the generated column declaration for the listed dialects.
    pub fn custom(self, sql: &str, dialects: &[&str]) -> Self {
        if !matches_dialect(self.table.dialect(), dialects) {
            return self;
        }
        let sql = sql.to_string();
        self.update(|c| c.definition = Some(sql))
    }

    /// Returns a column option.
    #[must_use]
    pub fn opt(&self, name: &str) -> Option<&serde_json::Value> {
        self.def().and_then(|c| c.options.get(name))
    }

    /// Sets a column option.
    pub fn set_opt(self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        let (name, value) = (name.to_string(), value.into());
        self.update(|c| {
            c.options.insert(name, value);
        })
    }

    /// Sets a column option only for the listed dialects.
    pub fn set_opt_for(
        self,
        name: &str,
        value: impl Into<serde_json::Value>,
        dialects: &[&str],
    ) -> Self {
        if matches_dialect(self.table.dialect(), dialects) {
            self.set_opt(name, value)
        } else {
            self
        }
    }

    /// Adds an index over this column.
    pub fn index(self, name: Option<&str>) -> Self {
        let column = self.name.clone();
        self.table.index(&[column.as_str()], name);
        self
    }

    /// Adds a unique index over this column.
    pub fn unique(self, name: Option<&str>) -> Self {
        let column = self.name.clone();
        self.table.unique(&[column.as_str()], name);
        self
    }

    /// Adds a spatial index over this column.
    pub fn spatial(self, name: Option<&str>) -> Self {
        let column = self.name.clone();
        self.table.spatial(&[column.as_str()], name);
        self
    }

    /// Makes this column the primary key.
    pub fn primary(self, name: Option<&str>) -> Self {
        let column = self.name.clone();
        self.table.primary(&[column.as_str()], name);
        self
    }
}

impl std::fmt::Debug for ColumnBuilder<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnBuilder")
            .field("table", &self.table.name())
            .field("name", &self.name)
            .finish()
    }
}
