//! Schema representation types.
//!
//! A [`SchemaSnapshot`] describes the structure of a database: sequences,
//! tables (columns, indexes, foreign keys, options) and views. The same type
//! is used for the state read back from the live database and for the
//! desired state accumulated by the builders, so the two can be compared
//! structurally.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Portable column types, translated to native types by a platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnType {
    /// 64-bit integer.
    BigInt,
    /// Fixed or variable length binary string.
    Binary,
    /// Binary large object.
    Blob,
    /// Boolean.
    Boolean,
    /// Date without time.
    Date,
    /// Date and time without time zone.
    DateTime,
    /// Date and time with time zone.
    DateTimeTz,
    /// Exact numeric with precision and scale.
    Decimal,
    /// Double precision floating point.
    Float,
    /// UUID/GUID.
    Guid,
    /// 32-bit integer.
    Integer,
    /// JSON document.
    Json,
    /// 16-bit integer.
    SmallInt,
    /// Fixed or variable length character string.
    String,
    /// Character large object.
    Text,
    /// Time of day.
    Time,
    /// Any other type name, passed through to the platform.
    Custom(String),
}

impl ColumnType {
    /// Returns the portable tag of this type.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::BigInt => "bigint",
            Self::Binary => "binary",
            Self::Blob => "blob",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::DateTimeTz => "datetimetz",
            Self::Decimal => "decimal",
            Self::Float => "float",
            Self::Guid => "guid",
            Self::Integer => "integer",
            Self::Json => "json",
            Self::SmallInt => "smallint",
            Self::String => "string",
            Self::Text => "text",
            Self::Time => "time",
            Self::Custom(name) => name,
        }
    }

    /// Returns true for the integer family.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::BigInt | Self::Integer | Self::SmallInt)
    }
}

impl From<&str> for ColumnType {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "bigint" => Self::BigInt,
            "binary" => Self::Binary,
            "blob" => Self::Blob,
            "boolean" | "bool" => Self::Boolean,
            "date" => Self::Date,
            "datetime" => Self::DateTime,
            "datetimetz" => Self::DateTimeTz,
            "decimal" => Self::Decimal,
            "float" => Self::Float,
            "guid" | "uuid" => Self::Guid,
            "integer" | "int" => Self::Integer,
            "json" => Self::Json,
            "smallint" => Self::SmallInt,
            "string" => Self::String,
            "text" => Self::Text,
            "time" => Self::Time,
            _ => Self::Custom(value.to_string()),
        }
    }
}

impl From<String> for ColumnType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        value.tag().to_string()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum DefaultValue {
    /// No default value.
    #[default]
    None,
    /// NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// SQL expression (e.g., "CURRENT_TIMESTAMP").
    Expression(String),
}

impl DefaultValue {
    /// Returns true if no default is set.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Parses a raw SQL default as reported by a database catalog.
    #[must_use]
    pub fn from_sql(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("null") {
            return Self::Null;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Self::Integer(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return Self::Float(f);
        }
        if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
            return Self::String(raw[1..raw.len() - 1].replace("''", "'"));
        }
        Self::Expression(raw.to_string())
    }
}

impl From<bool> for DefaultValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for DefaultValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for DefaultValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for DefaultValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for DefaultValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    #[default]
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses an action as reported by a database catalog.
    #[must_use]
    pub fn from_sql(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NO ACTION" => Some(Self::NoAction),
            "RESTRICT" => Some(Self::Restrict),
            "CASCADE" => Some(Self::Cascade),
            "SET NULL" => Some(Self::SetNull),
            "SET DEFAULT" => Some(Self::SetDefault),
            _ => None,
        }
    }
}

/// Definition of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Portable type.
    pub column_type: ColumnType,
    /// Maximum length for string and binary types.
    pub length: Option<u32>,
    /// Total number of digits for decimal types.
    pub precision: Option<u32>,
    /// Digits after the decimal point.
    pub scale: Option<u32>,
    /// Whether NULL values are allowed.
    pub nullable: bool,
    /// Whether values are generated by a sequence/identity.
    pub auto_increment: bool,
    /// Fixed width instead of variable width.
    pub fixed: bool,
    /// Unsigned numeric type.
    pub unsigned: bool,
    /// Default value.
    #[serde(default)]
    pub default: DefaultValue,
    /// Column comment.
    pub comment: Option<String>,
    /// Custom column definition replacing the generated one.
    pub definition: Option<String>,
    /// Dialect specific options (charset, collation, ...).
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl ColumnDef {
    /// Creates a NOT NULL column of the given type.
    #[must_use]
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            length: None,
            precision: None,
            scale: None,
            nullable: false,
            auto_increment: false,
            fixed: false,
            unsigned: false,
            default: DefaultValue::None,
            comment: None,
            definition: None,
            options: BTreeMap::new(),
        }
    }

    /// Copies the type attributes a referencing column must share with the
    /// referenced one.
    pub fn copy_type_from(&mut self, other: &Self) {
        self.column_type = other.column_type.clone();
        self.length = other.length;
        self.precision = other.precision;
        self.scale = other.scale;
        self.unsigned = other.unsigned;
        self.fixed = other.fixed;
    }
}

/// Definition of an index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexDef {
    /// Indexed columns in order.
    pub columns: Vec<String>,
    /// Unique index.
    pub unique: bool,
    /// Primary key.
    pub primary: bool,
    /// Flags such as `spatial`.
    #[serde(default)]
    pub flags: BTreeSet<String>,
    /// Dialect specific options.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl IndexDef {
    /// Creates a plain index over the given columns.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    /// Creates a unique index.
    #[must_use]
    pub fn unique(columns: Vec<String>) -> Self {
        Self {
            columns,
            unique: true,
            ..Self::default()
        }
    }

    /// Creates a primary key.
    #[must_use]
    pub fn primary(columns: Vec<String>) -> Self {
        Self {
            columns,
            unique: true,
            primary: true,
            ..Self::default()
        }
    }

    /// Creates a spatial index.
    #[must_use]
    pub fn spatial(columns: Vec<String>) -> Self {
        let mut index = Self::new(columns);
        index.flags.insert("spatial".to_string());
        index
    }

    /// Returns true if the index covers exactly these columns in this order.
    #[must_use]
    pub fn spans_columns<S: AsRef<str>>(&self, columns: &[S]) -> bool {
        self.columns.len() == columns.len()
            && self
                .columns
                .iter()
                .zip(columns)
                .all(|(a, b)| a.eq_ignore_ascii_case(b.as_ref()))
    }

    /// Returns true if the index carries the `spatial` flag.
    #[must_use]
    pub fn is_spatial(&self) -> bool {
        self.flags.contains("spatial")
    }
}

/// Definition of a foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    /// Referencing columns in this table.
    pub columns: Vec<String>,
    /// Referenced table.
    pub foreign_table: String,
    /// Referenced columns.
    pub foreign_columns: Vec<String>,
    /// Action on delete.
    pub on_delete: ForeignKeyAction,
    /// Action on update.
    pub on_update: ForeignKeyAction,
}

/// Definition of a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceDef {
    /// First value.
    pub start: i64,
    /// Increment.
    pub step: i64,
    /// Number of values to preallocate.
    pub cache: Option<u32>,
    /// Table owning the sequence, if any.
    pub owner: Option<String>,
}

impl Default for SequenceDef {
    fn default() -> Self {
        Self {
            start: 1,
            step: 1,
            cache: None,
            owner: None,
        }
    }
}

/// Definition of a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDef {
    /// View name.
    pub name: String,
    /// SELECT statement of the view.
    pub sql: String,
}

/// Definition of a table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableDef {
    /// Columns in declaration order.
    pub columns: IndexMap<String, ColumnDef>,
    /// Indexes by name, including the primary key.
    pub indexes: BTreeMap<String, IndexDef>,
    /// Foreign keys by constraint name.
    pub foreign_keys: BTreeMap<String, ForeignKeyDef>,
    /// Table options (engine, charset, collation, temporary, ...).
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl TableDef {
    /// Creates an empty table definition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.get(name)
    }

    /// Returns the primary key and its name.
    #[must_use]
    pub fn primary_key(&self) -> Option<(&str, &IndexDef)> {
        self.indexes
            .iter()
            .find(|(_, index)| index.primary)
            .map(|(name, index)| (name.as_str(), index))
    }

    /// Returns true if all columns exist.
    #[must_use]
    pub fn has_columns<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().all(|n| self.columns.contains_key(n.as_ref()))
    }
}

/// The complete structure of a database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Sequences by name.
    #[serde(default)]
    pub sequences: BTreeMap<String, SequenceDef>,
    /// Tables by name.
    #[serde(default)]
    pub tables: BTreeMap<String, TableDef>,
    /// Views by name.
    #[serde(default)]
    pub views: BTreeMap<String, ViewDef>,
}

impl SchemaSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(name)
    }

    /// Returns true if the table exists.
    #[must_use]
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Returns true if the sequence exists.
    #[must_use]
    pub fn has_sequence(&self, name: &str) -> bool {
        self.sequences.contains_key(name)
    }
}

/// Builds a deterministic identifier for an index or constraint that was
/// not named explicitly, e.g. `idx_3f1a09bc`.
///
/// The primary key is always called `primary`.
#[must_use]
pub fn generated_name<S: AsRef<str>>(kind: &str, table: &str, columns: &[S]) -> String {
    if kind == "pk" {
        return "primary".to_string();
    }

    // FNV-1a, stable across runs and platforms
    let mut hash: u32 = 0x811c_9dc5;
    let mut feed = |s: &str| {
        for byte in s.bytes().chain(std::iter::once(0)) {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }
    };
    feed(table);
    for column in columns {
        feed(column.as_ref());
    }

    format!("{kind}_{hash:08x}")
}
