//! Task scaffolding from an existing schema.
//!
//! The generator writes one Rust source file per sequence, table and view
//! of a snapshot. Each file defines a [`Task`](crate::Task) that declares
//! the object with the builder API, so an existing database can be moved
//! under convergence management.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ConvergeError, Result};
use crate::schema::{
    ColumnDef, DefaultValue, ForeignKeyAction, SchemaSnapshot, SequenceDef, TableDef, ViewDef,
};

/// Writes task stubs into a directory.
#[derive(Debug, Clone)]
pub struct Generator {
    dir: PathBuf,
}

impl Generator {
    /// Creates a generator writing into `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Writes the stubs for all objects of `schema` and returns the created
    /// files. A non-empty `database` is used by the generated tasks and,
    /// reduced to ASCII letters and digits, prefixes the file names.
    pub fn generate(&self, schema: &SchemaSnapshot, database: &str) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ConvergeError::io(&self.dir, e))?;

        let prefix = prefix(database);
        let mut files = Vec::new();

        for (name, sequence) in &schema.sequences {
            let task = format!("{prefix}seq_{name}");
            files.push(self.write(&task, &render_sequence(&task, database, name, sequence))?);
        }
        for (name, table) in &schema.tables {
            let task = format!("{prefix}table_{name}");
            let stub = render_table(&task, &prefix, database, name, table);
            files.push(self.write(&task, &stub)?);
        }
        for view in schema.views.values() {
            let task = format!("{prefix}view_{}", view.name);
            files.push(self.write(&task, &render_view(&task, database, view))?);
        }

        info!(dir = %self.dir.display(), files = files.len(), "Task stubs generated");
        Ok(files)
    }

    fn write(&self, task: &str, content: &str) -> Result<PathBuf> {
        let path = self.dir.join(format!("{}.rs", file_stem(task)));
        std::fs::write(&path, content).map_err(|e| ConvergeError::io(&path, e))?;
        Ok(path)
    }
}

fn prefix(database: &str) -> String {
    let clean: String = database.chars().filter(char::is_ascii_alphanumeric).collect();
    if clean.is_empty() {
        clean
    } else {
        format!("{clean}_")
    }
}

fn file_stem(task: &str) -> String {
    task.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Converts a task name into a struct name, e.g. `table_users` to
/// `TableUsers`.
fn struct_name(task: &str) -> String {
    let name: String = file_stem(task)
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + chars.as_str()
            })
        })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("Task{name}")
    } else {
        name
    }
}

fn lit(value: &str) -> String {
    format!("{value:?}")
}

fn list(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| lit(v)).collect();
    format!("&[{}]", items.join(", "))
}

fn header(task: &str, imports: &str, after: &[String]) -> String {
    let mut out = format!(
        "//! Task `{task}`.\n\
         \n\
         use oxide_converge::{{async_trait, {imports}Context, Result, Task}};\n\
         \n\
         pub struct {name};\n\
         \n\
         #[async_trait]\n\
         impl Task for {name} {{\n\
         \x20   fn name(&self) -> &str {{\n\
         \x20       {task_lit}\n\
         \x20   }}\n",
        name = struct_name(task),
        task_lit = lit(task),
    );
    if !after.is_empty() {
        let items: Vec<String> = after.iter().map(|a| format!("{}.to_string()", lit(a))).collect();
        let _ = write!(
            out,
            "\n    fn after(&self) -> Vec<String> {{\n        vec![{}]\n    }}\n",
            items.join(", ")
        );
    }
    out.push_str("\n    async fn apply(&self, ctx: &mut Context) -> Result<()> {\n");
    out
}

const FOOTER: &str = "        Ok(())\n    }\n}\n";

fn render_sequence(task: &str, database: &str, name: &str, sequence: &SequenceDef) -> String {
    let mut out = header(task, "", &[]);
    let _ = write!(
        out,
        "        ctx.db({})\n            .await?\n            .sequence({})\n            .start({})\n            .step({})",
        lit(database),
        lit(name),
        sequence.start,
        sequence.step
    );
    if let Some(cache) = sequence.cache {
        let _ = write!(out, "\n            .cache(Some({cache}))");
    }
    out.push_str(";\n");
    out.push_str(FOOTER);
    out
}

fn default_expr(default: &DefaultValue) -> Option<String> {
    match default {
        DefaultValue::None => None,
        DefaultValue::Null => Some("DefaultValue::Null".to_string()),
        DefaultValue::Bool(b) => Some(b.to_string()),
        DefaultValue::Integer(i) => Some(format!("{i}_i64")),
        DefaultValue::Float(f) => Some(format!("{f:?}_f64")),
        DefaultValue::String(s) => Some(lit(s)),
        DefaultValue::Expression(e) => Some(format!("DefaultValue::Expression({}.to_string())", lit(e))),
    }
}

fn json_expr(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) if n.is_i64() => format!("{n}_i64"),
        serde_json::Value::String(s) => lit(s),
        other => lit(&other.to_string()),
    }
}

fn render_column(name: &str, column: &ColumnDef) -> String {
    let mut line = format!("t.col({}, {})", lit(name), lit(column.column_type.tag()));
    if let Some(length) = column.length {
        let _ = write!(line, ".length({length})");
    }
    if let Some(precision) = column.precision {
        let _ = write!(line, ".precision({precision})");
    }
    if let Some(scale) = column.scale {
        let _ = write!(line, ".scale({scale})");
    }
    for (flag, set) in [
        ("null", column.nullable),
        ("seq", column.auto_increment),
        ("fixed", column.fixed),
        ("unsigned", column.unsigned),
    ] {
        if set {
            let _ = write!(line, ".{flag}(true)");
        }
    }
    if let Some(default) = default_expr(&column.default) {
        let _ = write!(line, ".default({default})");
    }
    if let Some(comment) = &column.comment {
        let _ = write!(line, ".comment({})", lit(comment));
    }
    if let Some(definition) = &column.definition {
        let _ = write!(line, ".custom({}, &[])", lit(definition));
    }
    for (key, value) in &column.options {
        let _ = write!(line, ".set_opt({}, {})", lit(key), json_expr(value));
    }
    line
}

fn action_expr(action: ForeignKeyAction) -> &'static str {
    match action {
        ForeignKeyAction::NoAction => "ForeignKeyAction::NoAction",
        ForeignKeyAction::Restrict => "ForeignKeyAction::Restrict",
        ForeignKeyAction::Cascade => "ForeignKeyAction::Cascade",
        ForeignKeyAction::SetNull => "ForeignKeyAction::SetNull",
        ForeignKeyAction::SetDefault => "ForeignKeyAction::SetDefault",
    }
}

fn render_table(task: &str, prefix: &str, database: &str, name: &str, table: &TableDef) -> String {
    let mut after: Vec<String> = table
        .foreign_keys
        .values()
        .filter(|fk| fk.foreign_table != name)
        .map(|fk| format!("{prefix}table_{}", fk.foreign_table))
        .collect();
    after.sort();
    after.dedup();

    let mut imports = String::new();
    let needs_default = table.columns.values().any(|c| {
        matches!(c.default, DefaultValue::Null | DefaultValue::Expression(_))
    });
    if needs_default {
        imports.push_str("DefaultValue, ");
    }
    let needs_action = table.foreign_keys.values().any(|fk| {
        fk.on_delete != ForeignKeyAction::Cascade || fk.on_update != ForeignKeyAction::Cascade
    });
    if needs_action {
        imports.push_str("ForeignKeyAction, ");
    }

    let mut out = header(task, &imports, &after);
    let _ = writeln!(
        out,
        "        let db = ctx.db({}).await?;\n        let mut t = db.table({});\n",
        lit(database),
        lit(name)
    );

    for (key, value) in &table.options {
        let _ = writeln!(out, "        t.set_opt({}, {});", lit(key), json_expr(value));
    }
    for (col_name, column) in &table.columns {
        let _ = writeln!(out, "        {};", render_column(col_name, column));
    }

    for (idx_name, index) in &table.indexes {
        let method = if index.primary {
            "primary"
        } else if index.unique {
            "unique"
        } else if index.is_spatial() {
            "spatial"
        } else {
            "index"
        };
        let _ = writeln!(
            out,
            "        t.{method}({}, Some({}));",
            list(&index.columns),
            lit(idx_name)
        );
    }

    for (fk_name, fk) in &table.foreign_keys {
        let _ = write!(
            out,
            "        t.foreign({}, {}, {}, Some({}))?",
            list(&fk.columns),
            lit(&fk.foreign_table),
            list(&fk.foreign_columns),
            lit(fk_name)
        );
        if fk.on_delete != ForeignKeyAction::Cascade {
            let _ = write!(out, "\n            .on_delete({})", action_expr(fk.on_delete));
        }
        if fk.on_update != ForeignKeyAction::Cascade {
            let _ = write!(out, "\n            .on_update({})", action_expr(fk.on_update));
        }
        out.push_str(";\n");
    }

    out.push_str(FOOTER);
    out
}

fn render_view(task: &str, database: &str, view: &ViewDef) -> String {
    let mut out = header(task, "", &[]);
    let _ = writeln!(
        out,
        "        ctx.db({})\n            .await?\n            .view({}, {}, &[])\n            .await?;",
        lit(database),
        lit(&view.name),
        lit(&view.sql)
    );
    out.push_str(FOOTER);
    out
}
