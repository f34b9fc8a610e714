//! Sequence builder.

use crate::schema::{SchemaSnapshot, SequenceDef};

/// Edits one sequence in the desired schema.
///
/// Only dialects with native sequences emit statements for them; on the
/// others the definition is tracked but never executed.
pub struct SequenceBuilder<'a> {
    schema: &'a mut SchemaSnapshot,
    name: String,
}

impl<'a> SequenceBuilder<'a> {
    pub(crate) fn new(schema: &'a mut SchemaSnapshot, name: &str) -> Self {
        schema.sequences.entry(name.to_string()).or_default();
        Self {
            schema,
            name: name.to_string(),
        }
    }

    fn def_mut(&mut self) -> &mut SequenceDef {
        self.schema.sequences.entry(self.name.clone()).or_default()
    }

    /// Returns the sequence name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the sequence definition.
    #[must_use]
    pub fn def(&self) -> Option<&SequenceDef> {
        self.schema.sequences.get(&self.name)
    }

    /// Sets the first value.
    pub fn start(&mut self, start: i64) -> &mut Self {
        self.def_mut().start = start;
        self
    }

    /// Sets the increment.
    pub fn step(&mut self, step: i64) -> &mut Self {
        self.def_mut().step = step;
        self
    }

    /// Sets the number of preallocated values, `None` for the default.
    pub fn cache(&mut self, cache: Option<u32>) -> &mut Self {
        self.def_mut().cache = cache;
        self
    }

    /// Ties the sequence to a table column (`table.column`).
    pub fn owned_by(&mut self, owner: Option<&str>) -> &mut Self {
        self.def_mut().owner = owner.map(str::to_string);
        self
    }
}

impl std::fmt::Debug for SequenceBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceBuilder")
            .field("name", &self.name)
            .field("def", &self.def())
            .finish()
    }
}
