use std::collections::BTreeMap;

use crate::reflection::{Argument, PropertyAccess, PropertyPath};

/// Binding holding the caller's whole argument.
pub const PARAMETER_BINDING: &str = "_parameter";
/// Binding holding the configured database id, or null.
pub const DATABASE_ID_BINDING: &str = "_databaseId";

/// State threaded through one evaluation of a dynamic segment tree: the named bindings and
/// the SQL fragments produced so far.
#[derive(Debug, Clone)]
pub struct DynamicContext {
    bindings: BTreeMap<String, Argument>,
    fragments: Vec<String>,
    unique_number: usize,
}

impl DynamicContext {
    #[must_use]
    pub fn new(argument: &Argument, database_id: Option<&str>) -> Self {
        let mut bindings = BTreeMap::new();
        bindings.insert(PARAMETER_BINDING.to_string(), argument.clone());
        bindings.insert(
            DATABASE_ID_BINDING.to_string(),
            database_id.map_or(Argument::Null, Argument::from),
        );
        Self {
            bindings,
            fragments: Vec::new(),
            unique_number: 0,
        }
    }

    #[must_use]
    pub fn bindings(&self) -> &BTreeMap<String, Argument> {
        &self.bindings
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Argument) {
        self.bindings.insert(name.into(), value);
    }

    pub(crate) fn unbind(&mut self, name: &str) {
        self.bindings.remove(name);
    }

    /// The caller's argument.
    #[must_use]
    pub fn parameter(&self) -> &Argument {
        self.bindings
            .get(PARAMETER_BINDING)
            .unwrap_or(&Argument::Null)
    }

    /// Resolve a path: a binding when the first segment names one, else a property of the
    /// caller's argument.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&Argument> {
        lookup(&self.bindings, path)
    }

    pub fn append_sql(&mut self, sql: impl Into<String>) {
        self.fragments.push(sql.into());
    }

    /// Fragments appended so far, space-joined.
    #[must_use]
    pub fn sql(&self) -> String {
        self.fragments.join(" ")
    }

    /// Marks the current output position, for [`DynamicContext::take_since`].
    pub(crate) fn mark(&self) -> usize {
        self.fragments.len()
    }

    /// Remove and return everything appended since `mark`.
    pub(crate) fn take_since(&mut self, mark: usize) -> String {
        let taken: Vec<String> = self.fragments.drain(mark..).collect();
        taken.join(" ")
    }

    /// A number unique within this evaluation, used to name iteration bindings.
    pub fn next_unique_number(&mut self) -> usize {
        let n = self.unique_number;
        self.unique_number += 1;
        n
    }

    #[must_use]
    pub fn into_parts(self) -> (String, BTreeMap<String, Argument>) {
        let sql = self.fragments.join(" ");
        (sql, self.bindings)
    }
}

pub(crate) fn lookup<'a>(bindings: &'a BTreeMap<String, Argument>, path: &str) -> Option<&'a Argument> {
    let root = PropertyPath::parse(path);
    if bindings.contains_key(root.name()) {
        return bindings.property_value(path);
    }
    match bindings.get(PARAMETER_BINDING) {
        Some(parameter) if !parameter.is_simple() => parameter.property_value(path),
        _ => None,
    }
}
