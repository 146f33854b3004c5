use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::types::{RowValues, ValueType};

use super::property::{PropertyPath, segments};

static NULL_ARGUMENT: Argument = Argument::Null;

/// The caller-supplied argument of a statement.
///
/// ```rust
/// use sql_mapper::prelude::*;
///
/// let arg = Argument::map([("id", Argument::from(7)), ("name", Argument::from("ann"))]);
/// assert_eq!(arg.property_value("id"), Some(&Argument::from(7)));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Argument {
    #[default]
    Null,
    /// A primitive-like value.
    Value(RowValues),
    List(Vec<Argument>),
    /// Generic key-value bag.
    Map(BTreeMap<String, Argument>),
    /// A value of a declared record type.
    Record(Record),
}

impl Argument {
    /// Build a map argument from key/value pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Argument)>,
    {
        Argument::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Argument::Null | Argument::Value(RowValues::Null))
    }

    /// Null or a single scalar value.
    #[must_use]
    pub fn is_simple(&self) -> bool {
        matches!(self, Argument::Null | Argument::Value(_))
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&RowValues> {
        match self {
            Argument::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Runtime type of this argument.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Argument::Null => ValueType::Object,
            Argument::Value(v) => v.value_type(),
            Argument::List(_) => ValueType::List,
            Argument::Map(_) => ValueType::Map,
            Argument::Record(r) => ValueType::Record(Arc::clone(&r.ty)),
        }
    }

    /// Direct child by property name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Argument> {
        match self {
            Argument::Map(entries) => entries.get(name),
            Argument::Record(record) => record.field(name),
            _ => None,
        }
    }

    fn index(&self, index: &str) -> Option<&Argument> {
        match self {
            Argument::List(items) => index.trim().parse::<usize>().ok().and_then(|i| items.get(i)),
            Argument::Map(entries) => entries.get(index),
            _ => None,
        }
    }

    fn step(&self, path: &PropertyPath<'_>) -> Option<&Argument> {
        let base = if path.name().is_empty() {
            self
        } else {
            self.get(path.name())?
        };
        match path.index() {
            Some(index) => base.index(index),
            None => Some(base),
        }
    }

    /// Elements of a collection argument paired with their index (list position or map key).
    #[must_use]
    pub fn elements(&self) -> Option<Vec<(Argument, &Argument)>> {
        match self {
            Argument::List(items) => Some(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| (Argument::from(i as i64), item))
                    .collect(),
            ),
            Argument::Map(entries) => Some(
                entries
                    .iter()
                    .map(|(k, v)| (Argument::from(k.as_str()), v))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// JSON rendering, used by the JSON type handler and for diagnostics.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Argument::Null => JsonValue::Null,
            Argument::Value(v) => row_value_to_json(v),
            Argument::List(items) => JsonValue::Array(items.iter().map(Argument::to_json).collect()),
            Argument::Map(entries) => JsonValue::Object(
                entries.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Argument::Record(record) => JsonValue::Object(
                record
                    .fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn row_value_to_json(value: &RowValues) -> JsonValue {
    match value {
        RowValues::Int(i) => JsonValue::from(*i),
        RowValues::Float(f) => serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
        RowValues::Text(s) => JsonValue::String(s.clone()),
        RowValues::Bool(b) => JsonValue::Bool(*b),
        RowValues::Timestamp(dt) => JsonValue::String(dt.format("%F %T%.f").to_string()),
        RowValues::Null => JsonValue::Null,
        RowValues::JSON(json) => json.clone(),
        RowValues::Blob(bytes) => JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect()),
    }
}

impl From<RowValues> for Argument {
    fn from(value: RowValues) -> Self {
        Argument::Value(value)
    }
}

impl From<i64> for Argument {
    fn from(value: i64) -> Self {
        Argument::Value(RowValues::Int(value))
    }
}

impl From<i32> for Argument {
    fn from(value: i32) -> Self {
        Argument::Value(RowValues::Int(i64::from(value)))
    }
}

impl From<f64> for Argument {
    fn from(value: f64) -> Self {
        Argument::Value(RowValues::Float(value))
    }
}

impl From<bool> for Argument {
    fn from(value: bool) -> Self {
        Argument::Value(RowValues::Bool(value))
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::Value(RowValues::Text(value.to_string()))
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::Value(RowValues::Text(value))
    }
}

impl From<NaiveDateTime> for Argument {
    fn from(value: NaiveDateTime) -> Self {
        Argument::Value(RowValues::Timestamp(value))
    }
}

impl From<Record> for Argument {
    fn from(value: Record) -> Self {
        Argument::Record(value)
    }
}

impl<T: Into<Argument>> From<Vec<T>> for Argument {
    fn from(values: Vec<T>) -> Self {
        Argument::List(values.into_iter().map(Into::into).collect())
    }
}

/// A named record shape with declared property types.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordType {
    name: String,
    properties: Vec<(String, ValueType)>,
}

impl RecordType {
    pub fn new<N, I, P>(name: N, properties: I) -> Arc<Self>
    where
        N: Into<String>,
        P: Into<String>,
        I: IntoIterator<Item = (P, ValueType)>,
    {
        Arc::new(Self {
            name: name.into(),
            properties: properties
                .into_iter()
                .map(|(p, ty)| (p.into(), ty))
                .collect(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn declared(&self, property: &str) -> Option<&ValueType> {
        self.properties
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, ty)| ty)
    }

    /// Declared type at the end of `path`, following nested record types.
    #[must_use]
    pub fn property_type(&self, path: &str) -> Option<ValueType> {
        let step = PropertyPath::parse(path);
        let declared = self.declared(step.name())?;
        let ty = if step.index().is_some() {
            ValueType::Object
        } else {
            declared.clone()
        };
        match (step.children(), &ty) {
            (None, _) => Some(ty),
            (Some(children), ValueType::Record(nested)) => nested.property_type(children),
            (Some(_), _) => None,
        }
    }
}

/// An instance of a [`RecordType`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    ty: Arc<RecordType>,
    fields: BTreeMap<String, Argument>,
}

impl Record {
    #[must_use]
    pub fn new(ty: &Arc<RecordType>) -> Self {
        Self {
            ty: Arc::clone(ty),
            fields: BTreeMap::new(),
        }
    }

    /// Set a field value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Argument>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }

    /// A declared but unset property reads as null.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Argument> {
        self.fields.get(name).or_else(|| {
            self.ty
                .declared(name)
                .map(|_| &NULL_ARGUMENT)
        })
    }
}

/// Property-value resolver: runtime values and types by property path.
pub trait PropertyAccess {
    fn property_value(&self, path: &str) -> Option<&Argument>;

    fn property_type(&self, path: &str) -> Option<ValueType>;

    fn has_property(&self, path: &str) -> bool {
        self.property_value(path).is_some()
    }
}

impl PropertyAccess for Argument {
    fn property_value(&self, path: &str) -> Option<&Argument> {
        segments(path).try_fold(self, |current, step| current.step(&step))
    }

    fn property_type(&self, path: &str) -> Option<ValueType> {
        if let Argument::Record(record) = self
            && let Some(ty) = record.ty.property_type(path)
        {
            return Some(ty);
        }
        self.property_value(path).map(Argument::value_type)
    }
}

/// Named bindings (the extra-bindings object) resolve the first path step by key.
impl PropertyAccess for BTreeMap<String, Argument> {
    fn property_value(&self, path: &str) -> Option<&Argument> {
        let first = PropertyPath::parse(path);
        let mut current = self.get(first.name())?;
        if let Some(index) = first.index() {
            current = current.index(index)?;
        }
        match first.children() {
            Some(rest) => current.property_value(rest),
            None => Some(current),
        }
    }

    fn property_type(&self, path: &str) -> Option<ValueType> {
        let first = PropertyPath::parse(path);
        let root = self.get(first.name())?;
        match (first.index(), first.children()) {
            (None, Some(rest)) => root.property_type(rest),
            _ => self.property_value(path).map(Argument::value_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_type() -> Arc<RecordType> {
        let address = RecordType::new("Address", [("city", ValueType::Text)]);
        RecordType::new(
            "User",
            [
                ("id", ValueType::Int),
                ("name", ValueType::Text),
                ("address", ValueType::Record(address)),
                ("tags", ValueType::List),
            ],
        )
    }

    #[test]
    fn resolves_nested_and_indexed_values() {
        let ty = user_type();
        let arg = Argument::from(
            Record::new(&ty)
                .with("id", 3)
                .with("tags", vec!["a", "b"]),
        );
        assert_eq!(arg.property_value("id"), Some(&Argument::from(3)));
        assert_eq!(arg.property_value("tags[1]"), Some(&Argument::from("b")));
        assert_eq!(arg.property_value("name"), Some(&Argument::Null));
        assert_eq!(arg.property_value("missing"), None);
    }

    #[test]
    fn declared_types_follow_nested_records() {
        let ty = user_type();
        assert_eq!(ty.property_type("address.city"), Some(ValueType::Text));
        assert_eq!(ty.property_type("tags[0]"), Some(ValueType::Object));
        assert_eq!(ty.property_type("nope"), None);
    }

    #[test]
    fn bindings_resolve_first_segment_by_key() {
        let mut bindings = BTreeMap::new();
        bindings.insert(
            "item".to_string(),
            Argument::map([("code", Argument::from("x"))]),
        );
        assert!(bindings.has_property("item.code"));
        assert_eq!(bindings.property_type("item.code"), Some(ValueType::Text));
        assert!(!bindings.has_property("other"));
    }
}
