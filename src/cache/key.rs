use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

use crate::reflection::Argument;
use crate::types::RowValues;

const DEFAULT_MULTIPLIER: i64 = 37;
const DEFAULT_HASHCODE: i64 = 17;

/// One component of a [`CacheKey`]. Floats compare by bit pattern; composite values by
/// their JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyComponent {
    Null,
    Int(i64),
    Float(u64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for KeyComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyComponent::Null => f.write_str("null"),
            KeyComponent::Int(i) => write!(f, "{i}"),
            KeyComponent::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            KeyComponent::Bool(b) => write!(f, "{b}"),
            KeyComponent::Text(s) => f.write_str(s),
            KeyComponent::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for KeyComponent {
    fn from(value: &str) -> Self {
        KeyComponent::Text(value.to_string())
    }
}

impl From<usize> for KeyComponent {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or(KeyComponent::Int(i64::MAX), KeyComponent::Int)
    }
}

impl From<&RowValues> for KeyComponent {
    fn from(value: &RowValues) -> Self {
        match value {
            RowValues::Null => KeyComponent::Null,
            RowValues::Int(i) => KeyComponent::Int(*i),
            RowValues::Float(f) => KeyComponent::Float(f.to_bits()),
            RowValues::Bool(b) => KeyComponent::Bool(*b),
            RowValues::Text(s) => KeyComponent::Text(s.clone()),
            RowValues::Timestamp(dt) => KeyComponent::Text(dt.format("%F %T%.f").to_string()),
            RowValues::JSON(json) => KeyComponent::Text(json.to_string()),
            RowValues::Blob(bytes) => KeyComponent::Bytes(bytes.clone()),
        }
    }
}

impl From<&Argument> for KeyComponent {
    fn from(value: &Argument) -> Self {
        match value {
            Argument::Null => KeyComponent::Null,
            Argument::Value(v) => KeyComponent::from(v),
            other => KeyComponent::Text(other.to_json().to_string()),
        }
    }
}

/// Order-sensitive fingerprint of a query: statement id, row bounds, SQL, parameter values and
/// environment id.
///
/// Equality compares the rolling hash, the checksum and the component count before the
/// components themselves.
#[derive(Debug, Clone)]
pub struct CacheKey {
    hashcode: i64,
    checksum: i64,
    count: usize,
    components: Vec<KeyComponent>,
}

impl Default for CacheKey {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheKey {
    #[must_use]
    pub fn new() -> Self {
        Self {
            hashcode: DEFAULT_HASHCODE,
            checksum: 0,
            count: 0,
            components: Vec::new(),
        }
    }

    pub fn update(&mut self, component: impl Into<KeyComponent>) {
        let component = component.into();
        let mut hasher = DefaultHasher::new();
        component.hash(&mut hasher);
        let base = hasher.finish() as i64;

        self.count += 1;
        self.checksum = self.checksum.wrapping_add(base);
        let weighted = base.wrapping_mul(self.count as i64);
        self.hashcode = DEFAULT_MULTIPLIER
            .wrapping_mul(self.hashcode)
            .wrapping_add(weighted);
        self.components.push(component);
    }

    #[must_use]
    pub fn update_count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn components(&self) -> &[KeyComponent] {
        &self.components
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hashcode == other.hashcode
            && self.checksum == other.checksum
            && self.count == other.count
            && self.components == other.components
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i64(self.hashcode);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hashcode, self.checksum)?;
        for component in &self.components {
            write!(f, ":{component}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str, value: &Argument) -> CacheKey {
        let mut key = CacheKey::new();
        key.update(id);
        key.update(0usize);
        key.update(usize::MAX);
        key.update("select * from t where id = ?");
        key.update(value);
        key
    }

    #[test]
    fn identical_inputs_give_equal_keys() {
        let a = key("users.byId", &Argument::from(1));
        let b = key("users.byId", &Argument::from(1));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn any_component_changes_the_key() {
        let base = key("users.byId", &Argument::from(1));
        assert_ne!(base, key("users.byId", &Argument::from(2)));
        assert_ne!(base, key("users.other", &Argument::from(1)));
        assert_ne!(base, key("users.byId", &Argument::from("1")));
    }

    #[test]
    fn order_matters() {
        let mut a = CacheKey::new();
        a.update("x");
        a.update("y");
        let mut b = CacheKey::new();
        b.update("y");
        b.update("x");
        assert_ne!(a, b);
    }
}
