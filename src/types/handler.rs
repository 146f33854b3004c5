use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::SqlMapperError;
use crate::reflection::Argument;

use super::{DriverType, RowValues, ValueType};

/// Converts an argument value into the value handed to the driver.
pub trait TypeHandler: Send + Sync + fmt::Debug {
    /// Alias under which the handler is registered (`typeHandler=` option).
    fn name(&self) -> &str;

    /// Convert `value` for binding.
    ///
    /// # Errors
    ///
    /// Returns `SqlMapperError::ParameterError` when the value cannot be represented.
    fn to_driver(
        &self,
        value: &Argument,
        driver_type: Option<DriverType>,
    ) -> Result<RowValues, SqlMapperError>;
}

/// Binds scalar arguments as-is; composite arguments have no default representation.
#[derive(Debug)]
pub struct PassThroughHandler;

impl TypeHandler for PassThroughHandler {
    fn name(&self) -> &str {
        "default"
    }

    fn to_driver(
        &self,
        value: &Argument,
        driver_type: Option<DriverType>,
    ) -> Result<RowValues, SqlMapperError> {
        match value {
            Argument::Null => Ok(RowValues::Null),
            Argument::Value(v) => Ok(v.clone()),
            other => Err(SqlMapperError::ParameterError(format!(
                "no type handler can bind a value of type '{}' (driver type {})",
                other.value_type(),
                driver_type.map_or_else(|| "unset".to_string(), |t| t.to_string())
            ))),
        }
    }
}

/// Stores JSON, maps, lists and records as JSON text.
#[derive(Debug)]
pub struct JsonTextHandler;

impl TypeHandler for JsonTextHandler {
    fn name(&self) -> &str {
        "json"
    }

    fn to_driver(
        &self,
        value: &Argument,
        _driver_type: Option<DriverType>,
    ) -> Result<RowValues, SqlMapperError> {
        match value {
            Argument::Null => Ok(RowValues::Null),
            other => Ok(RowValues::Text(other.to_json().to_string())),
        }
    }
}

/// Stores booleans as `0`/`1` integers.
#[derive(Debug)]
pub struct BoolAsIntHandler;

impl TypeHandler for BoolAsIntHandler {
    fn name(&self) -> &str {
        "boolInt"
    }

    fn to_driver(
        &self,
        value: &Argument,
        driver_type: Option<DriverType>,
    ) -> Result<RowValues, SqlMapperError> {
        match value {
            Argument::Value(RowValues::Bool(b)) => Ok(RowValues::Int(i64::from(*b))),
            other => PassThroughHandler.to_driver(other, driver_type),
        }
    }
}

/// Stores timestamps as `YYYY-MM-DD HH:MM:SS.fff` text.
#[derive(Debug)]
pub struct TimestampTextHandler;

impl TypeHandler for TimestampTextHandler {
    fn name(&self) -> &str {
        "timestampText"
    }

    fn to_driver(
        &self,
        value: &Argument,
        driver_type: Option<DriverType>,
    ) -> Result<RowValues, SqlMapperError> {
        match value {
            Argument::Value(RowValues::Timestamp(dt)) => {
                Ok(RowValues::Text(dt.format("%F %T%.f").to_string()))
            }
            other => PassThroughHandler.to_driver(other, driver_type),
        }
    }
}

/// Named type handlers, plus handlers registered for whole record types.
#[derive(Debug, Clone)]
pub struct TypeHandlerRegistry {
    by_alias: HashMap<String, Arc<dyn TypeHandler>>,
    by_record_type: HashMap<String, Arc<dyn TypeHandler>>,
}

impl Default for TypeHandlerRegistry {
    fn default() -> Self {
        let mut registry = Self {
            by_alias: HashMap::new(),
            by_record_type: HashMap::new(),
        };
        registry.register(Arc::new(PassThroughHandler));
        registry.register(Arc::new(JsonTextHandler));
        registry.register(Arc::new(BoolAsIntHandler));
        registry.register(Arc::new(TimestampTextHandler));
        registry
    }
}

impl TypeHandlerRegistry {
    /// Register a handler under its own alias, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn TypeHandler>) {
        self.by_alias.insert(handler.name().to_string(), handler);
    }

    /// Register a handler that binds arguments of the named record type as a single value.
    pub fn register_for_record(&mut self, record_type: &str, handler: Arc<dyn TypeHandler>) {
        self.by_record_type.insert(record_type.to_string(), handler);
    }

    /// Look up a handler alias from a `typeHandler=` option.
    ///
    /// # Errors
    ///
    /// Returns `SqlMapperError::ConfigError` for unknown aliases.
    pub fn resolve(&self, alias: &str) -> Result<Arc<dyn TypeHandler>, SqlMapperError> {
        self.by_alias.get(alias).cloned().ok_or_else(|| {
            SqlMapperError::config(format!("Could not resolve type handler alias '{alias}'"))
        })
    }

    /// Whether values of `ty` bind as one value, i.e. a handler exists for the whole type.
    #[must_use]
    pub fn has_handler_for(&self, ty: &ValueType) -> bool {
        match ty {
            ValueType::Record(record) => self.by_record_type.contains_key(record.name()),
            other => other.is_simple(),
        }
    }

    /// The handler used for a value of `ty` when the placeholder named none.
    #[must_use]
    pub fn handler_for(&self, ty: &ValueType) -> Option<Arc<dyn TypeHandler>> {
        match ty {
            ValueType::Record(record) => self.by_record_type.get(record.name()).cloned(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_aliases_resolve() {
        let registry = TypeHandlerRegistry::default();
        assert_eq!(registry.resolve("json").unwrap().name(), "json");
        assert_eq!(registry.resolve("boolInt").unwrap().name(), "boolInt");
        assert!(matches!(
            registry.resolve("nope"),
            Err(SqlMapperError::ConfigError(_))
        ));
    }

    #[test]
    fn bool_as_int_converts() {
        let handler = BoolAsIntHandler;
        let out = handler
            .to_driver(&Argument::from(true), Some(DriverType::Integer))
            .unwrap();
        assert_eq!(out, RowValues::Int(1));
    }

    #[test]
    fn pass_through_rejects_composites() {
        let out = PassThroughHandler.to_driver(&Argument::List(vec![]), None);
        assert!(matches!(out, Err(SqlMapperError::ParameterError(_))));
    }
}
