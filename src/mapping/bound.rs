use std::collections::BTreeMap;

use crate::error::SqlMapperError;
use crate::reflection::{Argument, PropertyAccess, PropertyPath};
use crate::types::handler::PassThroughHandler;
use crate::types::{ParameterMode, RowValues, TypeHandler, TypeHandlerRegistry};

use super::ParameterDescriptor;

/// SQL ready for the driver: `?` markers only, one descriptor per marker, in order.
#[derive(Debug, Clone)]
pub struct BoundStatement {
    sql: String,
    descriptors: Vec<ParameterDescriptor>,
    additional: BTreeMap<String, Argument>,
    argument: Argument,
}

impl BoundStatement {
    #[must_use]
    pub fn new(sql: String, descriptors: Vec<ParameterDescriptor>, argument: Argument) -> Self {
        Self {
            sql,
            descriptors,
            additional: BTreeMap::new(),
            argument,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn descriptors(&self) -> &[ParameterDescriptor] {
        &self.descriptors
    }

    #[must_use]
    pub fn argument(&self) -> &Argument {
        &self.argument
    }

    #[must_use]
    pub fn additional_parameters(&self) -> &BTreeMap<String, Argument> {
        &self.additional
    }

    pub fn set_additional_parameter(&mut self, name: impl Into<String>, value: Argument) {
        self.additional.insert(name.into(), value);
    }

    /// Whether an extra binding exists for the root segment of `path`.
    #[must_use]
    pub fn has_additional_parameter(&self, path: &str) -> bool {
        self.additional
            .contains_key(PropertyPath::parse(path).name())
    }

    /// The runtime value feeding `descriptor`, before type conversion.
    ///
    /// # Errors
    ///
    /// Returns `SqlMapperError::ParameterError` if the property cannot be read from the argument.
    pub fn value_of(
        &self,
        descriptor: &ParameterDescriptor,
        registry: &TypeHandlerRegistry,
    ) -> Result<Argument, SqlMapperError> {
        let Some(property) = descriptor.property() else {
            return Ok(self.argument.clone());
        };
        if self.has_additional_parameter(property) {
            return Ok(self
                .additional
                .property_value(property)
                .cloned()
                .unwrap_or_default());
        }
        if self.argument.is_null() {
            return Ok(Argument::Null);
        }
        if registry.has_handler_for(&self.argument.value_type()) {
            return Ok(self.argument.clone());
        }
        match self.argument.property_value(property) {
            Some(value) => Ok(value.clone()),
            None if matches!(self.argument, Argument::Map(_)) => Ok(Argument::Null),
            None => Err(SqlMapperError::ParameterError(format!(
                "There is no getter for property named '{property}' in '{}'",
                self.argument.value_type()
            ))),
        }
    }

    /// Positional values for the driver, one per `?` marker. `OUT` slots bind as NULL.
    ///
    /// # Errors
    ///
    /// Returns `SqlMapperError::ParameterError` when a value cannot be read or converted.
    pub fn parameter_values(
        &self,
        registry: &TypeHandlerRegistry,
    ) -> Result<Vec<RowValues>, SqlMapperError> {
        let mut values = Vec::with_capacity(self.descriptors.len());
        for descriptor in &self.descriptors {
            if descriptor.mode() == ParameterMode::Out {
                values.push(RowValues::Null);
                continue;
            }
            let value = self.value_of(descriptor, registry)?;
            let converted = match descriptor.type_handler() {
                Some(handler) => handler.to_driver(&value, descriptor.driver_type()),
                None => PassThroughHandler.to_driver(&value, descriptor.driver_type()),
            }
            .map_err(|e| match e {
                SqlMapperError::ParameterError(msg) => SqlMapperError::ParameterError(format!(
                    "Could not set parameter '{}': {msg}",
                    descriptor.property().unwrap_or("<anonymous>")
                )),
                other => other,
            })?;
            values.push(converted);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::{Record, RecordType};
    use crate::types::ValueType;

    fn descriptor(property: &str) -> ParameterDescriptor {
        ParameterDescriptor::builder(Some(property.to_string()), ValueType::Object).build()
    }

    #[test]
    fn values_come_from_argument_properties() {
        let arg = Argument::map([("id", Argument::from(4)), ("name", Argument::from("x"))]);
        let bound = BoundStatement::new(
            "select ? , ?".into(),
            vec![descriptor("name"), descriptor("id")],
            arg,
        );
        let values = bound
            .parameter_values(&TypeHandlerRegistry::default())
            .unwrap();
        assert_eq!(values, vec![RowValues::Text("x".into()), RowValues::Int(4)]);
    }

    #[test]
    fn additional_bindings_win() {
        let mut bound = BoundStatement::new(
            "?".into(),
            vec![descriptor("item.code")],
            Argument::map([("item", Argument::from("ignored"))]),
        );
        bound.set_additional_parameter("item", Argument::map([("code", Argument::from("z"))]));
        let values = bound
            .parameter_values(&TypeHandlerRegistry::default())
            .unwrap();
        assert_eq!(values, vec![RowValues::Text("z".into())]);
    }

    #[test]
    fn simple_argument_binds_itself() {
        let bound = BoundStatement::new("?".into(), vec![descriptor("whatever")], Argument::from(9));
        let values = bound
            .parameter_values(&TypeHandlerRegistry::default())
            .unwrap();
        assert_eq!(values, vec![RowValues::Int(9)]);
    }

    #[test]
    fn missing_record_property_is_an_error() {
        let ty = RecordType::new("User", [("id", ValueType::Int)]);
        let bound = BoundStatement::new(
            "?".into(),
            vec![descriptor("email")],
            Argument::from(Record::new(&ty).with("id", 1)),
        );
        let err = bound
            .parameter_values(&TypeHandlerRegistry::default())
            .unwrap_err();
        assert!(matches!(err, SqlMapperError::ParameterError(_)));
    }
}
