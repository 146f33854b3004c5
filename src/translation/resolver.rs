use std::collections::BTreeMap;

use clap::ValueEnum;

use crate::error::SqlMapperError;
use crate::mapping::ParameterDescriptor;
use crate::reflection::{Argument, PropertyAccess};
use crate::types::{DriverType, ParameterMode, TypeHandlerRegistry, ValueType};

use super::parsers::parse_placeholder;
use super::scanner::BIND_PLACEHOLDER;

const PARAMETER_PROPERTIES: &str =
    "javaType,jdbcType,mode,numericScale,resultMap,typeHandler,jdbcTypeName";

/// SQL text whose `#{…}` placeholders have been replaced by `?` markers.
#[derive(Debug, Clone)]
pub struct CompiledSql {
    pub sql: String,
    pub descriptors: Vec<ParameterDescriptor>,
}

/// Turns the content of one `#{…}` span into a [`ParameterDescriptor`].
pub struct PlaceholderResolver<'a> {
    registry: &'a TypeHandlerRegistry,
    parameter_type: &'a ValueType,
    bindings: &'a BTreeMap<String, Argument>,
}

impl<'a> PlaceholderResolver<'a> {
    /// `parameter_type` is the type of the whole argument; `bindings` the extra named values
    /// produced while building the text.
    #[must_use]
    pub fn new(
        registry: &'a TypeHandlerRegistry,
        parameter_type: &'a ValueType,
        bindings: &'a BTreeMap<String, Argument>,
    ) -> Self {
        Self {
            registry,
            parameter_type,
            bindings,
        }
    }

    /// Replace every `#{…}` in `sql` with `?`, collecting one descriptor per placeholder.
    ///
    /// # Errors
    ///
    /// Returns `SqlMapperError::ConfigError` for unparsable placeholders, unknown options,
    /// unresolvable option values, and expression-based placeholders.
    pub fn compile(&self, sql: &str) -> Result<CompiledSql, SqlMapperError> {
        let mut descriptors = Vec::new();
        let sql = BIND_PLACEHOLDER.scan(sql, |content| {
            descriptors.push(self.resolve(content)?);
            Ok("?".to_string())
        })?;
        Ok(CompiledSql { sql, descriptors })
    }

    /// Build the descriptor for one placeholder's content.
    ///
    /// # Errors
    ///
    /// See [`PlaceholderResolver::compile`].
    pub fn resolve(&self, content: &str) -> Result<ParameterDescriptor, SqlMapperError> {
        let options = parse_placeholder(content).map_err(|cause| {
            SqlMapperError::config(format!(
                "Parsing error was found in mapping #{{{content}}}.  Check syntax \
                 #{{property|(expression), var1=value1, var2=value2, ...}} ({cause})"
            ))
        })?;
        let property = options.get("property").map(str::to_string);
        let property_type = self.infer_type(property.as_deref(), options.get("jdbcType"));

        let mut builder = ParameterDescriptor::builder(property, property_type.clone());
        let mut value_type = property_type;
        let mut handler_alias = None;
        for (name, value) in options.iter() {
            builder = match name {
                "javaType" => {
                    value_type = ValueType::from_alias(value).ok_or_else(|| {
                        SqlMapperError::config(format!(
                            "Error resolving value type. Cause: unknown type alias '{value}'"
                        ))
                    })?;
                    builder.value_type(value_type.clone())
                }
                "jdbcType" => builder.driver_type(parse_enum::<DriverType>("jdbcType", value)?),
                "mode" => builder.mode(parse_enum::<ParameterMode>("mode", value)?),
                "numericScale" => builder.numeric_scale(value.parse().map_err(|_| {
                    SqlMapperError::config(format!("Invalid numericScale '{value}'"))
                })?),
                "resultMap" => builder.result_map_id(value),
                "typeHandler" => {
                    handler_alias = Some(value);
                    builder
                }
                "jdbcTypeName" => builder.driver_type_name(value),
                "property" => builder,
                "expression" => {
                    return Err(SqlMapperError::config(
                        "Expression based parameters are not supported yet",
                    ));
                }
                other => {
                    return Err(SqlMapperError::config(format!(
                        "An invalid property '{other}' was found in mapping #{{{content}}}.  \
                         Valid properties are {PARAMETER_PROPERTIES}"
                    )));
                }
            };
        }

        let handler = match handler_alias {
            Some(alias) => Some(self.registry.resolve(alias)?),
            None => self.registry.handler_for(&value_type),
        };
        if let Some(handler) = handler {
            builder = builder.type_handler(handler);
        }
        Ok(builder.build())
    }

    fn infer_type(&self, property: Option<&str>, driver_type: Option<&str>) -> ValueType {
        if let Some(name) = property
            && self.bindings.has_property(name)
        {
            return self
                .bindings
                .property_type(name)
                .unwrap_or(ValueType::Object);
        }
        if self.registry.has_handler_for(self.parameter_type) {
            return self.parameter_type.clone();
        }
        if driver_type.is_some_and(|t| t.eq_ignore_ascii_case("CURSOR")) {
            return ValueType::Cursor;
        }
        let Some(name) = property else {
            return ValueType::Object;
        };
        match self.parameter_type {
            ValueType::Map => ValueType::Object,
            ValueType::Record(record) => record.property_type(name).unwrap_or(ValueType::Object),
            _ => ValueType::Object,
        }
    }
}

fn parse_enum<T: ValueEnum>(option: &str, value: &str) -> Result<T, SqlMapperError> {
    T::from_str(value, true).map_err(|_| {
        SqlMapperError::config(format!("Could not resolve {option} value '{value}'"))
    })
}
