use std::sync::Arc;

use crate::types::{DriverType, ParameterMode, TypeHandler, ValueType};

/// One compiled `#{…}` placeholder.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    property: Option<String>,
    value_type: ValueType,
    driver_type: Option<DriverType>,
    driver_type_name: Option<String>,
    type_handler: Option<Arc<dyn TypeHandler>>,
    mode: ParameterMode,
    numeric_scale: Option<u32>,
    result_map_id: Option<String>,
}

impl ParameterDescriptor {
    #[must_use]
    pub fn builder(property: Option<String>, value_type: ValueType) -> ParameterDescriptorBuilder {
        ParameterDescriptorBuilder {
            inner: ParameterDescriptor {
                property,
                value_type,
                driver_type: None,
                driver_type_name: None,
                type_handler: None,
                mode: ParameterMode::In,
                numeric_scale: None,
                result_map_id: None,
            },
        }
    }

    #[must_use]
    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }

    #[must_use]
    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    #[must_use]
    pub fn driver_type(&self) -> Option<DriverType> {
        self.driver_type
    }

    #[must_use]
    pub fn driver_type_name(&self) -> Option<&str> {
        self.driver_type_name.as_deref()
    }

    #[must_use]
    pub fn type_handler(&self) -> Option<&Arc<dyn TypeHandler>> {
        self.type_handler.as_ref()
    }

    #[must_use]
    pub fn mode(&self) -> ParameterMode {
        self.mode
    }

    #[must_use]
    pub fn numeric_scale(&self) -> Option<u32> {
        self.numeric_scale
    }

    #[must_use]
    pub fn result_map_id(&self) -> Option<&str> {
        self.result_map_id.as_deref()
    }
}

/// Fluent builder for [`ParameterDescriptor`].
#[derive(Debug, Clone)]
pub struct ParameterDescriptorBuilder {
    inner: ParameterDescriptor,
}

impl ParameterDescriptorBuilder {
    #[must_use]
    pub fn value_type(mut self, value_type: ValueType) -> Self {
        self.inner.value_type = value_type;
        self
    }

    #[must_use]
    pub fn driver_type(mut self, driver_type: DriverType) -> Self {
        self.inner.driver_type = Some(driver_type);
        self
    }

    #[must_use]
    pub fn driver_type_name(mut self, name: impl Into<String>) -> Self {
        self.inner.driver_type_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn type_handler(mut self, handler: Arc<dyn TypeHandler>) -> Self {
        self.inner.type_handler = Some(handler);
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: ParameterMode) -> Self {
        self.inner.mode = mode;
        self
    }

    #[must_use]
    pub fn numeric_scale(mut self, scale: u32) -> Self {
        self.inner.numeric_scale = Some(scale);
        self
    }

    #[must_use]
    pub fn result_map_id(mut self, id: impl Into<String>) -> Self {
        self.inner.result_map_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn build(self) -> ParameterDescriptor {
        self.inner
    }
}
