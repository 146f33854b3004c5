//! Statement templates: the static/dynamic split and the dynamic segment tree.

mod context;
pub mod expr;
mod node;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::Configuration;
use crate::error::SqlMapperError;
use crate::mapping::BoundStatement;
use crate::reflection::Argument;
use crate::translation::{CompiledSql, PlaceholderResolver};
use crate::types::{TypeHandlerRegistry, ValueType};

pub use context::{DATABASE_ID_BINDING, DynamicContext, PARAMETER_BINDING};
pub use node::{ForeachNode, SqlNode, TextNode, TrimNode};

/// A statement's SQL source.
///
/// ```rust
/// use sql_mapper::prelude::*;
///
/// let config = Configuration::builder().build()?;
/// let template = SqlTemplate::from_sql(&config, "select * from t where id = #{id}", &ValueType::Map)?;
/// let bound = template.bound_statement(&Argument::map([("id", Argument::from(1))]))?;
/// assert_eq!(bound.sql(), "select * from t where id = ?");
/// # Ok::<(), SqlMapperError>(())
/// ```
#[derive(Clone)]
pub enum SqlTemplate {
    /// Placeholders resolved once; every execution reuses the same SQL and descriptors.
    Static(CompiledSql),
    /// Re-evaluated against each argument.
    Dynamic(DynamicTemplate),
}

/// The per-execution side of [`SqlTemplate::Dynamic`].
#[derive(Clone)]
pub struct DynamicTemplate {
    root: SqlNode,
    type_handlers: Arc<TypeHandlerRegistry>,
    database_id: Option<String>,
}

impl fmt::Debug for SqlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlTemplate::Static(compiled) => f.debug_tuple("Static").field(&compiled.sql).finish(),
            SqlTemplate::Dynamic(template) => f.debug_tuple("Dynamic").field(&template.root).finish(),
        }
    }
}

impl SqlTemplate {
    /// Classify `root` and, for static trees, compile it now against `parameter_type`.
    ///
    /// # Errors
    ///
    /// Returns placeholder configuration errors for static trees.
    pub fn new(
        config: &Configuration,
        root: SqlNode,
        parameter_type: &ValueType,
    ) -> Result<Self, SqlMapperError> {
        if root.is_dynamic() {
            return Ok(SqlTemplate::Dynamic(DynamicTemplate {
                root,
                type_handlers: Arc::clone(config.type_handlers()),
                database_id: config.database_id().map(str::to_string),
            }));
        }
        let mut context = DynamicContext::new(&Argument::Null, config.database_id());
        root.apply(&mut context)?;
        let (sql, _) = context.into_parts();
        let bindings = BTreeMap::new();
        let compiled = PlaceholderResolver::new(config.type_handlers(), parameter_type, &bindings)
            .compile(&sql)?;
        Ok(SqlTemplate::Static(compiled))
    }

    /// Template from plain SQL text.
    ///
    /// # Errors
    ///
    /// See [`SqlTemplate::new`].
    pub fn from_sql(
        config: &Configuration,
        sql: &str,
        parameter_type: &ValueType,
    ) -> Result<Self, SqlMapperError> {
        Self::new(config, SqlNode::text(sql), parameter_type)
    }

    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        matches!(self, SqlTemplate::Dynamic(_))
    }

    /// Produce the bound statement for `argument`.
    ///
    /// # Errors
    ///
    /// Dynamic templates propagate segment evaluation, validation and placeholder errors.
    pub fn bound_statement(&self, argument: &Argument) -> Result<BoundStatement, SqlMapperError> {
        match self {
            SqlTemplate::Static(compiled) => Ok(BoundStatement::new(
                compiled.sql.clone(),
                compiled.descriptors.clone(),
                argument.clone(),
            )),
            SqlTemplate::Dynamic(template) => template.bound_statement(argument),
        }
    }
}

impl DynamicTemplate {
    fn bound_statement(&self, argument: &Argument) -> Result<BoundStatement, SqlMapperError> {
        let mut context = DynamicContext::new(argument, self.database_id.as_deref());
        self.root.apply(&mut context)?;
        let (sql, bindings) = context.into_parts();
        let parameter_type = argument.value_type();
        let compiled = PlaceholderResolver::new(&self.type_handlers, &parameter_type, &bindings)
            .compile(&sql)?;
        let mut bound = BoundStatement::new(compiled.sql, compiled.descriptors, argument.clone());
        for (name, value) in bindings {
            bound.set_additional_parameter(name, value);
        }
        Ok(bound)
    }
}
