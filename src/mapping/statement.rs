use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;

use crate::cache::SharedCache;
use crate::driver::{KeyGenerator, NoKeyGenerator};
use crate::error::SqlMapperError;
use crate::reflection::Argument;
use crate::scripting::SqlTemplate;

use super::{BoundStatement, ParameterDescriptor};

/// What a statement does to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Select,
    Insert,
    Update,
    Delete,
}

/// How the statement is sent to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Plain,
    #[default]
    Prepared,
    /// Stored-procedure call; the only kind allowed to carry `OUT`/`INOUT` parameters.
    Callable,
}

/// A statement template plus everything the executors need to know about it.
pub struct MappedStatement {
    id: String,
    template: SqlTemplate,
    command: CommandKind,
    statement_kind: StatementKind,
    cache: Option<Arc<SharedCache>>,
    flush_cache_required: bool,
    use_cache: bool,
    key_generator: Arc<dyn KeyGenerator>,
    timeout: Option<Duration>,
    result_maps: Vec<String>,
}

impl fmt::Debug for MappedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedStatement")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("statement_kind", &self.statement_kind)
            .field("cache", &self.cache.as_ref().map(|c| c.id().to_string()))
            .field("flush_cache_required", &self.flush_cache_required)
            .field("use_cache", &self.use_cache)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl MappedStatement {
    /// Start a builder. Selects default to `use_cache = true, flush_cache = false`, everything
    /// else to the opposite.
    #[must_use]
    pub fn builder(
        id: impl Into<String>,
        template: SqlTemplate,
        command: CommandKind,
    ) -> MappedStatementBuilder {
        let is_select = command == CommandKind::Select;
        MappedStatementBuilder {
            inner: MappedStatement {
                id: id.into(),
                template,
                command,
                statement_kind: StatementKind::default(),
                cache: None,
                flush_cache_required: !is_select,
                use_cache: is_select,
                key_generator: Arc::new(NoKeyGenerator),
                timeout: None,
                result_maps: Vec::new(),
            },
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn template(&self) -> &SqlTemplate {
        &self.template
    }

    #[must_use]
    pub fn command(&self) -> CommandKind {
        self.command
    }

    #[must_use]
    pub fn statement_kind(&self) -> StatementKind {
        self.statement_kind
    }

    /// The namespace cache this statement reads through, if any.
    #[must_use]
    pub fn cache(&self) -> Option<&Arc<SharedCache>> {
        self.cache.as_ref()
    }

    #[must_use]
    pub fn flush_cache_required(&self) -> bool {
        self.flush_cache_required
    }

    #[must_use]
    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    #[must_use]
    pub fn key_generator(&self) -> &Arc<dyn KeyGenerator> {
        &self.key_generator
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub fn result_maps(&self) -> &[String] {
        &self.result_maps
    }

    /// Build the bound statement for one execution.
    ///
    /// # Errors
    ///
    /// Propagates template errors, and rejects output parameters on non-callable statements.
    pub fn bound_statement(&self, argument: &Argument) -> Result<BoundStatement, SqlMapperError> {
        let bound = self.template.bound_statement(argument)?;
        self.check_modes(bound.descriptors())?;
        Ok(bound)
    }

    fn check_modes(&self, descriptors: &[ParameterDescriptor]) -> Result<(), SqlMapperError> {
        if self.statement_kind == StatementKind::Callable {
            return Ok(());
        }
        match descriptors.iter().find(|d| d.mode().is_output()) {
            Some(d) => Err(SqlMapperError::config(format!(
                "Parameter '{}' of statement {} has mode {:?}, which is only allowed on callable statements",
                d.property().unwrap_or("<anonymous>"),
                self.id,
                d.mode()
            ))),
            None => Ok(()),
        }
    }
}

/// Fluent builder for [`MappedStatement`].
pub struct MappedStatementBuilder {
    inner: MappedStatement,
}

impl MappedStatementBuilder {
    #[must_use]
    pub fn statement_kind(mut self, kind: StatementKind) -> Self {
        self.inner.statement_kind = kind;
        self
    }

    #[must_use]
    pub fn cache(mut self, cache: Arc<SharedCache>) -> Self {
        self.inner.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn flush_cache(mut self, required: bool) -> Self {
        self.inner.flush_cache_required = required;
        self
    }

    #[must_use]
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.inner.use_cache = use_cache;
        self
    }

    #[must_use]
    pub fn key_generator(mut self, key_generator: Arc<dyn KeyGenerator>) -> Self {
        self.inner.key_generator = key_generator;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.inner.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn result_map(mut self, id: impl Into<String>) -> Self {
        self.inner.result_maps.push(id.into());
        self
    }

    /// Finish the statement. Static templates have their parameter modes checked here.
    ///
    /// # Errors
    ///
    /// Returns `SqlMapperError::ConfigError` if a non-callable statement declares an
    /// `OUT`/`INOUT` parameter.
    pub fn build(self) -> Result<MappedStatement, SqlMapperError> {
        if let SqlTemplate::Static(compiled) = &self.inner.template {
            self.inner.check_modes(&compiled.descriptors)?;
        }
        Ok(self.inner)
    }
}
