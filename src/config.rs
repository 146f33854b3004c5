//! Configuration: settings, type handlers, namespace caches and mapped statements.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;

use crate::cache::{CacheBuilder, SharedCache};
use crate::driver::Transaction;
use crate::error::SqlMapperError;
use crate::executor::{
    BaseExecutor, BatchStrategy, CachingExecutor, Executor, ReuseStrategy, SimpleStrategy,
};
use crate::mapping::MappedStatement;
use crate::session::SqlSession;
use crate::types::{TypeHandler, TypeHandlerRegistry};

/// Execution strategy of a session's executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorType {
    /// Prepare, execute and close every statement.
    #[default]
    Simple,
    /// Keep one prepared statement per SQL text open for the session.
    Reuse,
    /// Buffer updates and send them in batches.
    Batch,
}

/// Lifetime of the first-level cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalCacheScope {
    #[default]
    Session,
    /// Cleared after every query.
    Statement,
}

/// Eviction policy of a namespace cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    #[default]
    Lru,
    Fifo,
}

/// Settings of one namespace cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub eviction: EvictionPolicy,
    pub size: usize,
    pub flush_interval_ms: Option<u64>,
    pub read_only: bool,
}

impl CacheSettings {
    pub const DEFAULT_SIZE: usize = 1024;
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            eviction: EvictionPolicy::default(),
            size: Self::DEFAULT_SIZE,
            flush_interval_ms: None,
            read_only: false,
        }
    }
}

/// Serializable form of a [`Configuration`].
///
/// ```rust
/// use sql_mapper::prelude::*;
///
/// let settings = Settings::from_json_str(r#"{
///     "default_executor_type": "batch",
///     "caches": { "users": { "eviction": "fifo", "size": 64 } }
/// }"#)?;
/// assert_eq!(settings.default_executor_type, ExecutorType::Batch);
/// assert!(settings.cache_enabled);
/// # Ok::<(), SqlMapperError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache_enabled: bool,
    pub default_executor_type: ExecutorType,
    pub local_cache_scope: LocalCacheScope,
    pub default_statement_timeout_secs: Option<u64>,
    pub environment_id: Option<String>,
    pub database_id: Option<String>,
    pub caches: BTreeMap<String, CacheSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            default_executor_type: ExecutorType::default(),
            local_cache_scope: LocalCacheScope::default(),
            default_statement_timeout_secs: None,
            environment_id: None,
            database_id: None,
            caches: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Parse settings from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `SqlMapperError::ConfigError` for malformed JSON or unknown enum values.
    pub fn from_json_str(json: &str) -> Result<Self, SqlMapperError> {
        serde_json::from_str(json)
            .map_err(|e| SqlMapperError::config(format!("Invalid settings: {e}")))
    }
}

/// Registry of everything sessions share.
#[derive(Debug)]
pub struct Configuration {
    environment_id: Option<String>,
    database_id: Option<String>,
    cache_enabled: bool,
    default_executor_type: ExecutorType,
    local_cache_scope: LocalCacheScope,
    default_statement_timeout: Option<Duration>,
    type_handlers: Arc<TypeHandlerRegistry>,
    caches: HashMap<String, Arc<SharedCache>>,
    statements: HashMap<String, Arc<MappedStatement>>,
}

impl Configuration {
    #[must_use]
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    /// Build from deserialized settings, creating the declared namespace caches.
    ///
    /// # Errors
    ///
    /// Returns `SqlMapperError::ConfigError` if a cache cannot be built.
    pub fn from_settings(settings: &Settings) -> Result<Self, SqlMapperError> {
        let mut builder = ConfigurationBuilder::new()
            .cache_enabled(settings.cache_enabled)
            .default_executor_type(settings.default_executor_type)
            .local_cache_scope(settings.local_cache_scope);
        if let Some(secs) = settings.default_statement_timeout_secs {
            builder = builder.default_statement_timeout(Duration::from_secs(secs));
        }
        if let Some(id) = &settings.environment_id {
            builder = builder.environment_id(id.clone());
        }
        if let Some(id) = &settings.database_id {
            builder = builder.database_id(id.clone());
        }
        for (id, cache) in &settings.caches {
            builder = builder.cache(id.clone(), cache.clone());
        }
        builder.build()
    }

    #[must_use]
    pub fn environment_id(&self) -> Option<&str> {
        self.environment_id.as_deref()
    }

    #[must_use]
    pub fn database_id(&self) -> Option<&str> {
        self.database_id.as_deref()
    }

    #[must_use]
    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    #[must_use]
    pub fn default_executor_type(&self) -> ExecutorType {
        self.default_executor_type
    }

    #[must_use]
    pub fn local_cache_scope(&self) -> LocalCacheScope {
        self.local_cache_scope
    }

    #[must_use]
    pub fn default_statement_timeout(&self) -> Option<Duration> {
        self.default_statement_timeout
    }

    #[must_use]
    pub fn type_handlers(&self) -> &Arc<TypeHandlerRegistry> {
        &self.type_handlers
    }

    /// Register a namespace cache built elsewhere, replacing one with the same id.
    pub fn add_cache(&mut self, cache: Arc<SharedCache>) {
        self.caches.insert(cache.id().to_string(), cache);
    }

    /// # Errors
    ///
    /// Returns `SqlMapperError::ConfigError` when no cache has this id.
    pub fn cache(&self, id: &str) -> Result<Arc<SharedCache>, SqlMapperError> {
        self.caches
            .get(id)
            .cloned()
            .ok_or_else(|| SqlMapperError::config(format!("No cache for namespace '{id}' could be found")))
    }

    /// # Errors
    ///
    /// Returns `SqlMapperError::ConfigError` if a statement with the same id exists.
    pub fn add_mapped_statement(&mut self, statement: MappedStatement) -> Result<(), SqlMapperError> {
        if self.statements.contains_key(statement.id()) {
            return Err(SqlMapperError::config(format!(
                "Mapped Statements collection already contains value for {}",
                statement.id()
            )));
        }
        self.statements
            .insert(statement.id().to_string(), Arc::new(statement));
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SqlMapperError::ConfigError` for unknown ids.
    pub fn mapped_statement(&self, id: &str) -> Result<Arc<MappedStatement>, SqlMapperError> {
        self.statements.get(id).cloned().ok_or_else(|| {
            SqlMapperError::config(format!(
                "Mapped Statements collection does not contain value for {id}"
            ))
        })
    }

    /// Executor of the given type over `transaction`, wrapped in the caching decorator when
    /// caching is enabled.
    #[must_use]
    pub fn new_executor(
        self: &Arc<Self>,
        transaction: Box<dyn Transaction>,
        executor_type: ExecutorType,
    ) -> Box<dyn Executor> {
        let config = Arc::clone(self);
        let executor: Box<dyn Executor> = match executor_type {
            ExecutorType::Simple => Box::new(BaseExecutor::new(config, transaction, SimpleStrategy)),
            ExecutorType::Reuse => Box::new(BaseExecutor::new(
                config,
                transaction,
                ReuseStrategy::default(),
            )),
            ExecutorType::Batch => Box::new(BaseExecutor::new(
                config,
                transaction,
                BatchStrategy::default(),
            )),
        };
        if self.cache_enabled {
            Box::new(CachingExecutor::new(executor))
        } else {
            executor
        }
    }

    /// Session using the default executor type.
    pub fn open_session<T>(self: &Arc<Self>, transaction: T) -> SqlSession
    where
        T: Transaction + 'static,
    {
        self.open_session_with(transaction, self.default_executor_type)
    }

    pub fn open_session_with<T>(self: &Arc<Self>, transaction: T, executor_type: ExecutorType) -> SqlSession
    where
        T: Transaction + 'static,
    {
        let executor = self.new_executor(Box::new(transaction), executor_type);
        SqlSession::new(Arc::clone(self), executor)
    }
}

/// Fluent builder for [`Configuration`].
#[derive(Debug, Clone)]
pub struct ConfigurationBuilder {
    environment_id: Option<String>,
    database_id: Option<String>,
    cache_enabled: bool,
    default_executor_type: ExecutorType,
    local_cache_scope: LocalCacheScope,
    default_statement_timeout: Option<Duration>,
    type_handlers: TypeHandlerRegistry,
    caches: Vec<(String, CacheSettings)>,
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            environment_id: None,
            database_id: None,
            cache_enabled: true,
            default_executor_type: ExecutorType::default(),
            local_cache_scope: LocalCacheScope::default(),
            default_statement_timeout: None,
            type_handlers: TypeHandlerRegistry::default(),
            caches: Vec::new(),
        }
    }

    /// Included in every cache key.
    #[must_use]
    pub fn environment_id(mut self, id: impl Into<String>) -> Self {
        self.environment_id = Some(id.into());
        self
    }

    /// Exposed to templates as the `_databaseId` binding.
    #[must_use]
    pub fn database_id(mut self, id: impl Into<String>) -> Self {
        self.database_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    #[must_use]
    pub fn default_executor_type(mut self, executor_type: ExecutorType) -> Self {
        self.default_executor_type = executor_type;
        self
    }

    #[must_use]
    pub fn local_cache_scope(mut self, scope: LocalCacheScope) -> Self {
        self.local_cache_scope = scope;
        self
    }

    #[must_use]
    pub fn default_statement_timeout(mut self, timeout: Duration) -> Self {
        self.default_statement_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn type_handler(mut self, handler: Arc<dyn TypeHandler>) -> Self {
        self.type_handlers.register(handler);
        self
    }

    #[must_use]
    pub fn record_type_handler(mut self, record_type: &str, handler: Arc<dyn TypeHandler>) -> Self {
        self.type_handlers.register_for_record(record_type, handler);
        self
    }

    /// Declare a namespace cache.
    #[must_use]
    pub fn cache(mut self, id: impl Into<String>, settings: CacheSettings) -> Self {
        self.caches.push((id.into(), settings));
        self
    }

    /// # Errors
    ///
    /// Returns `SqlMapperError::ConfigError` if a declared cache is invalid.
    pub fn build(self) -> Result<Configuration, SqlMapperError> {
        let mut caches = HashMap::new();
        for (id, settings) in self.caches {
            let cache = CacheBuilder::from_settings(id.clone(), &settings).build()?;
            caches.insert(id, cache);
        }
        Ok(Configuration {
            environment_id: self.environment_id,
            database_id: self.database_id,
            cache_enabled: self.cache_enabled,
            default_executor_type: self.default_executor_type,
            local_cache_scope: self.local_cache_scope,
            default_statement_timeout: self.default_statement_timeout,
            type_handlers: Arc::new(self.type_handlers),
            caches,
            statements: HashMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_defaults() {
        let settings = Settings::from_json_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.cache_enabled);
        assert_eq!(settings.local_cache_scope, LocalCacheScope::Session);
    }

    #[test]
    fn settings_reject_unknown_values() {
        let err = Settings::from_json_str(r#"{"default_executor_type": "turbo"}"#).unwrap_err();
        assert!(matches!(err, SqlMapperError::ConfigError(_)));
    }

    #[test]
    fn configuration_from_settings_builds_caches() {
        let settings = Settings::from_json_str(
            r#"{"environment_id": "dev", "caches": {"users": {"size": 10, "read_only": true}}}"#,
        )
        .unwrap();
        let config = Configuration::from_settings(&settings).unwrap();
        assert_eq!(config.environment_id(), Some("dev"));
        assert_eq!(config.cache("users").unwrap().id(), "users");
        assert!(config.cache("orders").is_err());
    }

    #[test]
    fn zero_sized_cache_is_rejected() {
        let result = Configuration::builder()
            .cache("users", CacheSettings { size: 0, ..CacheSettings::default() })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!(ExecutorType::from_str("BATCH", true), Ok(ExecutorType::Batch));
        assert_eq!(
            LocalCacheScope::from_str("statement", true),
            Ok(LocalCacheScope::Statement)
        );
    }
}
