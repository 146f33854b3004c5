use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{Cache, CacheKey, PerpetualCache};
use crate::config::{Configuration, LocalCacheScope};
use crate::driver::{Connection, StatementHandle, Transaction};
use crate::error::SqlMapperError;
use crate::mapping::{BoundStatement, MappedStatement, RowBounds};
use crate::reflection::Argument;
use crate::results::{ResultHandler, ResultSet, drive};
use crate::types::{ParameterMode, RowValues, TypeHandlerRegistry};

use super::{BatchResult, Executor, UpdateCount};

/// What a strategy gets for one statement: the open connection, the type handlers that
/// convert parameter values, and the effective timeout.
pub struct StatementContext<'a> {
    pub connection: &'a mut dyn Connection,
    pub type_handlers: &'a TypeHandlerRegistry,
    pub timeout: Option<Duration>,
}

impl StatementContext<'_> {
    /// Driver values for `bound`, one per `?` marker.
    ///
    /// # Errors
    ///
    /// Returns `SqlMapperError::ParameterError` when a value cannot be read or converted.
    pub fn parameters(&self, bound: &BoundStatement) -> Result<Vec<RowValues>, SqlMapperError> {
        bound.parameter_values(self.type_handlers)
    }
}

/// How statements reach the driver. [`BaseExecutor`] handles caching, transactions and the
/// closed state around it.
pub trait ExecutionStrategy: Send + fmt::Debug {
    /// # Errors
    ///
    /// Propagates binding and driver errors.
    fn do_update(
        &mut self,
        context: StatementContext<'_>,
        statement: &MappedStatement,
        bound: &BoundStatement,
    ) -> Result<UpdateCount, SqlMapperError>;

    /// # Errors
    ///
    /// Propagates binding and driver errors.
    fn do_query(
        &mut self,
        context: StatementContext<'_>,
        statement: &MappedStatement,
        bound: &BoundStatement,
    ) -> Result<ResultSet, SqlMapperError>;

    /// Send buffered work, or discard it when `is_rollback`. Releases every handle the
    /// strategy holds.
    ///
    /// # Errors
    ///
    /// Propagates driver errors.
    fn do_flush(
        &mut self,
        connection: &mut dyn Connection,
        is_rollback: bool,
    ) -> Result<Vec<BatchResult>, SqlMapperError>;
}

/// Run `work` against a freshly prepared `handle` and close it whatever the outcome.
pub(crate) fn with_statement<T, F>(
    connection: &mut dyn Connection,
    handle: StatementHandle,
    work: F,
) -> Result<T, SqlMapperError>
where
    F: FnOnce(&mut dyn Connection) -> Result<T, SqlMapperError>,
{
    let result = work(&mut *connection);
    match (result, connection.close(handle)) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            warn!(%handle, error = %close_err, "failed to close statement after error");
            Err(err)
        }
    }
}

/// Close `handle`, logging instead of failing.
pub(crate) fn release(connection: &mut dyn Connection, handle: StatementHandle) {
    if let Err(err) = connection.close(handle) {
        warn!(%handle, error = %err, "failed to close statement");
    }
}

/// Executor over one transaction, with a session-level result cache.
pub struct BaseExecutor<S> {
    config: Arc<Configuration>,
    transaction: Box<dyn Transaction>,
    strategy: S,
    local_cache: PerpetualCache,
    closed: bool,
}

impl<S: fmt::Debug> fmt::Debug for BaseExecutor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseExecutor")
            .field("strategy", &self.strategy)
            .field("local_cache", &self.local_cache.size())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<S: ExecutionStrategy> BaseExecutor<S> {
    #[must_use]
    pub fn new(config: Arc<Configuration>, transaction: Box<dyn Transaction>, strategy: S) -> Self {
        Self {
            config,
            transaction,
            strategy,
            local_cache: PerpetualCache::new("LocalCache"),
            closed: false,
        }
    }

    #[must_use]
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    fn ensure_open(&self) -> Result<(), SqlMapperError> {
        if self.closed {
            Err(SqlMapperError::ExecutorClosed)
        } else {
            Ok(())
        }
    }

    /// Statement timeout, else the configured default, capped by the transaction timeout.
    fn statement_timeout(&self, statement: &MappedStatement) -> Option<Duration> {
        let timeout = statement
            .timeout()
            .or(self.config.default_statement_timeout());
        match (timeout, self.transaction.timeout()) {
            (Some(query), Some(tx)) => Some(query.min(tx)),
            (query, None) => query,
            (None, tx) => tx,
        }
    }

    fn query_from_database(
        &mut self,
        statement: &MappedStatement,
        bounds: RowBounds,
        bound: &BoundStatement,
    ) -> Result<ResultSet, SqlMapperError> {
        let context = StatementContext {
            timeout: self.statement_timeout(statement),
            connection: self.transaction.connection()?,
            type_handlers: self.config.type_handlers(),
        };
        let rows = self.strategy.do_query(context, statement, bound)?;
        Ok(rows.paginate(bounds))
    }
}

impl<S: ExecutionStrategy> Executor for BaseExecutor<S> {
    fn update(
        &mut self,
        statement: &MappedStatement,
        argument: &Argument,
    ) -> Result<UpdateCount, SqlMapperError> {
        self.ensure_open()?;
        self.local_cache.clear();
        let bound = statement.bound_statement(argument)?;
        debug!(statement = statement.id(), sql = bound.sql(), "executing update");
        let context = StatementContext {
            timeout: self.statement_timeout(statement),
            connection: self.transaction.connection()?,
            type_handlers: self.config.type_handlers(),
        };
        self.strategy.do_update(context, statement, &bound)
    }

    fn query_bound(
        &mut self,
        statement: &MappedStatement,
        bounds: RowBounds,
        key: &CacheKey,
        bound: &BoundStatement,
    ) -> Result<Arc<ResultSet>, SqlMapperError> {
        self.ensure_open()?;
        if statement.flush_cache_required() {
            self.local_cache.clear();
        }
        if let Some(hit) = self.local_cache.get(key) {
            debug!(statement = statement.id(), "local cache hit");
            return Ok(hit);
        }
        debug!(statement = statement.id(), sql = bound.sql(), "executing query");
        let rows = Arc::new(self.query_from_database(statement, bounds, bound)?);
        self.local_cache.put(key.clone(), Arc::clone(&rows));
        if self.config.local_cache_scope() == LocalCacheScope::Statement {
            self.local_cache.clear();
        }
        Ok(rows)
    }

    fn query_with_handler(
        &mut self,
        statement: &MappedStatement,
        argument: &Argument,
        bounds: RowBounds,
        handler: &mut dyn ResultHandler,
    ) -> Result<usize, SqlMapperError> {
        self.ensure_open()?;
        if statement.flush_cache_required() {
            self.local_cache.clear();
        }
        let bound = statement.bound_statement(argument)?;
        debug!(statement = statement.id(), sql = bound.sql(), "streaming query");
        let rows = self.query_from_database(statement, bounds, &bound)?;
        Ok(drive(&rows, handler))
    }

    fn flush_statements(&mut self) -> Result<Vec<BatchResult>, SqlMapperError> {
        self.ensure_open()?;
        let connection = self.transaction.connection()?;
        self.strategy.do_flush(connection, false)
    }

    fn commit(&mut self, required: bool) -> Result<(), SqlMapperError> {
        self.ensure_open()?;
        self.local_cache.clear();
        self.flush_statements()?;
        if required {
            self.transaction.commit()?;
        }
        Ok(())
    }

    fn rollback(&mut self, required: bool) -> Result<(), SqlMapperError> {
        if self.closed {
            return Ok(());
        }
        self.local_cache.clear();
        let discarded = match self.transaction.connection() {
            Ok(connection) => self.strategy.do_flush(connection, true).map(drop),
            Err(err) => Err(err),
        };
        let rolled_back = if required {
            self.transaction.rollback()
        } else {
            Ok(())
        };
        discarded.and(rolled_back)
    }

    fn create_cache_key(
        &self,
        statement: &MappedStatement,
        bounds: RowBounds,
        bound: &BoundStatement,
    ) -> Result<CacheKey, SqlMapperError> {
        self.ensure_open()?;
        let mut key = CacheKey::new();
        key.update(statement.id());
        key.update(bounds.offset());
        key.update(bounds.limit());
        key.update(bound.sql());
        let registry = self.config.type_handlers();
        for descriptor in bound.descriptors() {
            if descriptor.mode() == ParameterMode::Out {
                continue;
            }
            let value = bound.value_of(descriptor, registry)?;
            key.update(&value);
        }
        if let Some(environment) = self.config.environment_id() {
            key.update(environment);
        }
        Ok(key)
    }

    fn clear_local_cache(&mut self) {
        if !self.closed {
            self.local_cache.clear();
        }
    }

    fn close(&mut self, force_rollback: bool) {
        if self.closed {
            return;
        }
        if let Err(err) = self.rollback(force_rollback) {
            warn!(error = %err, "rollback while closing executor failed");
        }
        if let Err(err) = self.transaction.close() {
            warn!(error = %err, "closing transaction failed");
        }
        self.local_cache.clear();
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
