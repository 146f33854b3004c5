//! Execution strategies and the caching decorator.
//!
//! A [`BaseExecutor`] owns the transaction and the session-level cache and delegates the
//! statement work to an [`ExecutionStrategy`]: [`SimpleStrategy`], [`ReuseStrategy`] or
//! [`BatchStrategy`]. [`CachingExecutor`] wraps any executor with the namespace caches.

mod base;
mod batch;
mod caching;
mod reuse;
mod simple;

use std::sync::Arc;

use crate::cache::CacheKey;
use crate::error::SqlMapperError;
use crate::mapping::{BoundStatement, MappedStatement, RowBounds};
use crate::reflection::Argument;
use crate::results::{ResultHandler, ResultSet};

pub use base::{BaseExecutor, ExecutionStrategy, StatementContext};
pub use batch::{BatchExecutorError, BatchResult, BatchStrategy};
pub use caching::CachingExecutor;
pub use reuse::ReuseStrategy;
pub use simple::SimpleStrategy;

/// Outcome of an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateCount {
    /// Rows affected, as reported by the driver.
    Affected(usize),
    /// Queued in a batch; counts arrive with the flush.
    Pending,
}

impl UpdateCount {
    #[must_use]
    pub fn affected(self) -> Option<usize> {
        match self {
            UpdateCount::Affected(n) => Some(n),
            UpdateCount::Pending => None,
        }
    }
}

/// Statement execution for one session.
///
/// Once [`close`](Executor::close) has run, every other operation fails with
/// [`SqlMapperError::ExecutorClosed`].
pub trait Executor: Send {
    /// # Errors
    ///
    /// Propagates template, binding and driver errors.
    fn update(
        &mut self,
        statement: &MappedStatement,
        argument: &Argument,
    ) -> Result<UpdateCount, SqlMapperError>;

    /// Bind `argument`, compute the cache key and run [`query_bound`](Executor::query_bound).
    ///
    /// # Errors
    ///
    /// Propagates template, binding and driver errors.
    fn query(
        &mut self,
        statement: &MappedStatement,
        argument: &Argument,
        bounds: RowBounds,
    ) -> Result<Arc<ResultSet>, SqlMapperError> {
        let bound = statement.bound_statement(argument)?;
        let key = self.create_cache_key(statement, bounds, &bound)?;
        self.query_bound(statement, bounds, &key, &bound)
    }

    /// # Errors
    ///
    /// Propagates driver errors.
    fn query_bound(
        &mut self,
        statement: &MappedStatement,
        bounds: RowBounds,
        key: &CacheKey,
        bound: &BoundStatement,
    ) -> Result<Arc<ResultSet>, SqlMapperError>;

    /// Stream rows to `handler` instead of collecting them. Bypasses every cache. Returns the
    /// number of rows handled.
    ///
    /// # Errors
    ///
    /// Propagates template, binding and driver errors.
    fn query_with_handler(
        &mut self,
        statement: &MappedStatement,
        argument: &Argument,
        bounds: RowBounds,
        handler: &mut dyn ResultHandler,
    ) -> Result<usize, SqlMapperError>;

    /// Send buffered statements to the database.
    ///
    /// # Errors
    ///
    /// Batch failures surface as [`SqlMapperError::BatchExecution`].
    fn flush_statements(&mut self) -> Result<Vec<BatchResult>, SqlMapperError>;

    /// # Errors
    ///
    /// Propagates flush and driver errors.
    fn commit(&mut self, required: bool) -> Result<(), SqlMapperError>;

    /// # Errors
    ///
    /// Propagates driver errors.
    fn rollback(&mut self, required: bool) -> Result<(), SqlMapperError>;

    /// # Errors
    ///
    /// Returns `SqlMapperError::ParameterError` if a parameter value cannot be read.
    fn create_cache_key(
        &self,
        statement: &MappedStatement,
        bounds: RowBounds,
        bound: &BoundStatement,
    ) -> Result<CacheKey, SqlMapperError>;

    fn clear_local_cache(&mut self);

    /// Roll back if `force_rollback`, discard pending work and release the transaction.
    /// Failures are logged, never returned. Idempotent.
    fn close(&mut self, force_rollback: bool);

    fn is_closed(&self) -> bool;
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn update(
        &mut self,
        statement: &MappedStatement,
        argument: &Argument,
    ) -> Result<UpdateCount, SqlMapperError> {
        (**self).update(statement, argument)
    }

    fn query(
        &mut self,
        statement: &MappedStatement,
        argument: &Argument,
        bounds: RowBounds,
    ) -> Result<Arc<ResultSet>, SqlMapperError> {
        (**self).query(statement, argument, bounds)
    }

    fn query_bound(
        &mut self,
        statement: &MappedStatement,
        bounds: RowBounds,
        key: &CacheKey,
        bound: &BoundStatement,
    ) -> Result<Arc<ResultSet>, SqlMapperError> {
        (**self).query_bound(statement, bounds, key, bound)
    }

    fn query_with_handler(
        &mut self,
        statement: &MappedStatement,
        argument: &Argument,
        bounds: RowBounds,
        handler: &mut dyn ResultHandler,
    ) -> Result<usize, SqlMapperError> {
        (**self).query_with_handler(statement, argument, bounds, handler)
    }

    fn flush_statements(&mut self) -> Result<Vec<BatchResult>, SqlMapperError> {
        (**self).flush_statements()
    }

    fn commit(&mut self, required: bool) -> Result<(), SqlMapperError> {
        (**self).commit(required)
    }

    fn rollback(&mut self, required: bool) -> Result<(), SqlMapperError> {
        (**self).rollback(required)
    }

    fn create_cache_key(
        &self,
        statement: &MappedStatement,
        bounds: RowBounds,
        bound: &BoundStatement,
    ) -> Result<CacheKey, SqlMapperError> {
        (**self).create_cache_key(statement, bounds, bound)
    }

    fn clear_local_cache(&mut self) {
        (**self).clear_local_cache();
    }

    fn close(&mut self, force_rollback: bool) {
        (**self).close(force_rollback);
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}
