use std::sync::Arc;

use tracing::debug;

use crate::cache::{CacheKey, TransactionalCacheManager};
use crate::error::SqlMapperError;
use crate::mapping::{BoundStatement, MappedStatement, RowBounds, StatementKind};
use crate::reflection::Argument;
use crate::results::{ResultHandler, ResultSet};
use crate::types::ParameterMode;

use super::{BatchResult, Executor, UpdateCount};

/// Serves queries from the statement's namespace cache. Writes are buffered per transaction
/// and reach the shared cache only on commit.
#[derive(Debug)]
pub struct CachingExecutor<E> {
    delegate: E,
    transactional_caches: TransactionalCacheManager,
}

impl<E: Executor> CachingExecutor<E> {
    #[must_use]
    pub fn new(delegate: E) -> Self {
        Self {
            delegate,
            transactional_caches: TransactionalCacheManager::new(),
        }
    }

    #[must_use]
    pub fn delegate(&self) -> &E {
        &self.delegate
    }

    fn flush_cache_if_required(&mut self, statement: &MappedStatement) {
        if let Some(cache) = statement.cache()
            && statement.flush_cache_required()
        {
            self.transactional_caches.clear(cache);
        }
    }
}

fn ensure_no_out_params(
    statement: &MappedStatement,
    bound: &BoundStatement,
) -> Result<(), SqlMapperError> {
    if statement.statement_kind() != StatementKind::Callable {
        return Ok(());
    }
    if bound
        .descriptors()
        .iter()
        .any(|d| d.mode() != ParameterMode::In)
    {
        return Err(SqlMapperError::config(format!(
            "Caching stored procedures with OUT params is not supported.  Please configure \
             use_cache=false in {} statement.",
            statement.id()
        )));
    }
    Ok(())
}

impl<E: Executor> Executor for CachingExecutor<E> {
    fn update(
        &mut self,
        statement: &MappedStatement,
        argument: &Argument,
    ) -> Result<UpdateCount, SqlMapperError> {
        self.flush_cache_if_required(statement);
        self.delegate.update(statement, argument)
    }

    fn query_bound(
        &mut self,
        statement: &MappedStatement,
        bounds: RowBounds,
        key: &CacheKey,
        bound: &BoundStatement,
    ) -> Result<Arc<ResultSet>, SqlMapperError> {
        let Some(cache) = statement.cache() else {
            return self.delegate.query_bound(statement, bounds, key, bound);
        };
        self.flush_cache_if_required(statement);
        if !statement.use_cache() {
            return self.delegate.query_bound(statement, bounds, key, bound);
        }
        ensure_no_out_params(statement, bound)?;
        if let Some(hit) = self.transactional_caches.get(cache, key) {
            debug!(statement = statement.id(), cache = cache.id(), "second level cache hit");
            return Ok(hit);
        }
        let rows = self.delegate.query_bound(statement, bounds, key, bound)?;
        self.transactional_caches
            .put(cache, key.clone(), Arc::clone(&rows));
        Ok(rows)
    }

    fn query_with_handler(
        &mut self,
        statement: &MappedStatement,
        argument: &Argument,
        bounds: RowBounds,
        handler: &mut dyn ResultHandler,
    ) -> Result<usize, SqlMapperError> {
        self.flush_cache_if_required(statement);
        self.delegate
            .query_with_handler(statement, argument, bounds, handler)
    }

    fn flush_statements(&mut self) -> Result<Vec<BatchResult>, SqlMapperError> {
        self.delegate.flush_statements()
    }

    fn commit(&mut self, required: bool) -> Result<(), SqlMapperError> {
        self.delegate.commit(required)?;
        self.transactional_caches.commit();
        Ok(())
    }

    fn rollback(&mut self, required: bool) -> Result<(), SqlMapperError> {
        let result = self.delegate.rollback(required);
        if required {
            self.transactional_caches.rollback();
        }
        result
    }

    fn create_cache_key(
        &self,
        statement: &MappedStatement,
        bounds: RowBounds,
        bound: &BoundStatement,
    ) -> Result<CacheKey, SqlMapperError> {
        self.delegate.create_cache_key(statement, bounds, bound)
    }

    fn clear_local_cache(&mut self) {
        self.delegate.clear_local_cache();
    }

    fn close(&mut self, force_rollback: bool) {
        if force_rollback {
            self.transactional_caches.rollback();
        } else {
            self.transactional_caches.commit();
        }
        self.delegate.close(force_rollback);
    }

    fn is_closed(&self) -> bool {
        self.delegate.is_closed()
    }
}
