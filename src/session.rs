//! The per-unit-of-work facade over an executor.

use std::sync::Arc;

use crate::config::Configuration;
use crate::error::SqlMapperError;
use crate::executor::{BatchResult, Executor, UpdateCount};
use crate::mapping::RowBounds;
use crate::reflection::Argument;
use crate::results::{CustomDbRow, ResultHandler, ResultSet};

/// One unit of work. Not shareable across threads; open one per task.
///
/// Commit and rollback only reach the database when forced or when an update ran since the
/// last commit/rollback. Dropping an open session closes it, rolling back uncommitted updates.
///
/// ```rust
/// use std::sync::Arc;
/// use sql_mapper::prelude::*;
/// use sql_mapper::test_utils::MockConnection;
///
/// let mut config = Configuration::builder().build()?;
/// let template = SqlTemplate::from_sql(&config, "delete from users where id = #{id}", &ValueType::Map)?;
/// config.add_mapped_statement(
///     MappedStatement::builder("users.delete", template, CommandKind::Delete).build()?,
/// )?;
/// let config = Arc::new(config);
///
/// let mut session = config.open_session(DriverTransaction::new(MockConnection::new()));
/// let count = session.delete("users.delete", &Argument::map([("id", Argument::from(7))]))?;
/// assert_eq!(count, UpdateCount::Affected(1));
/// session.commit(false)?;
/// # Ok::<(), SqlMapperError>(())
/// ```
pub struct SqlSession {
    config: Arc<Configuration>,
    executor: Box<dyn Executor>,
    dirty: bool,
}

impl SqlSession {
    #[must_use]
    pub fn new(config: Arc<Configuration>, executor: Box<dyn Executor>) -> Self {
        Self {
            config,
            executor,
            dirty: false,
        }
    }

    #[must_use]
    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.config
    }

    /// Whether updates ran since the last commit or rollback.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// # Errors
    ///
    /// Unknown statement ids, template, binding and driver errors.
    pub fn select_list(
        &mut self,
        statement_id: &str,
        argument: &Argument,
    ) -> Result<Arc<ResultSet>, SqlMapperError> {
        self.select_list_with_bounds(statement_id, argument, RowBounds::default())
    }

    /// # Errors
    ///
    /// See [`SqlSession::select_list`].
    pub fn select_list_with_bounds(
        &mut self,
        statement_id: &str,
        argument: &Argument,
        bounds: RowBounds,
    ) -> Result<Arc<ResultSet>, SqlMapperError> {
        let statement = self.config.mapped_statement(statement_id)?;
        self.executor.query(&statement, argument, bounds)
    }

    /// The single row, or `None` for an empty result.
    ///
    /// # Errors
    ///
    /// Fails with `SqlMapperError::ExecutionError` when more than one row comes back.
    pub fn select_one(
        &mut self,
        statement_id: &str,
        argument: &Argument,
    ) -> Result<Option<CustomDbRow>, SqlMapperError> {
        let rows = self.select_list(statement_id, argument)?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.iter().next().cloned()),
            n => Err(SqlMapperError::ExecutionError(format!(
                "Expected one result (or null) to be returned by select_one(), but found: {n}"
            ))),
        }
    }

    /// Stream rows to `handler`. Returns the number of rows handled.
    ///
    /// # Errors
    ///
    /// See [`SqlSession::select_list`].
    pub fn select_with_handler(
        &mut self,
        statement_id: &str,
        argument: &Argument,
        bounds: RowBounds,
        handler: &mut dyn ResultHandler,
    ) -> Result<usize, SqlMapperError> {
        let statement = self.config.mapped_statement(statement_id)?;
        self.executor
            .query_with_handler(&statement, argument, bounds, handler)
    }

    /// # Errors
    ///
    /// See [`SqlSession::update`].
    pub fn insert(
        &mut self,
        statement_id: &str,
        argument: &Argument,
    ) -> Result<UpdateCount, SqlMapperError> {
        self.update(statement_id, argument)
    }

    /// # Errors
    ///
    /// Unknown statement ids, template, binding and driver errors.
    pub fn update(
        &mut self,
        statement_id: &str,
        argument: &Argument,
    ) -> Result<UpdateCount, SqlMapperError> {
        let statement = self.config.mapped_statement(statement_id)?;
        self.dirty = true;
        self.executor.update(&statement, argument)
    }

    /// # Errors
    ///
    /// See [`SqlSession::update`].
    pub fn delete(
        &mut self,
        statement_id: &str,
        argument: &Argument,
    ) -> Result<UpdateCount, SqlMapperError> {
        self.update(statement_id, argument)
    }

    /// # Errors
    ///
    /// Batch failures surface as [`SqlMapperError::BatchExecution`].
    pub fn flush_statements(&mut self) -> Result<Vec<BatchResult>, SqlMapperError> {
        self.executor.flush_statements()
    }

    /// # Errors
    ///
    /// Propagates flush and driver errors.
    pub fn commit(&mut self, force: bool) -> Result<(), SqlMapperError> {
        self.executor.commit(self.is_commit_or_rollback_required(force))?;
        self.dirty = false;
        Ok(())
    }

    /// # Errors
    ///
    /// Propagates driver errors.
    pub fn rollback(&mut self, force: bool) -> Result<(), SqlMapperError> {
        self.executor
            .rollback(self.is_commit_or_rollback_required(force))?;
        self.dirty = false;
        Ok(())
    }

    pub fn clear_cache(&mut self) {
        self.executor.clear_local_cache();
    }

    /// Release the executor, rolling back uncommitted updates. Idempotent.
    pub fn close(&mut self) {
        self.executor
            .close(self.is_commit_or_rollback_required(false));
        self.dirty = false;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.executor.is_closed()
    }

    fn is_commit_or_rollback_required(&self, force: bool) -> bool {
        force || self.dirty
    }
}

impl Drop for SqlSession {
    fn drop(&mut self) {
        if !self.executor.is_closed() {
            self.close();
        }
    }
}
