use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::driver::{Connection, StatementHandle};
use crate::error::SqlMapperError;
use crate::mapping::{BoundStatement, MappedStatement};
use crate::results::ResultSet;

use super::base::release;
use super::{BatchResult, ExecutionStrategy, StatementContext, UpdateCount};

/// Keeps one prepared statement per SQL text open until the next flush, commit or rollback.
///
/// The timeout applied is the one in effect when the SQL text was first prepared. A statement
/// whose execution fails is closed and dropped from the pool.
#[derive(Debug, Default)]
pub struct ReuseStrategy {
    statements: HashMap<String, StatementHandle>,
}

impl ReuseStrategy {
    /// Number of statements currently held open.
    #[must_use]
    pub fn open_statements(&self) -> usize {
        self.statements.len()
    }

    fn handle_for(
        &mut self,
        connection: &mut dyn Connection,
        sql: &str,
        timeout: Option<Duration>,
    ) -> Result<StatementHandle, SqlMapperError> {
        if let Some(handle) = self.statements.get(sql) {
            debug!(%handle, "reusing prepared statement");
            return Ok(*handle);
        }
        let handle = connection.prepare(sql, timeout)?;
        self.statements.insert(sql.to_string(), handle);
        Ok(handle)
    }

    fn run<T, F>(
        &mut self,
        connection: &mut dyn Connection,
        sql: &str,
        timeout: Option<Duration>,
        work: F,
    ) -> Result<T, SqlMapperError>
    where
        F: FnOnce(&mut dyn Connection, StatementHandle) -> Result<T, SqlMapperError>,
    {
        let handle = self.handle_for(connection, sql, timeout)?;
        let result = work(&mut *connection, handle);
        if result.is_err()
            && let Some(handle) = self.statements.remove(sql)
        {
            debug!(%handle, "dropping prepared statement after error");
            release(connection, handle);
        }
        result
    }
}

impl ExecutionStrategy for ReuseStrategy {
    fn do_update(
        &mut self,
        context: StatementContext<'_>,
        statement: &MappedStatement,
        bound: &BoundStatement,
    ) -> Result<UpdateCount, SqlMapperError> {
        let values = context.parameters(bound)?;
        self.run(context.connection, bound.sql(), context.timeout, |conn, handle| {
            conn.bind_parameters(handle, &values)?;
            let affected = conn.execute_update(handle)?;
            statement
                .key_generator()
                .process_after(conn, handle, bound.argument())?;
            Ok(UpdateCount::Affected(affected))
        })
    }

    fn do_query(
        &mut self,
        context: StatementContext<'_>,
        _statement: &MappedStatement,
        bound: &BoundStatement,
    ) -> Result<ResultSet, SqlMapperError> {
        let values = context.parameters(bound)?;
        self.run(context.connection, bound.sql(), context.timeout, |conn, handle| {
            conn.bind_parameters(handle, &values)?;
            conn.execute_query(handle)
        })
    }

    fn do_flush(
        &mut self,
        connection: &mut dyn Connection,
        _is_rollback: bool,
    ) -> Result<Vec<BatchResult>, SqlMapperError> {
        for (_, handle) in self.statements.drain() {
            release(connection, handle);
        }
        Ok(Vec::new())
    }
}
