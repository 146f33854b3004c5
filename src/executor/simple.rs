use crate::driver::Connection;
use crate::error::SqlMapperError;
use crate::mapping::{BoundStatement, MappedStatement};
use crate::results::ResultSet;

use super::base::with_statement;
use super::{BatchResult, ExecutionStrategy, StatementContext, UpdateCount};

/// Prepare, bind, execute and close in a single call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleStrategy;

impl ExecutionStrategy for SimpleStrategy {
    fn do_update(
        &mut self,
        context: StatementContext<'_>,
        statement: &MappedStatement,
        bound: &BoundStatement,
    ) -> Result<UpdateCount, SqlMapperError> {
        let values = context.parameters(bound)?;
        let handle = context.connection.prepare(bound.sql(), context.timeout)?;
        with_statement(context.connection, handle, |conn| {
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
        let handle = context.connection.prepare(bound.sql(), context.timeout)?;
        with_statement(context.connection, handle, |conn| {
            conn.bind_parameters(handle, &values)?;
            conn.execute_query(handle)
        })
    }

    fn do_flush(
        &mut self,
        _connection: &mut dyn Connection,
        _is_rollback: bool,
    ) -> Result<Vec<BatchResult>, SqlMapperError> {
        Ok(Vec::new())
    }
}
