use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::driver::{Connection, KeyGenerator, StatementHandle};
use crate::error::SqlMapperError;
use crate::mapping::{BoundStatement, MappedStatement};
use crate::reflection::Argument;
use crate::results::ResultSet;

use super::base::{release, with_statement};
use super::{ExecutionStrategy, StatementContext, UpdateCount};

/// One flushed (or pending) batch group: consecutive updates sharing statement id and SQL.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    statement_id: String,
    sql: String,
    arguments: Vec<Argument>,
    update_counts: Vec<usize>,
}

impl BatchResult {
    fn new(statement_id: &str, sql: &str) -> Self {
        Self {
            statement_id: statement_id.to_string(),
            sql: sql.to_string(),
            arguments: Vec::new(),
            update_counts: Vec::new(),
        }
    }

    #[must_use]
    pub fn statement_id(&self) -> &str {
        &self.statement_id
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// One count per argument once flushed; partial when the group failed.
    #[must_use]
    pub fn update_counts(&self) -> &[usize] {
        &self.update_counts
    }
}

/// A batch flush that failed part way.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BatchExecutorError {
    message: String,
    #[source]
    cause: Box<SqlMapperError>,
    completed: Vec<BatchResult>,
    failed: BatchResult,
    index: usize,
}

impl BatchExecutorError {
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn cause(&self) -> &SqlMapperError {
        &self.cause
    }

    /// Groups that ran before the failure. They are still subject to rollback.
    #[must_use]
    pub fn completed(&self) -> &[BatchResult] {
        &self.completed
    }

    /// The failing group, with whatever counts the driver reported for it.
    #[must_use]
    pub fn failed(&self) -> &BatchResult {
        &self.failed
    }

    /// Zero-based position of the failing group.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

struct BatchGroup {
    handle: StatementHandle,
    key_generator: Arc<dyn KeyGenerator>,
    result: BatchResult,
}

impl fmt::Debug for BatchGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchGroup")
            .field("handle", &self.handle)
            .field("statement_id", &self.result.statement_id)
            .field("arguments", &self.result.arguments.len())
            .finish()
    }
}

/// Buffers updates and sends them in groups on flush. A new group starts whenever the
/// statement id or SQL text differs from the previous update's.
#[derive(Debug, Default)]
pub struct BatchStrategy {
    groups: Vec<BatchGroup>,
}

impl BatchStrategy {
    /// Groups waiting for the next flush.
    #[must_use]
    pub fn pending_groups(&self) -> usize {
        self.groups.len()
    }

    fn flush(&mut self, connection: &mut dyn Connection) -> Result<Vec<BatchResult>, SqlMapperError> {
        let mut groups = std::mem::take(&mut self.groups).into_iter().enumerate();
        let mut completed = Vec::new();
        let mut failure = None;

        for (index, mut group) in groups.by_ref() {
            let outcome = connection.execute_batch(group.handle).and_then(|counts| {
                group.result.update_counts = counts;
                group.key_generator.process_batch(
                    &mut *connection,
                    group.handle,
                    &group.result.arguments,
                )
            });
            release(connection, group.handle);
            match outcome {
                Ok(()) => completed.push(group.result),
                Err(cause) => {
                    if let SqlMapperError::BatchUpdate { update_counts, .. } = &cause {
                        group.result.update_counts.clone_from(update_counts);
                    }
                    let mut message = format!(
                        "{} (batch index #{}) failed.",
                        group.result.statement_id,
                        index + 1
                    );
                    if index > 0 {
                        message.push_str(&format!(
                            " {index} prior sub executor(s) completed successfully, but will be rolled back."
                        ));
                    }
                    warn!(statement = %group.result.statement_id, index, error = %cause, "batch group failed");
                    failure = Some(BatchExecutorError {
                        message,
                        cause: Box::new(cause),
                        completed: Vec::new(),
                        failed: group.result,
                        index,
                    });
                    break;
                }
            }
        }

        for (_, group) in groups {
            release(connection, group.handle);
        }
        match failure {
            Some(mut err) => {
                err.completed = completed;
                Err(err.into())
            }
            None => {
                debug!(groups = completed.len(), "batch flushed");
                Ok(completed)
            }
        }
    }
}

impl ExecutionStrategy for BatchStrategy {
    fn do_update(
        &mut self,
        context: StatementContext<'_>,
        statement: &MappedStatement,
        bound: &BoundStatement,
    ) -> Result<UpdateCount, SqlMapperError> {
        let values = context.parameters(bound)?;
        let sql = bound.sql();
        let continues_group = self
            .groups
            .last()
            .is_some_and(|g| g.result.sql == sql && g.result.statement_id == statement.id());
        if continues_group && let Some(group) = self.groups.last_mut() {
            context.connection.bind_parameters(group.handle, &values)?;
            context.connection.add_batch(group.handle)?;
            group.result.arguments.push(bound.argument().clone());
            return Ok(UpdateCount::Pending);
        }

        // a group only exists once its first item is queued
        let handle = context.connection.prepare(sql, context.timeout)?;
        let queued = context
            .connection
            .bind_parameters(handle, &values)
            .and_then(|()| context.connection.add_batch(handle));
        if let Err(err) = queued {
            release(context.connection, handle);
            return Err(err);
        }
        let mut result = BatchResult::new(statement.id(), sql);
        result.arguments.push(bound.argument().clone());
        self.groups.push(BatchGroup {
            handle,
            key_generator: Arc::clone(statement.key_generator()),
            result,
        });
        Ok(UpdateCount::Pending)
    }

    fn do_query(
        &mut self,
        context: StatementContext<'_>,
        _statement: &MappedStatement,
        bound: &BoundStatement,
    ) -> Result<ResultSet, SqlMapperError> {
        self.flush(&mut *context.connection)?;
        let values = context.parameters(bound)?;
        let handle = context.connection.prepare(bound.sql(), context.timeout)?;
        with_statement(context.connection, handle, |conn| {
            conn.bind_parameters(handle, &values)?;
            conn.execute_query(handle)
        })
    }

    fn do_flush(
        &mut self,
        connection: &mut dyn Connection,
        is_rollback: bool,
    ) -> Result<Vec<BatchResult>, SqlMapperError> {
        if is_rollback {
            if !self.groups.is_empty() {
                warn!(groups = self.groups.len(), "discarding pending batch on rollback");
            }
            for group in self.groups.drain(..) {
                release(connection, group.handle);
            }
            return Ok(Vec::new());
        }
        self.flush(connection)
    }
}
