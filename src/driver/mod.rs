//! The boundary to a database driver: statement handles, connections and transactions.

mod key_gen;

use std::fmt;
use std::time::Duration;

use crate::error::SqlMapperError;
use crate::results::ResultSet;
use crate::types::RowValues;

pub use key_gen::{KeyGenerator, NoKeyGenerator};

/// Opaque id of a statement prepared on a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatementHandle(pub u64);

impl fmt::Display for StatementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stmt#{}", self.0)
    }
}

/// A driver connection. Statements live between [`prepare`] and [`close`]; every handle
/// returned by `prepare` must eventually be closed.
///
/// [`prepare`]: Connection::prepare
/// [`close`]: Connection::close
pub trait Connection: Send {
    /// # Errors
    ///
    /// Returns a driver error if the SQL cannot be prepared.
    fn prepare(
        &mut self,
        sql: &str,
        timeout: Option<Duration>,
    ) -> Result<StatementHandle, SqlMapperError>;

    /// Replace the current positional parameters of `handle`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown handles or unsupported values.
    fn bind_parameters(
        &mut self,
        handle: StatementHandle,
        values: &[RowValues],
    ) -> Result<(), SqlMapperError>;

    /// Queue the currently bound parameters as one batch item.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown handles.
    fn add_batch(&mut self, handle: StatementHandle) -> Result<(), SqlMapperError>;

    /// # Errors
    ///
    /// Returns a driver error if execution fails.
    fn execute_update(&mut self, handle: StatementHandle) -> Result<usize, SqlMapperError>;

    /// Run every queued batch item, returning one update count per item.
    ///
    /// # Errors
    ///
    /// A failure part way is reported as [`SqlMapperError::BatchUpdate`] carrying the counts of
    /// the items that ran.
    fn execute_batch(&mut self, handle: StatementHandle) -> Result<Vec<usize>, SqlMapperError>;

    /// # Errors
    ///
    /// Returns a driver error if execution fails.
    fn execute_query(&mut self, handle: StatementHandle) -> Result<ResultSet, SqlMapperError>;

    /// Release `handle`. Closing an unknown handle is not an error.
    ///
    /// # Errors
    ///
    /// Returns a driver error if the statement cannot be finalized.
    fn close(&mut self, handle: StatementHandle) -> Result<(), SqlMapperError>;

    /// # Errors
    ///
    /// Returns a driver error if the commit fails.
    fn commit(&mut self) -> Result<(), SqlMapperError>;

    /// # Errors
    ///
    /// Returns a driver error if the rollback fails.
    fn rollback(&mut self) -> Result<(), SqlMapperError>;
}

/// Transaction boundary an executor runs against.
pub trait Transaction: Send {
    /// # Errors
    ///
    /// Returns an error once the transaction has been closed.
    fn connection(&mut self) -> Result<&mut dyn Connection, SqlMapperError>;

    /// # Errors
    ///
    /// Propagates driver errors.
    fn commit(&mut self) -> Result<(), SqlMapperError>;

    /// # Errors
    ///
    /// Propagates driver errors.
    fn rollback(&mut self) -> Result<(), SqlMapperError>;

    /// Release the connection. Idempotent.
    ///
    /// # Errors
    ///
    /// Propagates driver errors.
    fn close(&mut self) -> Result<(), SqlMapperError>;

    /// Upper bound for every statement run inside this transaction.
    fn timeout(&self) -> Option<Duration>;
}

/// [`Transaction`] that owns one connection and delegates commit/rollback to it.
pub struct DriverTransaction<C> {
    connection: Option<C>,
    timeout: Option<Duration>,
}

impl<C: Connection> DriverTransaction<C> {
    #[must_use]
    pub fn new(connection: C) -> Self {
        Self {
            connection: Some(connection),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.connection.is_none()
    }

    fn open_connection(&mut self) -> Result<&mut C, SqlMapperError> {
        self.connection
            .as_mut()
            .ok_or_else(|| SqlMapperError::ExecutionError("Transaction was closed.".into()))
    }
}

impl<C: fmt::Debug> fmt::Debug for DriverTransaction<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverTransaction")
            .field("connection", &self.connection)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<C: Connection + 'static> Transaction for DriverTransaction<C> {
    fn connection(&mut self) -> Result<&mut dyn Connection, SqlMapperError> {
        Ok(self.open_connection()?)
    }

    fn commit(&mut self) -> Result<(), SqlMapperError> {
        self.open_connection()?.commit()
    }

    fn rollback(&mut self) -> Result<(), SqlMapperError> {
        self.open_connection()?.rollback()
    }

    fn close(&mut self) -> Result<(), SqlMapperError> {
        self.connection = None;
        Ok(())
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
