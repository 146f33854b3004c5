use std::fmt;

use crate::error::SqlMapperError;
use crate::reflection::Argument;

use super::{Connection, StatementHandle};

/// Hook run after an insert to pick up generated keys.
pub trait KeyGenerator: Send + Sync + fmt::Debug {
    /// Called after a single update executed on `handle`, before the handle is closed.
    ///
    /// # Errors
    ///
    /// Propagates driver errors.
    fn process_after(
        &self,
        connection: &mut dyn Connection,
        handle: StatementHandle,
        argument: &Argument,
    ) -> Result<(), SqlMapperError>;

    /// Called once per flushed batch group with every argument of the group.
    ///
    /// # Errors
    ///
    /// Propagates driver errors.
    fn process_batch(
        &self,
        connection: &mut dyn Connection,
        handle: StatementHandle,
        arguments: &[Argument],
    ) -> Result<(), SqlMapperError> {
        for argument in arguments {
            self.process_after(connection, handle, argument)?;
        }
        Ok(())
    }
}

/// The default: no generated keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoKeyGenerator;

impl KeyGenerator for NoKeyGenerator {
    fn process_after(
        &self,
        _connection: &mut dyn Connection,
        _handle: StatementHandle,
        _argument: &Argument,
    ) -> Result<(), SqlMapperError> {
        Ok(())
    }

    fn process_batch(
        &self,
        _connection: &mut dyn Connection,
        _handle: StatementHandle,
        _arguments: &[Argument],
    ) -> Result<(), SqlMapperError> {
        Ok(())
    }
}
