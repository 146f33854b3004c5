use thiserror::Error;

use crate::executor::BatchExecutorError;

#[derive(Debug, Error)]
pub enum SqlMapperError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    /// Raised by a driver when executing a batch fails part way. `update_counts` holds the
    /// counts of the items the driver did run before failing.
    #[error("Batch update error: {message}")]
    BatchUpdate {
        message: String,
        update_counts: Vec<usize>,
    },

    #[error(transparent)]
    BatchExecution(Box<BatchExecutorError>),

    #[error("Executor was closed.")]
    ExecutorClosed,

    #[error("Other error: {0}")]
    Other(String),
}

impl SqlMapperError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        SqlMapperError::ConfigError(message.into())
    }

    /// The batch failure details, if this error came out of a batch flush.
    #[must_use]
    pub fn as_batch_failure(&self) -> Option<&BatchExecutorError> {
        match self {
            SqlMapperError::BatchExecution(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BatchExecutorError> for SqlMapperError {
    fn from(err: BatchExecutorError) -> Self {
        SqlMapperError::BatchExecution(Box::new(err))
    }
}
