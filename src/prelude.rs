//! Convenient imports for common functionality.

pub use crate::cache::{CacheBuilder, CacheKey, SharedCache, TransactionalCacheManager};
pub use crate::config::{
    CacheSettings, Configuration, ConfigurationBuilder, EvictionPolicy, ExecutorType,
    LocalCacheScope, Settings,
};
pub use crate::driver::{
    Connection, DriverTransaction, KeyGenerator, NoKeyGenerator, StatementHandle, Transaction,
};
pub use crate::error::SqlMapperError;
pub use crate::executor::{BatchExecutorError, BatchResult, Executor, UpdateCount};
pub use crate::mapping::{BoundStatement, CommandKind, MappedStatement, RowBounds, StatementKind};
pub use crate::reflection::{Argument, PropertyAccess, Record, RecordType};
pub use crate::results::{CustomDbRow, ResultContext, ResultHandler, ResultSet};
pub use crate::scripting::{ForeachNode, SqlNode, SqlTemplate, TrimNode};
pub use crate::session::SqlSession;
pub use crate::types::{DriverType, ParameterMode, RowValues, TypeHandler, ValueType};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteConnection;
