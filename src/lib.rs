//! Statement templates with typed placeholders, executed through simple, reusing or batching
//! executors, with an optional transaction-aware second-level cache.
//!
//! ```rust
//! use std::sync::Arc;
//! use sql_mapper::prelude::*;
//!
//! let mut config = Configuration::builder()
//!     .cache("users", CacheSettings::default())
//!     .build()?;
//! let template = SqlTemplate::from_sql(
//!     &config,
//!     "select id, name from users where id = #{id}",
//!     &ValueType::Map,
//! )?;
//! let statement = MappedStatement::builder("users.by_id", template, CommandKind::Select)
//!     .cache(config.cache("users")?)
//!     .build()?;
//! config.add_mapped_statement(statement)?;
//! let config = Arc::new(config);
//!
//! let conn = SqliteConnection::open_in_memory()?;
//! conn.raw().execute_batch("create table users (id integer, name text); insert into users values (1, 'alice');")?;
//! let mut session = config.open_session(DriverTransaction::new(conn));
//! let row = session.select_one("users.by_id", &Argument::map([("id", Argument::from(1))]))?;
//! assert_eq!(
//!     row.and_then(|r| r.get("name").cloned()),
//!     Some(RowValues::Text("alice".into()))
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod mapping;
pub mod prelude;
pub mod reflection;
pub mod results;
pub mod scripting;
pub mod session;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod translation;
pub mod types;

pub use error::SqlMapperError;
