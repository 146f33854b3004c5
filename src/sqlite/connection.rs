use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::driver::{Connection, StatementHandle};
use crate::error::SqlMapperError;
use crate::results::ResultSet;
use crate::types::RowValues;

use super::params::Params;
use super::query::build_result_set;

#[derive(Debug)]
struct PreparedEntry {
    sql: String,
    params: Params,
    batch: Vec<Params>,
}

/// A rusqlite connection behind the driver boundary.
///
/// Handles name SQL text held in rusqlite's statement cache, so preparing the same SQL twice
/// compiles it once. Unless auto-commit is on, the first statement opens a transaction that
/// lasts until `commit` or `rollback`.
#[derive(Debug)]
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    statements: HashMap<StatementHandle, PreparedEntry>,
    next_handle: u64,
    auto_commit: bool,
    in_transaction: bool,
}

impl SqliteConnection {
    #[must_use]
    pub fn new(conn: rusqlite::Connection) -> Self {
        Self {
            conn,
            statements: HashMap::new(),
            next_handle: 1,
            auto_commit: false,
            in_transaction: false,
        }
    }

    /// # Errors
    ///
    /// Returns `SqlMapperError::SqliteError` if the database cannot be opened.
    pub fn open_in_memory() -> Result<Self, SqlMapperError> {
        Ok(Self::new(rusqlite::Connection::open_in_memory()?))
    }

    /// # Errors
    ///
    /// Returns `SqlMapperError::SqliteError` if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SqlMapperError> {
        Ok(Self::new(rusqlite::Connection::open(path)?))
    }

    /// Run every statement in its own implicit transaction.
    #[must_use]
    pub fn with_auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }

    /// The underlying rusqlite connection.
    #[must_use]
    pub fn raw(&self) -> &rusqlite::Connection {
        &self.conn
    }

    /// Execute semicolon-separated SQL outside the handle machinery (schema setup).
    ///
    /// # Errors
    ///
    /// Returns `SqlMapperError::SqliteError` on failure.
    pub fn execute_script(&mut self, sql: &str) -> Result<(), SqlMapperError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    #[must_use]
    pub fn open_statements(&self) -> usize {
        self.statements.len()
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn begin_if_needed(&mut self) -> Result<(), SqlMapperError> {
        if !self.auto_commit && !self.in_transaction {
            self.conn.execute_batch("BEGIN")?;
            self.in_transaction = true;
        }
        Ok(())
    }

    fn entry_mut(&mut self, handle: StatementHandle) -> Result<&mut PreparedEntry, SqlMapperError> {
        self.statements
            .get_mut(&handle)
            .ok_or_else(|| unknown_handle(handle))
    }
}

fn unknown_handle(handle: StatementHandle) -> SqlMapperError {
    SqlMapperError::ExecutionError(format!("Unknown statement handle {handle}"))
}

impl Connection for SqliteConnection {
    fn prepare(
        &mut self,
        sql: &str,
        timeout: Option<Duration>,
    ) -> Result<StatementHandle, SqlMapperError> {
        if let Some(timeout) = timeout {
            self.conn.busy_timeout(timeout)?;
        }
        self.conn.prepare_cached(sql)?;
        let handle = StatementHandle(self.next_handle);
        self.next_handle += 1;
        self.statements.insert(
            handle,
            PreparedEntry {
                sql: sql.to_string(),
                params: Params::default(),
                batch: Vec::new(),
            },
        );
        debug!(%handle, sql, "sqlite prepared");
        Ok(handle)
    }

    fn bind_parameters(
        &mut self,
        handle: StatementHandle,
        values: &[RowValues],
    ) -> Result<(), SqlMapperError> {
        self.entry_mut(handle)?.params = Params::convert(values);
        Ok(())
    }

    fn add_batch(&mut self, handle: StatementHandle) -> Result<(), SqlMapperError> {
        let entry = self.entry_mut(handle)?;
        let params = std::mem::take(&mut entry.params);
        entry.batch.push(params);
        Ok(())
    }

    fn execute_update(&mut self, handle: StatementHandle) -> Result<usize, SqlMapperError> {
        self.begin_if_needed()?;
        let entry = self.statements.get(&handle).ok_or_else(|| unknown_handle(handle))?;
        let mut stmt = self.conn.prepare_cached(&entry.sql)?;
        let count = stmt.execute(&entry.params.as_refs()[..])?;
        Ok(count)
    }

    fn execute_batch(&mut self, handle: StatementHandle) -> Result<Vec<usize>, SqlMapperError> {
        self.begin_if_needed()?;
        let entry = self
            .statements
            .get_mut(&handle)
            .ok_or_else(|| unknown_handle(handle))?;
        let batch = std::mem::take(&mut entry.batch);
        let mut stmt = self.conn.prepare_cached(&entry.sql)?;
        let mut update_counts = Vec::with_capacity(batch.len());
        for (i, params) in batch.iter().enumerate() {
            match stmt.execute(&params.as_refs()[..]) {
                Ok(count) => update_counts.push(count),
                Err(err) => {
                    return Err(SqlMapperError::BatchUpdate {
                        message: format!("batch item #{} failed: {err}", i + 1),
                        update_counts,
                    });
                }
            }
        }
        Ok(update_counts)
    }

    fn execute_query(&mut self, handle: StatementHandle) -> Result<ResultSet, SqlMapperError> {
        self.begin_if_needed()?;
        let entry = self.statements.get(&handle).ok_or_else(|| unknown_handle(handle))?;
        let mut stmt = self.conn.prepare_cached(&entry.sql)?;
        build_result_set(&mut stmt, entry.params.as_values())
    }

    fn close(&mut self, handle: StatementHandle) -> Result<(), SqlMapperError> {
        self.statements.remove(&handle);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SqlMapperError> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), SqlMapperError> {
        if self.in_transaction {
            self.conn.execute_batch("ROLLBACK")?;
            self.in_transaction = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> SqliteConnection {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_script("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .unwrap();
        conn
    }

    #[test]
    fn update_query_and_close() {
        let mut conn = setup();
        let insert = conn.prepare("INSERT INTO t (id, name) VALUES (?, ?)", None).unwrap();
        conn.bind_parameters(insert, &[RowValues::Int(1), RowValues::Text("a".into())])
            .unwrap();
        assert_eq!(conn.execute_update(insert).unwrap(), 1);
        conn.close(insert).unwrap();

        let select = conn.prepare("SELECT name FROM t WHERE id = ?", None).unwrap();
        conn.bind_parameters(select, &[RowValues::Int(1)]).unwrap();
        let rows = conn.execute_query(select).unwrap();
        assert_eq!(rows.results[0].get("name"), Some(&RowValues::Text("a".into())));
        conn.close(select).unwrap();
        assert_eq!(conn.open_statements(), 0);
        assert!(conn.in_transaction());
        conn.commit().unwrap();
        assert!(!conn.in_transaction());
    }

    #[test]
    fn batch_failure_reports_partial_counts() {
        let mut conn = setup();
        let insert = conn.prepare("INSERT INTO t (id, name) VALUES (?, ?)", None).unwrap();
        for (id, name) in [(1, Some("a")), (2, None), (3, Some("c"))] {
            let name = name.map_or(RowValues::Null, |n| RowValues::Text(n.into()));
            conn.bind_parameters(insert, &[RowValues::Int(id), name]).unwrap();
            conn.add_batch(insert).unwrap();
        }
        match conn.execute_batch(insert) {
            Err(SqlMapperError::BatchUpdate { update_counts, .. }) => {
                assert_eq!(update_counts, vec![1]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rollback_discards_uncommitted_rows() {
        let mut conn = setup();
        let insert = conn.prepare("INSERT INTO t (id, name) VALUES (1, 'x')", None).unwrap();
        conn.execute_update(insert).unwrap();
        conn.rollback().unwrap();
        let count: i64 = conn
            .raw()
            .query_row("SELECT count(*) FROM t", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn unknown_handles_fail() {
        let mut conn = setup();
        assert!(conn.execute_update(StatementHandle(99)).is_err());
        assert!(conn.close(StatementHandle(99)).is_ok());
    }
}
