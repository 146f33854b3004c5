//! A scripted in-memory driver for tests.
//!
//! [`MockConnection`] clones share one log, so a test can keep a clone while the original
//! moves into a [`DriverTransaction`](crate::driver::DriverTransaction).

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::driver::{Connection, StatementHandle};
use crate::error::SqlMapperError;
use crate::results::ResultSet;
use crate::types::RowValues;

#[derive(Debug, Default)]
struct MockStatement {
    sql: String,
    params: Vec<RowValues>,
    batch: Vec<Vec<RowValues>>,
}

#[derive(Debug, Default)]
struct MockState {
    next_handle: u64,
    open: BTreeMap<StatementHandle, MockStatement>,
    prepared: Vec<String>,
    timeouts: Vec<Option<Duration>>,
    closed: usize,
    updates: Vec<(String, Vec<RowValues>)>,
    queries: Vec<(String, Vec<RowValues>)>,
    batches: Vec<(String, Vec<Vec<RowValues>>)>,
    batch_calls: usize,
    fail_batch: Option<(usize, usize)>,
    failures: HashMap<&'static str, usize>,
    calls: HashMap<&'static str, usize>,
    query_results: HashMap<String, ResultSet>,
    commits: usize,
    rollbacks: usize,
}

impl MockState {
    /// Count a call to `op` and fail it if it is the scripted one.
    fn scripted(&mut self, op: &'static str) -> Result<(), SqlMapperError> {
        let count = self.calls.entry(op).or_default();
        *count += 1;
        let call = *count;
        if self.failures.get(op) == Some(&call) {
            return Err(SqlMapperError::ExecutionError(format!(
                "mock failure in {op} call {call}"
            )));
        }
        Ok(())
    }
}

/// Records every driver call. Updates report one affected row; queries return the result
/// registered for their SQL, or an empty set.
#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `call`-th `execute_batch` (1-based) fail after `succeeded` items.
    #[must_use]
    pub fn fail_batch(self, call: usize, succeeded: usize) -> Self {
        self.lock().fail_batch = Some((call, succeeded));
        self
    }

    /// Make the `call`-th `execute_update` (1-based) fail.
    #[must_use]
    pub fn fail_update(self, call: usize) -> Self {
        self.lock().failures.insert("execute_update", call);
        self
    }

    /// Make the `call`-th `execute_query` (1-based) fail.
    #[must_use]
    pub fn fail_query(self, call: usize) -> Self {
        self.lock().failures.insert("execute_query", call);
        self
    }

    /// Make the `call`-th `add_batch` (1-based) fail.
    #[must_use]
    pub fn fail_add_batch(self, call: usize) -> Self {
        self.lock().failures.insert("add_batch", call);
        self
    }

    #[must_use]
    pub fn with_query_result(self, sql: &str, rows: ResultSet) -> Self {
        self.lock().query_results.insert(sql.to_string(), rows);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// SQL of every prepare, in order.
    #[must_use]
    pub fn prepared(&self) -> Vec<String> {
        self.lock().prepared.clone()
    }

    /// Timeout passed to every prepare, in order.
    #[must_use]
    pub fn timeouts(&self) -> Vec<Option<Duration>> {
        self.lock().timeouts.clone()
    }

    /// Handles prepared and not yet closed.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.lock().open.len()
    }

    #[must_use]
    pub fn closed_count(&self) -> usize {
        self.lock().closed
    }

    #[must_use]
    pub fn updates(&self) -> Vec<(String, Vec<RowValues>)> {
        self.lock().updates.clone()
    }

    #[must_use]
    pub fn queries(&self) -> Vec<(String, Vec<RowValues>)> {
        self.lock().queries.clone()
    }

    /// Successfully executed batches: SQL and the parameters of each item.
    #[must_use]
    pub fn batches(&self) -> Vec<(String, Vec<Vec<RowValues>>)> {
        self.lock().batches.clone()
    }

    #[must_use]
    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.lock().rollbacks
    }
}

/// Build a result set from column names and row values.
#[must_use]
pub fn result_set(columns: &[&str], rows: Vec<Vec<RowValues>>) -> ResultSet {
    let mut rs = ResultSet::with_capacity(rows.len());
    rs.set_column_names(Arc::new(columns.iter().map(|c| (*c).to_string()).collect()));
    for row in rows {
        rs.add_row_values(row);
    }
    rs
}

fn unknown(handle: StatementHandle) -> SqlMapperError {
    SqlMapperError::ExecutionError(format!("Unknown statement handle {handle}"))
}

impl Connection for MockConnection {
    fn prepare(
        &mut self,
        sql: &str,
        timeout: Option<Duration>,
    ) -> Result<StatementHandle, SqlMapperError> {
        let mut state = self.lock();
        state.next_handle += 1;
        let handle = StatementHandle(state.next_handle);
        state.prepared.push(sql.to_string());
        state.timeouts.push(timeout);
        state.open.insert(
            handle,
            MockStatement {
                sql: sql.to_string(),
                ..MockStatement::default()
            },
        );
        Ok(handle)
    }

    fn bind_parameters(
        &mut self,
        handle: StatementHandle,
        values: &[RowValues],
    ) -> Result<(), SqlMapperError> {
        let mut state = self.lock();
        let stmt = state.open.get_mut(&handle).ok_or_else(|| unknown(handle))?;
        stmt.params = values.to_vec();
        Ok(())
    }

    fn add_batch(&mut self, handle: StatementHandle) -> Result<(), SqlMapperError> {
        let mut state = self.lock();
        state.scripted("add_batch")?;
        let stmt = state.open.get_mut(&handle).ok_or_else(|| unknown(handle))?;
        let params = std::mem::take(&mut stmt.params);
        stmt.batch.push(params);
        Ok(())
    }

    fn execute_update(&mut self, handle: StatementHandle) -> Result<usize, SqlMapperError> {
        let mut state = self.lock();
        state.scripted("execute_update")?;
        let stmt = state.open.get(&handle).ok_or_else(|| unknown(handle))?;
        let entry = (stmt.sql.clone(), stmt.params.clone());
        state.updates.push(entry);
        Ok(1)
    }

    fn execute_batch(&mut self, handle: StatementHandle) -> Result<Vec<usize>, SqlMapperError> {
        let mut state = self.lock();
        state.batch_calls += 1;
        let call = state.batch_calls;
        let fail = state.fail_batch;
        let stmt = state.open.get_mut(&handle).ok_or_else(|| unknown(handle))?;
        let items = std::mem::take(&mut stmt.batch);
        let sql = stmt.sql.clone();
        if let Some((failing_call, succeeded)) = fail
            && failing_call == call
        {
            return Err(SqlMapperError::BatchUpdate {
                message: format!("mock failure in batch call {call}"),
                update_counts: vec![1; succeeded.min(items.len())],
            });
        }
        let counts = vec![1; items.len()];
        state.batches.push((sql, items));
        Ok(counts)
    }

    fn execute_query(&mut self, handle: StatementHandle) -> Result<ResultSet, SqlMapperError> {
        let mut state = self.lock();
        state.scripted("execute_query")?;
        let stmt = state.open.get(&handle).ok_or_else(|| unknown(handle))?;
        let entry = (stmt.sql.clone(), stmt.params.clone());
        let rows = state.query_results.get(&entry.0).cloned().unwrap_or_default();
        state.queries.push(entry);
        Ok(rows)
    }

    fn close(&mut self, handle: StatementHandle) -> Result<(), SqlMapperError> {
        let mut state = self.lock();
        if state.open.remove(&handle).is_some() {
            state.closed += 1;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SqlMapperError> {
        self.lock().commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), SqlMapperError> {
        self.lock().rollbacks += 1;
        Ok(())
    }
}
