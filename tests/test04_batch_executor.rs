#![cfg(feature = "test-utils")]

use std::sync::{Arc, Mutex};

use sql_mapper::prelude::*;
use sql_mapper::test_utils::MockConnection;

const INSERT_USER: &str = "insert into users (id) values (?)";
const INSERT_ROLE: &str = "insert into roles (id) values (?)";

#[derive(Debug, Default)]
struct CountingKeys {
    batches: Mutex<Vec<usize>>,
}

impl KeyGenerator for CountingKeys {
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
        arguments: &[Argument],
    ) -> Result<(), SqlMapperError> {
        self.batches
            .lock()
            .map_err(|e| SqlMapperError::Other(e.to_string()))?
            .push(arguments.len());
        Ok(())
    }
}

fn configuration(keys: Arc<CountingKeys>) -> Result<Arc<Configuration>, SqlMapperError> {
    let mut config = Configuration::builder()
        .default_executor_type(ExecutorType::Batch)
        .build()?;
    for (id, sql) in [
        ("users.insert", "insert into users (id) values (#{id})"),
        ("roles.insert", "insert into roles (id) values (#{id})"),
        ("audit.insert", "insert into audit (id) values (#{id})"),
    ] {
        let template = SqlTemplate::from_sql(&config, sql, &ValueType::Map)?;
        config.add_mapped_statement(
            MappedStatement::builder(id, template, CommandKind::Insert)
                .key_generator(Arc::clone(&keys) as Arc<dyn KeyGenerator>)
                .build()?,
        )?;
    }
    let select = SqlTemplate::from_sql(&config, "select count(*) from users", &ValueType::Map)?;
    config.add_mapped_statement(
        MappedStatement::builder("users.count", select, CommandKind::Select).build()?,
    )?;
    Ok(Arc::new(config))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn id(value: i64) -> Argument {
    Argument::map([("id", Argument::from(value))])
}

#[test]
fn consecutive_updates_share_a_group() -> Result<(), Box<dyn std::error::Error>> {
    let keys = Arc::new(CountingKeys::default());
    let config = configuration(Arc::clone(&keys))?;
    let conn = MockConnection::new();
    let mut session = config.open_session(DriverTransaction::new(conn.clone()));

    assert_eq!(session.insert("users.insert", &id(1))?, UpdateCount::Pending);
    assert_eq!(session.insert("users.insert", &id(2))?, UpdateCount::Pending);
    assert_eq!(session.insert("roles.insert", &id(3))?, UpdateCount::Pending);
    assert_eq!(conn.prepared(), vec![INSERT_USER, INSERT_ROLE]);

    let results = session.flush_statements()?;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].statement_id(), "users.insert");
    assert_eq!(results[0].arguments().len(), 2);
    assert_eq!(results[0].update_counts(), &[1, 1]);
    assert_eq!(results[1].sql(), INSERT_ROLE);
    assert_eq!(results[1].update_counts(), &[1]);
    assert_eq!(conn.open_handles(), 0);
    assert_eq!(*keys.batches.lock().map_err(|e| e.to_string())?, vec![2, 1]);

    assert!(session.flush_statements()?.is_empty());
    Ok(())
}

#[test]
fn failing_group_reports_completed_work() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let config = configuration(Arc::new(CountingKeys::default()))?;
    let conn = MockConnection::new().fail_batch(2, 1);
    let mut session = config.open_session(DriverTransaction::new(conn.clone()));

    session.insert("users.insert", &id(1))?;
    session.insert("roles.insert", &id(2))?;
    session.insert("roles.insert", &id(3))?;
    session.insert("audit.insert", &id(4))?;

    let err = session.flush_statements().unwrap_err();
    let failure = err.as_batch_failure().ok_or("expected a batch failure")?;
    assert_eq!(
        failure.message(),
        "roles.insert (batch index #2) failed. 1 prior sub executor(s) completed successfully, \
         but will be rolled back."
    );
    assert_eq!(failure.index(), 1);
    assert_eq!(failure.completed().len(), 1);
    assert_eq!(failure.completed()[0].statement_id(), "users.insert");
    assert_eq!(failure.failed().statement_id(), "roles.insert");
    assert_eq!(failure.failed().update_counts(), &[1]);
    assert!(matches!(failure.cause(), SqlMapperError::BatchUpdate { .. }));

    assert_eq!(conn.open_handles(), 0, "every handle is released");
    assert_eq!(conn.closed_count(), 3);
    assert_eq!(conn.batches().len(), 1, "the third group never ran");

    session.rollback(true)?;
    assert_eq!(conn.rollbacks(), 1);
    Ok(())
}

#[test]
fn first_group_failure_has_no_prior_clause() -> Result<(), Box<dyn std::error::Error>> {
    let config = configuration(Arc::new(CountingKeys::default()))?;
    let conn = MockConnection::new().fail_batch(1, 0);
    let mut session = config.open_session(DriverTransaction::new(conn.clone()));
    session.insert("users.insert", &id(1))?;
    let err = session.flush_statements().unwrap_err();
    assert_eq!(err.to_string(), "users.insert (batch index #1) failed.");
    Ok(())
}

#[test]
fn query_flushes_pending_batches() -> Result<(), Box<dyn std::error::Error>> {
    let config = configuration(Arc::new(CountingKeys::default()))?;
    let conn = MockConnection::new();
    let mut session = config.open_session(DriverTransaction::new(conn.clone()));
    session.insert("users.insert", &id(1))?;
    session.select_list("users.count", &Argument::Null)?;
    assert_eq!(conn.batches().len(), 1);
    assert_eq!(conn.queries().len(), 1);
    assert_eq!(conn.open_handles(), 0);
    Ok(())
}

#[test]
fn rollback_discards_pending_batches() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let config = configuration(Arc::new(CountingKeys::default()))?;
    let conn = MockConnection::new();
    let mut session = config.open_session(DriverTransaction::new(conn.clone()));
    session.insert("users.insert", &id(1))?;
    session.rollback(false)?;
    assert!(conn.batches().is_empty());
    assert_eq!(conn.open_handles(), 0);
    assert_eq!(conn.rollbacks(), 1, "dirty sessions roll back the transaction");
    Ok(())
}

#[test]
fn commit_flushes_then_commits() -> Result<(), Box<dyn std::error::Error>> {
    let config = configuration(Arc::new(CountingKeys::default()))?;
    let conn = MockConnection::new();
    let mut session = config.open_session(DriverTransaction::new(conn.clone()));
    session.insert("users.insert", &id(1))?;
    session.commit(false)?;
    assert_eq!(conn.batches().len(), 1);
    assert_eq!(conn.commits(), 1);
    Ok(())
}

#[test]
fn reuse_executor_keeps_statements_open() -> Result<(), Box<dyn std::error::Error>> {
    let config = configuration(Arc::new(CountingKeys::default()))?;
    let conn = MockConnection::new();
    let mut session =
        config.open_session_with(DriverTransaction::new(conn.clone()), ExecutorType::Reuse);
    session.insert("users.insert", &id(1))?;
    assert_eq!(session.insert("users.insert", &id(2))?, UpdateCount::Affected(1));
    assert_eq!(conn.prepared().len(), 1);
    assert_eq!(conn.open_handles(), 1);
    assert_eq!(conn.updates().len(), 2);

    session.commit(false)?;
    assert_eq!(conn.open_handles(), 0);
    Ok(())
}

#[test]
fn simple_executor_closes_each_statement() -> Result<(), Box<dyn std::error::Error>> {
    let config = configuration(Arc::new(CountingKeys::default()))?;
    let conn = MockConnection::new();
    let mut session =
        config.open_session_with(DriverTransaction::new(conn.clone()), ExecutorType::Simple);
    session.insert("users.insert", &id(1))?;
    session.insert("users.insert", &id(2))?;
    assert_eq!(conn.prepared().len(), 2);
    assert_eq!(conn.open_handles(), 0);
    Ok(())
}

#[test]
fn simple_executor_releases_statement_on_driver_error() -> Result<(), Box<dyn std::error::Error>> {
    let config = configuration(Arc::new(CountingKeys::default()))?;
    let conn = MockConnection::new().fail_update(1).fail_query(1);
    let mut session =
        config.open_session_with(DriverTransaction::new(conn.clone()), ExecutorType::Simple);

    let err = session.insert("users.insert", &id(1)).unwrap_err();
    assert_eq!(err.to_string(), "SQL execution error: mock failure in execute_update call 1");
    assert_eq!(conn.open_handles(), 0);

    let err = session.select_list("users.count", &Argument::Null).unwrap_err();
    assert!(matches!(err, SqlMapperError::ExecutionError(_)));
    assert_eq!(conn.open_handles(), 0);
    assert_eq!(conn.closed_count(), 2);
    Ok(())
}

#[test]
fn reuse_executor_drops_failed_statement() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let config = configuration(Arc::new(CountingKeys::default()))?;
    let conn = MockConnection::new().fail_update(2);
    let mut session =
        config.open_session_with(DriverTransaction::new(conn.clone()), ExecutorType::Reuse);
    session.insert("users.insert", &id(1))?;
    assert_eq!(conn.open_handles(), 1);

    let err = session.insert("users.insert", &id(2)).unwrap_err();
    assert_eq!(err.to_string(), "SQL execution error: mock failure in execute_update call 2");
    assert_eq!(conn.open_handles(), 0);

    session.insert("users.insert", &id(3))?;
    assert_eq!(conn.prepared().len(), 2, "the next call prepares afresh");
    Ok(())
}

#[test]
fn failed_first_item_leaves_no_empty_group() -> Result<(), Box<dyn std::error::Error>> {
    let config = configuration(Arc::new(CountingKeys::default()))?;
    let conn = MockConnection::new().fail_add_batch(2);
    let mut session = config.open_session(DriverTransaction::new(conn.clone()));
    session.insert("users.insert", &id(1))?;
    assert!(session.insert("roles.insert", &id(2)).is_err());
    assert_eq!(conn.open_handles(), 1);

    let results = session.flush_statements()?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].statement_id(), "users.insert");
    assert_eq!(results[0].update_counts(), &[1]);
    assert_eq!(conn.open_handles(), 0);
    Ok(())
}
