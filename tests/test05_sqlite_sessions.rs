#![cfg(feature = "sqlite")]

use std::sync::Arc;

use sql_mapper::prelude::*;
use tempfile::tempdir;

fn configuration() -> Result<Arc<Configuration>, SqlMapperError> {
    let mut config = Configuration::builder()
        .cache("users", CacheSettings { size: 16, ..CacheSettings::default() })
        .build()?;
    let cache = config.cache("users")?;
    let user = RecordType::new(
        "User",
        [
            ("id", ValueType::Int),
            ("name", ValueType::Text),
            ("active", ValueType::Bool),
        ],
    );

    let insert = SqlTemplate::from_sql(
        &config,
        "insert into users (id, name, active) values (#{id}, #{name}, #{active})",
        &ValueType::Record(user),
    )?;
    config.add_mapped_statement(
        MappedStatement::builder("users.insert", insert, CommandKind::Insert)
            .cache(Arc::clone(&cache))
            .build()?,
    )?;

    let list = SqlTemplate::from_sql(&config, "select id, name from users order by id", &ValueType::Map)?;
    config.add_mapped_statement(
        MappedStatement::builder("users.all", list, CommandKind::Select)
            .cache(Arc::clone(&cache))
            .build()?,
    )?;

    let by_id = SqlTemplate::from_sql(
        &config,
        "select id, name, active from users where id = #{id}",
        &ValueType::Int,
    )?;
    config.add_mapped_statement(
        MappedStatement::builder("users.by_id", by_id, CommandKind::Select)
            .cache(cache)
            .build()?,
    )?;
    Ok(Arc::new(config))
}

fn open(path: &std::path::Path) -> Result<SqliteConnection, SqlMapperError> {
    let mut conn = SqliteConnection::open(path)?;
    conn.execute_script(
        "CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, active INTEGER NOT NULL);",
    )?;
    Ok(conn)
}

fn user(id: i64, name: &str) -> Argument {
    let ty = RecordType::new(
        "User",
        [
            ("id", ValueType::Int),
            ("name", ValueType::Text),
            ("active", ValueType::Bool),
        ],
    );
    Argument::from(Record::new(&ty).with("id", id).with("name", name).with("active", true))
}

#[test]
fn insert_commit_and_read_back() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("users.db");
    let config = configuration()?;

    let mut writer = config.open_session(DriverTransaction::new(open(&path)?));
    for (id, name) in [(1, "ann"), (2, "bea"), (3, "cy")] {
        assert_eq!(writer.insert("users.insert", &user(id, name))?, UpdateCount::Affected(1));
    }
    writer.commit(false)?;
    writer.close();

    let mut reader = config.open_session(DriverTransaction::new(open(&path)?));
    let all = reader.select_list("users.all", &Argument::Null)?;
    assert_eq!(all.len(), 3);
    let page = reader.select_list_with_bounds("users.all", &Argument::Null, RowBounds::new(1, 1))?;
    assert_eq!(page.len(), 1);
    assert_eq!(page.results[0].get("name"), Some(&RowValues::Text("bea".into())));

    let one = reader.select_one("users.by_id", &Argument::from(3))?.ok_or("missing row")?;
    assert_eq!(one.get("active"), Some(&RowValues::Int(1)));
    assert!(reader.select_one("users.by_id", &Argument::from(9))?.is_none());

    let err = reader.select_one("users.all", &Argument::Null).unwrap_err();
    assert!(err.to_string().contains("but found: 3"));
    Ok(())
}

#[test]
fn dropped_session_rolls_back() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("rollback.db");
    let config = configuration()?;
    {
        let mut session = config.open_session(DriverTransaction::new(open(&path)?));
        session.insert("users.insert", &user(1, "ann"))?;
    }
    let mut reader = config.open_session(DriverTransaction::new(open(&path)?));
    assert!(reader.select_list("users.all", &Argument::Null)?.is_empty());
    Ok(())
}

#[test]
fn batch_inserts_through_sqlite() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("batch.db");
    let config = configuration()?;
    let mut session =
        config.open_session_with(DriverTransaction::new(open(&path)?), ExecutorType::Batch);
    for id in 1..=5 {
        session.insert("users.insert", &user(id, "x"))?;
    }
    let results = session.flush_statements()?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].update_counts(), &[1, 1, 1, 1, 1]);

    session.insert("users.insert", &user(1, "dup"))?;
    let err = session.flush_statements().unwrap_err();
    let failure = err.as_batch_failure().ok_or("expected a batch failure")?;
    assert!(failure.completed().is_empty());
    assert!(failure.failed().update_counts().is_empty());
    session.rollback(true)?;
    Ok(())
}

#[test]
fn result_handler_can_stop_early() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("stream.db");
    let config = configuration()?;
    let mut session = config.open_session(DriverTransaction::new(open(&path)?));
    for id in 1..=4 {
        session.insert("users.insert", &user(id, "x"))?;
    }
    let mut seen = Vec::new();
    let handled = session.select_with_handler(
        "users.all",
        &Argument::Null,
        RowBounds::default(),
        &mut |ctx: &mut ResultContext<'_>| {
            if let Some(row) = ctx.row() {
                seen.push(row.get("id").cloned());
            }
            if ctx.result_count() == 2 {
                ctx.stop();
            }
        },
    )?;
    assert_eq!(handled, 2);
    assert_eq!(seen, vec![Some(RowValues::Int(1)), Some(RowValues::Int(2))]);
    session.commit(false)?;
    Ok(())
}
