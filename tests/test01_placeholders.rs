use sql_mapper::prelude::*;
use sql_mapper::translation::{BIND_PLACEHOLDER, TEXT_SUBSTITUTION};

#[test]
fn scanner_identity_handler_round_trips() -> Result<(), Box<dyn std::error::Error>> {
    let text = "select * from t where a = #{a} and b = #{b, jdbcType=VARCHAR}";
    let out = BIND_PLACEHOLDER.scan(text, |content| Ok(format!("#{{{content}}}")))?;
    assert_eq!(out, text);
    Ok(())
}

#[test]
fn escaped_and_unterminated_spans() -> Result<(), Box<dyn std::error::Error>> {
    let out = TEXT_SUBSTITUTION.scan("a \\${x} ${y} ${z", |content| Ok(content.to_uppercase()))?;
    assert_eq!(out, "a ${x} Y ${z");
    Ok(())
}

#[test]
fn placeholders_become_positional_markers() -> Result<(), Box<dyn std::error::Error>> {
    let config = Configuration::builder().build()?;
    let template = SqlTemplate::from_sql(
        &config,
        "update t set amount = #{amount, jdbcType=NUMERIC} where id = #{id}",
        &ValueType::Map,
    )?;
    assert!(!template.is_dynamic());

    let bound = template.bound_statement(&Argument::map([
        ("id", Argument::from(3)),
        ("amount", Argument::from(9.5)),
    ]))?;
    assert_eq!(bound.sql(), "update t set amount = ? where id = ?");
    let descriptors = bound.descriptors();
    assert_eq!(descriptors[0].property(), Some("amount"));
    assert_eq!(descriptors[0].driver_type(), Some(DriverType::Numeric));
    assert_eq!(descriptors[1].property(), Some("id"));
    assert_eq!(descriptors[1].driver_type(), None);
    assert_eq!(descriptors[1].mode(), ParameterMode::In);

    let registry = config.type_handlers();
    assert_eq!(
        bound.parameter_values(registry)?,
        vec![RowValues::Float(9.5), RowValues::Int(3)]
    );
    Ok(())
}

#[test]
fn record_properties_drive_value_types() -> Result<(), Box<dyn std::error::Error>> {
    let config = Configuration::builder().build()?;
    let user = RecordType::new("User", [("id", ValueType::Int), ("name", ValueType::Text)]);
    let template = SqlTemplate::from_sql(
        &config,
        "insert into users (id, name) values (#{id}, #{name})",
        &ValueType::Record(user.clone()),
    )?;
    let SqlTemplate::Static(compiled) = &template else {
        panic!("expected a static template");
    };
    assert_eq!(compiled.descriptors[0].value_type(), &ValueType::Int);
    assert_eq!(compiled.descriptors[1].value_type(), &ValueType::Text);

    let bound = template.bound_statement(&Argument::from(
        Record::new(&user).with("id", 1).with("name", "ann"),
    ))?;
    assert_eq!(
        bound.parameter_values(config.type_handlers())?,
        vec![RowValues::Int(1), RowValues::Text("ann".into())]
    );
    Ok(())
}

#[test]
fn expression_placeholders_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let config = Configuration::builder().build()?;
    let err = SqlTemplate::from_sql(&config, "select #{id, expression=foo}", &ValueType::Map)
        .unwrap_err();
    assert!(matches!(err, SqlMapperError::ConfigError(_)));
    assert!(err.to_string().contains("Expression based parameters are not supported yet"));
    Ok(())
}

#[test]
fn out_parameters_need_callable_statements() -> Result<(), Box<dyn std::error::Error>> {
    let config = Configuration::builder().build()?;
    let sql = "call next_id(#{id, mode=OUT, jdbcType=INTEGER})";
    let template = SqlTemplate::from_sql(&config, sql, &ValueType::Map)?;
    let plain = MappedStatement::builder("ids.next", template.clone(), CommandKind::Select).build();
    assert!(matches!(plain, Err(SqlMapperError::ConfigError(_))));

    let callable = MappedStatement::builder("ids.next", template, CommandKind::Select)
        .statement_kind(StatementKind::Callable)
        .build()?;
    let bound = callable.bound_statement(&Argument::map([("id", Argument::Null)]))?;
    assert_eq!(bound.parameter_values(config.type_handlers())?, vec![RowValues::Null]);
    Ok(())
}
