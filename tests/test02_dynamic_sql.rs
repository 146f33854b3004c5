use sql_mapper::prelude::*;

fn search_template(config: &Configuration) -> Result<SqlTemplate, SqlMapperError> {
    let root = SqlNode::mixed(vec![
        SqlNode::text("select * from users"),
        SqlNode::where_clause(SqlNode::mixed(vec![
            SqlNode::if_test("name != null", SqlNode::text("and name = #{name}")),
            SqlNode::if_test(
                "ids != null",
                SqlNode::Foreach(
                    ForeachNode::new("ids", SqlNode::text("#{id}"))
                        .item("id")
                        .open("and id in (")
                        .close(")")
                        .separator(","),
                ),
            ),
        ])),
        SqlNode::filtered_text("order by ${order}", "[a-z_]+")?,
    ]);
    SqlTemplate::new(config, root, &ValueType::Map)
}

#[test]
fn conditional_segments_and_iteration() -> Result<(), Box<dyn std::error::Error>> {
    let config = Configuration::builder().build()?;
    let template = search_template(&config)?;
    assert!(template.is_dynamic());

    let bound = template.bound_statement(&Argument::map([
        ("name", Argument::from("ann")),
        ("ids", Argument::from(vec![4, 5])),
        ("order", Argument::from("name")),
    ]))?;
    assert_eq!(
        bound.sql(),
        "select * from users WHERE name = ? and id in ( ? , ? ) order by name"
    );
    assert_eq!(
        bound.parameter_values(config.type_handlers())?,
        vec![
            RowValues::Text("ann".into()),
            RowValues::Int(4),
            RowValues::Int(5)
        ]
    );
    Ok(())
}

#[test]
fn empty_where_clause_is_dropped() -> Result<(), Box<dyn std::error::Error>> {
    let config = Configuration::builder().build()?;
    let template = search_template(&config)?;
    let bound = template.bound_statement(&Argument::map([("order", Argument::from("id"))]))?;
    assert_eq!(bound.sql(), "select * from users order by id");
    assert!(bound.descriptors().is_empty());
    Ok(())
}

#[test]
fn substitution_filter_blocks_injection() -> Result<(), Box<dyn std::error::Error>> {
    let config = Configuration::builder().build()?;
    let template = search_template(&config)?;
    let err = template
        .bound_statement(&Argument::map([("order", Argument::from("id; drop table users"))]))
        .unwrap_err();
    assert!(matches!(err, SqlMapperError::ValidationError(_)));
    Ok(())
}

#[test]
fn bind_and_choose() -> Result<(), Box<dyn std::error::Error>> {
    let config = Configuration::builder().database_id("sqlite").build()?;
    let root = SqlNode::mixed(vec![
        SqlNode::bind("pattern", "name"),
        SqlNode::text("select * from users where name like #{pattern}"),
        SqlNode::choose(
            vec![("_databaseId == 'sqlite'".to_string(), SqlNode::text("limit 10"))],
            Some(SqlNode::text("fetch first 10 rows only")),
        ),
    ]);
    let template = SqlTemplate::new(&config, root, &ValueType::Map)?;
    let bound = template.bound_statement(&Argument::map([("name", Argument::from("a%"))]))?;
    assert_eq!(bound.sql(), "select * from users where name like ? limit 10");
    assert!(bound.has_additional_parameter("pattern"));
    assert_eq!(
        bound.parameter_values(config.type_handlers())?,
        vec![RowValues::Text("a%".into())]
    );
    Ok(())
}

#[test]
fn set_clause_trims_trailing_comma() -> Result<(), Box<dyn std::error::Error>> {
    let config = Configuration::builder().build()?;
    let root = SqlNode::mixed(vec![
        SqlNode::text("update users"),
        SqlNode::set_clause(SqlNode::mixed(vec![
            SqlNode::if_test("name != null", SqlNode::text("name = #{name},")),
            SqlNode::if_test("age != null", SqlNode::text("age = #{age},")),
        ])),
        SqlNode::text("where id = #{id}"),
    ]);
    let template = SqlTemplate::new(&config, root, &ValueType::Map)?;
    let bound = template.bound_statement(&Argument::map([
        ("id", Argument::from(1)),
        ("name", Argument::from("bo")),
    ]))?;
    assert_eq!(bound.sql(), "update users SET name = ? where id = ?");
    Ok(())
}
