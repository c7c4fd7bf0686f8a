use sqltype::{BaseType, DialectKind, Error, InMemorySchema, InferredType};

fn schema() -> InMemorySchema {
    InMemorySchema::from_ddl(
        DialectKind::Sqlite,
        "create table department (id integer primary key, name text not null);
         create table employee (id integer primary key, name text not null, salary integer, dept_id integer)",
    )
    .unwrap()
}

#[test]
fn scalar_subquery_in_where() {
    let schema = schema();
    let result = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select name from employee where dept_id = (select id from department where name = ?)",
    )
    .unwrap();
    assert_eq!(result.query.columns.len(), 1);
}

#[test]
fn scalar_subquery_in_select_list() {
    let schema = schema();
    let result = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select name, (select name from department where id = employee.dept_id) as dept_name from employee",
    )
    .unwrap();
    assert_eq!(result.query.columns.len(), 2);
    let InferredType::Concrete(c) = result.query.columns[1].inferred_type.clone() else {
        panic!("expected concrete type");
    };
    assert_eq!(c.base, BaseType::String);
}

#[test]
fn exists_subquery() {
    let schema = schema();
    sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select name from department where exists (select 1 as one from employee where dept_id = department.id and name = ?)",
    )
    .unwrap();
}

#[test]
fn in_subquery() {
    let schema = schema();
    sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select name from employee where dept_id in (select id from department where name = ?)",
    )
    .unwrap();
}

#[test]
fn subquery_with_unknown_column_is_rejected() {
    let schema = schema();
    let err = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select name from employee where dept_id = (select nonexistent from department where name = ?)",
    )
    .unwrap_err();
    assert!(matches!(err.error, Error::ColumnDoesntExist(name) if name == "nonexistent"));
}

#[test]
fn subquery_against_unknown_table_is_rejected() {
    let schema = schema();
    let err = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select name from employee where dept_id = (select id from nonexistent_table where name = ?)",
    )
    .unwrap_err();
    assert!(matches!(err.error, Error::TableDoesntExist(name) if name == "nonexistent_table"));
}

#[test]
fn correlated_subquery_can_reference_the_outer_query() {
    let schema = schema();
    let result = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select name from employee e1 where salary > (select avg(salary) as avg_salary from employee e2 where e2.dept_id = e1.dept_id)",
    )
    .unwrap();
    assert_eq!(result.query.columns.len(), 1);
}
