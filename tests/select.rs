use sqltype::{BaseType, DialectKind, Error, InMemorySchema, InferredType};

fn schema() -> InMemorySchema {
    InMemorySchema::from_ddl(
        DialectKind::Sqlite,
        "create table users (id integer primary key not null, name text not null, age integer, city text);
         create table orders (id integer primary key not null, user_id integer not null, total real not null, status text not null);
         create table departments (id integer primary key not null, name text not null, manager_id integer)",
    )
    .unwrap()
}

fn column_base(result: &sqltype::CheckResult, index: usize) -> BaseType {
    let InferredType::Concrete(c) = result.query.columns[index].inferred_type.clone() else {
        panic!("expected concrete type");
    };
    c.base
}

fn column_nullable(result: &sqltype::CheckResult, index: usize) -> bool {
    let InferredType::Concrete(c) = result.query.columns[index].inferred_type.clone() else {
        panic!("expected concrete type");
    };
    c.nullable
}

#[test]
fn select_specific_columns() {
    let schema = schema();
    let result = sqltype::check_query(&schema, DialectKind::Sqlite, "select id, name from users").unwrap();
    assert_eq!(result.query.columns.len(), 2);
    assert_eq!(column_base(&result, 0), BaseType::Integer);
    assert_eq!(column_base(&result, 1), BaseType::String);
}

#[test]
fn select_unknown_column_is_rejected() {
    let schema = schema();
    let err = sqltype::check_query(&schema, DialectKind::Sqlite, "select weight from users").unwrap_err();
    assert!(matches!(err.error, Error::ColumnDoesntExist(name) if name == "weight"));
}

#[test]
fn select_from_unknown_table_is_rejected() {
    let schema = schema();
    let err = sqltype::check_query(&schema, DialectKind::Sqlite, "select * from nonexistent").unwrap_err();
    assert!(matches!(err.error, Error::TableDoesntExist(name) if name == "nonexistent"));
}

#[test]
fn wildcard_expands_every_column() {
    let schema = schema();
    let result = sqltype::check_query(&schema, DialectKind::Sqlite, "select * from users").unwrap();
    assert_eq!(result.query.columns.len(), 4);
}

#[test]
fn wildcard_without_from_is_rejected() {
    let schema = schema();
    let err = sqltype::check_query(&schema, DialectKind::Sqlite, "select *").unwrap_err();
    assert!(matches!(err.error, Error::WildcardWithoutFrom));
}

#[test]
fn qualified_wildcard_expands_one_table_only() {
    let schema = schema();
    let result = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select users.*, orders.total from users join orders on users.id = orders.user_id",
    )
    .unwrap();
    assert_eq!(result.query.columns.len(), 5);
}

#[test]
fn unaliased_expression_projection_requires_an_alias() {
    let schema = schema();
    let err = sqltype::check_query(&schema, DialectKind::Sqlite, "select age + 1 from users").unwrap_err();
    assert!(matches!(err.error, Error::ExpressionColumnRequiresAlias));
}

#[test]
fn aliased_expression_projection_is_accepted() {
    let schema = schema();
    let result = sqltype::check_query(&schema, DialectKind::Sqlite, "select age + 1 as next_age from users").unwrap();
    assert_eq!(result.query.columns[0].column_name.as_ref().unwrap().as_str(), "next_age");
}

#[test]
fn inner_join_resolves_columns_from_both_sides() {
    let schema = schema();
    let result = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select users.name, orders.total from users join orders on users.id = orders.user_id",
    )
    .unwrap();
    assert_eq!(result.query.columns.len(), 2);
}

#[test]
fn left_outer_join_makes_right_side_nullable() {
    let schema = schema();
    let result = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select users.name, orders.total from users left join orders on users.id = orders.user_id",
    )
    .unwrap();
    assert!(!column_nullable(&result, 0));
    assert!(column_nullable(&result, 1));
}

#[test]
fn right_outer_join_makes_left_side_nullable() {
    let schema = schema();
    let result = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select users.name, orders.total from users right join orders on users.id = orders.user_id",
    )
    .unwrap();
    assert!(column_nullable(&result, 0));
    assert!(!column_nullable(&result, 1));
}

#[test]
fn full_outer_join_makes_both_sides_nullable() {
    let schema = schema();
    let result = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select users.name, orders.total from users full join orders on users.id = orders.user_id",
    )
    .unwrap();
    assert!(column_nullable(&result, 0));
    assert!(column_nullable(&result, 1));
}

#[test]
fn cross_join_requires_no_constraint() {
    let schema = schema();
    let result = sqltype::check_query(&schema, DialectKind::Sqlite, "select users.name, orders.total from users cross join orders").unwrap();
    assert_eq!(result.query.columns.len(), 2);
}

#[test]
fn using_join_unifies_the_shared_column() {
    let schema = InMemorySchema::from_ddl(
        DialectKind::Sqlite,
        "create table a (id integer primary key, val text);
         create table b (id integer primary key, other text)",
    )
    .unwrap();
    let result = sqltype::check_query(&schema, DialectKind::Sqlite, "select val, other from a join b using (id)").unwrap();
    assert_eq!(result.query.columns.len(), 2);
}

#[test]
fn using_join_over_missing_column_is_rejected() {
    let schema = InMemorySchema::from_ddl(
        DialectKind::Sqlite,
        "create table a (id integer primary key, val text);
         create table b (other_id integer primary key, other text)",
    )
    .unwrap();
    let err = sqltype::check_query(&schema, DialectKind::Sqlite, "select val from a join b using (id)").unwrap_err();
    assert!(matches!(err.error, Error::ColumnDoesntExist(name) if name == "id"));
}

#[test]
fn natural_join_requires_a_common_column() {
    let schema = InMemorySchema::from_ddl(
        DialectKind::Sqlite,
        "create table a (only_a text);
         create table b (only_b text)",
    )
    .unwrap();
    let err = sqltype::check_query(&schema, DialectKind::Sqlite, "select * from a natural join b").unwrap_err();
    assert!(matches!(err.error, Error::NoCommonColumn));
}

#[test]
fn natural_join_unifies_the_common_column() {
    let schema = InMemorySchema::from_ddl(
        DialectKind::Sqlite,
        "create table a (id integer primary key, val text);
         create table b (id integer primary key, other text)",
    )
    .unwrap();
    let result = sqltype::check_query(&schema, DialectKind::Sqlite, "select id, val, other from a natural join b").unwrap();
    assert_eq!(result.query.columns.len(), 3);
}

#[test]
fn duplicate_from_alias_is_rejected() {
    let schema = schema();
    let err = sqltype::check_query(&schema, DialectKind::Sqlite, "select * from users u, orders u").unwrap_err();
    assert!(matches!(err.error, Error::DuplicateFromBinding(name) if name == "u"));
}

#[test]
fn ambiguous_unqualified_column_is_rejected() {
    let schema = InMemorySchema::from_ddl(
        DialectKind::Sqlite,
        "create table a (id integer primary key, name text);
         create table b (id integer primary key, name text)",
    )
    .unwrap();
    let err = sqltype::check_query(&schema, DialectKind::Sqlite, "select name from a, b").unwrap_err();
    assert!(matches!(err.error, Error::AmbiguousColumn(name) if name == "name"));
}

#[test]
fn derived_table_in_from_is_checked_and_bound() {
    let schema = schema();
    let result = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select active.name from (select id, name from users where age > 18) as active",
    )
    .unwrap();
    assert_eq!(result.query.columns.len(), 1);
}

#[test]
fn derived_table_column_alias_list_renames_columns() {
    let schema = schema();
    let result = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select u.who from (select name from users) as u(who)",
    )
    .unwrap();
    assert_eq!(result.query.columns[0].column_name.as_ref().unwrap().as_str(), "who");
}

#[test]
fn union_unifies_matching_columns() {
    let schema = schema();
    let result = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select id, name from users union select id, status from orders",
    )
    .unwrap();
    assert_eq!(result.query.columns.len(), 2);
}

#[test]
fn union_rejects_mismatched_column_counts() {
    let schema = schema();
    let err = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select id, name from users union select id from orders",
    )
    .unwrap_err();
    assert!(matches!(err.error, Error::ColumnCountMismatch { .. }));
}

#[test]
fn intersect_and_except_are_supported() {
    let schema = schema();
    sqltype::check_query(&schema, DialectKind::Sqlite, "select id from users intersect select id from orders").unwrap();
    sqltype::check_query(&schema, DialectKind::Sqlite, "select id from users except select id from orders").unwrap();
}

#[test]
fn case_expression_unifies_branch_types() {
    let schema = schema();
    let result = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select case when age > 18 then 'adult' else 'minor' end as bracket from users",
    )
    .unwrap();
    assert_eq!(column_base(&result, 0), BaseType::String);
}

#[test]
fn case_expression_rejects_mismatched_branch_types() {
    let schema = schema();
    let err = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select case when age > 18 then 'adult' else 0 end as bracket from users",
    )
    .unwrap_err();
    assert!(matches!(err.error, Error::TypeMismatch { .. }));
}

#[test]
fn order_by_references_a_select_list_column() {
    let schema = schema();
    sqltype::check_query(&schema, DialectKind::Sqlite, "select id, name from users order by name").unwrap();
}

#[test]
fn order_by_unknown_column_is_rejected() {
    let schema = schema();
    let err = sqltype::check_query(&schema, DialectKind::Sqlite, "select id from users order by weight").unwrap_err();
    assert!(matches!(err.error, Error::ColumnDoesntExist(name) if name == "weight"));
}

#[test]
fn limit_and_offset_accept_bind_parameters() {
    let schema = schema();
    sqltype::check_query(&schema, DialectKind::Sqlite, "select id from users limit ? offset ?").unwrap();
}

#[test]
fn limit_requires_a_numeric_value() {
    let schema = schema();
    let err = sqltype::check_query(&schema, DialectKind::Sqlite, "select id from users limit 'abc'").unwrap_err();
    assert!(matches!(err.error, Error::TypeMismatch { .. }));
}

#[test]
fn cte_is_visible_to_the_statement_body() {
    let schema = schema();
    let result = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "with adults as (select id, name from users where age >= 18) select name from adults",
    )
    .unwrap();
    assert_eq!(result.query.columns.len(), 1);
}

#[test]
fn cte_is_visible_to_a_later_cte() {
    let schema = schema();
    sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "with adults as (select id, name from users where age >= 18),
              adult_orders as (select orders.total from orders join adults on orders.user_id = adults.id)
         select total from adult_orders",
    )
    .unwrap();
}

#[test]
fn group_by_and_having_are_checked() {
    let schema = schema();
    let result = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select status, count(*) as cnt from orders group by status having count(*) > 1",
    )
    .unwrap();
    assert_eq!(result.query.columns.len(), 2);
}

#[test]
fn values_clause_is_checked_row_by_row() {
    let schema = schema();
    let result = sqltype::check_query(&schema, DialectKind::Sqlite, "values (1, 'a'), (2, 'b')").unwrap();
    assert_eq!(result.query.columns.len(), 2);
}

#[test]
fn values_clause_rejects_inconsistent_row_shapes() {
    let schema = schema();
    let err = sqltype::check_query(&schema, DialectKind::Sqlite, "values (1, 'a'), (2, 'b', 'c')").unwrap_err();
    assert!(matches!(err.error, Error::ColumnCountMismatch { .. }));
}

#[test]
fn nested_join_is_resolved_as_a_single_unit() {
    let schema = schema();
    let result = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select users.name, orders.total from users join (orders join departments on orders.id = departments.manager_id) on users.id = orders.user_id",
    )
    .unwrap();
    assert_eq!(result.query.columns.len(), 2);
}

#[test]
fn referenced_tables_are_recorded_once_per_table() {
    let schema = schema();
    let result = sqltype::check_query(
        &schema,
        DialectKind::Sqlite,
        "select users.name, orders.total from users join orders on users.id = orders.user_id",
    )
    .unwrap();
    assert_eq!(result.referenced_tables.len(), 2);
}
