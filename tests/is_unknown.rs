use sqltype::{DialectKind, InMemorySchema};

fn item_schema() -> InMemorySchema {
    InMemorySchema::from_ddl(DialectKind::Sqlite, "create table item (id integer primary key, name text not null, age integer)").unwrap()
}

#[test]
fn is_unknown_over_an_arithmetic_expression() {
    let schema = item_schema();
    sqltype::check_query(&schema, DialectKind::Sqlite, "select * from item where (age + 2) is unknown").unwrap();
}

#[test]
fn is_not_unknown_over_an_arithmetic_expression() {
    let schema = item_schema();
    sqltype::check_query(&schema, DialectKind::Sqlite, "select * from item where (age + 2) is not unknown").unwrap();
}
